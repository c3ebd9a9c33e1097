use std::io::{self, Cursor, Seek, SeekFrom, Write};

use num_complex::Complex64;
use sbf::element::Value;
use sbf::file::data_offsets;
use sbf::{DataType, Error, Flags, Limits, SbfFile};

fn init() {
    env_logger::try_init().ok();
}

fn memory() -> SbfFile<Cursor<Vec<u8>>> {
    init();
    SbfFile::new(Cursor::new(Vec::new()), Limits::default()).expect("default limits are valid")
}

/// Reopen the bytes written so far and read their headers back.
fn reopen(file: SbfFile<Cursor<Vec<u8>>>) -> SbfFile<Cursor<Vec<u8>>> {
    let bytes = file.into_inner().expect("stream still open").into_inner();
    let mut file = SbfFile::new(Cursor::new(bytes), Limits::default()).expect("limits");
    file.read_headers().expect("read headers");
    file
}

/// An in-memory stream that refuses to write more than `budget` bytes in total.
struct FailingWriter {
    inner: Cursor<Vec<u8>>,
    budget: usize,
}

impl FailingWriter {
    fn new(budget: usize) -> Self {
        Self {
            inner: Cursor::new(Vec::new()),
            budget,
        }
    }
}

impl Write for FailingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "budget exhausted"));
        }
        let n = buf.len().min(self.budget);
        let written = self.inner.write(&buf[..n])?;
        self.budget -= written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FailingWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// A stream holding one dataset header, with no data behind it.
fn single_header(data_type: DataType, shape: &[u64]) -> Vec<u8> {
    let limits = Limits::default();
    let mut bytes = b"SBF020\x01".to_vec();
    bytes.extend_from_slice(&sbf::header::encode_name("big", limits.name_length));
    bytes.push(shape.len() as u8);
    bytes.push(data_type.tag());
    for k in 0..limits.max_dim {
        bytes.extend_from_slice(&shape.get(k).copied().unwrap_or(0).to_ne_bytes());
    }
    bytes
}

fn squares() -> Vec<i32> {
    (0..1000).map(|i| i * i).collect()
}

#[test]
fn test_write_read_squares() {
    init();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("ints.sbf");

    let mut file = SbfFile::create(&path, Limits::default()).expect("create");
    file.add_dataset("integer_dataset", &[1000], DataType::Int32, Flags::default())
        .expect("add");
    assert_eq!(file.n_datasets(), 1);
    file.write_headers().expect("write headers");
    file.write_data_as("integer_dataset", &squares()).expect("write data");
    file.close().expect("close");

    let mut file = SbfFile::open(&path, Limits::default()).expect("open");
    assert_eq!(file.n_datasets(), 1);
    let ints: Vec<i32> = file.read_data_as("integer_dataset").expect("read");
    assert_eq!(ints.len(), 1000);
    for (i, v) in ints.iter().enumerate() {
        assert_eq!(*v, (i * i) as i32);
    }
}

#[test]
fn test_write_read_two_datasets() {
    init();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("two.sbf");
    let negative: Vec<i32> = squares().iter().map(|v| -v).collect();

    let mut file = SbfFile::create(&path, Limits::default()).expect("create");
    file.add_dataset("integer_dataset", &[1000], DataType::Int32, Flags::default())
        .expect("add");
    file.add_dataset("integer_dataset_negative", &[1000], DataType::Int32, Flags::default())
        .expect("add");
    file.write_headers().expect("write headers");
    file.write_data_as("integer_dataset", &squares()).expect("write");
    file.write_data_as("integer_dataset_negative", &negative).expect("write");
    file.close().expect("close");

    let mut file = SbfFile::open(&path, Limits::default()).expect("open");
    assert_eq!(file.n_datasets(), 2);
    let read: Vec<i32> = file.read_data_as("integer_dataset_negative").expect("read");
    for (i, v) in read.iter().enumerate() {
        assert_eq!(*v, -((i * i) as i32));
    }
    let read: Vec<i32> = file.read_data_as("integer_dataset").expect("read");
    assert_eq!(read, squares());
}

#[test]
fn test_headers_and_offsets_round_trip() {
    let mut file = memory();
    let shapes: [&[u64]; 8] = [
        &[3],
        &[2, 5],
        &[],
        &[1, 2, 3],
        &[4, 1],
        &[2, 2, 2, 2, 2, 2, 2, 2],
        &[7],
        &[16],
    ];
    for (i, (data_type, shape)) in DataType::ALL.iter().zip(shapes).enumerate() {
        let flags = Flags::new(0, i % 2 == 1);
        file.add_dataset(&format!("set_{i}"), shape, *data_type, flags)
            .expect("add");
    }
    file.write_headers().expect("write headers");
    let written: Vec<_> = file
        .datasets()
        .iter()
        .map(|d| (d.header().clone(), d.offset()))
        .collect();

    let file = reopen(file);
    let read: Vec<_> = file
        .datasets()
        .iter()
        .map(|d| (d.header().clone(), d.offset()))
        .collect();
    assert_eq!(written, read);
    assert_eq!(read[2].0.shape, Vec::<u64>::new());
    assert!(read[1].0.is_column_major());
    assert_eq!(read[5].0.dimensions(), 8);
}

#[test]
fn test_offset_invariant() {
    let mut file = memory();
    file.add_dataset("a", &[10], DataType::Int32, Flags::default()).expect("add");
    file.add_dataset("b", &[3, 3], DataType::Float64, Flags::default()).expect("add");
    file.add_dataset("c", &[], DataType::ComplexDouble, Flags::default()).expect("add");

    let region = file.header_region_size();
    assert_eq!(region, 7 + 3 * 128);
    let offsets: Vec<u64> = file.datasets().iter().map(|d| d.offset()).collect();
    assert_eq!(offsets, vec![region, region + 40, region + 40 + 72]);
    assert_eq!(
        offsets,
        data_offsets(file.limits(), file.datasets().iter().map(|d| d.header())).expect("offsets")
    );

    let relative: Vec<u64> = offsets.iter().map(|o| o - region).collect();
    file.add_dataset("d", &[5], DataType::Byte, Flags::default()).expect("add");
    let region = file.header_region_size();
    let after: Vec<u64> = file.datasets().iter().map(|d| d.offset() - region).collect();
    assert_eq!(after[..3], relative[..]);
    assert_eq!(after[3], 40 + 72 + 16);
}

#[test]
fn test_missing_dataset_is_none() {
    let mut file = memory();
    file.add_dataset("present", &[1], DataType::Byte, Flags::default()).expect("add");
    file.write_headers().expect("write");
    let file = reopen(file);
    assert!(file.get_dataset("missing").is_none());
    assert!(file.get_dataset("present").is_some());
}

#[test]
fn test_too_many_datasets() {
    let mut file = memory();
    for i in 0..16 {
        file.add_dataset(&i.to_string(), &[1], DataType::Byte, Flags::default())
            .expect("within limit");
    }
    let err = file
        .add_dataset("one_more", &[1], DataType::Byte, Flags::default())
        .expect_err("over limit");
    assert!(matches!(err, Error::TooManyDatasets { max: 16, .. }));
    assert_eq!(file.n_datasets(), 16);
}

#[test]
fn test_invalid_shapes() {
    let mut file = memory();
    let err = file
        .add_dataset("deep", &[1; 9], DataType::Byte, Flags::default())
        .expect_err("nine dimensions");
    assert!(matches!(err, Error::InvalidShape(_)));
    let err = file
        .add_dataset("empty", &[3, 0], DataType::Byte, Flags::default())
        .expect_err("zero extent");
    assert!(matches!(err, Error::InvalidShape(_)));
    assert_eq!(file.n_datasets(), 0);
}

#[test]
fn test_lookup_and_type_errors() {
    let mut file = memory();
    file.add_dataset("ints", &[4], DataType::Int32, Flags::default()).expect("add");
    file.write_headers().expect("write");

    let err = file.write_data("nope", &[0; 16]).expect_err("unknown name");
    assert!(matches!(err, Error::NotFound(name) if name == "nope"));
    let err = file.write_data("ints", &[0; 15]).expect_err("short buffer");
    assert!(matches!(err, Error::BufferTooSmall { needed: 16, available: 15 }));
    let err = file.write_data_as("ints", &[1.0f64; 4]).expect_err("wrong type");
    assert!(matches!(
        err,
        Error::TypeMismatch { expected: DataType::Float64, found: DataType::Int32 }
    ));
    // none of these touch the stream
    assert!(file.is_open());

    file.write_data_as("ints", &[1i32, 2, 3, 4]).expect("write");
    let mut file = reopen(file);
    let err = file.read_data_as::<i64>("ints").expect_err("wrong type");
    assert!(matches!(err, Error::TypeMismatch { .. }));
    let mut small = [0u8; 8];
    let err = file.read_data("ints", &mut small).expect_err("short buffer");
    assert!(matches!(err, Error::BufferTooSmall { needed: 16, available: 8 }));
    assert_eq!(file.read_data_as::<i32>("ints").expect("read"), vec![1, 2, 3, 4]);
}

#[test]
fn test_bad_magic_closes_stream() {
    init();
    let mut bytes = b"HDF020\x00".to_vec();
    bytes.resize(64, 0);
    let mut file = SbfFile::new(Cursor::new(bytes), Limits::default()).expect("limits");
    let err = file.read_headers().expect_err("bad magic");
    assert!(matches!(err, Error::FormatMismatch { .. }));
    assert!(!file.is_open());
    assert!(matches!(file.read_headers(), Err(Error::Closed)));
}

#[test]
fn test_truncated_file_fails() {
    let mut file = memory();
    file.add_dataset("a", &[2], DataType::Int64, Flags::default()).expect("add");
    file.write_headers().expect("write");
    let mut bytes = file.into_inner().expect("open").into_inner();
    bytes.truncate(50);

    let mut file = SbfFile::new(Cursor::new(bytes), Limits::default()).expect("limits");
    let err = file.read_headers().expect_err("truncated");
    assert!(matches!(err, Error::ReadFailure(_)));
    assert!(err.is_io());
    assert!(!file.is_open());
}

#[test]
fn test_missing_data_block_fails_totally() {
    let mut file = memory();
    file.add_dataset("a", &[2], DataType::Int64, Flags::default()).expect("add");
    file.write_headers().expect("write");
    let mut file = reopen(file);
    let err = file.read_data_as::<i64>("a").expect_err("no data written");
    assert!(matches!(err, Error::ReadFailure(_)));
    assert!(matches!(file.read_data_as::<i64>("a"), Err(Error::Closed)));
}

#[test]
fn test_open_missing_path() {
    init();
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("absent.sbf");
    let err = SbfFile::open(&path, Limits::default())
        .err()
        .expect("no such file");
    assert!(matches!(&err, Error::OpenFailure { path: p, .. } if p == &path));
    assert!(err.to_string().contains("absent.sbf"));
}

#[test]
fn test_owned_buffers_and_element_access() {
    let logical = |i: u64, j: u64| (i * 10 + j) as f32;
    let (rows, cols) = (3u64, 4u64);
    let mut row_major = Vec::new();
    for i in 0..rows {
        for j in 0..cols {
            row_major.push(logical(i, j));
        }
    }
    let mut col_major = Vec::new();
    for j in 0..cols {
        for i in 0..rows {
            col_major.push(logical(i, j));
        }
    }

    let mut file = memory();
    file.add_dataset("rows", &[rows, cols], DataType::Float32, Flags::new(0, false))
        .expect("add");
    file.add_dataset("cols", &[rows, cols], DataType::Float32, Flags::new(0, true))
        .expect("add");
    file.set_data("rows", sbf::element::to_bytes(&row_major)).expect("set");
    file.set_data("cols", sbf::element::to_bytes(&col_major)).expect("set");
    file.write().expect("write");

    let mut file = reopen(file);
    file.load_all().expect("load");
    let by_rows = file.get_dataset("rows").expect("rows");
    let by_cols = file.get_dataset("cols").expect("cols");
    for idx in by_rows.layout().indices() {
        let expected = Value::Float32(logical(idx[0], idx[1]));
        assert_eq!(by_rows.element(&idx), Some(expected));
        assert_eq!(by_cols.element(&idx), Some(expected));
    }
    assert_eq!(by_rows.element(&[3, 0]), None);
}

#[test]
fn test_set_data_too_small() {
    let mut file = memory();
    file.add_dataset("a", &[4], DataType::Int32, Flags::default()).expect("add");
    let err = file.set_data("a", vec![0; 3]).expect_err("short");
    assert!(matches!(err, Error::BufferTooSmall { needed: 16, available: 3 }));
    assert!(file.get_dataset("a").expect("a").data().is_none());
}

#[test]
fn test_complex_scalar_and_string() {
    let mut file = memory();
    let z = [Complex64::new(1.5, -2.0), Complex64::new(0.0, 3.25)];
    file.add_dataset("z", &[2], DataType::ComplexDouble, Flags::default()).expect("add");
    file.add_dataset("pi", &[], DataType::Float64, Flags::default()).expect("add");
    file.add_dataset("title", &[8], DataType::Char, Flags::default()).expect("add");
    file.write_headers().expect("headers");
    file.write_data_as("z", &z).expect("z");
    file.write_data_as("pi", &[std::f64::consts::PI]).expect("pi");
    file.write_data("title", b"hello\0\0\0").expect("title");

    let mut file = reopen(file);
    assert_eq!(file.read_data_as::<Complex64>("z").expect("z"), z);
    assert_eq!(file.read_data_as::<f64>("pi").expect("pi"), vec![std::f64::consts::PI]);
    assert_eq!(file.read_string("title").expect("title"), "hello");
    assert_eq!(file.read_data_as::<u8>("title").expect("bytes").len(), 8);
    assert!(matches!(file.read_string("pi"), Err(Error::TypeMismatch { .. })));

    let loaded = file.load("pi").expect("load");
    assert_eq!(loaded.element(&[]), Some(Value::Float64(std::f64::consts::PI)));
}

#[test]
fn test_duplicate_name_last_wins() {
    let mut file = memory();
    file.add_dataset("dup", &[1], DataType::Byte, Flags::default()).expect("add");
    file.add_dataset("dup", &[2], DataType::Int32, Flags::default()).expect("add");
    assert_eq!(file.n_datasets(), 2);
    let found = file.get_dataset("dup").expect("dup");
    assert_eq!(found.data_type(), DataType::Int32);
    assert_eq!(found.offset(), file.datasets()[1].offset());
}

#[test]
fn test_custom_limits() {
    init();
    let limits = Limits {
        max_dim: 3,
        max_datasets: 2,
        name_length: 8,
    };
    let mut file = SbfFile::new(Cursor::new(Vec::new()), limits).expect("valid limits");
    let i = file
        .add_dataset("a_rather_long_name", &[2, 2, 2], DataType::Byte, Flags::default())
        .expect("add");
    assert_eq!(file.datasets()[i].name(), "a_rather");
    assert_eq!(file.datasets()[i].offset(), 7 + (8 + 2 + 24));
    assert!(matches!(
        file.add_dataset("b", &[1, 1, 1, 1], DataType::Byte, Flags::default()),
        Err(Error::InvalidShape(_))
    ));
    file.write_headers().expect("write");

    let bytes = file.into_inner().expect("open").into_inner();
    assert_eq!(bytes.len(), 7 + 34);
    let mut file = SbfFile::new(Cursor::new(bytes), limits).expect("limits");
    file.read_headers().expect("read");
    assert!(file.get_dataset("a_rather").is_some());
}

#[test]
fn test_invalid_limits() {
    let limits = Limits {
        max_dim: 16,
        ..Limits::default()
    };
    assert!(matches!(
        SbfFile::new(Cursor::new(Vec::<u8>::new()), limits),
        Err(Error::InvalidConfig(_))
    ));
}

#[test]
fn test_overflowing_shape_rejected() {
    let mut file = memory();
    let err = file
        .add_dataset("big", &[u64::MAX, 2], DataType::Int32, Flags::default())
        .expect_err("element count overflows");
    assert!(matches!(err, Error::InvalidShape(_)));
    let err = file
        .add_dataset("big", &[1 << 62, 8], DataType::Int64, Flags::default())
        .expect_err("byte size overflows");
    assert!(matches!(err, Error::InvalidShape(_)));
    assert_eq!(file.n_datasets(), 0);
    assert!(file.is_open());
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_offsets_past_end_rejected() {
    let mut file = memory();
    for name in ["a", "b", "c"] {
        file.add_dataset(name, &[1 << 62], DataType::Byte, Flags::default())
            .expect("each block fits");
    }
    let err = file
        .add_dataset("d", &[1 << 62], DataType::Byte, Flags::default())
        .expect_err("total overflows");
    assert!(matches!(err, Error::InvalidShape(_)));
    assert_eq!(file.n_datasets(), 3);
    assert!(file.get_dataset("d").is_none());
    let region = file.header_region_size();
    assert_eq!(file.datasets()[2].offset(), region + (2 << 62));
}

#[test]
fn test_overflowing_header_closes_stream() {
    init();
    let bytes = single_header(DataType::Int64, &[1 << 62, 8]);
    assert_eq!(bytes.len(), 7 + 128);
    let mut file = SbfFile::new(Cursor::new(bytes), Limits::default()).expect("limits");
    let err = file.read_headers().expect_err("overflowing shape");
    assert!(matches!(err, Error::InvalidShape(_)));
    assert!(!file.is_open());
    assert_eq!(file.n_datasets(), 0);
}

#[cfg(target_pointer_width = "64")]
#[test]
fn test_declared_block_beyond_stream() {
    init();
    let bytes = single_header(DataType::Byte, &[1 << 40]);
    let mut file = SbfFile::new(Cursor::new(bytes), Limits::default()).expect("limits");
    file.read_headers().expect("header is valid");
    let err = file.read_data_as::<u8>("big").expect_err("no data");
    assert!(matches!(err, Error::ReadFailure(ref e) if e.kind() == io::ErrorKind::UnexpectedEof));
    assert!(!file.is_open());
}

#[test]
fn test_failed_header_write_closes_stream() {
    init();
    let mut file = SbfFile::new(FailingWriter::new(50), Limits::default()).expect("limits");
    file.add_dataset("a", &[4], DataType::Int32, Flags::default()).expect("add");
    let err = file.write_headers().expect_err("budget too small");
    assert!(matches!(err, Error::WriteFailure(ref e) if e.kind() == io::ErrorKind::WriteZero));
    assert!(err.is_io());
    assert!(!file.is_open());

    let err = file.write_data("a", &[0; 16]).expect_err("closed");
    assert!(matches!(err, Error::Closed));
    assert!(file.into_inner().is_none());
}

#[test]
fn test_failed_data_write_closes_stream() {
    init();
    let region = 7 + 2 * 128;
    let mut file = SbfFile::new(FailingWriter::new(region + 10), Limits::default())
        .expect("limits");
    file.add_dataset("a", &[4], DataType::Int32, Flags::default()).expect("add");
    file.add_dataset("b", &[4], DataType::Int32, Flags::default()).expect("add");
    file.write_headers().expect("headers fit");
    assert!(file.is_open());

    let err = file.write_data_as("a", &[1i32, 2, 3, 4]).expect_err("data does not fit");
    assert!(matches!(err, Error::WriteFailure(_)));
    assert!(!file.is_open());
    let err = file.write_data_as("b", &[5i32, 6, 7, 8]).expect_err("closed");
    assert!(matches!(err, Error::Closed));
    // the catalog itself survives the failure
    assert_eq!(file.n_datasets(), 2);
}
