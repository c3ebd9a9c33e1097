//! The dataset catalog: headers, data offsets and block I/O for one stream.
//!
//! Any I/O failure releases the stream. Later operations on the same
//! [SbfFile] report [Error::Closed](crate::Error::Closed); reopen to retry.

use std::collections::HashMap;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{BufMut, BytesMut};

use crate::config::Limits;
use crate::element::{self, Element, Value};
use crate::header::{DatasetHeader, FileHeader, check_shape, normalize_name};
use crate::layout::Layout;
use crate::types::{DataType, Flags};
use crate::{Error, Result};

/// Size of the file header plus `n_datasets` dataset headers.
pub fn header_region_size(limits: &Limits, n_datasets: usize) -> u64 {
    (FileHeader::SIZE + n_datasets * DatasetHeader::size_on_disk(limits)) as u64
}

/// Absolute offsets of consecutive data blocks following the header region.
///
/// This is the only place offsets are derived; reading and writing both use it.
/// Fails with [Error::InvalidShape] when the blocks run past `u64::MAX`.
pub fn data_offsets<'a>(
    limits: &Limits,
    headers: impl IntoIterator<Item = &'a DatasetHeader>,
) -> Result<Vec<u64>> {
    let sizes: Vec<u64> = headers.into_iter().map(DatasetHeader::size).collect();
    let mut next = header_region_size(limits, sizes.len());
    let mut offsets = Vec::with_capacity(sizes.len());
    for size in sizes {
        offsets.push(next);
        next = next.checked_add(size).ok_or_else(|| {
            Error::invalid_shape(format!(
                "data blocks of {} datasets overflow the file size",
                offsets.len()
            ))
        })?;
    }
    Ok(offsets)
}

/// A block size as a buffer length.
fn buffer_len(size: u64) -> Result<usize> {
    usize::try_from(size)
        .map_err(|_| Error::invalid_shape(format!("block of {size} bytes does not fit in memory")))
}

/// A dataset registered in an [SbfFile].
#[derive(Debug, Clone)]
pub struct Dataset {
    header: DatasetHeader,
    offset: u64,
    data: Option<Vec<u8>>,
}

impl Dataset {
    pub fn header(&self) -> &DatasetHeader {
        &self.header
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn data_type(&self) -> DataType {
        self.header.data_type
    }

    pub fn shape(&self) -> &[u64] {
        &self.header.shape
    }

    pub fn flags(&self) -> Flags {
        self.header.flags
    }

    /// Absolute position of the data block in the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the data block in bytes.
    pub fn size(&self) -> u64 {
        self.header.size()
    }

    pub fn layout(&self) -> Layout {
        self.header.layout()
    }

    /// The owned data block, once loaded or set.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    /// Random access into the owned data block.
    pub fn element(&self, idx: &[u64]) -> Option<Value> {
        let bytes = self.layout().element(self.data()?, idx)?;
        Some(Value::decode(self.data_type(), bytes))
    }
}

/// An SBF container over a seekable stream.
///
/// Datasets keep insertion order, which is also their order on disk.
pub struct SbfFile<S> {
    stream: Option<S>,
    limits: Limits,
    datasets: Vec<Dataset>,
    index: HashMap<String, usize>,
}

impl SbfFile<std::fs::File> {
    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>, limits: Limits) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::OpenFailure {
                path: path.to_path_buf(),
                source,
            })?;
        log::debug!("created {}", path.display());
        Self::new(file, limits)
    }

    /// Open an existing file and read its headers.
    pub fn open(path: impl AsRef<Path>, limits: Limits) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| Error::OpenFailure {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("opened {}", path.display());
        let mut sbf = Self::new(file, limits)?;
        sbf.read_headers()?;
        Ok(sbf)
    }
}

impl<S> SbfFile<S> {
    /// Wrap a stream with an empty catalog.
    pub fn new(stream: S, limits: Limits) -> Result<Self> {
        limits.validate()?;
        Ok(Self {
            stream: Some(stream),
            limits,
            datasets: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn n_datasets(&self) -> usize {
        self.datasets.len()
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn dataset(&self, index: usize) -> Option<&Dataset> {
        self.datasets.get(index)
    }

    /// Look up a dataset by name. With duplicate names the last one wins.
    pub fn get_dataset(&self, name: &str) -> Option<&Dataset> {
        self.index.get(name).map(|&i| &self.datasets[i])
    }

    pub fn header_region_size(&self) -> u64 {
        header_region_size(&self.limits, self.datasets.len())
    }

    /// Register a new dataset and return its index.
    ///
    /// The header region grows with every dataset, so data blocks should only
    /// be written once all datasets are registered. The dimension count and
    /// endianness bits of `flags` are set here; the majority bit is kept.
    pub fn add_dataset(
        &mut self,
        name: &str,
        shape: &[u64],
        data_type: DataType,
        flags: Flags,
    ) -> Result<usize> {
        if self.datasets.len() >= self.limits.max_datasets {
            return Err(Error::TooManyDatasets {
                count: self.datasets.len() + 1,
                max: self.limits.max_datasets,
            });
        }
        check_shape(shape, data_type, &self.limits)?;

        let name = normalize_name(name, self.limits.name_length);
        let header = DatasetHeader::new(
            name,
            data_type,
            shape.to_vec(),
            flags.with_native_endianness(),
        );
        log::debug!(
            "adding dataset {:?}: {} {:?}",
            header.name,
            header.data_type,
            header.shape
        );
        let offsets = data_offsets(
            &self.limits,
            self.datasets.iter().map(|d| &d.header).chain([&header]),
        )?;
        self.push(header);
        self.set_offsets(offsets);
        Ok(self.datasets.len() - 1)
    }

    /// Hand an owned data block to the catalog, to be written by `write`.
    pub fn set_data(&mut self, name: &str, data: Vec<u8>) -> Result<()> {
        let i = self.position(name)?;
        let needed = buffer_len(self.datasets[i].size())?;
        if data.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: data.len(),
            });
        }
        let mut data = data;
        data.truncate(needed);
        self.datasets[i].data = Some(data);
        Ok(())
    }

    /// Release the catalog and return the stream, if it is still open.
    pub fn into_inner(self) -> Option<S> {
        self.stream
    }

    fn push(&mut self, header: DatasetHeader) {
        let name = header.name.clone();
        self.datasets.push(Dataset {
            header,
            offset: 0,
            data: None,
        });
        if let Some(previous) = self.index.insert(name, self.datasets.len() - 1) {
            log::warn!(
                "dataset {:?} shadows an earlier dataset of the same name",
                self.datasets[previous].name()
            );
        }
    }

    fn set_offsets(&mut self, offsets: Vec<u64>) {
        debug_assert_eq!(offsets.len(), self.datasets.len());
        for (dataset, offset) in self.datasets.iter_mut().zip(offsets) {
            dataset.offset = offset;
        }
    }

    /// Index of the dataset that `name` resolves to.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.position_of(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn checked_type<T: Element>(&self, i: usize) -> Result<()> {
        let found = self.datasets[i].data_type();
        if T::accepts(found) {
            Ok(())
        } else {
            Err(Error::TypeMismatch {
                expected: T::DATA_TYPE,
                found,
            })
        }
    }

    /// Drop the stream after a failure and pass the error on.
    fn abort(&mut self, error: Error) -> Error {
        if self.stream.take().is_some() {
            log::error!("{error}; closing stream");
        }
        error
    }
}

impl<S: Write + Seek> SbfFile<S> {
    /// Write the file header and every dataset header at the start of the stream.
    pub fn write_headers(&mut self) -> Result<()> {
        let count = u8::try_from(self.datasets.len()).map_err(|_| Error::TooManyDatasets {
            count: self.datasets.len(),
            max: u8::MAX as usize,
        })?;
        let mut buf = BytesMut::with_capacity(buffer_len(self.header_region_size())?);
        buf.put_slice(&FileHeader::new(count).to_bytes());
        for dataset in &self.datasets {
            buf.put(dataset.header.to_bytes(&self.limits)?);
        }
        log::debug!("writing {} header bytes for {count} datasets", buf.len());
        self.write_at(0, &buf)
    }

    /// Write the data block of `name` from the start of `data`.
    pub fn write_data(&mut self, name: &str, data: &[u8]) -> Result<()> {
        let i = self.position(name)?;
        self.write_dataset(i, data)
    }

    /// Write the data block of the dataset at `index`.
    pub fn write_dataset(&mut self, index: usize, data: &[u8]) -> Result<()> {
        let dataset = self
            .datasets
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("#{index}")))?;
        let needed = buffer_len(dataset.size())?;
        if data.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: data.len(),
            });
        }
        let offset = dataset.offset;
        self.write_at(offset, &data[..needed])
    }

    pub fn write_data_as<T: Element>(&mut self, name: &str, values: &[T]) -> Result<()> {
        let i = self.position(name)?;
        self.checked_type::<T>(i)?;
        self.write_dataset(i, &element::to_bytes(values))
    }

    /// Write the headers followed by every data block held by the catalog.
    pub fn write(&mut self) -> Result<()> {
        self.write_headers()?;
        for i in 0..self.datasets.len() {
            let Some(data) = self.datasets[i].data.take() else {
                log::warn!("dataset {:?} has no data to write", self.datasets[i].name());
                continue;
            };
            let result = self.write_dataset(i, &data);
            self.datasets[i].data = Some(data);
            result?;
        }
        self.flush()
    }

    /// Flush and release the stream along with all owned data.
    pub fn close(mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        stream.flush().map_err(Error::CloseFailure)
    }

    fn flush(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        let result = stream.flush();
        result.map_err(|e| self.abort(Error::WriteFailure(e)))
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        let result = stream
            .seek(SeekFrom::Start(offset))
            .and_then(|_| stream.write_all(data));
        result.map_err(|e| self.abort(Error::WriteFailure(e)))
    }
}

impl<S: Read + Seek> SbfFile<S> {
    /// Replace the catalog with the headers stored at the start of the stream.
    pub fn read_headers(&mut self) -> Result<()> {
        let result = self.try_read_headers();
        result.map_err(|e| self.abort(e))
    }

    fn try_read_headers(&mut self) -> Result<()> {
        let mut raw = [0u8; FileHeader::SIZE];
        self.read_at(0, &mut raw)?;
        let file_header = FileHeader::from_bytes(&raw)?;
        let count = file_header.dataset_count as usize;
        if count > self.limits.max_datasets {
            return Err(Error::TooManyDatasets {
                count,
                max: self.limits.max_datasets,
            });
        }

        let header_size = DatasetHeader::size_on_disk(&self.limits);
        let mut raw = vec![0u8; count * header_size];
        self.read_at(FileHeader::SIZE as u64, &mut raw)?;
        let headers = raw
            .chunks_exact(header_size)
            .map(|chunk| DatasetHeader::from_bytes(chunk, &self.limits))
            .collect::<Result<Vec<_>>>()?;
        let offsets = data_offsets(&self.limits, &headers)?;

        self.datasets.clear();
        self.index.clear();
        for header in headers {
            self.push(header);
        }
        self.set_offsets(offsets);
        log::debug!("read headers for {count} datasets");
        Ok(())
    }

    /// Read the data block of `name` into the start of `out`.
    pub fn read_data(&mut self, name: &str, out: &mut [u8]) -> Result<()> {
        let i = self.position(name)?;
        self.read_dataset(i, out)
    }

    /// Read the data block of the dataset at `index` into the start of `out`.
    pub fn read_dataset(&mut self, index: usize, out: &mut [u8]) -> Result<()> {
        let dataset = self
            .datasets
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("#{index}")))?;
        let needed = buffer_len(dataset.size())?;
        if out.len() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }
        let offset = dataset.offset;
        self.read_at(offset, &mut out[..needed])
    }

    /// Read the data block of the dataset at `index` into a new buffer.
    ///
    /// The buffer grows with the bytes actually read, so a header declaring more
    /// data than the stream holds fails without allocating the declared size.
    pub fn read_dataset_to_vec(&mut self, index: usize) -> Result<Vec<u8>> {
        let dataset = self
            .datasets
            .get(index)
            .ok_or_else(|| Error::NotFound(format!("#{index}")))?;
        let (offset, size) = (dataset.offset, dataset.size());
        let needed = buffer_len(size)?;

        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        let mut out = Vec::new();
        let result = stream.seek(SeekFrom::Start(offset)).and_then(|_| {
            stream.by_ref().take(size).read_to_end(&mut out)?;
            if out.len() < needed {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("data block needs {needed} bytes, stream holds {}", out.len()),
                ));
            }
            Ok(())
        });
        result.map_err(|e| self.abort(Error::ReadFailure(e)))?;
        Ok(out)
    }

    pub fn read_data_as<T: Element>(&mut self, name: &str) -> Result<Vec<T>> {
        let i = self.position(name)?;
        self.checked_type::<T>(i)?;
        let bytes = self.read_dataset_to_vec(i)?;
        Ok(element::from_bytes(&bytes))
    }

    /// Read a one-dimensional character dataset as text, up to the first NUL.
    pub fn read_string(&mut self, name: &str) -> Result<String> {
        let i = self.position(name)?;
        let dataset = &self.datasets[i];
        if dataset.data_type() != DataType::Char {
            return Err(Error::TypeMismatch {
                expected: DataType::Char,
                found: dataset.data_type(),
            });
        }
        if dataset.shape().len() != 1 {
            return Err(Error::invalid_shape(format!(
                "string dataset {name:?} must be one-dimensional, has shape {:?}",
                dataset.shape()
            )));
        }
        let bytes = self.read_dataset_to_vec(i)?;
        Ok(crate::header::decode_name(&bytes))
    }

    /// Read the data block of `name` into a buffer owned by the catalog.
    pub fn load(&mut self, name: &str) -> Result<&Dataset> {
        let i = self.position(name)?;
        self.load_dataset(i)?;
        Ok(&self.datasets[i])
    }

    pub fn load_all(&mut self) -> Result<()> {
        (0..self.datasets.len()).try_for_each(|i| self.load_dataset(i))
    }

    fn load_dataset(&mut self, index: usize) -> Result<()> {
        if self.datasets[index].data.is_none() {
            let data = self.read_dataset_to_vec(index)?;
            self.datasets[index].data = Some(data);
        }
        Ok(())
    }

    fn read_at(&mut self, offset: u64, out: &mut [u8]) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::Closed)?;
        let result = stream
            .seek(SeekFrom::Start(offset))
            .and_then(|_| stream.read_exact(out));
        result.map_err(|e| self.abort(Error::ReadFailure(e)))
    }
}
