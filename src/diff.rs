//! Structural and element-wise comparison of datasets and files.

use std::fmt;
use std::io::{Read, Seek};

use crate::config::DiffOptions;
use crate::element::Value;
use crate::file::SbfFile;
use crate::header::DatasetHeader;
use crate::types::DataType;

/// One unit of difference.
#[derive(Debug, Clone, PartialEq)]
pub enum Mismatch {
    DatasetCount { a: usize, b: usize },
    Missing { name: String },
    Dimensions { name: String, a: usize, b: usize },
    DataType { name: String, a: DataType, b: DataType },
    Shape { name: String, a: Vec<u64>, b: Vec<u64> },
    Element { name: String, index: Vec<u64>, a: Value, b: Value },
}

impl Mismatch {
    /// Whether this is a schema difference rather than a value difference.
    pub fn is_structural(&self) -> bool {
        !matches!(self, Mismatch::Element { .. })
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::DatasetCount { a, b } => write!(f, "dataset count: {a} != {b}"),
            Mismatch::Missing { name } => write!(f, "{name:?}: missing from one file"),
            Mismatch::Dimensions { name, a, b } => write!(f, "{name:?}: dimensions {a} != {b}"),
            Mismatch::DataType { name, a, b } => write!(f, "{name:?}: dtype {a} != {b}"),
            Mismatch::Shape { name, a, b } => write!(f, "{name:?}: shape {a:?} != {b:?}"),
            Mismatch::Element { name, index, a, b } => {
                write!(
                    f,
                    "{name:?}{index:?}: {} != {}",
                    a.to_string().trim(),
                    b.to_string().trim()
                )
            }
        }
    }
}

/// Compare two datasets given their data blocks.
///
/// Differences in dimension count, data type and shape each count once and
/// skip the element comparison. Otherwise every element is compared, with
/// each side addressed through its own majority.
pub fn diff_datasets(
    a: &DatasetHeader,
    a_data: &[u8],
    b: &DatasetHeader,
    b_data: &[u8],
    options: &DiffOptions,
) -> crate::Result<Vec<Mismatch>> {
    let name = &a.name;
    let mut mismatches = Vec::new();
    if a.dimensions() != b.dimensions() {
        mismatches.push(Mismatch::Dimensions {
            name: name.clone(),
            a: a.dimensions(),
            b: b.dimensions(),
        });
    }
    if a.data_type != b.data_type {
        mismatches.push(Mismatch::DataType {
            name: name.clone(),
            a: a.data_type,
            b: b.data_type,
        });
    }
    if a.shape != b.shape {
        mismatches.push(Mismatch::Shape {
            name: name.clone(),
            a: a.shape.clone(),
            b: b.shape.clone(),
        });
    }
    if !mismatches.is_empty() {
        report(&mismatches, options);
        return Ok(mismatches);
    }

    let a_layout = a.layout();
    let b_layout = b.layout();
    check_len(a_data, a_layout.byte_len())?;
    check_len(b_data, b_layout.byte_len())?;

    let size = a.data_type.size();
    for index in a_layout.indices() {
        let a_start = a_layout.offset(&index) as usize;
        let b_start = b_layout.offset(&index) as usize;
        let x = Value::decode(a.data_type, &a_data[a_start..a_start + size]);
        let y = Value::decode(b.data_type, &b_data[b_start..b_start + size]);
        if !x.matches(&y, options.epsilon) {
            mismatches.push(Mismatch::Element {
                name: name.clone(),
                index,
                a: x,
                b: y,
            });
        }
    }
    report(&mismatches, options);
    Ok(mismatches)
}

/// Compare every dataset of two files by name.
///
/// A differing dataset count counts once. Each dataset of the file with fewer
/// datasets (the first on a tie) is compared with the dataset its name resolves
/// to in the other file, so every entry is visited once even when names repeat.
pub fn diff_files<A, B>(
    a: &mut SbfFile<A>,
    b: &mut SbfFile<B>,
    options: &DiffOptions,
) -> crate::Result<Vec<Mismatch>>
where
    A: Read + Seek,
    B: Read + Seek,
{
    let mut mismatches = Vec::new();
    if a.n_datasets() != b.n_datasets() {
        let m = Mismatch::DatasetCount {
            a: a.n_datasets(),
            b: b.n_datasets(),
        };
        report(std::slice::from_ref(&m), options);
        mismatches.push(m);
    }

    let a_drives = a.n_datasets() <= b.n_datasets();
    let driving = a.n_datasets().min(b.n_datasets());
    for i in 0..driving {
        let (a_index, b_index) = if a_drives {
            (Some(i), b.position_of(a.datasets()[i].name()))
        } else {
            (a.position_of(b.datasets()[i].name()), Some(i))
        };
        let (Some(a_index), Some(b_index)) = (a_index, b_index) else {
            let name = if a_drives {
                a.datasets()[i].name()
            } else {
                b.datasets()[i].name()
            };
            let m = Mismatch::Missing {
                name: name.to_string(),
            };
            report(std::slice::from_ref(&m), options);
            mismatches.push(m);
            continue;
        };
        let a_header = a.datasets()[a_index].header().clone();
        let b_header = b.datasets()[b_index].header().clone();
        let a_data = read_block(a, a_index)?;
        let b_data = read_block(b, b_index)?;
        mismatches.extend(diff_datasets(&a_header, &a_data, &b_header, &b_data, options)?);
    }
    log::debug!("{} mismatches in total", mismatches.len());
    Ok(mismatches)
}

/// The loaded block if there is one, otherwise a fresh read.
fn read_block<S: Read + Seek>(file: &mut SbfFile<S>, index: usize) -> crate::Result<Vec<u8>> {
    match file.dataset(index).and_then(|d| d.data()) {
        Some(data) => Ok(data.to_vec()),
        None => file.read_dataset_to_vec(index),
    }
}

fn check_len(data: &[u8], needed: u64) -> crate::Result<()> {
    let needed = usize::try_from(needed).unwrap_or(usize::MAX);
    if data.len() < needed {
        return Err(crate::Error::BufferTooSmall {
            needed,
            available: data.len(),
        });
    }
    Ok(())
}

fn report(mismatches: &[Mismatch], options: &DiffOptions) {
    if options.report_mismatches {
        for m in mismatches {
            log::info!("{m}");
        }
    }
}
