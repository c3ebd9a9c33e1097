//! Plain-text rendering of dataset headers and contents.

use crate::element::Value;
use crate::header::DatasetHeader;
use crate::types::DataType;

/// Multi-line summary of a dataset header.
pub fn describe(header: &DatasetHeader) -> String {
    let shape: Vec<String> = header.shape.iter().map(u64::to_string).collect();
    format!(
        "dataset:\t\t'{}'\n\
         dtype:\t\t\t{}\n\
         dtype size:\t\t{} bit\n\
         flags:\t\t\t{:08b}\n\
         dimensions:\t\t{}\n\
         shape:\t\t\t[{}]\n\
         storage:\t\t{} major\n\
         endianness:\t\t{} endian\n",
        header.name,
        header.data_type,
        header.data_type.size() * 8,
        header.flags.bits(),
        header.dimensions(),
        shape.join(", "),
        if header.is_column_major() { "column" } else { "row" },
        if header.flags.is_big_endian() { "big" } else { "little" },
    )
}

/// Render the contents of a data block.
///
/// Scalars take one line and vectors one element per line. Higher ranks print
/// one row of the last dimension per line, with a `i, j, :, :` banner before
/// each trailing 2-D slab.
pub fn render(header: &DatasetHeader, data: &[u8]) -> crate::Result<String> {
    let layout = header.layout();
    let needed = usize::try_from(layout.byte_len()).unwrap_or(usize::MAX);
    if data.len() < needed {
        return Err(crate::Error::BufferTooSmall {
            needed,
            available: data.len(),
        });
    }
    let size = header.data_type.size();
    let value_at = |idx: &[u64]| {
        let start = layout.offset(idx) as usize;
        Value::decode(header.data_type, &data[start..start + size])
    };

    let ndim = header.dimensions();
    let mut out = String::new();
    if ndim == 1 && header.data_type == DataType::Char {
        out.push_str(&crate::header::decode_name(&data[..needed]));
        out.push('\n');
        return Ok(out);
    }
    if ndim <= 1 {
        for idx in layout.indices() {
            out.push_str(&value_at(&idx).to_string());
            out.push('\n');
        }
        return Ok(out);
    }

    let row_len = header.shape[ndim - 1];
    for idx in layout.indices() {
        let col = idx[ndim - 1];
        if ndim > 2 && col == 0 && idx[ndim - 2] == 0 {
            let outer: Vec<String> = idx[..ndim - 2].iter().map(u64::to_string).collect();
            out.push_str(&format!("{}, :, :\n", outer.join(", ")));
        }
        if col > 0 {
            out.push(' ');
        }
        out.push_str(&value_at(&idx).to_string());
        if col + 1 == row_len {
            out.push('\n');
        }
    }
    Ok(out)
}
