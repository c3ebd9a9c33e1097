//! Fixed-layout file and dataset headers.
//!
//! Every field is written on its own, in declaration order, so the wire
//! size is the sum of the field sizes. Integers use the host byte order.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;

use crate::config::Limits;
use crate::layout::Layout;
use crate::types::{DataType, Flags};

pub const MAGIC: [u8; 3] = *b"SBF";
pub const VERSION: [u8; 3] = *b"020";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: [u8; 3],
    pub dataset_count: u8,
}

impl FileHeader {
    pub const SIZE: usize = MAGIC.len() + VERSION.len() + size_of::<u8>();

    pub fn new(dataset_count: u8) -> Self {
        Self {
            version: VERSION,
            dataset_count,
        }
    }

    pub fn to_bytes(&self) -> [u8; FileHeader::SIZE] {
        let mut out = [0u8; FileHeader::SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(&MAGIC);
        buf.put_slice(&self.version);
        buf.put_u8(self.dataset_count);
        out
    }

    /// Only the magic token is checked; any version is accepted.
    pub fn from_bytes(bytes: &[u8]) -> crate::Result<Self> {
        ensure_len(bytes, Self::SIZE)?;
        let mut buf = bytes;
        let mut token = [0u8; 3];
        buf.copy_to_slice(&mut token);
        if token != MAGIC {
            return Err(crate::Error::FormatMismatch { found: token });
        }
        let mut version = [0u8; 3];
        buf.copy_to_slice(&mut version);
        if version != VERSION {
            log::debug!(
                "reading SBF version {:?}, written by {:?}",
                String::from_utf8_lossy(&version),
                String::from_utf8_lossy(&VERSION)
            );
        }
        let dataset_count = buf.get_u8();
        Ok(Self {
            version,
            dataset_count,
        })
    }
}

/// Description of one dataset: everything but its data.
///
/// `shape` holds the active dimensions only; an empty shape is a scalar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetHeader {
    pub name: String,
    pub flags: Flags,
    pub data_type: DataType,
    pub shape: Vec<u64>,
}

impl DatasetHeader {
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        shape: Vec<u64>,
        flags: Flags,
    ) -> Self {
        let mut flags = flags;
        flags.set_dimensions(shape.len() as u8);
        Self {
            name: name.into(),
            flags,
            data_type,
            shape,
        }
    }

    /// Encoded size for the given limits.
    pub fn size_on_disk(limits: &Limits) -> usize {
        limits.name_length
            + size_of::<u8>()
            + size_of::<u8>()
            + limits.max_dim * size_of::<u64>()
    }

    pub fn to_bytes(&self, limits: &Limits) -> crate::Result<Bytes> {
        check_shape(&self.shape, self.data_type, limits)?;
        let mut flags = self.flags;
        flags.set_dimensions(self.shape.len() as u8);

        let mut buf = BytesMut::with_capacity(Self::size_on_disk(limits));
        buf.put_slice(&encode_name(&self.name, limits.name_length));
        buf.put_u8(flags.bits());
        buf.put_u8(self.data_type.tag());
        for k in 0..limits.max_dim {
            buf.put_u64_ne(self.shape.get(k).copied().unwrap_or(0));
        }
        Ok(buf.freeze())
    }

    pub fn from_bytes(bytes: &[u8], limits: &Limits) -> crate::Result<Self> {
        ensure_len(bytes, Self::size_on_disk(limits))?;
        let mut buf = bytes;

        let name = decode_name(&buf[..limits.name_length]);
        buf.advance(limits.name_length);
        let flags = Flags(buf.get_u8());
        let data_type = DataType::from_tag(buf.get_u8())?;

        let ndim = flags.dimensions() as usize;
        if ndim > limits.max_dim {
            return Err(crate::Error::invalid_shape(format!(
                "dataset {name:?} declares {ndim} dimensions, maximum is {}",
                limits.max_dim
            )));
        }
        let mut shape = Vec::with_capacity(ndim);
        for k in 0..limits.max_dim {
            let extent = buf.get_u64_ne();
            if k < ndim {
                shape.push(extent);
            }
        }
        check_shape(&shape, data_type, limits)?;

        if flags.is_big_endian() != cfg!(target_endian = "big") {
            log::warn!("dataset {name:?} was written on a host of different endianness");
        }

        Ok(Self {
            name,
            flags,
            data_type,
            shape,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.shape.len()
    }

    pub fn is_column_major(&self) -> bool {
        self.flags.is_column_major()
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.shape.clone(), self.data_type.size(), self.is_column_major())
    }

    pub fn num_elements(&self) -> u64 {
        crate::layout::num_elements(&self.shape)
    }

    /// Size of the data block in bytes, saturating at `u64::MAX`.
    ///
    /// Headers accepted by the codec or the catalog never saturate.
    pub fn size(&self) -> u64 {
        self.num_elements()
            .saturating_mul(self.data_type.size() as u64)
    }
}

/// Reject shapes the header cannot describe and return the block size in bytes.
///
/// The block size must fit in both `u64` and `usize`.
pub(crate) fn check_shape(
    shape: &[u64],
    data_type: DataType,
    limits: &Limits,
) -> crate::Result<u64> {
    if shape.len() > limits.max_dim {
        return Err(crate::Error::invalid_shape(format!(
            "{} dimensions exceeds the maximum of {}",
            shape.len(),
            limits.max_dim
        )));
    }
    if let Some(k) = shape.iter().position(|&n| n == 0) {
        return Err(crate::Error::invalid_shape(format!(
            "dimension {k} of {shape:?} is zero"
        )));
    }
    let size = crate::layout::checked_num_elements(shape)
        .and_then(|n| n.checked_mul(data_type.size() as u64))
        .filter(|&size| usize::try_from(size).is_ok())
        .ok_or_else(|| {
            crate::Error::invalid_shape(format!(
                "{shape:?} elements of {data_type} overflow the addressable size"
            ))
        })?;
    Ok(size)
}

/// NUL-padded name field. Longer names are cut at `capacity` bytes.
pub fn encode_name(name: &str, capacity: usize) -> Vec<u8> {
    let mut out = vec![0u8; capacity];
    let len = name.len().min(capacity);
    out[..len].copy_from_slice(&name.as_bytes()[..len]);
    out
}

/// Inverse of [encode_name]: everything up to the first NUL.
///
/// Names containing a NUL byte therefore cannot be stored.
pub fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// The name a reader will see after a round trip through the header.
pub fn normalize_name(name: &str, capacity: usize) -> String {
    decode_name(&encode_name(name, capacity))
}

fn ensure_len(bytes: &[u8], needed: usize) -> crate::Result<()> {
    if bytes.len() < needed {
        return Err(crate::Error::ReadFailure(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("header needs {needed} bytes, got {}", bytes.len()),
        )));
    }
    Ok(())
}
