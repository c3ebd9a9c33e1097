use serde::{Deserialize, Serialize};

/// Element type of a dataset, stored as a single tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum DataType {
    Byte = 0,
    Int32 = 1,
    Int64 = 2,
    Float32 = 3,
    Float64 = 4,
    ComplexFloat = 5,
    ComplexDouble = 6,
    Char = 7,
}

impl DataType {
    pub const ALL: [DataType; 8] = [
        DataType::Byte,
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::ComplexFloat,
        DataType::ComplexDouble,
        DataType::Char,
    ];

    /// Width of one element in bytes.
    pub const fn size(self) -> usize {
        match self {
            DataType::Byte | DataType::Char => 1,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 | DataType::ComplexFloat => 8,
            DataType::ComplexDouble => 16,
        }
    }

    pub const fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> crate::Result<Self> {
        Self::ALL
            .get(tag as usize)
            .copied()
            .ok_or(crate::Error::UnknownDataType(tag))
    }

    pub const fn name(self) -> &'static str {
        match self {
            DataType::Byte => "sbf_byte",
            DataType::Int32 => "sbf_integer",
            DataType::Int64 => "sbf_long",
            DataType::Float32 => "sbf_float",
            DataType::Float64 => "sbf_double",
            DataType::ComplexFloat => "sbf_complex_float",
            DataType::ComplexDouble => "sbf_complex_double",
            DataType::Char => "sbf_char",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-dataset flag byte.
///
/// Bits 0-3 hold the dimension count, bit 6 marks column-major storage and
/// bit 7 records a big-endian writer. Bits 4 and 5 are unused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Flags(pub u8);

impl Flags {
    pub const DIMENSION_BITS: u8 = 0b0000_1111;
    pub const COLUMN_MAJOR: u8 = 0b0100_0000;
    pub const BIG_ENDIAN: u8 = 0b1000_0000;

    pub fn new(dimensions: u8, column_major: bool) -> Self {
        let mut flags = Self::default();
        flags.set_dimensions(dimensions);
        flags.set_column_major(column_major);
        flags
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn dimensions(self) -> u8 {
        self.0 & Self::DIMENSION_BITS
    }

    pub fn set_dimensions(&mut self, dimensions: u8) {
        self.0 = (self.0 & !Self::DIMENSION_BITS) | (dimensions & Self::DIMENSION_BITS);
    }

    pub fn is_column_major(self) -> bool {
        self.0 & Self::COLUMN_MAJOR != 0
    }

    pub fn set_column_major(&mut self, column_major: bool) {
        self.set_bit(Self::COLUMN_MAJOR, column_major);
    }

    /// Informational only; data is never byte-swapped.
    pub fn is_big_endian(self) -> bool {
        self.0 & Self::BIG_ENDIAN != 0
    }

    pub fn set_big_endian(&mut self, big_endian: bool) {
        self.set_bit(Self::BIG_ENDIAN, big_endian);
    }

    /// Marker matching the byte order of this host.
    pub fn with_native_endianness(mut self) -> Self {
        self.set_big_endian(cfg!(target_endian = "big"));
        self
    }

    fn set_bit(&mut self, mask: u8, value: bool) {
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }
}
