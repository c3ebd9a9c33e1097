use num_complex::{Complex32, Complex64};

use crate::types::DataType;

/// A Rust type that can be stored as the elements of a dataset.
pub trait Element: Copy {
    const DATA_TYPE: DataType;

    /// Whether data stored as `data_type` can be viewed as `Self`.
    fn accepts(data_type: DataType) -> bool {
        data_type == Self::DATA_TYPE
    }

    /// Decode from exactly `DATA_TYPE.size()` native-endian bytes.
    fn from_ne_slice(bytes: &[u8]) -> Self;

    fn extend_ne(&self, out: &mut Vec<u8>);
}

macro_rules! impl_element {
    ($ty:ty, $dt:expr) => {
        impl Element for $ty {
            const DATA_TYPE: DataType = $dt;

            fn from_ne_slice(bytes: &[u8]) -> Self {
                let mut raw = [0u8; size_of::<$ty>()];
                raw.copy_from_slice(bytes);
                <$ty>::from_ne_bytes(raw)
            }

            fn extend_ne(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_ne_bytes());
            }
        }
    };
}

impl_element!(i32, DataType::Int32);
impl_element!(i64, DataType::Int64);
impl_element!(f32, DataType::Float32);
impl_element!(f64, DataType::Float64);

impl Element for u8 {
    const DATA_TYPE: DataType = DataType::Byte;

    fn accepts(data_type: DataType) -> bool {
        matches!(data_type, DataType::Byte | DataType::Char)
    }

    fn from_ne_slice(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn extend_ne(&self, out: &mut Vec<u8>) {
        out.push(*self);
    }
}

impl Element for Complex32 {
    const DATA_TYPE: DataType = DataType::ComplexFloat;

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let (re, im) = bytes.split_at(size_of::<f32>());
        Complex32::new(f32::from_ne_slice(re), f32::from_ne_slice(im))
    }

    fn extend_ne(&self, out: &mut Vec<u8>) {
        self.re.extend_ne(out);
        self.im.extend_ne(out);
    }
}

impl Element for Complex64 {
    const DATA_TYPE: DataType = DataType::ComplexDouble;

    fn from_ne_slice(bytes: &[u8]) -> Self {
        let (re, im) = bytes.split_at(size_of::<f64>());
        Complex64::new(f64::from_ne_slice(re), f64::from_ne_slice(im))
    }

    fn extend_ne(&self, out: &mut Vec<u8>) {
        self.re.extend_ne(out);
        self.im.extend_ne(out);
    }
}

/// Serialize a slice of elements into a raw data block.
pub fn to_bytes<T: Element>(values: &[T]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * T::DATA_TYPE.size());
    for v in values {
        v.extend_ne(&mut out);
    }
    out
}

/// Deserialize a raw data block. Trailing partial elements are ignored.
pub fn from_bytes<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::DATA_TYPE.size())
        .map(T::from_ne_slice)
        .collect()
}

/// One decoded element of any supported type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Byte(u8),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    ComplexFloat(Complex32),
    ComplexDouble(Complex64),
    Char(u8),
}

impl Value {
    /// Decode the element in `bytes`, which must hold `data_type.size()` bytes.
    pub fn decode(data_type: DataType, bytes: &[u8]) -> Self {
        match data_type {
            DataType::Byte => Value::Byte(u8::from_ne_slice(bytes)),
            DataType::Int32 => Value::Int32(i32::from_ne_slice(bytes)),
            DataType::Int64 => Value::Int64(i64::from_ne_slice(bytes)),
            DataType::Float32 => Value::Float32(f32::from_ne_slice(bytes)),
            DataType::Float64 => Value::Float64(f64::from_ne_slice(bytes)),
            DataType::ComplexFloat => Value::ComplexFloat(Complex32::from_ne_slice(bytes)),
            DataType::ComplexDouble => Value::ComplexDouble(Complex64::from_ne_slice(bytes)),
            DataType::Char => Value::Char(u8::from_ne_slice(bytes)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Byte(_) => DataType::Byte,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::ComplexFloat(_) => DataType::ComplexFloat,
            Value::ComplexDouble(_) => DataType::ComplexDouble,
            Value::Char(_) => DataType::Char,
        }
    }

    /// Element equality as used by the diff.
    ///
    /// Real floats match within `epsilon` (or when bitwise identical, so NaN
    /// matches itself). Complex parts must be bitwise identical. Everything
    /// else is exact. Values of different types never match.
    pub fn matches(&self, other: &Value, epsilon: f64) -> bool {
        match (self, other) {
            (Value::Byte(a), Value::Byte(b)) | (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float32(a), Value::Float32(b)) => {
                a.to_bits() == b.to_bits() || (f64::from(*a) - f64::from(*b)).abs() < epsilon
            }
            (Value::Float64(a), Value::Float64(b)) => {
                a.to_bits() == b.to_bits() || (a - b).abs() < epsilon
            }
            (Value::ComplexFloat(a), Value::ComplexFloat(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            (Value::ComplexDouble(a), Value::ComplexDouble(b)) => {
                a.re.to_bits() == b.re.to_bits() && a.im.to_bits() == b.im.to_bits()
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Byte(v) => write!(f, "{v:>4}"),
            Value::Int32(v) => write!(f, "{v:>11}"),
            Value::Int64(v) => write!(f, "{v:>20}"),
            Value::Float32(v) => write!(f, "{v:>10.3}"),
            Value::Float64(v) => write!(f, "{v:>10.3}"),
            Value::ComplexFloat(v) => write!(f, "{:>5.2}{:+5.2}i", v.re, v.im),
            Value::ComplexDouble(v) => write!(f, "{:>5.2}{:+5.2}i", v.re, v.im),
            Value::Char(v) => write!(f, "{}", char::from(*v)),
        }
    }
}
