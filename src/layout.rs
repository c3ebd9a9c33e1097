//! Strided addressing of N-dimensional data blocks.

use std::iter::FusedIterator;

/// Number of elements described by `shape`. A scalar (empty shape) has one.
///
/// Saturates at `u64::MAX`; see [checked_num_elements].
pub fn num_elements(shape: &[u64]) -> u64 {
    shape.iter().fold(1, |acc: u64, &n| acc.saturating_mul(n))
}

/// Number of elements described by `shape`, or `None` if it overflows `u64`.
pub fn checked_num_elements(shape: &[u64]) -> Option<u64> {
    shape.iter().try_fold(1, |acc: u64, &n| acc.checked_mul(n))
}

/// Maps multi-indices of one dataset to byte offsets within its data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Vec<u64>,
    element_size: usize,
    column_major: bool,
    /// Byte stride of each dimension.
    strides: Vec<u64>,
}

impl Layout {
    pub fn new(shape: Vec<u64>, element_size: usize, column_major: bool) -> Self {
        let strides = strides(&shape, element_size, column_major);
        Self {
            shape,
            element_size,
            column_major,
            strides,
        }
    }

    pub fn shape(&self) -> &[u64] {
        &self.shape
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn is_column_major(&self) -> bool {
        self.column_major
    }

    pub fn strides(&self) -> &[u64] {
        &self.strides
    }

    pub fn num_elements(&self) -> u64 {
        num_elements(&self.shape)
    }

    /// Size of the whole block in bytes, saturating at `u64::MAX`.
    pub fn byte_len(&self) -> u64 {
        self.num_elements().saturating_mul(self.element_size as u64)
    }

    /// Byte offset of `idx`, which must have one entry per dimension.
    ///
    /// Indices are not bounds-checked; see [Layout::checked_offset].
    pub fn offset(&self, idx: &[u64]) -> u64 {
        debug_assert_eq!(idx.len(), self.shape.len(), "index rank");
        idx.iter()
            .zip(&self.strides)
            .fold(0, |acc: u64, (i, s)| acc.saturating_add(i.saturating_mul(*s)))
    }

    pub fn checked_offset(&self, idx: &[u64]) -> Option<u64> {
        if idx.len() != self.shape.len() || idx.iter().zip(&self.shape).any(|(i, n)| i >= n) {
            return None;
        }
        Some(self.offset(idx))
    }

    /// The bytes of the element at `idx`, if it lies within the layout and `data`.
    pub fn element<'a>(&self, data: &'a [u8], idx: &[u64]) -> Option<&'a [u8]> {
        let start = usize::try_from(self.checked_offset(idx)?).ok()?;
        data.get(start..start.checked_add(self.element_size)?)
    }

    /// Every multi-index of this layout, last dimension fastest.
    ///
    /// The order does not depend on the majority; only the offsets do.
    pub fn indices(&self) -> Indices {
        Indices::new(self.shape.clone())
    }
}

fn strides(shape: &[u64], element_size: usize, column_major: bool) -> Vec<u64> {
    let mut strides = vec![0; shape.len()];
    let mut acc = element_size as u64;
    if column_major {
        for (k, n) in shape.iter().enumerate() {
            strides[k] = acc;
            acc = acc.saturating_mul(*n);
        }
    } else {
        for (k, n) in shape.iter().enumerate().rev() {
            strides[k] = acc;
            acc = acc.saturating_mul(*n);
        }
    }
    strides
}

/// Odometer over all multi-indices of a shape.
///
/// The last index advances first and carries into the one before it when it
/// reaches its extent. Iteration stops after `num_elements(shape)` indices.
#[derive(Debug, Clone)]
pub struct Indices {
    shape: Vec<u64>,
    current: Vec<u64>,
    remaining: u64,
}

impl Indices {
    pub fn new(shape: Vec<u64>) -> Self {
        let remaining = num_elements(&shape);
        Self {
            current: vec![0; shape.len()],
            shape,
            remaining,
        }
    }

    fn advance(&mut self) {
        for k in (0..self.shape.len()).rev() {
            self.current[k] += 1;
            if self.current[k] < self.shape[k] {
                return;
            }
            self.current[k] = 0;
        }
    }
}

impl Iterator for Indices {
    type Item = Vec<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let out = self.current.clone();
        self.remaining -= 1;
        self.advance();
        Some(out)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

impl FusedIterator for Indices {}
