use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::types::Flags;

/// Format limits shared by the reader and the writer.
///
/// These fix the size of every dataset header, so a file can only be read
/// back with the limits it was written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Maximum number of active dimensions per dataset.
    pub max_dim: usize,
    /// Maximum number of datasets per file.
    pub max_datasets: usize,
    /// Capacity of the NUL-padded name field, in bytes.
    pub name_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_dim: 8,
            max_datasets: 16,
            name_length: 62,
        }
    }
}

impl Limits {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_dim == 0 || self.max_dim > Flags::DIMENSION_BITS as usize {
            return Err(crate::Error::invalid_config(format!(
                "max_dim must be in 1..={}, got {}",
                Flags::DIMENSION_BITS,
                self.max_dim
            )));
        }
        if self.max_datasets == 0 || self.max_datasets > u8::MAX as usize {
            return Err(crate::Error::invalid_config(format!(
                "max_datasets must be in 1..={}, got {}",
                u8::MAX,
                self.max_datasets
            )));
        }
        if self.name_length == 0 {
            return Err(crate::Error::invalid_config("name_length must be positive"));
        }
        Ok(())
    }
}

/// Options for the structural diff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffOptions {
    /// Absolute tolerance for real floating point elements.
    pub epsilon: f64,
    /// Log every mismatch with its coordinates.
    pub report_mismatches: bool,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            report_mismatches: true,
        }
    }
}

impl DiffOptions {
    /// The tolerance must be a non-negative number; infinity accepts any finite pair.
    pub fn validate(&self) -> crate::Result<()> {
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(crate::Error::invalid_config(format!(
                "epsilon must be non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub limits: Limits,
    pub diff: DiffOptions,
}

impl Config {
    pub fn from_json_str(s: &str) -> crate::Result<Self> {
        let config: Config = serde_json::from_str(s)?;
        config.limits.validate()?;
        config.diff.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| crate::Error::OpenFailure {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&s)
    }
}
