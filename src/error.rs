use std::path::PathBuf;

use crate::types::DataType;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open {}: {source}", path.display())]
    OpenFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not close stream: {0}")]
    CloseFailure(#[source] std::io::Error),
    #[error("read failed: {0}")]
    ReadFailure(#[source] std::io::Error),
    #[error("write failed: {0}")]
    WriteFailure(#[source] std::io::Error),
    #[error("not an SBF stream (token {found:?})")]
    FormatMismatch { found: [u8; 3] },
    #[error("unknown data type tag {0}")]
    UnknownDataType(u8),
    #[error("{count} datasets exceeds the maximum of {max}")]
    TooManyDatasets { count: usize, max: usize },
    #[error("invalid shape: {0}")]
    InvalidShape(String),
    #[error("no dataset named {0:?}")]
    NotFound(String),
    #[error("dataset holds {found:?}, requested {expected:?}")]
    TypeMismatch { expected: DataType, found: DataType },
    #[error("buffer holds {available} bytes, {needed} required")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("stream is closed")]
    Closed,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_shape(message: impl Into<String>) -> Self {
        Self::InvalidShape(message.into())
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Whether this error came from the underlying stream.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::OpenFailure { .. }
                | Self::CloseFailure(_)
                | Self::ReadFailure(_)
                | Self::WriteFailure(_)
        )
    }
}
