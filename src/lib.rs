//! A simple binary format for named, typed, multi-dimensional arrays.
//!
//! A file is a fixed-size file header, one fixed-size header per dataset,
//! then the raw data blocks in the same order as the headers.

pub mod config;
pub mod diff;
pub mod dump;
pub mod element;
mod error;
pub mod file;
pub mod header;
pub mod layout;
pub mod types;

pub use config::{Config, DiffOptions, Limits};
pub use error::{Error, Result};
pub use file::{Dataset, SbfFile};
pub use types::{DataType, Flags};
