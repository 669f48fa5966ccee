use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Dataset error types
#[derive(Error, Debug)]
pub enum VerthashError {
    #[error("Failed to read dataset file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write dataset file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Dataset file {path} is too small ({size} bytes)")]
    TooSmall { path: PathBuf, size: u64 },

    #[error("Dataset file {path} is not {alignment}-byte aligned")]
    Misaligned { path: PathBuf, alignment: usize },
}

pub type Result<T> = std::result::Result<T, VerthashError>;
