//! VertMiner hash - Verthash dataset management and CPU hashing
//!
//! This crate owns the multi-gigabyte Verthash dataset consumed by every
//! worker: one-shot generation of the data file, a single guarded load
//! shared process-wide, and a CPU implementation of the hash for share
//! validation. The GPU runners upload the region through the manager's
//! accessors; reloads on a path change swap it atomically underneath
//! them.

pub mod error;
pub mod verthash;

// Re-export main types
pub use error::{Result, VerthashError};
pub use verthash::{
    generate_data_file, DatasetInfo, DatasetManager, VerthashConfig, DATA_FILE_SIZE,
    DEFAULT_DATA_FILE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
