//! Verthash dataset lifecycle.
//!
//! Startup generates the dataset file when asked, loads it into the
//! process-wide [`DatasetManager`], and exposes the loaded region to the
//! GPU uploaders and the CPU verifier.

mod config;
pub mod core;
mod dataset;
mod generate;

pub use config::VerthashConfig;
pub use dataset::{DatasetInfo, DatasetManager};
pub use generate::{generate_data_file, DATA_FILE_SIZE};

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::info;

/// Default dataset file name.
pub const DEFAULT_DATA_FILE: &str = "verthash.dat";

/// Startup entry point: optionally synthesize the dataset file, then
/// load it into the process-wide manager. Mining cannot start when this
/// fails.
pub fn init(config: &VerthashConfig) -> Result<()> {
    if let Some(gen_path) = config.gen_data_file.as_deref() {
        info!(target: "cpu", "Generating Verthash data file: {}", gen_path);
        info!(target: "cpu", "This may take 30-60 minutes...");

        let start = Instant::now();
        generate_data_file(Path::new(gen_path))
            .with_context(|| format!("failed to generate Verthash data file {gen_path}"))?;

        info!(
            target: "cpu",
            "Verthash data file generated in {} seconds",
            start.elapsed().as_secs()
        );

        // No explicit data file means mine straight off the generated
        // one.
        if config.data_file.is_none() {
            return load(gen_path);
        }
    }

    load(config.data_file.as_deref().unwrap_or(DEFAULT_DATA_FILE))
}

fn load(data_file: &str) -> Result<()> {
    info!(target: "cpu", "Loading Verthash data file: {}", data_file);

    let start = Instant::now();
    DatasetManager::global()
        .init(Path::new(data_file))
        .with_context(|| format!("failed to load Verthash data file {data_file}"))?;

    info!(
        target: "cpu",
        "Verthash data file loaded: {} MB ({}ms)",
        DatasetManager::global().size() / (1024 * 1024),
        start.elapsed().as_millis()
    );

    Ok(())
}

/// Release the process-wide dataset.
pub fn destroy() {
    DatasetManager::global().release();
}

pub fn is_ready() -> bool {
    DatasetManager::global().is_valid()
}

/// Path of the currently loaded dataset file, if any.
pub fn data_file() -> Option<PathBuf> {
    DatasetManager::global().path()
}
