use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::error;

use crate::error::Result;

use super::core;

/// A loaded dataset: the byte region, its fast-index bitmask and the
/// file it came from. Immutable once published.
#[derive(Debug)]
pub struct DatasetInfo {
    data: Vec<u8>,
    bitmask: u32,
    path: PathBuf,
}

impl DatasetInfo {
    /// Raw bytes, e.g. for upload to a GPU buffer.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// `next_power_of_two(word_count) - 1`; consumers use it for cheap
    /// modular indexing.
    pub fn bitmask(&self) -> u32 {
        self.bitmask
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Process-wide owner of the Verthash dataset.
///
/// `init` and `release` serialize on an internal mutex; readers go
/// through `snapshot`, a release/acquire swap, so a published region is
/// always fully constructed. Hash batches should snapshot once, not once
/// per hash.
pub struct DatasetManager {
    guard: Mutex<()>,
    current: ArcSwapOption<DatasetInfo>,
}

static GLOBAL: Lazy<DatasetManager> = Lazy::new(DatasetManager::new);

impl DatasetManager {
    pub fn new() -> Self {
        Self {
            guard: Mutex::new(()),
            current: ArcSwapOption::const_empty(),
        }
    }

    /// Shared process-wide instance. The dataset is loaded once and
    /// outlives strategy and backend rebuilds.
    pub fn global() -> &'static DatasetManager {
        &GLOBAL
    }

    /// Load `path`, replacing any previously held region. Initializing
    /// again with the path already loaded is a no-op; a failed load
    /// leaves the manager empty.
    pub fn init(&self, path: &Path) -> Result<()> {
        let _guard = self.guard.lock();

        if let Some(current) = self.current.load_full() {
            if current.path() == path {
                return Ok(());
            }

            // Different file: release the old region before reading, two
            // regions at once would double peak memory.
            self.current.store(None);
        }

        match core::load_file(path) {
            Ok(data) => {
                let bitmask = core::bitmask_for_len(data.len() as u64);
                self.current.store(Some(Arc::new(DatasetInfo {
                    data,
                    bitmask,
                    path: path.to_path_buf(),
                })));
                Ok(())
            }
            Err(err) => {
                error!(target: "cpu", "dataset load failed: {}", err);
                self.current.store(None);
                Err(err)
            }
        }
    }

    /// Free the region and clear all state.
    pub fn release(&self) {
        let _guard = self.guard.lock();
        self.current.store(None);
    }

    /// Current region, if any. The returned handle keeps the region
    /// alive across a concurrent reload.
    pub fn snapshot(&self) -> Option<Arc<DatasetInfo>> {
        self.current.load_full()
    }

    pub fn is_valid(&self) -> bool {
        self.snapshot().map(|d| d.size() > 0).unwrap_or(false)
    }

    pub fn size(&self) -> u64 {
        self.snapshot().map(|d| d.size()).unwrap_or(0)
    }

    pub fn bitmask(&self) -> u32 {
        self.snapshot().map(|d| d.bitmask()).unwrap_or(0)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.snapshot().map(|d| d.path().to_path_buf())
    }

    /// CPU hash against the loaded region. Zero-fills the output and
    /// returns when no dataset is loaded; callers on the hot path keep
    /// going, the GPU result is authoritative.
    pub fn hash(&self, input: &[u8; core::HEADER_SIZE], output: &mut [u8; core::HASH_OUT_SIZE]) {
        match self.snapshot() {
            Some(dataset) => *output = core::hash(dataset.data(), input),
            None => output.fill(0),
        }
    }
}

impl Default for DatasetManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verthash::generate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static UNIQUE: AtomicUsize = AtomicUsize::new(0);

    fn temp_dataset(len: u64) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "vertminer-dataset-{}-{}.dat",
            std::process::id(),
            UNIQUE.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&path, generate::generate_bytes(len)).unwrap();
        path
    }

    #[test]
    fn init_is_idempotent_for_the_same_path() {
        let path = temp_dataset(4096);
        let manager = DatasetManager::new();

        manager.init(&path).unwrap();
        let first = manager.snapshot().unwrap();

        manager.init(&path).unwrap();
        let second = manager.snapshot().unwrap();

        // Same region, not a reload.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(manager.path().unwrap(), path);
        assert!(manager.is_valid());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn init_with_a_new_path_swaps_the_region() {
        let a = temp_dataset(4096);
        let b = temp_dataset(8192);
        let manager = DatasetManager::new();

        manager.init(&a).unwrap();
        assert_eq!(manager.size(), 4096);

        manager.init(&b).unwrap();
        assert_eq!(manager.path().unwrap(), b);
        assert_eq!(manager.size(), 8192);
        assert_eq!(manager.bitmask(), 2048 - 1);

        std::fs::remove_file(&a).unwrap();
        std::fs::remove_file(&b).unwrap();
    }

    #[test]
    fn failed_init_resets_to_empty() {
        let path = temp_dataset(4096);
        let manager = DatasetManager::new();

        manager.init(&path).unwrap();
        assert!(manager.is_valid());

        let missing = std::env::temp_dir().join("vertminer-dataset-missing.dat");
        assert!(manager.init(&missing).is_err());
        assert!(!manager.is_valid());
        assert!(manager.snapshot().is_none());
        assert_eq!(manager.size(), 0);

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn release_clears_state() {
        let path = temp_dataset(4096);
        let manager = DatasetManager::new();

        manager.init(&path).unwrap();
        manager.release();

        assert!(!manager.is_valid());
        assert!(manager.path().is_none());

        // Idempotent.
        manager.release();
        assert!(!manager.is_valid());

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn hash_zero_fills_without_a_dataset() {
        let manager = DatasetManager::new();
        let mut output = [0xffu8; 32];

        manager.hash(&[0u8; 80], &mut output);
        assert_eq!(output, [0u8; 32]);
    }

    #[test]
    fn hash_uses_the_loaded_dataset() {
        let path = temp_dataset(4096);
        let manager = DatasetManager::new();
        manager.init(&path).unwrap();

        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        manager.hash(&[1u8; 80], &mut a);
        manager.hash(&[1u8; 80], &mut b);
        assert_eq!(a, b);
        assert!(a.iter().any(|&byte| byte != 0));

        manager.hash(&[2u8; 80], &mut b);
        assert_ne!(a, b);

        std::fs::remove_file(&path).unwrap();
    }
}
