//! Scratch directory support for tests.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_DIR_ID: AtomicU64 = AtomicU64::new(0);

/// A process-unique scratch directory that is removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new(label: &str) -> TempDir {
        let id = NEXT_DIR_ID.fetch_add(1, Ordering::SeqCst);
        let path = env::temp_dir().join(format!("espack_{}_{}_{}", label, process::id(), id));

        fs::create_dir_all(&path).expect("Could not create scratch directory");

        TempDir { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
