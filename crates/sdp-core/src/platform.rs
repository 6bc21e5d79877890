//! Host capabilities the protocol core needs: sleeping and reading files.
//!
//! Injected into the session so the core never touches the OS directly and
//! tests can run bring-up sequences without real delays.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

pub trait Platform: Send + Sync {
    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);

    /// Read a whole file into memory.
    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Real clock and filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdPlatform;

impl Platform for StdPlatform {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Records sleeps instead of performing them and serves files from memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingPlatform {
    sleeps: Arc<Mutex<Vec<Duration>>>,
    files: Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `contents` readable at `path`.
    pub fn add_file(&self, path: impl Into<PathBuf>, contents: Vec<u8>) {
        self.files.lock().unwrap().insert(path.into(), contents);
    }

    /// Every sleep requested so far, in order.
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn total_slept(&self) -> Duration {
        self.sleeps.lock().unwrap().iter().sum()
    }
}

impl Platform for RecordingPlatform {
    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }

    fn read_file(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}
