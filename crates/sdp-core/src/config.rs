//! Session configuration.

use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::protocol::{FREESCALE_VENDOR_ID, IMX50_PRODUCT_ID, MAX_DOWNLOAD_SIZE};

/// Configuration for an SDP session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// USB vendor ID to look for.
    pub vid: u16,
    /// USB product ID to look for.
    pub pid: u16,
    /// Timeout for each HAB/status report read.
    pub read_timeout_ms: u64,
    /// Delay between discovery attempts.
    pub poll_interval_ms: u64,
    /// Give up discovery after this long; wait forever when unset.
    pub discovery_timeout_secs: Option<u64>,
    /// Largest chunk written by one WRITE_FILE when loading an image.
    pub max_download_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vid: FREESCALE_VENDOR_ID,
            pid: IMX50_PRODUCT_ID,
            read_timeout_ms: 5000,
            poll_interval_ms: 100,
            discovery_timeout_secs: None,
            max_download_size: MAX_DOWNLOAD_SIZE,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn discovery_timeout(&self) -> Option<Duration> {
        self.discovery_timeout_secs.map(Duration::from_secs)
    }
}
