//! HID transport abstraction.
//!
//! Defines the `HidTransport` trait for report-level communication,
//! allowing different implementations (nusb, mock, simulated device).

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: VID={vid:04X} PID={pid:04X}")]
    DeviceNotFound { vid: u16, pid: u16 },

    #[error("No device appeared within {timeout_secs}s")]
    DiscoveryTimeout { timeout_secs: u64 },

    #[error("Failed to open device: {0}")]
    OpenFailed(String),

    #[error("Failed to claim interface {interface}: {message}")]
    ClaimInterfaceFailed { interface: u8, message: String },

    #[error("Endpoint not found: type={ep_type}, direction={direction}")]
    EndpointNotFound { ep_type: String, direction: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract HID report channel.
///
/// Reports always carry their report id in the first byte, in both
/// directions.
pub trait HidTransport: Send + Sync {
    /// Send one output report. Returns the number of bytes accepted.
    fn write(&self, report: &[u8]) -> Result<usize, TransportError>;

    /// Read one input report of at most `len` bytes.
    fn read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError>;

    /// Get the current VID.
    fn vendor_id(&self) -> u16;

    /// Get the current PID.
    fn product_id(&self) -> u16;
}

impl<T: HidTransport + ?Sized> HidTransport for &T {
    fn write(&self, report: &[u8]) -> Result<usize, TransportError> {
        (**self).write(report)
    }

    fn read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        (**self).read(len, timeout)
    }

    fn vendor_id(&self) -> u16 {
        (**self).vendor_id()
    }

    fn product_id(&self) -> u16 {
        (**self).product_id()
    }
}
