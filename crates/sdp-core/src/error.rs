//! Errors surfaced by SDP exchanges and the operations built on them.

use std::path::PathBuf;
use thiserror::Error;

use crate::protocol::CommandKind;
use crate::transport::TransportError;

#[derive(Error, Debug)]
pub enum SdpError {
    #[error("Failed to acquire a {requested}-byte buffer")]
    Allocation { requested: usize },

    #[error("Failed to send data report: {source}")]
    TransportWrite {
        #[source]
        source: TransportError,
    },

    #[error("Failed to read {report} report: {source}")]
    TransportRead {
        report: &'static str,
        #[source]
        source: TransportError,
    },

    #[error("Invalid parameter: {0}")]
    Parameter(String),

    #[error("Failed to send {kind} command: {source}")]
    Command {
        kind: CommandKind,
        #[source]
        source: TransportError,
    },

    #[error("{kind} failed: expected status 0x{expected:08X}, got 0x{actual:08X}")]
    StatusMismatch {
        kind: CommandKind,
        expected: u32,
        actual: u32,
    },

    #[error("Read-back mismatch at 0x{address:08X} (offset {offset})")]
    Verification { address: u32, offset: usize },

    #[error("Cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SdpError>;
