//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow protocol traffic and
//! progress without tight coupling to the core logic. Verbosity lives in the
//! observer rather than in global state.

use std::fmt;

use crate::hexdump::hex_dump;
use crate::protocol::{CommandKind, HabMode};

/// USB report direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    Tx, // Transmit (Host -> Device)
    Rx, // Receive (Device -> Host)
}

impl fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketDirection::Tx => write!(f, "TX"),
            PacketDirection::Rx => write!(f, "RX"),
        }
    }
}

/// Events emitted by an SDP session.
#[derive(Debug, Clone)]
pub enum SdpEvent {
    /// Device opened.
    DeviceConnected { vid: u16, pid: u16 },
    /// Command report about to be sent.
    Command {
        kind: CommandKind,
        address: u32,
        data_count: u32,
    },
    /// HAB mode reported after a command.
    HabMode { mode: HabMode },
    /// Status word received for a command.
    Status { kind: CommandKind, status: u32 },
    /// Progress update for a multi-step operation.
    Progress {
        operation: String,
        current: u64,
        total: u64,
    },
    /// HID report sent/received.
    Packet {
        direction: PacketDirection,
        report_id: u8,
        length: usize,
        data: Option<Vec<u8>>,
    },
}

/// Observer trait for receiving SDP events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait SdpObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &SdpEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl SdpObserver for NullObserver {
    fn on_event(&self, _event: &SdpEvent) {}
}

/// Observer that logs events using tracing.
///
/// Report contents are hex dumped at TRACE level.
pub struct TracingObserver;

impl SdpObserver for TracingObserver {
    fn on_event(&self, event: &SdpEvent) {
        match event {
            SdpEvent::DeviceConnected { vid, pid } => {
                tracing::info!(vid = %format!("{:04X}", vid), pid = %format!("{:04X}", pid), "Device connected");
            }
            SdpEvent::Command {
                kind,
                address,
                data_count,
            } => {
                tracing::debug!(command = %kind, address = %format!("0x{:08X}", address), count = data_count, "Sending command");
            }
            SdpEvent::HabMode { mode } => {
                tracing::debug!(hab = %mode, "HAB mode");
            }
            SdpEvent::Status { kind, status } => {
                tracing::debug!(command = %kind, status = %format!("0x{:08X}", status), "Status received");
            }
            SdpEvent::Progress {
                operation,
                current,
                total,
            } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    0
                };
                tracing::debug!(operation = %operation, progress = %format!("{}%", pct), "Progress");
            }
            SdpEvent::Packet {
                direction,
                report_id,
                length,
                data,
            } => {
                tracing::trace!(dir = %direction, report = report_id, len = length, "HID report");
                if let Some(data) = data
                    && tracing::enabled!(tracing::Level::TRACE)
                {
                    tracing::trace!("\n{}", hex_dump(data, 0x10));
                }
            }
        }
    }
}
