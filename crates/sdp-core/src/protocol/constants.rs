//! Protocol constants for the i.MX50 Serial Download Protocol.
//!
//! Values are fixed by the boot ROM and its USB-HID report descriptor.

use std::time::Duration;

// ============================================================================
// Device Identification
// ============================================================================

/// Freescale Semiconductor Vendor ID
pub const FREESCALE_VENDOR_ID: u16 = 0x15A2;

/// i.MX50 boot ROM (serial download mode) Product ID
pub const IMX50_PRODUCT_ID: u16 = 0x0052;

// ============================================================================
// HID Reports
// ============================================================================

pub const REPORT_ID_SDP_CMD: u8 = 1;
pub const REPORT_ID_DATA: u8 = 2;
pub const REPORT_ID_HAB_MODE: u8 = 3;
pub const REPORT_ID_STATUS: u8 = 4;

/// Report sizes, including the leading report id byte.
pub const REPORT_SDP_CMD_SIZE: usize = 17;
pub const REPORT_DATA_SIZE: usize = 1025;
pub const REPORT_HAB_MODE_SIZE: usize = 5;
pub const REPORT_STATUS_SIZE: usize = 65;

/// Largest payload carried by a single data report.
pub const MAX_DATA_PAYLOAD: usize = REPORT_DATA_SIZE - 1;

/// Largest payload carried by a single status report.
pub const MAX_STATUS_PAYLOAD: usize = REPORT_STATUS_SIZE - 1;

// ============================================================================
// Commands (Host -> Device)
// ============================================================================

pub const CMD_READ_REGISTER: u16 = 0x0101;
pub const CMD_WRITE_REGISTER: u16 = 0x0202;
pub const CMD_WRITE_FILE: u16 = 0x0404;
pub const CMD_ERROR_STATUS: u16 = 0x0505;
pub const CMD_DCD_WRITE: u16 = 0x0A0A;
pub const CMD_JUMP_ADDRESS: u16 = 0x0B0B;

// ============================================================================
// Responses (Device -> Host)
// ============================================================================

/// HAB enabled
pub const HAB_PRODUCTION_MODE: u32 = 0x12343412;
/// HAB disabled
pub const HAB_ENGINEER_MODE: u32 = 0x56787856;

pub const ACK_WRITE_COMPLETE: u32 = 0x128A8A12;
pub const ACK_FILE_COMPLETE: u32 = 0x88888888;

/// Reported by ERROR_STATUS when nothing went wrong.
pub const STATUS_CODE_OK: u32 = 0xF0F0F0F0;

// ============================================================================
// Limits
// ============================================================================

/// DCD entries accepted by one DCD_WRITE command.
pub const MAX_DCD_WRITE_REG_CNT: usize = 85;

/// Host-side chunk size used when streaming an image file.
pub const MAX_DOWNLOAD_SIZE: usize = 0x200000;

/// Region read back and rewritten around an injected IVT header.
pub const ROM_TRANSFER_SIZE: usize = 0x400;

// ============================================================================
// Boot Image
// ============================================================================

/// IVT header tag (0xD1), length (0x0020) and version (0x40).
pub const IVT_BARKER_HEADER: u32 = 0x402000D1;

// ============================================================================
// Timing
// ============================================================================

/// Pause between the WRITE_FILE command and its first data report.
pub const WRITE_FILE_SETTLE: Duration = Duration::from_millis(10);
