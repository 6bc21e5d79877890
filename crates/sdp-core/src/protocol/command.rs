//! SDP command report (report 1) encoding.
//!
//! The boot ROM parses the 16 command bytes as four native words whose
//! fields are interleaved across word boundaries. The composition below
//! reproduces that layout bit for bit; the wire result is the big-endian
//! packing `kind(2) address(4) format(1) count(4) data(4) reserved(1)`.

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use super::constants::*;

/// SDP command kinds understood by the i.MX50 ROM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    ReadRegister,
    WriteRegister,
    WriteFile,
    ErrorStatus,
    DcdWrite,
    JumpAddress,
}

impl CommandKind {
    pub const fn code(self) -> u16 {
        match self {
            CommandKind::ReadRegister => CMD_READ_REGISTER,
            CommandKind::WriteRegister => CMD_WRITE_REGISTER,
            CommandKind::WriteFile => CMD_WRITE_FILE,
            CommandKind::ErrorStatus => CMD_ERROR_STATUS,
            CommandKind::DcdWrite => CMD_DCD_WRITE,
            CommandKind::JumpAddress => CMD_JUMP_ADDRESS,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            CMD_READ_REGISTER => Some(CommandKind::ReadRegister),
            CMD_WRITE_REGISTER => Some(CommandKind::WriteRegister),
            CMD_WRITE_FILE => Some(CommandKind::WriteFile),
            CMD_ERROR_STATUS => Some(CommandKind::ErrorStatus),
            CMD_DCD_WRITE => Some(CommandKind::DcdWrite),
            CMD_JUMP_ADDRESS => Some(CommandKind::JumpAddress),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::ReadRegister => write!(f, "READ_REGISTER"),
            CommandKind::WriteRegister => write!(f, "WRITE_REGISTER"),
            CommandKind::WriteFile => write!(f, "WRITE_FILE"),
            CommandKind::ErrorStatus => write!(f, "ERROR_STATUS"),
            CommandKind::DcdWrite => write!(f, "DCD_WRITE"),
            CommandKind::JumpAddress => write!(f, "JUMP_ADDRESS"),
        }
    }
}

/// A single SDP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdpCommand {
    pub kind: CommandKind,
    pub address: u32,
    /// Bit width of each transferred unit (8, 16 or 32).
    pub format: u8,
    /// Number of units, or bytes for WRITE_FILE.
    pub data_count: u32,
    /// Immediate value for register writes.
    pub data: u32,
}

impl SdpCommand {
    pub const fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            address: 0,
            format: 0,
            data_count: 0,
            data: 0,
        }
    }

    pub const fn read_register(address: u32, count: u32) -> Self {
        Self {
            address,
            format: 32,
            data_count: count,
            ..Self::new(CommandKind::ReadRegister)
        }
    }

    pub const fn write_register(address: u32, value: u32, format: u8) -> Self {
        Self {
            address,
            format,
            data_count: 1,
            data: value,
            ..Self::new(CommandKind::WriteRegister)
        }
    }

    pub const fn write_file(address: u32, len: u32) -> Self {
        Self {
            address,
            data_count: len,
            ..Self::new(CommandKind::WriteFile)
        }
    }

    pub const fn dcd_write(count: u32) -> Self {
        Self {
            data_count: count,
            ..Self::new(CommandKind::DcdWrite)
        }
    }

    pub const fn jump(address: u32) -> Self {
        Self {
            address,
            ..Self::new(CommandKind::JumpAddress)
        }
    }

    pub const fn error_status() -> Self {
        Self::new(CommandKind::ErrorStatus)
    }

    /// The four command words as the ROM reads them.
    pub fn words(&self) -> [u32; 4] {
        let kind = self.kind.code() as u32;
        let address = self.address;
        let format = self.format as u32;
        let count = self.data_count;
        let data = self.data;

        let w0 = ((address & 0x00FF0000) << 8) | ((address & 0xFF000000) >> 8) | (kind & 0x0000FFFF);
        let w1 = (count & 0xFF000000)
            | ((format & 0x000000FF) << 16)
            | ((address & 0x000000FF) << 8)
            | ((address & 0x0000FF00) >> 8);
        let w2 = (data & 0xFF000000)
            | ((count & 0x000000FF) << 16)
            | (count & 0x0000FF00)
            | ((count & 0x00FF0000) >> 16);
        let w3 = ((data & 0x00FF0000) >> 16) | (data & 0x0000FF00) | ((data & 0x000000FF) << 16);

        [w0, w1, w2, w3]
    }
}

/// Encode a command as a complete report 1.
pub fn encode_command(cmd: &SdpCommand) -> [u8; REPORT_SDP_CMD_SIZE] {
    let mut report = [0u8; REPORT_SDP_CMD_SIZE];
    report[0] = REPORT_ID_SDP_CMD;
    LittleEndian::write_u32_into(&cmd.words(), &mut report[1..]);
    report
}

/// Decode a report 1 back into a command.
///
/// Returns `None` for a short buffer, a different report id or an unknown
/// command kind.
pub fn decode_command(report: &[u8]) -> Option<SdpCommand> {
    if report.len() < REPORT_SDP_CMD_SIZE || report[0] != REPORT_ID_SDP_CMD {
        return None;
    }
    let mut w = [0u32; 4];
    LittleEndian::read_u32_into(&report[1..REPORT_SDP_CMD_SIZE], &mut w);

    let kind = CommandKind::from_code((w[0] & 0xFFFF) as u16)?;
    let address = (((w[0] >> 24) & 0xFF) << 16)
        | (((w[0] >> 16) & 0xFF) << 24)
        | ((w[1] >> 8) & 0xFF)
        | ((w[1] & 0xFF) << 8);
    let format = ((w[1] >> 16) & 0xFF) as u8;
    let data_count =
        (w[1] & 0xFF000000) | ((w[2] >> 16) & 0xFF) | (w[2] & 0xFF00) | ((w[2] & 0xFF) << 16);
    let data = (w[2] & 0xFF000000) | ((w[3] & 0xFF) << 16) | (w[3] & 0xFF00) | ((w[3] >> 16) & 0xFF);

    Some(SdpCommand {
        kind,
        address,
        format,
        data_count,
        data,
    })
}
