//! Device responses: HAB mode (report 3) and status/ack (report 4).

use std::fmt;

use super::constants::*;

/// Trust mode reported by the ROM after every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HabMode {
    Production,
    Engineering,
    /// Any other value, passed through uninterpreted.
    Unknown(u32),
}

impl HabMode {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            HAB_PRODUCTION_MODE => HabMode::Production,
            HAB_ENGINEER_MODE => HabMode::Engineering,
            other => HabMode::Unknown(other),
        }
    }

    pub fn raw(&self) -> u32 {
        match self {
            HabMode::Production => HAB_PRODUCTION_MODE,
            HabMode::Engineering => HAB_ENGINEER_MODE,
            HabMode::Unknown(raw) => *raw,
        }
    }
}

impl fmt::Display for HabMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HabMode::Production => write!(f, "production"),
            HabMode::Engineering => write!(f, "engineering"),
            HabMode::Unknown(raw) => write!(f, "unknown (0x{:08X})", raw),
        }
    }
}

/// Decode report 3. The mode word follows the report id in native order.
pub fn decode_hab_mode(report: &[u8]) -> HabMode {
    let mut word = [0u8; 4];
    for (dst, src) in word.iter_mut().zip(report.iter().skip(1)) {
        *dst = *src;
    }
    HabMode::from_raw(u32::from_le_bytes(word))
}

/// Decode the status word of report 4.
pub fn decode_ack(report: &[u8]) -> u32 {
    let mut word = [0u8; 4];
    for (dst, src) in word.iter_mut().zip(report.iter().skip(1)) {
        *dst = *src;
    }
    u32::from_be_bytes(word)
}

/// The 64 payload bytes of a status report: a status code or read data.
#[derive(Clone, PartialEq, Eq)]
pub struct AckPayload {
    bytes: [u8; MAX_STATUS_PAYLOAD],
}

impl AckPayload {
    /// Build from a full report 4 (id byte included). Short reports are
    /// zero-padded.
    pub fn from_report(report: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_STATUS_PAYLOAD];
        for (dst, src) in bytes.iter_mut().zip(report.iter().skip(1)) {
            *dst = *src;
        }
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Leading status word.
    pub fn status(&self) -> u32 {
        u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }

    pub fn is_write_complete(&self) -> bool {
        self.status() == ACK_WRITE_COMPLETE
    }

    pub fn is_file_complete(&self) -> bool {
        self.status() == ACK_FILE_COMPLETE
    }
}

impl fmt::Debug for AckPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AckPayload(status=0x{:08X})", self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_report(word: u32) -> Vec<u8> {
        let mut report = vec![0u8; REPORT_STATUS_SIZE];
        report[0] = REPORT_ID_STATUS;
        report[1..5].copy_from_slice(&word.to_be_bytes());
        report
    }

    #[test]
    fn test_decode_ack_is_big_endian() {
        let mut report = vec![REPORT_ID_STATUS, 0x12, 0x34, 0x56, 0x78];
        report.resize(REPORT_STATUS_SIZE, 0);
        assert_eq!(decode_ack(&report), 0x12345678);
        assert_eq!(decode_ack(&status_report(ACK_FILE_COMPLETE)), ACK_FILE_COMPLETE);
    }

    #[test]
    fn test_ack_payload_strips_report_id() {
        let payload = AckPayload::from_report(&status_report(ACK_WRITE_COMPLETE));
        assert_eq!(payload.as_bytes().len(), 64);
        assert!(payload.is_write_complete());
        assert!(!payload.is_file_complete());
        assert_eq!(payload.status(), decode_ack(&status_report(ACK_WRITE_COMPLETE)));
    }

    #[test]
    fn test_hab_modes() {
        let production = [REPORT_ID_HAB_MODE, 0x12, 0x34, 0x34, 0x12];
        let engineering = [REPORT_ID_HAB_MODE, 0x56, 0x78, 0x78, 0x56];
        let other = [REPORT_ID_HAB_MODE, 0x01, 0x00, 0x00, 0x00];
        assert_eq!(decode_hab_mode(&production), HabMode::Production);
        assert_eq!(decode_hab_mode(&engineering), HabMode::Engineering);
        assert_eq!(decode_hab_mode(&other), HabMode::Unknown(1));
        assert_eq!(HabMode::Unknown(1).raw(), 1);
    }
}
