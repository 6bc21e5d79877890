//! Device Configuration Data entries.
//!
//! A DCD_WRITE data report carries up to 85 entries, each serialized as three
//! big-endian words: data format, register address, value.

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

/// One register write inside a DCD script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DcdEntry {
    /// Register width in bits.
    #[serde(default = "default_format")]
    pub format: u8,
    pub address: u32,
    pub value: u32,
}

fn default_format() -> u8 {
    32
}

impl DcdEntry {
    pub const SIZE: usize = 12;

    /// 32-bit register write, the only width the ROM scripts use.
    pub const fn word(address: u32, value: u32) -> Self {
        Self {
            format: 32,
            address,
            value,
        }
    }
}

/// Serialize entries into a data report payload.
pub fn encode_dcd_entries(entries: &[DcdEntry]) -> Vec<u8> {
    let mut buf = vec![0u8; entries.len() * DcdEntry::SIZE];
    for (entry, out) in entries.iter().zip(buf.chunks_exact_mut(DcdEntry::SIZE)) {
        BigEndian::write_u32(&mut out[0..4], entry.format as u32);
        BigEndian::write_u32(&mut out[4..8], entry.address);
        BigEndian::write_u32(&mut out[8..12], entry.value);
    }
    buf
}

/// Parse a data report payload back into entries. Trailing bytes that do not
/// form a whole entry are ignored.
pub fn decode_dcd_entries(payload: &[u8]) -> Vec<DcdEntry> {
    payload
        .chunks_exact(DcdEntry::SIZE)
        .map(|chunk| DcdEntry {
            format: BigEndian::read_u32(&chunk[0..4]) as u8,
            address: BigEndian::read_u32(&chunk[4..8]),
            value: BigEndian::read_u32(&chunk[8..12]),
        })
        .collect()
}
