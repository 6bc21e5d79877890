//! Image Vector Table header.
//!
//! The ROM only jumps to an address holding a valid IVT. Words are stored in
//! the device's native (little-endian) order.

use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

use super::constants::IVT_BARKER_HEADER;

#[derive(Error, Debug)]
pub enum IvtError {
    #[error("Buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("Invalid barker: expected 0x{expected:08X}, got 0x{actual:08X}")]
    InvalidBarker { expected: u32, actual: u32 },
}

/// IVT header (32 bytes / 0x20)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IvtHeader {
    pub barker: u32,
    pub entry_address: u32,
    pub reserved1: u32,
    pub dcd_address: u32,
    pub boot_data_address: u32,
    pub self_address: u32,
    pub csf_address: u32,
    pub reserved2: u32,
}

impl IvtHeader {
    pub const SIZE: usize = 32;

    /// Minimal header: entry point and self pointer, everything else zero.
    pub fn new(entry_address: u32, self_address: u32) -> Self {
        Self {
            barker: IVT_BARKER_HEADER,
            entry_address,
            self_address,
            ..Default::default()
        }
    }

    fn to_words(self) -> [u32; 8] {
        [
            self.barker,
            self.entry_address,
            self.reserved1,
            self.dcd_address,
            self.boot_data_address,
            self.self_address,
            self.csf_address,
            self.reserved2,
        ]
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u32_into(&self.to_words(), &mut buf);
        buf
    }

    /// Overwrite the first `SIZE` bytes of `buf` with this header.
    pub fn write_to(&self, buf: &mut [u8]) -> Result<(), IvtError> {
        if buf.len() < Self::SIZE {
            return Err(IvtError::BufferTooSmall {
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        buf[..Self::SIZE].copy_from_slice(&self.to_bytes());
        Ok(())
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, IvtError> {
        if data.len() < Self::SIZE {
            return Err(IvtError::BufferTooSmall {
                expected: Self::SIZE,
                actual: data.len(),
            });
        }
        let mut w = [0u32; 8];
        LittleEndian::read_u32_into(&data[..Self::SIZE], &mut w);
        if w[0] != IVT_BARKER_HEADER {
            return Err(IvtError::InvalidBarker {
                expected: IVT_BARKER_HEADER,
                actual: w[0],
            });
        }
        Ok(Self {
            barker: w[0],
            entry_address: w[1],
            reserved1: w[2],
            dcd_address: w[3],
            boot_data_address: w[4],
            self_address: w[5],
            csf_address: w[6],
            reserved2: w[7],
        })
    }
}
