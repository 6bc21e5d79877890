//! Image vector table injection and the final jump.

use tracing::{info, instrument, warn};

use crate::error::{Result, SdpError};
use crate::events::SdpObserver;
use crate::platform::Platform;
use crate::protocol::{IvtHeader, ROM_TRANSFER_SIZE};
use crate::session::SdpSession;
use crate::transport::HidTransport;

impl<T: HidTransport, O: SdpObserver, P: Platform> SdpSession<T, O, P> {
    /// Place an IVT header immediately before `address` so the ROM accepts
    /// the image as bootable.
    ///
    /// The surrounding region is read, patched, written back and verified.
    /// Returns the address the header was written to.
    #[instrument(skip(self), fields(address = %format!("0x{:08X}", address)))]
    pub fn add_header(&self, address: u32) -> Result<u32> {
        let header_address = address
            .checked_sub(IvtHeader::SIZE as u32)
            .ok_or_else(|| {
                SdpError::Parameter(format!(
                    "no room for a {}-byte header below 0x{:08X}",
                    IvtHeader::SIZE,
                    address
                ))
            })?;

        let mut region = self.read_memory(header_address, ROM_TRANSFER_SIZE)?;
        IvtHeader::new(address, header_address)
            .write_to(&mut region)
            .map_err(|e| SdpError::Parameter(e.to_string()))?;

        self.write_memory(header_address, &region)?;

        let readback = self.read_memory(header_address, ROM_TRANSFER_SIZE)?;
        if let Some(offset) = region.iter().zip(&readback).position(|(a, b)| a != b) {
            warn!(offset, "Header read-back mismatch");
            return Err(SdpError::Verification {
                address: header_address,
                offset,
            });
        }

        info!(header = %format!("0x{:08X}", header_address), "Boot header written");
        Ok(header_address)
    }

    /// Start the image at `address`, optionally injecting a header first.
    ///
    /// With a header the ROM is pointed at the header; otherwise straight at
    /// `address`. Returns the jump target.
    pub fn boot(&self, address: u32, inject_header: bool) -> Result<u32> {
        let target = if inject_header {
            self.add_header(address)?
        } else {
            address
        };

        self.jump(target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::events::NullObserver;
    use crate::platform::RecordingPlatform;
    use crate::protocol::{CommandKind, IVT_BARKER_HEADER};
    use crate::transport::SimulatedDevice;

    fn session(dev: &SimulatedDevice) -> SdpSession<SimulatedDevice, NullObserver, RecordingPlatform> {
        SdpSession::with_parts(dev.clone(), Arc::new(NullObserver), RecordingPlatform::new())
    }

    #[test]
    fn test_add_header_against_echoing_device() {
        let dev = SimulatedDevice::new();
        let image: Vec<u8> = (0..0x400).map(|i| i as u8).collect();
        dev.load(0x7080_0000, &image);
        let session = session(&dev);

        let header_address = session.add_header(0x7080_0000).unwrap();

        assert_eq!(header_address, 0x7080_0000 - 32);
        let header = IvtHeader::from_bytes(&dev.peek(header_address, 32)).unwrap();
        assert_eq!(header.barker, IVT_BARKER_HEADER);
        assert_eq!(header.entry_address, 0x7080_0000);
        assert_eq!(header.self_address, header_address);
        // The image itself is left alone.
        assert_eq!(dev.peek(0x7080_0000, 0x400 - 32), image[..0x400 - 32].to_vec());
    }

    #[test]
    fn test_add_header_rejects_low_address() {
        let dev = SimulatedDevice::new();
        let session = session(&dev);

        let err = session.add_header(16).unwrap_err();

        assert!(matches!(err, SdpError::Parameter(_)));
        assert!(dev.commands().is_empty());
    }

    #[test]
    fn test_corrupted_readback_prevents_jump() {
        let dev = SimulatedDevice::new();
        dev.set_corrupt_reads(true);
        let session = session(&dev);

        let err = session.boot(0x7080_0000, true).unwrap_err();

        match err {
            SdpError::Verification { address, offset } => {
                assert_eq!(address, 0x7080_0000 - 32);
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(dev.jumps().is_empty());
        assert_eq!(dev.count_commands(CommandKind::JumpAddress), 0);
    }

    #[test]
    fn test_boot_targets() {
        let dev = SimulatedDevice::new();
        let session = session(&dev);

        assert_eq!(session.boot(0x7080_0000, false).unwrap(), 0x7080_0000);
        assert_eq!(session.boot(0x7080_0000, true).unwrap(), 0x7080_0000 - 32);
        assert_eq!(dev.jumps(), vec![0x7080_0000, 0x7080_0000 - 32]);
    }
}
