//! Memory operations composed from the session's report exchanges.
//!
//! Every operation aborts on its first failing step. Nothing already written
//! to the device is rolled back.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::{Result, SdpError};
use crate::events::{SdpEvent, SdpObserver};
use crate::platform::Platform;
use crate::protocol::{
    ACK_FILE_COMPLETE, ACK_WRITE_COMPLETE, AckPayload, CommandKind, DcdEntry, MAX_DATA_PAYLOAD,
    MAX_DCD_WRITE_REG_CNT, MAX_STATUS_PAYLOAD, SdpCommand, WRITE_FILE_SETTLE, encode_dcd_entries,
};
use crate::session::SdpSession;
use crate::transport::HidTransport;

fn transfer_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| SdpError::Parameter(format!("transfer of {} bytes is too large", len)))
}

impl<T: HidTransport, O: SdpObserver, P: Platform> SdpSession<T, O, P> {
    fn expect_status(&self, kind: CommandKind, ack: &AckPayload, expected: u32) -> Result<()> {
        let actual = ack.status();
        self.emit(SdpEvent::Status {
            kind,
            status: actual,
        });

        if actual != expected {
            return Err(SdpError::StatusMismatch {
                kind,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Read `count` bytes of device memory starting at `address`.
    pub fn read_memory(&self, address: u32, count: usize) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(count)
            .map_err(|_| SdpError::Allocation { requested: count })?;
        buf.resize(count, 0);

        self.read_memory_into(address, &mut buf)?;
        Ok(buf)
    }

    /// Fill `buf` from device memory starting at `address`.
    ///
    /// On a mid-transfer read failure the bytes received so far are left in
    /// `buf`.
    #[instrument(skip(self, buf), fields(address = %format!("0x{:08X}", address), count = buf.len()))]
    pub fn read_memory_into(&self, address: u32, buf: &mut [u8]) -> Result<()> {
        let count = transfer_len(buf.len())?;

        self.send_command(&SdpCommand::read_register(address, count))?;
        self.read_hab_mode()?;

        let mut filled = 0;
        while filled < buf.len() {
            let ack = self.read_ack()?;
            let n = (buf.len() - filled).min(MAX_STATUS_PAYLOAD);
            buf[filled..filled + n].copy_from_slice(&ack.as_bytes()[..n]);
            filled += n;
        }

        debug!(bytes = filled, "Memory read complete");
        Ok(())
    }

    /// Write one register of `format` bits (8, 16 or 32).
    #[instrument(skip(self), fields(address = %format!("0x{:08X}", address), value = %format!("0x{:08X}", value)))]
    pub fn write_register(&self, address: u32, value: u32, format: u8) -> Result<()> {
        self.send_command(&SdpCommand::write_register(address, value, format))?;
        self.read_hab_mode()?;
        let ack = self.read_ack()?;
        self.expect_status(CommandKind::WriteRegister, &ack, ACK_WRITE_COMPLETE)
    }

    /// Stream `data` into device memory at `address` with one WRITE_FILE.
    #[instrument(skip(self, data), fields(address = %format!("0x{:08X}", address), len = data.len()))]
    pub fn write_memory(&self, address: u32, data: &[u8]) -> Result<()> {
        let len = transfer_len(data.len())?;

        self.send_command(&SdpCommand::write_file(address, len))?;
        self.sleep(WRITE_FILE_SETTLE);

        for chunk in data.chunks(MAX_DATA_PAYLOAD) {
            self.send_data(chunk)?;
        }

        self.read_hab_mode()?;
        let ack = self.read_ack()?;
        self.expect_status(CommandKind::WriteFile, &ack, ACK_FILE_COMPLETE)
    }

    /// Apply a register script, at most 85 entries per DCD_WRITE.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub fn dcd_write(&self, entries: &[DcdEntry]) -> Result<()> {
        for batch in entries.chunks(MAX_DCD_WRITE_REG_CNT) {
            self.send_command(&SdpCommand::dcd_write(batch.len() as u32))?;
            self.send_data(&encode_dcd_entries(batch))?;
            self.read_hab_mode()?;
            let ack = self.read_ack()?;
            self.expect_status(CommandKind::DcdWrite, &ack, ACK_WRITE_COMPLETE)?;
        }
        Ok(())
    }

    /// Hand control to code at `address`.
    ///
    /// The ROM answers with its HAB mode only; no status report follows.
    #[instrument(skip(self), fields(address = %format!("0x{:08X}", address)))]
    pub fn jump(&self, address: u32) -> Result<()> {
        self.send_command(&SdpCommand::jump(address))?;
        self.read_hab_mode()?;
        info!(address = %format!("0x{:08X}", address), "Jump issued");
        Ok(())
    }

    /// Fetch the ROM's last error status word.
    pub fn error_status(&self) -> Result<u32> {
        self.send_command(&SdpCommand::error_status())?;
        self.read_hab_mode()?;
        let status = self.read_ack()?.status();
        self.emit(SdpEvent::Status {
            kind: CommandKind::ErrorStatus,
            status,
        });
        Ok(status)
    }

    /// Load a file into device memory at `address`.
    ///
    /// The file is written in chunks of at most `max_download_size` bytes,
    /// each its own WRITE_FILE. Returns the number of bytes written.
    #[instrument(skip(self), fields(address = %format!("0x{:08X}", address)))]
    pub fn load_image(&self, address: u32, path: &Path) -> Result<usize> {
        let image = self.read_file(path)?;
        info!(path = %path.display(), size = image.len(), "Loading image");

        self.load_bytes(address, &image)?;
        Ok(image.len())
    }

    /// Write `image` at `address` in `max_download_size` chunks.
    pub fn load_bytes(&self, address: u32, image: &[u8]) -> Result<()> {
        let total = image.len() as u64;
        let mut offset = 0usize;

        for chunk in image.chunks(self.max_download_size()) {
            let chunk_address = transfer_len(offset)
                .ok()
                .and_then(|off| address.checked_add(off))
                .ok_or_else(|| {
                    SdpError::Parameter(format!(
                        "image of {} bytes does not fit above 0x{:08X}",
                        image.len(),
                        address
                    ))
                })?;

            self.write_memory(chunk_address, chunk)?;
            offset += chunk.len();

            self.emit(SdpEvent::Progress {
                operation: "load".into(),
                current: offset as u64,
                total,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::events::NullObserver;
    use crate::platform::RecordingPlatform;
    use crate::protocol::{HabMode, STATUS_CODE_OK, decode_command, decode_dcd_entries};
    use crate::transport::{MockTransport, SimulatedDevice, TransportError};

    fn sim_session(
        dev: &SimulatedDevice,
    ) -> SdpSession<SimulatedDevice, NullObserver, RecordingPlatform> {
        SdpSession::with_parts(dev.clone(), Arc::new(NullObserver), RecordingPlatform::new())
    }

    fn mock_session(mock: &MockTransport) -> SdpSession<MockTransport, NullObserver, RecordingPlatform> {
        SdpSession::with_parts(mock.clone(), Arc::new(NullObserver), RecordingPlatform::new())
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn test_write_read_round_trip() {
        for len in [0usize, 1024, 2049] {
            let dev = SimulatedDevice::new();
            let session = sim_session(&dev);
            let data = pattern(len);

            session.write_memory(0x7080_0000, &data).unwrap();
            assert_eq!(session.read_memory(0x7080_0000, len).unwrap(), data);
        }
    }

    #[test]
    fn test_write_memory_chunks_data_reports() {
        let dev = SimulatedDevice::new();
        let session = sim_session(&dev);

        session.write_memory(0x1000, &pattern(2049)).unwrap();

        assert_eq!(dev.data_reports(), vec![1024, 1024, 1]);
        assert_eq!(session.platform().sleeps(), vec![WRITE_FILE_SETTLE]);
    }

    #[test]
    fn test_read_memory_collects_partial_chunks() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        for i in 0..8u8 {
            mock.queue_status_payload(&[i; 64]);
        }
        let session = mock_session(&mock);

        let data = session.read_memory(0, 500).unwrap();

        assert_eq!(data.len(), 500);
        assert_eq!(mock.pending_reports(), 0);
        assert!(data[..64].iter().all(|&b| b == 0));
        assert!(data[448..].iter().all(|&b| b == 7));

        let cmd = decode_command(&mock.get_writes()[0]).unwrap();
        assert_eq!(cmd.kind, CommandKind::ReadRegister);
        assert_eq!(cmd.format, 32);
        assert_eq!(cmd.data_count, 500);
    }

    #[test]
    fn test_read_memory_keeps_partial_data_on_failure() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_status_payload(&[0x5A; 64]);
        let session = mock_session(&mock);

        let mut buf = [0u8; 128];
        let err = session.read_memory_into(0x2000, &mut buf).unwrap_err();

        assert!(matches!(
            err,
            SdpError::TransportRead {
                report: "status",
                source: TransportError::Timeout { .. }
            }
        ));
        assert!(buf[..64].iter().all(|&b| b == 0x5A));
        assert!(buf[64..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_memory_rejects_short_status_report() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_report(&[4, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let session = mock_session(&mock);

        let err = session.read_memory(0, 64).unwrap_err();

        assert!(matches!(
            err,
            SdpError::TransportRead {
                report: "status",
                source: TransportError::ReadFailed(_)
            }
        ));
    }

    #[test]
    fn test_error_status_rejects_hab_report_in_status_slot() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_hab(HabMode::Engineering);
        let session = mock_session(&mock);

        let err = session.error_status().unwrap_err();

        assert!(matches!(err, SdpError::TransportRead { report: "status", .. }));
    }

    #[test]
    fn test_write_register_status_mismatch() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_status(0);
        let session = mock_session(&mock);

        let err = session.write_register(0x53FD_400C, 0x8000_0004, 32).unwrap_err();

        match err {
            SdpError::StatusMismatch {
                kind,
                expected,
                actual,
            } => {
                assert_eq!(kind, CommandKind::WriteRegister);
                assert_eq!(expected, 0x128A8A12);
                assert_eq!(actual, 0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_write_register_widths() {
        let dev = SimulatedDevice::new();
        dev.load(0x100, &[0xFF; 4]);
        let session = sim_session(&dev);

        session.write_register(0x100, 0x1234, 16).unwrap();

        assert_eq!(dev.peek(0x100, 4), vec![0x34, 0x12, 0xFF, 0xFF]);
    }

    #[test]
    fn test_write_memory_rejects_wrong_completion() {
        let dev = SimulatedDevice::new();
        dev.set_status_override(Some(ACK_WRITE_COMPLETE));
        let session = sim_session(&dev);

        let err = session.write_memory(0x100, &[1, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            SdpError::StatusMismatch {
                kind: CommandKind::WriteFile,
                expected: ACK_FILE_COMPLETE,
                actual: ACK_WRITE_COMPLETE,
            }
        ));
    }

    #[test]
    fn test_dcd_write_batching() {
        for (count, batches) in [(85usize, 1usize), (86, 2), (170, 2)] {
            let dev = SimulatedDevice::new();
            let session = sim_session(&dev);
            let entries: Vec<_> = (0..count as u32)
                .map(|i| DcdEntry::word(0x1000 + i * 4, i))
                .collect();

            session.dcd_write(&entries).unwrap();

            assert_eq!(dev.count_commands(CommandKind::DcdWrite), batches);
            assert!(
                dev.commands()
                    .iter()
                    .all(|c| c.data_count as usize <= MAX_DCD_WRITE_REG_CNT)
            );
            assert_eq!(dev.peek_u32(0x1000 + (count as u32 - 1) * 4), count as u32 - 1);
        }
    }

    #[test]
    fn test_dcd_write_encodes_batch() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_status(ACK_WRITE_COMPLETE);
        let session = mock_session(&mock);
        let entries = [DcdEntry::word(0x53FD_4068, 0xFFFF_FFFF)];

        session.dcd_write(&entries).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(decode_command(&writes[0]).unwrap().data_count, 1);
        assert_eq!(decode_dcd_entries(&writes[1][1..]), entries.to_vec());
    }

    #[test]
    fn test_dcd_write_first_failure_aborts() {
        let dev = SimulatedDevice::new();
        dev.set_status_override(Some(0));
        let session = sim_session(&dev);
        let entries = vec![DcdEntry::word(0x10, 1); 170];

        let err = session.dcd_write(&entries).unwrap_err();

        assert!(matches!(err, SdpError::StatusMismatch { actual: 0, .. }));
        assert_eq!(dev.count_commands(CommandKind::DcdWrite), 1);
    }

    #[test]
    fn test_jump_reads_no_status() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Production);
        mock.queue_status(STATUS_CODE_OK);
        let session = mock_session(&mock);

        session.jump(0x7080_0000).unwrap();

        assert_eq!(mock.pending_reports(), 1);
    }

    #[test]
    fn test_error_status_returns_raw_value() {
        let dev = SimulatedDevice::new();
        dev.set_error_status(0);
        let session = sim_session(&dev);

        assert_eq!(session.error_status().unwrap(), 0);
    }

    #[test]
    fn test_load_image_chunks_by_max_download_size() {
        let dev = SimulatedDevice::new();
        let platform = RecordingPlatform::new();
        platform.add_file("uImage", pattern(5000));
        let session = SdpSession::with_parts(dev.clone(), Arc::new(NullObserver), platform)
            .with_max_download_size(2048);

        let written = session.load_image(0x7080_0000, Path::new("uImage")).unwrap();

        assert_eq!(written, 5000);
        let file_writes: Vec<_> = dev
            .commands()
            .into_iter()
            .filter(|c| c.kind == CommandKind::WriteFile)
            .map(|c| (c.address, c.data_count))
            .collect();
        assert_eq!(
            file_writes,
            vec![(0x7080_0000, 2048), (0x7080_0800, 2048), (0x7080_1000, 904)]
        );
        assert_eq!(dev.peek(0x7080_0000, 5000), pattern(5000));
        assert_eq!(
            session.platform().total_slept(),
            Duration::from_millis(30)
        );
    }

    #[test]
    fn test_load_image_missing_file() {
        let dev = SimulatedDevice::new();
        let session = sim_session(&dev);

        let err = session.load_image(0x1000, Path::new("nope.bin")).unwrap_err();

        assert!(matches!(err, SdpError::Io { .. }));
        assert!(dev.commands().is_empty());
    }

    #[test]
    fn test_load_image_stops_at_first_failed_chunk() {
        let dev = SimulatedDevice::new();
        dev.set_status_override(Some(0));
        let session = sim_session(&dev).with_max_download_size(1024);

        let err = session.load_bytes(0x1000, &pattern(4096)).unwrap_err();

        assert!(matches!(err, SdpError::StatusMismatch { .. }));
        assert_eq!(dev.count_commands(CommandKind::WriteFile), 1);
    }
}
