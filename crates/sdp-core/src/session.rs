//! SDP session: the four report exchanges every operation is built from.
//!
//! A session owns one transport for a connect-configure-load-jump sequence.
//! Each exchange is a single report written or read; nothing is retried.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

use crate::config::SessionConfig;
use crate::error::{Result, SdpError};
use crate::events::{PacketDirection, SdpEvent, SdpObserver, TracingObserver};
use crate::platform::{Platform, StdPlatform};
use crate::protocol::{
    AckPayload, HabMode, MAX_DATA_PAYLOAD, MAX_DOWNLOAD_SIZE, REPORT_HAB_MODE_SIZE,
    REPORT_ID_DATA, REPORT_ID_HAB_MODE, REPORT_ID_STATUS, REPORT_STATUS_SIZE, SdpCommand,
    decode_hab_mode, encode_command,
};
use crate::transport::{HidTransport, TransportError};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(5000);

/// One SDP conversation with a device.
pub struct SdpSession<T: HidTransport, O: SdpObserver = TracingObserver, P: Platform = StdPlatform>
{
    transport: T,
    observer: Arc<O>,
    platform: P,
    read_timeout: Duration,
    max_download_size: usize,
}

impl<T: HidTransport> SdpSession<T> {
    /// Create a session logging through tracing and using the real clock and filesystem.
    pub fn new(transport: T) -> Self {
        Self::with_parts(transport, Arc::new(TracingObserver), StdPlatform)
    }
}

impl<T: HidTransport, O: SdpObserver, P: Platform> SdpSession<T, O, P> {
    /// Create a session with a custom observer and platform.
    pub fn with_parts(transport: T, observer: Arc<O>, platform: P) -> Self {
        observer.on_event(&SdpEvent::DeviceConnected {
            vid: transport.vendor_id(),
            pid: transport.product_id(),
        });

        Self {
            transport,
            observer,
            platform,
            read_timeout: DEFAULT_READ_TIMEOUT,
            max_download_size: MAX_DOWNLOAD_SIZE,
        }
    }

    /// Apply timeouts and chunk sizes from a loaded configuration.
    pub fn configure(self, config: &SessionConfig) -> Self {
        self.with_read_timeout(config.read_timeout())
            .with_max_download_size(config.max_download_size)
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Largest chunk a single WRITE_FILE carries when loading images.
    ///
    /// Zero is treated as one byte so loading always makes progress.
    pub fn with_max_download_size(mut self, size: usize) -> Self {
        self.max_download_size = size.max(1);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn max_download_size(&self) -> usize {
        self.max_download_size
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub(crate) fn emit(&self, event: SdpEvent) {
        self.observer.on_event(&event);
    }

    pub fn sleep(&self, duration: Duration) {
        self.platform.sleep(duration);
    }

    pub fn read_file(&self, path: &Path) -> Result<Vec<u8>> {
        self.platform.read_file(path).map_err(|source| SdpError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Encode `cmd` and write it as one command report.
    #[instrument(skip(self), fields(kind = %cmd.kind, address = %format!("0x{:08X}", cmd.address)))]
    pub fn send_command(&self, cmd: &SdpCommand) -> Result<()> {
        self.emit(SdpEvent::Command {
            kind: cmd.kind,
            address: cmd.address,
            data_count: cmd.data_count,
        });

        let report = encode_command(cmd);
        self.write_report(&report)
            .map_err(|source| SdpError::Command {
                kind: cmd.kind,
                source,
            })
    }

    /// Write up to 1024 payload bytes as one data report.
    pub fn send_data(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > MAX_DATA_PAYLOAD {
            return Err(SdpError::Parameter(format!(
                "data payload of {} bytes exceeds {} bytes",
                payload.len(),
                MAX_DATA_PAYLOAD
            )));
        }

        let mut report = Vec::with_capacity(payload.len() + 1);
        report.push(REPORT_ID_DATA);
        report.extend_from_slice(payload);

        self.write_report(&report)
            .map_err(|source| SdpError::TransportWrite { source })
    }

    /// Read the HAB mode report that follows every command.
    pub fn read_hab_mode(&self) -> Result<HabMode> {
        let report = self
            .read_report(REPORT_ID_HAB_MODE, REPORT_HAB_MODE_SIZE)
            .map_err(|source| SdpError::TransportRead {
                report: "HAB mode",
                source,
            })?;

        let mode = decode_hab_mode(&report);
        self.emit(SdpEvent::HabMode { mode });
        Ok(mode)
    }

    /// Read one status report and return its 64 payload bytes.
    pub fn read_ack(&self) -> Result<AckPayload> {
        let report = self
            .read_report(REPORT_ID_STATUS, REPORT_STATUS_SIZE)
            .map_err(|source| SdpError::TransportRead {
                report: "status",
                source,
            })?;

        Ok(AckPayload::from_report(&report))
    }

    fn write_report(&self, report: &[u8]) -> std::result::Result<(), TransportError> {
        let written = self.transport.write(report)?;
        self.emit(SdpEvent::Packet {
            direction: PacketDirection::Tx,
            report_id: report[0],
            length: written,
            data: Some(report.to_vec()),
        });

        if written != report.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: report.len(),
            });
        }
        Ok(())
    }

    /// Read one input report, which must be a complete report `id`.
    fn read_report(&self, id: u8, len: usize) -> std::result::Result<Vec<u8>, TransportError> {
        let report = self.transport.read(len, self.read_timeout)?;
        if report.is_empty() {
            return Err(TransportError::ReadFailed("empty report".into()));
        }

        self.emit(SdpEvent::Packet {
            direction: PacketDirection::Rx,
            report_id: report[0],
            length: report.len(),
            data: Some(report.clone()),
        });

        if report[0] != id {
            return Err(TransportError::ReadFailed(format!(
                "expected report {}, got report {}",
                id, report[0]
            )));
        }
        if report.len() < len {
            return Err(TransportError::ReadFailed(format!(
                "short report {}: {} of {} bytes",
                id,
                report.len(),
                len
            )));
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullObserver;
    use crate::events::tests::CollectingObserver;
    use crate::platform::RecordingPlatform;
    use crate::protocol::{CommandKind, REPORT_ID_SDP_CMD};
    use crate::transport::MockTransport;

    fn session(mock: &MockTransport) -> SdpSession<MockTransport, NullObserver, RecordingPlatform> {
        SdpSession::with_parts(mock.clone(), Arc::new(NullObserver), RecordingPlatform::new())
    }

    #[test]
    fn test_send_command_writes_one_report() {
        let mock = MockTransport::new();
        let session = session(&mock);

        session.send_command(&SdpCommand::jump(0x7080_0000)).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].len(), 17);
        assert_eq!(writes[0][0], REPORT_ID_SDP_CMD);
    }

    #[test]
    fn test_send_command_short_write() {
        let mock = MockTransport::new();
        mock.set_write_limit(Some(8));
        let session = session(&mock);

        let err = session.send_command(&SdpCommand::error_status()).unwrap_err();
        match err {
            SdpError::Command { kind, source } => {
                assert_eq!(kind, CommandKind::ErrorStatus);
                assert!(matches!(
                    source,
                    TransportError::ShortWrite {
                        written: 8,
                        expected: 17
                    }
                ));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_send_command_disconnected() {
        let mock = MockTransport::new();
        mock.disconnect();
        let session = session(&mock);

        let err = session.send_command(&SdpCommand::error_status()).unwrap_err();
        assert!(matches!(err, SdpError::Command { .. }));
    }

    #[test]
    fn test_send_data_prepends_report_id() {
        let mock = MockTransport::new();
        let session = session(&mock);

        session.send_data(&[0xAA; 10]).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes[0].len(), 11);
        assert_eq!(writes[0][0], REPORT_ID_DATA);
        assert!(writes[0][1..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn test_send_data_rejects_oversized_payload() {
        let mock = MockTransport::new();
        let session = session(&mock);

        let err = session.send_data(&[0u8; MAX_DATA_PAYLOAD + 1]).unwrap_err();
        assert!(matches!(err, SdpError::Parameter(_)));
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_send_data_short_write() {
        let mock = MockTransport::new();
        mock.set_write_limit(Some(100));
        let session = session(&mock);

        let err = session.send_data(&[0u8; 1024]).unwrap_err();
        assert!(matches!(err, SdpError::TransportWrite { .. }));
    }

    #[test]
    fn test_read_hab_mode() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        let session = session(&mock);

        assert_eq!(session.read_hab_mode().unwrap(), HabMode::Engineering);
    }

    #[test]
    fn test_read_ack_rejects_short_report() {
        let mock = MockTransport::new();
        mock.queue_report(&[REPORT_ID_STATUS, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        let session = session(&mock);

        let err = session.read_ack().unwrap_err();
        assert!(matches!(
            err,
            SdpError::TransportRead {
                report: "status",
                source: TransportError::ReadFailed(_)
            }
        ));
    }

    #[test]
    fn test_read_hab_mode_rejects_short_report() {
        let mock = MockTransport::new();
        mock.queue_report(&[REPORT_ID_HAB_MODE, 0x12]);
        let session = session(&mock);

        let err = session.read_hab_mode().unwrap_err();
        assert!(matches!(
            err,
            SdpError::TransportRead {
                report: "HAB mode",
                source: TransportError::ReadFailed(_)
            }
        ));
    }

    #[test]
    fn test_read_ack_rejects_wrong_report_id() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        let session = session(&mock);

        let err = session.read_ack().unwrap_err();
        assert!(matches!(
            err,
            SdpError::TransportRead {
                report: "status",
                source: TransportError::ReadFailed(_)
            }
        ));
    }

    #[test]
    fn test_read_ack_timeout_names_report() {
        let mock = MockTransport::new();
        let session = session(&mock);

        let err = session.read_ack().unwrap_err();
        match err {
            SdpError::TransportRead { report, source } => {
                assert_eq!(report, "status");
                assert!(matches!(source, TransportError::Timeout { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_packets_reach_observer() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Production);
        let observer = Arc::new(CollectingObserver::default());
        let session =
            SdpSession::with_parts(mock.clone(), observer.clone(), RecordingPlatform::new());

        session.send_command(&SdpCommand::error_status()).unwrap();
        session.read_hab_mode().unwrap();

        let events = observer.events.lock().unwrap();
        let packets: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                SdpEvent::Packet {
                    direction,
                    report_id,
                    ..
                } => Some((*direction, *report_id)),
                _ => None,
            })
            .collect();
        assert_eq!(
            packets,
            vec![(PacketDirection::Tx, 1), (PacketDirection::Rx, 3)]
        );
        assert!(matches!(events[0], SdpEvent::DeviceConnected { .. }));
    }

    #[test]
    fn test_read_file_maps_io_error() {
        let mock = MockTransport::new();
        let session = session(&mock);

        let err = session.read_file(Path::new("missing.bin")).unwrap_err();
        assert!(matches!(err, SdpError::Io { .. }));
    }
}
