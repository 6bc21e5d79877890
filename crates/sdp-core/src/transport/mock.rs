//! Mock HID transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{HidTransport, TransportError};
use crate::protocol::constants::*;
use crate::protocol::HabMode;

/// Scripted transport: returns queued input reports in order and records
/// every output report.
#[derive(Clone)]
pub struct MockTransport {
    /// Queued input reports to return on read.
    report_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Captured writes.
    write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Simulated VID/PID.
    vid: u16,
    pid: u16,
    /// Whether device is "connected".
    connected: Arc<Mutex<bool>>,
    /// Bytes accepted per write, to simulate short writes.
    write_limit: Arc<Mutex<Option<usize>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            report_queue: Arc::new(Mutex::new(VecDeque::new())),
            write_log: Arc::new(Mutex::new(Vec::new())),
            vid: FREESCALE_VENDOR_ID,
            pid: IMX50_PRODUCT_ID,
            connected: Arc::new(Mutex::new(true)),
            write_limit: Arc::new(Mutex::new(None)),
        }
    }

    /// Queue a raw input report to be returned on next read.
    pub fn queue_report(&self, report: &[u8]) {
        self.report_queue.lock().unwrap().push_back(report.to_vec());
    }

    /// Queue a HAB mode report (report 3).
    pub fn queue_hab(&self, mode: HabMode) {
        let mut report = vec![REPORT_ID_HAB_MODE];
        report.extend_from_slice(&mode.raw().to_le_bytes());
        self.queue_report(&report);
    }

    /// Queue a status report (report 4) carrying a status word.
    pub fn queue_status(&self, status: u32) {
        self.queue_status_payload(&status.to_be_bytes());
    }

    /// Queue a status report (report 4) carrying raw payload bytes,
    /// zero-padded to 64.
    pub fn queue_status_payload(&self, payload: &[u8]) {
        let mut report = vec![0u8; REPORT_STATUS_SIZE];
        report[0] = REPORT_ID_STATUS;
        let n = payload.len().min(MAX_STATUS_PAYLOAD);
        report[1..1 + n].copy_from_slice(&payload[..n]);
        self.queue_report(&report);
    }

    /// Number of input reports not yet read.
    pub fn pending_reports(&self) -> usize {
        self.report_queue.lock().unwrap().len()
    }

    /// Get all captured writes.
    pub fn get_writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Accept at most `limit` bytes per write from now on.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        *self.write_limit.lock().unwrap() = limit;
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }

    /// Simulate device reconnect.
    pub fn reconnect(&self) {
        *self.connected.lock().unwrap() = true;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for MockTransport {
    fn write(&self, report: &[u8]) -> Result<usize, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.write_log.lock().unwrap().push(report.to_vec());
        let accepted = match *self.write_limit.lock().unwrap() {
            Some(limit) => report.len().min(limit),
            None => report.len(),
        };
        Ok(accepted)
    }

    fn read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        let mut report = self
            .report_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?;
        report.truncate(len);
        Ok(report)
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_ack, decode_hab_mode};

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[test]
    fn test_mock_report_queue() {
        let mock = MockTransport::new();
        mock.queue_hab(HabMode::Engineering);
        mock.queue_status(ACK_WRITE_COMPLETE);

        let hab = mock.read(REPORT_HAB_MODE_SIZE, TIMEOUT).unwrap();
        assert_eq!(decode_hab_mode(&hab), HabMode::Engineering);

        let status = mock.read(REPORT_STATUS_SIZE, TIMEOUT).unwrap();
        assert_eq!(status.len(), REPORT_STATUS_SIZE);
        assert_eq!(decode_ack(&status), ACK_WRITE_COMPLETE);

        // Queue is empty now
        assert!(matches!(
            mock.read(REPORT_STATUS_SIZE, TIMEOUT),
            Err(TransportError::Timeout { timeout_ms: 100 })
        ));
    }

    #[test]
    fn test_mock_write_capture() {
        let mock = MockTransport::new();
        mock.write(&[REPORT_ID_DATA, b'a']).unwrap();
        mock.write(&[REPORT_ID_DATA, b'b']).unwrap();

        let writes = mock.get_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1], vec![REPORT_ID_DATA, b'b']);

        mock.clear_writes();
        assert!(mock.get_writes().is_empty());
    }

    #[test]
    fn test_mock_short_write_and_disconnect() {
        let mock = MockTransport::new();
        mock.set_write_limit(Some(3));
        assert_eq!(mock.write(&[0u8; 17]).unwrap(), 3);

        mock.disconnect();
        assert!(mock.write(b"test").is_err());
        assert!(mock.read(5, TIMEOUT).is_err());
        mock.reconnect();
        assert!(mock.write(b"test").is_ok());
    }
}
