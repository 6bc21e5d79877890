//! In-memory model of the i.MX50 serial download ROM.
//!
//! Unlike `MockTransport`, which replays a script, `SimulatedDevice` parses
//! every command and data report, keeps a sparse memory image and produces
//! the HAB/status reports the real ROM would. Faults can be injected to
//! exercise error paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{HidTransport, TransportError};
use crate::protocol::constants::*;
use crate::protocol::{CommandKind, HabMode, SdpCommand, decode_command, decode_dcd_entries};

enum Pending {
    File { address: u32, offset: u32, remaining: u32 },
    Dcd { expected: usize, payload: Vec<u8> },
}

struct DeviceState {
    memory: HashMap<u32, u8>,
    responses: VecDeque<Vec<u8>>,
    pending: Option<Pending>,
    hab: HabMode,
    error_status: u32,
    status_override: Option<u32>,
    corrupt_reads: bool,
    commands: Vec<SdpCommand>,
    data_reports: Vec<usize>,
    jumps: Vec<u32>,
}

impl DeviceState {
    fn store(&mut self, address: u32, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.memory.insert(address.wrapping_add(i as u32), b);
        }
    }

    fn fetch(&self, address: u32, len: usize) -> Vec<u8> {
        (0..len)
            .map(|i| {
                *self
                    .memory
                    .get(&address.wrapping_add(i as u32))
                    .unwrap_or(&0)
            })
            .collect()
    }

    fn push_hab(&mut self) {
        let mut report = vec![REPORT_ID_HAB_MODE];
        report.extend_from_slice(&self.hab.raw().to_le_bytes());
        self.responses.push_back(report);
    }

    fn push_status_payload(&mut self, payload: &[u8]) {
        let mut report = vec![0u8; REPORT_STATUS_SIZE];
        report[0] = REPORT_ID_STATUS;
        report[1..1 + payload.len()].copy_from_slice(payload);
        self.responses.push_back(report);
    }

    fn push_status(&mut self, status: u32) {
        let status = self.status_override.unwrap_or(status);
        self.push_status_payload(&status.to_be_bytes());
    }

    fn on_command(&mut self, cmd: SdpCommand) {
        self.commands.push(cmd);
        match cmd.kind {
            CommandKind::ReadRegister => {
                self.push_hab();
                let data = self.fetch(cmd.address, cmd.data_count as usize);
                for chunk in data.chunks(MAX_STATUS_PAYLOAD) {
                    let mut chunk = chunk.to_vec();
                    if self.corrupt_reads {
                        chunk[0] ^= 0xFF;
                    }
                    self.push_status_payload(&chunk);
                }
            }
            CommandKind::WriteRegister => {
                let width = match cmd.format {
                    8 => 1,
                    16 => 2,
                    _ => 4,
                };
                let value = cmd.data.to_le_bytes();
                self.store(cmd.address, &value[..width]);
                self.push_hab();
                self.push_status(ACK_WRITE_COMPLETE);
            }
            CommandKind::WriteFile => {
                self.pending = Some(Pending::File {
                    address: cmd.address,
                    offset: 0,
                    remaining: cmd.data_count,
                });
                self.finish_pending_if_done();
            }
            CommandKind::DcdWrite => {
                self.pending = Some(Pending::Dcd {
                    expected: cmd.data_count as usize * 12,
                    payload: Vec::new(),
                });
                self.finish_pending_if_done();
            }
            CommandKind::ErrorStatus => {
                self.push_hab();
                let status = self.error_status;
                self.push_status_payload(&status.to_be_bytes());
            }
            CommandKind::JumpAddress => {
                self.push_hab();
                self.jumps.push(cmd.address);
            }
        }
    }

    fn on_data(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        self.data_reports.push(payload.len());
        let file_write = match self.pending.as_mut() {
            Some(Pending::File {
                address,
                offset,
                remaining,
            }) => {
                let n = payload.len().min(*remaining as usize);
                let target = address.wrapping_add(*offset);
                *offset += n as u32;
                *remaining -= n as u32;
                Some((target, n))
            }
            Some(Pending::Dcd { payload: buf, .. }) => {
                buf.extend_from_slice(payload);
                None
            }
            None => return Err(TransportError::WriteFailed("unexpected data report".into())),
        };
        if let Some((target, n)) = file_write {
            self.store(target, &payload[..n]);
        }
        self.finish_pending_if_done();
        Ok(())
    }

    fn finish_pending_if_done(&mut self) {
        match self.pending.take() {
            Some(Pending::File { remaining: 0, .. }) => {
                self.push_hab();
                self.push_status(ACK_FILE_COMPLETE);
            }
            Some(Pending::Dcd { expected, payload }) if payload.len() >= expected => {
                for entry in decode_dcd_entries(&payload[..expected]) {
                    self.store(entry.address, &entry.value.to_le_bytes());
                }
                self.push_hab();
                self.push_status(ACK_WRITE_COMPLETE);
            }
            other => self.pending = other,
        }
    }
}

/// Behavioural i.MX50 ROM simulator.
#[derive(Clone)]
pub struct SimulatedDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl SimulatedDevice {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                memory: HashMap::new(),
                responses: VecDeque::new(),
                pending: None,
                hab: HabMode::Engineering,
                error_status: STATUS_CODE_OK,
                status_override: None,
                corrupt_reads: false,
                commands: Vec::new(),
                data_reports: Vec::new(),
                jumps: Vec::new(),
            })),
        }
    }

    /// Preload device memory.
    pub fn load(&self, address: u32, bytes: &[u8]) {
        self.state.lock().unwrap().store(address, bytes);
    }

    /// Inspect device memory; unwritten bytes read as zero.
    pub fn peek(&self, address: u32, len: usize) -> Vec<u8> {
        self.state.lock().unwrap().fetch(address, len)
    }

    pub fn peek_u32(&self, address: u32) -> u32 {
        let bytes = self.peek(address, 4);
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    pub fn set_hab_mode(&self, mode: HabMode) {
        self.state.lock().unwrap().hab = mode;
    }

    /// Value returned by ERROR_STATUS.
    pub fn set_error_status(&self, status: u32) {
        self.state.lock().unwrap().error_status = status;
    }

    /// Replace every write/file completion code with `status`.
    pub fn set_status_override(&self, status: Option<u32>) {
        self.state.lock().unwrap().status_override = status;
    }

    /// Flip the first byte of every read-back chunk.
    pub fn set_corrupt_reads(&self, corrupt: bool) {
        self.state.lock().unwrap().corrupt_reads = corrupt;
    }

    /// Every command received, in order.
    pub fn commands(&self) -> Vec<SdpCommand> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn count_commands(&self, kind: CommandKind) -> usize {
        self.state
            .lock()
            .unwrap()
            .commands
            .iter()
            .filter(|c| c.kind == kind)
            .count()
    }

    /// Payload length of every data report received, in order.
    pub fn data_reports(&self) -> Vec<usize> {
        self.state.lock().unwrap().data_reports.clone()
    }

    /// Addresses the host asked the ROM to jump to.
    pub fn jumps(&self) -> Vec<u32> {
        self.state.lock().unwrap().jumps.clone()
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HidTransport for SimulatedDevice {
    fn write(&self, report: &[u8]) -> Result<usize, TransportError> {
        let mut state = self.state.lock().unwrap();
        match report.first() {
            Some(&REPORT_ID_SDP_CMD) => {
                let cmd = decode_command(report)
                    .ok_or_else(|| TransportError::WriteFailed("malformed command".into()))?;
                state.on_command(cmd);
            }
            Some(&REPORT_ID_DATA) => state.on_data(&report[1..])?,
            _ => return Err(TransportError::WriteFailed("unknown output report".into())),
        }
        Ok(report.len())
    }

    fn read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut report = self
            .state
            .lock()
            .unwrap()
            .responses
            .pop_front()
            .ok_or(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?;
        report.truncate(len);
        Ok(report)
    }

    fn vendor_id(&self) -> u16 {
        FREESCALE_VENDOR_ID
    }

    fn product_id(&self) -> u16 {
        IMX50_PRODUCT_ID
    }
}
