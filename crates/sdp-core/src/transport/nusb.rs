//! nusb-based HID transport implementation.
//!
//! Output reports go out as HID SET_REPORT class requests on the control
//! pipe; input reports arrive on the interface's interrupt IN endpoint.

use nusb::io::EndpointRead;
use nusb::transfer::{ControlOut, ControlType, Interrupt, Recipient};
use nusb::{Interface, MaybeFuture, list_devices};
use std::io::Read;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use super::traits::{HidTransport, TransportError};
use crate::platform::Platform;

const HID_SET_REPORT: u8 = 0x09;
const HID_REPORT_TYPE_OUTPUT: u16 = 0x02;
const HID_INTERFACE: u8 = 0;
const CONTROL_TIMEOUT: Duration = Duration::from_millis(1000);
/// Interrupt IN transfer size; a multiple of the endpoint's packet size.
const READ_TRANSFER_SIZE: usize = 1024;

/// nusb-based HID transport.
pub struct NusbHidTransport {
    interface: Interface,
    reader: Mutex<EndpointRead<Interrupt>>,
    vid: u16,
    pid: u16,
}

impl NusbHidTransport {
    /// Open a device with specific VID/PID.
    #[instrument(level = "info", fields(vid = format!("{:04X}", vid), pid = format!("{:04X}", pid)))]
    pub fn open_with_ids(vid: u16, pid: u16) -> Result<Self, TransportError> {
        let device_info = list_devices()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?
            .find(|d| d.vendor_id() == vid && d.product_id() == pid)
            .ok_or(TransportError::DeviceNotFound { vid, pid })?;

        Self::open_device_info(device_info)
    }

    /// Block until a matching device shows up, polling every `poll_interval`.
    ///
    /// Without a timeout this only returns once a device is found or
    /// enumeration itself fails.
    pub fn wait_for_device<P: Platform>(
        vid: u16,
        pid: u16,
        poll_interval: Duration,
        timeout: Option<Duration>,
        platform: &P,
    ) -> Result<Self, TransportError> {
        info!("Waiting for device...");
        poll_for_device(platform, poll_interval, timeout, || {
            Self::open_with_ids(vid, pid)
        })
    }

    fn open_device_info(device_info: nusb::DeviceInfo) -> Result<Self, TransportError> {
        let vid = device_info.vendor_id();
        let pid = device_info.product_id();

        info!(
            vendor_id = %format!("{:04X}", vid),
            product_id = %format!("{:04X}", pid),
            "Found device"
        );

        let device = device_info
            .open()
            .wait()
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?;

        // The OS HID driver normally owns the interface.
        let interface = device
            .detach_and_claim_interface(HID_INTERFACE)
            .wait()
            .map_err(|e| TransportError::ClaimInterfaceFailed {
                interface: HID_INTERFACE,
                message: e.to_string(),
            })?;

        let mut in_endpoint: u8 = 0;

        for config in device.configurations() {
            for iface in config.interfaces() {
                if iface.interface_number() == HID_INTERFACE {
                    for alt in iface.alt_settings() {
                        for ep in alt.endpoints() {
                            if ep.transfer_type() == nusb::descriptors::TransferType::Interrupt
                                && ep.direction() == nusb::transfer::Direction::In
                            {
                                in_endpoint = ep.address();
                            }
                        }
                    }
                }
            }
        }

        if in_endpoint == 0 {
            return Err(TransportError::EndpointNotFound {
                ep_type: "Interrupt".into(),
                direction: "In".into(),
            });
        }

        let reader = interface
            .endpoint::<Interrupt, nusb::transfer::In>(in_endpoint)
            .map_err(|e| TransportError::OpenFailed(e.to_string()))?
            .reader(READ_TRANSFER_SIZE);

        info!(
            in_ep = %format!("0x{:02X}", in_endpoint),
            "Device opened successfully"
        );

        Ok(Self {
            interface,
            reader: Mutex::new(reader),
            vid,
            pid,
        })
    }
}

/// Retry `open` while it reports `DeviceNotFound`, sleeping through `platform`.
fn poll_for_device<T, P: Platform>(
    platform: &P,
    poll_interval: Duration,
    timeout: Option<Duration>,
    mut open: impl FnMut() -> Result<T, TransportError>,
) -> Result<T, TransportError> {
    let start = Instant::now();
    let mut waited = Duration::ZERO;
    let mut poll_count = 0u64;

    loop {
        poll_count += 1;

        match open() {
            Ok(t) => {
                info!("Device found after {} polls", poll_count);
                return Ok(t);
            }
            Err(TransportError::DeviceNotFound { .. }) => {
                if let Some(timeout) = timeout
                    && start.elapsed().max(waited) > timeout
                {
                    return Err(TransportError::DiscoveryTimeout {
                        timeout_secs: timeout.as_secs(),
                    });
                }
                platform.sleep(poll_interval);
                waited += poll_interval;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Read at most `len` bytes of one report from `report`, which signals the
/// report boundary with `Ok(0)`. Returns the bytes kept and how many trailing
/// bytes were discarded.
fn read_one_report<R: Read>(report: &mut R, len: usize) -> std::io::Result<(Vec<u8>, u64)> {
    let mut buf = vec![0u8; len];
    let mut n = 0;
    while n < len {
        match report.read(&mut buf[n..])? {
            0 => break,
            k => n += k,
        }
    }
    buf.truncate(n);

    let dropped = std::io::copy(report, &mut std::io::sink())?;
    Ok((buf, dropped))
}

impl HidTransport for NusbHidTransport {
    #[instrument(skip(self, report), fields(id = report.first().copied(), len = report.len()))]
    fn write(&self, report: &[u8]) -> Result<usize, TransportError> {
        let report_id = *report
            .first()
            .ok_or_else(|| TransportError::WriteFailed("empty report".into()))?;

        self.interface
            .control_out(
                ControlOut {
                    control_type: ControlType::Class,
                    recipient: Recipient::Interface,
                    request: HID_SET_REPORT,
                    value: (HID_REPORT_TYPE_OUTPUT << 8) | report_id as u16,
                    index: HID_INTERFACE as u16,
                    data: report,
                },
                CONTROL_TIMEOUT,
            )
            .wait()
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;

        debug!(bytes_written = report.len(), "Write complete");
        Ok(report.len())
    }

    /// Read one input report.
    ///
    /// A report ends with a short packet. Bytes past `len` are discarded so
    /// the next read starts on a report boundary.
    #[instrument(skip(self))]
    fn read(&self, len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        let mut reader = self
            .reader
            .lock()
            .map_err(|_| TransportError::ReadFailed("reader poisoned".into()))?;
        reader.set_read_timeout(timeout);

        let map_err = |e: std::io::Error| match e.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            },
            _ => TransportError::ReadFailed(e.to_string()),
        };

        let mut report = reader.until_short_packet();
        let (buf, dropped) = read_one_report(&mut report, len).map_err(map_err)?;
        if dropped > 0 {
            warn!(dropped, "Discarded bytes past the expected report length");
        }
        report
            .consume_end()
            .map_err(|_| TransportError::ReadFailed("report not terminated".into()))?;

        debug!(bytes_read = buf.len(), "Read complete");
        Ok(buf)
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}
