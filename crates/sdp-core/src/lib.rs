//! SDP-Core: i.MX50 Serial Download Protocol host driver in Rust.
//!
//! This crate talks to the i.MX50 boot ROM over USB-HID while the SoC sits in
//! serial download mode. It can read and write device memory, run register
//! scripts to bring up clocks and DRAM, load an image, inject a boot header
//! and jump to it.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Report layouts, command packing, DCD and IVT encoding
//! - **Transport**: HID communication abstraction (nusb, mock, simulated ROM)
//! - **Session**: The four report exchanges, events and platform hooks
//! - **Memory**: Read/write memory, registers, DCD, jump, error status
//! - **Boot**: IVT header injection and boot
//! - **Bring-up**: Built-in board profiles and TOML scripts
//!
//! # Example
//!
//! ```no_run
//! use sdp_core::{BoardProfile, NusbHidTransport, SdpSession, SessionConfig, StdPlatform};
//!
//! let config = SessionConfig::default();
//! let transport = NusbHidTransport::wait_for_device(
//!     config.vid,
//!     config.pid,
//!     config.poll_interval(),
//!     config.discovery_timeout(),
//!     &StdPlatform,
//! )
//! .expect("no device");
//!
//! let session = SdpSession::new(transport).configure(&config);
//! session.bring_up(BoardProfile::KindleMddr).expect("bring-up failed");
//! session.load_image(0x7080_0000, "uImage".as_ref()).expect("load failed");
//! session.boot(0x7080_0000, true).expect("boot failed");
//! ```

pub mod boot;
pub mod bringup;
pub mod config;
pub mod error;
pub mod events;
pub mod hexdump;
pub mod memory;
pub mod platform;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use bringup::{BoardProfile, BoardScript, BringUpStep};
pub use config::SessionConfig;
pub use error::SdpError;
pub use events::{NullObserver, PacketDirection, SdpEvent, SdpObserver, TracingObserver};
pub use hexdump::hex_dump;
pub use platform::{Platform, RecordingPlatform, StdPlatform};
pub use protocol::{CommandKind, DcdEntry, HabMode, IvtHeader, SdpCommand};
pub use session::SdpSession;
pub use transport::{
    HidTransport, MockTransport, NusbHidTransport, SimulatedDevice, TransportError,
};
