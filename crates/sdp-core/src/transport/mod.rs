//! Transport layer module.

pub mod mock;
pub mod nusb;
pub mod simulated;
pub mod traits;

pub use mock::MockTransport;
pub use nusb::NusbHidTransport;
pub use simulated::SimulatedDevice;
pub use traits::{HidTransport, TransportError};
