//! Protocol module - SDP wire format definitions.

pub mod ack;
pub mod command;
pub mod constants;
pub mod dcd;
pub mod ivt;

pub use ack::{AckPayload, HabMode, decode_ack, decode_hab_mode};
pub use command::{CommandKind, SdpCommand, decode_command, encode_command};
pub use constants::*;
pub use dcd::{DcdEntry, decode_dcd_entries, encode_dcd_entries};
pub use ivt::{IvtError, IvtHeader};
