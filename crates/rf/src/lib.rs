//! RF / interface control
//!
//! Puts a wireless interface into monitor mode, tunes it, and hops across
//! the channels of a band while capture runs.

pub mod channels;
pub mod control;
pub mod error;
pub mod hopper;
pub mod ioctl;

pub use channels::{channel_table, ChannelCycle, CHANNELS_2GHZ, CHANNELS_5GHZ};
pub use control::{set_channel, set_interface_state, switch_mode};
pub use error::RfError;
pub use hopper::{run_channel_hopper, DEFAULT_DWELL};
pub use ioctl::{DeviceControl, IoctlControl, WirelessMode};
