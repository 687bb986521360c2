//! Interface state, mode and channel sequencing

use dronewarden_common::Channel;
use tracing::debug;

use crate::error::RfError;
use crate::ioctl::{DeviceControl, WirelessMode, IFF_UP};

/// Raise or lower the administrative-up flag, preserving the others.
pub fn set_interface_state<C>(ctl: &C, interface: &str, up: bool) -> Result<(), RfError>
where
    C: DeviceControl + ?Sized,
{
    let flags = ctl.get_flags(interface)?;
    let flags = if up { flags | IFF_UP } else { flags & !IFF_UP };
    ctl.set_flags(interface, flags)?;

    debug!("{} is now {}", interface, if up { "up" } else { "down" });
    Ok(())
}

/// Switch wireless mode: down, apply mode, up. Stops at the first failure.
pub fn switch_mode<C>(ctl: &C, interface: &str, mode: WirelessMode) -> Result<(), RfError>
where
    C: DeviceControl + ?Sized,
{
    set_interface_state(ctl, interface, false)?;
    ctl.set_mode(interface, mode)?;
    set_interface_state(ctl, interface, true)?;

    debug!("{} switched to {} mode", interface, mode);
    Ok(())
}

/// Tune to a fixed channel.
#[inline]
pub fn set_channel<C>(ctl: &C, interface: &str, channel: &Channel) -> Result<(), RfError>
where
    C: DeviceControl + ?Sized,
{
    ctl.set_freq(interface, channel)
}
