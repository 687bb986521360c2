//! Kernel device control through ioctl(2)
//!
//! Three primitives, each on a short-lived `AF_INET` datagram socket:
//! interface flags (`SIOCGIFFLAGS`/`SIOCSIFFLAGS`), wireless mode
//! (`SIOCSIWMODE`) and fixed frequency (`SIOCSIWFREQ`).

use std::io;

use dronewarden_common::Channel;

use crate::error::RfError;

pub const IFNAMSIZ: usize = 16;

const SIOCGIFFLAGS: u64 = 0x8913;
const SIOCSIFFLAGS: u64 = 0x8914;
const SIOCSIWFREQ: u64 = 0x8B04;
const SIOCSIWMODE: u64 = 0x8B06;

pub const IFF_UP: i16 = 0x1;

const IW_FREQ_FIXED: u8 = 0x01;

/// Wireless operating mode as understood by the wireless extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WirelessMode {
    Managed,
    Monitor,
}

impl WirelessMode {
    pub const fn iw_mode(&self) -> u32 {
        match self {
            WirelessMode::Managed => 2,
            WirelessMode::Monitor => 6,
        }
    }
}

impl std::fmt::Display for WirelessMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WirelessMode::Managed => f.write_str("managed"),
            WirelessMode::Monitor => f.write_str("monitor"),
        }
    }
}

/// OS device-configuration primitives consumed by the RF control layer.
pub trait DeviceControl: Send + Sync {
    fn get_flags(&self, interface: &str) -> Result<i16, RfError>;
    fn set_flags(&self, interface: &str, flags: i16) -> Result<(), RfError>;
    fn set_mode(&self, interface: &str, mode: WirelessMode) -> Result<(), RfError>;
    fn set_freq(&self, interface: &str, channel: &Channel) -> Result<(), RfError>;
}

// struct ifreq, flags member of the union
#[repr(C)]
struct IfReqFlags {
    name: [libc::c_char; IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

// struct iw_freq
#[repr(C)]
#[derive(Clone, Copy)]
struct IwFreq {
    m: i32,
    e: i16,
    i: u8,
    flags: u8,
}

// struct iwreq, mode member of the union
#[repr(C)]
struct IwReqMode {
    name: [libc::c_char; IFNAMSIZ],
    mode: u32,
    _pad: [u8; 12],
}

// struct iwreq, freq member of the union
#[repr(C)]
struct IwReqFreq {
    name: [libc::c_char; IFNAMSIZ],
    freq: IwFreq,
    _pad: [u8; 8],
}

fn ifname(interface: &str) -> Result<[libc::c_char; IFNAMSIZ], RfError> {
    let bytes = interface.as_bytes();
    if bytes.is_empty() || bytes.len() >= IFNAMSIZ || bytes.contains(&0) {
        return Err(RfError::InterfaceName(interface.to_string()));
    }
    let mut name = [0 as libc::c_char; IFNAMSIZ];
    for (dst, src) in name.iter_mut().zip(bytes) {
        *dst = *src as libc::c_char;
    }
    Ok(name)
}

/// Control socket, closed on drop.
struct ControlSocket(libc::c_int);

impl ControlSocket {
    fn open() -> Result<Self, RfError> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0) };
        if fd < 0 {
            return Err(RfError::Socket(io::Error::last_os_error()));
        }
        Ok(Self(fd))
    }

    fn ioctl<T>(&self, request: u64, arg: &mut T, op: &'static str, interface: &str) -> Result<(), RfError> {
        let rc = unsafe { libc::ioctl(self.0, request as _, arg as *mut T) };
        if rc < 0 {
            return Err(RfError::Ioctl {
                op,
                interface: interface.to_string(),
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.0);
        }
    }
}

/// `DeviceControl` backed by real ioctls. Needs root (CAP_NET_ADMIN).
#[derive(Debug, Default, Clone, Copy)]
pub struct IoctlControl;

impl IoctlControl {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl DeviceControl for IoctlControl {
    fn get_flags(&self, interface: &str) -> Result<i16, RfError> {
        let mut req = IfReqFlags {
            name: ifname(interface)?,
            flags: 0,
            _pad: [0; 22],
        };
        ControlSocket::open()?.ioctl(SIOCGIFFLAGS, &mut req, "SIOCGIFFLAGS", interface)?;
        Ok(req.flags)
    }

    fn set_flags(&self, interface: &str, flags: i16) -> Result<(), RfError> {
        let mut req = IfReqFlags {
            name: ifname(interface)?,
            flags,
            _pad: [0; 22],
        };
        ControlSocket::open()?.ioctl(SIOCSIFFLAGS, &mut req, "SIOCSIFFLAGS", interface)
    }

    fn set_mode(&self, interface: &str, mode: WirelessMode) -> Result<(), RfError> {
        let mut req = IwReqMode {
            name: ifname(interface)?,
            mode: mode.iw_mode(),
            _pad: [0; 12],
        };
        ControlSocket::open()?.ioctl(SIOCSIWMODE, &mut req, "SIOCSIWMODE", interface)
    }

    fn set_freq(&self, interface: &str, channel: &Channel) -> Result<(), RfError> {
        // m < 1000 with e == 0 is read by the kernel as a channel number
        let mut req = IwReqFreq {
            name: ifname(interface)?,
            freq: IwFreq {
                m: i32::from(channel.number),
                e: 0,
                i: 0,
                flags: IW_FREQ_FIXED,
            },
            _pad: [0; 8],
        };
        ControlSocket::open()?.ioctl(SIOCSIWFREQ, &mut req, "SIOCSIWFREQ", interface)
    }
}

#[cfg(not(target_os = "linux"))]
impl DeviceControl for IoctlControl {
    fn get_flags(&self, _interface: &str) -> Result<i16, RfError> {
        Err(RfError::Unsupported)
    }

    fn set_flags(&self, _interface: &str, _flags: i16) -> Result<(), RfError> {
        Err(RfError::Unsupported)
    }

    fn set_mode(&self, _interface: &str, _mode: WirelessMode) -> Result<(), RfError> {
        Err(RfError::Unsupported)
    }

    fn set_freq(&self, _interface: &str, _channel: &Channel) -> Result<(), RfError> {
        Err(RfError::Unsupported)
    }
}
