//! Interactive interface picker
//!
//! Thin adapter over `pnet_datalink`: the bootstrap only sees
//! `list_interfaces()` and `select_interface()`.

use std::io::{BufRead, Write};

use anyhow::{anyhow, Result};
use dronewarden_common::MacAddr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    pub name: String,
    pub mac: Option<MacAddr>,
}

/// Non-loopback interfaces, in system order.
pub fn list_interfaces() -> Vec<InterfaceInfo> {
    pnet_datalink::interfaces()
        .into_iter()
        .filter(|iface| !iface.is_loopback())
        .map(|iface| InterfaceInfo {
            mac: iface
                .mac
                .map(|m| MacAddr::new([m.0, m.1, m.2, m.3, m.4, m.5])),
            name: iface.name,
        })
        .collect()
}

/// Resolve `criteria` as an interface name, or else as a menu index.
pub fn select_interface<'a>(interfaces: &'a [InterfaceInfo], criteria: &str) -> Option<&'a InterfaceInfo> {
    let criteria = criteria.trim();
    interfaces
        .iter()
        .find(|iface| iface.name == criteria)
        .or_else(|| criteria.parse::<usize>().ok().and_then(|i| interfaces.get(i)))
}

/// Print the menu and read choices from `input` until one resolves.
pub fn prompt_interface<R, W>(interfaces: &[InterfaceInfo], mut input: R, mut output: W) -> Result<String>
where
    R: BufRead,
    W: Write,
{
    if interfaces.is_empty() {
        return Err(anyhow!("no usable network interface found"));
    }

    for (idx, iface) in interfaces.iter().enumerate() {
        match &iface.mac {
            Some(mac) => writeln!(output, "[{}] {} (MAC: {})", idx, iface.name, mac)?,
            None => writeln!(output, "[{}] {}", idx, iface.name)?,
        }
    }

    let mut line = String::new();
    loop {
        write!(output, "Select interface: ")?;
        output.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(anyhow!("no interface selected"));
        }
        match select_interface(interfaces, &line) {
            Some(iface) => return Ok(iface.name.clone()),
            None => writeln!(output, "Invalid choice '{}'", line.trim())?,
        }
    }
}
