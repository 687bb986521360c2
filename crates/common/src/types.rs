//! Core data types shared across the capture pipeline
//!
//! Hot-path types (`MacAddr`, `MessageType`) are `Copy` and carry small
//! `#[inline]` helpers; everything that crosses the telemetry boundary
//! serializes to the JSON shape the remote API expects.

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::WardenError;

/// 48-bit IEEE 802 MAC address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
    pub const ZERO: MacAddr = MacAddr([0; 6]);

    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Build from a slice that must be exactly 6 bytes long.
    #[inline]
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; 6] = data.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Parse `aa:bb:cc:dd:ee:ff` (also accepts `-` separators).
    pub fn parse(s: &str) -> Result<Self, WardenError> {
        let parts: Vec<&str> = s.trim().split(|c: char| c == ':' || c == '-').collect();
        if parts.len() != 6 {
            return Err(WardenError::InvalidMac(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (slot, part) in bytes.iter_mut().zip(parts) {
            if part.len() != 2 {
                return Err(WardenError::InvalidMac(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| WardenError::InvalidMac(s.to_string()))?;
        }
        Ok(Self(bytes))
    }

    /// Organizationally unique identifier (first three octets).
    #[inline]
    #[must_use]
    pub fn oui(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    #[inline]
    #[must_use]
    pub const fn octets(&self) -> &[u8; 6] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_broadcast(&self) -> bool {
        self.0 == [0xff; 6]
    }

    #[inline]
    #[must_use]
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 != 0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl FromStr for MacAddr {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Kind of 802.11 traffic a detection was raised for.
///
/// Serialized as its numeric code (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    Undefined = 0,
    ProbeRequest = 1,
    Beacon = 2,
    Data = 3,
}

impl MessageType {
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            MessageType::Undefined => "Undefined",
            MessageType::ProbeRequest => "ProbeRequest",
            MessageType::Beacon => "Beacon",
            MessageType::Data => "Data",
        }
    }

    #[inline]
    #[must_use]
    pub const fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// A flagged frame turned into a reportable event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    #[serde(rename = "ts")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "host")]
    pub hostname: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(rename = "strength")]
    pub signal_dbm: i8,
    #[serde(rename = "frequency")]
    pub frequency_mhz: u16,
    pub vendor: String,
    #[serde(rename = "macaddr")]
    pub mac: MacAddr,
}

impl Detection {
    /// New detection stamped with the current time. The hostname is filled
    /// in by the probe when the detection is reported.
    #[must_use]
    pub fn new<S: Into<String>>(message_type: MessageType, vendor: S, mac: MacAddr) -> Self {
        Self {
            timestamp: Utc::now(),
            hostname: String::new(),
            message_type,
            signal_dbm: 0,
            frequency_mhz: 0,
            vendor: vendor.into(),
            mac,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_radio(mut self, signal_dbm: i8, frequency_mhz: u16) -> Self {
        self.signal_dbm = signal_dbm;
        self.frequency_mhz = frequency_mhz;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_hostname<S: Into<String>>(mut self, hostname: S) -> Self {
        self.hostname = hostname.into();
        self
    }
}

/// Lifecycle of the local probe. Ordered: a probe only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ProbeState {
    Awake = 0,
    Running = 1,
    Shutdown = 2,
    Stopped = 3,
}

impl ProbeState {
    #[inline]
    #[must_use]
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => ProbeState::Awake,
            1 => ProbeState::Running,
            2 => ProbeState::Shutdown,
            _ => ProbeState::Stopped,
        }
    }
}

impl fmt::Display for ProbeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProbeState::Awake => "AWAKE",
            ProbeState::Running => "RUNNING",
            ProbeState::Shutdown => "SHUTDOWN",
            ProbeState::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// Frequency band scanned by the channel hopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Band {
    #[default]
    TwoGhz,
    FiveGhz,
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Band::TwoGhz => f.write_str("2.4GHz"),
            Band::FiveGhz => f.write_str("5GHz"),
        }
    }
}

/// One RF channel: frequency expressed as `mantissa * 10^exponent` Hz,
/// plus the 802.11 channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub mantissa: i32,
    pub exponent: i16,
    pub number: u8,
}

impl Channel {
    #[inline]
    #[must_use]
    pub const fn new(mantissa: i32, exponent: i16, number: u8) -> Self {
        Self {
            mantissa,
            exponent,
            number,
        }
    }

    /// Centre frequency in MHz.
    #[must_use]
    pub fn frequency_mhz(&self) -> u32 {
        let mut value = i64::from(self.mantissa);
        let mut exp = i32::from(self.exponent) - 6;
        while exp > 0 {
            value *= 10;
            exp -= 1;
        }
        while exp < 0 {
            value /= 10;
            exp += 1;
        }
        value.max(0) as u32
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{} ({} MHz)", self.number, self.frequency_mhz())
    }
}

/// One captured packet, owned. Discarded after processing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    pub data: Vec<u8>,
}

impl RawFrame {
    #[inline]
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of one read from a capture backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Frame(RawFrame),
    /// No frame arrived within the backend's read timeout.
    Timeout,
    /// The source has no more frames (end of an offline file).
    Exhausted,
}
