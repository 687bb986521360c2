//! libpcap capture backend
//!
//! One handle serves both directions: frames are read from it and deauth
//! bursts are written back through it. Live handles use a short read
//! timeout so the capture loop can observe shutdown on a quiet channel.

use std::path::Path;

use dronewarden_common::{FrameInjector, FrameSource, RawFrame, ReadOutcome, WardenError, WardenResult};
use pcap::{Activated, Capture, Linktype};
use tracing::{debug, warn};

use crate::error::Dot11Error;

/// Capture parameters for a live device.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub snaplen: i32,
    pub promiscuous: bool,
    pub immediate: bool,
    pub timeout_ms: i32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            snaplen: 1600,
            promiscuous: true,
            immediate: true,
            timeout_ms: 500,
        }
    }
}

pub struct PcapHandle {
    cap: Capture<dyn Activated>,
    source: String,
}

impl PcapHandle {
    /// Open a live capture on `interface`.
    pub fn open_live(interface: &str, config: &LiveConfig) -> Result<Self, Dot11Error> {
        let cap = Capture::from_device(interface)?
            .snaplen(config.snaplen)
            .promisc(config.promiscuous)
            .immediate_mode(config.immediate)
            .timeout(config.timeout_ms)
            .open()?;

        debug!("Opened live capture on {} ({:?})", interface, config);
        Ok(Self::from_capture(cap.into(), interface.to_string()))
    }

    /// Open a pcap file for replay.
    pub fn open_offline<P: AsRef<Path>>(path: P) -> Result<Self, Dot11Error> {
        let cap = Capture::from_file(path.as_ref())?;
        let source = path.as_ref().display().to_string();

        debug!("Opened capture file {}", source);
        Ok(Self::from_capture(cap.into(), source))
    }

    fn from_capture(cap: Capture<dyn Activated>, source: String) -> Self {
        let linktype = cap.get_datalink();
        if linktype != Linktype::IEEE802_11_RADIOTAP {
            warn!(
                "{}: link type {:?} is not radiotap, frames will not decode",
                source, linktype
            );
        }
        Self { cap, source }
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl FrameSource for PcapHandle {
    fn next_frame(&mut self) -> WardenResult<ReadOutcome> {
        match self.cap.next_packet() {
            Ok(packet) => Ok(ReadOutcome::Frame(RawFrame::new(packet.data.to_vec()))),
            Err(pcap::Error::TimeoutExpired) => Ok(ReadOutcome::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(ReadOutcome::Exhausted),
            Err(e) => Err(WardenError::Capture(format!("{}: {}", self.source, e))),
        }
    }
}

impl FrameInjector for PcapHandle {
    fn write_raw(&mut self, bytes: &[u8]) -> WardenResult<()> {
        self.cap
            .sendpacket(bytes)
            .map_err(|e| WardenError::Inject(format!("{}: {}", self.source, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_defaults() {
        let cfg = LiveConfig::default();
        assert_eq!(cfg.snaplen, 1600);
        assert!(cfg.promiscuous);
        assert!(cfg.immediate);
        assert_eq!(cfg.timeout_ms, 500);
    }

    #[test]
    fn test_open_offline_missing_file() {
        let r = PcapHandle::open_offline("/nonexistent/dronewarden.pcap");
        assert!(matches!(r, Err(Dot11Error::Pcap(_))));
    }
}
