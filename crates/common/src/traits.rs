//! Seams between the capture pipeline and its collaborators
//!
//! The capture backend (live device or offline file) implements
//! `FrameSource` + `FrameInjector`; the probe implements `DetectionSink`.
//! Tests swap in in-memory implementations of each.

use crate::error::WardenResult;
use crate::types::{Detection, ReadOutcome};

/// Blocking source of raw captured frames.
pub trait FrameSource: Send {
    /// Read the next frame. Blocks at most for the backend's read timeout.
    fn next_frame(&mut self) -> WardenResult<ReadOutcome>;
}

/// Raw transmit primitive of a capture handle.
pub trait FrameInjector: Send {
    /// Write one complete frame (radiotap header included) to the medium.
    fn write_raw(&mut self, bytes: &[u8]) -> WardenResult<()>;
}

/// Receiver of classification results.
///
/// Every method takes `&self`: implementors keep their own counters
/// behind atomics so the sink can be shared with background tasks.
pub trait DetectionSink: Send + Sync {
    /// A flagged Beacon or Probe-Request was seen.
    fn on_detection(&self, detection: Detection);

    /// A flagged, encrypted Data frame was seen.
    fn on_data_frame(&self) {}

    /// A full deauthentication burst was transmitted.
    fn on_deauth_sent(&self) {}

    /// `len` bytes were read from the backend.
    fn on_bytes(&self, _len: u64) {}
}
