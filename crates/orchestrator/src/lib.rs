//! Orchestrator - the main receive loop
//!
//! Pulls frames from the capture backend, counts them, hands each one to
//! the classifier with the probe as reporting sink, and always shuts the
//! probe down on exit.

mod capture_loop;

pub use capture_loop::{receive_frames, CaptureBackend, CaptureLoop, ExitReason, LoopExit};
