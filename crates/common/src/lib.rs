//! Dronewarden Common - Shared types and traits
//!
//! This crate provides the core vocabulary used across the dronewarden
//! workspace:
//! - MAC addresses and vendor prefixes
//! - detections and their wire representation
//! - probe lifecycle states and RF channel descriptions
//! - the capture/injection seams implemented by backends and mocked in tests
//! - a cloneable shutdown signal shared by every long-lived task

pub mod error;
pub mod shutdown;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{WardenError, WardenResult};
pub use shutdown::ShutdownSignal;
pub use traits::{DetectionSink, FrameInjector, FrameSource};
pub use types::{
    Band, Channel, Detection, MacAddr, MessageType, ProbeState, RawFrame, ReadOutcome,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Program name used in logs and the startup banner
pub const PROGNAME: &str = "dronewarden";
