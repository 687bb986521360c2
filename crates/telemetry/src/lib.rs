//! Probe lifecycle and telemetry API client

pub mod error;
pub mod messages;
pub mod probe;
pub mod transport;

pub use error::TelemetryError;
pub use messages::Position;
pub use probe::{Probe, ProbeConfig, ProbeCounters, DEFAULT_HEARTBEAT_INTERVAL};
pub use transport::{ApiTransport, HttpTransport};
