//! JSON bodies of the telemetry API

use chrono::{DateTime, Utc};
use serde::Serialize;

/// API paths, relative to the endpoint host
pub mod api {
    pub const WAKEUP: &str = "/api/wakeup";
    pub const HEARTBEAT: &str = "/api/heartbeat";
    pub const INFO: &str = "/api/info";
    pub const SHUTDOWN: &str = "/api/shutdown";
}

/// Expected HTTP statuses
pub mod status {
    pub const NO_CONTENT: u16 = 204;
    pub const ACCEPTED: u16 = 202;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WakeupMessage {
    pub ts: DateTime<Utc>,
    pub host: String,
    pub position: Position,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatMessage {
    pub ts: DateTime<Utc>,
    pub host: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShutdownMessage {
    pub ts: DateTime<Utc>,
    pub host: String,
    pub nb_beacon: u64,
    pub nb_probes: u64,
}
