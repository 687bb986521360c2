use dronewarden_common::ProbeState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid API URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported API URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("API URL '{0}' has no host")]
    MissingHost(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("probe is {actual}, expected {expected}")]
    InvalidState {
        expected: ProbeState,
        actual: ProbeState,
    },
}
