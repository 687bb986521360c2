//! Error types shared by every dronewarden crate

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WardenError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid MAC address: {0}")]
    InvalidMac(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("injection error: {0}")]
    Inject(String),
}

/// Result type alias for shared operations
pub type WardenResult<T> = Result<T, WardenError>;
