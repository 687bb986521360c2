use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RfError {
    #[error("cannot open control socket: {0}")]
    Socket(#[source] io::Error),

    #[error("{op} failed on {interface}: {source}")]
    Ioctl {
        op: &'static str,
        interface: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid interface name '{0}'")]
    InterfaceName(String),

    #[error("device control is only available on Linux")]
    Unsupported,
}
