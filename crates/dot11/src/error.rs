use dronewarden_common::WardenError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Dot11Error {
    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),

    #[error("deauth write {attempt}/{total} failed: {source}")]
    Inject {
        attempt: usize,
        total: usize,
        #[source]
        source: WardenError,
    },

    #[error("buffer too small: need {need} bytes, have {have}")]
    ShortBuffer { need: usize, have: usize },
}
