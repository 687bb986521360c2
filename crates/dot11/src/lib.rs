//! 802.11 frame handling for drone detection
//!
//! - radiotap + 802.11 header decoding
//! - classification of frames against the vendor set
//! - deauthentication frame forging and burst injection
//! - libpcap capture/injection backend

pub mod capture;
pub mod classify;
pub mod error;
pub mod inject;
pub mod packet;

pub use capture::{LiveConfig, PcapHandle};
pub use classify::{classify, Classification, DeauthTarget, FrameClassifier};
pub use error::Dot11Error;
pub use inject::{inject_deauth_burst, NB_DEAUTH_PACKETS};
pub use packet::{build_deauth, decode_frame, parse_dot11, parse_radiotap, DecodedFrame, Dot11Header, RadioInfo};
