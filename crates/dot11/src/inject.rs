//! Deauthentication burst injection

use dronewarden_common::FrameInjector;
use tracing::error;

use crate::classify::DeauthTarget;
use crate::error::Dot11Error;
use crate::packet::{build_deauth, reason, DEAUTH_FRAME_LEN};

/// Frames sent per burst
pub const NB_DEAUTH_PACKETS: usize = 10;

/// Send `NB_DEAUTH_PACKETS` identical deauth frames back to back.
///
/// The frame goes to `target.station` spoofing `target.ap`. The first write
/// failure aborts the rest of the burst. Returns the number of frames sent.
pub fn inject_deauth_burst<I>(injector: &mut I, target: &DeauthTarget) -> Result<usize, Dot11Error>
where
    I: FrameInjector + ?Sized,
{
    let mut buf = [0u8; DEAUTH_FRAME_LEN];
    let len = build_deauth(
        &mut buf,
        &target.station,
        &target.ap,
        &target.bssid,
        reason::PREV_AUTH_EXPIRED,
    );
    if len == 0 {
        return Err(Dot11Error::ShortBuffer {
            need: DEAUTH_FRAME_LEN,
            have: buf.len(),
        });
    }

    for attempt in 1..=NB_DEAUTH_PACKETS {
        if let Err(source) = injector.write_raw(&buf[..len]) {
            let err = Dot11Error::Inject {
                attempt,
                total: NB_DEAUTH_PACKETS,
                source,
            };
            error!("Error when sending deauth to {}: {}", target.station, err);
            return Err(err);
        }
    }

    Ok(NB_DEAUTH_PACKETS)
}
