//! Background channel hopper

use std::sync::Arc;
use std::time::Duration;

use dronewarden_common::{Band, ShutdownSignal};
use tracing::{error, info, instrument, trace};

use crate::channels::ChannelCycle;
use crate::control::set_channel;
use crate::error::RfError;
use crate::ioctl::DeviceControl;

/// Time spent on each channel
pub const DEFAULT_DWELL: Duration = Duration::from_millis(500);

/// Cycle the band's channel table until shutdown, dwelling `dwell` on each.
///
/// A failed channel change ends the hopper (and only the hopper). Returns
/// the number of hops made before shutdown.
#[instrument(skip(ctl, dwell, shutdown))]
pub async fn run_channel_hopper(
    ctl: Arc<dyn DeviceControl>,
    interface: String,
    band: Band,
    dwell: Duration,
    shutdown: ShutdownSignal,
) -> Result<u64, RfError> {
    info!("Channel hopper started");
    let mut hops = 0u64;

    for channel in ChannelCycle::new(band) {
        if shutdown.is_triggered() {
            break;
        }

        if let Err(e) = set_channel(ctl.as_ref(), &interface, &channel) {
            error!("Cannot switch to {}, channel hopper stopped: {}", channel, e);
            return Err(e);
        }
        hops += 1;
        trace!("Listening on {}", channel);

        tokio::select! {
            _ = tokio::time::sleep(dwell) => {}
            _ = shutdown.cancelled() => break,
        }
    }

    info!("Channel hopper stopped after {} hops", hops);
    Ok(hops)
}
