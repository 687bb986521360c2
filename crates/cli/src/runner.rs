// runner.rs
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use dronewarden_common::{Band, ShutdownSignal};
use dronewarden_dot11::{LiveConfig, PcapHandle};
use dronewarden_orchestrator::{CaptureLoop, ExitReason, LoopExit};
use dronewarden_rf::{
    channel_table, run_channel_hopper, set_channel, switch_mode, DeviceControl, IoctlControl,
    WirelessMode, DEFAULT_DWELL,
};
use dronewarden_telemetry::{HttpTransport, Probe, ProbeConfig};
use dronewarden_vendors::VendorSet;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::args::{CaptureSource, Cli};
use crate::menu::{list_interfaces, prompt_interface};

/// Everything the capture pipeline needs, built once at startup.
struct Pipeline {
    vendors: Arc<VendorSet>,
    probe: Arc<Probe>,
    shutdown: ShutdownSignal,
    passive: bool,
}

pub async fn run(cli: Cli) -> Result<()> {
    let vendors = VendorSet::load(&cli.vendors)
        .with_context(|| format!("Cannot load vendor database '{}'", cli.vendors.display()))?;
    if vendors.is_empty() {
        warn!("Vendor database is empty, nothing will be flagged");
    }

    let transport = HttpTransport::new().context("Cannot build HTTP client")?;
    let probe = Arc::new(Probe::new(Arc::new(transport), ProbeConfig::default()));
    match cli.api.as_deref() {
        Some(url) => {
            if let Err(e) = probe.set_api_endpoint(url) {
                warn!("API disabled: {}", e);
            }
        }
        None => info!("No API endpoint configured, running offline"),
    }
    probe.set_gps_origin(cli.lat, cli.lng);

    let ctx = Pipeline {
        vendors: Arc::new(vendors),
        probe,
        shutdown: ShutdownSignal::new(),
        passive: cli.no_deauth,
    };

    let source = match cli.source() {
        CaptureSource::Menu => {
            let interfaces = list_interfaces();
            let stdin = std::io::stdin();
            CaptureSource::Live(prompt_interface(&interfaces, stdin.lock(), std::io::stdout())?)
        }
        source => source,
    };

    // Listen before touching the device: a signal during setup must still
    // reach the managed-mode restore.
    let signals = spawn_signal_listener(Arc::clone(&ctx.probe), ctx.shutdown.clone());

    let result = match source {
        CaptureSource::Offline(path) => run_offline(&ctx, &path).await,
        CaptureSource::Live(interface) => run_live_with_restore(&ctx, &interface, cli.band()).await,
        CaptureSource::Menu => Err(anyhow!("No capture interface selected")),
    };

    ctx.shutdown.trigger();
    let _ = signals.await;
    result
}

async fn run_offline(ctx: &Pipeline, path: &Path) -> Result<()> {
    let handle = PcapHandle::open_offline(path)
        .with_context(|| format!("Cannot open capture file '{}'", path.display()))?;
    info!("Reading frames from {}", handle.source());

    capture(ctx, handle).await
}

/// Live capture. The interface is put back in managed mode afterwards,
/// whatever happened during setup or capture.
async fn run_live_with_restore(ctx: &Pipeline, interface: &str, band: Band) -> Result<()> {
    if !nix::unistd::geteuid().is_root() {
        bail!("Live capture needs root privileges (try sudo)");
    }

    let ctl: Arc<dyn DeviceControl> = Arc::new(IoctlControl::new());
    with_managed_restore(ctx, ctl, interface, band).await
}

async fn with_managed_restore(
    ctx: &Pipeline,
    ctl: Arc<dyn DeviceControl>,
    interface: &str,
    band: Band,
) -> Result<()> {
    let result = run_live(ctx, Arc::clone(&ctl), interface, band).await;

    match switch_mode(ctl.as_ref(), interface, WirelessMode::Managed) {
        Ok(()) => info!("{} restored to managed mode", interface),
        Err(e) => warn!("Cannot restore {} to managed mode: {}", interface, e),
    }
    result
}

async fn run_live(ctx: &Pipeline, ctl: Arc<dyn DeviceControl>, interface: &str, band: Band) -> Result<()> {
    switch_mode(ctl.as_ref(), interface, WirelessMode::Monitor)
        .with_context(|| format!("Cannot switch {} to monitor mode", interface))?;

    let first = channel_table(band)
        .first()
        .ok_or_else(|| anyhow!("No channel defined for band {}", band))?;
    set_channel(ctl.as_ref(), interface, first)
        .with_context(|| format!("Cannot set {} to {}", interface, first))?;
    info!("{} in monitor mode on {}", interface, first);

    if ctx.shutdown.is_triggered() {
        info!("Shutdown requested during setup, not capturing");
        return Ok(());
    }

    let handle = PcapHandle::open_live(interface, &LiveConfig::default())
        .with_context(|| format!("Cannot open {} for capture", interface))?;

    let hopper = tokio::spawn(run_channel_hopper(
        ctl,
        interface.to_string(),
        band,
        DEFAULT_DWELL,
        ctx.shutdown.clone(),
    ));

    let result = capture(ctx, handle).await;

    ctx.shutdown.trigger();
    match hopper.await {
        Ok(Ok(hops)) => debug!("Channel hopper made {} hops", hops),
        Ok(Err(_)) => {} // already logged by the hopper
        Err(e) => warn!("Channel hopper task failed: {}", e),
    }
    result
}

/// Wake the probe, run the capture loop until it ends, stop background tasks.
async fn capture(ctx: &Pipeline, handle: PcapHandle) -> Result<()> {
    if ctx.shutdown.is_triggered() {
        info!("Shutdown requested before capture started");
        return Ok(());
    }

    if let Err(e) = ctx.probe.wakeup().await {
        warn!("Probe did not start: {}", e);
    }
    info!("{} started", ctx.probe);

    let exit: LoopExit = CaptureLoop::new(
        handle,
        Arc::clone(&ctx.vendors),
        Arc::clone(&ctx.probe),
        ctx.shutdown.clone(),
    )
    .passive(ctx.passive)
    .run()
    .await;

    ctx.shutdown.trigger();

    match exit.reason {
        ExitReason::Cancelled | ExitReason::Exhausted => Ok(()),
        ExitReason::Failed(e) => Err(anyhow::Error::new(e).context("Capture failed")),
    }
}

/// SIGINT/SIGTERM: move the probe to SHUTDOWN and stop every task.
fn spawn_signal_listener(probe: Arc<Probe>, shutdown: ShutdownSignal) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            name = wait_for_signal() => {
                info!("Received {}, shutting down", name);
                probe.request_shutdown();
                shutdown.trigger();
            }
            _ = shutdown.cancelled() => {}
        }
    })
}

async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => "SIGINT",
            Err(e) => {
                warn!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                "SIGTERM"
            }
            Err(e) => {
                warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}
