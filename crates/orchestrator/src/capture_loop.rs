// crates/orchestrator/src/capture_loop.rs
//! Capture loop - frame pump between backend, classifier and probe

use std::sync::Arc;

use dronewarden_common::{
    DetectionSink, FrameInjector, FrameSource, ReadOutcome, ShutdownSignal, WardenError,
};
use dronewarden_dot11::FrameClassifier;
use dronewarden_telemetry::{Probe, ProbeCounters};
use dronewarden_vendors::VendorSet;
use tracing::{debug, error, info, instrument, warn};

/// A capture handle: reads frames and writes raw ones back.
pub trait CaptureBackend: FrameSource + FrameInjector {}

impl<T: FrameSource + FrameInjector + ?Sized> CaptureBackend for T {}

/// Why the receive loop ended.
#[derive(Debug)]
pub enum ExitReason {
    /// Shutdown was requested
    Cancelled,
    /// The source ran out of frames (end of a capture file)
    Exhausted,
    /// The backend failed to read
    Failed(WardenError),
}

#[derive(Debug)]
pub struct LoopExit {
    pub reason: ExitReason,
    pub frames: u64,
    /// `None` if the probe could not be shut down (already stopped)
    pub counters: Option<ProbeCounters>,
}

/// Read until shutdown, exhaustion or a backend error. The shutdown flag is
/// checked before every read, so latency is one frame (or one read timeout).
/// Returns the exit reason and the number of frames read.
pub fn receive_frames<B, S>(
    backend: &mut B,
    classifier: &FrameClassifier<'_>,
    sink: &S,
    shutdown: &ShutdownSignal,
) -> (ExitReason, u64)
where
    B: CaptureBackend + ?Sized,
    S: DetectionSink + ?Sized,
{
    let mut frames = 0u64;
    loop {
        if shutdown.is_triggered() {
            return (ExitReason::Cancelled, frames);
        }

        match backend.next_frame() {
            Ok(ReadOutcome::Frame(frame)) => {
                frames += 1;
                sink.on_bytes(frame.len() as u64);
                classifier.process(&frame.data, &mut *backend, sink);
            }
            Ok(ReadOutcome::Timeout) => continue,
            Ok(ReadOutcome::Exhausted) => return (ExitReason::Exhausted, frames),
            Err(e) => return (ExitReason::Failed(e), frames),
        }
    }
}

pub struct CaptureLoop<B> {
    backend: B,
    vendors: Arc<VendorSet>,
    probe: Arc<Probe>,
    shutdown: ShutdownSignal,
    deauth: bool,
}

impl<B: CaptureBackend + 'static> CaptureLoop<B> {
    pub fn new(backend: B, vendors: Arc<VendorSet>, probe: Arc<Probe>, shutdown: ShutdownSignal) -> Self {
        Self {
            backend,
            vendors,
            probe,
            shutdown,
            deauth: true,
        }
    }

    /// Classify and count Data frames, but never inject.
    pub fn passive(mut self, passive: bool) -> Self {
        self.deauth = !passive;
        self
    }

    /// Run the receive loop on a blocking thread, then shut the probe down.
    #[instrument(skip(self), fields(deauth = self.deauth))]
    pub async fn run(self) -> LoopExit {
        let Self {
            mut backend,
            vendors,
            probe,
            shutdown,
            deauth,
        } = self;

        info!("Capture started");
        let sink = Arc::clone(&probe);
        let joined = tokio::task::spawn_blocking(move || {
            let classifier = FrameClassifier::new(&vendors);
            let classifier = if deauth { classifier } else { classifier.passive() };
            receive_frames(&mut backend, &classifier, sink.as_ref(), &shutdown)
        })
        .await;

        let (reason, frames) = match joined {
            Ok(r) => r,
            Err(e) => (
                ExitReason::Failed(WardenError::Capture(format!("capture thread died: {}", e))),
                0,
            ),
        };
        match &reason {
            ExitReason::Cancelled => info!("Capture interrupted after {} frames", frames),
            ExitReason::Exhausted => info!("End of capture after {} frames", frames),
            ExitReason::Failed(e) => error!("Capture stopped after {} frames: {}", frames, e),
        }

        let counters = match probe.shutdown().await {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("Probe shutdown skipped: {}", e);
                None
            }
        };
        debug!("Capture loop finished");

        LoopExit {
            reason,
            frames,
            counters,
        }
    }
}
