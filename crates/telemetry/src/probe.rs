//! Probe lifecycle and API reporting
//!
//! The probe is the local agent's run record. It is shared as
//! `Arc<Probe>` between the capture thread (through `DetectionSink`), the
//! heartbeat task, the detection reporter task and the signal listener:
//! - state is an `AtomicU8` that only ever moves forward
//! - counters are `AtomicU64`
//! - the API latch is a one-way `AtomicBool`: the first transport failure
//!   silences every later call for the rest of the process

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dronewarden_common::{Detection, DetectionSink, MessageType, ProbeState, ShutdownSignal};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::TelemetryError;
use crate::messages::{
    api, status, HeartbeatMessage, Position, ShutdownMessage, WakeupMessage,
};
use crate::transport::{endpoint_url, parse_endpoint, ApiTransport};

pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Detections waiting for the reporter; more are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Longest shutdown waits for queued detections to go out
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Hostname used when the system one cannot be read
pub const FALLBACK_HOSTNAME: &str = "NONAME";

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub heartbeat_interval: Duration,
    /// Overrides the system hostname
    pub hostname: Option<String>,
    pub queue_capacity: usize,
    pub drain_timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            hostname: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

/// Snapshot of the probe counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCounters {
    pub beacons: u64,
    pub probe_requests: u64,
    pub data_frames: u64,
    pub deauth_bursts: u64,
    pub bytes: u64,
}

#[derive(Default)]
struct Counters {
    beacons: AtomicU64,
    probe_requests: AtomicU64,
    data_frames: AtomicU64,
    deauth_bursts: AtomicU64,
    bytes: AtomicU64,
}

impl Counters {
    fn reset(&self) {
        self.beacons.store(0, Ordering::Relaxed);
        self.probe_requests.store(0, Ordering::Relaxed);
        self.data_frames.store(0, Ordering::Relaxed);
        self.deauth_bursts.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ProbeCounters {
        ProbeCounters {
            beacons: self.beacons.load(Ordering::Relaxed),
            probe_requests: self.probe_requests.load(Ordering::Relaxed),
            data_frames: self.data_frames.load(Ordering::Relaxed),
            deauth_bursts: self.deauth_bursts.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
struct Tasks {
    heartbeat: Option<JoinHandle<()>>,
    reporter: Option<JoinHandle<()>>,
}

pub struct Probe {
    state: AtomicU8,
    hostname: RwLock<String>,
    start_time: Mutex<Option<(DateTime<Utc>, Instant)>>,
    end_time: Mutex<Option<DateTime<Utc>>>,
    counters: Counters,
    position: Mutex<Position>,

    endpoint: RwLock<Option<Url>>,
    api_configured: AtomicBool,
    api_failed: AtomicBool,
    transport: Arc<dyn ApiTransport>,

    heartbeat_interval: Duration,
    queue_capacity: usize,
    drain_timeout: Duration,
    halt: ShutdownSignal,
    detections: Mutex<Option<mpsc::Sender<Detection>>>,
    tasks: Mutex<Tasks>,
}

impl Probe {
    pub fn new(transport: Arc<dyn ApiTransport>, config: ProbeConfig) -> Self {
        Self {
            state: AtomicU8::new(ProbeState::Awake as u8),
            hostname: RwLock::new(config.hostname.unwrap_or_default()),
            start_time: Mutex::new(None),
            end_time: Mutex::new(None),
            counters: Counters::default(),
            position: Mutex::new(Position::default()),
            endpoint: RwLock::new(None),
            api_configured: AtomicBool::new(false),
            api_failed: AtomicBool::new(false),
            transport,
            heartbeat_interval: config.heartbeat_interval,
            queue_capacity: config.queue_capacity.max(1),
            drain_timeout: config.drain_timeout,
            halt: ShutdownSignal::new(),
            detections: Mutex::new(None),
            tasks: Mutex::new(Tasks::default()),
        }
    }

    // ---- configuration ------------------------------------------------

    /// Point the probe at an API base URL. An invalid URL leaves the API
    /// disabled.
    pub fn set_api_endpoint(&self, raw: &str) -> Result<(), TelemetryError> {
        match parse_endpoint(raw) {
            Ok(url) => {
                debug!("Changing API endpoint to '{}'", url);
                *self.endpoint.write() = Some(url);
                self.api_configured.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                debug!("Refusing API endpoint '{}': {}", raw, e);
                *self.endpoint.write() = None;
                self.api_configured.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    pub fn set_gps_origin(&self, lat: f64, lng: f64) {
        debug!(
            "Updating GPS position of '{}' to ({:.5}, {:.5})",
            self.hostname(),
            lat,
            lng
        );
        *self.position.lock() = Position { lat, lng };
    }

    // ---- accessors ----------------------------------------------------

    #[inline]
    pub fn state(&self) -> ProbeState {
        ProbeState::from_u8(self.state.load(Ordering::SeqCst))
    }

    #[inline]
    pub fn api_enabled(&self) -> bool {
        self.api_configured.load(Ordering::SeqCst) && !self.api_failed.load(Ordering::SeqCst)
    }

    pub fn hostname(&self) -> String {
        self.hostname.read().clone()
    }

    pub fn counters(&self) -> ProbeCounters {
        self.counters.snapshot()
    }

    pub fn position(&self) -> Position {
        *self.position.lock()
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time.lock().map(|(t, _)| t)
    }

    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        *self.end_time.lock()
    }

    /// Move the state forward to `to`. Returns false if the probe is
    /// already at or past `to`.
    fn advance(&self, to: ProbeState) -> bool {
        self.state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |cur| {
                (cur < to as u8).then_some(to as u8)
            })
            .is_ok()
    }

    // ---- lifecycle ----------------------------------------------------

    /// Start the probe: resolve the hostname, reset counters, notify the
    /// API, go RUNNING and start the heartbeat and detection reporter.
    pub async fn wakeup(self: &Arc<Self>) -> Result<(), TelemetryError> {
        let state = self.state();
        if state != ProbeState::Awake || self.start_time.lock().is_some() {
            return Err(TelemetryError::InvalidState {
                expected: ProbeState::Awake,
                actual: state,
            });
        }

        {
            let mut hostname = self.hostname.write();
            if hostname.is_empty() {
                *hostname = system_hostname();
            }
        }
        self.counters.reset();
        let started = Utc::now();
        *self.start_time.lock() = Some((started, Instant::now()));
        debug!("Starting probe '{}'", self.hostname());

        let msg = WakeupMessage {
            ts: started,
            host: self.hostname(),
            position: self.position(),
        };
        debug!("Sending WAKEUP from {} at {}", msg.host, msg.ts);
        self.notify(api::WAKEUP, &msg, Some(status::NO_CONTENT)).await;

        if !self.advance(ProbeState::Running) {
            // shutdown was requested while waking up
            return Ok(());
        }

        let (tx, rx) = mpsc::channel(self.queue_capacity);
        *self.detections.lock() = Some(tx);

        let mut tasks = self.tasks.lock();
        tasks.reporter = Some(tokio::spawn(Arc::clone(self).run_reporter(rx)));
        tasks.heartbeat = Some(tokio::spawn(Arc::clone(self).run_heartbeat()));
        Ok(())
    }

    /// Signal-side shutdown request: RUNNING -> SHUTDOWN, wakes the
    /// heartbeat. Safe to call from any thread, any number of times.
    pub fn request_shutdown(&self) {
        if self.advance(ProbeState::Shutdown) {
            debug!("Shutdown requested for probe '{}'", self.hostname());
        }
        self.halt.trigger();
    }

    /// Stop the probe: record end time, go STOPPED, drain queued
    /// detections, log the summary and notify the API. Only the first
    /// call does anything; later calls return `InvalidState`.
    pub async fn shutdown(&self) -> Result<ProbeCounters, TelemetryError> {
        let state = self.state();
        if !self.advance(ProbeState::Stopped) {
            return Err(TelemetryError::InvalidState {
                expected: ProbeState::Shutdown,
                actual: state,
            });
        }
        debug!("Stopping probe '{}'", self.hostname());

        let ended = Utc::now();
        *self.end_time.lock() = Some(ended);
        self.halt.trigger();

        // Closing the queue lets the reporter flush what is left and exit.
        self.detections.lock().take();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if let Some(mut reporter) = tasks.reporter {
            if tokio::time::timeout(self.drain_timeout, &mut reporter).await.is_err() {
                warn!(
                    "Detection reports still pending after {} ms, dropping them",
                    self.drain_timeout.as_millis()
                );
                reporter.abort();
            }
        }
        if let Some(heartbeat) = tasks.heartbeat {
            let _ = heartbeat.await;
        }

        let elapsed = self
            .start_time
            .lock()
            .map(|(_, t)| t.elapsed())
            .unwrap_or_default();
        let c = self.counters();
        info!(
            "Finished monitoring in {} ms, read {} bytes",
            elapsed.as_millis(),
            c.bytes
        );
        info!(
            "Discovered {} ProbeRequests, {} Beacons, {} Data frames ({} deauth bursts sent)",
            c.probe_requests, c.beacons, c.data_frames, c.deauth_bursts
        );

        let msg = ShutdownMessage {
            ts: ended,
            host: self.hostname(),
            nb_beacon: c.beacons,
            nb_probes: c.probe_requests,
        };
        debug!("Sending SHUTDOWN from {} at {}", msg.host, msg.ts);
        self.notify(api::SHUTDOWN, &msg, Some(status::NO_CONTENT)).await;

        Ok(c)
    }

    // ---- reporting ----------------------------------------------------

    /// POST one detection to the API.
    pub async fn report_detection(&self, detection: Detection) -> bool {
        let detection = if detection.hostname.is_empty() {
            detection.with_hostname(self.hostname())
        } else {
            detection
        };
        self.notify(api::INFO, &detection, Some(status::ACCEPTED)).await
    }

    pub fn record_data_frame(&self) {
        self.counters.data_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deauth(&self) {
        self.counters.deauth_bursts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_bytes(&self, len: u64) {
        self.counters.bytes.fetch_add(len, Ordering::Relaxed);
    }

    fn count_detection(&self, message_type: MessageType) {
        match message_type {
            MessageType::Beacon => {
                self.counters.beacons.fetch_add(1, Ordering::Relaxed);
            }
            MessageType::ProbeRequest => {
                self.counters.probe_requests.fetch_add(1, Ordering::Relaxed);
            }
            MessageType::Data | MessageType::Undefined => {}
        }
    }

    /// Send one API notification. Returns true when the expected status
    /// (if any) came back. A transport failure trips the API latch.
    async fn notify<T: Serialize>(&self, path: &str, body: &T, expected: Option<u16>) -> bool {
        if !self.api_enabled() {
            return false;
        }
        let Some(base) = self.endpoint.read().clone() else {
            return false;
        };
        let url = endpoint_url(&base, path);

        let body = match serde_json::to_value(body) {
            Ok(v) => v,
            Err(e) => {
                error!("Cannot encode {} message: {}", path, e);
                return false;
            }
        };

        match self.transport.post_json(&url, &body).await {
            Ok(code) => match expected {
                Some(want) if code != want => {
                    warn!("Unexpected response from {}: got {}, expected {}", path, code, want);
                    false
                }
                _ => true,
            },
            Err(e) => {
                error!("{} POST failed, disabling API: {}", path, e);
                self.api_failed.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    // ---- background tasks ---------------------------------------------

    #[instrument(skip_all, fields(probe = %self))]
    async fn run_heartbeat(self: Arc<Self>) {
        while self.state() == ProbeState::Running && self.api_enabled() {
            tokio::select! {
                _ = tokio::time::sleep(self.heartbeat_interval) => {}
                _ = self.halt.cancelled() => break,
            }
            if self.state() != ProbeState::Running {
                break;
            }

            let msg = HeartbeatMessage {
                ts: Utc::now(),
                host: self.hostname(),
            };
            debug!("Sending HEARTBEAT from {}", msg.host);
            self.notify(api::HEARTBEAT, &msg, None).await;
        }
        debug!("Heartbeat stopped");
    }

    async fn run_reporter(self: Arc<Self>, mut rx: mpsc::Receiver<Detection>) {
        while let Some(detection) = rx.recv().await {
            self.report_detection(detection).await;
        }
    }
}

impl DetectionSink for Probe {
    fn on_detection(&self, detection: Detection) {
        self.count_detection(detection.message_type);
        if !self.api_enabled() {
            return;
        }
        if let Some(tx) = self.detections.lock().as_ref() {
            // receiver only goes away once shutdown has taken the sender
            if let Err(TrySendError::Full(d)) = tx.try_send(detection.with_hostname(self.hostname())) {
                warn!("Report queue full, dropping {} detection from {}", d.message_type, d.mac);
            }
        }
    }

    fn on_data_frame(&self) {
        self.record_data_frame();
    }

    fn on_deauth_sent(&self) {
        self.record_deauth();
    }

    fn on_bytes(&self, len: u64) {
        self.add_bytes(len);
    }
}

impl fmt::Display for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Probe name='{}'>", self.hostname.read())
    }
}

fn system_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}
