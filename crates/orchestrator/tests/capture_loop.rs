//! End-to-end runs of the capture loop over an in-memory backend

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dronewarden_common::{
    FrameInjector, FrameSource, MacAddr, ProbeState, RawFrame, ReadOutcome, ShutdownSignal,
    WardenError, WardenResult,
};
use dronewarden_orchestrator::{CaptureLoop, ExitReason};
use dronewarden_telemetry::{HttpTransport, Probe, ProbeConfig};
use dronewarden_vendors::VendorSet;

const AP: [u8; 6] = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
const DRONE: [u8; 6] = [0x60, 0x60, 0x1f, 0xaa, 0xbb, 0xcc];
const PHONE: [u8; 6] = [0x3c, 0x22, 0xfb, 0x01, 0x02, 0x03];

/// radiotap (channel + signal) followed by a 24-byte 802.11 header
fn frame(fc: u8, flags: u8, addr1: [u8; 6], addr2: [u8; 6]) -> Vec<u8> {
    let mut v = vec![0u8, 0, 14, 0, 0x08 | 0x20, 0, 0, 0];
    v.extend_from_slice(&2437u16.to_le_bytes());
    v.extend_from_slice(&0u16.to_le_bytes());
    v.push((-55i8) as u8);
    v.push(0);
    v.extend_from_slice(&[fc, flags, 0, 0]);
    v.extend_from_slice(&addr1);
    v.extend_from_slice(&addr2);
    v.extend_from_slice(&addr1);
    v.extend_from_slice(&[0, 0]);
    v
}

fn beacon(src: [u8; 6]) -> Vec<u8> {
    frame(0x80, 0, [0xff; 6], src)
}

fn probe_request(src: [u8; 6]) -> Vec<u8> {
    frame(0x40, 0, [0xff; 6], src)
}

fn protected_data(ap: [u8; 6], src: [u8; 6]) -> Vec<u8> {
    frame(0x08, 0x40, ap, src)
}

struct MemoryBackend {
    reads: VecDeque<WardenResult<ReadOutcome>>,
    idle: bool,
    writes: Arc<AtomicUsize>,
}

impl MemoryBackend {
    fn replay(frames: Vec<Vec<u8>>) -> Self {
        Self {
            reads: frames
                .into_iter()
                .map(|f| Ok(ReadOutcome::Frame(RawFrame::new(f))))
                .collect(),
            idle: false,
            writes: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FrameSource for MemoryBackend {
    fn next_frame(&mut self) -> WardenResult<ReadOutcome> {
        match self.reads.pop_front() {
            Some(r) => r,
            None if self.idle => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(ReadOutcome::Timeout)
            }
            None => Ok(ReadOutcome::Exhausted),
        }
    }
}

impl FrameInjector for MemoryBackend {
    fn write_raw(&mut self, _bytes: &[u8]) -> WardenResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

async fn running_probe() -> Arc<Probe> {
    let transport = Arc::new(HttpTransport::new().unwrap());
    let probe = Arc::new(Probe::new(
        transport,
        ProbeConfig {
            hostname: Some("loop-test".into()),
            ..Default::default()
        },
    ));
    probe.wakeup().await.unwrap();
    probe
}

fn vendors() -> Arc<VendorSet> {
    Arc::new(VendorSet::from_reader("DJI;60601F\nParrot;A0143D\n".as_bytes()))
}

#[tokio::test]
async fn offline_replay_classifies_and_stops_probe() {
    let frames = vec![
        beacon(DRONE),
        probe_request(DRONE),
        beacon(PHONE),
        protected_data(AP, DRONE),
        protected_data(AP, PHONE),
        vec![0xde, 0xad],
    ];
    let total_bytes: u64 = frames.iter().map(|f| f.len() as u64).sum();
    let backend = MemoryBackend::replay(frames);
    let writes = backend.writes.clone();
    let probe = running_probe().await;

    let exit = CaptureLoop::new(backend, vendors(), probe.clone(), ShutdownSignal::new())
        .run()
        .await;

    assert!(matches!(exit.reason, ExitReason::Exhausted));
    assert_eq!(exit.frames, 6);
    assert_eq!(probe.state(), ProbeState::Stopped);

    let c = exit.counters.unwrap();
    assert_eq!(c.beacons, 1);
    assert_eq!(c.probe_requests, 1);
    assert_eq!(c.data_frames, 1);
    assert_eq!(c.deauth_bursts, 1);
    assert_eq!(c.bytes, total_bytes);
    assert_eq!(writes.load(Ordering::SeqCst), 10);
}

#[tokio::test]
async fn passive_loop_never_injects() {
    let backend = MemoryBackend::replay(vec![protected_data(AP, DRONE), protected_data(AP, DRONE)]);
    let writes = backend.writes.clone();
    let probe = running_probe().await;

    let exit = CaptureLoop::new(backend, vendors(), probe, ShutdownSignal::new())
        .passive(true)
        .run()
        .await;

    let c = exit.counters.unwrap();
    assert_eq!(c.data_frames, 2);
    assert_eq!(c.deauth_bursts, 0);
    assert_eq!(writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shutdown_signal_ends_idle_capture() {
    let mut backend = MemoryBackend::replay(vec![beacon(DRONE)]);
    backend.idle = true;
    let probe = running_probe().await;
    let shutdown = ShutdownSignal::new();

    let task = tokio::spawn(
        CaptureLoop::new(backend, vendors(), probe.clone(), shutdown.clone()).run(),
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    probe.request_shutdown();
    shutdown.trigger();

    let exit = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("capture loop did not observe shutdown")
        .unwrap();

    assert!(matches!(exit.reason, ExitReason::Cancelled));
    assert_eq!(exit.frames, 1);
    assert_eq!(probe.state(), ProbeState::Stopped);
}

#[tokio::test]
async fn backend_failure_still_stops_probe() {
    let mut backend = MemoryBackend::replay(vec![beacon(DRONE)]);
    backend
        .reads
        .push_back(Err(WardenError::Capture("read error".into())));
    let probe = running_probe().await;

    let exit = CaptureLoop::new(backend, vendors(), probe.clone(), ShutdownSignal::new())
        .run()
        .await;

    assert!(matches!(exit.reason, ExitReason::Failed(_)));
    assert_eq!(probe.state(), ProbeState::Stopped);
    assert_eq!(exit.counters.unwrap().beacons, 1);
}

#[test]
fn flagged_source_is_drone_prefix() {
    let set = vendors();
    assert_eq!(set.lookup(&MacAddr::new(DRONE)), Some("DJI"));
    assert_eq!(set.lookup(&MacAddr::new(PHONE)), None);
}
