//! Frame classification against the vendor set

use dronewarden_common::{Detection, DetectionSink, FrameInjector, MacAddr, MessageType};
use dronewarden_vendors::VendorSet;
use tracing::info;

use crate::inject::inject_deauth_burst;
use crate::packet::{decode_frame, DecodedFrame};

/// What a single captured frame turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Not decodable, or no 6-byte transmitter address
    Malformed,
    /// Transmitter not owned by a flagged vendor
    Unflagged,
    /// Flagged transmitter, but a frame kind we do not act on
    Ignored,
    /// Beacon or probe request from a flagged device
    Detection(Detection),
    /// Encrypted data from a flagged device: deauth target
    Data(DeauthTarget),
}

/// Addresses for a deauth burst, taken from an observed data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeauthTarget {
    /// Observed transmitter (address2)
    pub station: MacAddr,
    /// Observed receiver (address1)
    pub ap: MacAddr,
    /// BSSID of the observed frame, all zeros when it carries none
    pub bssid: MacAddr,
}

/// Classify one raw frame (radiotap + 802.11).
pub fn classify(frame: &[u8], vendors: &VendorSet) -> Classification {
    match decode_frame(frame) {
        Some(decoded) => classify_decoded(&decoded, vendors),
        None => Classification::Malformed,
    }
}

pub fn classify_decoded(frame: &DecodedFrame, vendors: &VendorSet) -> Classification {
    let hdr = &frame.header;
    let Some(source) = hdr.addr2 else {
        return Classification::Malformed;
    };

    let Some(vendor) = vendors.lookup(&source) else {
        return Classification::Unflagged;
    };

    let message_type = if hdr.is_beacon() {
        MessageType::Beacon
    } else if hdr.is_probe_request() {
        MessageType::ProbeRequest
    } else if hdr.is_data() && hdr.is_protected() {
        return Classification::Data(DeauthTarget {
            station: source,
            ap: hdr.addr1,
            bssid: hdr.bssid().unwrap_or(MacAddr::ZERO),
        });
    } else {
        return Classification::Ignored;
    };

    let detection = Detection::new(message_type, vendor, source).with_radio(
        frame.radio.signal_dbm.unwrap_or(0),
        frame.radio.frequency_mhz.unwrap_or(0),
    );
    Classification::Detection(detection)
}

/// Classifies frames and acts on the result: detections go to the sink,
/// data frames trigger a deauth burst through the injector.
pub struct FrameClassifier<'a> {
    vendors: &'a VendorSet,
    deauth: bool,
}

impl<'a> FrameClassifier<'a> {
    pub fn new(vendors: &'a VendorSet) -> Self {
        Self {
            vendors,
            deauth: true,
        }
    }

    /// Disable injection; data frames are still counted.
    pub fn passive(mut self) -> Self {
        self.deauth = false;
        self
    }

    /// Process one frame. The burst, if any, completes before this returns.
    pub fn process<I, S>(&self, frame: &[u8], injector: &mut I, sink: &S) -> Classification
    where
        I: FrameInjector + ?Sized,
        S: DetectionSink + ?Sized,
    {
        let class = classify(frame, self.vendors);
        match &class {
            Classification::Detection(d) => {
                info!(
                    "Found 802.11 {} from vendor {} (device {}) - strength={} dBm - frequency={} MHz",
                    d.message_type, d.vendor, d.mac, d.signal_dbm, d.frequency_mhz
                );
                sink.on_detection(d.clone());
            }
            Classification::Data(target) => {
                sink.on_data_frame();
                if self.deauth && inject_deauth_burst(injector, target).is_ok() {
                    info!(
                        "Deauth burst sent to {} on behalf of {}",
                        target.station, target.ap
                    );
                    sink.on_deauth_sent();
                }
            }
            Classification::Malformed | Classification::Unflagged | Classification::Ignored => {}
        }
        class
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::tests::{frame, AP, DRONE};
    use crate::packet::{frame_control, parse_dot11, RADIOTAP_MIN_LEN};
    use dronewarden_common::{WardenError, WardenResult};
    use std::sync::Mutex;

    const STRANGER: MacAddr = MacAddr::new([0x12, 0x34, 0x56, 0x00, 0x00, 0x01]);

    fn vendors() -> VendorSet {
        VendorSet::from_reader("DJI;60601F\n".as_bytes())
    }

    #[derive(Default)]
    struct RecordingInjector {
        written: Vec<Vec<u8>>,
        fail_at: Option<usize>,
    }

    impl FrameInjector for RecordingInjector {
        fn write_raw(&mut self, bytes: &[u8]) -> WardenResult<()> {
            if self.fail_at == Some(self.written.len()) {
                return Err(WardenError::Inject("device gone".into()));
            }
            self.written.push(bytes.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        detections: Mutex<Vec<Detection>>,
        data_frames: Mutex<u32>,
        deauths: Mutex<u32>,
    }

    impl DetectionSink for RecordingSink {
        fn on_detection(&self, detection: Detection) {
            self.detections.lock().unwrap().push(detection);
        }
        fn on_data_frame(&self) {
            *self.data_frames.lock().unwrap() += 1;
        }
        fn on_deauth_sent(&self) {
            *self.deauths.lock().unwrap() += 1;
        }
    }

    fn beacon(src: &MacAddr) -> Vec<u8> {
        frame(frame_control::TYPE_MGMT, frame_control::SUBTYPE_BEACON, 0, &MacAddr::BROADCAST, src)
    }

    fn probe_req(src: &MacAddr) -> Vec<u8> {
        frame(frame_control::TYPE_MGMT, frame_control::SUBTYPE_PROBE_REQ, 0, &MacAddr::BROADCAST, src)
    }

    fn data(ap: &MacAddr, src: &MacAddr, protected: bool) -> Vec<u8> {
        let flags = if protected { frame_control::FLAG_PROTECTED } else { 0 };
        frame(frame_control::TYPE_DATA, 0, flags, ap, src)
    }

    #[test]
    fn test_beacon_from_flagged_mac() {
        let set = vendors();
        match classify(&beacon(&DRONE), &set) {
            Classification::Detection(d) => {
                assert_eq!(d.message_type, MessageType::Beacon);
                assert_eq!(d.vendor, "DJI");
                assert_eq!(d.mac, DRONE);
                assert_eq!(d.signal_dbm, -42);
                assert_eq!(d.frequency_mhz, 2437);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_probe_request_from_flagged_mac() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();

        FrameClassifier::new(&set).process(&probe_req(&DRONE), &mut inj, &sink);

        let detections = sink.detections.lock().unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].message_type, MessageType::ProbeRequest);
        assert!(inj.written.is_empty());
    }

    #[test]
    fn test_data_frame_triggers_single_burst_and_no_detection() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();

        let class = FrameClassifier::new(&set).process(&data(&AP, &DRONE, true), &mut inj, &sink);
        assert_eq!(
            class,
            Classification::Data(DeauthTarget {
                station: DRONE,
                ap: AP,
                bssid: AP,
            })
        );

        assert!(sink.detections.lock().unwrap().is_empty());
        assert_eq!(*sink.data_frames.lock().unwrap(), 1);
        assert_eq!(*sink.deauths.lock().unwrap(), 1);
        assert_eq!(inj.written.len(), 10);

        for pkt in &inj.written {
            let hdr = parse_dot11(&pkt[RADIOTAP_MIN_LEN..]).unwrap();
            assert_eq!(hdr.subtype, frame_control::SUBTYPE_DEAUTH);
            assert_eq!(hdr.addr1, DRONE);
            assert_eq!(hdr.addr2, Some(AP));
        }
    }

    #[test]
    fn test_bssid_follows_ds_bits() {
        let set = vendors();
        let client = MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x07]);

        // drone acting as the AP: FromDS, address2 is the BSSID
        let from_ap = frame(
            frame_control::TYPE_DATA,
            0,
            frame_control::FLAG_PROTECTED | frame_control::FLAG_FROM_DS,
            &client,
            &DRONE,
        );
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();
        let class = FrameClassifier::new(&set).process(&from_ap, &mut inj, &sink);
        assert_eq!(
            class,
            Classification::Data(DeauthTarget {
                station: DRONE,
                ap: client,
                bssid: DRONE,
            })
        );
        let hdr = parse_dot11(&inj.written[0][RADIOTAP_MIN_LEN..]).unwrap();
        assert_eq!(hdr.addr3, Some(DRONE));

        // drone as a client: ToDS, address1 is the BSSID
        let to_ap = frame(
            frame_control::TYPE_DATA,
            0,
            frame_control::FLAG_PROTECTED | frame_control::FLAG_TO_DS,
            &AP,
            &DRONE,
        );
        match classify(&to_ap, &set) {
            Classification::Data(target) => assert_eq!(target.bssid, AP),
            other => panic!("unexpected {:?}", other),
        }

        // four-address frames carry no single BSSID
        let wds = frame(
            frame_control::TYPE_DATA,
            0,
            frame_control::FLAG_PROTECTED | frame_control::FLAG_TO_DS | frame_control::FLAG_FROM_DS,
            &AP,
            &DRONE,
        );
        match classify(&wds, &set) {
            Classification::Data(target) => assert_eq!(target.bssid, MacAddr::ZERO),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unprotected_data_ignored() {
        let set = vendors();
        assert_eq!(classify(&data(&AP, &DRONE, false), &set), Classification::Ignored);
    }

    #[test]
    fn test_unflagged_mac_never_acts() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();
        let classifier = FrameClassifier::new(&set);

        for f in [beacon(&STRANGER), probe_req(&STRANGER), data(&AP, &STRANGER, true)] {
            assert_eq!(classifier.process(&f, &mut inj, &sink), Classification::Unflagged);
        }
        assert!(sink.detections.lock().unwrap().is_empty());
        assert_eq!(*sink.data_frames.lock().unwrap(), 0);
        assert!(inj.written.is_empty());
    }

    #[test]
    fn test_malformed_frames() {
        let set = vendors();
        assert_eq!(classify(&[], &set), Classification::Malformed);
        assert_eq!(classify(&[0, 0, 8, 0, 0, 0, 0, 0, 0x80], &set), Classification::Malformed);

        let mut truncated = beacon(&DRONE);
        let rt_len = u16::from_le_bytes([truncated[2], truncated[3]]) as usize;
        truncated.truncate(rt_len + 12);
        assert_eq!(classify(&truncated, &set), Classification::Malformed);
    }

    #[test]
    fn test_passive_counts_without_injecting() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();

        FrameClassifier::new(&set)
            .passive()
            .process(&data(&AP, &DRONE, true), &mut inj, &sink);

        assert_eq!(*sink.data_frames.lock().unwrap(), 1);
        assert_eq!(*sink.deauths.lock().unwrap(), 0);
        assert!(inj.written.is_empty());
    }

    #[test]
    fn test_failed_burst_not_counted() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector {
            fail_at: Some(3),
            ..Default::default()
        };

        FrameClassifier::new(&set).process(&data(&AP, &DRONE, true), &mut inj, &sink);

        assert_eq!(inj.written.len(), 3);
        assert_eq!(*sink.deauths.lock().unwrap(), 0);
    }

    #[test]
    fn test_repeated_data_frames_each_burst() {
        let set = vendors();
        let sink = RecordingSink::default();
        let mut inj = RecordingInjector::default();
        let classifier = FrameClassifier::new(&set);

        classifier.process(&data(&AP, &DRONE, true), &mut inj, &sink);
        classifier.process(&data(&AP, &DRONE, true), &mut inj, &sink);

        assert_eq!(inj.written.len(), 20);
        assert_eq!(*sink.deauths.lock().unwrap(), 2);
    }
}
