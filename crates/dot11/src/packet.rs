//! Radiotap + 802.11 decoding and deauthentication frame building
//!
//! Everything here works on borrowed byte slices:
//! - no allocation on the decode path
//! - a frame that is too short or malformed decodes to `None`
//! - building writes into a caller-supplied buffer and returns its length

use dronewarden_common::MacAddr;

/// 802.11 frame control constants
pub mod frame_control {
    pub const TYPE_MGMT: u8 = 0;
    pub const TYPE_CTRL: u8 = 1;
    pub const TYPE_DATA: u8 = 2;

    pub const SUBTYPE_PROBE_REQ: u8 = 4;
    pub const SUBTYPE_BEACON: u8 = 8;
    pub const SUBTYPE_DEAUTH: u8 = 12;

    pub const SUBTYPE_CTRL_CTS: u8 = 12;
    pub const SUBTYPE_CTRL_ACK: u8 = 13;

    pub const FLAG_TO_DS: u8 = 0x01;
    pub const FLAG_FROM_DS: u8 = 0x02;
    /// Frame body is encrypted (WEP/TKIP/CCMP)
    pub const FLAG_PROTECTED: u8 = 0x40;
}

/// 802.11 reason codes
pub mod reason {
    /// Previous authentication no longer valid
    pub const PREV_AUTH_EXPIRED: u16 = 2;
}

/// Radiotap "present" bits we understand, in field order
mod field {
    pub const TSFT: u32 = 0;
    pub const FLAGS: u32 = 1;
    pub const RATE: u32 = 2;
    pub const CHANNEL: u32 = 3;
    pub const FHSS: u32 = 4;
    pub const DBM_ANTSIGNAL: u32 = 5;
    pub const EXT: u32 = 31;
}

/// Minimal radiotap header: version, pad, length, empty present word.
pub const RADIOTAP_MIN_LEN: usize = 8;
/// FC + duration + addr1 + addr2 + addr3 + sequence control
pub const DOT11_MGMT_HDR_LEN: usize = 24;
/// Radiotap + management header + reason code
pub const DEAUTH_FRAME_LEN: usize = RADIOTAP_MIN_LEN + DOT11_MGMT_HDR_LEN + 2;

/// Radio metadata pulled out of the radiotap header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RadioInfo {
    pub signal_dbm: Option<i8>,
    pub frequency_mhz: Option<u16>,
}

/// The parts of an 802.11 MAC header the classifier needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dot11Header {
    pub frame_type: u8,
    pub subtype: u8,
    pub flags: u8,
    pub addr1: MacAddr,
    /// Absent on CTS/ACK and on truncated frames
    pub addr2: Option<MacAddr>,
    pub addr3: Option<MacAddr>,
}

impl Dot11Header {
    #[inline]
    pub fn is_protected(&self) -> bool {
        self.flags & frame_control::FLAG_PROTECTED != 0
    }

    #[inline]
    pub fn is_beacon(&self) -> bool {
        self.frame_type == frame_control::TYPE_MGMT
            && self.subtype == frame_control::SUBTYPE_BEACON
    }

    #[inline]
    pub fn is_probe_request(&self) -> bool {
        self.frame_type == frame_control::TYPE_MGMT
            && self.subtype == frame_control::SUBTYPE_PROBE_REQ
    }

    #[inline]
    pub fn is_data(&self) -> bool {
        self.frame_type == frame_control::TYPE_DATA
    }

    /// BSSID of the frame, located by the ToDS/FromDS bits for data frames.
    /// `None` for control frames and four-address (WDS) data frames.
    pub fn bssid(&self) -> Option<MacAddr> {
        match self.frame_type {
            frame_control::TYPE_MGMT => self.addr3,
            frame_control::TYPE_DATA => {
                let to_ds = self.flags & frame_control::FLAG_TO_DS != 0;
                let from_ds = self.flags & frame_control::FLAG_FROM_DS != 0;
                match (to_ds, from_ds) {
                    (false, false) => self.addr3,
                    (true, false) => Some(self.addr1),
                    (false, true) => self.addr2,
                    (true, true) => None,
                }
            }
            _ => None,
        }
    }
}

/// A decoded captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedFrame {
    pub radio: RadioInfo,
    pub header: Dot11Header,
}

/// Parse the radiotap header at the start of `buf`.
/// Returns the radio metadata and the header length (offset of the 802.11 frame).
pub fn parse_radiotap(buf: &[u8]) -> Option<(RadioInfo, usize)> {
    if buf.len() < RADIOTAP_MIN_LEN || buf[0] != 0 {
        return None;
    }

    let header_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;
    if header_len < RADIOTAP_MIN_LEN || header_len > buf.len() {
        return None;
    }
    let hdr = &buf[..header_len];

    // Walk the chained present words; only the first one drives field parsing.
    let present = u32::from_le_bytes([hdr[4], hdr[5], hdr[6], hdr[7]]);
    let mut offset = 4;
    let mut word = present;
    while word & (1 << field::EXT) != 0 {
        offset += 4;
        if offset + 4 > header_len {
            return None;
        }
        word = u32::from_le_bytes([
            hdr[offset],
            hdr[offset + 1],
            hdr[offset + 2],
            hdr[offset + 3],
        ]);
    }
    offset += 4;

    let mut radio = RadioInfo::default();

    // Fields are naturally aligned relative to the start of the header.
    let bit = |b: u32| present & (1 << b) != 0;

    if bit(field::TSFT) {
        offset = align(offset, 8) + 8;
    }
    if bit(field::FLAGS) {
        offset += 1;
    }
    if bit(field::RATE) {
        offset += 1;
    }
    if bit(field::CHANNEL) {
        offset = align(offset, 2);
        if offset + 4 > header_len {
            return Some((radio, header_len));
        }
        radio.frequency_mhz = Some(u16::from_le_bytes([hdr[offset], hdr[offset + 1]]));
        offset += 4;
    }
    if bit(field::FHSS) {
        offset += 2;
    }
    if bit(field::DBM_ANTSIGNAL) && offset < header_len {
        radio.signal_dbm = Some(hdr[offset] as i8);
    }

    Some((radio, header_len))
}

#[inline(always)]
fn align(offset: usize, to: usize) -> usize {
    (offset + to - 1) & !(to - 1)
}

/// Parse the 802.11 MAC header at the start of `buf`.
pub fn parse_dot11(buf: &[u8]) -> Option<Dot11Header> {
    // FC(2) + duration(2) + addr1(6) is the smallest frame (CTS/ACK)
    if buf.len() < 10 {
        return None;
    }

    let fc = buf[0];
    if fc & 0x03 != 0 {
        // Unknown protocol version
        return None;
    }
    let frame_type = (fc >> 2) & 0x03;
    let subtype = fc >> 4;
    let flags = buf[1];

    let addr1 = MacAddr::from_slice(&buf[4..10])?;

    let short_ctrl = frame_type == frame_control::TYPE_CTRL
        && matches!(
            subtype,
            frame_control::SUBTYPE_CTRL_CTS | frame_control::SUBTYPE_CTRL_ACK
        );
    let (addr2, addr3) = if short_ctrl {
        (None, None)
    } else {
        (
            buf.get(10..16).and_then(MacAddr::from_slice),
            buf.get(16..22).and_then(MacAddr::from_slice),
        )
    };

    Some(Dot11Header {
        frame_type,
        subtype,
        flags,
        addr1,
        addr2,
        addr3,
    })
}

/// Decode radiotap + 802.11 header of a captured frame.
pub fn decode_frame(buf: &[u8]) -> Option<DecodedFrame> {
    let (radio, offset) = parse_radiotap(buf)?;
    let header = parse_dot11(&buf[offset..])?;
    Some(DecodedFrame { radio, header })
}

/// Build a radiotap-prefixed deauthentication frame into `buf`.
/// Returns the number of bytes written, or 0 if `buf` is too small.
///
/// The frame is addressed to `station` and claims to come from `ap` within
/// `bssid`.
pub fn build_deauth(
    buf: &mut [u8],
    station: &MacAddr,
    ap: &MacAddr,
    bssid: &MacAddr,
    reason: u16,
) -> usize {
    if buf.len() < DEAUTH_FRAME_LEN {
        return 0;
    }

    // Radiotap: version 0, pad, length 8, nothing present
    buf[0] = 0;
    buf[1] = 0;
    buf[2..4].copy_from_slice(&(RADIOTAP_MIN_LEN as u16).to_le_bytes());
    buf[4..8].copy_from_slice(&0u32.to_le_bytes());

    let h = &mut buf[RADIOTAP_MIN_LEN..DEAUTH_FRAME_LEN];
    h[0] = (frame_control::SUBTYPE_DEAUTH << 4) | (frame_control::TYPE_MGMT << 2);
    h[1] = 0; // Flags
    h[2..4].copy_from_slice(&[0, 0]); // Duration
    h[4..10].copy_from_slice(station.octets());
    h[10..16].copy_from_slice(ap.octets());
    h[16..22].copy_from_slice(bssid.octets());
    h[22..24].copy_from_slice(&[0, 0]); // Sequence control
    h[24..26].copy_from_slice(&reason.to_le_bytes());

    DEAUTH_FRAME_LEN
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const AP: MacAddr = MacAddr::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
    pub const DRONE: MacAddr = MacAddr::new([0x60, 0x60, 0x1f, 0xaa, 0xbb, 0xcc]);

    /// Radiotap with flags, rate, channel and antenna signal, like most
    /// monitor-mode drivers emit.
    pub fn radiotap(freq: u16, signal: i8) -> Vec<u8> {
        let present: u32 = (1 << field::FLAGS)
            | (1 << field::RATE)
            | (1 << field::CHANNEL)
            | (1 << field::DBM_ANTSIGNAL);
        let mut v = vec![0u8, 0, 0, 0];
        v.extend_from_slice(&present.to_le_bytes());
        v.push(0x00); // flags
        v.push(0x02); // rate
        v.extend_from_slice(&freq.to_le_bytes());
        v.extend_from_slice(&0x00a0u16.to_le_bytes()); // channel flags
        v.push(signal as u8);
        v.push(0); // pad
        let len = v.len() as u16;
        v[2..4].copy_from_slice(&len.to_le_bytes());
        v
    }

    pub fn frame(frame_type: u8, subtype: u8, flags: u8, addr1: &MacAddr, addr2: &MacAddr) -> Vec<u8> {
        let mut v = radiotap(2437, -42);
        v.push((subtype << 4) | (frame_type << 2));
        v.push(flags);
        v.extend_from_slice(&[0, 0]);
        v.extend_from_slice(addr1.octets());
        v.extend_from_slice(addr2.octets());
        v.extend_from_slice(addr1.octets());
        v.extend_from_slice(&[0, 0]);
        v.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]);
        v
    }

    #[test]
    fn test_parse_radiotap() {
        let buf = radiotap(5180, -67);
        let (radio, len) = parse_radiotap(&buf).unwrap();
        assert_eq!(len, buf.len());
        assert_eq!(radio.frequency_mhz, Some(5180));
        assert_eq!(radio.signal_dbm, Some(-67));
    }

    #[test]
    fn test_parse_radiotap_with_tsft_alignment() {
        let present: u32 = (1 << field::TSFT) | (1 << field::FLAGS) | (1 << field::CHANNEL);
        let mut v = vec![0u8, 0, 0, 0];
        v.extend_from_slice(&present.to_le_bytes());
        v.extend_from_slice(&0x1122334455667788u64.to_le_bytes());
        v.push(0x10); // flags
        v.push(0); // align channel to 2
        v.extend_from_slice(&2462u16.to_le_bytes());
        v.extend_from_slice(&0u16.to_le_bytes());
        let len = v.len() as u16;
        v[2..4].copy_from_slice(&len.to_le_bytes());

        let (radio, _) = parse_radiotap(&v).unwrap();
        assert_eq!(radio.frequency_mhz, Some(2462));
        assert_eq!(radio.signal_dbm, None);
    }

    #[test]
    fn test_parse_radiotap_chained_present_words() {
        let first: u32 = (1 << field::FLAGS)
            | (1 << field::CHANNEL)
            | (1 << field::DBM_ANTSIGNAL)
            | (1 << field::EXT);
        let second: u32 = 1 << 29; // vendor namespace, ignored
        let mut v = vec![0u8, 0, 0, 0];
        v.extend_from_slice(&first.to_le_bytes());
        v.extend_from_slice(&second.to_le_bytes());
        v.push(0x10); // flags
        v.push(0); // align channel to 2
        v.extend_from_slice(&5745u16.to_le_bytes());
        v.extend_from_slice(&0x0140u16.to_le_bytes());
        v.push(-71i8 as u8);
        v.push(0);
        let len = v.len() as u16;
        v[2..4].copy_from_slice(&len.to_le_bytes());

        let (radio, hdr_len) = parse_radiotap(&v).unwrap();
        assert_eq!(hdr_len, v.len());
        assert_eq!(radio.frequency_mhz, Some(5745));
        assert_eq!(radio.signal_dbm, Some(-71));
    }

    #[test]
    fn test_parse_radiotap_ext_past_header_end() {
        let present: u32 = 1 << field::EXT;
        let mut v = vec![0u8, 0, 8, 0];
        v.extend_from_slice(&present.to_le_bytes());
        // trailing bytes belong to the 802.11 frame, not the header
        v.extend_from_slice(&[0xff; 8]);
        assert!(parse_radiotap(&v).is_none());
    }

    #[test]
    fn test_parse_dot11_rejects_unknown_version() {
        let mut buf = frame(frame_control::TYPE_MGMT, frame_control::SUBTYPE_BEACON, 0, &MacAddr::BROADCAST, &DRONE);
        let (_, offset) = parse_radiotap(&buf).unwrap();
        assert!(parse_dot11(&buf[offset..]).is_some());

        buf[offset] |= 0x01;
        assert!(parse_dot11(&buf[offset..]).is_none());
        assert!(decode_frame(&buf).is_none());
    }

    #[test]
    fn test_parse_radiotap_rejects_garbage() {
        assert!(parse_radiotap(&[]).is_none());
        assert!(parse_radiotap(&[0, 0, 0xff, 0x00, 0, 0, 0, 0]).is_none());
        assert!(parse_radiotap(&[1, 0, 8, 0, 0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_parse_dot11_beacon() {
        let buf = frame(frame_control::TYPE_MGMT, frame_control::SUBTYPE_BEACON, 0, &MacAddr::BROADCAST, &DRONE);
        let decoded = decode_frame(&buf).unwrap();
        assert!(decoded.header.is_beacon());
        assert_eq!(decoded.header.addr1, MacAddr::BROADCAST);
        assert_eq!(decoded.header.addr2, Some(DRONE));
        assert_eq!(decoded.radio.frequency_mhz, Some(2437));
    }

    #[test]
    fn test_parse_dot11_ack_has_no_addr2() {
        let mut buf = vec![(frame_control::SUBTYPE_CTRL_ACK << 4) | (frame_control::TYPE_CTRL << 2), 0, 0, 0];
        buf.extend_from_slice(DRONE.octets());
        let hdr = parse_dot11(&buf).unwrap();
        assert_eq!(hdr.addr2, None);
    }

    #[test]
    fn test_parse_dot11_truncated() {
        assert!(parse_dot11(&[0x80, 0x00, 0, 0, 1, 2, 3]).is_none());
        // addr2 cut short
        let hdr = parse_dot11(&[0x80, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(hdr.addr2, None);
    }

    #[test]
    fn test_build_deauth() {
        let mut buf = [0u8; 64];
        let len = build_deauth(&mut buf, &DRONE, &AP, &AP, reason::PREV_AUTH_EXPIRED);
        assert_eq!(len, DEAUTH_FRAME_LEN);
        assert_eq!(len, 34);

        let (_, offset) = parse_radiotap(&buf[..len]).unwrap();
        assert_eq!(offset, RADIOTAP_MIN_LEN);

        let hdr = parse_dot11(&buf[offset..len]).unwrap();
        assert_eq!(hdr.frame_type, frame_control::TYPE_MGMT);
        assert_eq!(hdr.subtype, frame_control::SUBTYPE_DEAUTH);
        assert_eq!(hdr.addr1, DRONE);
        assert_eq!(hdr.addr2, Some(AP));
        assert_eq!(hdr.bssid(), Some(AP));
        assert_eq!(&buf[len - 2..len], &[2, 0]);
    }

    #[test]
    fn test_build_deauth_short_buffer() {
        let mut buf = [0u8; 20];
        assert_eq!(build_deauth(&mut buf, &DRONE, &AP, &AP, reason::PREV_AUTH_EXPIRED), 0);
    }
}
