//! Channel tables per band

use dronewarden_common::{Band, Channel};

/// 2.4 GHz, channels 1-13 (frequency = mantissa * 10^exponent Hz)
pub static CHANNELS_2GHZ: [Channel; 13] = [
    Channel::new(2412, 6, 1),
    Channel::new(2417, 6, 2),
    Channel::new(2422, 6, 3),
    Channel::new(2427, 6, 4),
    Channel::new(2432, 6, 5),
    Channel::new(2437, 6, 6),
    Channel::new(2442, 6, 7),
    Channel::new(2447, 6, 8),
    Channel::new(2452, 6, 9),
    Channel::new(2457, 6, 10),
    Channel::new(2462, 6, 11),
    Channel::new(2467, 6, 12),
    Channel::new(2472, 6, 13),
];

/// 5 GHz, UNII-1/2 and UNII-2e up to channel 136
pub static CHANNELS_5GHZ: [Channel; 18] = [
    Channel::new(518, 7, 36),
    Channel::new(520, 7, 40),
    Channel::new(522, 7, 44),
    Channel::new(524, 7, 48),
    Channel::new(526, 7, 52),
    Channel::new(528, 7, 56),
    Channel::new(530, 7, 60),
    Channel::new(532, 7, 64),
    Channel::new(550, 7, 100),
    Channel::new(552, 7, 104),
    Channel::new(554, 7, 108),
    Channel::new(556, 7, 112),
    Channel::new(558, 7, 116),
    Channel::new(560, 7, 120),
    Channel::new(562, 7, 124),
    Channel::new(564, 7, 128),
    Channel::new(566, 7, 132),
    Channel::new(568, 7, 136),
];

pub fn channel_table(band: Band) -> &'static [Channel] {
    match band {
        Band::TwoGhz => &CHANNELS_2GHZ,
        Band::FiveGhz => &CHANNELS_5GHZ,
    }
}

/// Endless walk over a channel table, wrapping after the last entry.
#[derive(Debug, Clone)]
pub struct ChannelCycle {
    table: &'static [Channel],
    next: usize,
}

impl ChannelCycle {
    pub fn new(band: Band) -> Self {
        Self {
            table: channel_table(band),
            next: 0,
        }
    }
}

impl Iterator for ChannelCycle {
    type Item = Channel;

    fn next(&mut self) -> Option<Channel> {
        let channel = *self.table.get(self.next)?;
        self.next = (self.next + 1) % self.table.len();
        Some(channel)
    }
}
