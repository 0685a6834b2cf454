//! Note-to-period tables.
//!
//! Tables map a halftone index (0..96) to a 12-bit AY tone period. Out of
//! range halftones are clamped to the first or last entry.

use std::borrow::Cow;

use aym_core::TONE_MASK;

/// Number of entries in the built-in tables.
pub const TABLE_SIZE: usize = 96;

#[rustfmt::skip]
const PROTRACKER2: [u16; TABLE_SIZE] = [
    0xef8, 0xe10, 0xd60, 0xc80, 0xbd8, 0xb28, 0xa88, 0x9f0, 0x960, 0x8e0, 0x858, 0x7e0,
    0x77c, 0x708, 0x6b0, 0x640, 0x5ec, 0x594, 0x544, 0x4f8, 0x4b0, 0x470, 0x42c, 0x3fd,
    0x3be, 0x384, 0x358, 0x320, 0x2f6, 0x2ca, 0x2a2, 0x27c, 0x258, 0x238, 0x216, 0x1f8,
    0x1df, 0x1c2, 0x1ac, 0x190, 0x17b, 0x165, 0x151, 0x13e, 0x12c, 0x11c, 0x10a, 0x0fc,
    0x0ef, 0x0e1, 0x0d6, 0x0c8, 0x0bd, 0x0b2, 0x0a8, 0x09f, 0x096, 0x08e, 0x085, 0x07e,
    0x077, 0x070, 0x06b, 0x064, 0x05e, 0x059, 0x054, 0x04f, 0x04b, 0x047, 0x042, 0x03f,
    0x03b, 0x038, 0x035, 0x032, 0x02f, 0x02c, 0x02a, 0x027, 0x025, 0x023, 0x021, 0x01f,
    0x01d, 0x01c, 0x01a, 0x019, 0x017, 0x016, 0x015, 0x013, 0x012, 0x011, 0x010, 0x00f,
];

#[rustfmt::skip]
const SOUNDTRACKER: [u16; TABLE_SIZE] = [
    0xef8, 0xe10, 0xd60, 0xc80, 0xbd8, 0xb28, 0xa88, 0x9f0, 0x960, 0x8e0, 0x858, 0x7e0,
    0x77c, 0x708, 0x6b0, 0x640, 0x5ec, 0x594, 0x544, 0x4f8, 0x4b0, 0x470, 0x42c, 0x3f0,
    0x3be, 0x384, 0x358, 0x320, 0x2f6, 0x2ca, 0x2a2, 0x27c, 0x258, 0x238, 0x216, 0x1f8,
    0x1df, 0x1c2, 0x1ac, 0x190, 0x17b, 0x165, 0x151, 0x13e, 0x12c, 0x11c, 0x10b, 0x0fc,
    0x0ef, 0x0e1, 0x0d6, 0x0c8, 0x0bd, 0x0b2, 0x0a8, 0x09f, 0x096, 0x08e, 0x085, 0x07e,
    0x077, 0x070, 0x06b, 0x064, 0x05e, 0x059, 0x054, 0x04f, 0x04b, 0x047, 0x042, 0x03f,
    0x03b, 0x038, 0x035, 0x032, 0x02f, 0x02c, 0x02a, 0x027, 0x025, 0x023, 0x021, 0x01f,
    0x01d, 0x01c, 0x01a, 0x019, 0x017, 0x016, 0x015, 0x013, 0x012, 0x011, 0x010, 0x00f,
];

/// Tone period table owned by a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable(Cow<'static, [u16]>);

impl FrequencyTable {
    /// ProTracker table (shared by v1 and v2 modules).
    pub fn protracker2() -> Self {
        Self(Cow::Borrowed(&PROTRACKER2))
    }

    /// Sound Tracker table (shared by every Sound Tracker variant).
    pub fn soundtracker() -> Self {
        Self(Cow::Borrowed(&SOUNDTRACKER))
    }

    /// Table built from arbitrary periods; an empty list yields a single zero entry.
    pub fn custom(periods: Vec<u16>) -> Self {
        if periods.is_empty() {
            Self(Cow::Owned(vec![0]))
        } else {
            Self(Cow::Owned(periods))
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; tables hold at least one entry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clamp(&self, halftones: i32) -> usize {
        halftones.clamp(0, self.0.len() as i32 - 1) as usize
    }

    /// Period for a halftone index, clamped into the table.
    pub fn period(&self, halftones: i32) -> u16 {
        self.0[self.clamp(halftones)]
    }

    /// Period for `halftones` shifted by a signed period offset, wrapped to 12 bits.
    pub fn tone(&self, halftones: i32, offset: i32) -> u16 {
        ((i32::from(self.period(halftones)) + offset) as u16) & TONE_MASK
    }

    /// Period distance between two notes (`to - from`).
    pub fn sliding_difference(&self, from: i32, to: i32) -> i32 {
        i32::from(self.period(to)) - i32::from(self.period(from))
    }
}

impl Default for FrequencyTable {
    fn default() -> Self {
        Self::protracker2()
    }
}
