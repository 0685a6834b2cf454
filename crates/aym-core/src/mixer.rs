//! Mixer control register (R7)
//!
//! A set bit disables the corresponding source, so an all-zero register means
//! "tone and noise enabled on every channel".

use bitflags::bitflags;

use crate::registers::CHIP_CHANNELS;

bitflags! {
    /// Mixer Control Register (R7) bitflags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MixerFlags: u8 {
        /// Channel A tone off
        const TONE_A_OFF = 0x01;
        /// Channel B tone off
        const TONE_B_OFF = 0x02;
        /// Channel C tone off
        const TONE_C_OFF = 0x04;
        /// Channel A noise off
        const NOISE_A_OFF = 0x08;
        /// Channel B noise off
        const NOISE_B_OFF = 0x10;
        /// Channel C noise off
        const NOISE_C_OFF = 0x20;
    }
}

impl MixerFlags {
    /// Create mixer flags from a raw register value.
    pub fn from_register(value: u8) -> Self {
        MixerFlags::from_bits_truncate(value)
    }

    /// Tone-off flag for `channel`.
    pub fn tone_off(channel: usize) -> Self {
        Self::from_bits_truncate(1 << (channel % CHIP_CHANNELS))
    }

    /// Noise-off flag for `channel`.
    pub fn noise_off(channel: usize) -> Self {
        Self::from_bits_truncate(8 << (channel % CHIP_CHANNELS))
    }

    /// Whether the tone generator reaches `channel`.
    pub fn is_tone_enabled(&self, channel: usize) -> bool {
        !self.contains(Self::tone_off(channel))
    }

    /// Whether the noise generator reaches `channel`.
    pub fn is_noise_enabled(&self, channel: usize) -> bool {
        !self.contains(Self::noise_off(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_channel_bits_follow_register_layout() {
        assert_eq!(MixerFlags::tone_off(0).bits(), 0x01);
        assert_eq!(MixerFlags::tone_off(2).bits(), 0x04);
        assert_eq!(MixerFlags::noise_off(1).bits(), 0x10);
    }

    #[test]
    fn cleared_register_enables_everything() {
        let flags = MixerFlags::from_register(0);
        for chan in 0..CHIP_CHANNELS {
            assert!(flags.is_tone_enabled(chan));
            assert!(flags.is_noise_enabled(chan));
        }
    }

    #[test]
    fn io_port_bits_are_dropped() {
        let flags = MixerFlags::from_register(0xc9);
        assert_eq!(flags.bits(), 0x09);
        assert!(!flags.is_tone_enabled(0));
        assert!(!flags.is_noise_enabled(0));
        assert!(flags.is_tone_enabled(1));
    }
}
