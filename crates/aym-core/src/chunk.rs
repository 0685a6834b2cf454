//! Time-stamped register chunks
//!
//! A chunk is what a replayer hands to a chip for one frame: the register
//! values it produced plus a mask of which registers were actually written.
//! Devices only apply written registers, which matters for R13 where a write
//! restarts the envelope generator.

use crate::mixer::MixerFlags;
use crate::registers::{Register, RegisterBank, LEVEL_ENVELOPE_BIT, MAX_LEVEL, NOISE_MASK};

/// Register values produced for one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterChunk {
    /// Start of the frame in microseconds since playback start.
    pub timestamp: u64,
    /// Register values.
    pub registers: RegisterBank,
    /// Bit `n` set means register `Rn` was written during the frame.
    pub written: u16,
}

impl RegisterChunk {
    /// Empty chunk at `timestamp`.
    pub fn new(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Write a register and mark it as written.
    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers.write(reg, value);
        self.written |= reg.mask_bit();
    }

    /// Value of `reg` if it was written in this chunk.
    pub fn get(&self, reg: Register) -> Option<u8> {
        self.is_written(reg).then(|| self.registers.read(reg))
    }

    /// Whether `reg` was written in this chunk.
    pub fn is_written(&self, reg: Register) -> bool {
        self.written & reg.mask_bit() != 0
    }

    /// Iterate over `(register, value)` for written registers in address order.
    pub fn iter_written(&self) -> impl Iterator<Item = (Register, u8)> + '_ {
        Register::ALL
            .iter()
            .copied()
            .filter(move |reg| self.is_written(*reg))
            .map(move |reg| (reg, self.registers.read(reg)))
    }

    /// Store a 12-bit tone period for `channel`.
    pub fn set_tone(&mut self, channel: usize, period: u16) {
        self.registers.set_tone(channel, period);
        self.written |= Register::tone_lo(channel).mask_bit() | Register::tone_hi(channel).mask_bit();
    }

    /// Tone period of `channel`, if written.
    pub fn tone(&self, channel: usize) -> Option<u16> {
        self.is_written(Register::tone_lo(channel))
            .then(|| self.registers.tone(channel))
    }

    /// Store a channel level (clamped to 0..=15), keeping the envelope bit if set.
    pub fn set_level(&mut self, channel: usize, level: u8) {
        let reg = Register::volume(channel);
        let envelope = self.registers.read(reg) & LEVEL_ENVELOPE_BIT;
        self.write(reg, level.min(MAX_LEVEL) | envelope);
    }

    /// Switch `channel` to the envelope generator.
    pub fn enable_envelope(&mut self, channel: usize) {
        let reg = Register::volume(channel);
        let value = self.registers.read(reg) | LEVEL_ENVELOPE_BIT;
        self.write(reg, value);
    }

    /// Level register of `channel` without the envelope bit, if written.
    pub fn level(&self, channel: usize) -> Option<u8> {
        self.get(Register::volume(channel))
            .map(|v| v & MAX_LEVEL)
    }

    /// Whether `channel` uses the envelope generator in this chunk.
    pub fn uses_envelope(&self, channel: usize) -> bool {
        self.get(Register::volume(channel))
            .is_some_and(|v| v & LEVEL_ENVELOPE_BIT != 0)
    }

    /// Store the 5-bit noise period.
    pub fn set_noise(&mut self, period: u8) {
        self.write(Register::Noise, period & NOISE_MASK);
    }

    /// Store the mixer register.
    pub fn set_mixer(&mut self, flags: MixerFlags) {
        self.write(Register::Mixer, flags.bits());
    }

    /// Mixer flags (all sources enabled when the mixer was not written).
    pub fn mixer(&self) -> MixerFlags {
        MixerFlags::from_register(self.get(Register::Mixer).unwrap_or(0))
    }

    /// Store the envelope shape; this restarts the envelope on the chip.
    pub fn set_envelope_shape(&mut self, shape: u8) {
        self.write(Register::EnvelopeShape, shape & 0x0f);
    }

    /// Store the 16-bit envelope period.
    pub fn set_envelope_period(&mut self, period: u16) {
        self.registers.set_envelope_period(period);
        self.written |= Register::EnvelopeLo.mask_bit() | Register::EnvelopeHi.mask_bit();
    }

    /// Apply written registers on top of `bank`.
    pub fn apply_to(&self, bank: &mut RegisterBank) {
        for (reg, value) in self.iter_written() {
            bank.write(reg, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn untouched_registers_are_not_reported() {
        let mut chunk = RegisterChunk::new(20_000);
        chunk.set_tone(0, 0x123);
        assert_eq!(chunk.tone(0), Some(0x123));
        assert_eq!(chunk.tone(1), None);
        assert_eq!(chunk.get(Register::EnvelopeShape), None);
        assert_eq!(chunk.iter_written().count(), 2);
    }

    #[test]
    fn level_keeps_envelope_bit() {
        let mut chunk = RegisterChunk::new(0);
        chunk.set_level(1, 20);
        assert_eq!(chunk.level(1), Some(15));
        chunk.enable_envelope(1);
        chunk.set_level(1, 3);
        assert!(chunk.uses_envelope(1));
        assert_eq!(chunk.get(Register::VolumeB), Some(0x13));
    }

    #[test]
    fn apply_only_touches_written_registers() {
        let mut bank = RegisterBank::new();
        bank.write(Register::EnvelopeShape, 0x0e);
        bank.write(Register::Noise, 7);

        let mut chunk = RegisterChunk::new(0);
        chunk.set_noise(0x3f);
        chunk.apply_to(&mut bank);

        assert_eq!(bank.read(Register::Noise), 0x1f);
        assert_eq!(bank.read(Register::EnvelopeShape), 0x0e);
    }
}
