//! AY-3-8910 / YM2149 register map
//!
//! The sound-related part of the chip is controlled through registers R0-R13.
//! R14/R15 are the I/O ports and are never touched by the replayers, but the
//! bank keeps them so that dumps stay 16 bytes wide like on real hardware.

use std::fmt;

/// Number of addressable registers.
pub const REGISTER_COUNT: usize = 16;

/// Number of tone channels on a single chip.
pub const CHIP_CHANNELS: usize = 3;

/// Mask applied to 12-bit tone periods.
pub const TONE_MASK: u16 = 0x0fff;

/// Mask applied to the 5-bit noise period.
pub const NOISE_MASK: u8 = 0x1f;

/// Maximum channel level (4-bit DAC).
pub const MAX_LEVEL: u8 = 15;

/// Level register bit switching the channel to the envelope generator.
pub const LEVEL_ENVELOPE_BIT: u8 = 0x10;

/// Register address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    /// Channel A tone period, low byte - R0
    ToneALo = 0x00,
    /// Channel A tone period, high nibble - R1
    ToneAHi = 0x01,
    /// Channel B tone period, low byte - R2
    ToneBLo = 0x02,
    /// Channel B tone period, high nibble - R3
    ToneBHi = 0x03,
    /// Channel C tone period, low byte - R4
    ToneCLo = 0x04,
    /// Channel C tone period, high nibble - R5
    ToneCHi = 0x05,
    /// Noise period - R6
    Noise = 0x06,
    /// Mixer (tone/noise disable bits) - R7
    Mixer = 0x07,
    /// Channel A level - R8
    VolumeA = 0x08,
    /// Channel B level - R9
    VolumeB = 0x09,
    /// Channel C level - R10
    VolumeC = 0x0A,
    /// Envelope period, low byte - R11
    EnvelopeLo = 0x0B,
    /// Envelope period, high byte - R12
    EnvelopeHi = 0x0C,
    /// Envelope shape; writing it restarts the envelope - R13
    EnvelopeShape = 0x0D,
    /// I/O port A - R14
    PortA = 0x0E,
    /// I/O port B - R15
    PortB = 0x0F,
}

impl Register {
    /// All registers in address order.
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::ToneALo,
        Register::ToneAHi,
        Register::ToneBLo,
        Register::ToneBHi,
        Register::ToneCLo,
        Register::ToneCHi,
        Register::Noise,
        Register::Mixer,
        Register::VolumeA,
        Register::VolumeB,
        Register::VolumeC,
        Register::EnvelopeLo,
        Register::EnvelopeHi,
        Register::EnvelopeShape,
        Register::PortA,
        Register::PortB,
    ];

    /// Convert a raw register number to a `Register`, wrapping like the chip's 4-bit latch.
    pub fn from_addr(addr: u8) -> Self {
        Self::ALL[(addr & 0x0F) as usize]
    }

    /// Register address.
    pub fn addr(self) -> u8 {
        self as u8
    }

    /// Low byte of the tone period for `channel` (0..3).
    pub fn tone_lo(channel: usize) -> Self {
        Self::ALL[(channel % CHIP_CHANNELS) * 2]
    }

    /// High nibble of the tone period for `channel` (0..3).
    pub fn tone_hi(channel: usize) -> Self {
        Self::ALL[(channel % CHIP_CHANNELS) * 2 + 1]
    }

    /// Level register for `channel` (0..3).
    pub fn volume(channel: usize) -> Self {
        Self::ALL[Register::VolumeA as usize + channel % CHIP_CHANNELS]
    }

    /// Bit of this register in a 16-bit written-registers mask.
    pub fn mask_bit(self) -> u16 {
        1 << self.addr()
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Register::ToneALo => "channel A tone low",
            Register::ToneAHi => "channel A tone high",
            Register::ToneBLo => "channel B tone low",
            Register::ToneBHi => "channel B tone high",
            Register::ToneCLo => "channel C tone low",
            Register::ToneCHi => "channel C tone high",
            Register::Noise => "noise period",
            Register::Mixer => "mixer",
            Register::VolumeA => "channel A level",
            Register::VolumeB => "channel B level",
            Register::VolumeC => "channel C level",
            Register::EnvelopeLo => "envelope period low",
            Register::EnvelopeHi => "envelope period high",
            Register::EnvelopeShape => "envelope shape",
            Register::PortA => "I/O port A",
            Register::PortB => "I/O port B",
        };
        write!(f, "R{} ({})", self.addr(), name)
    }
}

/// Raw register bank (16 bytes)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterBank {
    /// Register values R0-R15
    pub registers: [u8; REGISTER_COUNT],
}

impl RegisterBank {
    /// Create a bank with all registers cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register value.
    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg as usize]
    }

    /// Write a register value.
    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg as usize] = value;
    }

    /// 12-bit tone period of `channel`.
    pub fn tone(&self, channel: usize) -> u16 {
        let lo = self.read(Register::tone_lo(channel)) as u16;
        let hi = self.read(Register::tone_hi(channel)) as u16;
        ((hi << 8) | lo) & TONE_MASK
    }

    /// Store a 12-bit tone period for `channel`.
    pub fn set_tone(&mut self, channel: usize, period: u16) {
        let period = period & TONE_MASK;
        self.write(Register::tone_lo(channel), (period & 0xff) as u8);
        self.write(Register::tone_hi(channel), (period >> 8) as u8);
    }

    /// 16-bit envelope period.
    pub fn envelope_period(&self) -> u16 {
        u16::from_le_bytes([
            self.read(Register::EnvelopeLo),
            self.read(Register::EnvelopeHi),
        ])
    }

    /// Store a 16-bit envelope period.
    pub fn set_envelope_period(&mut self, period: u16) {
        let [lo, hi] = period.to_le_bytes();
        self.write(Register::EnvelopeLo, lo);
        self.write(Register::EnvelopeHi, hi);
    }

    /// All registers as an array.
    pub fn as_array(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }
}
