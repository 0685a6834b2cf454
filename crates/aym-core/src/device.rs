//! Chip device abstraction
//!
//! Replayers never talk to an emulator directly. They produce
//! [`RegisterChunk`]s and hand them to something implementing [`ChipDevice`]:
//! a cycle-accurate emulator, a register logger, a hardware bridge, etc.
//!
//! # Example
//!
//! ```
//! use aym_core::{ChipDevice, RegisterChunk, RegisterRecorder};
//!
//! # fn main() -> Result<(), aym_core::DeviceError> {
//! let mut chip = RegisterRecorder::new(44_100)?;
//! let mut chunk = RegisterChunk::new(0);
//! chunk.set_tone(0, 0x1c2);
//! chunk.set_level(0, 15);
//!
//! chip.render_data(&chunk);
//! let samples = chip.render_till(20_000);
//! assert_eq!(samples.len(), 882);
//! assert_eq!(chip.state().registers.tone(0), 0x1c2);
//! # Ok(())
//! # }
//! ```

use crate::chunk::RegisterChunk;
use crate::registers::{RegisterBank, CHIP_CHANNELS};
use thiserror::Error;

/// Errors raised when configuring a device.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Sample rate must be non-zero.
    #[error("invalid sample rate {0} Hz")]
    InvalidSampleRate(u32),
}

/// Snapshot of a chip for analysis and visualization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipState {
    /// Current register contents.
    pub registers: RegisterBank,
    /// Timestamp (µs) up to which audio has been produced.
    pub rendered_till: u64,
    /// Number of chunks applied since the last reset.
    pub chunks: u64,
}

impl ChipState {
    /// Channel levels (0-15) without the envelope bit.
    pub fn levels(&self) -> [u8; CHIP_CHANNELS] {
        let mut levels = [0; CHIP_CHANNELS];
        for (chan, level) in levels.iter_mut().enumerate() {
            *level = self.registers.read(crate::Register::volume(chan)) & crate::MAX_LEVEL;
        }
        levels
    }
}

/// External chip consuming register chunks.
///
/// Calls come in pairs: `render_data` with the frame's chunk, then
/// `render_till` with the timestamp where the next frame starts.
pub trait ChipDevice: Send {
    /// Reset registers and internal generators.
    fn reset(&mut self);

    /// Apply the written registers of `chunk`.
    fn render_data(&mut self, chunk: &RegisterChunk);

    /// Produce audio up to `end` (µs since playback start).
    ///
    /// The returned samples are not retained by the device; timestamps not
    /// past the last rendered one yield an empty buffer.
    fn render_till(&mut self, end: u64) -> Vec<f32>;

    /// Current chip state.
    fn state(&self) -> ChipState;

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;
}

impl<D: ChipDevice + ?Sized> ChipDevice for Box<D> {
    fn reset(&mut self) {
        (**self).reset()
    }

    fn render_data(&mut self, chunk: &RegisterChunk) {
        (**self).render_data(chunk)
    }

    fn render_till(&mut self, end: u64) -> Vec<f32> {
        (**self).render_till(end)
    }

    fn state(&self) -> ChipState {
        (**self).state()
    }

    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }
}
