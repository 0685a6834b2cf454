//! AY-3-8910 / YM2149 chip-side vocabulary
//!
//! This crate holds everything a replayer needs to talk to a sound chip
//! without depending on any particular emulator:
//!
//! - [`Register`] / [`RegisterBank`] - the register map
//! - [`MixerFlags`] - mixer register (R7) bits
//! - [`RegisterChunk`] - one frame of register writes, time-stamped
//! - [`ChipDevice`] - the device abstraction consuming chunks
//! - [`RegisterRecorder`] - a silent device tracking registers, with an optional bounded log
//! - [`SharedDevice`] - a device handle shareable across threads

#![warn(missing_docs)]

pub mod chunk;
pub mod device;
pub mod mixer;
pub mod recorder;
pub mod registers;
pub mod shared;

pub use chunk::RegisterChunk;
pub use device::{ChipDevice, ChipState, DeviceError};
pub use mixer::MixerFlags;
pub use recorder::{RecordedFrame, RegisterRecorder, DUMP_FRAME_SIZE};
pub use registers::{
    Register, RegisterBank, CHIP_CHANNELS, LEVEL_ENVELOPE_BIT, MAX_LEVEL, NOISE_MASK,
    REGISTER_COUNT, TONE_MASK,
};
pub use shared::SharedDevice;
