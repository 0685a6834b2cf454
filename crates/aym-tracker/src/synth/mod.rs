//! Channel synthesizers.
//!
//! A synthesizer keeps per-channel effect state between frames and turns the
//! scheduler's current row into register values. Row fields are applied only
//! on the first frame of a row; every frame advances sample and ornament
//! cursors and slides.

mod protracker1;
mod protracker2;
mod soundtracker;
mod soundtracker_pro;

pub use protracker1::ProTracker1Synth;
pub use protracker2::ProTracker2Synth;
pub use soundtracker::SoundTrackerSynth;
pub use soundtracker_pro::SoundTrackerProSynth;

use std::sync::Arc;

use aym_core::{MixerFlags, RegisterChunk, MAX_LEVEL};

use crate::formats::TrackerFormat;
use crate::frequency::FrequencyTable;
use crate::model::Module;
use crate::scheduler::Scheduler;

/// Per-family synthesis logic.
pub trait FrameSynthesizer: Send {
    /// Forget all channel state.
    fn reset(&mut self);

    /// Produce register values for the scheduler's current frame.
    fn synthesize(&mut self, scheduler: &Scheduler, frame: &mut FrameBuilder<'_>);
}

/// Synthesizer matching the module's format.
pub fn create(module: &Arc<Module>) -> Box<dyn FrameSynthesizer> {
    match module.format() {
        TrackerFormat::ProTracker1 => Box::new(ProTracker1Synth::new(Arc::clone(module))),
        TrackerFormat::ProTracker2 => Box::new(ProTracker2Synth::new(Arc::clone(module))),
        TrackerFormat::SoundTrackerPro => Box::new(SoundTrackerProSynth::new(Arc::clone(module))),
        TrackerFormat::SoundTrackerCompiled
        | TrackerFormat::SoundTracker3
        | TrackerFormat::SoundTracker => Box::new(SoundTrackerSynth::new(Arc::clone(module))),
    }
}

/// Accumulates one frame of register writes.
///
/// Shared registers (noise, envelope) take the value of the last writer, so
/// channels must be synthesized in a fixed order.
#[derive(Debug)]
pub struct FrameBuilder<'a> {
    table: &'a FrequencyTable,
    chunk: RegisterChunk,
    mixer: MixerFlags,
}

impl<'a> FrameBuilder<'a> {
    /// Empty frame at `timestamp` (µs) using `table` for note lookups.
    pub fn new(table: &'a FrequencyTable, timestamp: u64) -> Self {
        Self {
            table,
            chunk: RegisterChunk::new(timestamp),
            mixer: MixerFlags::empty(),
        }
    }

    /// Builder for `channel`; notes are shifted by `transposition` halftones.
    pub fn channel(&mut self, channel: usize, transposition: i32) -> ChannelBuilder<'_, 'a> {
        ChannelBuilder {
            frame: self,
            channel,
            transposition,
        }
    }

    /// Write the shared noise period.
    pub fn set_noise(&mut self, period: i32) {
        self.chunk.set_noise(period as u8);
    }

    /// (Re)trigger the envelope generator.
    pub fn set_envelope(&mut self, shape: u8, period: u16) {
        self.chunk.set_envelope_shape(shape);
        self.chunk.set_envelope_period(period);
    }

    /// Period distance between two notes.
    pub fn sliding_difference(&self, from: i32, to: i32) -> i32 {
        self.table.sliding_difference(from, to)
    }

    /// Finish the frame, writing the mixer.
    pub fn finish(mut self) -> RegisterChunk {
        self.chunk.set_mixer(self.mixer);
        self.chunk
    }
}

/// Register access for a single channel.
#[derive(Debug)]
pub struct ChannelBuilder<'b, 'a> {
    frame: &'b mut FrameBuilder<'a>,
    channel: usize,
    transposition: i32,
}

impl ChannelBuilder<'_, '_> {
    /// Tone of `halftones` (plus transposition) shifted by a period offset.
    pub fn set_tone(&mut self, halftones: i32, offset: i32) {
        let period = self
            .frame
            .table
            .tone(halftones + self.transposition, offset);
        self.frame.chunk.set_tone(self.channel, period);
    }

    /// Channel level, clamped to 0..=15.
    pub fn set_level(&mut self, level: i32) {
        self.frame
            .chunk
            .set_level(self.channel, level.clamp(0, i32::from(MAX_LEVEL)) as u8);
    }

    /// Use the envelope generator for this channel.
    pub fn enable_envelope(&mut self) {
        self.frame.chunk.enable_envelope(self.channel);
    }

    /// Mask the tone generator.
    pub fn disable_tone(&mut self) {
        self.frame.mixer |= MixerFlags::tone_off(self.channel);
    }

    /// Mask the noise generator.
    pub fn disable_noise(&mut self) {
        self.frame.mixer |= MixerFlags::noise_off(self.channel);
    }

    /// Write the shared noise period.
    pub fn set_noise(&mut self, period: i32) {
        self.frame.set_noise(period);
    }

    /// Silence the channel.
    pub fn mute(&mut self) {
        self.set_level(0);
        self.disable_tone();
        self.disable_noise();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transposition_shifts_notes() {
        let table = FrequencyTable::protracker2();
        let mut frame = FrameBuilder::new(&table, 0);
        frame.channel(1, 12).set_tone(0, 1);
        let chunk = frame.finish();
        assert_eq!(chunk.tone(1), Some(0x77c + 1));
        assert_eq!(chunk.tone(0), None);
    }

    #[test]
    fn mixer_collects_channel_masks() {
        let table = FrequencyTable::protracker2();
        let mut frame = FrameBuilder::new(&table, 0);
        frame.channel(0, 0).disable_noise();
        frame.channel(2, 0).mute();
        let chunk = frame.finish();
        let mixer = chunk.mixer();
        assert!(mixer.is_tone_enabled(0));
        assert!(!mixer.is_noise_enabled(0));
        assert!(!mixer.is_tone_enabled(2));
        assert_eq!(chunk.level(2), Some(0));
    }

    #[test]
    fn envelope_is_written_only_on_request() {
        let table = FrequencyTable::protracker2();
        let mut frame = FrameBuilder::new(&table, 0);
        frame.channel(0, 0).set_level(20);
        let chunk = frame.finish();
        assert_eq!(chunk.level(0), Some(15));
        assert_eq!(chunk.get(aym_core::Register::EnvelopeShape), None);
    }
}
