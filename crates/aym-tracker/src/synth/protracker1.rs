//! ProTracker 1 channel synthesis.
//!
//! Ornaments advance in step with the sample, so a note restarts both.

use std::sync::Arc;

use aym_core::CHIP_CHANNELS;

use super::{ChannelBuilder, FrameBuilder, FrameSynthesizer};
use crate::model::{Cell, Command, Module};
use crate::scheduler::Scheduler;

/// Highest halftone the player addresses.
const MAX_HALFTONE: i32 = 95;
/// The player's table is one period short at this halftone.
const CORRECTED_HALFTONE: i32 = 46;

/// Channel volume scaled by sample level, rounded to nearest.
fn scaled_level(volume: u8, level: u8) -> i32 {
    let volume = i32::from(volume);
    ((volume * 17 + i32::from(volume > 7)) * i32::from(level) + 128) / 256
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChannelState {
    enabled: bool,
    envelope: bool,
    note: i32,
    sample: usize,
    position: usize,
    ornament: usize,
    volume: u8,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: false,
            envelope: false,
            note: 0,
            sample: 0,
            position: 0,
            ornament: 0,
            volume: 15,
        }
    }
}

impl ChannelState {
    fn apply(&mut self, cell: &Cell, frame: &mut FrameBuilder<'_>) {
        if let Some(enabled) = cell.enabled {
            self.enabled = enabled;
        }
        if let Some(note) = cell.note {
            self.note = i32::from(note);
            self.position = 0;
        }
        if let Some(sample) = cell.sample {
            self.sample = sample;
        }
        if let Some(ornament) = cell.ornament {
            self.ornament = ornament;
        }
        if let Some(volume) = cell.volume {
            self.volume = volume;
        }
        for command in &cell.commands {
            match *command {
                Command::Envelope { shape, period } => {
                    frame.set_envelope(shape, period);
                    self.envelope = true;
                }
                Command::NoEnvelope => self.envelope = false,
                _ => {}
            }
        }
    }

    fn synthesize(&mut self, module: &Module, channel: &mut ChannelBuilder<'_, '_>) {
        if !self.enabled {
            channel.set_level(0);
            return;
        }
        let sample = module.sample(self.sample);
        let line = sample.line(self.position);
        let ornament = module.ornament(self.ornament);

        let halftones =
            (self.note + i32::from(ornament.offset(self.position))).clamp(0, MAX_HALFTONE);
        let correction = i32::from(halftones == CORRECTED_HALFTONE);
        channel.set_tone(halftones, i32::from(line.vibrato) + correction);
        if line.tone_mask {
            channel.disable_tone();
        }
        channel.set_level(scaled_level(self.volume, line.level));
        if self.envelope {
            channel.enable_envelope();
        }
        if line.noise_mask {
            channel.disable_noise();
        } else {
            channel.set_noise(i32::from(line.noise));
        }

        self.position += 1;
        if self.position >= sample.size() {
            self.position = sample.loop_start;
        }
    }
}

/// Synthesizer for ProTracker 1 modules.
#[derive(Debug)]
pub struct ProTracker1Synth {
    module: Arc<Module>,
    channels: [ChannelState; CHIP_CHANNELS],
}

impl ProTracker1Synth {
    /// Synthesizer with all channels off.
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            module,
            channels: Default::default(),
        }
    }
}

impl FrameSynthesizer for ProTracker1Synth {
    fn reset(&mut self) {
        self.channels = Default::default();
    }

    fn synthesize(&mut self, scheduler: &Scheduler, frame: &mut FrameBuilder<'_>) {
        if scheduler.state().is_row_start() {
            if let Some(line) = scheduler.current_line() {
                for (state, cell) in self.channels.iter_mut().zip(&line.cells) {
                    state.apply(cell, frame);
                }
            }
        }
        let transposition = i32::from(scheduler.current_transposition());
        for (chan, state) in self.channels.iter_mut().enumerate() {
            state.synthesize(&self.module, &mut frame.channel(chan, transposition));
        }
    }
}
