//! Sound Tracker Pro channel synthesis.
//!
//! Channel volume attenuates the sample level instead of scaling it. An
//! armed envelope replaces the ornament, and only sample steps carrying the
//! envelope flag route the channel to the envelope generator. A sample
//! without a loop switches the channel off after its last step.

use std::sync::Arc;

use aym_core::CHIP_CHANNELS;

use super::{ChannelBuilder, FrameBuilder, FrameSynthesizer};
use crate::model::{Cell, Command, Module};
use crate::scheduler::Scheduler;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ChannelState {
    enabled: bool,
    envelope: bool,
    volume: u8,
    note: i32,
    sample: usize,
    sample_pos: usize,
    ornament: usize,
    ornament_pos: usize,
    sliding: i32,
    glissade: i32,
}

impl ChannelState {
    fn apply(&mut self, cell: &Cell, frame: &mut FrameBuilder<'_>) {
        if let Some(enabled) = cell.enabled {
            self.enabled = enabled;
            self.sample_pos = 0;
            self.ornament_pos = 0;
        }
        if let Some(note) = cell.note {
            self.note = i32::from(note);
            self.sample_pos = 0;
            self.ornament_pos = 0;
            self.sliding = 0;
        }
        if let Some(sample) = cell.sample {
            self.sample = sample;
            self.sample_pos = 0;
        }
        if let Some(ornament) = cell.ornament {
            self.ornament = ornament;
            self.ornament_pos = 0;
        }
        if let Some(volume) = cell.volume {
            self.volume = volume;
        }
        for command in &cell.commands {
            match *command {
                Command::Envelope { shape, period } => {
                    if shape != 0 {
                        frame.set_envelope(shape, period);
                    }
                    self.envelope = true;
                }
                Command::NoEnvelope => self.envelope = false,
                Command::Glissando(delta) => self.glissade = i32::from(delta),
                _ => {}
            }
        }
    }

    fn synthesize(&mut self, module: &Module, channel: &mut ChannelBuilder<'_, '_>) {
        if !self.enabled {
            channel.mute();
            return;
        }
        let sample = module.sample(self.sample);
        let line = sample.line(self.sample_pos);
        let ornament = module.ornament(self.ornament);

        self.sliding += self.glissade;
        channel.set_level(i32::from(line.level) - i32::from(self.volume));
        if line.envelope_mask && self.envelope {
            channel.enable_envelope();
        }
        let shift = if self.envelope {
            0
        } else {
            i32::from(ornament.offset(self.ornament_pos))
        };
        channel.set_tone(self.note + shift, self.sliding + i32::from(line.vibrato));
        if line.tone_mask {
            channel.disable_tone();
        }
        if line.noise_mask {
            channel.disable_noise();
        } else {
            channel.set_noise(i32::from(line.noise));
        }

        self.ornament_pos += 1;
        if self.ornament_pos >= ornament.size() {
            self.ornament_pos = ornament.loop_start;
        }
        self.sample_pos += 1;
        if self.sample_pos >= sample.size() {
            if sample.loop_start < self.sample_pos {
                self.sample_pos = sample.loop_start;
            } else {
                self.enabled = false;
            }
        }
    }
}

/// Synthesizer for Sound Tracker Pro modules.
#[derive(Debug)]
pub struct SoundTrackerProSynth {
    module: Arc<Module>,
    channels: [ChannelState; CHIP_CHANNELS],
}

impl SoundTrackerProSynth {
    /// Synthesizer with all channels off.
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            module,
            channels: Default::default(),
        }
    }
}

impl FrameSynthesizer for SoundTrackerProSynth {
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
