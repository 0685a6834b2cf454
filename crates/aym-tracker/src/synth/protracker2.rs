//! ProTracker 2 channel synthesis.

use std::sync::Arc;

use aym_core::CHIP_CHANNELS;

use super::{ChannelBuilder, FrameBuilder, FrameSynthesizer};
use crate::formats::protracker2::{DEFAULT_ORNAMENT, DEFAULT_SAMPLE};
use crate::model::{Cell, Command, Module};
use crate::scheduler::Scheduler;

/// PT2 volume table: channel volume scaled by sample level.
fn scaled_level(volume: u8, level: u8) -> i32 {
    let volume = i32::from(volume);
    (volume * 17 + i32::from(volume > 7)) * i32::from(level) / 256
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ChannelState {
    enabled: bool,
    envelope: bool,
    note: i32,
    sample: usize,
    sample_pos: usize,
    ornament: usize,
    ornament_pos: usize,
    volume: u8,
    noise_base: i32,
    sliding: i32,
    glissade: i32,
    target: Option<i32>,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: false,
            envelope: false,
            note: 0,
            sample: DEFAULT_SAMPLE,
            sample_pos: 0,
            ornament: DEFAULT_ORNAMENT,
            ornament_pos: 0,
            volume: 15,
            noise_base: 0,
            sliding: 0,
            glissade: 0,
            target: None,
        }
    }
}

impl ChannelState {
    fn stop_sliding(&mut self) {
        self.sliding = 0;
        self.glissade = 0;
        self.target = None;
    }

    fn apply(&mut self, cell: &Cell, frame: &mut FrameBuilder<'_>) {
        if let Some(enabled) = cell.enabled {
            if !enabled {
                self.stop_sliding();
            }
            self.enabled = enabled;
            self.sample_pos = 0;
            self.ornament_pos = 0;
        }
        if let Some(note) = cell.note {
            self.note = i32::from(note);
            self.stop_sliding();
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
                    frame.set_envelope(shape, period);
                    self.envelope = true;
                }
                Command::NoEnvelope => self.envelope = false,
                Command::NoiseBase(base) => self.noise_base = i32::from(base),
                Command::GlissandoToNote { delta, target } => {
                    self.sliding = 0;
                    self.glissade = i32::from(delta);
                    self.target = Some(i32::from(target));
                }
                Command::Glissando(delta) => {
                    self.glissade = i32::from(delta);
                    self.target = None;
                }
                Command::NoGlissando => self.glissade = 0,
            }
        }
    }

    fn synthesize(&mut self, module: &Module, channel: &mut ChannelBuilder<'_, '_>) {
        if !self.enabled {
            channel.mute();
            return;
        }
        let sample = module.sample(self.sample);
        let ornament = module.ornament(self.ornament);
        let line = sample.line(self.sample_pos);

        let halftones = self.note + i32::from(ornament.offset(self.ornament_pos));
        channel.set_tone(halftones, self.sliding + i32::from(line.vibrato));
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
            channel.set_noise(i32::from(line.noise) + self.noise_base);
        }

        if let Some(target) = self.target {
            let range = module.frequency_table().sliding_difference(self.note, target)
                - (self.sliding + self.glissade);
            if (self.glissade > 0 && range <= 0) || (self.glissade < 0 && range >= 0) {
                self.note = target;
                self.stop_sliding();
            }
        }
        self.sliding += self.glissade;

        self.sample_pos += 1;
        if self.sample_pos >= sample.size() {
            self.sample_pos = sample.loop_start;
        }
        self.ornament_pos += 1;
        if self.ornament_pos >= ornament.size() {
            self.ornament_pos = ornament.loop_start;
        }
    }
}

/// Synthesizer for ProTracker 2 modules.
#[derive(Debug)]
pub struct ProTracker2Synth {
    module: Arc<Module>,
    channels: [ChannelState; CHIP_CHANNELS],
}

impl ProTracker2Synth {
    /// Synthesizer with all channels off.
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            module,
            channels: Default::default(),
        }
    }
}

impl FrameSynthesizer for ProTracker2Synth {
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
