//! Sound Tracker channel synthesis, used by editor files, compiled modules
//! and v3 modules alike.
//!
//! A note plays its 32-step sample once, then either stops or repeats the
//! loop region. The envelope shape register is shared by all channels and is
//! written only on the frame after an envelope command.

use std::sync::Arc;

use aym_core::CHIP_CHANNELS;

use super::{ChannelBuilder, FrameBuilder, FrameSynthesizer};
use crate::formats::soundtracker::SAMPLE_SIZE;
use crate::model::{Cell, Command, Module, Ornament, Sample};
use crate::scheduler::Scheduler;

const POSITION_MASK: usize = SAMPLE_SIZE - 1;

static STUB_SAMPLE: Sample = Sample::stub();
static STUB_ORNAMENT: Ornament = Ornament::stub();

/// Sample playback cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StateCursor {
    countdown: i32,
    position: usize,
}

impl Default for StateCursor {
    fn default() -> Self {
        Self {
            countdown: -1,
            position: 0,
        }
    }
}

impl StateCursor {
    fn is_valid(&self) -> bool {
        self.countdown >= 0
    }

    fn next(&mut self, sample: &Sample) {
        if !self.is_valid() {
            return;
        }
        self.countdown -= 1;
        self.position = (self.position + 1) & POSITION_MASK;
        if self.countdown == 0 {
            if sample.loop_start != 0 {
                self.position = sample.loop_start & POSITION_MASK;
                self.countdown = sample.loop_limit as i32 - sample.loop_start as i32 + 1;
            } else {
                self.countdown = -1;
            }
        }
    }
}

/// Per-channel envelope arming.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum EnvelopeState {
    #[default]
    Off,
    /// Armed on this row; shape still pending.
    Armed,
    /// Shape written, channel keeps using the envelope.
    Running,
}

/// Envelope registers shared by all channels.
#[derive(Debug, Clone, Copy, Default)]
struct SharedEnvelope {
    shape: u8,
    period: u16,
}

#[derive(Debug, Clone, Default)]
struct ChannelState {
    note: i32,
    cursor: StateCursor,
    sample: Option<usize>,
    ornament: Option<usize>,
    envelope: EnvelopeState,
}

impl ChannelState {
    fn sample<'m>(&self, module: &'m Module) -> &'m Sample {
        self.sample.map_or(&STUB_SAMPLE, |idx| module.sample(idx))
    }

    fn ornament<'m>(&self, module: &'m Module) -> &'m Ornament {
        self.ornament.map_or(&STUB_ORNAMENT, |idx| module.ornament(idx))
    }

    fn apply(&mut self, cell: &Cell, shared: &mut SharedEnvelope) {
        if let Some(enabled) = cell.enabled {
            self.cursor.countdown = if enabled { SAMPLE_SIZE as i32 } else { -1 };
        }
        if let Some(note) = cell.note {
            self.note = i32::from(note);
            self.cursor.position = 0;
        }
        if let Some(sample) = cell.sample {
            self.sample = Some(sample);
        }
        if let Some(ornament) = cell.ornament {
            self.ornament = Some(ornament);
        }
        for command in &cell.commands {
            match *command {
                Command::Envelope { shape, period } => {
                    shared.shape = shape;
                    shared.period = period;
                    self.envelope = EnvelopeState::Armed;
                }
                Command::NoEnvelope => self.envelope = EnvelopeState::Off,
                _ => {}
            }
        }
    }

    fn synthesize(&self, module: &Module, channel: &mut ChannelBuilder<'_, '_>) {
        let sample = self.sample(module);
        let mut next = self.cursor;
        next.next(sample);
        if !next.is_valid() {
            channel.mute();
            return;
        }
        let position = next.position.wrapping_sub(1) & POSITION_MASK;
        let line = sample.line(position);
        channel.set_level(i32::from(line.level));
        let halftones = self.note + i32::from(self.ornament(module).offset(position));
        channel.set_tone(halftones, i32::from(line.vibrato));
        if line.tone_mask {
            channel.disable_tone();
        }
        if line.noise_mask {
            channel.disable_noise();
        } else {
            channel.set_noise(i32::from(line.noise));
        }
        if self.envelope != EnvelopeState::Off {
            channel.enable_envelope();
        }
    }

    fn iterate(&mut self, module: &Module, shared: &mut SharedEnvelope) {
        let sample = self.sample(module);
        self.cursor.next(sample);
        if !self.cursor.is_valid() {
            return;
        }
        match self.envelope {
            EnvelopeState::Off => {}
            EnvelopeState::Armed => {
                self.envelope = EnvelopeState::Running;
                shared.shape = 0;
            }
            EnvelopeState::Running => shared.shape = 0,
        }
    }
}

/// Synthesizer for Sound Tracker modules (compiled and v3).
#[derive(Debug)]
pub struct SoundTrackerSynth {
    module: Arc<Module>,
    channels: [ChannelState; CHIP_CHANNELS],
    envelope: SharedEnvelope,
}

impl SoundTrackerSynth {
    /// Synthesizer with all channels off.
    pub fn new(module: Arc<Module>) -> Self {
        Self {
            module,
            channels: Default::default(),
            envelope: SharedEnvelope::default(),
        }
    }
}

impl FrameSynthesizer for SoundTrackerSynth {
    fn reset(&mut self) {
        self.channels = Default::default();
        self.envelope = SharedEnvelope::default();
    }

    fn synthesize(&mut self, scheduler: &Scheduler, frame: &mut FrameBuilder<'_>) {
        if scheduler.state().is_row_start() {
            if let Some(line) = scheduler.current_line() {
                for (state, cell) in self.channels.iter_mut().zip(&line.cells) {
                    state.apply(cell, &mut self.envelope);
                }
            }
        }
        let transposition = i32::from(scheduler.current_transposition());
        for (chan, state) in self.channels.iter().enumerate() {
            state.synthesize(&self.module, &mut frame.channel(chan, transposition));
        }
        if self.envelope.shape != 0 {
            frame.set_envelope(self.envelope.shape, self.envelope.period);
        }
        for state in &mut self.channels {
            state.iterate(&self.module, &mut self.envelope);
        }
    }
}
