//! Device adapter and player.
//!
//! [`TrackerPlayer`] renders frames on demand, feeds the chunks to a
//! [`ChipDevice`] and hands out the device's audio through the common player
//! traits.

use std::collections::VecDeque;
use std::sync::Arc;

use aym_common::util::period_to_frequency;
use aym_common::{ChiptunePlayer, ChiptunePlayerBase, MetadataFields, PlaybackState};
use aym_core::{ChipDevice, RegisterRecorder, CHIP_CHANNELS};
use log::{debug, warn};

use crate::config::RenderParams;
use crate::error::Result;
use crate::info::TrackMetadata;
use crate::model::Module;
use crate::renderer::Renderer;
use crate::scheduler::FrameStatus;

/// Consecutive frames without device output before a fill gives up.
///
/// Low sample rates legitimately yield empty frames now and then.
const MAX_IDLE_FRAMES: usize = 64;

/// Tracker module player driving one chip device.
pub struct TrackerPlayer<D: ChipDevice> {
    renderer: Renderer,
    device: D,
    metadata: TrackMetadata,
    state: PlaybackState,
    pending: VecDeque<f32>,
    device_clock: u64,
}

impl TrackerPlayer<RegisterRecorder> {
    /// Player writing into a [`RegisterRecorder`] at the configured sample rate.
    pub fn with_recorder(module: Arc<Module>, params: RenderParams) -> Result<Self> {
        let device = RegisterRecorder::new(params.sample_rate)?;
        Self::new(module, device, params)
    }
}

impl<D: ChipDevice> TrackerPlayer<D> {
    /// Player for `module` on `device`.
    pub fn new(module: Arc<Module>, device: D, params: RenderParams) -> Result<Self> {
        params.validate()?;
        let metadata = TrackMetadata::new(&module, params.frame_rate);
        Ok(Self {
            renderer: Renderer::new(module, params),
            device,
            metadata,
            state: PlaybackState::Stopped,
            pending: VecDeque::new(),
            device_clock: 0,
        })
    }

    /// Underlying device.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Underlying device, mutable.
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Frame renderer.
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Tone frequency of each channel in Hz, from the device registers.
    pub fn channel_frequencies(&self) -> [Option<f32>; CHIP_CHANNELS] {
        let registers = self.device.state().registers;
        let clock = self.renderer.params().clock_rate;
        let mut out = [None; CHIP_CHANNELS];
        for (chan, freq) in out.iter_mut().enumerate() {
            *freq = period_to_frequency(clock, registers.tone(chan));
        }
        out
    }

    fn rewind_device(&mut self) {
        self.device.reset();
        self.device_clock = 0;
        self.pending.clear();
    }

    /// Render one frame into the device and queue its audio.
    ///
    /// Returns the number of samples the device produced.
    fn render_frame(&mut self) -> usize {
        let mut frame = self.renderer.render();
        frame.chunk.timestamp = self.device_clock;
        self.device.render_data(&frame.chunk);
        self.device_clock += self.renderer.params().frame_duration_us();
        let samples = self.device.render_till(self.device_clock);
        let produced = samples.len();
        self.pending.extend(samples);
        if frame.status == FrameStatus::Finished {
            debug!("playback finished after {} frame(s)", frame.state.absolute_frame + 1);
            self.state = PlaybackState::Stopped;
            // the last frame's audio stays queued
            self.device.reset();
            self.device_clock = 0;
        }
        produced
    }
}

impl<D: ChipDevice> ChiptunePlayerBase for TrackerPlayer<D> {
    fn play(&mut self) {
        if self.state == PlaybackState::Stopped {
            self.pending.clear();
        }
        self.state = PlaybackState::Playing;
    }

    fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.renderer.reset();
        self.rewind_device();
    }

    fn state(&self) -> PlaybackState {
        self.state
    }

    fn generate_samples_into(&mut self, buffer: &mut [f32]) {
        if self.state != PlaybackState::Playing {
            buffer.fill(0.0);
            return;
        }
        let mut filled = 0;
        let mut idle_frames = 0;
        while filled < buffer.len() {
            if self.pending.is_empty() {
                if self.state != PlaybackState::Playing {
                    break;
                }
                if self.render_frame() == 0 {
                    idle_frames += 1;
                    if idle_frames >= MAX_IDLE_FRAMES {
                        warn!("device produced no audio for {idle_frames} frame(s), leaving buffer short");
                        break;
                    }
                } else {
                    idle_frames = 0;
                }
                continue;
            }
            let count = self.pending.len().min(buffer.len() - filled);
            for (dst, src) in buffer[filled..filled + count]
                .iter_mut()
                .zip(self.pending.drain(..count))
            {
                *dst = src;
            }
            filled += count;
        }
        buffer[filled..].fill(0.0);
    }

    fn sample_rate(&self) -> u32 {
        self.device.sample_rate()
    }

    fn playback_position(&self) -> f32 {
        let frames = self.renderer.module().stats().frames;
        if frames == 0 {
            return 0.0;
        }
        self.renderer.state().frame as f32 / frames as f32
    }

    fn seek(&mut self, position: f32) -> bool {
        let frames = self.renderer.module().stats().frames;
        let target = (position.clamp(0.0, 1.0) * frames as f32) as usize;
        if target < self.renderer.state().frame {
            self.rewind_device();
        } else {
            self.pending.clear();
        }
        self.renderer.set_position(target);
        true
    }

    fn duration_seconds(&self) -> f32 {
        self.metadata.duration_seconds().unwrap_or(0.0)
    }
}

impl<D: ChipDevice> ChiptunePlayer for TrackerPlayer<D> {
    type Metadata = TrackMetadata;

    fn metadata(&self) -> &Self::Metadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::TrackerFormat;
    use crate::model::{Cell, ModuleBuilder, Position, Sample, SampleLine};
    use crate::scheduler::LoopMode;
    use approx::assert_relative_eq;
    use aym_core::SharedDevice;

    fn module() -> Arc<Module> {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder
            .set_initial_tempo(5)
            .set_positions(vec![Position::new(0)], 0);
        let pattern = builder.start_pattern(0);
        pattern.size = 10;
        pattern.line_mut(0, 3).cells[0] = Cell {
            enabled: Some(true),
            note: Some(36),
            ..Cell::default()
        };
        let line = SampleLine {
            level: 15,
            tone_mask: false,
            ..SampleLine::SILENT
        };
        builder.set_sample(1, Sample::new(0, vec![line]));
        Arc::new(builder.build().unwrap())
    }

    fn player(loop_mode: LoopMode) -> TrackerPlayer<RegisterRecorder> {
        let params = RenderParams {
            loop_mode,
            ..RenderParams::default()
        };
        TrackerPlayer::with_recorder(module(), params).unwrap()
    }

    #[test]
    fn silent_until_played() {
        let mut player = player(LoopMode::Normal);
        assert_eq!(player.generate_samples(100), vec![0.0; 100]);
        assert_eq!(player.device().state().chunks, 0);
    }

    #[test]
    fn frames_are_rendered_on_demand() {
        let mut player = player(LoopMode::Normal);
        player.play();
        player.generate_samples(882 * 3);
        assert_eq!(player.device().state().chunks, 3);
        assert_relative_eq!(player.duration_seconds(), 1.0);
        assert!(player.channel_frequencies()[0].is_some());
        assert_eq!(player.channel_frequencies()[1], None);
    }

    #[test]
    fn playback_stops_at_end_without_loop() {
        let mut player = player(LoopMode::None);
        player.play();
        let samples = player.generate_samples(882 * 60);
        assert_eq!(samples.len(), 882 * 60);
        assert_eq!(player.state(), PlaybackState::Stopped);
        assert_eq!(player.renderer().state().frame, 0);
        assert_eq!(player.device().state(), aym_core::ChipState::default());
    }

    #[test]
    fn play_after_end_restarts_cleanly() {
        let mut player = player(LoopMode::None);
        player.play();
        player.generate_samples(882 * 50);
        assert_eq!(player.state(), PlaybackState::Stopped);

        player.play();
        player.generate_samples(882 * 2);
        let mut fresh = self::player(LoopMode::None);
        fresh.play();
        fresh.generate_samples(882 * 2);
        assert_eq!(player.device().state(), fresh.device().state());
        assert_eq!(player.renderer().state(), fresh.renderer().state());
    }

    /// Device that accepts chunks but never produces audio.
    struct MuteDevice {
        chunks: u64,
    }

    impl ChipDevice for MuteDevice {
        fn reset(&mut self) {
            self.chunks = 0;
        }

        fn render_data(&mut self, _chunk: &aym_core::RegisterChunk) {
            self.chunks += 1;
        }

        fn render_till(&mut self, _end: u64) -> Vec<f32> {
            Vec::new()
        }

        fn state(&self) -> aym_core::ChipState {
            aym_core::ChipState {
                chunks: self.chunks,
                ..aym_core::ChipState::default()
            }
        }

        fn sample_rate(&self) -> u32 {
            44_100
        }
    }

    #[test]
    fn silent_device_does_not_stall_fill() {
        let params = RenderParams::default();
        let mut player = TrackerPlayer::new(module(), MuteDevice { chunks: 0 }, params).unwrap();
        player.play();
        let samples = player.generate_samples(1024);
        assert_eq!(samples, vec![0.0; 1024]);
        assert_eq!(player.device().chunks, MAX_IDLE_FRAMES as u64);
        assert_eq!(player.state(), PlaybackState::Playing);
    }

    #[test]
    fn seek_backwards_resets_device() {
        let mut player = player(LoopMode::Normal);
        player.play();
        player.generate_samples(882 * 30);
        assert!(player.seek(0.2));
        assert_eq!(player.renderer().state().frame, 10);
        assert_eq!(player.device().state().chunks, 0);
        assert_relative_eq!(player.playback_position(), 0.2);
    }

    #[test]
    fn shared_device_exposes_registers_to_other_handles() {
        let device = SharedDevice::new(RegisterRecorder::with_history(44_100, 16).unwrap());
        let monitor = device.clone();
        let mut player = TrackerPlayer::new(module(), device, RenderParams::default()).unwrap();
        player.play();
        player.generate_samples(882);
        let registers = monitor.state().registers;
        assert_eq!(registers.tone(0), module().frequency_table().period(36));
        assert_eq!(monitor.with(|rec| rec.chunks().len()), 1);
    }
}
