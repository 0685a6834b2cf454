//! Frame renderer.
//!
//! Couples a [`Scheduler`] with the module's synthesizer. Each call to
//! [`Renderer::render`] synthesizes the current frame and then steps the
//! scheduler, so the returned chunk always belongs to the state reported
//! alongside it.
//!
//! A wrap back to the first position (end of a non-looping track, or
//! [`LoopMode::LoopToBegin`]) also clears the synthesizer, so the next pass
//! sounds like a fresh start.

use std::sync::Arc;

use aym_core::RegisterChunk;
use log::debug;

use crate::config::RenderParams;
use crate::model::Module;
use crate::scheduler::{FrameStatus, LoopMode, Scheduler, TrackState};
use crate::synth::{self, FrameBuilder, FrameSynthesizer};

/// One rendered frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderedFrame {
    /// Register writes for the frame.
    pub chunk: RegisterChunk,
    /// Scheduler outcome after the frame.
    pub status: FrameStatus,
    /// Scheduler state the frame was synthesized from.
    pub state: TrackState,
}

/// Pull-based frame source for one module.
pub struct Renderer {
    module: Arc<Module>,
    scheduler: Scheduler,
    synth: Box<dyn FrameSynthesizer>,
    params: RenderParams,
}

impl Renderer {
    /// Renderer positioned at the first frame.
    pub fn new(module: Arc<Module>, params: RenderParams) -> Self {
        Self {
            scheduler: Scheduler::new(Arc::clone(&module)),
            synth: synth::create(&module),
            module,
            params,
        }
    }

    /// Module being rendered.
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Render parameters.
    pub fn params(&self) -> &RenderParams {
        &self.params
    }

    /// Scheduler state of the next frame.
    pub fn state(&self) -> &TrackState {
        self.scheduler.state()
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub(crate) fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    /// Synthesize the current frame and advance.
    pub fn render(&mut self) -> RenderedFrame {
        let state = *self.scheduler.state();
        let timestamp = state.absolute_frame * self.params.frame_duration_us();
        let mut frame = FrameBuilder::new(self.module.frequency_table(), timestamp);
        self.synth.synthesize(&self.scheduler, &mut frame);
        let status = self
            .scheduler
            .next_frame(self.params.frame_ticks(), self.params.loop_mode);
        match (status, self.params.loop_mode) {
            (FrameStatus::Finished, _) | (FrameStatus::Looped, LoopMode::LoopToBegin) => {
                debug!("rewound to start after frame {}", state.absolute_frame);
                self.synth.reset();
            }
            _ => {}
        }
        RenderedFrame {
            chunk: frame.finish(),
            status,
            state,
        }
    }

    /// Rewind to the first frame and clear all channel state.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.synth.reset();
    }

    /// Move to module frame `frame`, clamped to the last frame.
    ///
    /// Seeking backwards replays from the start; frames in between are
    /// synthesized and discarded so effect state matches linear playback.
    pub fn set_position(&mut self, frame: usize) {
        let target = frame.min(self.module.stats().frames.saturating_sub(1));
        if target < self.scheduler.state().frame {
            self.reset();
        }
        let mut skipped = 0usize;
        while self.scheduler.state().frame < target {
            skipped += 1;
            if self.render().status != FrameStatus::Continued {
                break;
            }
        }
        debug!("seek to frame {target}: {skipped} frame(s) skipped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::TrackerFormat;
    use crate::model::{Cell, ModuleBuilder, Position, Sample, SampleLine};

    fn module() -> Arc<Module> {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder
            .set_initial_tempo(2)
            .set_positions(vec![Position::new(0), Position::new(0)], 0);
        let pattern = builder.start_pattern(0);
        pattern.size = 3;
        pattern.line_mut(0, 3).cells[0] = Cell {
            enabled: Some(true),
            note: Some(20),
            ..Cell::default()
        };
        let lines = (0..5)
            .map(|level| SampleLine {
                level,
                tone_mask: false,
                ..SampleLine::SILENT
            })
            .collect();
        builder.set_sample(1, Sample::new(2, lines));
        Arc::new(builder.build().unwrap())
    }

    /// Position 0 starts a note at full volume, position 1 only turns it down.
    fn fading_module() -> Arc<Module> {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder
            .set_initial_tempo(1)
            .set_positions(vec![Position::new(0), Position::new(1)], 0);
        let pattern = builder.start_pattern(0);
        pattern.size = 2;
        pattern.line_mut(0, 3).cells[0] = Cell {
            enabled: Some(true),
            note: Some(24),
            sample: Some(1),
            ..Cell::default()
        };
        let pattern = builder.start_pattern(1);
        pattern.size = 2;
        pattern.line_mut(0, 3).cells[0] = Cell {
            volume: Some(3),
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

    fn params(loop_mode: LoopMode) -> RenderParams {
        RenderParams {
            loop_mode,
            ..RenderParams::default()
        }
    }

    fn collect(renderer: &mut Renderer, frames: usize) -> Vec<RegisterChunk> {
        (0..frames).map(|_| renderer.render().chunk).collect()
    }

    #[test]
    fn timestamps_follow_frame_rate() {
        let mut renderer = Renderer::new(module(), RenderParams::default());
        let chunks = collect(&mut renderer, 3);
        let stamps: Vec<u64> = chunks.iter().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![0, 20_000, 40_000]);
    }

    #[test]
    fn reset_reproduces_output() {
        let mut renderer = Renderer::new(module(), RenderParams::default());
        let first = collect(&mut renderer, 9);
        renderer.reset();
        assert_eq!(collect(&mut renderer, 9), first);
    }

    #[test]
    fn seek_matches_linear_playback() {
        let module = module();
        let mut linear = Renderer::new(module.clone(), RenderParams::default());
        let expected = collect(&mut linear, 8);

        let mut seeking = Renderer::new(module, RenderParams::default());
        collect(&mut seeking, 7);
        seeking.set_position(3);
        assert_eq!(seeking.state().frame, 3);
        let chunk = seeking.render().chunk;
        assert_eq!(chunk.registers, expected[3].registers);
    }

    #[test]
    fn replay_after_end_starts_from_clean_state() {
        let module = fading_module();
        let mut fresh = Renderer::new(module.clone(), params(LoopMode::None));
        let expected = collect(&mut fresh, 2);
        assert_eq!(expected[0].level(0), Some(15));

        let mut renderer = Renderer::new(module, params(LoopMode::None));
        let mut status = FrameStatus::Continued;
        for _ in 0..4 {
            status = renderer.render().status;
        }
        assert_eq!(status, FrameStatus::Finished);
        let replay = collect(&mut renderer, 2);
        for (got, want) in replay.iter().zip(&expected) {
            assert_eq!(got.registers, want.registers);
        }
    }

    #[test]
    fn loop_to_begin_matches_fresh_render() {
        let module = fading_module();
        let mut fresh = Renderer::new(module.clone(), params(LoopMode::None));
        let expected = collect(&mut fresh, 4);

        let mut renderer = Renderer::new(module, params(LoopMode::LoopToBegin));
        let statuses: Vec<FrameStatus> = (0..4).map(|_| renderer.render().status).collect();
        assert_eq!(statuses[3], FrameStatus::Looped);
        let second = collect(&mut renderer, 4);
        for (got, want) in second.iter().zip(&expected) {
            assert_eq!(got.registers, want.registers);
        }
        assert_eq!(second[0].timestamp, 4 * 20_000);
    }

    #[test]
    fn seek_past_end_is_clamped() {
        let mut renderer = Renderer::new(module(), params(LoopMode::None));
        renderer.set_position(1000);
        assert_eq!(renderer.state().frame, 11);
        assert_eq!(renderer.render().status, FrameStatus::Finished);
    }
}
