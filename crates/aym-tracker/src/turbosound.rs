//! TurboSound: two modules on two chips sharing one timeline.
//!
//! The first renderer owns the timeline. A tempo override on the second
//! module's current row is forced onto the first before each step, and after
//! each step the second scheduler copies the first one's row counters.

use std::sync::Arc;

use aym_common::{merge_strings, BasicMetadata, MetadataFields};
use aym_core::RegisterChunk;

use crate::config::RenderParams;
use crate::info::TrackMetadata;
use crate::model::Module;
use crate::renderer::Renderer;
use crate::scheduler::{FrameStatus, TrackState};

/// Chunks for both chips of one frame.
#[derive(Debug, Clone, Copy)]
pub struct DualFrame {
    /// First chip.
    pub first: RegisterChunk,
    /// Second chip.
    pub second: RegisterChunk,
    /// Outcome reported by the first renderer.
    pub status: FrameStatus,
    /// State the frame was synthesized from.
    pub state: TrackState,
}

/// Lock-stepped pair of renderers.
pub struct TurboSoundRenderer {
    first: Renderer,
    second: Renderer,
}

impl TurboSoundRenderer {
    /// Pair two modules; both use `params`.
    pub fn new(first: Arc<Module>, second: Arc<Module>, params: RenderParams) -> Self {
        Self {
            first: Renderer::new(first, params),
            second: Renderer::new(second, params),
        }
    }

    /// Authoritative renderer.
    pub fn first(&self) -> &Renderer {
        &self.first
    }

    /// Follower renderer.
    pub fn second(&self) -> &Renderer {
        &self.second
    }

    /// Render one frame on both chips.
    pub fn render(&mut self) -> DualFrame {
        let follower = self.second.scheduler();
        if follower.state().is_row_start() {
            if let Some(tempo) = follower.current_line().and_then(|line| line.tempo) {
                self.first.scheduler_mut().set_tempo(u32::from(tempo));
            }
        }
        let first = self.first.render();
        let second = self.second.render();
        let authority = *self.first.state();
        self.second.scheduler_mut().synchronize(&authority);
        DualFrame {
            first: first.chunk,
            second: second.chunk,
            status: first.status,
            state: first.state,
        }
    }

    /// Rewind both renderers.
    pub fn reset(&mut self) {
        self.first.reset();
        self.second.reset();
    }

    /// Move both renderers to frame `frame` of the first module.
    pub fn set_position(&mut self, frame: usize) {
        let target = frame.min(self.first.module().stats().frames.saturating_sub(1));
        if target < self.first.state().frame {
            self.reset();
        }
        while self.first.state().frame < target {
            if self.render().status != FrameStatus::Continued {
                break;
            }
        }
    }

    /// Metadata of both modules merged into one record.
    ///
    /// Timing comes from the first module.
    pub fn metadata(&self) -> BasicMetadata {
        let rate = self.first.params().frame_rate;
        let first = TrackMetadata::new(self.first.module(), rate);
        let second = TrackMetadata::new(self.second.module(), rate);
        BasicMetadata {
            title: merge_strings(first.title(), second.title()),
            author: merge_strings(first.author(), second.author()),
            program: merge_strings(first.program(), second.program()),
            comments: merge_strings(first.comments(), second.comments()),
            format: merge_strings(first.format(), second.format()),
            ..BasicMetadata::from_fields(&first)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::TrackerFormat;
    use crate::model::{ModuleBuilder, Position};

    fn module(title: &str, tempo_line: Option<(usize, u8)>) -> Arc<Module> {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder
            .set_initial_tempo(4)
            .set_positions(vec![Position::new(0)], 0);
        builder.info_mut().title = title.to_owned();
        let pattern = builder.start_pattern(0);
        pattern.size = 4;
        if let Some((line, tempo)) = tempo_line {
            pattern.line_mut(line, 3).tempo = Some(tempo);
        }
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn follower_tempo_drives_both() {
        let mut ts = TurboSoundRenderer::new(
            module("a", None),
            module("b", Some((1, 2))),
            RenderParams::default(),
        );
        for _ in 0..4 {
            ts.render();
        }
        // row 1 starts at frame 4, the follower's override applies from here
        assert_eq!(ts.first().state().line, 1);
        ts.render();
        ts.render();
        assert_eq!(ts.first().state().line, 2);
        assert_eq!(ts.second().state().line, 2);
        assert_eq!(ts.second().state().quirk, ts.first().state().quirk);
    }

    #[test]
    fn metadata_joins_titles() {
        let ts = TurboSoundRenderer::new(module("a", None), module("b", None), RenderParams::default());
        let meta = ts.metadata();
        assert_eq!(meta.title, "a/b");
        assert_eq!(meta.format, "PT2");
        assert_eq!(meta.frame_count, Some(16));
    }
}
