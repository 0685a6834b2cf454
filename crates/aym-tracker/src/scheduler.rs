//! Playback scheduler.
//!
//! Advances position/line/quirk counters one frame at a time. A row lasts
//! `tempo` frames (quirks); rows may override the tempo. When the play order
//! is exhausted the [`LoopMode`] decides what happens next.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::info::ModuleStatistics;
use crate::model::{Line, Module};

/// What to do after the last position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    /// Continue from the module's loop position.
    #[default]
    Normal,
    /// Stop; the scheduler rewinds and reports [`FrameStatus::Finished`].
    None,
    /// Restart from the first position.
    LoopToBegin,
}

/// Outcome of one frame step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Still inside the play order.
    Continued,
    /// Wrapped around according to the loop mode.
    Looped,
    /// Reached the end with [`LoopMode::None`].
    Finished,
}

/// Scheduler counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackState {
    /// Index into the play order.
    pub position: usize,
    /// Pattern played at `position`.
    pub pattern: usize,
    /// Row inside the pattern.
    pub line: usize,
    /// Frame inside the row.
    pub quirk: u32,
    /// Frame inside the module; restored to the loop frame on wrap.
    pub frame: usize,
    /// Frames per row.
    pub tempo: u32,
    /// Frames since playback start, never rewound by looping.
    pub absolute_frame: u64,
    /// Sum of ticks passed to every step.
    pub absolute_tick: u64,
}

impl TrackState {
    /// State at the start of `module`.
    pub fn start(module: &Module) -> Self {
        let mut state = Self::default();
        state.rewind(module);
        state
    }

    fn rewind(&mut self, module: &Module) {
        self.position = 0;
        self.pattern = module.position(0).map_or(0, |pos| pos.pattern);
        self.line = 0;
        self.quirk = 0;
        self.frame = 0;
        self.tempo = u32::from(module.initial_tempo());
        self.adopt_line_tempo(module);
    }

    fn adopt_line_tempo(&mut self, module: &Module) {
        if let Some(tempo) = module.tempo_override(self.position, self.line) {
            self.tempo = u32::from(tempo);
        }
    }

    /// Whether the current frame starts a row.
    pub fn is_row_start(&self) -> bool {
        self.quirk == 0
    }

    /// Advance one frame.
    pub fn advance(&mut self, module: &Module, ticks: u64, mode: LoopMode) -> FrameStatus {
        self.frame += 1;
        self.absolute_frame += 1;
        self.absolute_tick += ticks;
        self.quirk += 1;
        if self.quirk < self.tempo {
            return FrameStatus::Continued;
        }
        self.quirk = 0;

        self.line += 1;
        let size = module.pattern(self.pattern).map_or(0, |p| p.size);
        if self.line < size {
            self.adopt_line_tempo(module);
            return FrameStatus::Continued;
        }
        self.line = 0;

        self.position += 1;
        if let Some(pos) = module.position(self.position) {
            self.pattern = pos.pattern;
            self.adopt_line_tempo(module);
            return FrameStatus::Continued;
        }

        match mode {
            LoopMode::Normal => {
                let stats = module.stats();
                self.position = module.loop_position();
                self.pattern = module.position(self.position).map_or(0, |pos| pos.pattern);
                self.frame = stats.loop_frame;
                self.tempo = u32::from(stats.loop_tempo);
                FrameStatus::Looped
            }
            LoopMode::None => {
                self.rewind(module);
                self.absolute_frame = 0;
                self.absolute_tick = 0;
                FrameStatus::Finished
            }
            LoopMode::LoopToBegin => {
                self.rewind(module);
                FrameStatus::Looped
            }
        }
    }
}

/// Scheduler bound to a module.
#[derive(Debug, Clone)]
pub struct Scheduler {
    module: Arc<Module>,
    state: TrackState,
}

impl Scheduler {
    /// Scheduler positioned at the start of `module`.
    pub fn new(module: Arc<Module>) -> Self {
        let state = TrackState::start(&module);
        Self { module, state }
    }

    /// Module being played.
    pub fn module(&self) -> &Arc<Module> {
        &self.module
    }

    /// Back to the first frame, clearing the absolute counters.
    pub fn reset(&mut self) {
        self.state = TrackState::start(&self.module);
    }

    /// Current counters.
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// Stored line of the current row, if it carries events.
    pub fn current_line(&self) -> Option<&Line> {
        self.module.line_at(self.state.position, self.state.line)
    }

    /// Transposition of the current position.
    pub fn current_transposition(&self) -> i8 {
        self.module
            .position(self.state.position)
            .map_or(0, |pos| pos.transposition)
    }

    /// Advance one frame worth `ticks` device ticks.
    pub fn next_frame(&mut self, ticks: u64, mode: LoopMode) -> FrameStatus {
        self.state.advance(&self.module, ticks, mode)
    }

    /// Override the tempo of the current row onwards.
    pub fn set_tempo(&mut self, tempo: u32) {
        self.state.tempo = tempo;
    }

    /// Copy row-level counters from another scheduler's state.
    ///
    /// Absolute counters are left alone.
    pub fn synchronize(&mut self, authority: &TrackState) {
        self.state.position = authority.position;
        self.state.pattern = self
            .module
            .position(authority.position)
            .map_or(authority.pattern, |pos| pos.pattern);
        self.state.line = authority.line;
        self.state.quirk = authority.quirk;
        self.state.frame = authority.frame;
        self.state.tempo = authority.tempo;
    }
}

/// Walk the whole play order once and derive timing figures.
///
/// The loop frame is the frame at which the loop position's first row
/// starts on the first pass.
pub(crate) fn collect_statistics(module: &Module) -> ModuleStatistics {
    let mut state = TrackState::start(module);
    let mut loop_point = None;
    let mut frames = 0;
    loop {
        if loop_point.is_none()
            && state.position == module.loop_position()
            && state.line == 0
            && state.quirk == 0
        {
            loop_point = Some((state.frame, state.tempo));
        }
        frames += 1;
        if state.advance(module, 0, LoopMode::None) == FrameStatus::Finished {
            break;
        }
    }
    let (loop_frame, loop_tempo) = loop_point.unwrap_or((0, u32::from(module.initial_tempo())));
    let patterns: BTreeSet<usize> = module.positions().iter().map(|pos| pos.pattern).collect();
    ModuleStatistics {
        positions: module.positions().len(),
        loop_position: module.loop_position(),
        patterns: patterns.len(),
        channels: module.channels(),
        frames,
        loop_frame,
        loop_tempo: loop_tempo.min(u32::from(u8::MAX)) as u8,
        initial_tempo: module.initial_tempo(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::TrackerFormat;
    use crate::model::{ModuleBuilder, Position};

    /// Two 2-row patterns, order [0, 1, 0], loop to position 1, tempo 3.
    fn module() -> Arc<Module> {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder
            .set_initial_tempo(3)
            .set_positions(vec![Position::new(0), Position::new(1), Position::new(0)], 1);
        builder.start_pattern(0).size = 2;
        let pattern = builder.start_pattern(1);
        pattern.size = 2;
        pattern.line_mut(1, 3).tempo = Some(2);
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn statistics_follow_tempo_overrides() {
        let module = module();
        let stats = module.stats();
        // 3+3 | 3+2 | 2+2: the override persists into the next position
        assert_eq!(stats.frames, 15);
        assert_eq!(stats.loop_frame, 6);
        assert_eq!(stats.loop_tempo, 3);
        assert_eq!(stats.patterns, 2);
    }

    #[test]
    fn rows_span_tempo_frames() {
        let mut scheduler = Scheduler::new(module());
        assert!(scheduler.state().is_row_start());
        assert_eq!(scheduler.next_frame(1, LoopMode::Normal), FrameStatus::Continued);
        assert_eq!(scheduler.state().quirk, 1);
        scheduler.next_frame(1, LoopMode::Normal);
        scheduler.next_frame(1, LoopMode::Normal);
        assert_eq!(scheduler.state().line, 1);
        assert_eq!(scheduler.state().quirk, 0);
        assert_eq!(scheduler.state().absolute_tick, 3);
    }

    #[test]
    fn none_mode_finishes_and_rewinds() {
        let module = module();
        let mut scheduler = Scheduler::new(module.clone());
        let mut status = FrameStatus::Continued;
        for _ in 0..module.stats().frames {
            status = scheduler.next_frame(1, LoopMode::None);
        }
        assert_eq!(status, FrameStatus::Finished);
        assert_eq!(*scheduler.state(), TrackState::start(&module));
    }

    #[test]
    fn loop_to_begin_keeps_absolute_counters() {
        let module = module();
        let mut scheduler = Scheduler::new(module.clone());
        for _ in 0..module.stats().frames - 1 {
            scheduler.next_frame(1, LoopMode::LoopToBegin);
        }
        assert_eq!(scheduler.next_frame(1, LoopMode::LoopToBegin), FrameStatus::Looped);
        assert_eq!(scheduler.state().position, 0);
        assert_eq!(scheduler.state().frame, 0);
        assert_eq!(scheduler.state().absolute_frame, 15);
    }

    #[test]
    fn synchronize_copies_row_counters() {
        let module = module();
        let mut leader = Scheduler::new(module.clone());
        for _ in 0..7 {
            leader.next_frame(1, LoopMode::Normal);
        }
        let mut follower = Scheduler::new(module);
        follower.synchronize(leader.state());
        assert_eq!(follower.state().position, 1);
        assert_eq!(follower.state().pattern, 1);
        assert_eq!(follower.state().quirk, 1);
        assert_eq!(follower.state().absolute_frame, 0);
    }
}
