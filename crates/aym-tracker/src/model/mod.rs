//! Canonical track model shared by every format.
//!
//! A [`Module`] is built once by a decoder through [`ModuleBuilder`] and is
//! immutable afterwards. Playback code only reads it.

mod builder;
mod instrument;
mod pattern;

pub use builder::ModuleBuilder;
pub use instrument::{Ornament, Sample, SampleLine};
pub use pattern::{Cell, Command, Line, Pattern};

use crate::formats::TrackerFormat;
use crate::frequency::FrequencyTable;
use crate::info::{ModuleInfo, ModuleStatistics};

static STUB_SAMPLE: Sample = Sample::stub();
static STUB_ORNAMENT: Ornament = Ornament::stub();

/// One entry of the play order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Position {
    /// Pattern index.
    pub pattern: usize,
    /// Halftones added to every note while this position plays.
    pub transposition: i8,
}

impl Position {
    /// Position without transposition.
    pub fn new(pattern: usize) -> Self {
        Self {
            pattern,
            transposition: 0,
        }
    }

    /// Transposed position.
    pub fn transposed(pattern: usize, transposition: i8) -> Self {
        Self {
            pattern,
            transposition,
        }
    }
}

/// Decoded module.
#[derive(Debug, Clone)]
pub struct Module {
    pub(crate) format: TrackerFormat,
    pub(crate) channels: usize,
    pub(crate) initial_tempo: u8,
    pub(crate) positions: Vec<Position>,
    pub(crate) loop_position: usize,
    pub(crate) patterns: Vec<Pattern>,
    pub(crate) samples: Vec<Option<Sample>>,
    pub(crate) ornaments: Vec<Option<Ornament>>,
    pub(crate) frequency_table: FrequencyTable,
    pub(crate) info: ModuleInfo,
    pub(crate) stats: ModuleStatistics,
}

impl Module {
    /// Source format.
    pub fn format(&self) -> TrackerFormat {
        self.format
    }

    /// Channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Tempo (frames per row) at the start.
    pub fn initial_tempo(&self) -> u8 {
        self.initial_tempo
    }

    /// Play order.
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Position entry at `index`.
    pub fn position(&self, index: usize) -> Option<&Position> {
        self.positions.get(index)
    }

    /// Position playback continues from after the end.
    pub fn loop_position(&self) -> usize {
        self.loop_position
    }

    /// Pattern at `index`.
    pub fn pattern(&self, index: usize) -> Option<&Pattern> {
        self.patterns.get(index)
    }

    /// Pattern referenced by position `position`.
    pub fn pattern_at(&self, position: usize) -> Option<&Pattern> {
        self.position(position)
            .and_then(|pos| self.pattern(pos.pattern))
    }

    /// Number of pattern slots.
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Whether sample `index` was registered by the decoder.
    pub fn has_sample(&self, index: usize) -> bool {
        matches!(self.samples.get(index), Some(Some(_)))
    }

    /// Whether ornament `index` was registered by the decoder.
    pub fn has_ornament(&self, index: usize) -> bool {
        matches!(self.ornaments.get(index), Some(Some(_)))
    }

    /// Sample `index`, falling back to sample 0.
    pub fn sample(&self, index: usize) -> &Sample {
        match self.samples.get(index) {
            Some(Some(sample)) => sample,
            _ => match self.samples.first() {
                Some(Some(sample)) => sample,
                _ => &STUB_SAMPLE,
            },
        }
    }

    /// Ornament `index`, falling back to ornament 0.
    pub fn ornament(&self, index: usize) -> &Ornament {
        match self.ornaments.get(index) {
            Some(Some(ornament)) => ornament,
            _ => match self.ornaments.first() {
                Some(Some(ornament)) => ornament,
                _ => &STUB_ORNAMENT,
            },
        }
    }

    /// Tone table used by the synthesizer.
    pub fn frequency_table(&self) -> &FrequencyTable {
        &self.frequency_table
    }

    /// Text metadata.
    pub fn info(&self) -> &ModuleInfo {
        &self.info
    }

    /// Timing statistics computed at decode time.
    pub fn stats(&self) -> &ModuleStatistics {
        &self.stats
    }

    /// Tempo override stored on `line` of the pattern at `position`.
    pub(crate) fn tempo_override(&self, position: usize, line: usize) -> Option<u8> {
        self.pattern_at(position)
            .and_then(|pattern| pattern.line(line))
            .and_then(|line| line.tempo)
    }

    /// Line `line` of the pattern at `position`, if it carries events.
    pub(crate) fn line_at(&self, position: usize, line: usize) -> Option<&Line> {
        self.pattern_at(position).and_then(|pattern| pattern.line(line))
    }
}
