use std::collections::BTreeSet;

use aym_core::CHIP_CHANNELS;
use log::debug;

use super::{Module, Ornament, Pattern, Position, Sample};
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::frequency::FrequencyTable;
use crate::info::ModuleInfo;
use crate::scheduler;

/// Incremental construction of a [`Module`].
///
/// Decoders push positions, patterns, samples and ornaments in any order;
/// [`ModuleBuilder::build`] checks the structural invariants and derives the
/// timing statistics. A failed build never yields a partial module.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    format: TrackerFormat,
    channels: usize,
    initial_tempo: u8,
    positions: Vec<Position>,
    loop_position: usize,
    patterns: Vec<Option<Pattern>>,
    samples: Vec<Option<Sample>>,
    ornaments: Vec<Option<Ornament>>,
    frequency_table: FrequencyTable,
    info: ModuleInfo,
}

impl ModuleBuilder {
    /// Empty builder for `format` with the format's frequency table.
    pub fn new(format: TrackerFormat) -> Self {
        let info = ModuleInfo {
            format: format.id().to_owned(),
            ..ModuleInfo::default()
        };
        Self {
            format,
            channels: CHIP_CHANNELS,
            initial_tempo: 6,
            positions: Vec::new(),
            loop_position: 0,
            patterns: Vec::new(),
            samples: Vec::new(),
            ornaments: Vec::new(),
            frequency_table: format.frequency_table(),
            info,
        }
    }

    /// Channel count of the module.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Tempo in frames per row.
    pub fn set_initial_tempo(&mut self, tempo: u8) -> &mut Self {
        self.initial_tempo = tempo;
        self
    }

    /// Play order and loop position.
    pub fn set_positions(&mut self, positions: Vec<Position>, loop_position: usize) -> &mut Self {
        self.positions = positions;
        self.loop_position = loop_position;
        self
    }

    /// Replace the tone table.
    pub fn set_frequency_table(&mut self, table: FrequencyTable) -> &mut Self {
        self.frequency_table = table;
        self
    }

    /// Text metadata.
    pub fn info_mut(&mut self) -> &mut ModuleInfo {
        &mut self.info
    }

    /// Start (or reopen) pattern `index`.
    pub fn start_pattern(&mut self, index: usize) -> &mut Pattern {
        if self.patterns.len() <= index {
            self.patterns.resize(index + 1, None);
        }
        self.patterns[index].get_or_insert_with(Pattern::default)
    }

    /// Whether pattern `index` was started.
    pub fn has_pattern(&self, index: usize) -> bool {
        matches!(self.patterns.get(index), Some(Some(_)))
    }

    /// Register sample `index`.
    pub fn set_sample(&mut self, index: usize, sample: Sample) -> &mut Self {
        if self.samples.len() <= index {
            self.samples.resize(index + 1, None);
        }
        self.samples[index] = Some(sample);
        self
    }

    /// Register ornament `index`.
    pub fn set_ornament(&mut self, index: usize, ornament: Ornament) -> &mut Self {
        if self.ornaments.len() <= index {
            self.ornaments.resize(index + 1, None);
        }
        self.ornaments[index] = Some(ornament);
        self
    }

    /// Whether sample `index` was registered.
    pub fn has_sample(&self, index: usize) -> bool {
        matches!(self.samples.get(index), Some(Some(_)))
    }

    /// Whether ornament `index` was registered.
    pub fn has_ornament(&self, index: usize) -> bool {
        matches!(self.ornaments.get(index), Some(Some(_)))
    }

    /// Patterns referenced by the play order.
    pub fn used_patterns(&self) -> BTreeSet<usize> {
        self.positions.iter().map(|pos| pos.pattern).collect()
    }

    /// Samples referenced by cells of the used patterns.
    pub fn used_samples(&self) -> BTreeSet<usize> {
        self.scan_cells(|cell| cell.sample)
    }

    /// Ornaments referenced by cells of the used patterns.
    pub fn used_ornaments(&self) -> BTreeSet<usize> {
        self.scan_cells(|cell| cell.ornament)
    }

    /// Whether any used pattern starts a note.
    pub fn has_notes(&self) -> bool {
        !self
            .scan_cells(|cell| (cell.note.is_some() || cell.enabled == Some(true)).then_some(0))
            .is_empty()
    }

    /// Whether any registered sample used by the patterns is audible.
    pub fn has_audible_samples(&self) -> bool {
        self.used_samples().into_iter().any(|idx| {
            self.samples
                .get(idx)
                .and_then(Option::as_ref)
                .is_some_and(Sample::is_audible)
        })
    }

    fn scan_cells(&self, field: impl Fn(&super::Cell) -> Option<usize>) -> BTreeSet<usize> {
        self.used_patterns()
            .into_iter()
            .filter_map(|idx| self.patterns.get(idx).and_then(Option::as_ref))
            .flat_map(|pattern| pattern.lines())
            .flat_map(|(_, line)| line.cells.iter())
            .filter_map(&field)
            .collect()
    }

    /// Validate and freeze the module.
    ///
    /// Sample 0 and ornament 0 are filled with stubs when absent. Every other
    /// reference must have been registered by the decoder.
    pub fn build(mut self) -> Result<Module> {
        if self.positions.is_empty() {
            return Err(TrackerError::malformed(0, "empty position list"));
        }
        if self.loop_position >= self.positions.len() {
            return Err(TrackerError::malformed(
                0,
                format!(
                    "loop position {} outside of {} positions",
                    self.loop_position,
                    self.positions.len()
                ),
            ));
        }
        for (idx, pos) in self.positions.iter().enumerate() {
            let playable = self
                .patterns
                .get(pos.pattern)
                .and_then(Option::as_ref)
                .is_some_and(Pattern::is_playable);
            if !playable {
                return Err(TrackerError::malformed(
                    0,
                    format!("position {idx} refers to missing or empty pattern {}", pos.pattern),
                ));
            }
        }

        if !self.has_sample(0) {
            self.set_sample(0, Sample::stub());
        }
        if !self.has_ornament(0) {
            self.set_ornament(0, Ornament::stub());
        }
        if let Some(&index) = self.used_samples().iter().find(|&&idx| !self.has_sample(idx)) {
            return Err(TrackerError::UnsupportedReference {
                kind: "sample",
                index,
                available: self.samples.len(),
            });
        }
        if let Some(&index) = self
            .used_ornaments()
            .iter()
            .find(|&&idx| !self.has_ornament(idx))
        {
            return Err(TrackerError::UnsupportedReference {
                kind: "ornament",
                index,
                available: self.ornaments.len(),
            });
        }

        let mut module = Module {
            format: self.format,
            channels: self.channels,
            initial_tempo: self.initial_tempo,
            positions: self.positions,
            loop_position: self.loop_position,
            patterns: self
                .patterns
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
            samples: self.samples,
            ornaments: self.ornaments,
            frequency_table: self.frequency_table,
            info: self.info,
            stats: Default::default(),
        };
        module.stats = scheduler::collect_statistics(&module);
        debug!(
            "{} module built: {} positions, {} frames, loop at frame {}",
            module.format.id(),
            module.stats.positions,
            module.stats.frames,
            module.stats.loop_frame
        );
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::SampleLine;

    fn single_pattern_builder() -> ModuleBuilder {
        let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
        builder.set_positions(vec![Position::new(0)], 0);
        let pattern = builder.start_pattern(0);
        pattern.size = 4;
        pattern.line_mut(0, 3).cells[0].sample = Some(2);
        builder
    }

    #[test]
    fn unregistered_sample_is_rejected() {
        let err = single_pattern_builder().build().unwrap_err();
        assert!(matches!(
            err,
            TrackerError::UnsupportedReference { kind: "sample", index: 2, .. }
        ));
    }

    #[test]
    fn stubs_fill_slot_zero() {
        let mut builder = single_pattern_builder();
        builder.set_sample(2, Sample::new(0, vec![SampleLine::SILENT; 2]));
        let module = builder.build().unwrap();
        assert!(module.has_sample(0));
        assert!(module.has_ornament(0));
        assert_eq!(module.sample(9).size(), 0);
        assert_eq!(module.stats().frames, 4 * 6);
    }

    #[test]
    fn loop_position_must_exist() {
        let mut builder = single_pattern_builder();
        builder.set_sample(2, Sample::stub());
        builder.set_positions(vec![Position::new(0)], 1);
        assert_eq!(builder.build().unwrap_err().kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn audibility_checks_cover_used_entries_only() {
        let mut builder = single_pattern_builder();
        assert!(!builder.has_notes());
        builder.set_sample(2, Sample::new(0, vec![SampleLine::SILENT; 4]));
        assert!(!builder.has_audible_samples());

        let noisy = SampleLine {
            noise_mask: false,
            ..SampleLine::SILENT
        };
        builder.set_sample(5, Sample::new(0, vec![noisy]));
        assert!(!builder.has_audible_samples());
        builder.set_sample(2, Sample::new(0, vec![SampleLine::SILENT, noisy]));
        assert!(builder.has_audible_samples());

        builder.start_pattern(0).line_mut(2, 3).cells[1].note = Some(12);
        assert!(builder.has_notes());
    }

    #[test]
    fn empty_pattern_cannot_be_played() {
        let mut builder = ModuleBuilder::new(TrackerFormat::SoundTracker3);
        builder.set_positions(vec![Position::new(1)], 0);
        builder.start_pattern(1);
        assert!(builder.build().is_err());
    }
}
