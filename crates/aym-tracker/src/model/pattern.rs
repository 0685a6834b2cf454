//! Patterns, lines and channel cells.
//!
//! Every cell field is optional: an absent field means "keep the channel's
//! current value", never "reset to zero".

use std::collections::BTreeMap;

/// Per-cell effect command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Arm the hardware envelope with `shape` (R13) and `period` (R11/R12).
    Envelope {
        /// Envelope shape (0-15).
        shape: u8,
        /// Envelope period.
        period: u16,
    },
    /// Disarm the hardware envelope for the channel.
    NoEnvelope,
    /// Slide the tone period by a fixed step every frame.
    Glissando(i16),
    /// Slide the tone period by `delta` until it reaches `target`'s period.
    GlissandoToNote {
        /// Period step per frame.
        delta: i16,
        /// Target note (halftone index).
        target: u16,
    },
    /// Stop sliding.
    NoGlissando,
    /// Signed offset added to every noise value of the channel's sample.
    NoiseBase(i8),
}

/// One channel's event in a line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cell {
    /// Channel switched on (`true`) or silenced (`false`).
    pub enabled: Option<bool>,
    /// Note (halftone index).
    pub note: Option<u8>,
    /// Sample index.
    pub sample: Option<usize>,
    /// Ornament index.
    pub ornament: Option<usize>,
    /// Channel volume (0-15).
    pub volume: Option<u8>,
    /// Commands in decode order.
    pub commands: Vec<Command>,
}

impl Cell {
    /// Whether the cell changes nothing.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_none()
            && self.note.is_none()
            && self.sample.is_none()
            && self.ornament.is_none()
            && self.volume.is_none()
            && self.commands.is_empty()
    }

    /// First command matching `pred`, mutable.
    pub fn find_command_mut(&mut self, pred: impl Fn(&Command) -> bool) -> Option<&mut Command> {
        self.commands.iter_mut().find(|cmd| pred(cmd))
    }
}

/// One pattern row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    /// Tempo override taking effect when the row starts.
    pub tempo: Option<u8>,
    /// One cell per channel.
    pub cells: Vec<Cell>,
}

impl Line {
    /// Empty line for `channels` channels.
    pub fn new(channels: usize) -> Self {
        Self {
            tempo: None,
            cells: vec![Cell::default(); channels],
        }
    }

    /// Cell of `channel`, if the line covers it.
    pub fn cell(&self, channel: usize) -> Option<&Cell> {
        self.cells.get(channel)
    }
}

/// Sparse pattern: rows without events are not stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pattern {
    /// Number of rows played.
    pub size: usize,
    lines: BTreeMap<usize, Line>,
}

impl Pattern {
    /// Empty pattern of `size` rows.
    pub fn with_size(size: usize) -> Self {
        Self {
            size,
            lines: BTreeMap::new(),
        }
    }

    /// Stored line at `index`.
    pub fn line(&self, index: usize) -> Option<&Line> {
        self.lines.get(&index)
    }

    /// Line at `index`, created on first access.
    pub fn line_mut(&mut self, index: usize, channels: usize) -> &mut Line {
        self.lines
            .entry(index)
            .or_insert_with(|| Line::new(channels))
    }

    /// Stored lines in row order.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &Line)> {
        self.lines.iter().map(|(idx, line)| (*idx, line))
    }

    /// Whether the pattern plays at least one row.
    pub fn is_playable(&self) -> bool {
        self.size > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_created_lazily() {
        let mut pattern = Pattern::with_size(8);
        assert!(pattern.line(3).is_none());
        pattern.line_mut(3, 3).tempo = Some(4);
        pattern.line_mut(3, 3).cells[1].note = Some(12);
        let line = pattern.line(3).unwrap();
        assert_eq!(line.tempo, Some(4));
        assert_eq!(line.cells.len(), 3);
        assert_eq!(pattern.lines().count(), 1);
    }

    #[test]
    fn absent_fields_are_not_zero() {
        let cell = Cell {
            volume: Some(0),
            ..Cell::default()
        };
        assert!(!cell.is_empty());
        assert_eq!(cell.note, None);
    }

    #[test]
    fn find_command_allows_patching_target() {
        let mut cell = Cell::default();
        cell.commands.push(Command::NoEnvelope);
        cell.commands.push(Command::GlissandoToNote { delta: 3, target: 0 });
        if let Some(Command::GlissandoToNote { target, .. }) =
            cell.find_command_mut(|c| matches!(c, Command::GlissandoToNote { .. }))
        {
            *target = 40;
        }
        assert_eq!(
            cell.commands[1],
            Command::GlissandoToNote { delta: 3, target: 40 }
        );
    }
}
