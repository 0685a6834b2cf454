//! Sound Tracker 1.x editor files.
//!
//! Uncompiled modules are a fixed-size memory image of the editor:
//!
//! ```text
//! 0     15 samples, 130 bytes each: 32 levels, 32 noise bytes,
//!       32 effects (u16le), loop, loop size
//! 1950  256 positions: pattern number (1-based), transposition
//! 2462  position count - 1
//! 2463  17 ornaments, 32 offsets each
//! 3007  tempo
//! 3008  rows per pattern
//! 3009  patterns, 64 rows of 3 x 3 bytes each
//! ```
//!
//! Pattern cells are plain `note, sample/effect, parameter` triples rather
//! than an opcode stream. Patterns cut off by the end of the file are played
//! as silence.

use log::{debug, warn};

use super::soundtracker::{looped_sample, MAX_PATTERNS, ORNAMENT_SIZE, SAMPLE_SIZE};
use crate::binary::BinaryView;
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Cell, Command, Module, ModuleBuilder, Ornament, Pattern, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Sound Tracker";
const ID: &str = "ST";

const SAMPLES_COUNT: usize = 15;
const SAMPLE_RECORD_SIZE: usize = SAMPLE_SIZE * 4 + 2;
const POSITIONS: usize = SAMPLES_COUNT * SAMPLE_RECORD_SIZE;
const POSITIONS_COUNT: usize = 256;
const LENGTH: usize = POSITIONS + POSITIONS_COUNT * 2;
const ORNAMENTS: usize = LENGTH + 1;
const ORNAMENTS_COUNT: usize = 17;
const TEMPO: usize = ORNAMENTS + ORNAMENTS_COUNT * ORNAMENT_SIZE;
const PATTERNS_SIZE: usize = TEMPO + 1;
const PATTERNS: usize = PATTERNS_SIZE + 1;

const PATTERN_ROWS: usize = 64;
const CELL_SIZE: usize = 3;
const ROW_SIZE: usize = CELL_SIZE * 3;
const PATTERN_RECORD_SIZE: usize = PATTERN_ROWS * ROW_SIZE;

/// Header plus one pattern.
const MIN_SIZE: usize = PATTERNS + PATTERN_RECORD_SIZE;
const MAX_SIZE: usize = PATTERNS + MAX_PATTERNS * PATTERN_RECORD_SIZE;

const MAX_LENGTH: u8 = 0x7f;
const MIN_TEMPO: u8 = 2;
const MAX_TEMPO: u8 = 15;
const MIN_PATTERN_ROWS: u8 = 0x20;
const MAX_PATTERN_ROWS: u8 = 0x40;

/// Halftone inside the octave for each note code; `None` marks unused codes.
const HALFTONES: [Option<u8>; 16] = [
    None,
    None,
    Some(9),
    Some(10),
    Some(11),
    None,
    Some(0),
    Some(1),
    Some(2),
    Some(3),
    Some(4),
    None,
    Some(5),
    Some(6),
    Some(7),
    Some(8),
];

const EFFECT_ORNAMENT: u8 = 15;
const EFFECT_NO_ENVELOPE: u8 = 1;

/// One stored channel cell: `RNNNNOOO SSSSEEEE PPPPPPPP`.
#[derive(Debug, Clone, Copy)]
struct RawCell {
    note: u8,
    effect_sample: u8,
    parameter: u8,
}

impl RawCell {
    fn new(raw: &[u8]) -> Self {
        Self {
            note: raw[0],
            effect_sample: raw[1],
            parameter: raw[2],
        }
    }

    fn is_rest(self) -> bool {
        self.note & 0x80 != 0
    }

    fn has_note(self) -> bool {
        self.note & 0x78 != 0
    }

    fn is_empty(self) -> bool {
        !self.is_rest() && !self.has_note() && self.effect_sample == 0
    }

    fn sample(self) -> usize {
        usize::from(self.effect_sample >> 4)
    }

    fn effect(self) -> u8 {
        self.effect_sample & 0x0f
    }

    fn halftone(self) -> Option<u8> {
        HALFTONES[usize::from((self.note & 0x78) >> 3)].map(|tone| tone + 12 * (self.note & 7))
    }
}

/// Per-channel context carried across the rows of one pattern.
#[derive(Debug, Clone, Copy, Default)]
struct ChannelContext {
    sample: usize,
    envelope: (u8, u8),
}

/// Reject editor images whose tables hold values the editor never writes.
fn check_layout(view: &BinaryView<'_>) -> Result<()> {
    for idx in 0..SAMPLES_COUNT {
        let record = view.bytes(idx * SAMPLE_RECORD_SIZE, SAMPLE_RECORD_SIZE)?;
        let (levels, rest) = record.split_at(SAMPLE_SIZE);
        let (noises, rest) = rest.split_at(SAMPLE_SIZE);
        let (effects, loops) = rest.split_at(SAMPLE_SIZE * 2);
        let valid = levels.iter().all(|&level| level <= 0x0f)
            && noises.iter().all(|&noise| noise & 0x20 == 0)
            && effects.chunks_exact(2).all(|effect| effect[1] <= 0x1f)
            && loops.iter().all(|&value| value <= 0x1f);
        if !valid {
            return Err(TrackerError::mismatch(ID, format!("sample {} out of range", idx + 1)));
        }
    }
    let positions = view.bytes(POSITIONS, POSITIONS_COUNT * 2)?;
    if positions
        .chunks_exact(2)
        .any(|entry| !(1..=MAX_PATTERNS).contains(&usize::from(entry[0])))
    {
        return Err(TrackerError::mismatch(ID, "invalid pattern number in positions"));
    }
    if view.read_u8(LENGTH)? > MAX_LENGTH {
        return Err(TrackerError::mismatch(ID, "too many positions"));
    }
    let tempo = view.read_u8(TEMPO)?;
    if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
        return Err(TrackerError::mismatch(ID, format!("tempo {tempo} out of range")));
    }
    let rows = view.read_u8(PATTERNS_SIZE)?;
    if !(MIN_PATTERN_ROWS..=MAX_PATTERN_ROWS).contains(&rows) {
        return Err(TrackerError::mismatch(ID, format!("pattern size {rows} out of range")));
    }
    Ok(())
}

/// Decode a Sound Tracker editor file.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    check_layout(&view).map_err(|err| err.or_mismatch(ID))?;

    let tempo = view.read_u8(TEMPO)?;
    let rows = usize::from(view.read_u8(PATTERNS_SIZE)?);
    let stored_patterns = 1 + (view.len() - MIN_SIZE) / PATTERN_RECORD_SIZE;

    let mut builder = ModuleBuilder::new(TrackerFormat::SoundTracker);
    builder.set_initial_tempo(tempo);
    builder.info_mut().program = PROGRAM.to_owned();

    let count = usize::from(view.read_u8(LENGTH)?) + 1;
    let positions = view
        .bytes(POSITIONS, count * 2)?
        .chunks_exact(2)
        .map(|entry| Position::transposed(usize::from(entry[0]) - 1, entry[1] as i8))
        .collect::<Vec<_>>();
    debug!("ST: {} positions, {rows} rows per pattern", positions.len());
    builder.set_positions(positions, 0);

    for idx in builder.used_patterns() {
        let pattern = if idx < stored_patterns {
            debug!("ST: parse pattern {idx}");
            parse_pattern(&view, idx, rows, builder.channels())?
        } else {
            warn!("ST: pattern {idx} is not stored, using stub");
            Pattern::with_size(rows)
        };
        *builder.start_pattern(idx) = pattern;
    }
    if !builder.has_notes() {
        return Err(TrackerError::mismatch(ID, "patterns contain no notes"));
    }

    for idx in builder.used_samples() {
        let sample = match idx.checked_sub(1) {
            Some(record) => parse_sample(&view, record * SAMPLE_RECORD_SIZE)?,
            None => Sample::stub(),
        };
        builder.set_sample(idx, sample);
    }
    if !builder.has_audible_samples() {
        return Err(TrackerError::mismatch(ID, "no audible samples"));
    }

    for idx in builder.used_ornaments() {
        let offsets = view
            .bytes(ORNAMENTS + idx * ORNAMENT_SIZE, ORNAMENT_SIZE)?
            .iter()
            .map(|&b| b as i8)
            .collect();
        builder.set_ornament(idx, Ornament::new(0, offsets));
    }
    builder.build()
}

fn parse_pattern(view: &BinaryView<'_>, idx: usize, rows: usize, channels: usize) -> Result<Pattern> {
    let base = PATTERNS + idx * PATTERN_RECORD_SIZE;
    let mut pattern = Pattern::with_size(rows);
    let mut contexts = vec![ChannelContext::default(); channels];
    for row in 0..PATTERN_ROWS {
        let offset = base + row * ROW_SIZE;
        let cells: Vec<RawCell> = view
            .bytes(offset, ROW_SIZE)?
            .chunks_exact(CELL_SIZE)
            .map(RawCell::new)
            .collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if row >= rows {
            return Err(TrackerError::malformed(
                offset,
                format!("row {row} is used but patterns have {rows} rows"),
            ));
        }
        let line = pattern.line_mut(row, channels);
        for ((raw, cell), context) in cells.iter().zip(&mut line.cells).zip(&mut contexts) {
            if !raw.is_empty() {
                parse_cell(*raw, offset, cell, context)?;
            }
        }
    }
    Ok(pattern)
}

fn parse_cell(raw: RawCell, offset: usize, cell: &mut Cell, context: &mut ChannelContext) -> Result<()> {
    if raw.is_rest() {
        cell.enabled = Some(false);
        return Ok(());
    }
    if !raw.has_note() {
        return Ok(());
    }
    let note = raw
        .halftone()
        .ok_or_else(|| TrackerError::malformed(offset, format!("invalid note code {:#04x}", raw.note)))?;
    cell.enabled = Some(true);
    cell.note = Some(note);

    let sample = raw.sample();
    if sample != 0 && sample != context.sample {
        cell.sample = Some(sample);
    }
    context.sample = sample;

    match raw.effect() {
        EFFECT_ORNAMENT => {
            cell.ornament = Some(usize::from(raw.parameter & 0x0f));
            cell.commands.push(Command::NoEnvelope);
            context.envelope.0 = 0;
        }
        shape @ (8 | 10 | 12 | 13 | 14) => {
            if context.envelope != (shape, raw.parameter) {
                context.envelope = (shape, raw.parameter);
                cell.ornament = Some(0);
                cell.commands.push(Command::Envelope {
                    shape,
                    period: u16::from(raw.parameter),
                });
            }
        }
        EFFECT_NO_ENVELOPE => {
            cell.commands.push(Command::NoEnvelope);
            cell.ornament = Some(0);
            context.envelope.0 = 0;
        }
        _ => context.envelope.0 = 0,
    }
    Ok(())
}

/// Levels, noise bytes and effects are stored as separate 32-entry arrays.
fn parse_sample(view: &BinaryView<'_>, offset: usize) -> Result<Sample> {
    let levels = view.bytes(offset, SAMPLE_SIZE)?;
    let noises = view.bytes(offset + SAMPLE_SIZE, SAMPLE_SIZE)?;
    let effects = view.bytes(offset + SAMPLE_SIZE * 2, SAMPLE_SIZE * 2)?;
    let lines = levels
        .iter()
        .zip(noises)
        .zip(effects.chunks_exact(2))
        .map(|((&level, &noise), effect)| {
            let effect = u16::from_le_bytes([effect[0], effect[1]]);
            let magnitude = (effect & 0x0fff) as i16;
            SampleLine {
                level,
                noise: noise & 0x1f,
                tone_mask: noise & 0x40 != 0,
                noise_mask: noise & 0x80 != 0,
                envelope_mask: false,
                vibrato: if effect & 0x1000 != 0 { magnitude } else { -magnitude },
            }
        })
        .collect();
    let loop_start = usize::from(view.read_u8(offset + SAMPLE_SIZE * 4)?);
    let loop_size = usize::from(view.read_u8(offset + SAMPLE_SIZE * 4 + 1)?);
    Ok(looped_sample(lines, loop_start, loop_start + loop_size + 1))
}
