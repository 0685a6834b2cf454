//! Sound Tracker 1.x compiled modules.
//!
//! Layout:
//!
//! ```text
//! 0x00  tempo
//! 0x01  positions, ornaments, patterns offsets (u16le)
//! 0x07  identifier, 18 bytes
//! 0x19  size (u16le)
//! 0x1b  samples, 99 bytes each: number, 32 lines of 3 bytes, loop, loop size
//! ```
//!
//! Positions carry a pattern number (1-based) and a transposition. Patterns
//! and ornaments are stored as numbered tables. Missing entries are replaced
//! with stubs, but a module without notes or audible samples is rejected.

use std::collections::BTreeSet;

use log::{debug, warn};

use super::soundtracker::{
    looped_sample, SoundTrackerOpcodes, MAX_ORNAMENTS, MAX_PATTERNS, MAX_SAMPLES, ORNAMENT_SIZE,
    SAMPLE_SIZE,
};
use crate::binary::{decode_text, BinaryView};
use crate::decoder::{decode_pattern, OpcodeTable};
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Module, ModuleBuilder, Ornament, Pattern, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Sound Tracker v1.x";
const ID: &str = "STC";

const MIN_SIZE: usize = 128;
const MAX_SIZE: usize = 0x2600;
const MAX_TEMPO: u8 = 0x20;

const POSITIONS_OFFSET: usize = 0x01;
const ORNAMENTS_OFFSET: usize = 0x03;
const PATTERNS_OFFSET: usize = 0x05;
const IDENTIFIER: usize = 0x07;
const IDENTIFIER_SIZE: usize = 18;
const SAMPLES: usize = 0x1b;

const SAMPLE_ENTRY_SIZE: usize = 1 + SAMPLE_SIZE * 3 + 2;
const PATTERN_ENTRY_SIZE: usize = 7;
const ORNAMENT_ENTRY_SIZE: usize = 1 + ORNAMENT_SIZE;

/// Identifiers written by known compilers instead of a title.
const PROGRAM_IDS: [&[u8; IDENTIFIER_SIZE]; 12] = [
    b"SONG BY ST COMPIL\x01",
    b"SONG BY ST COMPILE",
    b"SONG BY MB COMPILE",
    b"SONG BY ST-COMPILE",
    b"SONG ST BY COMPILE",
    b"SOUND TRACKER v1.1",
    b"SOUND TRACKER v1.3",
    b"SOUND TRACKER v3.0",
    b"S.T.FULL EDITION  ",
    b"S.T.FULL EDITION \x7f",
    b"S.W.COMPILE V2.0  ",
    b"STU SONG COMPILER ",
];

struct Header {
    tempo: u8,
    positions_offset: usize,
    ornaments_offset: usize,
    patterns_offset: usize,
    identifier: [u8; IDENTIFIER_SIZE],
}

impl Header {
    fn read(view: &BinaryView<'_>) -> Result<Self> {
        let tempo = view.read_u8(0)?;
        if tempo == 0 || tempo > MAX_TEMPO {
            return Err(TrackerError::mismatch(ID, format!("tempo {tempo} out of range")));
        }
        let first_sample = view.read_u8(SAMPLES)?;
        if usize::from(first_sample) >= MAX_SAMPLES {
            return Err(TrackerError::mismatch(ID, "invalid first sample number"));
        }
        let mut identifier = [0; IDENTIFIER_SIZE];
        identifier.copy_from_slice(view.bytes(IDENTIFIER, IDENTIFIER_SIZE)?);
        let header = Self {
            tempo,
            positions_offset: usize::from(view.read_u16_le(POSITIONS_OFFSET)?),
            ornaments_offset: usize::from(view.read_u16_le(ORNAMENTS_OFFSET)?),
            patterns_offset: usize::from(view.read_u16_le(PATTERNS_OFFSET)?),
            identifier,
        };
        for offset in [
            header.positions_offset,
            header.ornaments_offset,
            header.patterns_offset,
        ] {
            if offset < SAMPLES + SAMPLE_ENTRY_SIZE || offset >= view.len() {
                return Err(TrackerError::mismatch(ID, format!("table offset {offset:#x} out of range")));
            }
        }
        Ok(header)
    }

    fn is_program_id(&self) -> bool {
        PROGRAM_IDS.iter().any(|id| **id == self.identifier)
    }
}

/// Decode a Sound Tracker compiled module.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    let header = Header::read(&view).map_err(|err| err.or_mismatch(ID))?;

    let mut builder = ModuleBuilder::new(TrackerFormat::SoundTrackerCompiled);
    builder.set_initial_tempo(header.tempo);
    {
        let id = decode_text(&header.identifier);
        let info = builder.info_mut();
        if header.is_program_id() {
            info.program = id;
        } else {
            info.title = id;
            info.program = PROGRAM.to_owned();
        }
    }

    let positions = parse_positions(&view, &header)?;
    debug!("STC: {} positions", positions.len());
    builder.set_positions(positions, 0);

    parse_patterns(&view, &header, &mut builder)?;
    if !builder.has_notes() {
        return Err(TrackerError::mismatch(ID, "patterns contain no notes"));
    }
    parse_samples(&view, &mut builder)?;
    if !builder.has_audible_samples() {
        return Err(TrackerError::mismatch(ID, "no audible samples"));
    }
    parse_ornaments(&view, &header, &mut builder);
    builder.build()
}

fn parse_positions(view: &BinaryView<'_>, header: &Header) -> Result<Vec<Position>> {
    let count = usize::from(view.read_u8(header.positions_offset)?) + 1;
    let mut positions = Vec::with_capacity(count);
    for idx in 0..count {
        let entry = header.positions_offset + 1 + idx * 2;
        let number = usize::from(view.read_u8(entry)?);
        if !(1..=MAX_PATTERNS).contains(&number) {
            return Err(TrackerError::malformed(
                entry,
                format!("position {idx} refers to pattern number {number}"),
            ));
        }
        positions.push(Position::transposed(number - 1, view.read_i8(entry + 1)?));
    }
    Ok(positions)
}

fn parse_patterns(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let used = builder.used_patterns();
    let mut done = BTreeSet::new();
    for entry_idx in 0..MAX_PATTERNS {
        let entry = header.patterns_offset + entry_idx * PATTERN_ENTRY_SIZE;
        let number = usize::from(view.read_u8(entry)?);
        if !(1..=MAX_PATTERNS).contains(&number) {
            break;
        }
        let idx = number - 1;
        if !used.contains(&idx) || done.contains(&idx) {
            continue;
        }
        let mut offsets = Vec::with_capacity(builder.channels());
        for chan in 0..builder.channels() {
            offsets.push(usize::from(view.read_u16_le(entry + 1 + chan * 2)?));
        }
        debug!("STC: parse pattern {idx}");
        decode_pattern::<SoundTrackerOpcodes>(view, &offsets, builder.start_pattern(idx))?;
        done.insert(idx);
        if done.len() == used.len() {
            return Ok(());
        }
    }
    if done.is_empty() {
        return Err(TrackerError::malformed(header.patterns_offset, "no patterns decoded"));
    }
    for idx in used.difference(&done) {
        warn!("STC: pattern {idx} is missing, using stub");
        *builder.start_pattern(*idx) = Pattern::with_size(SoundTrackerOpcodes::MIN_PATTERN_SIZE);
    }
    Ok(())
}

fn parse_sample_line(raw: &[u8]) -> SampleLine {
    let magnitude = (i16::from(raw[0] & 0xf0) << 4) | i16::from(raw[2]);
    SampleLine {
        level: raw[0] & 0x0f,
        noise: raw[1] & 0x1f,
        tone_mask: raw[1] & 0x40 != 0,
        noise_mask: raw[1] & 0x80 != 0,
        envelope_mask: false,
        vibrato: if raw[1] & 0x20 != 0 { magnitude } else { -magnitude },
    }
}

fn parse_sample(view: &BinaryView<'_>, entry: usize) -> Result<Sample> {
    let raw = view.bytes(entry + 1, SAMPLE_SIZE * 3)?;
    let lines = raw.chunks_exact(3).map(parse_sample_line).collect();
    let loop_start = usize::from(view.read_u8(entry + 1 + SAMPLE_SIZE * 3)?);
    let loop_size = usize::from(view.read_u8(entry + 2 + SAMPLE_SIZE * 3)?);
    Ok(looped_sample(lines, loop_start, loop_start + loop_size + 1))
}

fn parse_samples(view: &BinaryView<'_>, builder: &mut ModuleBuilder) -> Result<()> {
    let used = builder.used_samples();
    let mut done = BTreeSet::new();
    for entry_idx in 0..MAX_SAMPLES {
        let entry = SAMPLES + entry_idx * SAMPLE_ENTRY_SIZE;
        if view.ensure_range(entry, SAMPLE_ENTRY_SIZE).is_err() {
            break;
        }
        let idx = usize::from(view.read_u8(entry)?);
        if !used.contains(&idx) || done.contains(&idx) {
            continue;
        }
        debug!("STC: parse sample {idx}");
        builder.set_sample(idx, parse_sample(view, entry)?);
        done.insert(idx);
        if done.len() == used.len() {
            return Ok(());
        }
    }
    if done.is_empty() {
        return Err(TrackerError::malformed(SAMPLES, "no samples decoded"));
    }
    for idx in used.difference(&done) {
        warn!("STC: sample {idx} is missing, using stub");
        builder.set_sample(*idx, Sample::stub());
    }
    Ok(())
}

fn parse_ornaments(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) {
    let used = builder.used_ornaments();
    if used.is_empty() {
        debug!("STC: no ornaments used");
        return;
    }
    let mut done = BTreeSet::new();
    for entry_idx in 0..MAX_ORNAMENTS {
        let entry = header.ornaments_offset + entry_idx * ORNAMENT_ENTRY_SIZE;
        let Ok(raw) = view.bytes(entry, ORNAMENT_ENTRY_SIZE) else {
            break;
        };
        let idx = usize::from(raw[0]);
        if !used.contains(&idx) || done.contains(&idx) {
            continue;
        }
        debug!("STC: parse ornament {idx}");
        let offsets = raw[1..].iter().map(|&b| b as i8).collect();
        builder.set_ornament(idx, Ornament::new(0, offsets));
        done.insert(idx);
        if done.len() == used.len() {
            return;
        }
    }
    for idx in used.difference(&done) {
        warn!("STC: ornament {idx} is missing, using stub");
        builder.set_ornament(*idx, Ornament::stub());
    }
}
