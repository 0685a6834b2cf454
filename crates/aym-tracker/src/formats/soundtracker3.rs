//! Sound Tracker 3.x modules.
//!
//! Layout:
//!
//! ```text
//! 0x00  tempo
//! 0x01  positions, samples, ornaments, patterns table offsets (u16le)
//! 0x09  optional "KSA SOFTWARE COMPILATION OF " + 27-byte title
//! ```
//!
//! Samples and ornaments are reached through counted offset tables whose
//! entries must be ascending, record-aligned and inside the file. Unlike the
//! compiled variant, a reference past the declared count rejects the module,
//! and so does a module without notes or without an audible sample.

use log::debug;

use super::soundtracker::{
    looped_sample, SoundTrackerOpcodes, COMPILATION_SIGNATURE, MAX_ORNAMENTS, MAX_SAMPLES,
    ORNAMENT_SIZE, SAMPLE_SIZE,
};
use crate::binary::BinaryView;
use crate::decoder::decode_pattern;
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Module, ModuleBuilder, Ornament, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Sound Tracker v3.x";
const ID: &str = "ST3";

const MIN_SIZE: usize = 0x180;
const MAX_SIZE: usize = 0x1800;
const MIN_TEMPO: u8 = 3;
const MAX_TEMPO: u8 = 15;

const HEADER_SIZE: usize = 9;
const TITLE_SIZE: usize = 27;

const PATTERN_ENTRY_SIZE: usize = 6;
const SAMPLE_LINE_SIZE: usize = 4;
const SAMPLE_RECORD_SIZE: usize = 2 + SAMPLE_SIZE * SAMPLE_LINE_SIZE;

struct Header {
    tempo: u8,
    positions_offset: usize,
    samples_offset: usize,
    ornaments_offset: usize,
    patterns_offset: usize,
    title: Option<String>,
}

impl Header {
    fn read(view: &BinaryView<'_>) -> Result<Self> {
        let tempo = view.read_u8(0)?;
        if !(MIN_TEMPO..=MAX_TEMPO).contains(&tempo) {
            return Err(TrackerError::mismatch(ID, format!("tempo {tempo} out of range")));
        }
        let header = Self {
            tempo,
            positions_offset: usize::from(view.read_u16_le(1)?),
            samples_offset: usize::from(view.read_u16_le(3)?),
            ornaments_offset: usize::from(view.read_u16_le(5)?),
            patterns_offset: usize::from(view.read_u16_le(7)?),
            title: match view.bytes(HEADER_SIZE, COMPILATION_SIGNATURE.len()) {
                Ok(sig) if sig == COMPILATION_SIGNATURE => {
                    Some(view.read_text(HEADER_SIZE + COMPILATION_SIGNATURE.len(), TITLE_SIZE)?)
                }
                _ => None,
            },
        };
        for offset in [
            header.positions_offset,
            header.samples_offset,
            header.ornaments_offset,
            header.patterns_offset,
        ] {
            if offset < HEADER_SIZE || offset >= view.len() {
                return Err(TrackerError::mismatch(ID, format!("table offset {offset:#x} out of range")));
            }
        }
        Ok(header)
    }
}

fn are_sequenced(lhs: usize, rhs: usize, record: usize) -> bool {
    lhs <= rhs && (rhs - lhs) % record == 0
}

/// Counted offset table of `record`-sized entries.
fn read_table(view: &BinaryView<'_>, offset: usize, limit: usize, record: usize) -> Result<Vec<usize>> {
    let count = usize::from(view.read_u8(offset)?);
    if !(1..=limit).contains(&count) {
        return Err(TrackerError::mismatch(ID, format!("table at {offset:#x} declares {count} entries")));
    }
    let entries = (0..count)
        .map(|idx| view.read_u16_le(offset + 1 + idx * 2).map(usize::from))
        .collect::<Result<Vec<_>>>()?;
    if entries.windows(2).any(|pair| !are_sequenced(pair[0], pair[1], record)) {
        return Err(TrackerError::mismatch(ID, format!("table at {offset:#x} is not sequential")));
    }
    if let Some(&bad) = entries
        .iter()
        .find(|&&entry| entry < HEADER_SIZE || entry + record > view.len())
    {
        return Err(TrackerError::mismatch(ID, format!("table entry {bad:#x} out of range")));
    }
    Ok(entries)
}

/// Decode a Sound Tracker 3 module.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    let header = Header::read(&view).map_err(|err| err.or_mismatch(ID))?;
    let samples_table = read_table(&view, header.samples_offset, MAX_SAMPLES, SAMPLE_RECORD_SIZE)
        .map_err(|err| err.or_mismatch(ID))?;
    let ornaments_table = read_table(&view, header.ornaments_offset, MAX_ORNAMENTS, ORNAMENT_SIZE)
        .map_err(|err| err.or_mismatch(ID))?;

    let mut builder = ModuleBuilder::new(TrackerFormat::SoundTracker3);
    builder.set_initial_tempo(header.tempo);
    {
        let info = builder.info_mut();
        info.program = PROGRAM.to_owned();
        if let Some(title) = &header.title {
            info.title = title.clone();
        }
    }

    let positions = parse_positions(&view, &header)?;
    debug!("ST3: {} positions", positions.len());
    builder.set_positions(positions, 0);

    for idx in builder.used_patterns() {
        let entry = header.patterns_offset + idx * PATTERN_ENTRY_SIZE;
        let mut offsets = Vec::with_capacity(builder.channels());
        for chan in 0..builder.channels() {
            offsets.push(usize::from(view.read_u16_le(entry + chan * 2)?));
        }
        debug!("ST3: parse pattern {idx}");
        decode_pattern::<SoundTrackerOpcodes>(&view, &offsets, builder.start_pattern(idx))?;
    }
    if !builder.has_notes() {
        return Err(TrackerError::mismatch(ID, "patterns contain no notes"));
    }

    for idx in builder.used_samples() {
        let offset = *samples_table.get(idx).ok_or(TrackerError::UnsupportedReference {
            kind: "sample",
            index: idx,
            available: samples_table.len(),
        })?;
        debug!("ST3: parse sample {idx} at {offset:#x}");
        builder.set_sample(idx, parse_sample(&view, offset)?);
    }
    if !builder.has_audible_samples() {
        return Err(TrackerError::mismatch(ID, "no audible samples"));
    }

    for idx in builder.used_ornaments() {
        let offset = *ornaments_table.get(idx).ok_or(TrackerError::UnsupportedReference {
            kind: "ornament",
            index: idx,
            available: ornaments_table.len(),
        })?;
        debug!("ST3: parse ornament {idx} at {offset:#x}");
        let offsets = view
            .bytes(offset, ORNAMENT_SIZE)?
            .iter()
            .map(|&b| b as i8)
            .collect();
        builder.set_ornament(idx, Ornament::new(0, offsets));
    }

    builder.build()
}

fn parse_positions(view: &BinaryView<'_>, header: &Header) -> Result<Vec<Position>> {
    // u8 length: 1..=255 entries
    let count = usize::from(view.read_u8(header.positions_offset)?);
    if count == 0 {
        return Err(TrackerError::malformed(header.positions_offset, "no positions"));
    }
    let mut positions = Vec::with_capacity(count);
    for idx in 0..count {
        let entry = header.positions_offset + 1 + idx * 2;
        let transposition = view.read_i8(entry)?;
        let pattern_offset = usize::from(view.read_u8(entry + 1)?);
        if pattern_offset % PATTERN_ENTRY_SIZE != 0 {
            return Err(TrackerError::malformed(
                entry + 1,
                format!("pattern offset {pattern_offset} is not a table entry"),
            ));
        }
        positions.push(Position::transposed(pattern_offset / PATTERN_ENTRY_SIZE, transposition));
    }
    Ok(positions)
}

fn parse_sample_line(raw: &[u8]) -> SampleLine {
    SampleLine {
        level: raw[2] & 0x0f,
        noise: raw[3],
        tone_mask: raw[2] & 0x10 != 0,
        noise_mask: raw[2] & 0x80 != 0,
        envelope_mask: false,
        vibrato: i16::from_le_bytes([raw[0], raw[1]]),
    }
}

fn parse_sample(view: &BinaryView<'_>, offset: usize) -> Result<Sample> {
    let loop_start = usize::from(view.read_u8(offset)?);
    let loop_limit = usize::from(view.read_u8(offset + 1)?);
    let lines = view
        .bytes(offset + 2, SAMPLE_SIZE * SAMPLE_LINE_SIZE)?
        .chunks_exact(SAMPLE_LINE_SIZE)
        .map(parse_sample_line)
        .collect();
    Ok(looped_sample(lines, loop_start, loop_start + loop_limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_line_layout() {
        let line = parse_sample_line(&[0xfe, 0xff, 0x9a, 0x07]);
        assert_eq!(line.vibrato, -2);
        assert_eq!(line.level, 10);
        assert!(line.tone_mask);
        assert!(line.noise_mask);
        assert_eq!(line.noise, 7);
    }

    fn table(entries: &[u16]) -> Vec<u8> {
        let mut data = vec![0u8; 0x100];
        data[0] = entries.len() as u8;
        for (idx, entry) in entries.iter().enumerate() {
            data[1 + idx * 2..3 + idx * 2].copy_from_slice(&entry.to_le_bytes());
        }
        data
    }

    #[test]
    fn table_count_is_bounded() {
        let data = [0u8, 17, 0, 0];
        let err = read_table(&BinaryView::new(&data), 1, MAX_SAMPLES, 1).unwrap_err();
        assert!(matches!(err, TrackerError::FormatMismatch { .. }));
        let data = table(&[0x10, 0x30, 0x30]);
        let entries = read_table(&BinaryView::new(&data), 0, MAX_ORNAMENTS, ORNAMENT_SIZE).unwrap();
        assert_eq!(entries, vec![0x10, 0x30, 0x30]);
    }

    #[test]
    fn table_entries_must_be_sequential_and_in_bounds() {
        for entries in [&[0x30u16, 0x10][..], &[0x10, 0x18], &[0xf0], &[0x04]] {
            let data = table(entries);
            let err = read_table(&BinaryView::new(&data), 0, MAX_ORNAMENTS, ORNAMENT_SIZE)
                .unwrap_err();
            assert!(matches!(err, TrackerError::FormatMismatch { .. }), "{entries:?}");
        }
    }
}
