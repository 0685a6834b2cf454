//! Sound Tracker Pro compiled modules.
//!
//! Layout:
//!
//! ```text
//! 0x00  tempo
//! 0x01  positions, patterns, ornaments, samples table offsets (u16le)
//! 0x09  fixes count
//! 0x0a  optional "KSA SOFTWARE COMPILATION OF " + 25-byte title
//!       pattern data, ornaments, samples, positions,
//!       patterns table, ornaments table, samples table
//! ```
//!
//! Compiled modules may have been relocated for a load address: every
//! pointer is shifted by the same delta, recovered from the first pattern,
//! which always starts right after the header. The samples table must be the
//! last structure and the ornaments table must span exactly its 16 entries.

use log::debug;

use super::soundtracker::COMPILATION_SIGNATURE;
use crate::binary::BinaryView;
use crate::decoder::{decode_pattern, DecodedEvent, OpcodeTable, Operand};
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Module, ModuleBuilder, Ornament, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Sound Tracker Pro";
const ID: &str = "STP";

const MIN_SIZE: usize = 200;
const MAX_SIZE: usize = 0x2800;
const MIN_TEMPO: u8 = 3;
const MAX_TEMPO: u8 = 15;
const MAX_POSITIONS_OFFSET: usize = 0x2600;
const MAX_TABLE_OFFSET: usize = 0x2700;

const HEADER_SIZE: usize = 10;
const TITLE_SIZE: usize = 25;
const IDENTIFIED_HEADER_SIZE: usize = HEADER_SIZE + COMPILATION_SIGNATURE.len() + TITLE_SIZE;

const MAX_SAMPLES: usize = 15;
const MAX_ORNAMENTS: usize = 16;
const PATTERN_ENTRY_SIZE: usize = 6;
const POSITION_ENTRY_SIZE: usize = 2;
const SAMPLE_LINE_SIZE: usize = 4;
/// Sample lines are addressed inside a 256-byte window.
const SAMPLE_WINDOW_LINES: usize = 256 / SAMPLE_LINE_SIZE;

/// Sound Tracker Pro opcode table.
pub(crate) struct SoundTrackerProOpcodes;

impl OpcodeTable for SoundTrackerProOpcodes {
    const NAME: &'static str = ID;
    const PATTERN_END: u8 = 0x00;
    const MIN_PATTERN_SIZE: usize = 5;
    const MAX_PATTERN_SIZE: usize = 64;

    fn classify(byte: u8) -> DecodedEvent {
        match byte {
            0x00 => DecodedEvent::Nop,
            0x01..=0x60 => DecodedEvent::Note(byte - 1),
            0x61..=0x6f => DecodedEvent::Sample(usize::from(byte - 0x61)),
            0x70..=0x7f => DecodedEvent::Ornament {
                index: usize::from(byte - 0x70),
                envelope_off: true,
                reset_glissando: true,
            },
            0x80..=0xbf => DecodedEvent::RepeatPeriod(usize::from(byte - 0x80)),
            // arms the envelope without touching its registers
            0xc0 => DecodedEvent::Envelope {
                shape: 0,
                period: Operand::Absent,
                reset_ornament: true,
                reset_glissando: true,
            },
            0xc1..=0xcf => DecodedEvent::Envelope {
                shape: byte - 0xc0,
                period: Operand::Byte,
                reset_ornament: true,
                reset_glissando: true,
            },
            0xd0..=0xdf => DecodedEvent::Rest,
            0xe0..=0xef => DecodedEvent::EndOfCell,
            0xf0 => DecodedEvent::Glissando,
            0xf1..=0xff => DecodedEvent::Volume(byte - 0xf1),
        }
    }
}

struct Header {
    tempo: u8,
    positions_offset: usize,
    patterns_offset: usize,
    ornaments_offset: usize,
    samples_offset: usize,
    fixes: u8,
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
            patterns_offset: usize::from(view.read_u16_le(3)?),
            ornaments_offset: usize::from(view.read_u16_le(5)?),
            samples_offset: usize::from(view.read_u16_le(7)?),
            fixes: view.read_u8(9)?,
            title: match view.bytes(HEADER_SIZE, COMPILATION_SIGNATURE.len()) {
                Ok(sig) if sig == COMPILATION_SIGNATURE => {
                    Some(view.read_text(HEADER_SIZE + COMPILATION_SIGNATURE.len(), TITLE_SIZE)?)
                }
                _ => None,
            },
        };
        if !(HEADER_SIZE..=MAX_POSITIONS_OFFSET).contains(&header.positions_offset) {
            return Err(TrackerError::mismatch(ID, "positions offset out of range"));
        }
        for offset in [
            header.patterns_offset,
            header.ornaments_offset,
            header.samples_offset,
        ] {
            if !(HEADER_SIZE..=MAX_TABLE_OFFSET).contains(&offset) {
                return Err(TrackerError::mismatch(ID, format!("table offset {offset:#x} out of range")));
            }
        }
        Ok(header)
    }

    fn size(&self) -> usize {
        if self.title.is_some() {
            IDENTIFIED_HEADER_SIZE
        } else {
            HEADER_SIZE
        }
    }

    /// Check how the tables partition the file.
    ///
    /// The data ends with the samples table; the ornaments table is followed
    /// directly by another structure and the positions list fills its area
    /// up to whole entries.
    fn check_areas(&self, view: &BinaryView<'_>) -> Result<()> {
        let end = view.len().min(self.samples_offset + MAX_SAMPLES * 2);
        let starts = [
            self.positions_offset,
            self.patterns_offset,
            self.ornaments_offset,
            self.samples_offset,
            end,
        ];
        let area = |start: usize| {
            starts
                .iter()
                .filter(|&&bound| bound > start)
                .min()
                .map(|&bound| bound - start)
        };
        if starts[..4].iter().any(|&start| start >= end) {
            return Err(TrackerError::mismatch(ID, "tables past the end of data"));
        }
        if area(self.samples_offset) != Some(end - self.samples_offset) {
            return Err(TrackerError::mismatch(ID, "samples table is not the last structure"));
        }
        if area(self.ornaments_offset) != Some(MAX_ORNAMENTS * 2) {
            return Err(TrackerError::mismatch(ID, "ornaments table size mismatch"));
        }
        let length = usize::from(view.read_u8(self.positions_offset)?);
        let required = 2 + length * POSITION_ENTRY_SIZE;
        let fits = area(self.positions_offset).is_some_and(|size| {
            size >= required && (size - required) % POSITION_ENTRY_SIZE == 0
        });
        if length == 0 || !fits {
            return Err(TrackerError::mismatch(
                ID,
                format!("{length} positions do not fit their area"),
            ));
        }
        Ok(())
    }

    /// Relocation delta applied to every stored pointer.
    fn unfix_delta(&self, view: &BinaryView<'_>) -> Result<usize> {
        let first_data = usize::from(view.read_u16_le(self.patterns_offset)?);
        let header_size = self.size();
        let valid = if self.fixes != 0 {
            first_data == header_size
        } else {
            first_data >= header_size
        };
        if !valid {
            return Err(TrackerError::mismatch(
                ID,
                format!("first pattern at {first_data:#x} does not follow the header"),
            ));
        }
        Ok(first_data - header_size)
    }
}

/// Decode a Sound Tracker Pro module.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    let header = Header::read(&view).map_err(|err| err.or_mismatch(ID))?;
    header.check_areas(&view).map_err(|err| err.or_mismatch(ID))?;
    let delta = header.unfix_delta(&view).map_err(|err| err.or_mismatch(ID))?;
    if delta != 0 {
        debug!("STP: relocated by {delta:#x}");
    }

    let mut builder = ModuleBuilder::new(TrackerFormat::SoundTrackerPro);
    builder.set_initial_tempo(header.tempo);
    {
        let info = builder.info_mut();
        info.program = PROGRAM.to_owned();
        if let Some(title) = &header.title {
            info.title = title.clone();
        }
    }

    let (positions, loop_position) = parse_positions(&view, &header)?;
    debug!("STP: {} positions, loop to {loop_position}", positions.len());
    builder.set_positions(positions, loop_position);

    parse_patterns(&view, &header, delta, &mut builder)?;

    for idx in builder.used_samples() {
        let offset = table_entry(&view, header.samples_offset, idx, MAX_SAMPLES, "sample", delta)?;
        debug!("STP: parse sample {idx} at {offset:#x}");
        builder.set_sample(idx, parse_sample(&view, offset)?);
    }
    for idx in builder.used_ornaments() {
        let offset =
            table_entry(&view, header.ornaments_offset, idx, MAX_ORNAMENTS, "ornament", delta)?;
        debug!("STP: parse ornament {idx} at {offset:#x}");
        builder.set_ornament(idx, parse_ornament(&view, offset)?);
    }
    builder.build()
}

fn parse_positions(view: &BinaryView<'_>, header: &Header) -> Result<(Vec<Position>, usize)> {
    let count = usize::from(view.read_u8(header.positions_offset)?);
    let loop_position = usize::from(view.read_u8(header.positions_offset + 1)?);
    let mut positions = Vec::with_capacity(count);
    for idx in 0..count {
        let entry = header.positions_offset + 2 + idx * POSITION_ENTRY_SIZE;
        let pattern_offset = usize::from(view.read_u8(entry)?);
        if pattern_offset % PATTERN_ENTRY_SIZE != 0 {
            return Err(TrackerError::malformed(
                entry,
                format!("pattern offset {pattern_offset} is not a table entry"),
            ));
        }
        positions.push(Position::transposed(
            pattern_offset / PATTERN_ENTRY_SIZE,
            view.read_i8(entry + 1)?,
        ));
    }
    Ok((positions, loop_position))
}

fn parse_patterns(
    view: &BinaryView<'_>,
    header: &Header,
    delta: usize,
    builder: &mut ModuleBuilder,
) -> Result<()> {
    let min_offset = header.size() + delta;
    let channels = builder.channels();
    let mut has_valid = false;
    for idx in builder.used_patterns() {
        let entry = header.patterns_offset + idx * PATTERN_ENTRY_SIZE;
        let mut offsets = Vec::with_capacity(channels);
        for chan in 0..channels {
            let offset = usize::from(view.read_u16_le(entry + chan * 2)?);
            if offset < min_offset {
                return Err(TrackerError::malformed(
                    entry,
                    format!("pattern {idx} channel {chan} data at invalid offset {offset:#x}"),
                ));
            }
            offsets.push(offset - delta);
        }
        debug!("STP: parse pattern {idx}");
        let lines =
            decode_pattern::<SoundTrackerProOpcodes>(view, &offsets, builder.start_pattern(idx))?;
        has_valid |= lines >= SoundTrackerProOpcodes::MIN_PATTERN_SIZE;
    }
    if has_valid {
        Ok(())
    } else {
        Err(TrackerError::malformed(header.patterns_offset, "no valid patterns"))
    }
}

/// Relocated object offset stored at `table[idx]`.
fn table_entry(
    view: &BinaryView<'_>,
    table: usize,
    idx: usize,
    count: usize,
    kind: &'static str,
    delta: usize,
) -> Result<usize> {
    if idx >= count {
        return Err(TrackerError::UnsupportedReference {
            kind,
            index: idx,
            available: count,
        });
    }
    let stored = view.read_u16_le(table + idx * 2)?;
    Ok(usize::from(stored.wrapping_sub(delta as u16)))
}

/// `size, loop` header shared by samples and ornaments.
///
/// A negative size means empty; a negative loop means no loop.
fn read_object_header(view: &BinaryView<'_>, offset: usize) -> Result<(usize, usize)> {
    let loop_start = view.read_i8(offset)?;
    let size = usize::try_from(view.read_i8(offset + 1)?).unwrap_or(0);
    let loop_start = usize::try_from(loop_start).unwrap_or(size);
    Ok((size, loop_start.min(size)))
}

/// `NxxTaaaa xxnnnnnE vvvvvvvv vvvvvvvv`: level `a`, noise `n`, masks
/// `N`/`T`/`E`, signed vibrato `v`.
fn parse_sample_line(raw: &[u8]) -> SampleLine {
    SampleLine {
        level: raw[0] & 0x0f,
        noise: (raw[1] & 0x3e) >> 1,
        tone_mask: raw[0] & 0x10 != 0,
        noise_mask: raw[0] & 0x80 != 0,
        envelope_mask: raw[1] & 0x01 != 0,
        vibrato: i16::from_le_bytes([raw[2], raw[3]]),
    }
}

fn parse_sample(view: &BinaryView<'_>, offset: usize) -> Result<Sample> {
    let (size, loop_start) = read_object_header(view, offset)?;
    let lines = (0..size)
        .map(|idx| {
            let line = offset + 2 + (idx % SAMPLE_WINDOW_LINES) * SAMPLE_LINE_SIZE;
            view.bytes(line, SAMPLE_LINE_SIZE).map(parse_sample_line)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Sample::new(loop_start, lines))
}

fn parse_ornament(view: &BinaryView<'_>, offset: usize) -> Result<Ornament> {
    let (size, loop_start) = read_object_header(view, offset)?;
    let offsets = view.bytes(offset + 2, size)?.iter().map(|&b| b as i8).collect();
    Ok(Ornament::new(loop_start, offsets))
}
