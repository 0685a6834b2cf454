//! ProTracker 1.x modules.
//!
//! Layout:
//!
//! ```text
//! 0x00  tempo, length, loop
//! 0x03  16 sample offsets (u16le)
//! 0x23  16 ornament offsets (u16le)
//! 0x43  patterns table offset (u16le)
//! 0x45  title, 30 bytes
//! 0x63  positions, 0xff terminated
//!       patterns table, 3 channel offsets per pattern
//!       pattern data, samples, ornaments
//! ```
//!
//! Samples are `size, loop` followed by 3-byte lines; ornaments are 64
//! signed halftone offsets walked in step with the sample. Like PT2, a
//! missing or cut off sample or ornament is replaced rather than rejected.

use log::{debug, warn};

use crate::binary::BinaryView;
use crate::decoder::{decode_pattern, DecodedEvent, OpcodeTable, Operand};
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Module, ModuleBuilder, Ornament, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Pro Tracker v1.x";
const ID: &str = "PT1";

const MIN_SIZE: usize = 0x70;
const MAX_SIZE: usize = 0x2800;
const MAX_POSITIONS: usize = 255;
const MAX_PATTERNS: usize = 32;
const MAX_SAMPLES: usize = 16;
const MAX_ORNAMENTS: usize = 16;

const SAMPLES_TABLE: usize = 0x03;
const ORNAMENTS_TABLE: usize = 0x23;
const PATTERNS_OFFSET: usize = 0x43;
const TITLE: usize = 0x45;
const TITLE_SIZE: usize = 30;
const POSITIONS: usize = 0x63;
const POSITIONS_END: u8 = 0xff;

const PATTERN_ENTRY_SIZE: usize = 6;
const SAMPLE_LINE_SIZE: usize = 3;
/// Ornament offsets stored per ornament.
const ORNAMENT_SIZE: usize = 64;

/// ProTracker 1 opcode table.
pub(crate) struct ProTracker1Opcodes;

impl OpcodeTable for ProTracker1Opcodes {
    const NAME: &'static str = ID;
    const PATTERN_END: u8 = 0xff;
    const MIN_PATTERN_SIZE: usize = 5;
    const MAX_PATTERN_SIZE: usize = 64;

    fn classify(byte: u8) -> DecodedEvent {
        match byte {
            0x00..=0x5f => DecodedEvent::Note(byte),
            0x60..=0x6f => DecodedEvent::Sample(usize::from(byte - 0x60)),
            0x70..=0x7f => DecodedEvent::Ornament {
                index: usize::from(byte - 0x70),
                envelope_off: false,
                reset_glissando: false,
            },
            0x80 => DecodedEvent::Rest,
            0x81 => DecodedEvent::EnvelopeOff,
            0x82..=0x8f => DecodedEvent::Envelope {
                shape: byte - 0x81,
                period: Operand::Word,
                reset_ornament: false,
                reset_glissando: false,
            },
            0x90 => DecodedEvent::EndOfCell,
            0x91..=0xa0 => DecodedEvent::InlineTempo(byte - 0x91),
            0xa1..=0xb0 => DecodedEvent::Volume(byte - 0xa1),
            0xb1..=0xff => DecodedEvent::RepeatPeriod(usize::from(byte - 0xb1)),
        }
    }
}

struct Header {
    tempo: u8,
    loop_position: usize,
    samples: [usize; MAX_SAMPLES],
    ornaments: [usize; MAX_ORNAMENTS],
    patterns_offset: usize,
    title: String,
    positions: Vec<usize>,
}

impl Header {
    fn read(view: &BinaryView<'_>) -> Result<Self> {
        let tempo = view.read_u8(0)?;
        if tempo < 2 {
            return Err(TrackerError::mismatch(ID, format!("tempo {tempo} too low")));
        }
        let length = usize::from(view.read_u8(1)?);
        let loop_position = usize::from(view.read_u8(2)?);
        let mut samples = [0; MAX_SAMPLES];
        for (idx, slot) in samples.iter_mut().enumerate() {
            *slot = usize::from(view.read_u16_le(SAMPLES_TABLE + idx * 2)?);
        }
        let mut ornaments = [0; MAX_ORNAMENTS];
        for (idx, slot) in ornaments.iter_mut().enumerate() {
            *slot = usize::from(view.read_u16_le(ORNAMENTS_TABLE + idx * 2)?);
        }
        let patterns_offset = usize::from(view.read_u16_le(PATTERNS_OFFSET)?);
        let title = view.read_text(TITLE, TITLE_SIZE)?;

        let mut positions = Vec::new();
        loop {
            let entry = view.read_u8(POSITIONS + positions.len())?;
            if entry == POSITIONS_END {
                break;
            }
            if usize::from(entry) >= MAX_PATTERNS || positions.len() == MAX_POSITIONS {
                return Err(TrackerError::mismatch(ID, "invalid positions list"));
            }
            positions.push(usize::from(entry));
        }
        if positions.is_empty() {
            return Err(TrackerError::mismatch(ID, "no positions"));
        }
        if length != positions.len() {
            debug!("PT1: header length {length}, {} positions listed", positions.len());
        }
        let header_size = POSITIONS + positions.len() + 1;
        if patterns_offset < header_size || patterns_offset >= view.len() {
            return Err(TrackerError::mismatch(
                ID,
                format!("patterns table at {patterns_offset:#x} out of range"),
            ));
        }
        Ok(Self {
            tempo,
            loop_position,
            samples,
            ornaments,
            patterns_offset,
            title,
            positions,
        })
    }
}

/// Decode a ProTracker 1 module.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    let header = Header::read(&view).map_err(|err| err.or_mismatch(ID))?;
    debug!(
        "PT1: {} positions, loop to {}, tempo {}",
        header.positions.len(),
        header.loop_position,
        header.tempo
    );

    let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker1);
    builder
        .set_initial_tempo(header.tempo)
        .set_positions(
            header.positions.iter().map(|&p| Position::new(p)).collect(),
            header.loop_position,
        );
    {
        let info = builder.info_mut();
        info.title = header.title.clone();
        info.program = PROGRAM.to_owned();
    }

    parse_patterns(&view, &header, &mut builder)?;
    parse_samples(&view, &header, &mut builder)?;
    parse_ornaments(&view, &header, &mut builder)?;
    builder.build()
}

fn parse_patterns(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let used = builder.used_patterns();
    let max_used = used.iter().next_back().copied().unwrap_or(0);
    let min_offset = header.patterns_offset + (max_used + 1) * PATTERN_ENTRY_SIZE;
    let channels = builder.channels();
    let mut has_valid = false;
    for idx in used {
        let entry = header.patterns_offset + idx * PATTERN_ENTRY_SIZE;
        let mut offsets = Vec::with_capacity(channels);
        for chan in 0..channels {
            let offset = usize::from(view.read_u16_le(entry + chan * 2)?);
            if offset < min_offset || offset >= view.len() {
                return Err(TrackerError::malformed(
                    entry,
                    format!("pattern {idx} channel {chan} data at invalid offset {offset:#x}"),
                ));
            }
            offsets.push(offset);
        }
        debug!("PT1: parse pattern {idx}");
        let lines = decode_pattern::<ProTracker1Opcodes>(view, &offsets, builder.start_pattern(idx))?;
        has_valid |= lines >= ProTracker1Opcodes::MIN_PATTERN_SIZE;
    }
    if has_valid {
        Ok(())
    } else {
        Err(TrackerError::malformed(header.patterns_offset, "no valid patterns"))
    }
}

/// `HHHHaaaa NTsnnnnn LLLLLLLL`: level `a`, noise `n`, masks `N`/`T`,
/// vibrato `HL` with sign `s`.
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

fn parse_samples(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let mut used = builder.used_samples();
    used.insert(0);
    for idx in used {
        let Some(&offset) = header.samples.get(idx) else {
            return Err(TrackerError::UnsupportedReference {
                kind: "sample",
                index: idx,
                available: MAX_SAMPLES,
            });
        };
        let sample = if offset == 0 || offset + 2 > view.len() {
            warn!("PT1: sample {idx} at {offset:#x} is absent, using stub");
            Sample::stub()
        } else {
            let size = usize::from(view.read_u8(offset)?);
            let loop_start = usize::from(view.read_u8(offset + 1)?);
            let parsed = size.min((view.len() - offset - 2) / SAMPLE_LINE_SIZE);
            if parsed < size {
                warn!("PT1: sample {idx} is truncated");
            }
            let mut lines = vec![SampleLine::SILENT; size];
            let raw = view.bytes(offset + 2, parsed * SAMPLE_LINE_SIZE)?;
            for (line, chunk) in lines.iter_mut().zip(raw.chunks_exact(SAMPLE_LINE_SIZE)) {
                *line = parse_sample_line(chunk);
            }
            Sample::new(loop_start, lines)
        };
        builder.set_sample(idx, sample);
    }
    Ok(())
}

fn parse_ornaments(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let mut used = builder.used_ornaments();
    used.insert(0);
    for idx in used {
        let Some(&offset) = header.ornaments.get(idx) else {
            return Err(TrackerError::UnsupportedReference {
                kind: "ornament",
                index: idx,
                available: MAX_ORNAMENTS,
            });
        };
        let ornament = if offset == 0 || offset >= view.len() {
            debug!("PT1: ornament {idx} is absent, using stub");
            Ornament::stub()
        } else {
            let parsed = ORNAMENT_SIZE.min(view.len() - offset);
            if parsed < ORNAMENT_SIZE {
                warn!("PT1: ornament {idx} is truncated");
            }
            let mut offsets = vec![0i8; ORNAMENT_SIZE];
            for (value, &byte) in offsets.iter_mut().zip(view.bytes(offset, parsed)?) {
                *value = byte as i8;
            }
            Ornament::new(0, offsets)
        };
        builder.set_ornament(idx, ornament);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_ranges() {
        assert_eq!(ProTracker1Opcodes::classify(0x0c), DecodedEvent::Note(12));
        assert_eq!(ProTracker1Opcodes::classify(0x62), DecodedEvent::Sample(2));
        assert_eq!(ProTracker1Opcodes::classify(0x93), DecodedEvent::InlineTempo(2));
        assert_eq!(ProTracker1Opcodes::classify(0xad), DecodedEvent::Volume(12));
        assert_eq!(ProTracker1Opcodes::classify(0xb4), DecodedEvent::RepeatPeriod(3));
        assert_eq!(
            ProTracker1Opcodes::classify(0x8f),
            DecodedEvent::Envelope {
                shape: 14,
                period: Operand::Word,
                reset_ornament: false,
                reset_glissando: false
            }
        );
    }

    #[test]
    fn sample_line_bits() {
        let line = parse_sample_line(&[0x2b, 0x20 | 0x07, 0x10]);
        assert_eq!(line.level, 11);
        assert_eq!(line.noise, 7);
        assert_eq!(line.vibrato, 0x210);
        assert!(!line.tone_mask);
        assert!(!line.noise_mask);

        let line = parse_sample_line(&[0x00, 0xc0, 0x01]);
        assert!(line.tone_mask);
        assert!(line.noise_mask);
        assert_eq!(line.vibrato, -1);
    }

    #[test]
    fn inline_tempo_lands_on_the_line() {
        let data = [0x92, 0x0c, 0xff, 0x90, 0x90];
        let mut pattern = crate::model::Pattern::default();
        decode_pattern::<ProTracker1Opcodes>(&BinaryView::new(&data), &[0, 3, 4], &mut pattern)
            .unwrap();
        let line = pattern.line(0).unwrap();
        assert_eq!(line.tempo, Some(1));
        assert_eq!(line.cells[0].note, Some(12));
        assert_eq!(pattern.size, 5);
    }

    #[test]
    fn short_input_is_not_pt1() {
        let err = decode(&[6u8; 50]).unwrap_err();
        assert!(matches!(err, TrackerError::FormatMismatch { format: "PT1", .. }));
    }
}
