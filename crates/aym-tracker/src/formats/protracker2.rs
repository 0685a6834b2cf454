//! ProTracker 2.x modules.
//!
//! Layout:
//!
//! ```text
//! 0x00  tempo, length, loop
//! 0x03  32 sample offsets (u16le)
//! 0x43  16 ornament offsets (u16le)
//! 0x63  patterns table offset (u16le)
//! 0x65  title, 30 bytes
//! 0x83  positions, 0xff terminated
//!       patterns table, 3 channel offsets per pattern
//!       pattern data, samples, ornaments
//! ```
//!
//! Decoding is tolerant: samples and ornaments that are missing or cut off
//! by the end of the file are replaced with whatever data is available.

use log::{debug, warn};

use crate::binary::BinaryView;
use crate::decoder::{decode_pattern, DecodedEvent, OpcodeTable, Operand};
use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::{Module, ModuleBuilder, Ornament, Position, Sample, SampleLine};

pub(crate) const PROGRAM: &str = "Pro Tracker v2.x";
const ID: &str = "PT2";

const MIN_SIZE: usize = 100;
const MAX_SIZE: usize = 0x3800;
const MAX_POSITIONS: usize = 255;
const MAX_PATTERNS: usize = 32;
const MAX_SAMPLES: usize = 32;
const MAX_ORNAMENTS: usize = 16;

const SAMPLES_TABLE: usize = 0x03;
const ORNAMENTS_TABLE: usize = 0x43;
const PATTERNS_OFFSET: usize = 0x63;
const TITLE: usize = 0x65;
const TITLE_SIZE: usize = 30;
const POSITIONS: usize = 0x83;
const POSITIONS_END: u8 = 0xff;

const PATTERN_ENTRY_SIZE: usize = 6;
const SAMPLE_LINE_SIZE: usize = 3;
/// Sample lines are addressed with 8-bit offsets.
const SAMPLE_WINDOW: usize = 256;

/// Sample selected before any sample opcode.
pub(crate) const DEFAULT_SAMPLE: usize = 1;
/// Ornament selected before any ornament opcode.
pub(crate) const DEFAULT_ORNAMENT: usize = 0;

/// ProTracker 2 opcode table.
pub(crate) struct ProTracker2Opcodes;

impl OpcodeTable for ProTracker2Opcodes {
    const NAME: &'static str = ID;
    const PATTERN_END: u8 = 0x00;
    const MIN_PATTERN_SIZE: usize = 5;
    const MAX_PATTERN_SIZE: usize = 64;

    fn classify(byte: u8) -> DecodedEvent {
        match byte {
            0x00 => DecodedEvent::Nop,
            0x01..=0x0b => DecodedEvent::NoiseBase,
            0x0c => DecodedEvent::GlissandoOff,
            0x0d => DecodedEvent::GlissandoToNote,
            0x0e => DecodedEvent::Glissando,
            0x0f => DecodedEvent::Tempo,
            0x10..=0x1f => DecodedEvent::Volume(byte - 0x10),
            0x20..=0x5f => DecodedEvent::RepeatPeriod(usize::from(byte - 0x20)),
            0x60..=0x6f => DecodedEvent::Ornament {
                index: usize::from(byte - 0x60),
                envelope_off: false,
                reset_glissando: false,
            },
            0x70 => DecodedEvent::EndOfCell,
            0x71..=0x7e => DecodedEvent::Envelope {
                shape: byte - 0x70,
                period: Operand::Word,
                reset_ornament: false,
                reset_glissando: false,
            },
            0x7f => DecodedEvent::EnvelopeOff,
            0x80..=0xdf => DecodedEvent::Note(byte - 0x80),
            0xe0 => DecodedEvent::Rest,
            0xe1..=0xff => DecodedEvent::Sample(usize::from(byte - 0xe0)),
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
        let header_size = POSITIONS + positions.len() + 1;
        if patterns_offset != header_size {
            return Err(TrackerError::mismatch(
                ID,
                format!("patterns table at {patterns_offset:#x}, header ends at {header_size:#x}"),
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

/// Decode a ProTracker 2 module.
pub(crate) fn decode(data: &[u8]) -> Result<Module> {
    let view = BinaryView::new(data).truncated(MAX_SIZE);
    if view.len() < MIN_SIZE {
        return Err(TrackerError::mismatch(ID, "too short"));
    }
    let header = Header::read(&view).map_err(|err| err.or_mismatch(ID))?;
    debug!(
        "PT2: {} positions, loop to {}, tempo {}",
        header.positions.len(),
        header.loop_position,
        header.tempo
    );

    let mut builder = ModuleBuilder::new(TrackerFormat::ProTracker2);
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
    let min_offset = header.patterns_offset + max_used * PATTERN_ENTRY_SIZE;
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
        debug!("PT2: parse pattern {idx}");
        let lines = decode_pattern::<ProTracker2Opcodes>(view, &offsets, builder.start_pattern(idx))?;
        has_valid |= lines >= ProTracker2Opcodes::MIN_PATTERN_SIZE;
    }
    if has_valid {
        Ok(())
    } else {
        Err(TrackerError::malformed(header.patterns_offset, "no valid patterns"))
    }
}

fn parse_sample_line(raw: &[u8]) -> SampleLine {
    let magnitude = (i16::from(raw[1] & 0x0f) << 8) | i16::from(raw[2]);
    SampleLine {
        level: raw[1] >> 4,
        noise: raw[0] >> 3,
        tone_mask: raw[0] & 0x02 != 0,
        noise_mask: raw[0] & 0x01 != 0,
        envelope_mask: false,
        vibrato: if raw[0] & 0x04 != 0 { magnitude } else { -magnitude },
    }
}

/// Sample line `line_idx` of the data starting at `base`.
///
/// The player addresses sample bytes with an 8-bit cursor, so each byte
/// wraps inside the 256-byte window on its own; line 85 reads bytes 255, 0, 1.
fn read_sample_line(view: &BinaryView<'_>, base: usize, line_idx: usize) -> Result<SampleLine> {
    let mut raw = [0u8; SAMPLE_LINE_SIZE];
    for (pos, byte) in raw.iter_mut().enumerate() {
        let cursor = (line_idx * SAMPLE_LINE_SIZE + pos) as u8;
        *byte = view.read_u8(base + usize::from(cursor))?;
    }
    Ok(parse_sample_line(&raw))
}

fn parse_samples(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let mut used = builder.used_samples();
    used.insert(DEFAULT_SAMPLE);
    let mut has_data = false;
    for idx in used {
        let offset = header.samples[idx];
        let sample = if offset == 0 {
            debug!("PT2: sample {idx} has no offset, using file start");
            Sample::new(0, vec![parse_sample_line(view.bytes(0, SAMPLE_LINE_SIZE)?)])
        } else if offset + 2 > view.len() {
            warn!("PT2: sample {idx} at {offset:#x} is past the end, using stub");
            Sample::stub()
        } else {
            let size = usize::from(view.read_u8(offset)?);
            let loop_start = usize::from(view.read_u8(offset + 1)?);
            let available = view.len() - offset;
            let used_size = 2 + (size * SAMPLE_LINE_SIZE).min(SAMPLE_WINDOW);
            let parsed = if used_size <= available {
                size
            } else {
                warn!("PT2: sample {idx} is truncated");
                (available - 2) / SAMPLE_LINE_SIZE
            };
            let mut lines = vec![SampleLine::SILENT; size];
            for (line_idx, line) in lines.iter_mut().take(parsed).enumerate() {
                *line = read_sample_line(view, offset + 2, line_idx)?;
            }
            has_data = true;
            Sample::new(loop_start, lines)
        };
        builder.set_sample(idx, sample);
    }
    if has_data {
        Ok(())
    } else {
        Err(TrackerError::malformed(SAMPLES_TABLE, "no valid samples"))
    }
}

fn parse_ornaments(view: &BinaryView<'_>, header: &Header, builder: &mut ModuleBuilder) -> Result<()> {
    let mut used = builder.used_ornaments();
    used.insert(DEFAULT_ORNAMENT);
    for idx in used {
        let offset = header.ornaments[idx];
        let ornament = if offset == 0 {
            debug!("PT2: ornament {idx} has no offset, using file start");
            Ornament::new(0, vec![view.read_i8(0)?])
        } else if offset + 2 > view.len() {
            warn!("PT2: ornament {idx} at {offset:#x} is past the end, using stub");
            Ornament::stub()
        } else {
            let size = usize::from(view.read_u8(offset)?);
            let loop_start = usize::from(view.read_u8(offset + 1)?);
            let parsed = size.min(view.len() - offset - 2);
            if parsed < size {
                warn!("PT2: ornament {idx} is truncated");
            }
            let mut offsets = vec![0i8; size];
            for (line_idx, value) in offsets.iter_mut().take(parsed).enumerate() {
                *value = view.read_i8(offset + 2 + line_idx)?;
            }
            Ornament::new(loop_start, offsets)
        };
        builder.set_ornament(idx, ornament);
    }
    Ok(())
}
