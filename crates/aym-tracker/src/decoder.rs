//! Generic pattern bytecode decoder.
//!
//! Every tracked format stores a pattern as one opcode stream per channel,
//! compressed with a per-channel "repeat period": after a cell is decoded the
//! channel stays silent (inherits its state) for `period` rows. The control
//! flow is identical for all formats, only the opcode meaning differs, so it
//! lives here once and formats plug in an [`OpcodeTable`].

use log::trace;

use crate::binary::BinaryView;
use crate::error::{Result, TrackerError};
use crate::model::{Cell, Command, Pattern};

/// Size of an inline operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    /// One byte.
    Byte,
    /// Little-endian word.
    Word,
    /// No operand; the period is zero.
    Absent,
}

/// Meaning of one opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodedEvent {
    /// No effect.
    Nop,
    /// Note on; ends the cell.
    Note(u8),
    /// Channel off; ends the cell.
    Rest,
    /// Ends the cell without a note.
    EndOfCell,
    /// Select a sample.
    Sample(usize),
    /// Select an ornament, optionally switching the envelope off first.
    Ornament {
        /// Ornament index.
        index: usize,
        /// Also disarm the envelope.
        envelope_off: bool,
        /// Also stop the glissando.
        reset_glissando: bool,
    },
    /// Set channel volume.
    Volume(u8),
    /// Rows to skip after each decoded cell of this channel.
    RepeatPeriod(usize),
    /// Disarm the envelope.
    EnvelopeOff,
    /// Arm the envelope with `shape`; the period follows as an operand.
    Envelope {
        /// Envelope shape.
        shape: u8,
        /// Operand width of the period.
        period: Operand,
        /// Also select ornament 0.
        reset_ornament: bool,
        /// Also stop the glissando.
        reset_glissando: bool,
    },
    /// Line tempo; byte operand.
    Tempo,
    /// Line tempo encoded in the opcode.
    InlineTempo(u8),
    /// Fixed glissando; signed byte operand.
    Glissando,
    /// Glissando towards a note; signed byte step and word limit operands.
    GlissandoToNote,
    /// Stop the glissando.
    GlissandoOff,
    /// Noise base; signed byte operand.
    NoiseBase,
}

/// Per-format opcode vocabulary.
pub trait OpcodeTable {
    /// Format identifier used in diagnostics.
    const NAME: &'static str;
    /// Byte marking the end of the pattern in channel 0.
    const PATTERN_END: u8;
    /// Patterns shorter than this are padded.
    const MIN_PATTERN_SIZE: usize;
    /// Longest pattern allowed.
    const MAX_PATTERN_SIZE: usize;

    /// Classify one opcode byte.
    fn classify(byte: u8) -> DecodedEvent;
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelCursor {
    offset: usize,
    period: usize,
    counter: usize,
}

/// Decode state of one pattern; dropped when the pattern is done.
#[derive(Debug)]
struct PatternDecodeContext {
    cursors: Vec<ChannelCursor>,
}

impl PatternDecodeContext {
    fn new(offsets: &[usize]) -> Self {
        Self {
            cursors: offsets
                .iter()
                .map(|&offset| ChannelCursor {
                    offset,
                    ..ChannelCursor::default()
                })
                .collect(),
        }
    }

    fn min_counter(&self) -> usize {
        self.cursors.iter().map(|c| c.counter).min().unwrap_or(0)
    }

    fn skip(&mut self, lines: usize) {
        for cursor in &mut self.cursors {
            cursor.counter -= lines;
        }
    }

    /// Whether another line is coded.
    ///
    /// Channel 0 carries the end marker. A channel due to decode a cell with
    /// no data left means the channel streams disagree on the pattern length.
    fn has_line<T: OpcodeTable>(&self, view: &BinaryView<'_>) -> Result<bool> {
        for (chan, cursor) in self.cursors.iter().enumerate() {
            if cursor.counter != 0 {
                continue;
            }
            match view.peek_u8(cursor.offset) {
                Some(byte) if chan == 0 && byte == T::PATTERN_END => return Ok(false),
                Some(_) => {}
                None if chan == 0 => {
                    return Err(TrackerError::malformed(
                        view.base() + cursor.offset,
                        "pattern data runs past end of module",
                    ))
                }
                None => {
                    return Err(TrackerError::malformed(
                        view.base() + cursor.offset,
                        format!("channel {chan} ends before channel 0"),
                    ))
                }
            }
        }
        Ok(true)
    }
}

/// Decode a pattern whose channel streams start at `offsets`.
///
/// Fills `pattern` with the decoded lines, sets its size and returns the
/// number of rows actually coded. Fails with malformed data on truncated
/// streams, misaligned channels or patterns longer than the format allows.
pub fn decode_pattern<T: OpcodeTable>(
    view: &BinaryView<'_>,
    offsets: &[usize],
    pattern: &mut Pattern,
) -> Result<usize> {
    let channels = offsets.len();
    if channels == 0 {
        return Err(TrackerError::malformed(view.base(), "pattern without channels"));
    }
    let mut ctx = PatternDecodeContext::new(offsets);
    let mut line_idx = 0;
    loop {
        let skip = ctx.min_counter();
        if skip != 0 {
            ctx.skip(skip);
            line_idx += skip;
        }
        if !ctx.has_line::<T>(view)? {
            break;
        }
        if line_idx >= T::MAX_PATTERN_SIZE {
            return Err(TrackerError::malformed(
                view.base() + offsets[0],
                format!("pattern longer than {} lines", T::MAX_PATTERN_SIZE),
            ));
        }
        let line = pattern.line_mut(line_idx, channels);
        for (chan, cursor) in ctx.cursors.iter_mut().enumerate() {
            if cursor.counter != 0 {
                cursor.counter -= 1;
                continue;
            }
            if let Some(tempo) = decode_cell::<T>(view, cursor, &mut line.cells[chan])? {
                line.tempo = Some(tempo);
            }
            cursor.counter = cursor.period;
        }
        line_idx += 1;
    }
    pattern.size = line_idx.min(T::MAX_PATTERN_SIZE).max(T::MIN_PATTERN_SIZE);
    trace!(
        "{} pattern: {} coded lines, size {}",
        T::NAME,
        pattern.lines().count(),
        pattern.size
    );
    Ok(line_idx)
}

/// Decode one cell; returns the tempo override if the cell carried one.
fn decode_cell<T: OpcodeTable>(
    view: &BinaryView<'_>,
    cursor: &mut ChannelCursor,
    cell: &mut Cell,
) -> Result<Option<u8>> {
    let mut tempo = None;
    loop {
        let byte = view.read_u8(cursor.offset)?;
        cursor.offset += 1;
        match T::classify(byte) {
            DecodedEvent::Nop => {}
            DecodedEvent::Note(note) => {
                cell.enabled = Some(true);
                match cell.find_command_mut(|cmd| matches!(cmd, Command::GlissandoToNote { .. })) {
                    Some(Command::GlissandoToNote { target, .. }) => *target = u16::from(note),
                    _ => cell.note = Some(note),
                }
                break;
            }
            DecodedEvent::Rest => {
                cell.enabled = Some(false);
                break;
            }
            DecodedEvent::EndOfCell => break,
            DecodedEvent::Sample(index) => cell.sample = Some(index),
            DecodedEvent::Ornament {
                index,
                envelope_off,
                reset_glissando,
            } => {
                if envelope_off {
                    cell.commands.push(Command::NoEnvelope);
                }
                if reset_glissando {
                    cell.commands.push(Command::Glissando(0));
                }
                cell.ornament = Some(index);
            }
            DecodedEvent::Volume(volume) => cell.volume = Some(volume),
            DecodedEvent::RepeatPeriod(period) => cursor.period = period,
            DecodedEvent::EnvelopeOff => cell.commands.push(Command::NoEnvelope),
            DecodedEvent::Envelope {
                shape,
                period,
                reset_ornament,
                reset_glissando,
            } => {
                if reset_ornament {
                    cell.ornament = Some(0);
                }
                let period = read_operand(view, cursor, period)?;
                cell.commands.push(Command::Envelope { shape, period });
                if reset_glissando {
                    cell.commands.push(Command::Glissando(0));
                }
            }
            DecodedEvent::Tempo => {
                tempo = Some(view.read_u8(cursor.offset)?);
                cursor.offset += 1;
            }
            DecodedEvent::InlineTempo(value) => tempo = Some(value),
            DecodedEvent::Glissando => {
                let delta = view.read_i8(cursor.offset)?;
                cursor.offset += 1;
                cell.commands.push(Command::Glissando(i16::from(delta)));
            }
            DecodedEvent::GlissandoToNote => {
                let delta = view.read_i8(cursor.offset)?;
                let limit = view.read_u16_le(cursor.offset + 1)?;
                cursor.offset += 3;
                cell.commands.push(Command::GlissandoToNote {
                    delta: i16::from(delta),
                    target: limit,
                });
            }
            DecodedEvent::GlissandoOff => cell.commands.push(Command::NoGlissando),
            DecodedEvent::NoiseBase => {
                let base = view.read_i8(cursor.offset)?;
                cursor.offset += 1;
                cell.commands.push(Command::NoiseBase(base));
            }
        }
    }
    Ok(tempo)
}

fn read_operand(view: &BinaryView<'_>, cursor: &mut ChannelCursor, operand: Operand) -> Result<u16> {
    match operand {
        Operand::Byte => {
            let value = view.read_u8(cursor.offset)?;
            cursor.offset += 1;
            Ok(u16::from(value))
        }
        Operand::Word => {
            let value = view.read_u16_le(cursor.offset)?;
            cursor.offset += 2;
            Ok(value)
        }
        Operand::Absent => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::protracker2::ProTracker2Opcodes;
    use crate::formats::soundtracker::SoundTrackerOpcodes;

    fn decode<T: OpcodeTable>(data: &[u8], offsets: &[usize]) -> Result<Pattern> {
        let mut pattern = Pattern::default();
        decode_pattern::<T>(&BinaryView::new(data), offsets, &mut pattern)?;
        Ok(pattern)
    }

    #[test]
    fn repeat_period_leaves_inheriting_rows() {
        // channel 0: skip 2, note, then 3 more notes; channels 1/2: skip 63, rest
        let data = [
            0x22, 0x90, 0x91, 0x92, 0x00, // ch0 @0
            0x5f, 0xe0, // ch1 @5
            0x5f, 0xe0, // ch2 @7
        ];
        let pattern = decode::<ProTracker2Opcodes>(&data, &[0, 5, 7]).unwrap();
        assert_eq!(pattern.size, 9);
        let coded: Vec<usize> = pattern.lines().map(|(idx, _)| idx).collect();
        assert_eq!(coded, vec![0, 3, 6]);
        assert_eq!(pattern.line(0).unwrap().cells[0].note, Some(0x10));
        assert_eq!(pattern.line(3).unwrap().cells[0].note, Some(0x11));
        assert!(pattern.line(3).unwrap().cells[1].is_empty());
        assert_eq!(pattern.line(0).unwrap().cells[1].enabled, Some(false));
    }

    #[test]
    fn short_patterns_are_padded() {
        let data = [0x90, 0x00, 0x70, 0x70];
        let pattern = decode::<ProTracker2Opcodes>(&data, &[0, 2, 3]).unwrap();
        assert_eq!(pattern.size, 5);
        assert_eq!(pattern.lines().count(), 1);
    }

    #[test]
    fn glissando_target_comes_from_following_note() {
        let data = [0x0d, 0x02, 0x34, 0x12, 0x8a, 0x00, 0x81, 0x81];
        let pattern = decode::<ProTracker2Opcodes>(&data, &[0, 6, 7]).unwrap();
        let cell = &pattern.line(0).unwrap().cells[0];
        assert_eq!(cell.note, None);
        assert_eq!(cell.enabled, Some(true));
        assert_eq!(
            cell.commands,
            vec![Command::GlissandoToNote { delta: 2, target: 10 }]
        );
    }

    #[test]
    fn tempo_override_lands_on_the_line() {
        let data = [0x0f, 0x03, 0x70, 0x00, 0x70, 0x70];
        let pattern = decode::<ProTracker2Opcodes>(&data, &[0, 4, 5]).unwrap();
        assert_eq!(pattern.line(0).unwrap().tempo, Some(3));
    }

    #[test]
    fn truncated_operand_is_malformed() {
        let data = [0x71, 0x34];
        let err = decode::<ProTracker2Opcodes>(&data, &[0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn channel_running_out_first_is_rejected() {
        // channel 1 points at the last byte, so its second cell has no data
        let data = [0x10, 0x11, 0xff, 0x81];
        let err = decode::<SoundTrackerOpcodes>(&data, &[0, 3, 3]).unwrap_err();
        assert!(err.to_string().contains("channel 1"));
    }

    #[test]
    fn overlong_pattern_is_rejected() {
        let mut data = vec![0x81u8; 70];
        data.push(0xff);
        let err = decode::<SoundTrackerOpcodes>(&data, &[0, 0, 0]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn pattern_without_channels_is_malformed() {
        let data = [0x10, 0xff];
        let err = decode::<SoundTrackerOpcodes>(&data, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedData);
    }

    #[test]
    fn soundtracker_envelope_selects_ornament_zero() {
        let data = [0x8e, 0x20, 0x0c, 0xff, 0x81];
        let pattern = decode::<SoundTrackerOpcodes>(&data, &[0, 4, 4]).unwrap();
        let cell = &pattern.line(0).unwrap().cells[0];
        assert_eq!(cell.ornament, Some(0));
        assert_eq!(cell.note, Some(0x0c));
        assert_eq!(
            cell.commands,
            vec![Command::Envelope { shape: 14, period: 0x20 }]
        );
    }
}
