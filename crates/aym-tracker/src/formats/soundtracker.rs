//! Pieces shared by the Sound Tracker family.

use crate::decoder::{DecodedEvent, OpcodeTable, Operand};
use crate::model::{Sample, SampleLine};

/// Lines per sample.
pub(crate) const SAMPLE_SIZE: usize = 32;
/// Steps per ornament.
pub(crate) const ORNAMENT_SIZE: usize = 32;
pub(crate) const MAX_PATTERNS: usize = 32;
pub(crate) const MAX_SAMPLES: usize = 16;
pub(crate) const MAX_ORNAMENTS: usize = 16;
/// Marker preceding the title in modules saved by the KSA compilers.
pub(crate) const COMPILATION_SIGNATURE: &[u8] = b"KSA SOFTWARE COMPILATION OF ";

/// Sound Tracker opcode table.
pub(crate) struct SoundTrackerOpcodes;

impl OpcodeTable for SoundTrackerOpcodes {
    const NAME: &'static str = "ST";
    const PATTERN_END: u8 = 0xff;
    const MIN_PATTERN_SIZE: usize = 5;
    const MAX_PATTERN_SIZE: usize = 64;

    fn classify(byte: u8) -> DecodedEvent {
        match byte {
            0x00..=0x5f => DecodedEvent::Note(byte),
            0x60..=0x6f => DecodedEvent::Sample(usize::from(byte - 0x60)),
            0x70..=0x7f => DecodedEvent::Ornament {
                index: usize::from(byte - 0x70),
                envelope_off: true,
                reset_glissando: false,
            },
            0x80 => DecodedEvent::Rest,
            0x81 => DecodedEvent::EndOfCell,
            0x82 => DecodedEvent::Ornament {
                index: 0,
                envelope_off: true,
                reset_glissando: false,
            },
            0x83..=0x8e => DecodedEvent::Envelope {
                shape: byte - 0x80,
                period: Operand::Byte,
                reset_ornament: true,
                reset_glissando: false,
            },
            _ => DecodedEvent::RepeatPeriod(usize::from(byte.wrapping_sub(0xa1))),
        }
    }
}

/// Sample with an explicit loop region, clamped to [`SAMPLE_SIZE`].
pub(crate) fn looped_sample(lines: Vec<SampleLine>, loop_start: usize, loop_limit: usize) -> Sample {
    Sample {
        loop_start: loop_start.min(SAMPLE_SIZE),
        loop_limit: loop_limit.min(SAMPLE_SIZE),
        lines,
    }
}
