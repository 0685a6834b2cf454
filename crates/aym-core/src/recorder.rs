//! Register-recording device
//!
//! Tracks register contents and produces silence. Optionally keeps the most
//! recent chunks for register dumps, analysis tools and tests; the log is
//! bounded so a looping track can play indefinitely.

use std::collections::VecDeque;

use crate::chunk::RegisterChunk;
use crate::device::{ChipDevice, ChipState, DeviceError};
use crate::registers::{RegisterBank, REGISTER_COUNT};

/// Number of registers per frame in a flat register dump (R0-R13).
pub const DUMP_FRAME_SIZE: usize = 14;

/// One logged chunk with the register bank it left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedFrame {
    /// Chunk as received.
    pub chunk: RegisterChunk,
    /// Full register bank after applying the chunk.
    pub registers: [u8; REGISTER_COUNT],
}

/// Silent device recording the register stream.
#[derive(Debug, Clone)]
pub struct RegisterRecorder {
    sample_rate: u32,
    bank: RegisterBank,
    rendered_till: u64,
    received: u64,
    history: VecDeque<RecordedFrame>,
    history_limit: usize,
}

impl RegisterRecorder {
    /// Create a recorder producing silence at `sample_rate`.
    ///
    /// Only the current register state is kept; see [`Self::with_history`].
    pub fn new(sample_rate: u32) -> Result<Self, DeviceError> {
        Self::with_history(sample_rate, 0)
    }

    /// Recorder that also logs the last `limit` chunks.
    ///
    /// Older entries are dropped once the log is full.
    pub fn with_history(sample_rate: u32, limit: usize) -> Result<Self, DeviceError> {
        if sample_rate == 0 {
            return Err(DeviceError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            bank: RegisterBank::new(),
            rendered_till: 0,
            received: 0,
            history: VecDeque::with_capacity(limit.min(4096)),
            history_limit: limit,
        })
    }

    /// Maximum number of logged chunks.
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Logged chunks with their register banks, oldest first.
    pub fn history(&self) -> &VecDeque<RecordedFrame> {
        &self.history
    }

    /// Logged chunks, oldest first.
    pub fn chunks(&self) -> impl ExactSizeIterator<Item = &RegisterChunk> + '_ {
        self.history.iter().map(|frame| &frame.chunk)
    }

    /// Flat R0-R13 dump of the logged frames, one after another.
    ///
    /// R13 is 0xff in frames where the envelope shape was not written, the
    /// usual convention for "do not retrigger".
    pub fn register_dump(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.history.len() * DUMP_FRAME_SIZE);
        for frame in &self.history {
            out.extend_from_slice(&frame.registers[..DUMP_FRAME_SIZE - 1]);
            out.push(frame.chunk.get(crate::Register::EnvelopeShape).unwrap_or(0xff));
        }
        out
    }

    fn samples_at(&self, timestamp: u64) -> u64 {
        timestamp * self.sample_rate as u64 / 1_000_000
    }
}

impl ChipDevice for RegisterRecorder {
    fn reset(&mut self) {
        self.bank = RegisterBank::new();
        self.rendered_till = 0;
        self.received = 0;
        self.history.clear();
    }

    fn render_data(&mut self, chunk: &RegisterChunk) {
        chunk.apply_to(&mut self.bank);
        self.received += 1;
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(RecordedFrame {
            chunk: *chunk,
            registers: *self.bank.as_array(),
        });
    }

    fn render_till(&mut self, end: u64) -> Vec<f32> {
        if end <= self.rendered_till {
            return Vec::new();
        }
        let count = self.samples_at(end) - self.samples_at(self.rendered_till);
        self.rendered_till = end;
        vec![0.0; count as usize]
    }

    fn state(&self) -> ChipState {
        ChipState {
            registers: self.bank,
            rendered_till: self.rendered_till,
            chunks: self.received,
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Register;

    #[test]
    fn zero_sample_rate_is_rejected() {
        assert_eq!(
            RegisterRecorder::new(0).unwrap_err(),
            DeviceError::InvalidSampleRate(0)
        );
    }

    #[test]
    fn sample_count_does_not_drift() {
        let mut rec = RegisterRecorder::new(44_100).unwrap();
        let mut total = 0;
        for frame in 1..=50u64 {
            total += rec.render_till(frame * 20_000).len();
        }
        assert_eq!(total, 44_100);
        assert!(rec.render_till(500_000).is_empty());
    }

    #[test]
    fn registers_persist_between_chunks() {
        let mut rec = RegisterRecorder::with_history(48_000, 16).unwrap();
        let mut first = RegisterChunk::new(0);
        first.set_tone(2, 0x0ef);
        first.set_envelope_shape(0x0a);
        rec.render_data(&first);

        let mut second = RegisterChunk::new(20_000);
        second.set_level(2, 9);
        rec.render_data(&second);

        let state = rec.state();
        assert_eq!(state.registers.tone(2), 0x0ef);
        assert_eq!(state.levels(), [0, 0, 9]);
        assert_eq!(state.chunks, 2);

        let dump = rec.register_dump();
        assert_eq!(dump.len(), 2 * DUMP_FRAME_SIZE);
        assert_eq!(dump[Register::EnvelopeShape as usize], 0x0a);
        assert_eq!(dump[DUMP_FRAME_SIZE + Register::EnvelopeShape as usize], 0xff);
    }

    #[test]
    fn reset_forgets_history() {
        let mut rec = RegisterRecorder::with_history(44_100, 4).unwrap();
        rec.render_data(&RegisterChunk::new(0));
        rec.render_till(20_000);
        rec.reset();
        assert!(rec.history().is_empty());
        assert_eq!(rec.state(), ChipState::default());
    }

    #[test]
    fn history_is_bounded() {
        let mut rec = RegisterRecorder::with_history(44_100, 3).unwrap();
        for frame in 0..10u64 {
            let mut chunk = RegisterChunk::new(frame * 20_000);
            chunk.set_level(0, frame as u8);
            rec.render_data(&chunk);
        }
        assert_eq!(rec.history().len(), 3);
        let stamps: Vec<u64> = rec.chunks().map(|c| c.timestamp).collect();
        assert_eq!(stamps, vec![140_000, 160_000, 180_000]);
        assert_eq!(rec.state().chunks, 10);
        assert_eq!(rec.state().levels()[0], 9);
    }

    #[test]
    fn default_recorder_keeps_only_registers() {
        let mut rec = RegisterRecorder::new(44_100).unwrap();
        for frame in 0..1000u64 {
            let mut chunk = RegisterChunk::new(frame * 20_000);
            chunk.set_tone(1, 0x123);
            rec.render_data(&chunk);
        }
        assert_eq!(rec.history_limit(), 0);
        assert_eq!(rec.chunks().len(), 0);
        assert!(rec.register_dump().is_empty());
        assert_eq!(rec.state().registers.tone(1), 0x123);
        assert_eq!(rec.state().chunks, 1000);
    }
}
