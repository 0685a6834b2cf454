//! Render parameters.

use aym_common::util::frame_duration_us;
use aym_common::{DEFAULT_SAMPLE_RATE, FRAME_RATE_PAL, ZX_SPECTRUM_CLOCK};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::scheduler::LoopMode;

/// Playback configuration.
///
/// Missing fields in JSON input take their defaults: 50 Hz frames, normal
/// looping, 44.1 kHz output, ZX Spectrum chip clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderParams {
    /// Frames per second.
    pub frame_rate: u32,
    /// Behaviour at the end of the play order.
    pub loop_mode: LoopMode,
    /// Output sample rate of the chip device.
    pub sample_rate: u32,
    /// Chip clock in Hz.
    pub clock_rate: u32,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            frame_rate: FRAME_RATE_PAL,
            loop_mode: LoopMode::Normal,
            sample_rate: DEFAULT_SAMPLE_RATE,
            clock_rate: ZX_SPECTRUM_CLOCK,
        }
    }
}

impl RenderParams {
    /// Parse and validate parameters from JSON.
    pub fn from_json(text: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(text)?;
        params.validate()?;
        Ok(params)
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.frame_rate == 0 || self.frame_rate > 1000 {
            return Err(TrackerError::Config(format!(
                "frame rate {} out of range 1..=1000",
                self.frame_rate
            )));
        }
        if self.sample_rate == 0 {
            return Err(TrackerError::Config("sample rate must be positive".into()));
        }
        if self.clock_rate < self.frame_rate {
            return Err(TrackerError::Config(format!(
                "clock rate {} below frame rate",
                self.clock_rate
            )));
        }
        Ok(())
    }

    /// Duration of one frame in microseconds.
    pub fn frame_duration_us(&self) -> u64 {
        frame_duration_us(self.frame_rate)
    }

    /// Chip clock ticks per frame.
    pub fn frame_ticks(&self) -> u64 {
        u64::from(self.clock_rate / self.frame_rate.max(1))
    }

    /// Samples of device output per frame, rounded down.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate / self.frame_rate.max(1)) as usize
    }
}
