//! Samples and ornaments.

/// One step of a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLine {
    /// Amplitude (0-15).
    pub level: u8,
    /// Noise period contribution.
    pub noise: u8,
    /// Tone output disabled for this step.
    pub tone_mask: bool,
    /// Noise output disabled for this step.
    pub noise_mask: bool,
    /// Step follows the hardware envelope when the channel arms it.
    pub envelope_mask: bool,
    /// Signed tone period offset.
    pub vibrato: i16,
}

impl SampleLine {
    /// Silent step: zero level, tone and noise masked.
    pub const SILENT: SampleLine = SampleLine {
        level: 0,
        noise: 0,
        tone_mask: true,
        noise_mask: true,
        envelope_mask: false,
        vibrato: 0,
    };
}

impl Default for SampleLine {
    fn default() -> Self {
        Self::SILENT
    }
}

/// Amplitude/timbre envelope with its own loop.
///
/// `loop_start` at or beyond the line count means the sample does not loop.
/// `loop_limit` is only used by the Sound Tracker family, where the loop
/// region ends before the last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    /// Loop start.
    pub loop_start: usize,
    /// End of the loop region (exclusive).
    pub loop_limit: usize,
    /// Steps.
    pub lines: Vec<SampleLine>,
}

impl Sample {
    /// Empty stub sample.
    pub const fn stub() -> Self {
        Self {
            loop_start: 0,
            loop_limit: 0,
            lines: Vec::new(),
        }
    }

    /// Sample looping over the whole range starting at `loop_start`.
    pub fn new(loop_start: usize, lines: Vec<SampleLine>) -> Self {
        let loop_limit = lines.len();
        Self {
            loop_start: loop_start.min(loop_limit),
            loop_limit,
            lines,
        }
    }

    /// Number of steps.
    pub fn size(&self) -> usize {
        self.lines.len()
    }

    /// Step at `index`; silent past the end.
    pub fn line(&self, index: usize) -> SampleLine {
        self.lines.get(index).copied().unwrap_or(SampleLine::SILENT)
    }

    /// Whether any step can make a sound: tone with a level, or noise.
    pub fn is_audible(&self) -> bool {
        self.lines
            .iter()
            .any(|line| (!line.tone_mask && line.level != 0) || !line.noise_mask)
    }
}

impl Default for Sample {
    fn default() -> Self {
        Self::stub()
    }
}

/// Looping sequence of halftone offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ornament {
    /// Loop start.
    pub loop_start: usize,
    /// Halftone offsets.
    pub offsets: Vec<i8>,
}

impl Ornament {
    /// Empty stub ornament.
    pub const fn stub() -> Self {
        Self {
            loop_start: 0,
            offsets: Vec::new(),
        }
    }

    /// Ornament with `loop_start` clamped to the offset count.
    pub fn new(loop_start: usize, offsets: Vec<i8>) -> Self {
        Self {
            loop_start: loop_start.min(offsets.len()),
            offsets,
        }
    }

    /// Number of steps.
    pub fn size(&self) -> usize {
        self.offsets.len()
    }

    /// Offset at `index`; zero past the end.
    pub fn offset(&self, index: usize) -> i8 {
        self.offsets.get(index).copied().unwrap_or(0)
    }
}
