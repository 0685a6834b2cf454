//! Module metadata and timing statistics.

use aym_common::{MetadataFields, FRAME_RATE_PAL};
use serde::{Deserialize, Serialize};

use crate::model::Module;

/// Text fields read from the module.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// Song title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Tracker or compiler signature.
    pub program: String,
    /// Free-form comment.
    pub comment: String,
    /// Format identifier.
    pub format: String,
}

/// Figures derived by a dry playback pass at decode time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleStatistics {
    /// Number of positions.
    pub positions: usize,
    /// Position playback loops back to.
    pub loop_position: usize,
    /// Distinct patterns played.
    pub patterns: usize,
    /// Channel count.
    pub channels: usize,
    /// Frames in one pass through the play order.
    pub frames: usize,
    /// Frame at which the loop position starts.
    pub loop_frame: usize,
    /// Tempo in effect at the loop position.
    pub loop_tempo: u8,
    /// Tempo at the start.
    pub initial_tempo: u8,
}

/// [`MetadataFields`] view over a decoded module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackMetadata {
    /// Text fields.
    #[serde(flatten)]
    pub info: ModuleInfo,
    /// Timing figures.
    pub stats: ModuleStatistics,
    /// Playback frame rate in Hz.
    pub frame_rate: u32,
}

impl TrackMetadata {
    /// Metadata of `module` played at `frame_rate` Hz.
    pub fn new(module: &Module, frame_rate: u32) -> Self {
        Self {
            info: module.info().clone(),
            stats: *module.stats(),
            frame_rate,
        }
    }

    /// Metadata at the PAL frame rate.
    pub fn pal(module: &Module) -> Self {
        Self::new(module, FRAME_RATE_PAL)
    }

    /// JSON catalog entry.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl MetadataFields for TrackMetadata {
    fn title(&self) -> &str {
        &self.info.title
    }

    fn author(&self) -> &str {
        &self.info.author
    }

    fn program(&self) -> &str {
        &self.info.program
    }

    fn comments(&self) -> &str {
        &self.info.comment
    }

    fn format(&self) -> &str {
        &self.info.format
    }

    fn frame_count(&self) -> Option<usize> {
        Some(self.stats.frames)
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn loop_frame(&self) -> Option<usize> {
        Some(self.stats.loop_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn metadata() -> TrackMetadata {
        TrackMetadata {
            info: ModuleInfo {
                title: "Tune".into(),
                program: "Pro Tracker v2.x".into(),
                format: "PT2".into(),
                ..ModuleInfo::default()
            },
            stats: ModuleStatistics {
                frames: 1500,
                loop_frame: 300,
                ..ModuleStatistics::default()
            },
            frame_rate: 50,
        }
    }

    #[test]
    fn duration_comes_from_frame_count() {
        let meta = metadata();
        assert_relative_eq!(meta.duration_seconds().unwrap(), 30.0);
        assert_eq!(meta.loop_frame(), Some(300));
        assert_eq!(meta.comments(), "");
    }

    #[test]
    fn json_flattens_text_fields() {
        let json = metadata().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["title"], "Tune");
        assert_eq!(value["stats"]["frames"], 1500);
    }
}
