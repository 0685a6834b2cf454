//! Playback metadata.
//!
//! Tracker modules carry a handful of strings (title, author, the program
//! that produced them) plus timing figures derived at load time. Players
//! expose them through [`MetadataFields`] so front ends can stay format-agnostic.

use serde::{Deserialize, Serialize};

use crate::FRAME_RATE_PAL;

/// Read-only metadata of a loaded module.
pub trait MetadataFields {
    /// Song title.
    fn title(&self) -> &str;

    /// Author/composer name.
    fn author(&self) -> &str;

    /// Tracker or compiler that produced the file.
    ///
    /// Returns an empty string if unknown.
    fn program(&self) -> &str {
        ""
    }

    /// Free-form comment.
    fn comments(&self) -> &str {
        ""
    }

    /// Short format identifier, e.g. "PT2", "STC".
    fn format(&self) -> &str;

    /// Total frame count, if known.
    fn frame_count(&self) -> Option<usize> {
        None
    }

    /// Frame rate in Hz.
    fn frame_rate(&self) -> u32 {
        FRAME_RATE_PAL
    }

    /// Duration in seconds, if the frame count is known.
    fn duration_seconds(&self) -> Option<f32> {
        self.frame_count()
            .map(|fc| fc as f32 / self.frame_rate() as f32)
    }

    /// Frame playback jumps back to after the end, if the song loops.
    fn loop_frame(&self) -> Option<usize> {
        None
    }
}

/// Plain metadata container.
///
/// Useful for catalogs and for merging metadata of several modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicMetadata {
    /// Song title.
    pub title: String,
    /// Author/composer name.
    pub author: String,
    /// Producing program.
    pub program: String,
    /// Additional comments.
    pub comments: String,
    /// Format identifier.
    pub format: String,
    /// Total frame count.
    pub frame_count: Option<usize>,
    /// Frame rate in Hz.
    pub frame_rate: u32,
    /// Loop start frame.
    pub loop_frame: Option<usize>,
}

impl BasicMetadata {
    /// Empty metadata at the PAL frame rate.
    pub fn new() -> Self {
        Self {
            frame_rate: FRAME_RATE_PAL,
            ..Default::default()
        }
    }

    /// Copy every field out of any metadata implementation.
    pub fn from_fields(src: &impl MetadataFields) -> Self {
        Self {
            title: src.title().to_owned(),
            author: src.author().to_owned(),
            program: src.program().to_owned(),
            comments: src.comments().to_owned(),
            format: src.format().to_owned(),
            frame_count: src.frame_count(),
            frame_rate: src.frame_rate(),
            loop_frame: src.loop_frame(),
        }
    }
}

impl MetadataFields for BasicMetadata {
    fn title(&self) -> &str {
        &self.title
    }

    fn author(&self) -> &str {
        &self.author
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn comments(&self) -> &str {
        &self.comments
    }

    fn format(&self) -> &str {
        &self.format
    }

    fn frame_count(&self) -> Option<usize> {
        self.frame_count
    }

    fn frame_rate(&self) -> u32 {
        self.frame_rate
    }

    fn loop_frame(&self) -> Option<usize> {
        self.loop_frame
    }
}

/// Join two metadata strings the way multi-chip modules present them.
///
/// Equal or one-sided values are kept as-is, differing values become `"a/b"`.
pub fn merge_strings(first: &str, second: &str) -> String {
    match (first.is_empty(), second.is_empty()) {
        (true, _) => second.to_owned(),
        (_, true) => first.to_owned(),
        _ if first == second => first.to_owned(),
        _ => format!("{first}/{second}"),
    }
}
