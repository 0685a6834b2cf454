//! Error types for module decoding and playback setup.
//!
//! Rendering itself never fails: every index the renderer may look up is
//! validated or substituted with a stub entry while decoding.

use thiserror::Error;

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Errors that can occur when decoding modules or configuring playback.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Signature or layout does not match this format; another decoder may accept it.
    #[error("not a {format} module: {reason}")]
    FormatMismatch {
        /// Format identifier.
        format: &'static str,
        /// What did not match.
        reason: String,
    },

    /// Signature matched but a structural invariant is violated.
    #[error("malformed data at offset {offset:#06x}: {reason}")]
    MalformedData {
        /// Offset of the offending structure.
        offset: usize,
        /// Violated invariant.
        reason: String,
    },

    /// A read ran past the end of the data.
    #[error("unexpected end of data: {needed} byte(s) at offset {offset:#06x}, {available} available")]
    UnexpectedEof {
        /// Read offset.
        offset: usize,
        /// Bytes requested.
        needed: usize,
        /// Total bytes available.
        available: usize,
    },

    /// Reference to a sample or ornament the header does not declare.
    #[error("{kind} {index} is not declared by the module ({available} available)")]
    UnsupportedReference {
        /// "sample" or "ornament".
        kind: &'static str,
        /// Referenced index.
        index: usize,
        /// Declared entries.
        available: usize,
    },

    /// Dry-run playback rejected a decoded module.
    #[error("self-test failed: {0}")]
    SelfTest(String),

    /// No decoder accepted the data.
    #[error("unrecognized module data")]
    Unrecognized,

    /// Invalid render parameters.
    #[error("invalid render configuration: {0}")]
    Config(String),

    /// Render parameters could not be parsed.
    #[error("render configuration parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Device setup failed.
    #[error("device error: {0}")]
    Device(#[from] aym_core::DeviceError),
}

/// Coarse classification used by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Try the next decoder.
    FormatMismatch,
    /// Fatal for this decode attempt.
    MalformedData,
    /// Nothing matched.
    Unrecognized,
    /// Caller-side configuration problem.
    Configuration,
}

impl TrackerError {
    /// Classify the error.
    ///
    /// Undeclared references only surface as errors in strict formats, where
    /// they are fatal, so they count as malformed data. A failed self-test
    /// means the format guess was wrong.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrackerError::FormatMismatch { .. } | TrackerError::SelfTest(_) => {
                ErrorKind::FormatMismatch
            }
            TrackerError::MalformedData { .. }
            | TrackerError::UnexpectedEof { .. }
            | TrackerError::UnsupportedReference { .. } => ErrorKind::MalformedData,
            TrackerError::Unrecognized => ErrorKind::Unrecognized,
            TrackerError::Config(_) | TrackerError::Json(_) | TrackerError::Device(_) => {
                ErrorKind::Configuration
            }
        }
    }

    pub(crate) fn mismatch(format: &'static str, reason: impl Into<String>) -> Self {
        TrackerError::FormatMismatch {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        TrackerError::MalformedData {
            offset,
            reason: reason.into(),
        }
    }

    /// Turn a truncated read into a format mismatch.
    ///
    /// Header probing uses this: a file too short for the header is simply
    /// not this format.
    pub(crate) fn or_mismatch(self, format: &'static str) -> Self {
        match self {
            TrackerError::UnexpectedEof { offset, .. } => {
                TrackerError::mismatch(format, format!("too short for header field at {offset:#06x}"))
            }
            other => other,
        }
    }
}
