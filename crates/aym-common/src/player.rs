//! Unified player traits.
//!
//! - [`ChiptunePlayerBase`] - object-safe playback control
//! - [`ChiptunePlayer`] - adds typed metadata access

use crate::{MetadataFields, CHANNELS_PER_PSG, DEFAULT_SAMPLE_RATE};

/// Playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Stopped (at the beginning or after the end).
    #[default]
    Stopped,
    /// Actively producing audio.
    Playing,
    /// Paused; resumes where it left off.
    Paused,
}

/// Object-safe playback interface.
///
/// ```ignore
/// fn drain(player: &mut dyn ChiptunePlayerBase) {
///     player.play();
///     let mut buffer = vec![0.0; 882];
///     while player.is_playing() {
///         player.generate_samples_into(&mut buffer);
///     }
/// }
/// ```
pub trait ChiptunePlayerBase: Send {
    /// Start or resume playback.
    fn play(&mut self);

    /// Pause playback, keeping the position.
    fn pause(&mut self);

    /// Stop playback and rewind.
    fn stop(&mut self);

    /// Current state.
    fn state(&self) -> PlaybackState;

    /// Whether audio is being produced.
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    /// Fill `buffer` with audio; silence when not playing.
    fn generate_samples_into(&mut self, buffer: &mut [f32]);

    /// Allocate and fill a buffer of `count` samples.
    fn generate_samples(&mut self, count: usize) -> Vec<f32> {
        let mut buffer = vec![0.0; count];
        self.generate_samples_into(&mut buffer);
        buffer
    }

    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32 {
        DEFAULT_SAMPLE_RATE
    }

    /// Playback position in `0.0..=1.0`.
    fn playback_position(&self) -> f32 {
        0.0
    }

    /// Seek to a position in `0.0..=1.0`; `false` if unsupported.
    fn seek(&mut self, _position: f32) -> bool {
        false
    }

    /// Total duration in seconds, 0.0 if unknown.
    fn duration_seconds(&self) -> f32 {
        0.0
    }

    /// Elapsed time in seconds.
    fn elapsed_seconds(&self) -> f32 {
        self.playback_position() * self.duration_seconds()
    }

    /// Number of sound chips driven by the player.
    fn psg_count(&self) -> usize {
        1
    }

    /// Total number of tone channels.
    fn channel_count(&self) -> usize {
        self.psg_count() * CHANNELS_PER_PSG
    }
}

/// Player with typed metadata.
pub trait ChiptunePlayer: ChiptunePlayerBase {
    /// Metadata type.
    type Metadata: MetadataFields;

    /// Song metadata.
    fn metadata(&self) -> &Self::Metadata;
}
