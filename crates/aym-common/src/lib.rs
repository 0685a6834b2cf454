//! Common traits and types for AY/YM tracker replayers.
//!
//! # Traits
//!
//! - [`ChiptunePlayerBase`] / [`ChiptunePlayer`] - unified playback interface
//! - [`MetadataFields`] - title, author, timing figures
//!
//! # Example
//!
//! ```ignore
//! use aym_common::{ChiptunePlayerBase, PlaybackState};
//!
//! fn play_any(player: &mut dyn ChiptunePlayerBase) {
//!     player.play();
//!     let mut buffer = vec![0.0; 4096];
//!     while player.state() == PlaybackState::Playing {
//!         player.generate_samples_into(&mut buffer);
//!         // ... send buffer to the audio device
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod metadata;
mod player;
pub mod util;

pub use metadata::{merge_strings, BasicMetadata, MetadataFields};
pub use player::{ChiptunePlayer, ChiptunePlayerBase, PlaybackState};

/// Standard audio sample rate (44.1 kHz).
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// PAL frame rate (50 Hz), the interrupt rate of ZX Spectrum tracker players.
pub const FRAME_RATE_PAL: u32 = 50;

/// ZX Spectrum 128 AY clock (1.7734 MHz).
pub const ZX_SPECTRUM_CLOCK: u32 = 1_773_400;

/// Tone channels per sound chip.
pub const CHANNELS_PER_PSG: usize = 3;
