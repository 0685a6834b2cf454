//! ZX Spectrum tracker module replayer for the AY-3-8910 / YM2149.
//!
//! Decodes ProTracker 1/2, Sound Tracker (editor, compiled and v3) and
//! Sound Tracker Pro modules into a format-agnostic model and replays them frame by frame as register chunks.
//!
//! # Pipeline
//!
//! - [`formats`] - per-format header parsing on top of the generic
//!   [`decoder`], producing a [`Module`]
//! - [`scheduler`] - position/line/quirk counters, tempo and loop policy
//! - [`synth`] - per-family channel synthesis into [`aym_core::RegisterChunk`]s
//! - [`Renderer`] - scheduler plus synthesizer, with reset and seeking
//! - [`TrackerPlayer`] - feeds a [`aym_core::ChipDevice`] and implements the
//!   common player traits
//!
//! # Example
//!
//! ```no_run
//! use aym_tracker::{detect, RenderParams, Renderer};
//!
//! # fn main() -> anyhow::Result<()> {
//! let data = std::fs::read("tune.pt2")?;
//! let detected = detect(&data)?;
//! println!("{} frames", detected.module.stats().frames);
//!
//! let mut renderer = Renderer::new(detected.module, RenderParams::default());
//! for _ in 0..50 {
//!     let frame = renderer.render();
//!     println!("{:?}", frame.chunk.registers.as_array());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod binary;
pub mod config;
pub mod decoder;
pub mod detector;
pub mod error;
pub mod formats;
pub mod frequency;
pub mod info;
pub mod model;
pub mod player;
pub mod renderer;
pub mod scheduler;
pub mod selftest;
pub mod synth;
pub mod turbosound;

pub use config::RenderParams;
pub use detector::{decode_checked, detect, DetectedModule};
pub use error::{ErrorKind, Result, TrackerError};
pub use formats::TrackerFormat;
pub use frequency::FrequencyTable;
pub use info::{ModuleInfo, ModuleStatistics, TrackMetadata};
pub use model::{Module, ModuleBuilder, Position};
pub use player::TrackerPlayer;
pub use renderer::{RenderedFrame, Renderer};
pub use scheduler::{FrameStatus, LoopMode, Scheduler, TrackState};
pub use selftest::{self_test, SelfTestReport};
pub use turbosound::{DualFrame, TurboSoundRenderer};
