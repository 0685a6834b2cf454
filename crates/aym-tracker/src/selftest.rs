//! Dry-run playback check.
//!
//! Detection uses this to tell a real module from bytes that merely pass a
//! format's header checks: the module is played once with
//! [`LoopMode::None`], output is discarded, and the run must finish.

use std::sync::Arc;

use log::debug;

use crate::config::RenderParams;
use crate::error::{Result, TrackerError};
use crate::model::Module;
use crate::renderer::Renderer;
use crate::scheduler::{FrameStatus, LoopMode};

/// Upper bound on frames simulated by [`self_test`] (about 90 minutes at 50 Hz).
pub const MAX_SELF_TEST_FRAMES: usize = 50 * 60 * 90;

/// Outcome of a successful self-test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelfTestReport {
    /// Frames played until the module finished.
    pub frames: usize,
}

/// Play `module` once without output.
///
/// Fails if a played cell refers to a sample or ornament the decoder never
/// registered, if playback does not finish within [`MAX_SELF_TEST_FRAMES`],
/// or if the frame count disagrees with the decode-time statistics.
pub fn self_test(module: &Arc<Module>) -> Result<SelfTestReport> {
    check_references(module)?;

    let params = RenderParams {
        loop_mode: LoopMode::None,
        ..RenderParams::default()
    };
    let mut renderer = Renderer::new(Arc::clone(module), params);
    let mut frames = 0;
    loop {
        if frames >= MAX_SELF_TEST_FRAMES {
            return Err(TrackerError::SelfTest(format!(
                "playback did not finish within {MAX_SELF_TEST_FRAMES} frames"
            )));
        }
        frames += 1;
        if renderer.render().status == FrameStatus::Finished {
            break;
        }
    }
    if frames != module.stats().frames {
        return Err(TrackerError::SelfTest(format!(
            "played {frames} frames, statistics report {}",
            module.stats().frames
        )));
    }
    debug!("{}: self-test passed, {frames} frames", module.format());
    Ok(SelfTestReport { frames })
}

fn check_references(module: &Module) -> Result<()> {
    for (pos_idx, position) in module.positions().iter().enumerate() {
        let pattern = module.pattern(position.pattern).ok_or_else(|| {
            TrackerError::SelfTest(format!(
                "position {pos_idx} refers to missing pattern {}",
                position.pattern
            ))
        })?;
        for (line_idx, line) in pattern.lines() {
            for cell in &line.cells {
                if let Some(sample) = cell.sample.filter(|&idx| !module.has_sample(idx)) {
                    return Err(TrackerError::SelfTest(format!(
                        "pattern {} line {line_idx} plays unregistered sample {sample}",
                        position.pattern
                    )));
                }
                if let Some(ornament) = cell.ornament.filter(|&idx| !module.has_ornament(idx)) {
                    return Err(TrackerError::SelfTest(format!(
                        "pattern {} line {line_idx} plays unregistered ornament {ornament}",
                        position.pattern
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::formats::TrackerFormat;
    use crate::model::{Cell, ModuleBuilder, Position, Sample};

    fn builder() -> ModuleBuilder {
        let mut builder = ModuleBuilder::new(TrackerFormat::SoundTracker3);
        builder
            .set_initial_tempo(3)
            .set_positions(vec![Position::new(0), Position::new(1)], 1);
        builder.start_pattern(0).size = 5;
        builder.start_pattern(1).size = 6;
        builder
    }

    #[test]
    fn finished_run_reports_frames() {
        let module = Arc::new(builder().build().unwrap());
        let report = self_test(&module).unwrap();
        assert_eq!(report.frames, 33);
        assert_eq!(report.frames, module.stats().frames);
    }

    #[test]
    fn unregistered_sample_fails() {
        let mut builder = builder();
        builder.start_pattern(1).line_mut(2, 3).cells[1] = Cell {
            sample: Some(4),
            ..Cell::default()
        };
        builder.set_sample(4, Sample::stub());
        let mut module = builder.build().unwrap();
        module.samples[4] = None;
        let err = self_test(&Arc::new(module)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FormatMismatch);
        assert!(err.to_string().contains("sample 4"));
    }
}
