//! Format detection.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, TrackerError};
use crate::formats::TrackerFormat;
use crate::model::Module;
use crate::selftest::{self_test, SelfTestReport};

/// Module accepted by one of the decoders.
#[derive(Debug, Clone)]
pub struct DetectedModule {
    /// Format that accepted the data.
    pub format: TrackerFormat,
    /// Decoded module.
    pub module: Arc<Module>,
    /// Dry-run results.
    pub report: SelfTestReport,
}

/// Decode `data` with the first format that accepts it and passes the self-test.
///
/// Every failure, structural or not, only disqualifies the format that
/// produced it. [`TrackerError::Unrecognized`] is returned when no format is
/// left.
pub fn detect(data: &[u8]) -> Result<DetectedModule> {
    for format in TrackerFormat::ALL {
        match decode_checked(format, data) {
            Ok(detected) => {
                debug!(
                    "detected {format}: {} positions, {} frames",
                    detected.module.positions().len(),
                    detected.report.frames
                );
                return Ok(detected);
            }
            Err(err) => debug!("{format} rejected ({:?}): {err}", err.kind()),
        }
    }
    Err(TrackerError::Unrecognized)
}

/// Decode `data` as `format` and self-test the result.
pub fn decode_checked(format: TrackerFormat, data: &[u8]) -> Result<DetectedModule> {
    let module = Arc::new(format.decode(data)?);
    let report = self_test(&module)?;
    Ok(DetectedModule {
        format,
        module,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_is_unrecognized() {
        let data = vec![0x55u8; 512];
        assert!(matches!(detect(&data), Err(TrackerError::Unrecognized)));
        assert!(matches!(detect(&[]), Err(TrackerError::Unrecognized)));
    }
}
