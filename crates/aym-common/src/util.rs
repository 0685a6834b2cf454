//! Register math shared by front ends and analysis tools.

const PERIOD_DENOMINATOR: f32 = 16.0;

/// Convert a 12-bit tone period into a frequency for `master_clock_hz`.
///
/// A zero period means the channel is silent and yields `None`.
#[inline]
pub fn period_to_frequency(master_clock_hz: u32, period: u16) -> Option<f32> {
    let period = period & 0x0fff;
    if period == 0 {
        None
    } else {
        Some(master_clock_hz as f32 / (PERIOD_DENOMINATOR * period as f32))
    }
}

/// Frame duration in microseconds for `frame_rate` Hz.
#[inline]
pub fn frame_duration_us(frame_rate: u32) -> u64 {
    1_000_000 / frame_rate.max(1) as u64
}
