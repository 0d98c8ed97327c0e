//! Volume scale conversions
//!
//! The amplifier reports and accepts volume as attenuation: `0` is the
//! loudest setting and [`MAX_ATTENUATION`] is effectively silent. Hosts work
//! with a percentage where `100` is loudest.
//!
//! A reported attenuation of exactly `0` decodes to `0%`, the same as
//! [`MAX_ATTENUATION`]. Both are treated as muted by [`crate::status`].

/// Largest attenuation the amplifier accepts
pub const MAX_ATTENUATION: u8 = 78;

/// Convert device attenuation to a percentage rounded to two decimals
///
/// Values above [`MAX_ATTENUATION`] are clamped first.
pub fn raw_to_percent(raw: u8) -> f64 {
    let raw = raw.min(MAX_ATTENUATION);
    if raw == 0 {
        return 0.0;
    }
    let percent = 100.0 * (1.0 - f64::from(raw) / f64::from(MAX_ATTENUATION));
    round2(percent)
}

/// Convert a percentage (0..=100) to device attenuation
///
/// The percentage is clamped to its range; the caller is expected to have
/// rejected non-finite input already.
pub fn percent_to_raw(percent: f64) -> u8 {
    let fraction = percent.clamp(0.0, 100.0) / 100.0;
    // Bounded to 0..=78 by the clamp above
    ((1.0 - fraction) * f64::from(MAX_ATTENUATION)).round() as u8
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
