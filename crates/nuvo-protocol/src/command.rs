//! Outbound command formatting
//!
//! Each `format_*` function validates its arguments, clamps numeric values
//! into the range the amplifier accepts, and returns a typed [`Command`].
//! The command keeps the clamped value, so callers can see exactly what will
//! be sent before it reaches the wire.

use std::fmt;

use crate::error::ArgumentError;
use crate::volume::percent_to_raw;
use crate::{EncodeCommand, COMMAND_PREFIX, TERMINATOR};

/// Largest zone id the one-or-two digit wire field can carry
pub const MAX_WIRE_ZONE: u8 = 99;

/// Source ids accepted by the amplifier
pub const SOURCE_RANGE: (u8, u8) = (1, 6);

/// Treble/bass range accepted by the amplifier
pub const TONE_RANGE: (i8, i8) = (-12, 12);

/// A command addressed to one zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Command {
    /// Status query: `Z3STATUS?`
    StatusQuery { zone: u8 },
    /// Power: `Z3ON` / `Z3OFF`
    Power { zone: u8, on: bool },
    /// Mute: `Z3MTON` / `Z3MTOFF`
    Mute { zone: u8, on: bool },
    /// Volume as attenuation: `Z3VOL39`
    Volume { zone: u8, attenuation: u8 },
    /// Treble: `Z3TREB-4`
    Treble { zone: u8, level: i8 },
    /// Bass: `Z3BASS6`
    Bass { zone: u8, level: i8 },
    /// Source select: `Z3SRC2`
    Source { zone: u8, source: u8 },
}

impl Command {
    /// Zone this command is addressed to
    pub fn zone(&self) -> u8 {
        match *self {
            Command::StatusQuery { zone }
            | Command::Power { zone, .. }
            | Command::Mute { zone, .. }
            | Command::Volume { zone, .. }
            | Command::Treble { zone, .. }
            | Command::Bass { zone, .. }
            | Command::Source { zone, .. } => zone,
        }
    }

    /// Returns true if this command only reads state
    pub fn is_query(&self) -> bool {
        matches!(self, Command::StatusQuery { .. })
    }
}

/// Command text without prefix or terminator
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Command::StatusQuery { zone } => write!(f, "Z{}STATUS?", zone),
            Command::Power { zone, on: true } => write!(f, "Z{}ON", zone),
            Command::Power { zone, on: false } => write!(f, "Z{}OFF", zone),
            Command::Mute { zone, on: true } => write!(f, "Z{}MTON", zone),
            Command::Mute { zone, on: false } => write!(f, "Z{}MTOFF", zone),
            Command::Volume { zone, attenuation } => write!(f, "Z{}VOL{:02}", zone, attenuation),
            Command::Treble { zone, level } => write!(f, "Z{}TREB{}", zone, level),
            Command::Bass { zone, level } => write!(f, "Z{}BASS{}", zone, level),
            Command::Source { zone, source } => write!(f, "Z{}SRC{}", zone, source),
        }
    }
}

impl EncodeCommand for Command {
    fn encode(&self) -> Vec<u8> {
        let body = self.to_string();
        let mut out = Vec::with_capacity(body.len() + 2);
        out.push(COMMAND_PREFIX);
        out.extend_from_slice(body.as_bytes());
        out.push(TERMINATOR);
        out
    }
}

fn check_zone(zone: u8) -> Result<u8, ArgumentError> {
    if zone == 0 || zone > MAX_WIRE_ZONE {
        return Err(ArgumentError::ZoneOutOfRange {
            zone: u32::from(zone),
            max: MAX_WIRE_ZONE,
        });
    }
    Ok(zone)
}

fn check_finite(what: &'static str, value: f64) -> Result<f64, ArgumentError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ArgumentError::NotFinite { what, value })
    }
}

fn clamp_tone(level: i32) -> i8 {
    // Bounded to i8 by the clamp
    level.clamp(i32::from(TONE_RANGE.0), i32::from(TONE_RANGE.1)) as i8
}

/// Build a status query
pub fn format_zone_status_request(zone: u8) -> Result<Command, ArgumentError> {
    Ok(Command::StatusQuery {
        zone: check_zone(zone)?,
    })
}

/// Build a power command
pub fn format_set_power(zone: u8, on: bool) -> Result<Command, ArgumentError> {
    Ok(Command::Power {
        zone: check_zone(zone)?,
        on,
    })
}

/// Build a mute command
pub fn format_set_mute(zone: u8, on: bool) -> Result<Command, ArgumentError> {
    Ok(Command::Mute {
        zone: check_zone(zone)?,
        on,
    })
}

/// Build a volume command from a percentage (0..=100, 100 is loudest)
///
/// Out-of-range percentages are clamped; NaN and infinities are rejected.
pub fn format_set_volume(zone: u8, percent: f64) -> Result<Command, ArgumentError> {
    let zone = check_zone(zone)?;
    let percent = check_finite("volume", percent)?;
    Ok(Command::Volume {
        zone,
        attenuation: percent_to_raw(percent),
    })
}

/// Build a treble command, clamping the level to -12..=12
pub fn format_set_treble(zone: u8, level: i32) -> Result<Command, ArgumentError> {
    Ok(Command::Treble {
        zone: check_zone(zone)?,
        level: clamp_tone(level),
    })
}

/// Build a bass command, clamping the level to -12..=12
pub fn format_set_bass(zone: u8, level: i32) -> Result<Command, ArgumentError> {
    Ok(Command::Bass {
        zone: check_zone(zone)?,
        level: clamp_tone(level),
    })
}

/// Build a source select command, clamping the source to 1..=6
pub fn format_set_source(zone: u8, source: u8) -> Result<Command, ArgumentError> {
    Ok(Command::Source {
        zone: check_zone(zone)?,
        source: source.clamp(SOURCE_RANGE.0, SOURCE_RANGE.1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_status_query() {
        let cmd = format_zone_status_request(3).unwrap();
        assert_eq!(cmd.to_string(), "Z3STATUS?");
        assert_eq!(cmd.encode(), b"*Z3STATUS?\r");
        assert!(cmd.is_query());
    }

    #[test]
    fn test_power_and_mute() {
        assert_eq!(format_set_power(12, true).unwrap().to_string(), "Z12ON");
        assert_eq!(format_set_power(12, false).unwrap().to_string(), "Z12OFF");
        assert_eq!(format_set_mute(4, true).unwrap().to_string(), "Z4MTON");
        assert_eq!(format_set_mute(4, false).unwrap().to_string(), "Z4MTOFF");
    }

    #[test]
    fn test_volume_half_scale() {
        let cmd = format_set_volume(2, 50.0).unwrap();
        assert_eq!(
            cmd,
            Command::Volume {
                zone: 2,
                attenuation: 39
            }
        );
        assert_eq!(cmd.encode(), b"*Z2VOL39\r");
    }

    #[test]
    fn test_volume_zero_padded() {
        assert_eq!(format_set_volume(1, 95.0).unwrap().to_string(), "Z1VOL04");
        assert_eq!(format_set_volume(1, 100.0).unwrap().to_string(), "Z1VOL00");
        assert_eq!(format_set_volume(1, 0.0).unwrap().to_string(), "Z1VOL78");
    }

    #[test]
    fn test_volume_rejects_nan() {
        assert!(matches!(
            format_set_volume(1, f64::NAN),
            Err(ArgumentError::NotFinite { what: "volume", .. })
        ));
        assert!(format_set_volume(1, f64::INFINITY).is_err());
    }

    #[test]
    fn test_tone_clamps_both_directions() {
        assert_eq!(format_set_treble(1, 999).unwrap().to_string(), "Z1TREB12");
        assert_eq!(format_set_treble(1, -999).unwrap().to_string(), "Z1TREB-12");
        assert_eq!(format_set_bass(1, 5).unwrap().to_string(), "Z1BASS5");
        assert_eq!(format_set_bass(1, -3).unwrap().to_string(), "Z1BASS-3");
    }

    #[test]
    fn test_source_clamps() {
        assert_eq!(format_set_source(1, 0).unwrap().to_string(), "Z1SRC1");
        assert_eq!(format_set_source(1, 9).unwrap().to_string(), "Z1SRC6");
        assert_eq!(format_set_source(1, 3).unwrap().to_string(), "Z1SRC3");
    }

    #[test]
    fn test_zone_validation() {
        assert_eq!(
            format_set_power(0, true),
            Err(ArgumentError::ZoneOutOfRange { zone: 0, max: 99 })
        );
        assert!(format_zone_status_request(100).is_err());
        assert!(format_zone_status_request(99).is_ok());
    }

    #[test]
    fn test_command_zone() {
        assert_eq!(format_set_source(7, 2).unwrap().zone(), 7);
        assert_eq!(format_set_bass(8, 2).unwrap().zone(), 8);
    }

    proptest! {
        #[test]
        fn prop_tone_always_in_range(level in any::<i32>()) {
            match format_set_treble(1, level).unwrap() {
                Command::Treble { level, .. } => prop_assert!((-12..=12).contains(&level)),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
            match format_set_bass(1, level).unwrap() {
                Command::Bass { level, .. } => prop_assert!((-12..=12).contains(&level)),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }

        #[test]
        fn prop_in_range_tone_is_unchanged(level in -12i32..=12) {
            let cmd = format_set_bass(1, level).unwrap();
            prop_assert_eq!(cmd, Command::Bass { zone: 1, level: level as i8 });
        }

        #[test]
        fn prop_volume_attenuation_in_range(percent in -1000.0f64..1000.0) {
            match format_set_volume(1, percent).unwrap() {
                Command::Volume { attenuation, .. } => prop_assert!(attenuation <= 78),
                other => prop_assert!(false, "unexpected {:?}", other),
            }
        }
    }
}
