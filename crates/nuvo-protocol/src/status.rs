//! Decoded zone state
//!
//! A [`ZoneStatus`] is built only from a fully matched status line. It is an
//! immutable snapshot: the driver never caches or mutates it.

use crate::volume::raw_to_percent;

/// Volume used when a response carries no readable level
///
/// Power-only acknowledgments and unparseable volume fields fall back to
/// this value and report the zone as muted, so callers always get a usable
/// number instead of a missing one.
pub const DEFAULT_VOLUME_PERCENT: f64 = 40.0;

/// Volume field as it appeared on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportedVolume {
    /// Attenuation magnitude (0 = loudest, 78 = silent)
    Attenuation(u8),
    /// Literal mute token (`MT` or `MUTE`)
    Muted,
    /// Response shape carries no volume
    Absent,
}

/// Snapshot of one zone at one instant
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZoneStatus {
    /// Zone id (1-based)
    pub zone: u8,
    /// Zone powered on
    pub power: bool,
    /// Selected source, if this response shape reports it
    pub source: Option<u8>,
    /// Volume as a percentage (0..=100, two decimals)
    pub volume: f64,
    /// Zone muted
    pub mute: bool,
    /// Treble level. No response grammar reports tone, so this is always 0.
    pub treble: i8,
    /// Bass level. No response grammar reports tone, so this is always 0.
    pub bass: i8,
    /// Do-not-disturb flag (extended dialect only)
    pub dnd: Option<bool>,
    /// Keypad lock flag (extended dialect only)
    pub keypad_lock: Option<bool>,
}

impl ZoneStatus {
    /// Build a status from decoded fields, applying the volume/mute policy
    ///
    /// - a mute token, or a level that converts to 0%, gives `mute = true`
    ///   and `volume = 0`
    /// - an absent level gives `mute = true` and [`DEFAULT_VOLUME_PERCENT`]
    pub fn new(zone: u8, power: bool, source: Option<u8>, volume: ReportedVolume) -> Self {
        let (volume, mute) = match volume {
            ReportedVolume::Muted => (0.0, true),
            ReportedVolume::Absent => (DEFAULT_VOLUME_PERCENT, true),
            ReportedVolume::Attenuation(raw) => {
                let percent = raw_to_percent(raw);
                if percent == 0.0 {
                    (0.0, true)
                } else {
                    (percent, false)
                }
            }
        };

        Self {
            zone,
            power,
            source,
            volume,
            mute,
            treble: 0,
            bass: 0,
            dnd: None,
            keypad_lock: None,
        }
    }

    /// Attach the extended-dialect flags
    pub fn with_flags(mut self, dnd: bool, keypad_lock: bool) -> Self {
        self.dnd = Some(dnd);
        self.keypad_lock = Some(keypad_lock);
        self
    }
}
