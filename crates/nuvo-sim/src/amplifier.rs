//! Virtual amplifier for testing
//!
//! This module provides a simulated multi-zone amplifier that tracks zone
//! state from the commands it receives and answers with status lines in the
//! extended grammar (power-only grammar for zones that are off). Faults can
//! be queued to reproduce the busy markers, garbage and silence seen on real
//! links.

use std::collections::VecDeque;

use nuvo_protocol::command::TONE_RANGE;
use nuvo_protocol::volume::MAX_ATTENUATION;
use nuvo_protocol::{BUSY_LINE, COMMAND_PREFIX};
use tracing::{debug, warn};

/// Reply sent for commands the amplifier doesn't understand
pub const ERROR_LINE: &str = "#?";

/// Number of sources on the simulated amplifier
const SOURCE_COUNT: u8 = 6;

/// Misbehaviour applied to the next command instead of a normal reply
///
/// The command is not applied when a fault is consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Answer `#Busy`
    Busy,
    /// Answer with an arbitrary line
    Garbage(String),
    /// Don't answer at all
    Silence,
}

/// State of one simulated zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualZone {
    pub power: bool,
    pub source: u8,
    /// Attenuation (0 = loudest, 78 = silent)
    pub attenuation: u8,
    pub mute: bool,
    pub treble: i8,
    pub bass: i8,
    pub dnd: bool,
    pub keypad_lock: bool,
}

impl Default for VirtualZone {
    fn default() -> Self {
        Self {
            power: false,
            source: 1,
            attenuation: 40,
            mute: false,
            treble: 0,
            bass: 0,
            dnd: false,
            keypad_lock: false,
        }
    }
}

/// Virtual multi-zone amplifier
pub struct VirtualAmplifier {
    /// Identifier for logging
    id: String,
    zones: Vec<VirtualZone>,
    faults: VecDeque<Fault>,
    /// Commands received (for test verification)
    received_commands: Vec<String>,
}

impl VirtualAmplifier {
    /// Create a new virtual amplifier with `zone_count` zones, all off
    pub fn new(id: impl Into<String>, zone_count: u8) -> Self {
        Self {
            id: id.into(),
            zones: vec![VirtualZone::default(); usize::from(zone_count)],
            faults: VecDeque::new(),
            received_commands: Vec::new(),
        }
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of zones
    pub fn zone_count(&self) -> u8 {
        // Constructed from a u8
        self.zones.len() as u8
    }

    /// Get a zone's state (1-based)
    pub fn zone(&self, zone: u8) -> Option<&VirtualZone> {
        self.zones.get(usize::from(zone).checked_sub(1)?)
    }

    /// Get a zone's state mutably (1-based)
    pub fn zone_mut(&mut self, zone: u8) -> Option<&mut VirtualZone> {
        self.zones.get_mut(usize::from(zone).checked_sub(1)?)
    }

    /// Queue a fault for the next command
    pub fn inject(&mut self, fault: Fault) {
        self.faults.push_back(fault);
    }

    /// Status line for a zone as the amplifier would report it
    pub fn status_line(&self, zone: u8) -> Option<String> {
        let state = self.zone(zone)?;
        if !state.power {
            return Some(format!("#Z{},OFF", zone));
        }

        let volume = if state.mute {
            "MUTE".to_string()
        } else {
            state.attenuation.to_string()
        };
        Some(format!(
            "#Z{},ON,SRC{},VOL{},DND{},LOCK{}",
            zone,
            state.source,
            volume,
            u8::from(state.dnd),
            u8::from(state.keypad_lock)
        ))
    }

    /// Process one command line (with or without the `*` prefix)
    ///
    /// Returns the reply line without terminator, or `None` when the
    /// amplifier stays silent.
    pub fn process_command(&mut self, line: &str) -> Option<String> {
        let line = line.trim();
        self.received_commands.push(line.to_string());

        if let Some(fault) = self.faults.pop_front() {
            debug!("Virtual amp {} injecting {:?} for {:?}", self.id, fault, line);
            return match fault {
                Fault::Busy => Some(BUSY_LINE.to_string()),
                Fault::Garbage(text) => Some(text),
                Fault::Silence => None,
            };
        }

        let body = line
            .strip_prefix(char::from(COMMAND_PREFIX))
            .unwrap_or(line);
        match self.apply(body) {
            Some(zone) => self.status_line(zone),
            None => {
                warn!("Virtual amp {} rejected {:?}", self.id, line);
                Some(ERROR_LINE.to_string())
            }
        }
    }

    /// Apply a command body such as `Z3VOL39`, returning the zone it addressed
    fn apply(&mut self, body: &str) -> Option<u8> {
        let rest = body.strip_prefix('Z')?;
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let zone: u8 = rest[..digits].parse().ok()?;
        let op = &rest[digits..];
        let state = self.zone_mut(zone)?;

        match op {
            "STATUS?" => {}
            "ON" => state.power = true,
            "OFF" => state.power = false,
            "MTON" => state.mute = true,
            "MTOFF" => state.mute = false,
            _ => {
                if let Some(value) = op.strip_prefix("VOL") {
                    let attenuation: u8 = value.parse().ok()?;
                    state.attenuation = attenuation.min(MAX_ATTENUATION);
                } else if let Some(value) = op.strip_prefix("TREB") {
                    state.treble = parse_tone(value)?;
                } else if let Some(value) = op.strip_prefix("BASS") {
                    state.bass = parse_tone(value)?;
                } else if let Some(value) = op.strip_prefix("SRC") {
                    let source: u8 = value.parse().ok()?;
                    if !(1..=SOURCE_COUNT).contains(&source) {
                        return None;
                    }
                    state.source = source;
                } else {
                    return None;
                }
            }
        }

        Some(zone)
    }

    /// Get all received commands (for test verification)
    pub fn received_commands(&self) -> &[String] {
        &self.received_commands
    }

    /// Clear received commands
    pub fn clear_received(&mut self) {
        self.received_commands.clear();
    }
}

fn parse_tone(value: &str) -> Option<i8> {
    let level: i8 = value.parse().ok()?;
    (TONE_RANGE.0..=TONE_RANGE.1)
        .contains(&level)
        .then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvo_protocol::decode_status;
    use proptest::prelude::*;

    #[test]
    fn test_virtual_amplifier_power() {
        let mut amp = VirtualAmplifier::new("test", 6);

        assert_eq!(amp.process_command("*Z1OFF").as_deref(), Some("#Z1,OFF"));
        assert!(!amp.zone(1).unwrap().power);

        let reply = amp.process_command("*Z1ON").unwrap();
        assert!(amp.zone(1).unwrap().power);
        assert!(decode_status(&reply).unwrap().power);
    }

    #[test]
    fn test_virtual_amplifier_volume_and_mute() {
        let mut amp = VirtualAmplifier::new("test", 6);
        amp.process_command("*Z2ON");

        amp.process_command("*Z2VOL39");
        assert_eq!(amp.zone(2).unwrap().attenuation, 39);

        let reply = amp.process_command("*Z2MTON").unwrap();
        assert_eq!(reply, "#Z2,ON,SRC1,VOLMUTE,DND0,LOCK0");
        assert!(decode_status(&reply).unwrap().mute);
    }

    #[test]
    fn test_virtual_amplifier_source_and_tone() {
        let mut amp = VirtualAmplifier::new("test", 6);

        amp.process_command("*Z3SRC5");
        amp.process_command("*Z3TREB-4");
        amp.process_command("*Z3BASS12");

        let zone = amp.zone(3).unwrap();
        assert_eq!(zone.source, 5);
        assert_eq!(zone.treble, -4);
        assert_eq!(zone.bass, 12);
    }

    #[test]
    fn test_virtual_amplifier_rejects_bad_commands() {
        let mut amp = VirtualAmplifier::new("test", 6);

        assert_eq!(amp.process_command("*Z7ON").as_deref(), Some(ERROR_LINE));
        assert_eq!(amp.process_command("*Z1SRC9").as_deref(), Some(ERROR_LINE));
        assert_eq!(amp.process_command("*Z1TREB13").as_deref(), Some(ERROR_LINE));
        assert_eq!(amp.process_command("hello").as_deref(), Some(ERROR_LINE));
    }

    #[test]
    fn test_faults_are_consumed_in_order() {
        let mut amp = VirtualAmplifier::new("test", 6);
        amp.inject(Fault::Busy);
        amp.inject(Fault::Silence);
        amp.inject(Fault::Garbage("Z0?".into()));

        assert_eq!(amp.process_command("*Z1ON").as_deref(), Some(BUSY_LINE));
        assert_eq!(amp.process_command("*Z1ON"), None);
        assert_eq!(amp.process_command("*Z1ON").as_deref(), Some("Z0?"));
        // Faulted commands are not applied
        assert!(!amp.zone(1).unwrap().power);

        assert!(amp.process_command("*Z1ON").is_some());
        assert!(amp.zone(1).unwrap().power);
    }

    #[test]
    fn test_virtual_amplifier_tracks_commands() {
        let mut amp = VirtualAmplifier::new("test", 6);

        amp.process_command("*Z1STATUS?");
        amp.process_command("*Z2ON");

        assert_eq!(amp.received_commands(), ["*Z1STATUS?", "*Z2ON"]);

        amp.clear_received();
        assert!(amp.received_commands().is_empty());
    }

    proptest! {
        #[test]
        fn status_line_always_decodes(
            zone in 1u8..=6,
            power: bool,
            mute: bool,
            attenuation in 0u8..=MAX_ATTENUATION,
            source in 1u8..=SOURCE_COUNT,
            dnd: bool,
        ) {
            let mut amp = VirtualAmplifier::new("prop", 6);
            *amp.zone_mut(zone).unwrap() = VirtualZone {
                power,
                source,
                attenuation,
                mute,
                dnd,
                ..Default::default()
            };

            let line = amp.status_line(zone).unwrap();
            let status = decode_status(&line).unwrap();

            prop_assert_eq!(status.zone, zone);
            prop_assert_eq!(status.power, power);
            if power {
                prop_assert_eq!(status.source, Some(source));
                prop_assert_eq!(status.dnd, Some(dnd));
                prop_assert_eq!(
                    status.mute,
                    mute || attenuation == 0 || attenuation == MAX_ATTENUATION
                );
            } else {
                prop_assert_eq!(status.source, None);
            }
        }
    }
}
