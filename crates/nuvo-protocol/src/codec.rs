//! Line framing and response decoding
//!
//! The amplifier terminates every line with a carriage return. [`LineCodec`]
//! accumulates bytes until a terminator, strips it, and yields the trimmed
//! ASCII text. [`decode`] then tries each dialect grammar in priority order;
//! the first grammar that matches wins.
//!
//! Grammars are matched anywhere in the line, so stray bytes left over from
//! a previous partial transmission don't hide an otherwise valid status.

use tracing::{debug, trace};

use crate::status::{ReportedVolume, ZoneStatus};
use crate::{Dialect, BUSY_LINE, TERMINATOR};

/// Longest line accepted before the buffer is discarded
pub const MAX_LINE_LEN: usize = 128;

/// Decoded meaning of one response line
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// A complete zone status in one of the status grammars
    Status { dialect: Dialect, status: ZoneStatus },
    /// Source display name announcement (informational)
    SourceName { zone: u8, name: String },
    /// Amplifier asked us to try again later
    Busy,
    /// Line matched no known grammar
    Unrecognized(String),
}

impl Response {
    /// The zone status carried by this response, if any
    pub fn into_status(self) -> Option<ZoneStatus> {
        match self {
            Response::Status { status, .. } => Some(status),
            _ => None,
        }
    }
}

/// Streaming line framer
pub struct LineCodec {
    buffer: Vec<u8>,
}

impl LineCodec {
    /// Create a new line codec
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(MAX_LINE_LEN),
        }
    }

    /// Push raw bytes into the buffer
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);

        // Prevent unbounded growth when no terminator ever arrives
        if self.buffer.len() > MAX_LINE_LEN && !self.buffer.contains(&TERMINATOR) {
            debug!(
                "Discarding {} bytes without a line terminator",
                self.buffer.len()
            );
            self.buffer.clear();
        }
    }

    /// Extract the next complete, non-empty line
    ///
    /// The terminator is stripped and surrounding whitespace trimmed. Bytes
    /// that aren't valid ASCII are replaced rather than rejected so the line
    /// can still be reported as unrecognized.
    pub fn next_line(&mut self) -> Option<String> {
        loop {
            let end = self.buffer.iter().position(|&b| b == TERMINATOR)?;
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw[..end]).trim().to_string();
            if line.is_empty() {
                continue;
            }
            trace!("Framed line: {:?}", line);
            return Some(line);
        }
    }

    /// Whether a partial line is waiting for its terminator
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Clear the internal buffer
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

type Grammar = fn(&str) -> Option<Response>;

/// Dialect grammars in priority order
///
/// The power-only grammar is a prefix of the extended one, so it must stay
/// after it.
const GRAMMARS: &[(Dialect, Grammar)] = &[
    (Dialect::Concerto, parse_concerto),
    (Dialect::Extended, parse_extended),
    (Dialect::PowerOnly, parse_power_only),
    (Dialect::SourceName, parse_source_name),
];

/// Decode one framed line
pub fn decode(line: &str) -> Response {
    let line = line.trim();

    for (dialect, grammar) in GRAMMARS {
        if let Some(response) = grammar(line) {
            debug!("Matched {} grammar: {:?}", dialect.name(), line);
            return response;
        }
    }

    if line == BUSY_LINE {
        debug!("Amplifier busy");
        return Response::Busy;
    }

    debug!("No grammar matched: {:?}", line);
    Response::Unrecognized(line.to_string())
}

/// Decode one framed line, keeping only a zone status
pub fn decode_status(line: &str) -> Option<ZoneStatus> {
    decode(line).into_status()
}

/// Try `attempt` at every occurrence of `anchor` in `line`
fn search<'a, T>(
    line: &'a str,
    anchor: &str,
    attempt: impl Fn(&'a str) -> Option<T>,
) -> Option<T> {
    line.match_indices(anchor)
        .find_map(|(start, _)| attempt(&line[start + anchor.len()..]))
}

/// `Z0xPWR(ON|OFF),SRCs,VOL(-yy|MT)`
fn parse_concerto(line: &str) -> Option<Response> {
    search(line, "Z0", |rest| {
        let mut s = Scanner::new(rest);
        let zone = s.digits(1, 1)?;
        s.tag("PWR")?;
        let power = s.power()?;
        s.tag(",SRC")?;
        let source = s.digits(1, 1)?;
        s.tag(",VOL")?;
        let volume = if s.tag("MT").is_some() {
            ReportedVolume::Muted
        } else {
            s.tag("-")?;
            ReportedVolume::Attenuation(s.digits(2, 2)?)
        };

        let zone = nonzero(zone)?;
        Some(Response::Status {
            dialect: Dialect::Concerto,
            status: ZoneStatus::new(zone, power, Some(source), volume),
        })
    })
}

/// `#Zx,(ON|OFF),SRCs,VOL(yy|MUTE),DND(0|1),LOCK(0|1)`
fn parse_extended(line: &str) -> Option<Response> {
    search(line, "#Z", |rest| {
        let mut s = Scanner::new(rest);
        let zone = s.digits(1, 2)?;
        s.tag(",")?;
        let power = s.power()?;
        s.tag(",SRC")?;
        let source = s.digits(1, 1)?;
        s.tag(",VOL")?;
        let volume = if s.tag("MUTE").is_some() {
            ReportedVolume::Muted
        } else {
            ReportedVolume::Attenuation(s.digits(1, 2)?)
        };
        s.tag(",DND")?;
        let dnd = s.flag()?;
        s.tag(",LOCK")?;
        let keypad_lock = s.flag()?;

        let zone = nonzero(zone)?;
        Some(Response::Status {
            dialect: Dialect::Extended,
            status: ZoneStatus::new(zone, power, Some(source), volume)
                .with_flags(dnd, keypad_lock),
        })
    })
}

/// `#Zx,(ON|OFF)` and nothing after it
///
/// A truncated extended line starts the same way, so this grammar only
/// accepts the whole line.
fn parse_power_only(line: &str) -> Option<Response> {
    search(line, "#Z", |rest| {
        let mut s = Scanner::new(rest);
        let zone = s.digits(1, 2)?;
        s.tag(",")?;
        let power = s.power()?;
        s.end()?;

        let zone = nonzero(zone)?;
        Some(Response::Status {
            dialect: Dialect::PowerOnly,
            status: ZoneStatus::new(zone, power, None, ReportedVolume::Absent),
        })
    })
}

/// `Z0xSTR+"NAME"`
fn parse_source_name(line: &str) -> Option<Response> {
    search(line, "Z0", |rest| {
        let mut s = Scanner::new(rest);
        let zone = s.digits(1, 1)?;
        s.tag("STR+\"")?;
        let rest = s.rest();
        let close = rest.rfind('"')?;

        Some(Response::SourceName {
            zone: nonzero(zone)?,
            name: rest[..close].to_string(),
        })
    })
}

fn nonzero(zone: u8) -> Option<u8> {
    (zone != 0).then_some(zone)
}

/// Minimal left-to-right matcher over a line
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(rest: &'a str) -> Self {
        Self { rest }
    }

    fn rest(&self) -> &'a str {
        self.rest
    }

    fn tag(&mut self, tag: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(tag)?;
        Some(())
    }

    fn end(&self) -> Option<()> {
        self.rest.is_empty().then_some(())
    }

    /// Between `min` and `max` ASCII digits, taken greedily
    fn digits(&mut self, min: usize, max: usize) -> Option<u8> {
        let len = self
            .rest
            .bytes()
            .take(max)
            .take_while(u8::is_ascii_digit)
            .count();
        if len < min {
            return None;
        }
        let (digits, rest) = self.rest.split_at(len);
        self.rest = rest;
        digits.parse().ok()
    }

    fn power(&mut self) -> Option<bool> {
        if self.tag("ON").is_some() {
            Some(true)
        } else if self.tag("OFF").is_some() {
            Some(false)
        } else {
            None
        }
    }

    fn flag(&mut self) -> Option<bool> {
        if self.tag("1").is_some() {
            Some(true)
        } else if self.tag("0").is_some() {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_VOLUME_PERCENT;

    #[test]
    fn test_frame_single_line() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"#Z1,OFF\r");
        assert_eq!(codec.next_line().as_deref(), Some("#Z1,OFF"));
        assert!(codec.next_line().is_none());
    }

    #[test]
    fn test_frame_partial_line() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"#Z1,O");
        assert!(codec.next_line().is_none());
        assert!(codec.has_partial());

        codec.push_bytes(b"N\r");
        assert_eq!(codec.next_line().as_deref(), Some("#Z1,ON"));
        assert!(!codec.has_partial());
    }

    #[test]
    fn test_frame_multiple_lines_and_blank_lines() {
        let mut codec = LineCodec::new();
        codec.push_bytes(b"\r\n#Z1,ON\r\n#Busy\r");
        assert_eq!(codec.next_line().as_deref(), Some("#Z1,ON"));
        assert_eq!(codec.next_line().as_deref(), Some("#Busy"));
        assert!(codec.next_line().is_none());
    }

    #[test]
    fn test_frame_overflow_discards() {
        let mut codec = LineCodec::new();
        codec.push_bytes(&[b'x'; MAX_LINE_LEN + 1]);
        assert!(!codec.has_partial());
    }

    #[test]
    fn test_decode_extended_muted() {
        let response = decode("#Z3,ON,SRC2,VOLMUTE,DND0,LOCK1");
        let Response::Status { dialect, status } = response else {
            panic!("expected a status response");
        };
        assert_eq!(dialect, Dialect::Extended);
        assert_eq!(status.zone, 3);
        assert!(status.power);
        assert_eq!(status.source, Some(2));
        assert!(status.mute);
        assert_eq!(status.volume, 0.0);
        assert_eq!(status.dnd, Some(false));
        assert_eq!(status.keypad_lock, Some(true));
    }

    #[test]
    fn test_decode_extended_two_digit_zone() {
        let status = decode_status("#Z12,OFF,SRC6,VOL39,DND1,LOCK0").unwrap();
        assert_eq!(status.zone, 12);
        assert!(!status.power);
        assert_eq!(status.source, Some(6));
        assert_eq!(status.volume, 50.0);
        assert!(!status.mute);
    }

    #[test]
    fn test_decode_concerto() {
        let response = decode("#Z02PWRON,SRC4,VOL-39");
        let Response::Status { dialect, status } = response else {
            panic!("expected a status response");
        };
        assert_eq!(dialect, Dialect::Concerto);
        assert_eq!(status.zone, 2);
        assert!(status.power);
        assert_eq!(status.source, Some(4));
        assert_eq!(status.volume, 50.0);
    }

    #[test]
    fn test_decode_concerto_muted() {
        let status = decode_status("Z05PWROFF,SRC1,VOLMT").unwrap();
        assert_eq!(status.zone, 5);
        assert!(!status.power);
        assert!(status.mute);
        assert_eq!(status.volume, 0.0);
    }

    #[test]
    fn test_decode_power_only() {
        let response = decode("#Z7,OFF");
        let Response::Status { dialect, status } = response else {
            panic!("expected a status response");
        };
        assert_eq!(dialect, Dialect::PowerOnly);
        assert_eq!(status.zone, 7);
        assert!(!status.power);
        assert_eq!(status.source, None);
        assert!(status.mute);
        assert_eq!(status.volume, DEFAULT_VOLUME_PERCENT);
    }

    #[test]
    fn test_decode_source_name() {
        assert_eq!(
            decode("Z02STR+\"TUNER\""),
            Response::SourceName {
                zone: 2,
                name: "TUNER".to_string()
            }
        );
        assert!(decode_status("Z02STR+\"TUNER\"").is_none());
    }

    #[test]
    fn test_decode_busy() {
        assert_eq!(decode("#Busy"), Response::Busy);
        assert!(decode_status("#Busy").is_none());
    }

    #[test]
    fn test_decode_malformed_fragment() {
        // Missing the volume field entirely
        assert!(matches!(
            decode("Z02PWRON,SRC1"),
            Response::Unrecognized(_)
        ));
        assert!(decode_status("#Z,ON,SRC2").is_none());
        assert!(decode_status("garbage").is_none());
        assert!(decode_status("").is_none());
    }

    #[test]
    fn test_decode_truncated_extended_line() {
        for line in [
            "#Z3,ON,SRC2,VOL20,DND0,LOCK",
            "#Z3,ON,SRC2,VOL20,DND0",
            "#Z3,ON,SRC2",
            "#Z3,OFF,",
        ] {
            assert!(
                matches!(decode(line), Response::Unrecognized(_)),
                "{:?} decoded as a status",
                line
            );
        }
    }

    #[test]
    fn test_decode_rejects_zone_zero() {
        assert!(decode_status("#Z0,ON").is_none());
        assert!(decode_status("Z00PWRON,SRC1,VOL-20").is_none());
    }

    #[test]
    fn test_decode_with_leading_noise() {
        let status = decode_status("\u{0}xx#Z4,ON,SRC1,VOL20,DND0,LOCK0").unwrap();
        assert_eq!(status.zone, 4);
    }

    #[test]
    fn test_extended_preferred_over_power_only() {
        let response = decode("#Z4,ON,SRC1,VOL20,DND0,LOCK0");
        assert!(matches!(
            response,
            Response::Status {
                dialect: Dialect::Extended,
                ..
            }
        ));
    }

    #[test]
    fn test_attenuation_above_max_is_clamped() {
        let status = decode_status("#Z1,ON,SRC1,VOL99,DND0,LOCK0").unwrap();
        assert!(status.mute);
        assert_eq!(status.volume, 0.0);
    }
}
