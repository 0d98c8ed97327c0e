//! Nuvo Protocol Library
//!
//! This crate provides line framing, response decoding and command encoding
//! for Nuvo multi-zone audio amplifiers controlled over RS-232.
//!
//! The amplifier speaks single-line ASCII in both directions:
//!
//! - Commands sent to the amplifier: `*Z3VOL39<CR>`
//! - Status lines from the amplifier: `#Z3,ON,SRC2,VOL39,DND0,LOCK0<CR>`
//!
//! Status lines arrive both as replies and unsolicited, and several firmware
//! families (dialects) use incompatible grammars for the same information.
//!
//! # Architecture
//!
//! - [`codec`]: streaming line framer plus an ordered table of dialect grammars
//! - [`command`]: typed commands with value clamping and wire encoding
//! - [`status`]: the decoded [`ZoneStatus`] snapshot and its fallback policy
//! - [`volume`]: conversions between device attenuation and percentage
//!
//! # Example
//!
//! ```rust
//! use nuvo_protocol::codec::{LineCodec, Response};
//!
//! let mut codec = LineCodec::new();
//! codec.push_bytes(b"#Z3,ON,SRC2,VOL39,DND0,LOCK0\r");
//!
//! let line = codec.next_line().unwrap();
//! if let Response::Status { status, .. } = nuvo_protocol::codec::decode(&line) {
//!     assert_eq!(status.zone, 3);
//!     assert_eq!(status.source, Some(2));
//! }
//! ```

pub mod codec;
pub mod command;
pub mod error;
pub mod status;
pub mod volume;

pub use codec::{decode, decode_status, LineCodec, Response};
pub use command::Command;
pub use error::ArgumentError;
pub use status::{ReportedVolume, ZoneStatus, DEFAULT_VOLUME_PERCENT};

/// Line terminator used in both directions (carriage return)
pub const TERMINATOR: u8 = b'\r';

/// Prefix placed in front of every outbound command
pub const COMMAND_PREFIX: u8 = b'*';

/// Literal line the amplifier sends when it cannot service a request yet
pub const BUSY_LINE: &str = "#Busy";

/// Identifies which firmware grammar produced a response line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dialect {
    /// Concerto combined status: `Z0xPWRON,SRCs,VOL-yy`
    Concerto,
    /// Extended status with DND and keypad lock: `#Zx,ON,SRCs,VOLyy,DNDd,LOCKl`
    Extended,
    /// Power-only acknowledgment: `#Zx,OFF`
    PowerOnly,
    /// Source display name announcement: `Z0xSTR+"NAME"`
    SourceName,
}

impl Dialect {
    /// Returns a human-readable name for the dialect
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Concerto => "Concerto",
            Dialect::Extended => "Extended",
            Dialect::PowerOnly => "Power-only",
            Dialect::SourceName => "Source name",
        }
    }
}

/// Trait for commands that can be encoded to bytes
pub trait EncodeCommand {
    /// Encode this command to its framed wire format
    fn encode(&self) -> Vec<u8>;
}
