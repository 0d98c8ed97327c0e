//! Nuvo Amplifier Link
//!
//! This crate drives a Nuvo multi-zone amplifier over its half-duplex serial
//! link. It serializes concurrent callers onto the one physical connection,
//! matches each command with its reply, and retries status queries that come
//! back empty or garbled.
//!
//! # Architecture
//!
//! - [`Session`]: owns the connection; drain, write, and wait for the reply
//!   under one lock per exchange
//! - [`RetryPolicy`]: bounded retry with a fixed pause between attempts
//! - [`Amplifier`]: zone operations (status, power, mute, volume, tone,
//!   source, restore) returning an [`Outcome`]
//!
//! # Example
//!
//! ```rust,no_run
//! use nuvo_link::{Amplifier, SessionConfig};
//!
//! # async fn run() -> Result<(), nuvo_link::LinkError> {
//! let amp = Amplifier::open(SessionConfig::for_port("/dev/ttyUSB0"))?;
//!
//! if let Some(status) = amp.zone_status(3).await?.into_status() {
//!     println!("zone 3 power={} volume={}", status.power, status.volume);
//! }
//! amp.set_volume(3, 50.0).await?;
//! # Ok(())
//! # }
//! ```

pub mod amplifier;
pub mod config;
pub mod error;
pub mod retry;
pub mod serial;
pub mod session;

pub use amplifier::{Amplifier, Outcome, UnknownReason};
pub use config::SessionConfig;
pub use error::LinkError;
pub use retry::RetryPolicy;
pub use serial::open_serial;
pub use session::{Link, LinkEvent, Session};
