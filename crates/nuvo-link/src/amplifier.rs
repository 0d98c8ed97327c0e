//! Zone operations
//!
//! [`Amplifier`] is the surface a host application talks to. Every operation
//! validates its arguments against the deployment's zone and source ranges,
//! formats one command, and funnels it through the shared [`Session`].
//!
//! A reply that never arrives, or arrives in a shape that carries no status,
//! is not an error here: the operation reports [`Outcome::Unknown`] and the
//! host decides what to show. Only transport and argument failures are `Err`.

use nuvo_protocol::command::{
    format_set_bass, format_set_mute, format_set_power, format_set_source, format_set_treble,
    format_set_volume, format_zone_status_request,
};
use nuvo_protocol::volume::{percent_to_raw, MAX_ATTENUATION};
use nuvo_protocol::{ArgumentError, Command, ZoneStatus};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::LinkError;
use crate::retry::RetryPolicy;
use crate::session::Session;

/// Why an operation ended without a confirmed zone status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// Nothing arrived before the response deadline
    Timeout,
    /// The amplifier answered `#Busy`
    Busy,
    /// A line arrived that carried no status for the zone
    Mismatch(String),
}

/// Result of a zone operation
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The amplifier confirmed the zone state
    Known(ZoneStatus),
    /// The command may or may not have been applied
    Unknown(UnknownReason),
}

impl Outcome {
    /// Fold an exchange result into an outcome, passing hard failures through
    fn settle(result: Result<ZoneStatus, LinkError>) -> Result<Self, LinkError> {
        match result {
            Ok(status) => Ok(Outcome::Known(status)),
            Err(LinkError::Timeout { .. }) => Ok(Outcome::Unknown(UnknownReason::Timeout)),
            Err(LinkError::Busy) => Ok(Outcome::Unknown(UnknownReason::Busy)),
            Err(LinkError::Mismatch { line }) => {
                Ok(Outcome::Unknown(UnknownReason::Mismatch(line)))
            }
            Err(e) => Err(e),
        }
    }

    /// The confirmed status, if any
    pub fn status(&self) -> Option<&ZoneStatus> {
        match self {
            Outcome::Known(status) => Some(status),
            Outcome::Unknown(_) => None,
        }
    }

    /// Consume the outcome, keeping the confirmed status
    pub fn into_status(self) -> Option<ZoneStatus> {
        match self {
            Outcome::Known(status) => Some(status),
            Outcome::Unknown(_) => None,
        }
    }

    /// Whether the amplifier confirmed the state
    pub fn is_known(&self) -> bool {
        matches!(self, Outcome::Known(_))
    }
}

/// High-level control of one multi-zone amplifier
pub struct Amplifier<T> {
    session: Session<T>,
    retry: RetryPolicy,
}

impl<T> Amplifier<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a session, taking the retry policy from its config
    pub fn new(session: Session<T>) -> Self {
        let retry = session.config().retry_policy();
        Self { session, retry }
    }

    /// Wrap a connection with the given config
    pub fn with_io(io: T, config: SessionConfig) -> Self {
        Self::new(Session::new(io, config))
    }

    /// Underlying session (for subscribing to unsolicited events)
    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    fn check_zone(&self, zone: u8) -> Result<u8, ArgumentError> {
        let max = self.session.config().max_zone;
        if zone == 0 || zone > max {
            return Err(ArgumentError::ZoneOutOfRange {
                zone: u32::from(zone),
                max,
            });
        }
        Ok(zone)
    }

    fn check_source(&self, source: u8) -> Result<u8, ArgumentError> {
        let max = self.session.config().max_source;
        if source == 0 || source > max {
            return Err(ArgumentError::SourceOutOfRange {
                id: u32::from(source),
                max,
            });
        }
        Ok(source)
    }

    /// Run one command; status queries go through the retry policy
    async fn issue(&self, command: Command) -> Result<Outcome, LinkError> {
        let result = if command.is_query() {
            let label = command.to_string();
            self.retry
                .run(&label, |_| self.session.request(command))
                .await
        } else {
            self.session.request(command).await
        };

        let outcome = Outcome::settle(result)?;
        if let Outcome::Unknown(reason) = &outcome {
            warn!("{} left zone {} unknown: {:?}", command, command.zone(), reason);
        }
        Ok(outcome)
    }

    /// Query a zone, retrying per the session's policy
    pub async fn zone_status(&self, zone: u8) -> Result<Outcome, LinkError> {
        self.issue(format_zone_status_request(self.check_zone(zone)?)?).await
    }

    /// Capture a zone's state for a later [`restore`](Self::restore)
    pub async fn snapshot(&self, zone: u8) -> Result<Option<ZoneStatus>, LinkError> {
        let snapshot = self.zone_status(zone).await?.into_status();
        if snapshot.is_none() {
            warn!("Snapshot of zone {} failed: status unknown", zone);
        }
        Ok(snapshot)
    }

    /// Turn a zone on or off
    pub async fn set_power(&self, zone: u8, on: bool) -> Result<Outcome, LinkError> {
        self.issue(format_set_power(self.check_zone(zone)?, on)?).await
    }

    /// Mute or unmute a zone
    pub async fn set_mute(&self, zone: u8, on: bool) -> Result<Outcome, LinkError> {
        self.issue(format_set_mute(self.check_zone(zone)?, on)?).await
    }

    /// Set a zone's volume as a percentage (0..=100)
    pub async fn set_volume(&self, zone: u8, percent: f64) -> Result<Outcome, LinkError> {
        let command = format_set_volume(self.check_zone(zone)?, percent)?;
        if !(0.0..=100.0).contains(&percent) {
            debug!("Volume {} clamped to {}", percent, command);
        }
        self.issue(command).await
    }

    /// Set a zone's treble (-12..=12, clamped)
    pub async fn set_treble(&self, zone: u8, level: i32) -> Result<Outcome, LinkError> {
        self.issue(format_set_treble(self.check_zone(zone)?, level)?).await
    }

    /// Set a zone's bass (-12..=12, clamped)
    pub async fn set_bass(&self, zone: u8, level: i32) -> Result<Outcome, LinkError> {
        self.issue(format_set_bass(self.check_zone(zone)?, level)?).await
    }

    /// Select a zone's source
    pub async fn set_source(&self, zone: u8, source: u8) -> Result<Outcome, LinkError> {
        let zone = self.check_zone(zone)?;
        let source = self.check_source(source)?;
        self.issue(format_set_source(zone, source)?).await
    }

    /// Raise a zone's volume by one attenuation step
    pub async fn volume_up(&self, zone: u8) -> Result<Outcome, LinkError> {
        self.step_volume(zone, |raw| raw.saturating_sub(1)).await
    }

    /// Lower a zone's volume by one attenuation step
    pub async fn volume_down(&self, zone: u8) -> Result<Outcome, LinkError> {
        self.step_volume(zone, |raw| (raw + 1).min(MAX_ATTENUATION)).await
    }

    /// Step from the reported level
    ///
    /// A muted or powered-off zone reports no usable level (the status
    /// carries the fallback volume), so the step is skipped and the current
    /// status returned unchanged. Attenuation 0 and 78 also read as muted and
    /// are skipped the same way.
    async fn step_volume(&self, zone: u8, step: fn(u8) -> u8) -> Result<Outcome, LinkError> {
        let status = match self.zone_status(zone).await? {
            Outcome::Known(status) => status,
            unknown => return Ok(unknown),
        };
        if status.mute {
            debug!("Zone {} reports no volume level, not stepping", zone);
            return Ok(Outcome::Known(status));
        }

        let attenuation = step(percent_to_raw(status.volume));
        self.issue(Command::Volume { zone, attenuation }).await
    }

    /// Return a zone to a captured state
    ///
    /// Reissues power, mute, volume and source in that order while holding
    /// the link. Treble and bass are not restored since no reply reports
    /// them. A transport failure stops the sequence and leaves the zone
    /// partially restored; nothing is rolled back.
    pub async fn restore(&self, snapshot: &ZoneStatus) -> Result<Vec<Outcome>, LinkError> {
        let zone = self.check_zone(snapshot.zone)?;
        let mut commands = vec![
            format_set_power(zone, snapshot.power)?,
            format_set_mute(zone, snapshot.mute)?,
            format_set_volume(zone, snapshot.volume)?,
        ];
        if let Some(source) = snapshot.source {
            commands.push(format_set_source(zone, source)?);
        }

        info!("Restoring zone {} ({} commands)", zone, commands.len());
        let mut link = self.session.lock().await;
        let mut outcomes = Vec::with_capacity(commands.len());
        for command in commands {
            outcomes.push(Outcome::settle(link.request(command).await)?);
        }
        Ok(outcomes)
    }
}

impl Amplifier<tokio_serial::SerialStream> {
    /// Open the configured serial port
    pub fn open(config: SessionConfig) -> Result<Self, LinkError> {
        Ok(Self::new(Session::open(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuvo_protocol::ReportedVolume;
    use tokio::io::duplex;

    #[test]
    fn test_settle_maps_soft_failures_to_unknown() {
        assert_eq!(
            Outcome::settle(Err(LinkError::Timeout { ms: 2500 })).unwrap(),
            Outcome::Unknown(UnknownReason::Timeout)
        );
        assert_eq!(
            Outcome::settle(Err(LinkError::Busy)).unwrap(),
            Outcome::Unknown(UnknownReason::Busy)
        );
        assert!(Outcome::settle(Err(LinkError::Closed)).is_err());

        let status = ZoneStatus::new(1, true, Some(1), ReportedVolume::Attenuation(10));
        assert!(Outcome::settle(Ok(status)).unwrap().is_known());
    }

    #[tokio::test]
    async fn test_zone_out_of_config_range_fails_before_io() {
        let (host, _amp) = duplex(64);
        let config = SessionConfig {
            max_zone: 6,
            ..Default::default()
        };
        let amp = Amplifier::with_io(host, config);

        assert!(matches!(
            amp.set_power(7, true).await,
            Err(LinkError::Argument(ArgumentError::ZoneOutOfRange { zone: 7, max: 6 }))
        ));
        assert!(matches!(
            amp.zone_status(0).await,
            Err(LinkError::Argument(_))
        ));
    }

    #[tokio::test]
    async fn test_source_out_of_config_range_fails_before_io() {
        let (host, _amp) = duplex(64);
        let amp = Amplifier::with_io(host, SessionConfig::default());

        assert!(matches!(
            amp.set_source(1, 7).await,
            Err(LinkError::Argument(ArgumentError::SourceOutOfRange { id: 7, max: 6 }))
        ));
    }

    #[tokio::test]
    async fn test_non_finite_volume_fails_before_io() {
        let (host, _amp) = duplex(64);
        let amp = Amplifier::with_io(host, SessionConfig::default());

        assert!(matches!(
            amp.set_volume(1, f64::NAN).await,
            Err(LinkError::Argument(ArgumentError::NotFinite { .. }))
        ));
    }
}
