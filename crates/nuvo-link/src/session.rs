//! Serialized request/response session
//!
//! The amplifier link is half-duplex with no correlation token: the reply to
//! a command is simply the next status line for that zone. A [`Session`]
//! owns the connection behind an async mutex so that exactly one exchange is
//! in flight at a time, and every exchange follows the same steps:
//!
//! 1. drain anything already pending on the line (unsolicited pushes),
//! 2. write `*<command><CR>` and flush,
//! 3. read until a complete line arrives or the response deadline passes.
//!
//! Unsolicited lines seen along the way are published on a broadcast
//! channel; nothing is cached.

use std::io;
use std::time::Duration;

use nuvo_protocol::codec::{decode, LineCodec, Response};
use nuvo_protocol::{Command, EncodeCommand, ZoneStatus};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::error::LinkError;

/// Capacity of the unsolicited event channel
const EVENT_CAPACITY: usize = 64;

/// Bytes read from the connection per call
const READ_CHUNK: usize = 64;

/// Something the amplifier said without being asked
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// Status line pushed by the amplifier or addressed to another zone
    Status(ZoneStatus),
    /// Source display name announcement
    SourceName { zone: u8, name: String },
}

/// Outcome of one timed read
enum ReadOutcome {
    Data,
    Idle,
}

/// Exclusive access to the connection for one or more exchanges
///
/// Obtained from [`Session::lock`]. Holding a `Link` keeps every other caller
/// off the wire.
pub struct Link<T> {
    io: T,
    codec: LineCodec,
    io_timeout: Duration,
    response_timeout: Duration,
    events: broadcast::Sender<LinkEvent>,
}

impl<T> Link<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Send a command and wait for the status reply for its zone
    pub async fn request(&mut self, command: Command) -> Result<ZoneStatus, LinkError> {
        self.send(command).await?;
        self.await_reply(command).await
    }

    /// Drain pending input, then write and flush a command without waiting
    pub async fn send(&mut self, command: Command) -> Result<(), LinkError> {
        self.drain().await?;

        let bytes = command.encode();
        debug!("Sending {}", command);
        trace!("TX {:02X?}", bytes);
        self.io.write_all(&bytes).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Consume whatever the amplifier sent since the last exchange
    ///
    /// Stops at the first read that stays idle for the I/O timeout, and never
    /// runs longer than the response deadline. A trailing partial line is
    /// dropped so it can't be mistaken for the next reply.
    async fn drain(&mut self) -> Result<(), LinkError> {
        while let Some(line) = self.codec.next_line() {
            self.publish_unsolicited(&line);
        }

        let deadline = Instant::now() + self.response_timeout;
        while Instant::now() < deadline {
            match self.read_chunk(self.io_timeout).await? {
                ReadOutcome::Idle => break,
                ReadOutcome::Data => {
                    while let Some(line) = self.codec.next_line() {
                        self.publish_unsolicited(&line);
                    }
                }
            }
        }

        if self.codec.has_partial() {
            debug!("Dropping partial unsolicited line before sending");
            self.codec.clear();
        }
        Ok(())
    }

    /// Wait for the first line that answers `command`
    ///
    /// Status lines for other zones are published as unsolicited and skipped.
    /// Any other line settles the attempt: a busy marker or unrecognized text
    /// is returned as an error for the caller to retry or report.
    async fn await_reply(&mut self, command: Command) -> Result<ZoneStatus, LinkError> {
        let deadline = Instant::now() + self.response_timeout;

        loop {
            while let Some(line) = self.codec.next_line() {
                match decode(&line) {
                    Response::Status { status, .. } if status.zone == command.zone() => {
                        debug!("Reply to {}: {:?}", command, status);
                        return Ok(status);
                    }
                    Response::Status { status, .. } => {
                        debug!(
                            "Status for zone {} while waiting on zone {}",
                            status.zone,
                            command.zone()
                        );
                        self.publish(LinkEvent::Status(status));
                    }
                    Response::SourceName { zone, name } => {
                        self.publish(LinkEvent::SourceName { zone, name });
                        return Err(LinkError::Mismatch { line });
                    }
                    Response::Busy => return Err(LinkError::Busy),
                    Response::Unrecognized(line) => {
                        warn!("Unrecognized reply to {}: {:?}", command, line);
                        return Err(LinkError::Mismatch { line });
                    }
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("No reply to {} within {:?}", command, self.response_timeout);
                return Err(LinkError::Timeout {
                    ms: self.response_timeout.as_millis() as u64,
                });
            }

            self.read_chunk(remaining.min(self.io_timeout)).await?;
        }
    }

    /// Read once, feeding the codec
    async fn read_chunk(&mut self, wait: Duration) -> Result<ReadOutcome, LinkError> {
        let mut buf = [0u8; READ_CHUNK];
        match timeout(wait, self.io.read(&mut buf)).await {
            Ok(Ok(0)) => {
                warn!("Link closed while reading");
                Err(LinkError::Closed)
            }
            Ok(Ok(n)) => {
                trace!("RX {:02X?}", &buf[..n]);
                self.codec.push_bytes(&buf[..n]);
                Ok(ReadOutcome::Data)
            }
            // Serial drivers report an expired port timeout as an error
            Ok(Err(e))
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(ReadOutcome::Idle)
            }
            Ok(Err(e)) => Err(LinkError::Transport(e)),
            Err(_) => Ok(ReadOutcome::Idle),
        }
    }

    fn publish_unsolicited(&self, line: &str) {
        match decode(line) {
            Response::Status { status, .. } => {
                debug!("Unsolicited status for zone {}", status.zone);
                self.publish(LinkEvent::Status(status));
            }
            Response::SourceName { zone, name } => {
                self.publish(LinkEvent::SourceName { zone, name });
            }
            Response::Busy => debug!("Discarding stale busy marker"),
            Response::Unrecognized(line) => debug!("Discarding unsolicited line {:?}", line),
        }
    }

    fn publish(&self, event: LinkEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Shared handle to one amplifier connection
///
/// All methods take `&self`; wrap the session in an `Arc` to share it between
/// tasks. Callers are served in the order they reach the lock.
pub struct Session<T> {
    link: Mutex<Link<T>>,
    events: broadcast::Sender<LinkEvent>,
    config: SessionConfig,
}

impl<T> Session<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an open connection
    pub fn new(io: T, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let link = Link {
            io,
            codec: LineCodec::new(),
            io_timeout: config.io_timeout(),
            response_timeout: config.response_timeout(),
            events: events.clone(),
        };

        info!(
            "Session ready on {} (response timeout {}ms)",
            if config.port.is_empty() {
                "<stream>"
            } else {
                config.port.as_str()
            },
            config.response_timeout_ms
        );

        Self {
            link: Mutex::new(link),
            events,
            config,
        }
    }

    /// Session settings
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Receive unsolicited status lines seen by later exchanges
    pub fn subscribe(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Take exclusive use of the link for a sequence of exchanges
    pub async fn lock(&self) -> MutexGuard<'_, Link<T>> {
        self.link.lock().await
    }

    /// Perform one serialized command/reply exchange
    pub async fn request(&self, command: Command) -> Result<ZoneStatus, LinkError> {
        self.lock().await.request(command).await
    }
}

impl Session<tokio_serial::SerialStream> {
    /// Open the configured serial port and wrap it
    pub fn open(config: SessionConfig) -> Result<Self, LinkError> {
        let stream = crate::serial::open_serial(&config)?;
        Ok(Self::new(stream, config))
    }
}
