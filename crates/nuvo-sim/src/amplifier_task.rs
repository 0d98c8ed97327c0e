//! Virtual amplifier actor task
//!
//! This module provides a pure async task that owns a VirtualAmplifier and
//! talks to the host over an async stream. The task uses a select! loop to:
//! - Read command lines from the stream and answer them
//! - Apply control commands (fault injection, unsolicited pushes, shutdown)
//! - Emit an event for every command line received

use std::io;

use nuvo_protocol::codec::LineCodec;
use nuvo_protocol::TERMINATOR;
use tokio::io::{duplex, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Fault, VirtualAmplifier};

/// Buffer size of the in-memory link created by [`spawn_virtual_amp`]
const DUPLEX_CAPACITY: usize = 1024;

/// Commands that can be sent to a virtual amplifier actor
#[derive(Debug, Clone)]
pub enum VirtualAmpCommand {
    /// Queue a fault for the next command line
    Inject(Fault),
    /// Write a line to the host without being asked
    Push(String),
    /// Shutdown the virtual amplifier actor
    Shutdown,
}

/// Event emitted for each command line the virtual amplifier receives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualAmpEvent {
    /// Line as received, without terminator
    pub command: String,
    /// Reply written back, if any
    pub reply: Option<String>,
}

/// Run the virtual amplifier actor task
///
/// Returns when the stream closes, a shutdown command arrives, or the
/// control channel is dropped.
pub async fn run_virtual_amp_task<S>(
    mut stream: S,
    mut amp: VirtualAmplifier,
    mut cmd_rx: mpsc::Receiver<VirtualAmpCommand>,
    event_tx: broadcast::Sender<VirtualAmpEvent>,
) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut codec = LineCodec::new();
    let mut buf = [0u8; 256];

    info!(
        "Starting virtual amplifier task for {} ({} zones)",
        amp.id(),
        amp.zone_count()
    );

    loop {
        tokio::select! {
            // Control commands first so an injected fault applies to the
            // command line that follows it
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(VirtualAmpCommand::Inject(fault)) => {
                        debug!("Virtual amp {} queued {:?}", amp.id(), fault);
                        amp.inject(fault);
                    }
                    Some(VirtualAmpCommand::Push(line)) => {
                        debug!("Virtual amp {} pushing {:?}", amp.id(), line);
                        write_line(&mut stream, &line).await?;
                    }
                    Some(VirtualAmpCommand::Shutdown) => {
                        info!("Virtual amplifier {} shutting down", amp.id());
                        break;
                    }
                    None => {
                        debug!("Control channel closed for {}", amp.id());
                        break;
                    }
                }
            }

            result = stream.read(&mut buf) => {
                match result {
                    Ok(0) => {
                        debug!("Virtual amplifier stream closed for {}", amp.id());
                        break;
                    }
                    Ok(n) => {
                        codec.push_bytes(&buf[..n]);
                        while let Some(line) = codec.next_line() {
                            let reply = amp.process_command(&line);
                            if let Some(reply) = &reply {
                                write_line(&mut stream, reply).await?;
                            }
                            let _ = event_tx.send(VirtualAmpEvent {
                                command: line,
                                reply,
                            });
                        }
                    }
                    Err(e) => {
                        warn!("Virtual amplifier {} stream error: {}", amp.id(), e);
                        return Err(e);
                    }
                }
            }
        }
    }

    info!("Virtual amplifier task ended for {}", amp.id());
    Ok(())
}

async fn write_line<S>(stream: &mut S, line: &str) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(&[TERMINATOR]).await?;
    stream.flush().await
}

/// Control handle for a spawned virtual amplifier
pub struct VirtualAmpHandle {
    cmd_tx: mpsc::Sender<VirtualAmpCommand>,
    event_tx: broadcast::Sender<VirtualAmpEvent>,
    task: JoinHandle<io::Result<()>>,
}

impl VirtualAmpHandle {
    /// Queue a fault for the next command line
    pub async fn inject(&self, fault: Fault) {
        let _ = self.cmd_tx.send(VirtualAmpCommand::Inject(fault)).await;
    }

    /// Send a line to the host unprompted
    pub async fn push_unsolicited(&self, line: impl Into<String>) {
        let _ = self.cmd_tx.send(VirtualAmpCommand::Push(line.into())).await;
    }

    /// Receive an event per command line handled from now on
    pub fn subscribe(&self) -> broadcast::Receiver<VirtualAmpEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the task and wait for it to finish
    pub async fn shutdown(self) -> io::Result<()> {
        let _ = self.cmd_tx.send(VirtualAmpCommand::Shutdown).await;
        match self.task.await {
            Ok(result) => result,
            Err(e) => Err(io::Error::other(e)),
        }
    }
}

/// Spawn a virtual amplifier on an in-memory link
///
/// Returns the host end of the link and a handle controlling the amplifier.
/// Must be called from within a Tokio runtime.
pub fn spawn_virtual_amp(zone_count: u8) -> (DuplexStream, VirtualAmpHandle) {
    let (host, device) = duplex(DUPLEX_CAPACITY);
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, _) = broadcast::channel(64);

    let amp = VirtualAmplifier::new("virtual", zone_count);
    let task = tokio::spawn(run_virtual_amp_task(device, amp, cmd_rx, event_tx.clone()));

    (
        host,
        VirtualAmpHandle {
            cmd_tx,
            event_tx,
            task,
        },
    )
}
