//! Nuvo amplifier command-line control
//!
//! Issues one zone operation against a serial-attached amplifier (or the
//! built-in virtual amplifier with `--simulate`) and prints the resulting
//! zone status as JSON.

mod config;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use nuvo_link::{Amplifier, Outcome};
use nuvo_protocol::ZoneStatus;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Control a Nuvo multi-zone amplifier over its serial port.
#[derive(Parser, Debug)]
#[command(name = "nuvoctl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON session config file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Serial port (overrides config file).
    #[arg(short, long)]
    port: Option<String>,

    /// Talk to an in-process virtual amplifier instead of a serial port.
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Query a zone's status
    Status { zone: u8 },
    /// Turn a zone on or off
    Power {
        zone: u8,
        #[arg(value_parser = parse_switch, action = ArgAction::Set)]
        state: bool,
    },
    /// Mute or unmute a zone
    Mute {
        zone: u8,
        #[arg(value_parser = parse_switch, action = ArgAction::Set)]
        state: bool,
    },
    /// Set a zone's volume (0-100 percent)
    Volume { zone: u8, percent: f64 },
    /// Set a zone's treble (-12..12)
    Treble {
        zone: u8,
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    /// Set a zone's bass (-12..12)
    Bass {
        zone: u8,
        #[arg(allow_negative_numbers = true)]
        level: i32,
    },
    /// Select a zone's source
    Source { zone: u8, source: u8 },
    /// Raise a zone's volume one step
    Up { zone: u8 },
    /// Lower a zone's volume one step
    Down { zone: u8 },
    /// Reapply a status previously printed by `status`
    Restore {
        /// JSON file holding the captured zone status
        file: PathBuf,
    },
}

fn parse_switch(value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => Err(format!("expected on or off, got {:?}", other)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "nuvoctl=info,nuvo_protocol=info,nuvo_link=info,nuvo_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.port = port;
    }

    if args.simulate {
        tracing::info!("Using virtual amplifier with {} zones", config.max_zone);
        let (stream, handle) = nuvo_sim::spawn_virtual_amp(config.max_zone);
        let amp = Amplifier::with_io(stream, config);
        let result = run(&amp, args.action).await;
        drop(amp);
        handle.shutdown().await.ok();
        return result;
    }

    if config.port.is_empty() {
        bail!("No serial port configured; pass --port or set \"port\" in the config file");
    }
    let amp = Amplifier::open(config)?;
    run(&amp, args.action).await
}

async fn run<T>(amp: &Amplifier<T>, action: Action) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let outcome = match action {
        Action::Status { zone } => amp.zone_status(zone).await?,
        Action::Power { zone, state } => amp.set_power(zone, state).await?,
        Action::Mute { zone, state } => amp.set_mute(zone, state).await?,
        Action::Volume { zone, percent } => amp.set_volume(zone, percent).await?,
        Action::Treble { zone, level } => amp.set_treble(zone, level).await?,
        Action::Bass { zone, level } => amp.set_bass(zone, level).await?,
        Action::Source { zone, source } => amp.set_source(zone, source).await?,
        Action::Up { zone } => amp.volume_up(zone).await?,
        Action::Down { zone } => amp.volume_down(zone).await?,
        Action::Restore { file } => return restore(amp, &file).await,
    };

    report(outcome)
}

async fn restore<T>(amp: &Amplifier<T>, file: &Path) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
{
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let snapshot: ZoneStatus = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse zone status in {}", file.display()))?;

    let outcomes = amp.restore(&snapshot).await?;
    let confirmed = outcomes.iter().filter(|o| o.is_known()).count();
    println!(
        "Restored zone {}: {}/{} commands confirmed",
        snapshot.zone,
        confirmed,
        outcomes.len()
    );
    match outcomes.into_iter().last() {
        Some(last) => report(last),
        None => Ok(()),
    }
}

fn report(outcome: Outcome) -> Result<()> {
    match outcome {
        Outcome::Known(status) => {
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Outcome::Unknown(reason) => bail!("Zone status unknown: {:?}", reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_switch() {
        assert_eq!(parse_switch("ON"), Ok(true));
        assert_eq!(parse_switch("off"), Ok(false));
        assert_eq!(parse_switch("1"), Ok(true));
        assert!(parse_switch("maybe").is_err());
    }

    #[test]
    fn test_args_parse_negative_tone() {
        let args = Args::try_parse_from(["nuvoctl", "--simulate", "treble", "3", "-6"]).unwrap();
        assert!(args.simulate);
        assert!(matches!(args.action, Action::Treble { zone: 3, level: -6 }));
    }

    #[test]
    fn test_args_port_override() {
        let args = Args::try_parse_from(["nuvoctl", "--port", "/dev/ttyS0", "power", "2", "on"])
            .unwrap();
        assert_eq!(args.port.as_deref(), Some("/dev/ttyS0"));
        assert!(matches!(args.action, Action::Power { zone: 2, state: true }));
    }

    #[tokio::test]
    async fn test_run_against_virtual_amp() {
        let (stream, handle) = nuvo_sim::spawn_virtual_amp(6);
        let amp = Amplifier::with_io(stream, nuvo_link::SessionConfig::default());

        run(&amp, Action::Power { zone: 2, state: true }).await.unwrap();
        let status = amp.zone_status(2).await.unwrap().into_status().unwrap();
        assert!(status.power);

        drop(amp);
        handle.shutdown().await.unwrap();
    }
}
