// mixcascade-cli — pipe a byte stream through a relay cascade
//
// `run` connects stdin/stdout to a cascade channel: everything read from
// stdin is tunneled through the relays, everything the cascade returns is
// written to stdout. `init-config` emits a configuration template.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mixcascade_core::{CascadeChannel, ChannelConfig, ChannelState, RelayDescriptor};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mixcascade-cli", version, about = "Client for a fixed mix cascade")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Tunnel stdin/stdout through the cascade described by the config
    Run {
        /// Path to the JSON channel configuration
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Write a configuration template to the given path
    InitConfig {
        /// Where to write the template
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Run { config } => run(&config),
        Command::InitConfig { path } => init_config(&path),
    }
}

fn load_config(path: &PathBuf) -> Result<ChannelConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: ChannelConfig =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(config_path: &PathBuf) -> Result<()> {
    let config = load_config(config_path)?;
    tracing::info!(relays = config.relays.len(), "opening cascade channel");
    let channel = Arc::new(CascadeChannel::open(config)?);

    // stdin → cascade. EOF requests an orderly release.
    let sender = {
        let channel = Arc::clone(&channel);
        thread::spawn(move || -> Result<()> {
            let mut stdin = std::io::stdin().lock();
            let mut buf = [0u8; 1024];
            loop {
                let n = stdin.read(&mut buf).context("reading stdin")?;
                if n == 0 {
                    tracing::info!("stdin closed, releasing channel");
                    channel.disconnect();
                    return Ok(());
                }
                if channel.write(&buf[..n]).is_err() {
                    return Ok(());
                }
            }
        })
    };

    // cascade → stdout.
    let mut stdout = std::io::stdout().lock();
    loop {
        let bytes = channel.read(1);
        if bytes.is_empty() {
            if channel.state() == ChannelState::Closed {
                break;
            }
            continue;
        }
        stdout.write_all(&bytes).context("writing stdout")?;
        stdout.flush().ok();
    }

    match sender.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("stdin worker panicked"),
    }
    if let Some(failure) = channel.failure() {
        anyhow::bail!("channel failed: {failure}");
    }
    let stats = channel.stats();
    tracing::info!(
        rounds = stats.rounds,
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        dummy_sent = stats.dummy_sent,
        "channel closed"
    );
    Ok(())
}

fn init_config(path: &PathBuf) -> Result<()> {
    let template = ChannelConfig {
        relays: vec![
            RelayDescriptor {
                address: "127.0.0.1:6001".parse()?,
                public_key: hex::encode([0u8; 32]),
            },
            RelayDescriptor {
                address: "127.0.0.1:6002".parse()?,
                public_key: hex::encode([0u8; 32]),
            },
            RelayDescriptor {
                address: "127.0.0.1:6003".parse()?,
                public_key: hex::encode([0u8; 32]),
            },
        ],
        ..ChannelConfig::default()
    };
    let json = serde_json::to_string_pretty(&template)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    eprintln!(
        "wrote template to {}; fill in the relay addresses and public keys",
        path.display()
    );
    Ok(())
}
