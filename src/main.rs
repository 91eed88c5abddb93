//! keyjoy - keyboard teleop bridge
//!
//! Main entry point: CLI, logging, config, signal handling.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossterm::style::Stylize;
use tracing::info;

use keyjoy::{
    Bridge, BridgeConfig, BridgeOptions, FdKeys, ShutdownSignal, SinkConfig, SystemClock,
};
use keyjoy_transport::{JsonLinesSink, MessageSink, UdpSink};

#[derive(Parser)]
#[command(name = "keyjoy")]
#[command(author, version, about = "Publish joystick control messages from terminal keystrokes")]
struct Cli {
    /// Config file path (default: ~/.config/keyjoy/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Publish period in milliseconds
    #[arg(long, value_name = "MS")]
    period_ms: Option<u64>,

    /// Message sink
    #[arg(long, value_enum)]
    sink: Option<SinkKind>,

    /// UDP target (host:port), implies --sink udp; rejected with --sink stdout
    #[arg(long, value_name = "ADDR")]
    target: Option<String>,

    /// Topic name attached to each message
    #[arg(long)]
    topic: Option<String>,

    /// Frame id written into the message header
    #[arg(long)]
    frame_id: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Write the default config file and exit
    #[arg(long)]
    write_default_config: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum SinkKind {
    Udp,
    Stdout,
}

impl Cli {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut BridgeConfig) -> Result<()> {
        if let Some(ms) = self.period_ms {
            config.publish_period_ms = ms;
        }
        if let Some(topic) = &self.topic {
            config.topic = topic.clone();
        }
        if let Some(frame_id) = &self.frame_id {
            config.frame_id = frame_id.clone();
        }
        match (self.sink, &self.target) {
            (Some(SinkKind::Stdout), Some(target)) => {
                bail!("--target {target} only applies to the udp sink, not --sink stdout")
            }
            (Some(SinkKind::Stdout), None) => config.sink = SinkConfig::Stdout,
            (_, Some(target)) => {
                config.sink = SinkConfig::Udp {
                    target: target.clone(),
                }
            }
            (Some(SinkKind::Udp), None) => {
                if !matches!(config.sink, SinkConfig::Udp { .. }) {
                    config.sink = SinkConfig::default();
                }
            }
            (None, None) => {}
        }
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(BridgeConfig::default_path);

    if cli.write_default_config {
        BridgeConfig::default().save(&config_path)?;
        println!("Wrote default config to {}", config_path.display());
        return Ok(());
    }

    info!("Loading config from {:?}", config_path);
    let mut config = BridgeConfig::load(&config_path)?;
    cli.apply(&mut config)?;
    config.validate()?;

    run(config).await
}

async fn run(config: BridgeConfig) -> Result<()> {
    let sink: Box<dyn MessageSink + Send> = match &config.sink {
        SinkConfig::Udp { target } => Box::new(
            UdpSink::connect(target, &config.topic)
                .with_context(|| format!("opening UDP sink {target}"))?,
        ),
        SinkConfig::Stdout => Box::new(JsonLinesSink::stdout(&config.topic)),
    };

    let signal = ShutdownSignal::new();
    let handler_signal = signal.clone();
    ctrlc::set_handler(move || {
        if handler_signal.request() {
            info!("Termination signal received, shutting down");
        }
    })
    .context("installing signal handler")?;

    print_banner(&config)?;

    let options = BridgeOptions::from_config(&config, Some(libc::STDIN_FILENO));
    let bridge = Bridge::start(options, FdKeys::stdin(), sink, SystemClock, signal)?;
    bridge.run().await?;
    Ok(())
}

/// Key help for the operator, on stderr so stdout stays clean for the stdout sink
fn print_banner(config: &BridgeConfig) -> std::io::Result<()> {
    let mut err = std::io::stderr().lock();
    writeln!(
        err,
        "{} publishing '{}' to {} every {} ms",
        "keyjoy".bold(),
        config.topic,
        config.sink.describe(),
        config.publish_period_ms
    )?;
    writeln!(err, "  {}  stop publishing", "space".cyan())?;
    writeln!(err, "  {}      resume publishing", "s".cyan())?;
    writeln!(err, "  {}      quit", "q".cyan())?;
    err.flush()
}
