//! Command-line demo driver for Paceline.
//!
//! Wires the composition root: loads configuration, constructs the
//! monitor and pipeline, injects synthetic observations, and prints the
//! live race feed. Useful for eyeballing the pipeline without a
//! dashboard attached.

use crate::core::{Config, Result};
use crate::monitor::PatternMonitor;
use crate::pipeline::RacePipeline;
use clap::Parser;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::time::Duration;

/// Pattern telemetry demo - watch the race from your terminal.
#[derive(Parser, Debug)]
#[command(name = "paceline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (YAML)
    #[arg(short, long, env = "PACELINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Heartbeat tick interval in seconds
    #[arg(long, env = "PACELINE_TICK_SECS")]
    pub tick_secs: Option<u64>,

    /// Number of synthetic observations to inject
    #[arg(long, env = "PACELINE_EVENTS", default_value = "20")]
    pub events: usize,

    /// How long to watch the feed before exiting, in seconds
    #[arg(long, env = "PACELINE_WATCH_SECS", default_value = "10")]
    pub watch_secs: u64,

    /// Enable debug logging
    #[arg(short, long, env = "PACELINE_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration: config file, then CLI overrides, then defaults.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(secs) = self.tick_secs {
            config.monitor.tick_interval = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Execute the CLI.
pub async fn execute(cli: Cli) -> anyhow::Result<()> {
    let filter = if cli.debug { "paceline=debug" } else { "paceline=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();

    let config = cli.load_config()?;
    if cli.check_config {
        println!("Configuration OK");
        return Ok(());
    }

    // Composition root: one monitor, one pipeline, explicit lifecycle.
    let monitor = PatternMonitor::new(config.monitor);
    let pipeline = RacePipeline::new(config.pipeline, monitor.clone());
    monitor.start();
    pipeline.start();

    let mut stream = pipeline.event_stream();
    let feed = tokio::spawn(async move {
        while let Some(event) = stream.recv().await {
            println!("[{:?}] {}", event.kind, event.message);
        }
    });

    for i in 0..cli.events {
        inject_synthetic(&monitor, i);
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    tokio::time::sleep(Duration::from_secs(cli.watch_secs)).await;
    println!("{}", pipeline.streamlined_status());

    pipeline.stop();
    monitor.destroy();
    feed.abort();
    Ok(())
}

/// Injects one synthetic observation, cycling through the pattern kinds.
fn inject_synthetic(monitor: &PatternMonitor, seq: usize) {
    let score = 30 + fastrand::usize(..70);
    let mut data = Map::new();
    data.insert("score".to_string(), json!(score));
    match fastrand::usize(..10) {
        0 => {
            data.insert("error".to_string(), Value::Bool(true));
        },
        1 | 2 => {
            data.insert("improved".to_string(), Value::Bool(true));
        },
        3 => {
            data.insert("warnings".to_string(), json!(fastrand::usize(1..5)));
        },
        _ => {},
    }

    match seq % 5 {
        0 => monitor.track_quality("checks", data),
        1 => monitor.track_build("pipeline", data),
        2 => monitor.track_git("activity", data),
        3 => monitor.track_component("render", data),
        _ => monitor.track_performance("budget", data),
    }
}
