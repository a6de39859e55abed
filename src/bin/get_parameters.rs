//! Fetches every camera's configuration and persists it to a YAML file

use anyhow::Result;
use camera_tools::client::{Client, ClientError};
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Single collection window for all replies.
const REPLY_WINDOW: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "get-parameters")]
#[command(about = "Read camera parameters and save them to a configuration file")]
#[command(version)]
struct Cli {
    /// Broker uri
    #[arg(short, long, default_value = "tcp://localhost:15555")]
    uri: String,

    /// Camera names
    #[arg(short, long, required = true, num_args = 1..)]
    cameras: Vec<String>,

    /// Configuration file
    #[arg(short, long, default_value = "configuration.yaml")]
    yaml_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let mut client = Client::connect(&cli.uri)?;

    match client.snapshot_configurations(&cli.cameras, REPLY_WINDOW, &cli.yaml_file) {
        Ok(configurations) => {
            info!(file = %cli.yaml_file, cameras = configurations.len(), "configuration saved");
            Ok(())
        }
        Err(ClientError::IncompleteReplies { got, want }) => {
            // No partial output: leave the configuration file untouched.
            warn!(got, want, "not every camera answered in time, exiting");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
