//! Applies one configuration record to a set of cameras

use anyhow::Result;
use camera_tools::client::Client;
use camera_tools::config::{Configuration, Exposure, Gain, Shutter, WhiteBalance};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Window for absorbing acknowledgements before exiting.
const ACK_WINDOW: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "set-parameters")]
#[command(about = "Send camera parameters to every named camera")]
#[command(version)]
struct Cli {
    /// Broker uri
    #[arg(short, long, default_value = "tcp://localhost:15555")]
    uri: String,

    /// Camera names
    #[arg(short, long, required = true, num_args = 1..)]
    cameras: Vec<String>,

    /// Brightness [1.367~7.422]
    #[arg(short, long)]
    brightness: Option<f32>,

    /// Exposure [-7.585~2.414]
    #[arg(short, long, allow_negative_numbers = true)]
    exposure: Option<f32>,

    /// Shutter [0~100%]
    #[arg(short, long)]
    shutter: Option<f32>,

    /// Gain [0~100%]
    #[arg(short, long)]
    gain: Option<f32>,

    /// White balance [0~1023]
    #[arg(long, num_args = 2, value_names = ["RED", "BLUE"])]
    white_balance: Option<Vec<u32>>,

    /// Enable auto exposure mode
    #[arg(long)]
    auto_exposure: bool,

    /// Enable auto shutter mode
    #[arg(long)]
    auto_shutter: bool,

    /// Enable auto gain mode
    #[arg(long)]
    auto_gain: bool,

    /// Enable auto white balance mode
    #[arg(long)]
    auto_wb: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Builds the shared configuration record from whichever flags are present.
fn build_configuration(cli: &Cli) -> Configuration {
    let mut configuration = Configuration::default();

    if let Some(brightness) = cli.brightness {
        configuration.brightness = Some(brightness);
        info!(value = brightness, "Brightness");
    }

    if cli.exposure.is_some() || cli.auto_exposure {
        let exposure = Exposure {
            value: cli.exposure,
            auto_mode: Some(cli.auto_exposure),
        };
        match exposure.value {
            Some(value) if !cli.auto_exposure => info!(value, "Exposure"),
            _ => info!("Exposure: auto"),
        }
        configuration.exposure = Some(exposure);
    }

    if cli.shutter.is_some() || cli.auto_shutter {
        let shutter = Shutter {
            percent: cli.shutter,
            ms: None,
            auto_mode: Some(cli.auto_shutter),
        };
        match shutter.percent {
            Some(percent) if !cli.auto_shutter => info!(percent, "Shutter"),
            _ => info!("Shutter: auto"),
        }
        configuration.shutter = Some(shutter);
    }

    if cli.gain.is_some() || cli.auto_gain {
        let gain = Gain {
            percent: cli.gain,
            db: None,
            auto_mode: Some(cli.auto_gain),
        };
        match gain.percent {
            Some(percent) if !cli.auto_gain => info!(percent, "Gain"),
            _ => info!("Gain: auto"),
        }
        configuration.gain = Some(gain);
    }

    if cli.white_balance.is_some() || cli.auto_wb {
        let channels = cli.white_balance.as_deref().unwrap_or(&[]);
        let white_balance = WhiteBalance {
            red: channels.first().copied(),
            blue: channels.get(1).copied(),
            auto_mode: Some(cli.auto_wb),
        };
        match (white_balance.red, white_balance.blue) {
            (Some(red), Some(blue)) if !cli.auto_wb => info!(red, blue, "WhiteBalance"),
            _ => info!("WhiteBalance: auto"),
        }
        configuration.white_balance = Some(white_balance);
    }

    configuration
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let configuration = build_configuration(&cli);

    let mut client = Client::connect(&cli.uri)?;
    for camera in &cli.cameras {
        client.request(&format!("{camera}.configure"), &configuration)?;
    }

    // Give the cameras a moment to acknowledge; no retry, silent on timeout.
    client.drain_for(ACK_WINDOW)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args.iter().copied()).unwrap()
    }

    #[test]
    fn test_no_flags_builds_empty_configuration() {
        let cli = parse(&["set-parameters", "-c", "ptgrey.0"]);
        assert_eq!(build_configuration(&cli), Configuration::default());
    }

    #[test]
    fn test_auto_gain_without_value_sets_mode_only() {
        let cli = parse(&["set-parameters", "-c", "ptgrey.0", "--auto-gain"]);
        let configuration = build_configuration(&cli);

        let gain = configuration.gain.expect("gain sub-record expected");
        assert_eq!(gain.auto_mode, Some(true));
        assert!(gain.percent.is_none());
        assert!(configuration.exposure.is_none());
    }

    #[test]
    fn test_manual_values_are_carried() {
        let cli = parse(&[
            "set-parameters",
            "-c",
            "ptgrey.0",
            "-b",
            "3.2",
            "-s",
            "40.5",
            "--white-balance",
            "512",
            "300",
        ]);
        let configuration = build_configuration(&cli);

        assert_eq!(configuration.brightness, Some(3.2));
        let shutter = configuration.shutter.unwrap();
        assert_eq!(shutter.percent, Some(40.5));
        assert_eq!(shutter.auto_mode, Some(false));
        let wb = configuration.white_balance.unwrap();
        assert_eq!(wb.red, Some(512));
        assert_eq!(wb.blue, Some(300));
        assert_eq!(wb.auto_mode, Some(false));
    }

    #[test]
    fn test_cameras_are_required() {
        assert!(Cli::try_parse_from(["set-parameters", "--gain", "10"]).is_err());
    }
}
