//! Synchronized multi-camera viewer
//!
//! Configures every camera with the same rate/resolution/type triple, asks
//! the synchronization service to align their frame topics, then consumes
//! one frame per camera per tick and shows the composed grid in a window.
//!
//! The capture loop runs on a background thread and ships composites to
//! the GUI thread over a channel; closing the window stops the loop.

use anyhow::Result;
use camera_tools::client::Client;
use camera_tools::config::{ImageType, Resolution, SamplingRate, SyncRequest};
use camera_tools::mosaic::Mosaic;
use clap::Parser;
use eframe::egui;
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Window for absorbing configure acknowledgements.
const ACK_WINDOW: Duration = Duration::from_secs(1);

#[derive(Parser, Debug, Clone)]
#[command(name = "camera-viewer")]
#[command(about = "Synchronized multi-camera mosaic viewer")]
#[command(version)]
struct Cli {
    /// Broker uri
    #[arg(short, long, default_value = "tcp://localhost:15555")]
    uri: String,

    /// Camera names
    #[arg(short, long, required = true, num_args = 1..)]
    cameras: Vec<String>,

    /// Image height
    #[arg(long, default_value_t = 728)]
    height: u32,

    /// Image width
    #[arg(short, long, default_value_t = 1288)]
    width: u32,

    /// Frames per second
    #[arg(short, long, default_value_t = 5.0, value_parser = parse_fps,
          allow_negative_numbers = true)]
    fps: f64,

    /// Image type
    #[arg(short = 't', long = "type", default_value = "rgb")]
    image_type: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// The tick window is derived as 1000/fps ms, so the rate must be a
/// positive finite number.
fn parse_fps(value: &str) -> Result<f64, String> {
    let fps: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if fps.is_finite() && fps > 0.0 {
        Ok(fps)
    } else {
        Err(String::from("frame rate must be a positive number"))
    }
}

/// Configures the cameras, requests synchronization, and consumes frames
/// until `running` is cleared. Each complete tick becomes one composite.
fn capture_loop(
    cli: Cli,
    composite_tx: mpsc::Sender<RgbaImage>,
    running: Arc<AtomicBool>,
    ctx: egui::Context,
) -> Result<()> {
    let mut client = Client::connect(&cli.uri)?;

    let sample_rate = SamplingRate {
        rate: Some(cli.fps),
        period: None,
    };
    let resolution = Resolution {
        width: cli.width,
        height: cli.height,
    };
    let image_type = ImageType {
        value: cli.image_type.clone(),
    };

    for camera in &cli.cameras {
        client.request(&format!("{camera}.set_sample_rate"), &sample_rate)?;
        client.request(&format!("{camera}.set_resolution"), &resolution)?;
        client.request(&format!("{camera}.set_image_type"), &image_type)?;
    }
    client.drain_for(ACK_WINDOW)?;

    let topics: Vec<String> = cli
        .cameras
        .iter()
        .map(|camera| format!("{camera}.frame"))
        .collect();
    let subscription = client.subscribe(&topics)?;

    info!("Sync request");
    client.request(
        "is.sync",
        &SyncRequest {
            entities: cli.cameras.clone(),
            sampling_rate: sample_rate,
        },
    )?;

    info!("Starting capture");
    let mosaic = Mosaic::new(cli.cameras.len());
    let tick_window = Duration::from_millis((1000.0 / cli.fps) as u64);

    while running.load(Ordering::Relaxed) {
        let Some(messages) = subscription.consume_sync(tick_window)? else {
            // Incomplete tick: skip instead of composing a short set.
            continue;
        };

        let mut frames = Vec::with_capacity(messages.len());
        let mut tick_ok = true;
        for (topic, data) in &messages {
            match mosaic.decode_half(data) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    warn!(topic = %topic, error = %e, "dropping tick on decode failure");
                    tick_ok = false;
                    break;
                }
            }
        }
        if !tick_ok {
            continue;
        }

        match mosaic.compose(&frames) {
            Ok(composite) => {
                if composite_tx.send(composite).is_err() {
                    break;
                }
                ctx.request_repaint();
            }
            Err(e) => warn!(error = %e, "dropping tick on compose failure"),
        }
    }

    info!("Capture stopped");
    Ok(())
}

struct ViewerApp {
    composite_rx: mpsc::Receiver<RgbaImage>,
    texture: Option<egui::TextureHandle>,
    running: Arc<AtomicBool>,
}

impl ViewerApp {
    fn drain_composites(&mut self, ctx: &egui::Context) {
        let mut latest = None;
        while let Ok(composite) = self.composite_rx.try_recv() {
            latest = Some(composite);
        }
        let Some(composite) = latest else { return };

        let size = [composite.width() as usize, composite.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, composite.as_raw());
        match &mut self.texture {
            Some(texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.texture =
                    Some(ctx.load_texture("mosaic", color_image, egui::TextureOptions::LINEAR));
            }
        }
    }
}

impl eframe::App for ViewerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_composites(ctx);

        egui::CentralPanel::default().show(ctx, |ui| match &self.texture {
            Some(texture) => {
                ui.image(texture);
            }
            None => {
                ui.centered_and_justified(|ui| {
                    ui.label("Waiting for synchronized frames...");
                });
            }
        });
    }
}

impl Drop for ViewerApp {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_target(false).init();

    let running = Arc::new(AtomicBool::new(true));
    let (composite_tx, composite_rx) = mpsc::channel();

    let options = eframe::NativeOptions::default();
    let app_running = Arc::clone(&running);
    eframe::run_native(
        "Intelligent Space",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let loop_running = Arc::clone(&running);
            std::thread::spawn(move || {
                if let Err(e) = capture_loop(cli, composite_tx, loop_running, ctx) {
                    error!(error = %e, "capture loop failed");
                }
            });
            Ok(Box::new(ViewerApp {
                composite_rx,
                texture: None,
                running: app_running,
            }))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to open viewer window: {e}"))?;

    Ok(())
}
