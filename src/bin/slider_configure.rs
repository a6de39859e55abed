//! Interactive slider configurator for camera parameters
//!
//! One slider per tunable property plus an auto checkbox where the device
//! supports it, a camera selector, and a Save button that snapshots every
//! camera's configuration to the YAML file. A background thread polls the
//! selected camera once per second and ships refresh events to the GUI
//! thread over a channel, so widgets are only ever touched here.

use anyhow::Result;
use camera_tools::client::{Client, ClientError};
use camera_tools::config::{self, Configuration};
use camera_tools::panel::{ConfigSend, PanelState, RefreshEvent};
use camera_tools::properties::{PROPERTIES, SLIDER_MAX};
use clap::Parser;
use eframe::egui;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Attempts to collect every camera's configuration before giving up.
const INIT_ATTEMPTS: u32 = 5;
/// Per-attempt (and save) collection window.
const COLLECT_WINDOW: Duration = Duration::from_secs(2);
/// Per-interaction acknowledgement window.
const ACK_WINDOW: Duration = Duration::from_secs(1);
/// Background refresh period.
const REFRESH_PERIOD: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "slider-configure")]
#[command(about = "Interactive camera parameter configurator")]
#[command(version)]
struct Cli {
    /// Broker uri
    #[arg(short, long, default_value = "tcp://localhost:15555")]
    uri: String,

    /// Camera names
    #[arg(short, long, num_args = 1..,
          default_values_t = ["ptgrey.0", "ptgrey.1", "ptgrey.2", "ptgrey.3"].map(String::from))]
    cameras: Vec<String>,

    /// Configuration file
    #[arg(short, long, default_value = "configuration.yaml")]
    yaml_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Polls the selected camera and ships its configuration to the GUI.
fn refresh_loop(
    uri: String,
    cameras: Vec<String>,
    selected: Arc<AtomicUsize>,
    update_all: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    refresh_tx: mpsc::Sender<RefreshEvent>,
    ctx: egui::Context,
) -> Result<(), ClientError> {
    // The GUI thread owns its own client; this thread gets a fresh one.
    let mut client = Client::connect(&uri)?;

    while running.load(Ordering::Relaxed) {
        let start = Instant::now();
        let camera = &cameras[selected.load(Ordering::Relaxed) % cameras.len()];
        // Claim the full-refresh flag before polling, so a camera switch
        // mid-poll queues a fresh full refresh instead of mislabeling this
        // reply. A missed poll hands the claim back.
        let everything = update_all.swap(false, Ordering::Relaxed);

        let id = client.request_configuration(camera)?;
        match client.receive_reply::<Configuration>(&id, ACK_WINDOW) {
            Ok(Some(configuration)) => {
                if refresh_tx
                    .send(RefreshEvent {
                        configuration,
                        everything,
                    })
                    .is_err()
                {
                    break;
                }
                ctx.request_repaint();
            }
            Ok(None) => {
                if everything {
                    update_all.store(true, Ordering::Relaxed);
                }
                debug!(camera = %camera, "refresh timed out");
            }
            Err(e) => {
                if everything {
                    update_all.store(true, Ordering::Relaxed);
                }
                warn!(camera = %camera, error = %e, "refresh failed");
            }
        }

        if let Some(remaining) = REFRESH_PERIOD.checked_sub(start.elapsed()) {
            std::thread::sleep(remaining);
        }
    }
    Ok(())
}

struct ConfiguratorApp {
    client: Client,
    cameras: Vec<String>,
    yaml_file: String,
    panel: PanelState,
    selected: Arc<AtomicUsize>,
    update_all: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    refresh_rx: mpsc::Receiver<RefreshEvent>,
}

impl ConfiguratorApp {
    fn selected_camera(&self) -> &str {
        &self.cameras[self.selected.load(Ordering::Relaxed) % self.cameras.len()]
    }

    fn send(&mut self, send: ConfigSend, mode: &str) {
        let camera = self.selected_camera().to_string();
        info!(camera = %camera, property = %send.property, mode = %mode, "sending configuration");
        if let Err(e) = self
            .client
            .set_configuration(&camera, &send.configuration, ACK_WINDOW)
        {
            warn!(camera = %camera, error = %e, "set_configuration failed");
        }
    }

    fn save(&mut self) {
        let cameras = self.cameras.clone();
        match self
            .client
            .snapshot_configurations(&cameras, COLLECT_WINDOW, &self.yaml_file)
        {
            Ok(_) => info!(file = %self.yaml_file, "Saved parameters"),
            Err(ClientError::IncompleteReplies { got, want }) => {
                warn!(got, want, "Failed on requesting camera parameters. Try again.");
            }
            Err(e) => warn!(error = %e, "save failed"),
        }
    }

    fn camera_selector(&mut self, ui: &mut egui::Ui) {
        let mut index = self.selected.load(Ordering::Relaxed) % self.cameras.len();
        let previous = index;
        egui::ComboBox::from_label("Camera")
            .selected_text(self.cameras[index].clone())
            .show_ui(ui, |ui| {
                for (i, camera) in self.cameras.iter().enumerate() {
                    ui.selectable_value(&mut index, i, camera);
                }
            });
        if index != previous {
            self.selected.store(index, Ordering::Relaxed);
            self.update_all.store(true, Ordering::Relaxed);
            info!(camera = %self.cameras[index], "Selected camera");
        }
    }

    fn property_rows(&mut self, ui: &mut egui::Ui) {
        for property in PROPERTIES {
            ui.horizontal(|ui| {
                ui.label(property.name);

                let response = ui.add(
                    egui::Slider::new(self.panel.slider_mut(property), 0..=SLIDER_MAX)
                        .show_value(false),
                );
                let position = self.panel.slider(property.name);
                ui.label(format!("{:.3}", property.scaled_value(position, SLIDER_MAX)));

                if response.drag_stopped() {
                    let send = self.panel.release_slider(property);
                    self.send(send, "manual");
                }

                if property.supports_auto {
                    let mut auto = self.panel.auto(property.name);
                    if ui.checkbox(&mut auto, "auto").changed() {
                        let mode = if auto { "auto" } else { "manual" };
                        for send in self.panel.toggle_auto(property, auto) {
                            self.send(send, mode);
                        }
                    }
                }
            });
        }
    }
}

impl eframe::App for ConfiguratorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.refresh_rx.try_recv() {
            self.panel.apply_refresh(&event);
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.camera_selector(ui);
            ui.separator();
            self.property_rows(ui);
            ui.separator();
            if ui.button("Save").clicked() {
                self.save();
            }
        });
    }
}

impl Drop for ConfiguratorApp {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Bounded-retry initial fetch; `None` when the cameras never all answered.
fn initial_configurations(
    client: &mut Client,
    cameras: &[String],
) -> Result<Option<config::CameraConfigurations>, ClientError> {
    for attempt in 1..=INIT_ATTEMPTS {
        info!("Requesting cameras configuration... {attempt}/{INIT_ATTEMPTS}");
        match client.collect_configurations(cameras, COLLECT_WINDOW) {
            Ok(configurations) => return Ok(Some(configurations)),
            Err(ClientError::IncompleteReplies { got, want }) => {
                warn!(got, want, "Failed.");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
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
    let Some(configurations) = initial_configurations(&mut client, &cli.cameras)? else {
        warn!("Failed. Exiting...");
        return Ok(());
    };

    let mut panel = PanelState::new();
    if let Some(configuration) = configurations.get(&cli.cameras[0]) {
        panel.apply_refresh(&RefreshEvent {
            configuration: configuration.clone(),
            everything: true,
        });
    }

    let selected = Arc::new(AtomicUsize::new(0));
    let update_all = Arc::new(AtomicBool::new(false));
    let running = Arc::new(AtomicBool::new(true));
    let (refresh_tx, refresh_rx) = mpsc::channel();

    let options = eframe::NativeOptions::default();
    let uri = cli.uri.clone();
    let cameras = cli.cameras.clone();
    let thread_selected = Arc::clone(&selected);
    let thread_update_all = Arc::clone(&update_all);
    let thread_running = Arc::clone(&running);

    eframe::run_native(
        "Camera Parameters",
        options,
        Box::new(move |cc| {
            let ctx = cc.egui_ctx.clone();
            let loop_cameras = cameras.clone();
            std::thread::spawn(move || {
                if let Err(e) = refresh_loop(
                    uri,
                    loop_cameras,
                    thread_selected,
                    thread_update_all,
                    thread_running,
                    refresh_tx,
                    ctx,
                ) {
                    error!(error = %e, "refresh loop failed");
                }
            });
            Ok(Box::new(ConfiguratorApp {
                client,
                cameras,
                yaml_file: cli.yaml_file,
                panel,
                selected,
                update_all,
                running,
                refresh_rx,
            }))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to open configurator window: {e}"))?;

    Ok(())
}
