//! Client utilities for a distributed camera-control service
//!
//! Cameras are driven entirely through an external pub/sub + request/reply
//! broker. This crate provides:
//! - a correlated request/reply client and synchronized frame consumer
//! - the per-camera `Configuration` record and its YAML persistence
//! - the slider/property mapping table used by the configurator
//! - JPEG decode and grid composition for the multi-camera viewer
//!
//! The four command-line tools (`set-parameters`, `get-parameters`,
//! `camera-viewer`, `slider-configure`) are thin binaries over these modules.

pub mod client;
pub mod config;
pub mod mosaic;
pub mod panel;
pub mod properties;

// Re-exports for convenience
pub use client::{Client, ClientError, RequestId, Subscription};
pub use config::{CameraConfigurations, Configuration, SyncRequest};
pub use mosaic::{GridLayout, Mosaic};
pub use panel::{ConfigSend, PanelState, RefreshEvent};
pub use properties::{Property, PROPERTIES, SLIDER_MAX};
