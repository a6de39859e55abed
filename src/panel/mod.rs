//! Widget-independent state for the slider configurator
//!
//! `PanelState` owns the slider positions and auto checkboxes and encodes
//! the interaction rules: slider release drops the property out of auto,
//! the two white-balance channels share their auto mode, and leaving auto
//! on either channel re-sends the partner's last manual value once.
//!
//! The background refresh thread never touches widgets. It ships a
//! `RefreshEvent` over a channel and the GUI thread applies it here.

use crate::config::Configuration;
use crate::properties::{Property, PROPERTIES, SLIDER_MAX};
use std::collections::HashMap;

/// One configuration delta to send to the selected camera.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSend {
    pub property: &'static str,
    pub configuration: Configuration,
}

/// Device state delivered by the refresh thread.
///
/// `everything` is raised right after a camera switch; otherwise only
/// auto-mode properties are refreshed so a slider the user is dragging is
/// not yanked back.
#[derive(Debug, Clone)]
pub struct RefreshEvent {
    pub configuration: Configuration,
    pub everything: bool,
}

/// Slider and checkbox state for every property.
pub struct PanelState {
    sliders: HashMap<&'static str, u32>,
    autos: HashMap<&'static str, bool>,
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new()
    }
}

impl PanelState {
    pub fn new() -> Self {
        let sliders = PROPERTIES.iter().map(|p| (p.name, 0)).collect();
        let autos = PROPERTIES
            .iter()
            .filter(|p| p.supports_auto)
            .map(|p| (p.name, false))
            .collect();
        Self { sliders, autos }
    }

    pub fn slider(&self, name: &str) -> u32 {
        self.sliders.get(name).copied().unwrap_or(0)
    }

    /// Mutable access for binding the GUI slider widget.
    pub fn slider_mut(&mut self, property: &'static Property) -> &mut u32 {
        self.sliders.entry(property.name).or_insert(0)
    }

    pub fn auto(&self, name: &str) -> bool {
        self.autos.get(name).copied().unwrap_or(false)
    }

    /// Slider released: the property leaves auto mode (if it was in it)
    /// and its manual value at the current position is sent.
    pub fn release_slider(&mut self, property: &'static Property) -> ConfigSend {
        if property.supports_auto {
            self.autos.insert(property.name, false);
        }
        let position = self.slider(property.name);
        ConfigSend {
            property: property.name,
            configuration: property.to_configuration(position, SLIDER_MAX, false),
        }
    }

    /// Auto checkbox toggled to `mode`.
    ///
    /// White-balance channels are coupled: both checkboxes follow the
    /// toggle, and when the pair leaves auto the partner's last manual
    /// slider value is re-sent (exactly once) before the toggled channel's
    /// own configuration.
    pub fn toggle_auto(&mut self, property: &'static Property, mode: bool) -> Vec<ConfigSend> {
        let mut sends = Vec::new();
        self.autos.insert(property.name, mode);

        if let Some(partner) = property.paired_channel() {
            self.autos.insert(partner.name, mode);
            if !mode {
                let position = self.slider(partner.name);
                sends.push(ConfigSend {
                    property: partner.name,
                    configuration: partner.to_configuration(position, SLIDER_MAX, false),
                });
            }
        }

        let position = self.slider(property.name);
        sends.push(ConfigSend {
            property: property.name,
            configuration: property.to_configuration(position, SLIDER_MAX, mode),
        });
        sends
    }

    /// Applies a device-reported configuration to the widgets.
    ///
    /// Absent fields are skipped. In steady state (`everything` false) only
    /// properties the device reports as auto are updated.
    pub fn apply_refresh(&mut self, event: &RefreshEvent) {
        for property in PROPERTIES {
            let Some(mode) = property.auto_mode(&event.configuration) else {
                continue;
            };
            if !event.everything && !mode {
                continue;
            }
            if let Some(position) =
                property.from_configuration(&event.configuration, SLIDER_MAX)
            {
                self.sliders.insert(property.name, position);
            }
            if property.supports_auto {
                self.autos.insert(property.name, mode);
            }
        }
    }
}
