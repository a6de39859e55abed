//! Tunable camera properties and their slider mappings
//!
//! One descriptor per tunable carries its display name, declared range,
//! auto-mode support, and the bidirectional slider ↔ configuration
//! conversion. Keeping everything in a single table means the range, the
//! mode flag, and the two conversions cannot drift apart.
//!
//! Reads from a received `Configuration` return `Option`: an absent field
//! yields `None` rather than a panic, and callers decide whether to skip
//! the widget, log, or fall back.

use crate::config::{Configuration, Exposure, Gain, Shutter, WhiteBalance};

/// Slider resolution shared by every property.
pub const SLIDER_MAX: u32 = 1000;

/// Which configuration field a property drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tunable {
    Brightness,
    Exposure,
    Shutter,
    Gain,
    WhiteBalanceRed,
    WhiteBalanceBlue,
}

/// A named tunable with its range and conversions.
#[derive(Debug, Clone, Copy)]
pub struct Property {
    pub name: &'static str,
    pub tunable: Tunable,
    pub min: f64,
    pub max: f64,
    /// Whether the device supports an auto mode for this property.
    pub supports_auto: bool,
}

/// All tunables, in display order.
pub const PROPERTIES: &[Property] = &[
    Property {
        name: "Brightness",
        tunable: Tunable::Brightness,
        min: 1.367,
        max: 7.422,
        supports_auto: false,
    },
    Property {
        name: "Exposure",
        tunable: Tunable::Exposure,
        min: -7.585,
        max: 2.414,
        supports_auto: true,
    },
    Property {
        name: "Shutter",
        tunable: Tunable::Shutter,
        min: 0.0,
        max: 100.0,
        supports_auto: true,
    },
    Property {
        name: "Gain",
        tunable: Tunable::Gain,
        min: 0.0,
        max: 100.0,
        supports_auto: true,
    },
    Property {
        name: "WB[red]",
        tunable: Tunable::WhiteBalanceRed,
        min: 0.0,
        max: 1023.0,
        supports_auto: true,
    },
    Property {
        name: "WB[blue]",
        tunable: Tunable::WhiteBalanceBlue,
        min: 0.0,
        max: 1023.0,
        supports_auto: true,
    },
];

/// Looks a property up by display name.
pub fn find(name: &str) -> Option<&'static Property> {
    PROPERTIES.iter().find(|p| p.name == name)
}

impl Property {
    /// Maps a slider position onto the property's declared range.
    pub fn scaled_value(&self, position: u32, slider_max: u32) -> f64 {
        let ratio = f64::from(position) / f64::from(slider_max);
        (self.max - self.min) * ratio + self.min
    }

    /// Maps a range value back onto a slider position, clamped to the scale.
    fn position_for(&self, value: f64, slider_max: u32) -> u32 {
        let ratio = (value - self.min) / (self.max - self.min);
        let position = (f64::from(slider_max) * ratio).round();
        position.clamp(0.0, f64::from(slider_max)) as u32
    }

    /// Builds the configuration delta for this property.
    ///
    /// `auto` requests auto mode; the manual value is only populated when
    /// the mode is manual. Brightness has no auto mode and always carries
    /// its value.
    pub fn to_configuration(&self, position: u32, slider_max: u32, auto: bool) -> Configuration {
        let value = self.scaled_value(position, slider_max);
        let mut config = Configuration::default();
        match self.tunable {
            Tunable::Brightness => {
                config.brightness = Some(value as f32);
            }
            Tunable::Exposure => {
                config.exposure = Some(Exposure {
                    value: (!auto).then_some(value as f32),
                    auto_mode: Some(auto),
                });
            }
            Tunable::Shutter => {
                config.shutter = Some(Shutter {
                    percent: (!auto).then_some(value as f32),
                    ms: None,
                    auto_mode: Some(auto),
                });
            }
            Tunable::Gain => {
                config.gain = Some(Gain {
                    percent: (!auto).then_some(value as f32),
                    db: None,
                    auto_mode: Some(auto),
                });
            }
            Tunable::WhiteBalanceRed => {
                config.white_balance = Some(WhiteBalance {
                    red: (!auto).then_some(value.round() as u32),
                    blue: None,
                    auto_mode: Some(auto),
                });
            }
            Tunable::WhiteBalanceBlue => {
                config.white_balance = Some(WhiteBalance {
                    red: None,
                    blue: (!auto).then_some(value.round() as u32),
                    auto_mode: Some(auto),
                });
            }
        }
        config
    }

    /// Reads this property's manual value out of a received configuration
    /// as a slider position. `None` when the field is absent.
    pub fn from_configuration(&self, config: &Configuration, slider_max: u32) -> Option<u32> {
        let value = match self.tunable {
            Tunable::Brightness => f64::from(config.brightness?),
            Tunable::Exposure => f64::from(config.exposure.as_ref()?.value?),
            Tunable::Shutter => f64::from(config.shutter.as_ref()?.percent?),
            Tunable::Gain => f64::from(config.gain.as_ref()?.percent?),
            Tunable::WhiteBalanceRed => f64::from(config.white_balance.as_ref()?.red?),
            Tunable::WhiteBalanceBlue => f64::from(config.white_balance.as_ref()?.blue?),
        };
        Some(self.position_for(value, slider_max))
    }

    /// Reads this property's device-reported auto mode. Brightness never
    /// runs in auto; absent fields yield `None`.
    pub fn auto_mode(&self, config: &Configuration) -> Option<bool> {
        match self.tunable {
            Tunable::Brightness => Some(false),
            Tunable::Exposure => config.exposure.as_ref()?.auto_mode,
            Tunable::Shutter => config.shutter.as_ref()?.auto_mode,
            Tunable::Gain => config.gain.as_ref()?.auto_mode,
            Tunable::WhiteBalanceRed | Tunable::WhiteBalanceBlue => {
                config.white_balance.as_ref()?.auto_mode
            }
        }
    }

    /// The other white-balance channel, for the paired auto-mode coupling.
    pub fn paired_channel(&self) -> Option<&'static Property> {
        match self.tunable {
            Tunable::WhiteBalanceRed => find("WB[blue]"),
            Tunable::WhiteBalanceBlue => find("WB[red]"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_one_slider_unit() {
        for property in PROPERTIES {
            for position in [0u32, 1, 137, 500, 813, 999, 1000] {
                let config = property.to_configuration(position, SLIDER_MAX, false);
                let recovered = property
                    .from_configuration(&config, SLIDER_MAX)
                    .unwrap_or_else(|| panic!("{} lost its manual value", property.name));
                let delta = i64::from(recovered) - i64::from(position);
                assert!(
                    delta.abs() <= 1,
                    "{}: position {} came back as {}",
                    property.name,
                    position,
                    recovered
                );
            }
        }
    }

    #[test]
    fn test_auto_request_carries_no_manual_value() {
        let gain = find("Gain").unwrap();
        let config = gain.to_configuration(700, SLIDER_MAX, true);

        let sub = config.gain.unwrap();
        assert_eq!(sub.auto_mode, Some(true));
        assert!(sub.percent.is_none());
    }

    #[test]
    fn test_brightness_ignores_auto() {
        let brightness = find("Brightness").unwrap();
        let config = brightness.to_configuration(0, SLIDER_MAX, false);
        assert!((config.brightness.unwrap() - 1.367).abs() < 1e-3);

        assert_eq!(brightness.auto_mode(&Configuration::default()), Some(false));
    }

    #[test]
    fn test_absent_field_reads_none() {
        let empty = Configuration::default();
        for property in PROPERTIES {
            assert_eq!(property.from_configuration(&empty, SLIDER_MAX), None);
            if property.supports_auto {
                assert_eq!(property.auto_mode(&empty), None);
            }
        }
    }

    #[test]
    fn test_white_balance_channels_are_paired() {
        let red = find("WB[red]").unwrap();
        let blue = find("WB[blue]").unwrap();

        assert_eq!(red.paired_channel().unwrap().name, "WB[blue]");
        assert_eq!(blue.paired_channel().unwrap().name, "WB[red]");
        assert!(find("Gain").unwrap().paired_channel().is_none());
    }

    #[test]
    fn test_exposure_range_covers_negative_values() {
        let exposure = find("Exposure").unwrap();
        let config = exposure.to_configuration(0, SLIDER_MAX, false);
        let value = config.exposure.unwrap().value.unwrap();
        assert!((f64::from(value) - exposure.min).abs() < 1e-3);
    }

    #[test]
    fn test_out_of_range_value_clamps() {
        let shutter = find("Shutter").unwrap();
        let config = Configuration {
            shutter: Some(crate::config::Shutter {
                percent: Some(250.0),
                ms: None,
                auto_mode: Some(false),
            }),
            ..Default::default()
        };
        assert_eq!(shutter.from_configuration(&config, SLIDER_MAX), Some(SLIDER_MAX));
    }
}
