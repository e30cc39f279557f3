//! Configuration schema for an ATC spindle
//!
//! Mirrors the option names the motion controller exposes for a pneumatic
//! rack changer with a toolsetter probe. A config section looks like:
//!
//! ```toml
//! atc_valve_pin = "gpio.4"
//! atc_dustoff_pin = "gpio.16"
//! ets_dustoff_pin = "gpio.27"
//! ets_mpos_mm = [157.0, 142.0, -31.0]
//! tool1_mpos_mm = [197.0, 142.0, -26.0]
//! tool2_mpos_mm = [237.0, 142.0, -26.0]
//! tool3_mpos_mm = [277.0, 142.0, -26.0]
//! tool4_mpos_mm = [317.0, 142.0, -26.0]
//! empty_safe_z = -10.0
//! spinup_ms = 3000
//! spindown_ms = 4000
//! ```
//!
//! The base spindle options (`output_pin`, `speed_map`, ...) are carried in
//! the same section but consumed by the spindle driver, not the ATC logic.

use atckit_core::{ConfigError, PinAddress};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{SettingsError, SettingsResult};

/// Number of physical rack slots
pub const TOOL_COUNT: usize = 4;

/// Configuration for an ATC spindle section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AtcSpindleConfig {
    /// Gripper valve output pin (mandatory)
    pub atc_valve_pin: PinAddress,
    /// Rack dust-off valve output pin
    pub atc_dustoff_pin: PinAddress,
    /// Toolsetter dust-off valve output pin
    pub ets_dustoff_pin: PinAddress,
    /// Toolsetter position, machine frame, 3 coordinates
    pub ets_mpos_mm: Vec<f64>,
    /// Rack slot 1 pickup position, machine frame, 3 coordinates
    pub tool1_mpos_mm: Vec<f64>,
    /// Rack slot 2 pickup position
    pub tool2_mpos_mm: Vec<f64>,
    /// Rack slot 3 pickup position
    pub tool3_mpos_mm: Vec<f64>,
    /// Rack slot 4 pickup position
    pub tool4_mpos_mm: Vec<f64>,
    /// Machine Z where crossing over tools is safe with an empty gripper
    pub empty_safe_z: f64,
    /// Spindle spin-up delay in milliseconds
    pub spinup_ms: u64,
    /// Spindle spin-down delay in milliseconds (must be > 0 for ATC use)
    pub spindown_ms: u64,

    // Base spindle options, consumed by the spindle driver.
    /// Spindle direction output pin
    pub direction_pin: PinAddress,
    /// Spindle on/off output pin
    pub output_pin: PinAddress,
    /// Spindle enable output pin
    pub enable_pin: PinAddress,
    /// Disable the spindle when speed is programmed to zero
    pub disable_with_s0: bool,
    /// Report speed zero while disabled
    pub s0_with_disable: bool,
    /// Tool number the base spindle reports before any change
    pub tool_num: u8,
    /// Speed map in the controller's `rpm=percent` notation
    pub speed_map: String,
}

impl Default for AtcSpindleConfig {
    fn default() -> Self {
        Self {
            atc_valve_pin: PinAddress::new("gpio.4"),
            atc_dustoff_pin: PinAddress::new("gpio.16"),
            ets_dustoff_pin: PinAddress::new("gpio.27"),
            ets_mpos_mm: vec![157.0, 142.0, -31.0],
            tool1_mpos_mm: vec![197.0, 142.0, -26.0],
            tool2_mpos_mm: vec![237.0, 142.0, -26.0],
            tool3_mpos_mm: vec![277.0, 142.0, -26.0],
            tool4_mpos_mm: vec![317.0, 142.0, -26.0],
            empty_safe_z: -10.0,
            spinup_ms: 3000,
            spindown_ms: 4000,
            direction_pin: PinAddress::undefined(),
            output_pin: PinAddress::new("gpio.26"),
            enable_pin: PinAddress::undefined(),
            disable_with_s0: false,
            s0_with_disable: true,
            tool_num: 0,
            speed_map: "0=0.000% 0=100.000% 1=100.000%".to_string(),
        }
    }
}

impl AtcSpindleConfig {
    /// Load config from a file (JSON or TOML, by extension)
    pub fn load_from_file(path: &Path) -> SettingsResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::LoadError(format!("{}: {}", path.display(), e)))?;

        let config: Self = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("").to_string(),
                ))
            }
        };

        config.validate()?;
        debug!("Loaded ATC config from {}", path.display());
        Ok(config)
    }

    /// Save config to a file (JSON or TOML, by extension)
    pub fn save_to_file(&self, path: &Path) -> SettingsResult<()> {
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string_pretty(self)
                .map_err(|e| SettingsError::SaveError(e.to_string()))?,
            other => {
                return Err(SettingsError::UnsupportedFormat(
                    other.unwrap_or("").to_string(),
                ))
            }
        };

        std::fs::write(path, content)
            .map_err(|e| SettingsError::SaveError(format!("{}: {}", path.display(), e)))?;

        debug!("Saved ATC config to {}", path.display());
        Ok(())
    }

    /// Rack slot position lists, keyed for diagnostics, slot order 1..=4
    pub fn tool_mpos(&self) -> [(&'static str, &Vec<f64>); TOOL_COUNT] {
        [
            ("tool1_mpos_mm", &self.tool1_mpos_mm),
            ("tool2_mpos_mm", &self.tool2_mpos_mm),
            ("tool3_mpos_mm", &self.tool3_mpos_mm),
            ("tool4_mpos_mm", &self.tool4_mpos_mm),
        ]
    }

    /// Validate the configuration the way the controller's init does
    ///
    /// Fails iff the spindown delay is zero, the valve pin is undefined,
    /// or any position list does not have exactly 3 coordinates. The
    /// dust-off pins may be NO_PIN; their blasts then become no-ops.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.spindown_ms == 0 {
            return Err(ConfigError::SpindownRequired);
        }

        if !self.atc_valve_pin.defined() {
            return Err(ConfigError::PinUndefined {
                pin: "atc_valve_pin".to_string(),
            });
        }

        if self.ets_mpos_mm.len() != 3 {
            return Err(ConfigError::BadPositionList {
                key: "ets_mpos_mm".to_string(),
                len: self.ets_mpos_mm.len(),
            });
        }

        for (key, mpos) in self.tool_mpos() {
            if mpos.len() != 3 {
                return Err(ConfigError::BadPositionList {
                    key: key.to_string(),
                    len: mpos.len(),
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(AtcSpindleConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_spindown_rejected() {
        let config = AtcSpindleConfig {
            spindown_ms: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::SpindownRequired));
    }

    #[test]
    fn test_undefined_valve_pin_rejected() {
        let config = AtcSpindleConfig {
            atc_valve_pin: PinAddress::undefined(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PinUndefined { .. })
        ));
    }

    #[test]
    fn test_undefined_dustoff_pins_allowed() {
        let config = AtcSpindleConfig {
            atc_dustoff_pin: PinAddress::undefined(),
            ets_dustoff_pin: PinAddress::undefined(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_position_arity_rejected() {
        let config = AtcSpindleConfig {
            tool3_mpos_mm: vec![277.0, 142.0],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BadPositionList {
                key: "tool3_mpos_mm".to_string(),
                len: 2,
            })
        );

        let config = AtcSpindleConfig {
            ets_mpos_mm: vec![157.0, 142.0, -31.0, 0.0],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadPositionList { ref key, len: 4 }) if key == "ets_mpos_mm"
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atc.toml");

        let config = AtcSpindleConfig {
            empty_safe_z: -12.5,
            spindown_ms: 2500,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let loaded = AtcSpindleConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.empty_safe_z, -12.5);
        assert_eq!(loaded.spindown_ms, 2500);
        assert_eq!(loaded.atc_valve_pin, config.atc_valve_pin);
    }

    #[test]
    fn test_json_partial_section_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atc.json");
        std::fs::write(&path, r#"{"empty_safe_z": -8.0}"#).unwrap();

        let loaded = AtcSpindleConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.empty_safe_z, -8.0);
        assert_eq!(loaded.spindown_ms, 4000);
    }

    #[test]
    fn test_unsupported_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atc.yaml");
        std::fs::write(&path, "x: 1").unwrap();

        assert!(matches!(
            AtcSpindleConfig::load_from_file(&path),
            Err(SettingsError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_load_rejects_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atc.toml");
        let config = AtcSpindleConfig {
            spindown_ms: 0,
            ..Default::default()
        };
        // save_to_file does not validate; load does
        config.save_to_file(&path).unwrap();
        assert!(matches!(
            AtcSpindleConfig::load_from_file(&path),
            Err(SettingsError::Invalid(ConfigError::SpindownRequired))
        ));
    }
}
