//! Error types for the settings crate.

use atckit_core::ConfigError;
use std::io;
use thiserror::Error;

/// Errors that can occur while loading or saving configuration files.
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The configuration file could not be loaded.
    #[error("Failed to load settings: {0}")]
    LoadError(String),

    /// The configuration file could not be saved.
    #[error("Failed to save settings: {0}")]
    SaveError(String),

    /// The configuration file format is not supported.
    #[error("Config file must be .json or .toml, got '{0}'")]
    UnsupportedFormat(String),

    /// A configuration value failed validation.
    #[error(transparent)]
    Invalid(#[from] ConfigError),

    /// I/O error during file operations.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML deserialization error.
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

/// Result type alias for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_display() {
        let err = SettingsError::UnsupportedFormat("yaml".to_string());
        assert_eq!(err.to_string(), "Config file must be .json or .toml, got 'yaml'");

        let err: SettingsError = ConfigError::SpindownRequired.into();
        assert_eq!(
            err.to_string(),
            "ATC operation requires a spindle spindown > 0ms"
        );
    }
}
