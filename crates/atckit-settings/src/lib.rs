//! # ATCKit Settings
//!
//! Configuration schema, file loading and validation for ATCKit.

pub mod config;
pub mod error;

pub use config::{AtcSpindleConfig, TOOL_COUNT};
pub use error::{SettingsError, SettingsResult};
