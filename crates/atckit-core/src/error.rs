//! Error handling for ATCKit
//!
//! Provides error types for the layers of the tool-change stack:
//! - Configuration errors (rejected at init, latching the controller out)
//! - Machine errors (motion executor / pin layer)
//! - ATC errors (tool-change preconditions, safety gates, probe failures)
//!
//! All error types use `thiserror`. Recoverable conditions are reported as
//! `Err` values with logged diagnostics, never as panics.

use crate::data::AlarmKind;
use thiserror::Error;

/// Configuration error type
///
/// Any of these during `init()` permanently latches the controller as
/// not-OK for the session; every later tool change fails fast.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Spindown delay is zero; stopping the spindle before ATC operation
    /// would not be safe.
    #[error("ATC operation requires a spindle spindown > 0ms")]
    SpindownRequired,

    /// A mandatory pin is not defined.
    #[error("ATC pin '{pin}' must be defined")]
    PinUndefined {
        /// Configuration key of the missing pin.
        pin: String,
    },

    /// A position list does not have exactly one coordinate per axis.
    #[error("position list '{key}' must have 3 coordinates, got {len}")]
    BadPositionList {
        /// Configuration key of the malformed list.
        key: String,
        /// Number of coordinates actually present.
        len: usize,
    },
}

/// Machine error type
///
/// Errors surfaced by the motion executor or the pin layer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MachineError {
    /// The machine entered an alarm state while executing a command.
    #[error("machine alarm: {kind}")]
    Alarm {
        /// Alarm classification reported by the machine.
        kind: AlarmKind,
    },

    /// The executor refused the command.
    #[error("command rejected: {reason}")]
    CommandRejected { reason: String },

    /// Waiting for the motion queue to drain failed.
    #[error("motion synchronize failed: {reason}")]
    SynchronizeFailed { reason: String },

    /// A pin write failed.
    #[error("pin write failed on '{pin}': {reason}")]
    PinWrite { pin: String, reason: String },
}

/// ATC error type
///
/// Tool-change level failures. Safety and pairing violations reject the
/// specific call and leave machine state untouched; a probe failure aborts
/// the remaining restoration steps of a change.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AtcError {
    /// The controller failed configuration validation at init.
    #[error("ATC not initialized, tool change refused")]
    NotReady,

    /// Requested tool number is outside the valid encoding.
    #[error("invalid tool number: {number}")]
    InvalidTool { number: u8 },

    /// A safety gate refused the operation.
    #[error("safety violation: {reason}")]
    Safety { reason: String },

    /// Manual changes can only pair a concrete tool with NO_TOOL or
    /// MANUAL_CHG on the other side.
    #[error("manual change can only pair with NO_TOOL (current {current}, requested {requested})")]
    ManualPairing { current: u8, requested: u8 },

    /// The toolsetter probe cycle ended in alarm.
    #[error("toolsetter probe failed: {kind}")]
    ProbeFailed {
        /// Switch error (ProbeFailInitial) or missing target.
        kind: AlarmKind,
    },

    /// Configuration error observed after init.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Machine layer error.
    #[error(transparent)]
    Machine(#[from] MachineError),
}

impl AtcError {
    /// Check if this is a safety-gate rejection
    pub fn is_safety(&self) -> bool {
        matches!(self, AtcError::Safety { .. } | AtcError::ManualPairing { .. })
    }

    /// Check if this is a probe failure requiring operator recovery
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, AtcError::ProbeFailed { .. })
    }
}

/// Main error type for ATCKit
///
/// A unified error type that can represent any error from all layers.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Machine error
    #[error(transparent)]
    Machine(#[from] MachineError),

    /// ATC error
    #[error(transparent)]
    Atc(#[from] AtcError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::BadPositionList {
            key: "tool2_mpos_mm".to_string(),
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "position list 'tool2_mpos_mm' must have 3 coordinates, got 2"
        );

        let err = ConfigError::PinUndefined {
            pin: "atc_valve_pin".to_string(),
        };
        assert_eq!(err.to_string(), "ATC pin 'atc_valve_pin' must be defined");
    }

    #[test]
    fn test_atc_error_classification() {
        let err = AtcError::Safety {
            reason: "spindle active".to_string(),
        };
        assert!(err.is_safety());
        assert!(!err.is_probe_failure());

        let err = AtcError::ProbeFailed {
            kind: AlarmKind::ProbeFailContact,
        };
        assert!(err.is_probe_failure());
    }

    #[test]
    fn test_error_conversion() {
        let config_err = ConfigError::SpindownRequired;
        let err: Error = config_err.into();
        assert!(matches!(err, Error::Config(_)));

        let machine_err = MachineError::Alarm {
            kind: AlarmKind::HardLimit,
        };
        let atc_err: AtcError = machine_err.into();
        assert!(matches!(atc_err, AtcError::Machine(_)));
    }
}
