//! Data models for positions, modal state, and machine status
//!
//! This module provides:
//! - Machine-frame position types (full and partial)
//! - Modal state mirrored from the motion controller (distance mode,
//!   spindle, coolant)
//! - Machine state machine states and alarm classification
//! - String-addressed output pins (`gpio.N` style) with a NO_PIN sentinel

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine axes for a three-axis mill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// X axis
    X,
    /// Y axis
    Y,
    /// Z axis
    Z,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::Y => write!(f, "Y"),
            Self::Z => write!(f, "Z"),
        }
    }
}

/// Position in machine coordinates (absolute, not work-relative)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// X-axis position
    pub x: f64,
    /// Y-axis position
    pub y: f64,
    /// Z-axis position
    pub z: f64,
}

impl Position {
    /// Create a new position with X, Y, Z coordinates
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        debug_assert!(
            x.is_finite() && y.is_finite() && z.is_finite(),
            "Position axes must be finite: x={x}, y={y}, z={z}"
        );
        Self { x, y, z }
    }

    /// Get one axis component
    pub fn axis(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X:{:.3} Y:{:.3} Z:{:.3}", self.x, self.y, self.z)
    }
}

/// Partial position for moves that command only specific axes
///
/// `None` means "do not move this axis". Used for machine-frame rapids
/// where a tool change retracts Z alone or travels in XY at a safe height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialPosition {
    /// X-axis target (if Some, move this axis)
    pub x: Option<f64>,
    /// Y-axis target (if Some, move this axis)
    pub y: Option<f64>,
    /// Z-axis target (if Some, move this axis)
    pub z: Option<f64>,
}

impl PartialPosition {
    /// Create a partial position with only Z set
    pub fn z_only(z: f64) -> Self {
        Self {
            z: Some(z),
            ..Default::default()
        }
    }

    /// Create a partial position with XY set
    pub fn xy(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: None,
        }
    }

    /// Create a partial position with all three axes set
    pub fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Apply this partial position to an existing position
    pub fn apply_to(&self, pos: &Position) -> Position {
        Position {
            x: self.x.unwrap_or(pos.x),
            y: self.y.unwrap_or(pos.y),
            z: self.z.unwrap_or(pos.z),
        }
    }

    /// Check if no axes are commanded
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// Modal distance mode (G90/G91)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMode {
    /// Absolute positioning (G90)
    Absolute,
    /// Incremental positioning (G91)
    Incremental,
}

impl fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absolute => write!(f, "G90"),
            Self::Incremental => write!(f, "G91"),
        }
    }
}

/// Coolant output state (flood and mist are independent)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoolantState {
    /// Flood coolant active (M8)
    pub flood: bool,
    /// Mist coolant active (M7)
    pub mist: bool,
}

impl CoolantState {
    /// Check if no coolant output is active
    pub fn is_off(&self) -> bool {
        !self.flood && !self.mist
    }
}

/// Modal state mirrored from the motion controller's parser
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModalState {
    /// Active distance mode
    pub distance: DistanceMode,
    /// Spindle enabled (any non-disabled state)
    pub spindle_on: bool,
    /// Coolant outputs
    pub coolant: CoolantState,
}

impl Default for ModalState {
    fn default() -> Self {
        Self {
            distance: DistanceMode::Absolute,
            spindle_on: false,
            coolant: CoolantState::default(),
        }
    }
}

/// Machine state machine states
///
/// Tracks the operational state of the motion controller as observed by
/// the tool-change logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MachineState {
    /// Idle and ready for commands
    Idle,
    /// Executing motion
    Run,
    /// Alarm state (requires operator intervention)
    Alarm,
    /// Configuration alarm: the system failed validation at startup and
    /// only accepts settings/diagnostic traffic
    ConfigAlarm,
}

impl MachineState {
    /// Check if this state indicates an alarm condition
    pub fn is_alarm(&self) -> bool {
        matches!(self, MachineState::Alarm | MachineState::ConfigAlarm)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Run => write!(f, "Run"),
            Self::Alarm => write!(f, "Alarm"),
            Self::ConfigAlarm => write!(f, "ConfigAlarm"),
        }
    }
}

/// Alarm classification reported by the motion controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmKind {
    /// Probe switch was already closed when the cycle started
    ProbeFailInitial,
    /// Probe travel completed without contacting a target
    ProbeFailContact,
    /// Hard limit switch triggered
    HardLimit,
    /// Any other alarm source
    Other,
}

impl fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProbeFailInitial => write!(f, "probe switch error"),
            Self::ProbeFailContact => write!(f, "probe missing target"),
            Self::HardLimit => write!(f, "hard limit"),
            Self::Other => write!(f, "alarm"),
        }
    }
}

/// A string-addressed output pin reference (`gpio.N` style)
///
/// Mirrors the motion controller's pin naming. An unassigned pin is the
/// `NO_PIN` sentinel; writes to it are swallowed by the pin driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinAddress(String);

/// Name of the undefined-pin sentinel
pub const NO_PIN: &str = "NO_PIN";

impl PinAddress {
    /// Create a pin address from a controller pin name
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The undefined-pin sentinel
    pub fn undefined() -> Self {
        Self(NO_PIN.to_string())
    }

    /// Check if this address refers to a real pin
    pub fn defined(&self) -> bool {
        !self.0.is_empty() && self.0 != NO_PIN
    }

    /// Pin name as configured
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for PinAddress {
    fn default() -> Self {
        Self::undefined()
    }
}

impl fmt::Display for PinAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_position_apply() {
        let pos = Position::new(10.0, 20.0, 30.0);
        let target = PartialPosition::z_only(-5.0).apply_to(&pos);
        assert_eq!(target, Position::new(10.0, 20.0, -5.0));

        let target = PartialPosition::xy(1.0, 2.0).apply_to(&pos);
        assert_eq!(target, Position::new(1.0, 2.0, 30.0));
    }

    #[test]
    fn test_partial_position_empty() {
        assert!(PartialPosition::default().is_empty());
        assert!(!PartialPosition::z_only(0.0).is_empty());
    }

    #[test]
    fn test_coolant_state() {
        assert!(CoolantState::default().is_off());
        assert!(!CoolantState {
            flood: true,
            mist: false
        }
        .is_off());
    }

    #[test]
    fn test_machine_state_alarm() {
        assert!(MachineState::Alarm.is_alarm());
        assert!(MachineState::ConfigAlarm.is_alarm());
        assert!(!MachineState::Idle.is_alarm());
    }

    #[test]
    fn test_pin_address() {
        let pin = PinAddress::new("gpio.4");
        assert!(pin.defined());
        assert_eq!(pin.name(), "gpio.4");

        assert!(!PinAddress::undefined().defined());
        assert!(!PinAddress::new("NO_PIN").defined());
        assert!(!PinAddress::new("").defined());
    }
}
