//! Machine interface traits
//!
//! The tool-change controller never talks to hardware or formats G-code
//! text. It drives the machine through the traits in this module:
//!
//! - [`MotionExecutor`]: submit-and-await-completion command primitive
//! - [`MachineStateProvider`]: modal state, offsets, settled positions
//! - [`MachineLimits`]: axis travel and motor pulloff, read once at init
//! - [`OutputPin`]: synchronous binary actuation (valve, dust-off)
//! - [`SpindleDriver`]: the `{init, activate, deactivate, stop}`
//!   capability set a spindle-like device exposes
//!
//! Every submitted command blocks the caller (suspends the task) until the
//! machine reports it complete or enters an alarm state, so a sequence of
//! `submit` calls executes strictly in order.

use crate::data::{AlarmKind, Axis, DistanceMode, MachineState, ModalState, PartialPosition, PinAddress, Position};
use crate::error::{AtcError, MachineError};
use async_trait::async_trait;

/// A single motion/actuation request for the machine
///
/// Replaces textual G-code with an explicit command enum; the comments
/// give the conventional G-code each variant corresponds to.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionCommand {
    /// Rapid move in the machine frame, commanded axes only (G53 G0)
    RapidMachine(PartialPosition),
    /// Dwell for the given number of seconds (G4)
    Dwell { seconds: f64 },
    /// Probe toward a Z target in the work frame at a bounded feed rate,
    /// stopping on contact (G38.2)
    ProbeZ { target_z: f64, feed_rate: f64 },
    /// Enable the spindle (M3)
    SpindleOn,
    /// Disable the spindle (M5)
    SpindleOff,
    /// Turn off all coolant outputs (M9)
    CoolantOff,
    /// Enable mist coolant (M7)
    CoolantMist,
    /// Enable flood coolant (M8)
    CoolantFlood,
    /// Set the modal distance mode (G90/G91)
    SetDistanceMode(DistanceMode),
    /// Apply a dynamic tool length offset on Z (G43.1)
    SetToolLengthOffset { z: f64 },
}

/// Synchronous-from-the-caller's-view motion command executor
///
/// `submit` suspends until the command has completed or the machine is in
/// alarm; `synchronize` suspends until the motion queue is empty. The
/// executor never runs two submitted commands concurrently.
#[async_trait]
pub trait MotionExecutor: Send {
    /// Submit one command and wait for it to complete
    async fn submit(&mut self, cmd: MotionCommand) -> Result<(), MachineError>;

    /// Wait until all previously queued motion has drained
    async fn synchronize(&mut self) -> Result<(), MachineError>;
}

/// Read access to the machine's modal and positional state
///
/// Settled positions are derived from motor step counts, not from the
/// commanded target, so they are only meaningful after a `synchronize`.
pub trait MachineStateProvider: Send {
    /// Current modal state (distance mode, spindle, coolant)
    fn modal(&self) -> ModalState;

    /// Current machine state
    fn machine_state(&self) -> MachineState;

    /// Classification of the most recent alarm, if any
    fn last_alarm(&self) -> Option<AlarmKind>;

    /// Settled machine position from motor step counts
    fn settled_mpos(&self) -> Position;

    /// Machine position latched at the last probe contact
    fn probe_contact_mpos(&self) -> Position;

    /// Z component of the active work coordinate system offset
    fn work_offset_z(&self) -> f64;

    /// Z component of the G92-style coordinate offset
    fn coord_offset_z(&self) -> f64;

    /// Write the Z component of the G92-style coordinate offset
    fn set_coord_offset_z(&mut self, z: f64);

    /// Active dynamic tool length offset on Z
    fn tool_length_offset(&self) -> f64;
}

/// Machine travel limits, consumed once at controller init
pub trait MachineLimits: Send {
    /// Maximum machine position for an axis (top of travel)
    fn max_travel(&self, axis: Axis) -> f64;

    /// Homing pulloff distance of the axis motor
    fn motor_pulloff(&self, axis: Axis) -> f64;
}

/// The full machine context a tool-change controller operates against
pub trait Machine: MotionExecutor + MachineStateProvider + MachineLimits {}

impl<T: MotionExecutor + MachineStateProvider + MachineLimits> Machine for T {}

/// A binary output pin with synchronous writes
///
/// Writes to an undefined (NO_PIN) address succeed and do nothing, as on
/// the motion controller itself.
pub trait OutputPin: Send {
    /// Address this pin was claimed for
    fn address(&self) -> &PinAddress;

    /// Drive the pin high or low, synchronously
    fn write(&mut self, high: bool) -> Result<(), MachineError>;

    /// Check if the pin is mapped to real hardware
    fn is_defined(&self) -> bool {
        self.address().defined()
    }
}

/// Capability set of a spindle-like device
///
/// Tool-change controllers implement this by composing a base driver, not
/// by inheritance: `deactivate` on an ATC spindle first returns the held
/// tool, then delegates here.
#[async_trait]
pub trait SpindleDriver: Send {
    /// Initialize the driver; validation failures are reported, not fatal
    async fn init(&mut self) -> Result<(), AtcError>;

    /// Bring the spindle into its active state (spin-up dwell included)
    async fn activate(&mut self) -> Result<(), AtcError>;

    /// Bring the spindle out of its active state (spin-down dwell included)
    async fn deactivate(&mut self) -> Result<(), AtcError>;

    /// Stop the spindle immediately, without the spin-down dwell
    async fn stop(&mut self) -> Result<(), AtcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rapid_machine_carries_partial_axes() {
        let cmd = MotionCommand::RapidMachine(PartialPosition::xy(5.0, 6.0));
        match cmd {
            MotionCommand::RapidMachine(p) => {
                assert_eq!(p.x, Some(5.0));
                assert_eq!(p.y, Some(6.0));
                assert_eq!(p.z, None);
            }
            _ => unreachable!(),
        }
    }
}
