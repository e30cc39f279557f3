//! In-process simulated machine
//!
//! Implements the machine-interface traits against plain state: every
//! submitted command is appended to a log and applied to the simulated
//! modal/positional state immediately. Probe cycles follow a scripted
//! [`ProbeBehavior`]. Used by the integration tests and the demo binary;
//! it models command effects, not a motion planner.

use atckit_core::{
    AlarmKind, Axis, CoolantState, DistanceMode, MachineError, MachineLimits, MachineState,
    MachineStateProvider, ModalState, MotionCommand, MotionExecutor, OutputPin, PinAddress,
    Position,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::valve::ValveActuator;

/// Scripted outcome of the next probe cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeBehavior {
    /// Contact at the given machine-frame Z
    ContactAt(f64),
    /// Probe switch already closed at cycle start
    FailInitial,
    /// Probe travel completes without contact
    FailContact,
}

/// Simulated machine with a recorded command log
#[derive(Debug)]
pub struct SimMachine {
    log: Vec<MotionCommand>,
    modal: ModalState,
    state: MachineState,
    last_alarm: Option<AlarmKind>,
    mpos: Position,
    probe_mpos: Position,
    work_offset_z: f64,
    coord_offset_z: f64,
    tlo: f64,
    probe: ProbeBehavior,
}

impl SimMachine {
    /// New idle machine at the origin, probes contacting at Z -28.0
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            modal: ModalState::default(),
            state: MachineState::Idle,
            last_alarm: None,
            mpos: Position::default(),
            probe_mpos: Position::default(),
            work_offset_z: 0.0,
            coord_offset_z: 0.0,
            tlo: 0.0,
            probe: ProbeBehavior::ContactAt(-28.0),
        }
    }

    /// New machine behind the shared handle the controller expects
    pub fn shared() -> Arc<tokio::sync::Mutex<Self>> {
        Arc::new(tokio::sync::Mutex::new(Self::new()))
    }

    /// Commands submitted so far, in order
    pub fn log(&self) -> &[MotionCommand] {
        &self.log
    }

    /// Forget the recorded commands
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    /// Script the outcome of subsequent probe cycles
    pub fn set_probe_behavior(&mut self, probe: ProbeBehavior) {
        self.probe = probe;
    }

    /// Force the spindle modal state (as if M3/M5 ran outside the ATC)
    pub fn set_spindle_on(&mut self, on: bool) {
        self.modal.spindle_on = on;
    }

    /// Force the coolant modal state
    pub fn set_coolant(&mut self, coolant: CoolantState) {
        self.modal.coolant = coolant;
    }

    /// Force the distance mode
    pub fn set_distance_mode(&mut self, distance: DistanceMode) {
        self.modal.distance = distance;
    }

    /// Teleport the machine (settled position included)
    pub fn set_mpos(&mut self, mpos: Position) {
        self.mpos = mpos;
    }

    /// Set the active work coordinate offset Z
    pub fn set_work_offset_z(&mut self, z: f64) {
        self.work_offset_z = z;
    }

    /// Latch the configuration-alarm state after a fatal session error
    pub fn enter_config_alarm(&mut self) {
        self.state = MachineState::ConfigAlarm;
    }

    /// Clear an alarm back to idle
    pub fn clear_alarm(&mut self) {
        self.state = MachineState::Idle;
        self.last_alarm = None;
    }
}

impl Default for SimMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MotionExecutor for SimMachine {
    async fn submit(&mut self, cmd: MotionCommand) -> Result<(), MachineError> {
        if self.state.is_alarm() {
            return Err(MachineError::CommandRejected {
                reason: format!("machine in {}", self.state),
            });
        }

        self.log.push(cmd.clone());
        match cmd {
            MotionCommand::RapidMachine(target) => {
                self.mpos = target.apply_to(&self.mpos);
            }
            MotionCommand::Dwell { .. } => {}
            MotionCommand::ProbeZ { .. } => match self.probe {
                ProbeBehavior::ContactAt(z) => {
                    self.mpos.z = z;
                    self.probe_mpos = self.mpos;
                }
                ProbeBehavior::FailInitial => {
                    self.state = MachineState::Alarm;
                    self.last_alarm = Some(AlarmKind::ProbeFailInitial);
                    return Err(MachineError::Alarm {
                        kind: AlarmKind::ProbeFailInitial,
                    });
                }
                ProbeBehavior::FailContact => {
                    self.state = MachineState::Alarm;
                    self.last_alarm = Some(AlarmKind::ProbeFailContact);
                    return Err(MachineError::Alarm {
                        kind: AlarmKind::ProbeFailContact,
                    });
                }
            },
            MotionCommand::SpindleOn => self.modal.spindle_on = true,
            MotionCommand::SpindleOff => self.modal.spindle_on = false,
            MotionCommand::CoolantOff => self.modal.coolant = CoolantState::default(),
            MotionCommand::CoolantMist => self.modal.coolant.mist = true,
            MotionCommand::CoolantFlood => self.modal.coolant.flood = true,
            MotionCommand::SetDistanceMode(mode) => self.modal.distance = mode,
            MotionCommand::SetToolLengthOffset { z } => self.tlo = z,
        }
        Ok(())
    }

    async fn synchronize(&mut self) -> Result<(), MachineError> {
        // commands apply immediately, the queue is always drained
        Ok(())
    }
}

impl MachineStateProvider for SimMachine {
    fn modal(&self) -> ModalState {
        self.modal
    }

    fn machine_state(&self) -> MachineState {
        self.state
    }

    fn last_alarm(&self) -> Option<AlarmKind> {
        self.last_alarm
    }

    fn settled_mpos(&self) -> Position {
        self.mpos
    }

    fn probe_contact_mpos(&self) -> Position {
        self.probe_mpos
    }

    fn work_offset_z(&self) -> f64 {
        self.work_offset_z
    }

    fn coord_offset_z(&self) -> f64 {
        self.coord_offset_z
    }

    fn set_coord_offset_z(&mut self, z: f64) {
        self.coord_offset_z = z;
    }

    fn tool_length_offset(&self) -> f64 {
        self.tlo
    }
}

impl MachineLimits for SimMachine {
    fn max_travel(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => 400.0,
            Axis::Y => 300.0,
            // Z homes at the top; machine zero is the top of travel
            Axis::Z => 0.0,
        }
    }

    fn motor_pulloff(&self, _axis: Axis) -> f64 {
        1.0
    }
}

/// Shared journal of `(pin name, level)` writes
pub type PinJournal = Arc<Mutex<Vec<(String, bool)>>>;

/// Output pin that records writes into a shared journal
///
/// Writes to an undefined address succeed and are not journaled, the way
/// the motion controller swallows NO_PIN writes.
#[derive(Debug, Clone)]
pub struct SoftPin {
    address: PinAddress,
    journal: PinJournal,
}

impl SoftPin {
    /// Claim a journaled pin for an address
    pub fn new(address: PinAddress, journal: PinJournal) -> Self {
        Self { address, journal }
    }
}

impl OutputPin for SoftPin {
    fn address(&self) -> &PinAddress {
        &self.address
    }

    fn write(&mut self, high: bool) -> Result<(), MachineError> {
        if self.is_defined() {
            self.journal
                .lock()
                .push((self.address.name().to_string(), high));
        }
        Ok(())
    }
}

/// Build a valve actuator on journaled pins from a config's pin addresses
pub fn sim_valve(config: &atckit_settings::AtcSpindleConfig) -> (ValveActuator, PinJournal) {
    let journal: PinJournal = Arc::new(Mutex::new(Vec::new()));
    let valve = ValveActuator::new(
        Box::new(SoftPin::new(config.atc_valve_pin.clone(), journal.clone())),
        Box::new(SoftPin::new(
            config.atc_dustoff_pin.clone(),
            journal.clone(),
        )),
        Box::new(SoftPin::new(
            config.ets_dustoff_pin.clone(),
            journal.clone(),
        )),
    );
    (valve, journal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atckit_core::PartialPosition;

    #[tokio::test]
    async fn test_rapid_moves_commanded_axes_only() {
        let mut machine = SimMachine::new();
        machine.set_mpos(Position::new(1.0, 2.0, 3.0));

        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(-1.0)))
            .await
            .unwrap();
        assert_eq!(machine.settled_mpos(), Position::new(1.0, 2.0, -1.0));

        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::xy(10.0, 20.0)))
            .await
            .unwrap();
        assert_eq!(machine.settled_mpos(), Position::new(10.0, 20.0, -1.0));
    }

    #[tokio::test]
    async fn test_probe_failure_latches_alarm_and_rejects_motion() {
        let mut machine = SimMachine::new();
        machine.set_probe_behavior(ProbeBehavior::FailContact);

        let err = machine
            .submit(MotionCommand::ProbeZ {
                target_z: -31.0,
                feed_rate: 300.0,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MachineError::Alarm {
                kind: AlarmKind::ProbeFailContact
            }
        );
        assert!(machine.machine_state().is_alarm());

        let err = machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(0.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, MachineError::CommandRejected { .. }));

        machine.clear_alarm();
        assert_eq!(machine.machine_state(), MachineState::Idle);
    }

    #[tokio::test]
    async fn test_config_alarm_latches_and_rejects_motion() {
        let mut machine = SimMachine::new();
        machine.enter_config_alarm();
        assert_eq!(machine.machine_state(), MachineState::ConfigAlarm);
        assert!(machine.machine_state().is_alarm());

        let err = machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(0.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, MachineError::CommandRejected { .. }));
    }

    #[tokio::test]
    async fn test_probe_contact_latches_position() {
        let mut machine = SimMachine::new();
        machine.set_mpos(Position::new(157.0, 142.0, -1.0));
        machine.set_probe_behavior(ProbeBehavior::ContactAt(-29.5));

        machine
            .submit(MotionCommand::ProbeZ {
                target_z: -31.0,
                feed_rate: 300.0,
            })
            .await
            .unwrap();
        assert_eq!(
            machine.probe_contact_mpos(),
            Position::new(157.0, 142.0, -29.5)
        );
    }

    #[test]
    fn test_undefined_pin_write_is_swallowed() {
        let journal: PinJournal = Arc::new(Mutex::new(Vec::new()));
        let mut pin = SoftPin::new(PinAddress::undefined(), journal.clone());
        pin.write(true).unwrap();
        assert!(journal.lock().is_empty());
    }
}
