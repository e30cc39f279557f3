//! Machine state captured around a tool change
//!
//! The snapshot is taken after the motion queue has drained, so the saved
//! position reflects where the machine actually settled (motor steps),
//! not the last commanded target.

use atckit_core::{CoolantState, DistanceMode, MachineStateProvider, Position};

/// Modal state and settled position saved before a tool change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineStateSnapshot {
    /// Distance mode at capture time
    pub distance: DistanceMode,
    /// Spindle was enabled at capture time
    pub spindle_was_on: bool,
    /// Coolant outputs at capture time
    pub coolant: CoolantState,
    /// Settled machine position at capture time
    pub mpos: Position,
}

impl MachineStateSnapshot {
    /// Capture the current modal state and settled position
    pub fn capture<S: MachineStateProvider + ?Sized>(state: &S) -> Self {
        let modal = state.modal();
        Self {
            distance: modal.distance,
            spindle_was_on: modal.spindle_on,
            coolant: modal.coolant,
            mpos: state.settled_mpos(),
        }
    }

    /// Check if the machine was in incremental mode at capture time
    pub fn was_incremental(&self) -> bool {
        self.distance == DistanceMode::Incremental
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMachine;

    #[test]
    fn test_capture_reflects_machine() {
        let mut machine = SimMachine::new();
        machine.set_spindle_on(true);
        machine.set_coolant(CoolantState {
            flood: true,
            mist: false,
        });
        machine.set_mpos(Position::new(12.0, 34.0, -5.0));
        machine.set_distance_mode(DistanceMode::Incremental);

        let snap = MachineStateSnapshot::capture(&machine);
        assert!(snap.spindle_was_on);
        assert!(snap.coolant.flood);
        assert!(!snap.coolant.mist);
        assert_eq!(snap.mpos, Position::new(12.0, 34.0, -5.0));
        assert!(snap.was_incremental());
    }
}
