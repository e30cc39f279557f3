//! Toolsetter probing cycle
//!
//! Drives the probe sequence against the electronic tool setter: dust-off
//! blast, retract, travel to the setter, then a bounded-feedrate probe
//! toward a depth computed from the setter's machine position and the
//! active work/coordinate/tool-length offsets. A cycle ending in alarm is
//! classified (switch error vs missing target) and reported as a probe
//! failure; the caller abandons the change in its partial state.

use atckit_core::{
    AtcError, MachineError, Machine, MotionCommand, PartialPosition,
};
use tracing::{debug, error};

use crate::tool_table::ToolSlot;
use crate::valve::ValveActuator;

/// Feed rate for the probing motion, mm/min
pub const PROBE_FEEDRATE: f64 = 300.0;

/// Runs the toolsetter probing cycle and reports the contact height
#[derive(Debug, Clone, Copy)]
pub struct ProbeSequencer {
    feed_rate: f64,
}

impl ProbeSequencer {
    /// Sequencer with the default probing feed rate
    pub fn new() -> Self {
        Self {
            feed_rate: PROBE_FEEDRATE,
        }
    }

    /// Sequencer with a custom probing feed rate
    pub fn with_feed_rate(feed_rate: f64) -> Self {
        Self { feed_rate }
    }

    /// Work-frame probe target below the toolsetter
    ///
    /// The setter position is machine-frame; the probe command is issued
    /// in the work frame, so the active offsets are subtracted out.
    pub fn probe_depth(ets_z: f64, work_offset_z: f64, coord_offset_z: f64, tlo: f64) -> f64 {
        ets_z - (work_offset_z + coord_offset_z + tlo)
    }

    /// Run one probing cycle; returns the machine-frame contact Z
    ///
    /// `guard` is the controller's reentrancy flag marking the probe in
    /// flight as the internal toolsetter probe. It is raised before the
    /// probing motion; on alarm it is lowered here, on success it is left
    /// raised so the caller can deliver the probe-completion hook for
    /// this cycle before lowering it.
    pub async fn run<M>(
        &self,
        machine: &mut M,
        valve: &mut ValveActuator,
        ets: &ToolSlot,
        top_of_z: f64,
        guard: &mut bool,
    ) -> Result<f64, AtcError>
    where
        M: Machine + ?Sized,
    {
        valve.blast_toolsetter(machine).await?;

        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(
                top_of_z,
            )))
            .await?;
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::xy(
                ets.mpos.x, ets.mpos.y,
            )))
            .await?;

        let target_z = Self::probe_depth(
            ets.mpos.z,
            machine.work_offset_z(),
            machine.coord_offset_z(),
            machine.tool_length_offset(),
        );
        debug!(target_z, feed_rate = self.feed_rate, "toolsetter probe");

        *guard = true;
        let probed = machine
            .submit(MotionCommand::ProbeZ {
                target_z,
                feed_rate: self.feed_rate,
            })
            .await;

        if let Err(e) = probed {
            *guard = false;
            return Err(match e {
                MachineError::Alarm { kind } => {
                    error!("ATC probe failed: {kind}");
                    AtcError::ProbeFailed { kind }
                }
                other => other.into(),
            });
        }

        Ok(machine.probe_contact_mpos().z)
    }
}

impl Default for ProbeSequencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{sim_valve, ProbeBehavior, SimMachine};
    use atckit_core::AlarmKind;
    use atckit_settings::AtcSpindleConfig;

    fn ets_slot() -> ToolSlot {
        ToolSlot {
            mpos: atckit_core::Position::new(157.0, 142.0, -31.0),
            offset_z: 0.0,
        }
    }

    #[test]
    fn test_probe_depth_subtracts_active_offsets() {
        // ets z -31, wco 2 + coord offset 1 + tlo 0.5 => -34.5
        assert_eq!(ProbeSequencer::probe_depth(-31.0, 2.0, 1.0, 0.5), -34.5);
        assert_eq!(ProbeSequencer::probe_depth(-31.0, 0.0, 0.0, 0.0), -31.0);
    }

    #[tokio::test]
    async fn test_successful_cycle_reports_contact_and_leaves_guard_raised() {
        let mut machine = SimMachine::new();
        machine.set_probe_behavior(ProbeBehavior::ContactAt(-28.4));
        let (mut valve, _journal) = sim_valve(&AtcSpindleConfig::default());

        let mut guard = false;
        let z = ProbeSequencer::new()
            .run(&mut machine, &mut valve, &ets_slot(), -1.0, &mut guard)
            .await
            .unwrap();

        assert_eq!(z, -28.4);
        assert!(guard, "guard stays raised until the completion hook ran");
        // dust-off dwell, retract, travel, probe
        assert!(matches!(
            machine.log().last(),
            Some(MotionCommand::ProbeZ { .. })
        ));
    }

    #[tokio::test]
    async fn test_alarm_is_classified_and_guard_lowered() {
        let mut machine = SimMachine::new();
        machine.set_probe_behavior(ProbeBehavior::FailInitial);
        let (mut valve, _journal) = sim_valve(&AtcSpindleConfig::default());

        let mut guard = false;
        let err = ProbeSequencer::new()
            .run(&mut machine, &mut valve, &ets_slot(), -1.0, &mut guard)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AtcError::ProbeFailed {
                kind: AlarmKind::ProbeFailInitial
            }
        );
        assert!(!guard);
    }
}
