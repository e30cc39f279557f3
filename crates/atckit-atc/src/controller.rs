//! Tool-change controller
//!
//! The state machine coordinating the valve, the tool table, the probe
//! sequencer and the machine-state snapshot around a tool swap. Entry
//! points are `init`, `tool_change`, `set_atc_state`, `probe_notification`
//! and the [`SpindleDriver`] surface; everything else is choreography.
//!
//! An automated change runs strictly sequentially: drain the motion
//! queue, snapshot modal state and position, retract, return the held
//! tool, pick up the requested one, measure it on the toolsetter, then
//! restore the snapshot. A probe alarm abandons the change in its
//! partial state; the operator resolves it through the machine alarm.
//!
//! `tool_change` is not reentrant. It assumes exclusive ownership of the
//! spindle, coolant and position for its whole duration; callers
//! serialize their requests.

use atckit_core::{
    AtcError, Axis, MachineError, Machine, MotionCommand, PartialPosition, SpindleDriver,
};
use atckit_settings::AtcSpindleConfig;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::hooks::{AtcHooks, NoOpHooks};
use crate::listener::{AtcListener, AtcListenerHandle};
use crate::probe::ProbeSequencer;
use crate::snapshot::MachineStateSnapshot;
use crate::spindle::OnOffSpindle;
use crate::tool_table::{ToolPositionTable, ETS_INDEX, MANUAL_CHG, NO_TOOL, TOOL_COUNT};
use crate::valve::ValveActuator;

/// Settle dwell after opening or closing the gripper during pickup, seconds
const TOOL_GRAB_SECONDS: f64 = 0.25;

/// Valve-open dwell of a manual change, seconds
const MANUAL_TOGGLE_SECONDS: f64 = 2.0;

type ListenerMap = HashMap<String, Arc<dyn AtcListener>>;

/// Pneumatic tool-rack changer with toolsetter length calibration
///
/// Composes the base on/off spindle driver rather than replacing it:
/// `activate` passes straight through, `deactivate` first returns the
/// held tool and carries the zeroed tool's Z reference forward.
pub struct AtcController<M: Machine> {
    machine: Arc<Mutex<M>>,
    base: OnOffSpindle<M>,
    valve: ValveActuator,
    probe: ProbeSequencer,
    hooks: Box<dyn AtcHooks>,
    config: AtcSpindleConfig,
    tools: ToolPositionTable,
    current_tool: u8,
    zeroed_tool_index: u8,
    atc_ok: bool,
    top_of_z: f64,
    // true only while the internal toolsetter probe is in flight; the
    // sole guard keeping external probe notifications from re-zeroing
    tool_setter_probing: bool,
    listeners: Arc<RwLock<ListenerMap>>,
}

impl<M: Machine> AtcController<M> {
    /// Build a controller over a shared machine handle and claimed valve pins
    ///
    /// Nothing is validated here; call [`init`](Self::init) before use.
    pub fn new(machine: Arc<Mutex<M>>, config: AtcSpindleConfig, valve: ValveActuator) -> Self {
        let base = OnOffSpindle::new(Arc::clone(&machine), config.spinup_ms, config.spindown_ms);
        Self {
            machine,
            base,
            valve,
            probe: ProbeSequencer::new(),
            hooks: Box::new(NoOpHooks),
            config,
            tools: ToolPositionTable::default(),
            current_tool: NO_TOOL,
            zeroed_tool_index: NO_TOOL,
            atc_ok: false,
            top_of_z: 0.0,
            tool_setter_probing: false,
            listeners: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Replace the default no-op machine hooks
    pub fn with_hooks(mut self, hooks: Box<dyn AtcHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate configuration, derive the retract height, parse the rack
    ///
    /// A zero spin-down delay, an undefined gripper valve pin or a
    /// malformed position list fails init and latches the controller
    /// unusable for the session. The dust-off pins may be left undefined;
    /// their blasts then degrade to plain dwells.
    pub async fn init(&mut self) -> Result<(), AtcError> {
        self.atc_ok = false;

        self.config.validate()?;
        self.tools = ToolPositionTable::from_config(&self.config)?;

        {
            let machine = self.machine.lock().await;
            self.top_of_z = machine.max_travel(Axis::Z) - machine.motor_pulloff(Axis::Z);
        }

        let (rack_dustoff, ets_dustoff) = self.valve.dustoff_pins();
        info!("ATC gripper valve: {}", self.valve.gripper_pin());
        info!("ATC rack dust-off valve: {rack_dustoff}");
        info!("ATC toolsetter dust-off valve: {ets_dustoff}");
        info!(top_of_z = self.top_of_z, "ATC initialized");

        self.atc_ok = true;
        self.hooks.on_machine_init();
        Ok(())
    }

    /// Tool currently held by the spindle (NO_TOOL if empty)
    pub fn current_tool(&self) -> u8 {
        self.current_tool
    }

    /// Reference tool whose measured offset defines Z zero
    pub fn zeroed_tool_index(&self) -> u8 {
        self.zeroed_tool_index
    }

    /// Check whether init completed successfully this session
    pub fn is_atc_ok(&self) -> bool {
        self.atc_ok
    }

    /// Retract height derived at init from Z travel minus pulloff
    pub fn top_of_z(&self) -> f64 {
        self.top_of_z
    }

    /// The parsed tool position table
    pub fn tools(&self) -> &ToolPositionTable {
        &self.tools
    }

    /// Change to `new_tool`, or just announce it when `pre_select` is set
    ///
    /// Manual-sentinel changes toggle the valve once and swap the tool
    /// number; anything else runs the full automated choreography. On a
    /// probe failure the machine is left in its partial state and the
    /// error reports the alarm classification.
    pub async fn tool_change(&mut self, new_tool: u8, pre_select: bool) -> Result<(), AtcError> {
        debug!(
            new_tool,
            from = self.current_tool,
            pre_select,
            "ATC tool change"
        );

        if !self.atc_ok {
            error!("ATC not initialized, toolchange failed");
            return Err(AtcError::NotReady);
        }
        if new_tool > MANUAL_CHG {
            error!("Invalid tool number: {new_tool}");
            return Err(AtcError::InvalidTool { number: new_tool });
        }
        if pre_select {
            self.hooks.on_tool_preselect(new_tool);
            return Ok(());
        }

        let old_tool = self.current_tool;
        let machine = Arc::clone(&self.machine);
        let mut machine = machine.lock().await;

        // wait for all previous moves to complete, then snapshot the
        // settled state
        machine.synchronize().await.map_err(sync_failed)?;
        let snapshot = MachineStateSnapshot::capture(&*machine);

        if self.current_tool == MANUAL_CHG || new_tool == MANUAL_CHG {
            self.manual_change(&mut *machine, new_tool, &snapshot)
                .await?;
        } else {
            self.automated_change(&mut *machine, new_tool, &snapshot)
                .await?;
        }
        drop(machine);

        self.notify_tool_changed(old_tool, self.current_tool);
        Ok(())
    }

    /// Open or close the gripper valve; hard-fails while the spindle is on
    pub async fn set_atc_state(&mut self, open: bool) -> Result<(), AtcError> {
        let spindle_on = self.machine.lock().await.modal().spindle_on;
        self.valve.set_gripper(open, spindle_on)
    }

    /// Probe-completion callback, fired once per probe cycle in the system
    ///
    /// Commits the held tool as the new Z reference. No-ops when the
    /// machine is in alarm, when the probe in flight was the internal
    /// toolsetter cycle, or when the held tool has no rack slot (a
    /// manually loaded tool is never measured on the toolsetter, so its
    /// offset can never define zero).
    pub async fn probe_notification(&mut self) {
        let in_alarm = self.machine.lock().await.machine_state().is_alarm();
        if in_alarm || self.tool_setter_probing {
            return;
        }
        if self.current_tool > TOOL_COUNT {
            debug!(
                tool = self.current_tool,
                "probe completion ignored, held tool has no rack slot"
            );
            return;
        }
        self.zeroed_tool_index = self.current_tool;
        info!(tool = self.zeroed_tool_index, "ATC zeroed tool updated");
    }

    async fn manual_change(
        &mut self,
        machine: &mut M,
        new_tool: u8,
        snapshot: &MachineStateSnapshot,
    ) -> Result<(), AtcError> {
        if snapshot.spindle_was_on {
            error!("Spindle must not be active for a manual change");
            return Err(AtcError::Safety {
                reason: "spindle active during a manual tool change".to_string(),
            });
        }
        // a manual tool only pairs with the empty spindle; two held tools
        // cannot be exchanged in one step
        if self.current_tool != NO_TOOL && new_tool != NO_TOOL {
            return Err(AtcError::ManualPairing {
                current: self.current_tool,
                requested: new_tool,
            });
        }

        info!("Manual tool change: toggle ATC");
        self.hooks.on_manual_change(new_tool);
        self.valve.set_gripper(true, snapshot.spindle_was_on)?;
        machine
            .submit(MotionCommand::Dwell {
                seconds: MANUAL_TOGGLE_SECONDS,
            })
            .await?;
        self.valve.set_gripper(false, snapshot.spindle_was_on)?;
        self.current_tool = new_tool;
        Ok(())
    }

    async fn automated_change(
        &mut self,
        machine: &mut M,
        new_tool: u8,
        snapshot: &MachineStateSnapshot,
    ) -> Result<(), AtcError> {
        if !snapshot.coolant.is_off() {
            machine.submit(MotionCommand::CoolantOff).await?;
        }
        if snapshot.spindle_was_on {
            machine.submit(MotionCommand::SpindleOff).await?;
            machine
                .submit(MotionCommand::Dwell {
                    seconds: self.config.spindown_ms as f64 / 1000.0,
                })
                .await?;
        }

        self.goto_top_of_z(machine).await?;

        if self.current_tool != NO_TOOL {
            self.return_tool(machine, self.current_tool).await?;
        }
        if new_tool != NO_TOOL {
            self.take_tool(machine, new_tool).await?;
        }

        // measure the length of whatever the spindle now holds; a probe
        // alarm abandons the change here, restoration skipped
        self.atc_toolsetter_probe(machine).await?;

        // restore XY at the safe height, then modal state, then Z shifted
        // by the freshly applied tool length offset
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::xyz(
                snapshot.mpos.x,
                snapshot.mpos.y,
                self.top_of_z,
            )))
            .await?;
        if snapshot.spindle_was_on {
            machine.submit(MotionCommand::SpindleOn).await?;
            machine
                .submit(MotionCommand::Dwell {
                    seconds: self.config.spinup_ms as f64 / 1000.0,
                })
                .await?;
        }
        if snapshot.coolant.mist {
            machine.submit(MotionCommand::CoolantMist).await?;
        }
        if snapshot.coolant.flood {
            machine.submit(MotionCommand::CoolantFlood).await?;
        }
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(
                snapshot.mpos.z + machine.tool_length_offset(),
            )))
            .await?;
        if machine.modal().distance != snapshot.distance {
            machine
                .submit(MotionCommand::SetDistanceMode(snapshot.distance))
                .await?;
        }
        Ok(())
    }

    /// Pick up `tool_num` from its rack slot
    ///
    /// Strictly sequential: move above, open, descend, settle, grip,
    /// grab-settle, retract.
    async fn take_tool(&mut self, machine: &mut M, tool_num: u8) -> Result<(), AtcError> {
        debug!(tool_num, "ATC take tool");
        let slot_z = self.tools.slot(tool_num).mpos.z;

        self.go_above_tool(machine, tool_num).await?;
        self.valve.set_gripper(true, machine.modal().spindle_on)?;
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(slot_z)))
            .await?;
        machine
            .submit(MotionCommand::Dwell {
                seconds: TOOL_GRAB_SECONDS,
            })
            .await?;
        self.valve.set_gripper(false, machine.modal().spindle_on)?;
        machine
            .submit(MotionCommand::Dwell {
                seconds: TOOL_GRAB_SECONDS,
            })
            .await?;
        self.current_tool = tool_num;
        self.goto_top_of_z(machine).await
    }

    /// Drop the held tool into its rack slot
    ///
    /// The gripper stays open until the spindle has retracted to the
    /// configured empty-safe height, keeping the open gripper clear of
    /// the rack.
    async fn return_tool(&mut self, machine: &mut M, tool_num: u8) -> Result<(), AtcError> {
        debug!(tool_num, "ATC return tool");
        let slot_z = self.tools.slot(tool_num).mpos.z;

        self.go_above_tool(machine, tool_num).await?;
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(slot_z)))
            .await?;
        self.valve.set_gripper(true, machine.modal().spindle_on)?;
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(
                self.config.empty_safe_z,
            )))
            .await?;
        self.valve.set_gripper(false, machine.modal().spindle_on)?;
        self.current_tool = NO_TOOL;
        Ok(())
    }

    /// Retract fully, then travel laterally to the slot's XY
    async fn go_above_tool(&mut self, machine: &mut M, tool_num: u8) -> Result<(), AtcError> {
        self.goto_top_of_z(machine).await?;
        let mpos = self.tools.slot(tool_num).mpos;
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::xy(
                mpos.x, mpos.y,
            )))
            .await?;
        Ok(())
    }

    async fn goto_top_of_z(&mut self, machine: &mut M) -> Result<(), AtcError> {
        machine
            .submit(MotionCommand::RapidMachine(PartialPosition::z_only(
                self.top_of_z,
            )))
            .await?;
        Ok(())
    }

    /// Measure the held tool on the toolsetter and apply its offset
    ///
    /// Stores the raw contact height on the tool's slot; once a reference
    /// tool has been zeroed, the delta against it is applied as the live
    /// tool length offset.
    async fn atc_toolsetter_probe(&mut self, machine: &mut M) -> Result<(), AtcError> {
        let ets = *self.tools.slot(ETS_INDEX);
        let probed = self
            .probe
            .run(
                machine,
                &mut self.valve,
                &ets,
                self.top_of_z,
                &mut self.tool_setter_probing,
            )
            .await;

        let contact_z = match probed {
            Ok(z) => z,
            Err(e) => {
                if let AtcError::ProbeFailed { kind } = &e {
                    self.notify_probe_failed(*kind);
                }
                return Err(e);
            }
        };

        // the probe subsystem reports completion before the cycle
        // returns; the guard makes this internal cycle a no-op there
        self.probe_notification_guarded(machine);
        self.tool_setter_probing = false;

        self.tools.slot_mut(self.current_tool).offset_z = contact_z;

        if self.zeroed_tool_index != NO_TOOL {
            let tlo = contact_z - self.tools.slot(self.zeroed_tool_index).offset_z;
            info!(tool = self.current_tool, tlo, "ATC tool measured");
            machine
                .submit(MotionCommand::SetToolLengthOffset { z: tlo })
                .await?;
            self.notify_tool_measured(self.current_tool, tlo);
        }

        self.goto_top_of_z(machine).await
    }

    // synchronous twin of probe_notification for delivery while the
    // machine lock is already held
    fn probe_notification_guarded(&mut self, machine: &M) {
        if machine.machine_state().is_alarm()
            || self.tool_setter_probing
            || self.current_tool > TOOL_COUNT
        {
            return;
        }
        self.zeroed_tool_index = self.current_tool;
    }

    /// Register a listener for tool-change events
    pub fn register_listener(&self, listener: Arc<dyn AtcListener>) -> AtcListenerHandle {
        let id = Uuid::new_v4().to_string();
        self.listeners.write().insert(id.clone(), listener);
        AtcListenerHandle(id)
    }

    /// Remove a previously registered listener
    pub fn unregister_listener(&self, handle: &AtcListenerHandle) -> bool {
        self.listeners.write().remove(&handle.0).is_some()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    fn notify_tool_changed(&self, old_tool: u8, new_tool: u8) {
        for listener in self.listeners.read().values() {
            let listener = Arc::clone(listener);
            tokio::spawn(async move {
                listener.on_tool_changed(old_tool, new_tool).await;
            });
        }
    }

    fn notify_tool_measured(&self, tool: u8, offset_z: f64) {
        for listener in self.listeners.read().values() {
            let listener = Arc::clone(listener);
            tokio::spawn(async move {
                listener.on_tool_measured(tool, offset_z).await;
            });
        }
    }

    fn notify_probe_failed(&self, kind: atckit_core::AlarmKind) {
        for listener in self.listeners.read().values() {
            let listener = Arc::clone(listener);
            tokio::spawn(async move {
                listener.on_probe_failed(kind).await;
            });
        }
    }
}

fn sync_failed(e: MachineError) -> AtcError {
    AtcError::Machine(MachineError::SynchronizeFailed {
        reason: e.to_string(),
    })
}

#[async_trait]
impl<M: Machine> SpindleDriver for AtcController<M> {
    async fn init(&mut self) -> Result<(), AtcError> {
        self.base.init().await?;
        AtcController::init(self).await
    }

    async fn activate(&mut self) -> Result<(), AtcError> {
        debug!(tool = self.current_tool, "Activating ATC spindle");
        self.base.activate().await
    }

    /// Return any held tool, carry the zeroed tool's Z reference into the
    /// coordinate offset for the next spindle, then spin down
    async fn deactivate(&mut self) -> Result<(), AtcError> {
        debug!(tool = self.current_tool, "Deactivating ATC spindle");
        if let Err(e) = self.tool_change(NO_TOOL, false).await {
            warn!("ATC could not return tool on deactivate: {e}");
        }

        let zeroed_offset = self.tools.slot(self.zeroed_tool_index).offset_z;
        {
            let mut machine = self.machine.lock().await;
            info!("ETS: {zeroed_offset}");
            info!("Surface: {}", machine.work_offset_z());
            info!("Delta: {}", zeroed_offset - machine.work_offset_z());
            machine.set_coord_offset_z(zeroed_offset);
        }

        self.base.deactivate().await
    }

    async fn stop(&mut self) -> Result<(), AtcError> {
        self.base.stop().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{sim_valve, SimMachine};

    fn controller() -> AtcController<SimMachine> {
        let machine = SimMachine::shared();
        let config = AtcSpindleConfig::default();
        let (valve, _journal) = sim_valve(&config);
        AtcController::new(machine, config, valve)
    }

    #[tokio::test]
    async fn test_uninitialized_controller_rejects_changes() {
        let mut atc = controller();
        assert!(!atc.is_atc_ok());
        let err = atc.tool_change(1, false).await.unwrap_err();
        assert_eq!(err, AtcError::NotReady);
    }

    #[tokio::test]
    async fn test_init_derives_retract_height_from_limits() {
        let mut atc = controller();
        atc.init().await.unwrap();
        assert!(atc.is_atc_ok());
        // sim Z homes at 0 with 1mm pulloff
        assert_eq!(atc.top_of_z(), -1.0);
    }

    #[tokio::test]
    async fn test_tool_number_past_manual_sentinel_rejected() {
        let mut atc = controller();
        atc.init().await.unwrap();
        let err = atc.tool_change(MANUAL_CHG + 1, false).await.unwrap_err();
        assert_eq!(
            err,
            AtcError::InvalidTool {
                number: MANUAL_CHG + 1
            }
        );
    }

    #[tokio::test]
    async fn test_listener_registry_register_unregister() {
        struct Quiet;
        #[async_trait]
        impl AtcListener for Quiet {}

        let atc = controller();
        let handle = atc.register_listener(Arc::new(Quiet));
        assert_eq!(atc.listener_count(), 1);
        assert!(atc.unregister_listener(&handle));
        assert!(!atc.unregister_listener(&handle));
        assert_eq!(atc.listener_count(), 0);
    }
}
