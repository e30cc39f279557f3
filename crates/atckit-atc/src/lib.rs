//! Automatic tool changer control logic
//!
//! Orchestrates a pneumatic tool-rack changer, a toolsetter probe and
//! machine-state save/restore around a tool swap, and calibrates per-tool
//! Z length offsets. The controller drives the machine exclusively
//! through the interface traits in `atckit-core`; an in-process simulated
//! machine backs the tests and the demo session.

pub mod controller;
pub mod hooks;
pub mod listener;
pub mod probe;
pub mod sim;
pub mod snapshot;
pub mod spindle;
pub mod tool_table;
pub mod valve;

pub use controller::AtcController;
pub use hooks::{AtcHooks, NoOpHooks};
pub use listener::{AtcListener, AtcListenerHandle};
pub use probe::{ProbeSequencer, PROBE_FEEDRATE};
pub use snapshot::MachineStateSnapshot;
pub use spindle::OnOffSpindle;
pub use tool_table::{ToolPositionTable, ToolSlot, ETS_INDEX, MANUAL_CHG, NO_TOOL, TOOL_COUNT};
pub use valve::{ValveActuator, DUSTOFF_SECONDS};
