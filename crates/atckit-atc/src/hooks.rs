//! Machine-specific override hooks
//!
//! Injectable strategy set with default no-op implementations. A machine
//! build that needs special behavior at init, on tool preselect, or
//! around a manual change supplies its own implementation; everything
//! else runs with [`NoOpHooks`].

/// Optional machine-specific callbacks consulted by the controller
pub trait AtcHooks: Send + Sync {
    /// Called once after the controller finished its own init
    fn on_machine_init(&self) {}

    /// Called when a tool preselect is requested (informational only)
    fn on_tool_preselect(&self, _new_tool: u8) {}

    /// Called just before a manual valve-toggle change
    fn on_manual_change(&self, _new_tool: u8) {}
}

/// Default hook set: every callback does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHooks;

impl AtcHooks for NoOpHooks {}
