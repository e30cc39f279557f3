//! Tool-change event listeners
//!
//! Implement [`AtcListener`] to observe tool changes, length measurements
//! and probe failures without coupling to the controller's control flow.
//! Listeners are notified on separate tasks and cannot block a change.

use async_trait::async_trait;
use atckit_core::AlarmKind;

/// Handle for a registered ATC listener.
///
/// Uniquely identifies a listener subscription. Can be used to
/// unsubscribe from tool-change events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AtcListenerHandle(pub String);

/// Listener trait for tool-change events
#[async_trait]
pub trait AtcListener: Send + Sync {
    /// Called after the held tool changed
    async fn on_tool_changed(&self, _old_tool: u8, _new_tool: u8) {}

    /// Called after a tool's length offset was measured and applied
    async fn on_tool_measured(&self, _tool: u8, _offset_z: f64) {}

    /// Called when the toolsetter probe ends in alarm
    async fn on_probe_failed(&self, _kind: AlarmKind) {}
}
