//! # ATCKit
//!
//! Automatic tool changer (ATC) control logic for CNC machines:
//! pneumatic rack changer choreography, toolsetter probing and per-tool
//! Z length offset calibration.
//!
//! ## Architecture
//!
//! ATCKit is organized as a workspace with multiple crates:
//!
//! 1. **atckit-core** - Data types, machine interface traits, errors
//! 2. **atckit-settings** - ATC spindle configuration schema and file I/O
//! 3. **atckit-atc** - Tool-change controller, valve, probe, simulator
//! 4. **atckit** - Main binary that runs a demo session with restart handling

pub mod session;

pub use atckit_atc::{
    AtcController, AtcHooks, AtcListener, AtcListenerHandle, MachineStateSnapshot, NoOpHooks,
    OnOffSpindle, ProbeSequencer, ToolPositionTable, ToolSlot, ValveActuator, ETS_INDEX,
    MANUAL_CHG, NO_TOOL, TOOL_COUNT,
};
pub use atckit_core::{
    AlarmKind, AtcError, Axis, ConfigError, CoolantState, DistanceMode, Error, Machine,
    MachineError, MachineLimits, MachineState, MachineStateProvider, ModalState, MotionCommand,
    MotionExecutor, OutputPin, PartialPosition, PinAddress, Position, Result, SpindleDriver,
};
pub use atckit_settings::{AtcSpindleConfig, SettingsError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with console output, RUST_LOG environment
/// variable support and INFO as the default level.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
