//! # ATCKit Core
//!
//! Core types, traits, and errors for ATCKit.
//! Provides the machine-interface abstractions the tool-change controller
//! is written against, plus the shared data models and error types.

pub mod data;
pub mod error;
pub mod machine;

pub use data::{
    AlarmKind, Axis, CoolantState, DistanceMode, MachineState, ModalState, PartialPosition,
    PinAddress, Position, NO_PIN,
};

pub use error::{AtcError, ConfigError, Error, MachineError, Result};

pub use machine::{
    Machine, MachineLimits, MachineStateProvider, MotionCommand, MotionExecutor, OutputPin,
    SpindleDriver,
};
