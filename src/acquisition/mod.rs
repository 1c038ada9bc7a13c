//! Acquisition control
//!
//! Operator commands, the retune rules that turn them into new instrument
//! configs, and the state machine that reacts to frames, commands and wait
//! timeouts.

pub mod command;
pub mod state;

pub use command::Command;
pub use state::{AcquisitionState, Capture, Effect, Event, RunFlags, SyncState, Transition};
