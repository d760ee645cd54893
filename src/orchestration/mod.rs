//! Drives the engine from an event source and keeps SQLite in step.

pub mod replay;

pub use replay::{ReplayError, ReplayResult, Replayer};
