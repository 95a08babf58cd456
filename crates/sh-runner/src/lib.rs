//! Per-world execution engine for simhost.
//!
//! A [`WorldRunner`] owns one instantiated world and steps it: each step
//! applies queued entity removals, advances the [`clock::StepClock`] and runs
//! every attached [`System`]. [`SimulationRunner`] is the implementation the
//! server uses by default; the trait exists so the lifecycle code can be
//! driven by other engines.

/// Simulated time bookkeeping.
pub mod clock;
/// Entities instantiated from a world description.
pub mod entity;
/// Error types.
pub mod error;
/// Built-in state recorder.
pub mod record;
/// Plugin name to system constructor mapping.
pub mod registry;
/// The runner trait and default implementation.
pub mod runner;
/// Extension module trait and step context.
pub mod system;

pub use entity::{EntityId, EntityKind, EntityRecord, EntityStore};
pub use error::{SimError, SimResult};
pub use record::RecordSystem;
pub use registry::SystemRegistry;
pub use runner::{DefaultRunnerFactory, EntityTarget, RunnerFactory, SimulationRunner, WorldRunner};
pub use system::{System, UpdateContext, UpdateInfo};
