use std::time::Duration;

use rand::rngs::StdRng;

use crate::entity::EntityStore;
use crate::error::SimResult;

/// Timing of the step being executed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateInfo {
    /// Iteration number after this step (unchanged by paused steps).
    pub iteration: u64,
    /// Simulated time after this step.
    pub sim_time: Duration,
    /// Simulated time advanced by this step; zero when paused.
    pub dt: Duration,
    /// Whether this is a paused step.
    pub paused: bool,
}

/// Mutable context passed to each system during a step.
pub struct UpdateContext<'a> {
    /// Timing of the current step.
    pub info: UpdateInfo,
    /// Name of the world being stepped.
    pub world_name: &'a str,
    /// Live entities of the world.
    pub entities: &'a EntityStore,
    /// Deterministic per-world RNG.
    pub rng: &'a mut StdRng,
    stop_requested: bool,
}

impl<'a> UpdateContext<'a> {
    /// Build a context for one step.
    pub fn new(
        info: UpdateInfo,
        world_name: &'a str,
        entities: &'a EntityStore,
        rng: &'a mut StdRng,
    ) -> Self {
        Self {
            info,
            world_name,
            entities,
            rng,
            stop_requested: false,
        }
    }

    /// Ask the runner to stop after the current step.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    /// Whether any system asked to stop during this step.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }
}

/// An extension module that runs every step of one world.
///
/// Systems run in the order they were attached. An error from `update` is
/// logged and the step continues with the next system.
pub trait System: Send + std::fmt::Debug {
    /// Human-readable name for this system.
    fn name(&self) -> &str;

    /// Called once, before the first step after the system was attached.
    fn configure(&mut self, _ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Called once per step, paused or not.
    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()>;

    /// Support downcasting to concrete types.
    fn as_any(&self) -> &dyn std::any::Any;
}
