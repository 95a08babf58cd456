use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use rand::SeedableRng;
use rand::rngs::StdRng;
use sh_scene::WorldDesc;

use crate::clock::StepClock;
use crate::entity::{EntityId, EntityStore};
use crate::registry::SystemRegistry;
use crate::system::{System, UpdateContext, UpdateInfo};

/// Names an entity for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTarget {
    /// By id.
    Id(EntityId),
    /// By exact name (first match).
    Name(String),
}

impl From<EntityId> for EntityTarget {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for EntityTarget {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Everything the server needs from a per-world execution engine.
///
/// All methods take `&self`: a runner is shared between the thread
/// stepping it and the threads querying or stopping it.
pub trait WorldRunner: Send + Sync + fmt::Debug {
    /// Name of the world this runner steps.
    fn world_name(&self) -> &str;

    /// Make up to `iterations` step attempts (`0` = until stopped).
    ///
    /// Returns `false` without stepping if the runner was stopped before the
    /// call or is already running on another thread.
    fn run(&self, iterations: u64) -> bool;

    /// Ask the step loop to exit at the next step boundary. Sticky: later
    /// calls to [`WorldRunner::run`] return `false`.
    fn stop(&self);

    /// Whether a stop was requested, by a caller or by a system.
    fn stop_requested(&self) -> bool;

    /// Whether the step loop is active.
    fn running(&self) -> bool;

    /// Pause or resume stepping. Paused steps run systems but do not
    /// advance time.
    fn set_paused(&self, paused: bool);

    /// Whether the runner is paused.
    fn paused(&self) -> bool;

    /// Completed (non-paused) iterations.
    fn iteration_count(&self) -> u64;

    /// Live entities.
    fn entity_count(&self) -> usize;

    /// Attached systems, including ones not yet configured.
    fn system_count(&self) -> usize;

    /// Attach a system; it is configured at the start of the next run.
    fn add_system(&self, system: Box<dyn System>);

    /// Whether an entity with this exact name exists.
    fn has_entity(&self, name: &str) -> bool;

    /// Id of the first entity with this exact name.
    fn entity_by_name(&self, name: &str) -> Option<EntityId>;

    /// Queue removal for the start of the next step. Returns `true` if the
    /// target currently exists.
    fn request_remove_entity(&self, target: EntityTarget, recursive: bool) -> bool;

    /// Override the wall-clock period between steps (zero = unpaced).
    fn set_update_period(&self, period: Duration);

    /// Wall-clock period between steps.
    fn update_period(&self) -> Duration;

    /// Make the next step a paused step that skips pacing.
    fn set_next_step_as_blocking_paused(&self, value: bool);
}

/// Creates one runner per world.
pub trait RunnerFactory: Send + Sync {
    /// Instantiate a runner for `world`.
    fn create(&self, world: &WorldDesc, seed: u64) -> Box<dyn WorldRunner>;
}

/// Factory for [`SimulationRunner`]s, resolving scene plugins through a
/// [`SystemRegistry`].
#[derive(Debug, Default)]
pub struct DefaultRunnerFactory {
    registry: SystemRegistry,
}

impl DefaultRunnerFactory {
    /// Use a custom registry.
    pub fn new(registry: SystemRegistry) -> Self {
        Self { registry }
    }
}

impl RunnerFactory for DefaultRunnerFactory {
    fn create(&self, world: &WorldDesc, seed: u64) -> Box<dyn WorldRunner> {
        Box::new(SimulationRunner::new(world, seed, &self.registry))
    }
}

struct RunnerState {
    entities: EntityStore,
    clock: StepClock,
    rng: StdRng,
    systems: Vec<Box<dyn System>>,
    pending_systems: Vec<Box<dyn System>>,
    pending_removals: Vec<(EntityId, bool)>,
    update_period: Duration,
}

/// The default execution engine: steps one world's systems in a loop.
///
/// Step bookkeeping lives behind a mutex that is held for one step at a
/// time, never across the pacing sleep, so queries stay responsive while a
/// world runs.
pub struct SimulationRunner {
    name: String,
    state: Mutex<RunnerState>,
    running: AtomicBool,
    stop_requested: AtomicBool,
    paused: AtomicBool,
    blocking_paused: AtomicBool,
}

impl fmt::Debug for SimulationRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationRunner")
            .field("name", &self.name)
            .field("iteration", &self.iteration_count())
            .field("systems", &self.system_count())
            .field("running", &self.running())
            .finish()
    }
}

impl SimulationRunner {
    /// Instantiate `world`. Plugins declared by the world are created from
    /// `registry`; unknown or misconfigured plugins are logged and skipped.
    pub fn new(world: &WorldDesc, seed: u64, registry: &SystemRegistry) -> Self {
        let mut pending_systems = Vec::new();
        for plugin in &world.plugins {
            match registry.create(plugin) {
                Ok(system) => pending_systems.push(system),
                Err(e) => {
                    tracing::error!(world = %world.name, plugin = %plugin.name, error = %e, "skipping plugin");
                }
            }
        }

        let entities = EntityStore::from_world(world);
        tracing::debug!(
            world = %world.name,
            entities = entities.len(),
            systems = pending_systems.len(),
            seed,
            "created runner"
        );

        Self {
            name: world.name.clone(),
            state: Mutex::new(RunnerState {
                entities,
                clock: StepClock::new(world.physics.step_duration()),
                rng: StdRng::seed_from_u64(seed),
                systems: Vec::new(),
                pending_systems,
                pending_removals: Vec::new(),
                update_period: world.physics.update_period(),
            }),
            running: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            blocking_paused: AtomicBool::new(false),
        }
    }

    /// Borrow the first attached system of type `T`.
    pub fn with_system<T: System + 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.lock_state();
        state
            .systems
            .iter()
            .chain(state.pending_systems.iter())
            .find_map(|s| s.as_any().downcast_ref::<T>())
            .map(f)
    }

    /// Simulated time elapsed.
    pub fn sim_time(&self) -> Duration {
        self.lock_state().clock.sim_time()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn configure_pending(&self) {
        let mut guard = self.lock_state();
        let state = &mut *guard;
        if state.pending_systems.is_empty() {
            return;
        }

        let info = UpdateInfo {
            iteration: state.clock.iteration(),
            sim_time: state.clock.sim_time(),
            dt: Duration::ZERO,
            paused: self.paused.load(Ordering::SeqCst),
        };
        let mut ctx = UpdateContext::new(info, &self.name, &state.entities, &mut state.rng);
        for mut system in state.pending_systems.drain(..) {
            if let Err(e) = system.configure(&mut ctx) {
                tracing::error!(world = %self.name, system = system.name(), error = %e, "system configure failed");
            }
            state.systems.push(system);
        }
        if ctx.stop_requested() {
            self.stop_requested.store(true, Ordering::SeqCst);
        }
    }

    /// One step. Returns the pacing period to honor afterwards.
    fn step(&self, paused: bool) -> Duration {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        for (id, recursive) in std::mem::take(&mut state.pending_removals) {
            let removed = state.entities.remove(id, recursive);
            tracing::debug!(world = %self.name, entity = %id, removed = removed.len(), "removed entity");
        }

        let dt = if paused {
            Duration::ZERO
        } else {
            state.clock.advance();
            state.clock.step_size()
        };
        let info = UpdateInfo {
            iteration: state.clock.iteration(),
            sim_time: state.clock.sim_time(),
            dt,
            paused,
        };

        let mut ctx = UpdateContext::new(info, &self.name, &state.entities, &mut state.rng);
        for system in &mut state.systems {
            if let Err(e) = system.update(&mut ctx) {
                tracing::error!(world = %self.name, system = system.name(), error = %e, "system update failed");
            }
        }

        if ctx.stop_requested() {
            tracing::info!(world = %self.name, iteration = info.iteration, "stop requested by system");
            self.stop_requested.store(true, Ordering::SeqCst);
        }
        state.update_period
    }
}

impl WorldRunner for SimulationRunner {
    fn world_name(&self) -> &str {
        &self.name
    }

    fn run(&self, iterations: u64) -> bool {
        if self.stop_requested.load(Ordering::SeqCst) {
            return false;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(world = %self.name, "runner is already running");
            return false;
        }

        self.configure_pending();
        tracing::debug!(world = %self.name, iterations, "step loop started");

        let mut attempts = 0u64;
        while iterations == 0 || attempts < iterations {
            if self.stop_requested.load(Ordering::SeqCst) {
                break;
            }
            let started = Instant::now();
            let blocking_paused = self.blocking_paused.swap(false, Ordering::SeqCst);
            let paused = blocking_paused || self.paused.load(Ordering::SeqCst);

            let period = self.step(paused);
            attempts += 1;

            if blocking_paused {
                continue;
            }
            let elapsed = started.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            } else if paused {
                thread::yield_now();
            }
        }

        self.running.store(false, Ordering::SeqCst);
        tracing::debug!(world = %self.name, attempts, "step loop finished");
        true
    }

    fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn iteration_count(&self) -> u64 {
        self.lock_state().clock.iteration()
    }

    fn entity_count(&self) -> usize {
        self.lock_state().entities.len()
    }

    fn system_count(&self) -> usize {
        let state = self.lock_state();
        state.systems.len() + state.pending_systems.len()
    }

    fn add_system(&self, system: Box<dyn System>) {
        tracing::debug!(world = %self.name, system = system.name(), "system attached");
        self.lock_state().pending_systems.push(system);
    }

    fn has_entity(&self, name: &str) -> bool {
        self.lock_state().entities.by_name(name).is_some()
    }

    fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        self.lock_state().entities.by_name(name)
    }

    fn request_remove_entity(&self, target: EntityTarget, recursive: bool) -> bool {
        let mut state = self.lock_state();
        let id = match target {
            EntityTarget::Id(id) => state.entities.contains(id).then_some(id),
            EntityTarget::Name(name) => state.entities.by_name(&name),
        };
        match id {
            Some(id) => {
                state.pending_removals.push((id, recursive));
                true
            }
            None => false,
        }
    }

    fn set_update_period(&self, period: Duration) {
        self.lock_state().update_period = period;
    }

    fn update_period(&self) -> Duration {
        self.lock_state().update_period
    }

    fn set_next_step_as_blocking_paused(&self, value: bool) {
        self.blocking_paused.store(value, Ordering::SeqCst);
    }
}
