//! Integration tests.
use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use proptest::prelude::*;
use sh_runner::{EntityId, EntityTarget, RunnerFactory, SimResult, System, UpdateContext, WorldRunner};
use sh_scene::{ModelDesc, SceneRoot, WorldDesc};
use sh_server::{RunState, Server, ServerConfig, SignalHandler};

/// Engine that counts steps and sleeps briefly between them.
#[derive(Debug)]
struct FakeRunner {
    name: String,
    models: Vec<String>,
    iterations: AtomicU64,
    running: AtomicBool,
    stop: AtomicBool,
    paused: AtomicBool,
    blocking_paused: AtomicBool,
    systems: Mutex<usize>,
    period: Mutex<Duration>,
}

impl WorldRunner for FakeRunner {
    fn world_name(&self) -> &str {
        &self.name
    }

    fn run(&self, iterations: u64) -> bool {
        if self.stop.load(Ordering::SeqCst) {
            return false;
        }
        self.running.store(true, Ordering::SeqCst);
        let mut attempts = 0;
        while (iterations == 0 || attempts < iterations) && !self.stop.load(Ordering::SeqCst) {
            let blocking_paused = self.blocking_paused.swap(false, Ordering::SeqCst);
            if !blocking_paused && !self.paused.load(Ordering::SeqCst) {
                self.iterations.fetch_add(1, Ordering::SeqCst);
            }
            attempts += 1;
            thread::sleep(Duration::from_millis(1));
        }
        self.running.store(false, Ordering::SeqCst);
        true
    }

    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
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
        self.iterations.load(Ordering::SeqCst)
    }

    fn entity_count(&self) -> usize {
        self.models.len() + 1
    }

    fn system_count(&self) -> usize {
        *self.systems.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn add_system(&self, _system: Box<dyn System>) {
        *self.systems.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn has_entity(&self, name: &str) -> bool {
        self.entity_by_name(name).is_some()
    }

    fn entity_by_name(&self, name: &str) -> Option<EntityId> {
        if name == self.name {
            return Some(EntityId(0));
        }
        let pos = self.models.iter().position(|m| m == name)?;
        Some(EntityId(pos as u64 + 1))
    }

    fn request_remove_entity(&self, target: EntityTarget, _recursive: bool) -> bool {
        match target {
            EntityTarget::Id(id) => (id.0 as usize) < self.entity_count(),
            EntityTarget::Name(name) => self.has_entity(&name),
        }
    }

    fn set_update_period(&self, period: Duration) {
        *self.period.lock().unwrap_or_else(PoisonError::into_inner) = period;
    }

    fn update_period(&self) -> Duration {
        *self.period.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_next_step_as_blocking_paused(&self, value: bool) {
        self.blocking_paused.store(value, Ordering::SeqCst);
    }
}

struct FakeFactory;

impl RunnerFactory for FakeFactory {
    fn create(&self, world: &WorldDesc, _seed: u64) -> Box<dyn WorldRunner> {
        Box::new(FakeRunner {
            name: world.name.clone(),
            models: world.models.iter().map(|m| m.name.clone()).collect(),
            iterations: AtomicU64::new(0),
            running: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            blocking_paused: AtomicBool::new(false),
            systems: Mutex::new(0),
            period: Mutex::new(world.physics.update_period()),
        })
    }
}

#[derive(Debug)]
struct Noop;

impl System for Noop {
    fn name(&self) -> &str {
        "noop"
    }

    fn update(&mut self, _ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn two_worlds() -> SceneRoot {
    let mut root = SceneRoot::new();
    let mut first = WorldDesc::new("first");
    first.add_model(ModelDesc::new("box")).unwrap();
    root.add_world(first);
    root.add_world(WorldDesc::new("second"));
    root
}

fn fake_server(config: ServerConfig) -> Server {
    Server::builder(config).runner_factory(FakeFactory).build()
}

fn wait_for(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn blocking_run_steps_every_world() {
    let server = fake_server(ServerConfig::new().with_scene_root(two_worlds()));
    assert_eq!(server.world_count(), 2);

    assert!(server.run(true, 4, false));
    assert_eq!(server.iteration_count(0), Some(4));
    assert_eq!(server.iteration_count(1), Some(4));
    assert_eq!(server.state(), RunState::Idle);
    assert!(!server.running());
}

#[test]
fn background_run_is_running_when_it_returns() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(false, 0, false));
    assert!(server.running());

    assert!(!server.run(false, 0, false));
    assert!(!server.run(true, 1, false));

    server.stop();
    assert_eq!(server.state(), RunState::Stopped);
    assert!(!server.running());
    wait_for("the world to stop", || server.world_running(0) == Some(false));
}

#[test]
fn single_step_background_runs_are_running_on_return() {
    for attempt in 0..300 {
        let server = fake_server(ServerConfig::new().with_scene_root(two_worlds()));
        assert!(server.run(false, 1, false), "attempt {attempt}");
        assert!(server.running(), "attempt {attempt}");
        assert_eq!(server.state(), RunState::Running);
        server.stop();
    }
}

#[test]
fn finished_background_run_stays_running_until_stopped() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(false, 3, false));
    wait_for("three iterations", || {
        server.iteration_count(0) == Some(3) && server.world_running(0) == Some(false)
    });

    assert!(server.running());
    assert!(!server.run(true, 1, false));
}

#[test]
fn only_one_background_run_per_server() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(false, 1, false));
    wait_for("the world to finish", || server.iteration_count(0) == Some(1));
    assert!(!server.run(false, 1, false));
}

#[test]
fn systems_are_rejected_while_running() {
    let server = fake_server(ServerConfig::new());
    assert_eq!(server.add_system(Box::new(Noop), 0), Some(true));
    assert_eq!(server.add_system(Box::new(Noop), 1), None);
    assert_eq!(server.system_count(0), Some(1));

    assert!(server.run(false, 0, false));
    assert_eq!(server.add_system(Box::new(Noop), 0), Some(false));
    assert_eq!(server.system_count(0), Some(1));

    server.stop();
    assert_eq!(server.add_system(Box::new(Noop), 0), Some(true));
    assert_eq!(server.system_count(0), Some(2));
}

#[test]
fn stop_before_any_run_does_nothing() {
    let server = fake_server(ServerConfig::new());
    server.stop();
    assert_eq!(server.state(), RunState::Idle);
    assert!(server.run(true, 2, false));
    assert_eq!(server.iteration_count(0), Some(2));
}

#[test]
fn stopped_server_never_runs_again() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(true, 1, false));
    server.stop();
    assert!(!server.run(true, 1, false));
    assert!(!server.run(false, 1, false));
    assert!(!server.run_once(false));
    assert_eq!(server.iteration_count(0), Some(1));
}

#[test]
fn paused_run_attempts_steps_without_advancing() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(true, 5, true));
    assert_eq!(server.paused(0), Some(true));
    assert_eq!(server.iteration_count(0), Some(0));
}

#[test]
fn run_once_advances_one_iteration() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run_once(false));
    assert!(server.run_once(true));
    assert!(server.run_once(false));
    assert_eq!(server.iteration_count(0), Some(2));
    assert_eq!(server.state(), RunState::Idle);
}

#[test]
fn update_period_override_applies_to_every_world() {
    let server = fake_server(
        ServerConfig::new()
            .with_scene_root(two_worlds())
            .with_update_period(Duration::from_millis(7)),
    );
    assert_eq!(server.update_period(0), Some(Duration::from_millis(7)));
    assert_eq!(server.update_period(1), Some(Duration::from_millis(7)));

    assert_eq!(server.set_update_period(Duration::ZERO, 1), Some(()));
    assert_eq!(server.update_period(1), Some(Duration::ZERO));
    assert_eq!(server.update_period(0), Some(Duration::from_millis(7)));
}

#[test]
fn per_world_queries_target_the_right_world() {
    let server = fake_server(ServerConfig::new().with_scene_root(two_worlds()));
    assert_eq!(server.world_name(1).as_deref(), Some("second"));
    assert_eq!(server.has_entity("box", 0), Some(true));
    assert_eq!(server.has_entity("box", 1), Some(false));
    assert_eq!(server.entity_by_name("box", 0), Some(Some(EntityId(1))));
    assert_eq!(server.entity_by_name("box", 1), Some(None));
    assert_eq!(server.request_remove_entity("box", true, 0), Some(true));
    assert_eq!(server.request_remove_entity(EntityId(9), false, 0), Some(false));
    assert_eq!(server.entity_count(0), Some(2));

    assert_eq!(server.set_paused(true, 1), Some(()));
    assert_eq!(server.paused(1), Some(true));
    assert_eq!(server.paused(0), Some(false));
}

#[test]
fn failed_server_answers_nothing() {
    let server = fake_server(ServerConfig::new().with_scene_string("model \"m\" {}"));
    assert!(server.init_error().is_some());
    assert!(server.scene().is_none());
    assert_eq!(server.world_count(), 0);

    assert!(!server.run(true, 1, false));
    assert!(!server.run(false, 1, false));
    assert!(!server.run_once(true));
    assert!(!server.running());
    assert_eq!(server.world_running(0), None);
    assert_eq!(server.iteration_count(0), None);
    assert_eq!(server.add_system(Box::new(Noop), 0), None);
    assert_eq!(server.set_paused(true, 0), None);
    server.stop();
}

#[test]
fn uninitialized_signal_handler_refuses_to_run() {
    let server = Server::builder(ServerConfig::new())
        .runner_factory(FakeFactory)
        .signal_handler(SignalHandler::uninitialized())
        .build();
    assert!(server.init_error().is_none());
    assert!(!server.run(true, 1, false));
    assert!(!server.run_once(true));
    assert_eq!(server.iteration_count(0), Some(0));
    assert_eq!(server.state(), RunState::Idle);
}

#[test]
fn signal_stops_a_background_run() {
    let server = fake_server(ServerConfig::new());
    assert!(server.run(false, 0, false));
    server.signal_handler().raise(2);
    assert_eq!(server.state(), RunState::Stopped);
    wait_for("the world to stop", || server.world_running(0) == Some(false));
}

#[test]
fn stop_handle_stops_a_blocking_run_from_another_thread() {
    let server = fake_server(ServerConfig::new());
    let handle = server.stop_handle();
    thread::scope(|s| {
        s.spawn(|| {
            wait_for("the run to start", || server.world_running(0) == Some(true));
            handle.stop();
        });
        assert!(server.run(true, 0, false));
    });
    assert_eq!(server.state(), RunState::Stopped);
}

#[test]
fn dropping_a_running_server_joins_its_thread() {
    let server = fake_server(ServerConfig::new());
    let handle = server.stop_handle();
    assert!(server.run(false, 0, false));
    drop(server);
    assert!(!handle.is_attached());
}

proptest! {
    #[test]
    fn indices_past_the_last_world_are_absent(index in 2usize..10_000) {
        let server = fake_server(ServerConfig::new().with_scene_root(two_worlds()));
        prop_assert_eq!(server.world_name(index), None);
        prop_assert_eq!(server.world_running(index), None);
        prop_assert_eq!(server.paused(index), None);
        prop_assert_eq!(server.iteration_count(index), None);
        prop_assert_eq!(server.entity_count(index), None);
        prop_assert_eq!(server.system_count(index), None);
        prop_assert_eq!(server.has_entity("box", index), None);
        prop_assert_eq!(server.entity_by_name("box", index), None);
        prop_assert_eq!(server.request_remove_entity("box", false, index), None);
        prop_assert_eq!(server.update_period(index), None);
        prop_assert_eq!(server.add_system(Box::new(Noop), index), None);
    }
}
