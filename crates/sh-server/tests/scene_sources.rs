//! Integration tests.
use std::any::Any;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use sh_runner::record::RECORD_FILE_NAME;
use sh_runner::{SimResult, System, UpdateContext};
use sh_server::{InitError, MirrorClient, RunState, Server, ServerConfig, StopHandle};
use tempfile::TempDir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

fn unpaced() -> ServerConfig {
    ServerConfig::new().with_update_period(Duration::ZERO)
}

const TWO_WORLDS: &str = "world \"a\" {\n    model \"box\" {\n        link \"body\" {}\n    }\n}\n\nworld \"b\" {}\n";

#[test]
fn bare_model_file_runs_in_the_default_world() {
    let dir = TempDir::new().unwrap();
    let file = write(
        dir.path(),
        "cart.scene",
        "model \"cart\" {\n    link \"chassis\" {}\n    link \"wheel\" {}\n}",
    );

    let server = Server::new(&unpaced().with_scene_file(&file));
    assert!(server.init_error().is_none(), "{:?}", server.init_error());
    assert_eq!(server.world_name(0).as_deref(), Some("default"));
    assert_eq!(server.entity_count(0), Some(4));
    assert_eq!(server.has_entity("wheel", 0), Some(true));
    assert_eq!(server.scene().unwrap().source_path(), Some(file.as_path()));

    assert!(server.run(true, 10, false));
    assert_eq!(server.iteration_count(0), Some(10));
}

#[test]
fn missing_file_disables_the_server() {
    let dir = TempDir::new().unwrap();
    let server = Server::new(
        &unpaced()
            .with_scene_file("nowhere.scene")
            .with_resource_cache(dir.path()),
    );
    assert_eq!(
        server.init_error(),
        Some(&InitError::SourceNotFound("nowhere.scene".into()))
    );
    assert!(!server.run(true, 1, false));
}

#[test]
fn invalid_scene_disables_the_server() {
    let server = Server::new(&unpaced().with_scene_string("world \"w\" {\n    gravity true\n}"));
    match server.init_error() {
        Some(InitError::Scene(messages)) => assert_eq!(messages.len(), 1),
        other => panic!("unexpected init result: {other:?}"),
    }
    assert_eq!(server.world_count(), 0);
}

#[test]
fn world_file_is_fetched_through_the_asset_client() {
    let dir = TempDir::new().unwrap();
    let mirror = dir.path().join("mirror");
    write(&mirror, "assets.example.org/worlds/shapes.scene", "world \"shapes\" {}");
    let cache = dir.path().join("cache");

    let server = Server::builder(
        unpaced()
            .with_scene_file("https://assets.example.org/worlds/shapes.scene")
            .with_resource_cache(&cache),
    )
    .asset_client(MirrorClient::new(&mirror))
    .build();

    assert!(server.init_error().is_none(), "{:?}", server.init_error());
    assert_eq!(server.world_name(0).as_deref(), Some("shapes"));
    assert!(cache.join("assets.example.org/worlds/shapes.scene").exists());
}

#[test]
fn worlds_run_side_by_side() {
    let server = Server::new(&unpaced().with_scene_string(TWO_WORLDS));
    assert_eq!(server.world_count(), 2);
    assert_eq!(server.entity_count(0), Some(3));
    assert_eq!(server.entity_count(1), Some(1));

    assert!(server.run(true, 20, false));
    assert_eq!(server.iteration_count(0), Some(20));
    assert_eq!(server.iteration_count(1), Some(20));
}

#[test]
fn entity_removal_applies_on_the_next_step() {
    let server = Server::new(&unpaced().with_scene_string(TWO_WORLDS));
    assert_eq!(server.request_remove_entity("box", true, 0), Some(true));
    assert_eq!(server.request_remove_entity("box", true, 1), Some(false));
    assert_eq!(server.entity_count(0), Some(3));

    assert!(server.run_once(true));
    assert_eq!(server.entity_count(0), Some(1));
    assert_eq!(server.has_entity("body", 0), Some(false));
    assert_eq!(server.iteration_count(0), Some(0));
}

#[test]
fn recording_writes_one_file_per_world() {
    let dir = TempDir::new().unwrap();
    let server = Server::new(
        &unpaced()
            .with_scene_string(TWO_WORLDS)
            .with_log_record(true)
            .with_log_record_path(dir.path()),
    );
    assert_eq!(server.system_count(0), Some(1));

    assert!(server.run(true, 5, false));

    for world in ["a", "b"] {
        let text = fs::read_to_string(dir.path().join(world).join(RECORD_FILE_NAME)).unwrap();
        assert_eq!(text.lines().count(), 5, "world {world}");
        assert!(text.contains(&format!("\"world\":\"{world}\"")));
    }
}

#[test]
fn recording_a_single_world_uses_the_directory_itself() {
    let dir = TempDir::new().unwrap();
    let server = Server::new(
        &unpaced()
            .with_log_record(true)
            .with_log_record_path(dir.path()),
    );
    assert!(server.run(true, 3, false));
    let text = fs::read_to_string(dir.path().join(RECORD_FILE_NAME)).unwrap();
    assert_eq!(text.lines().count(), 3);
}

/// Asks its world to stop once it reaches an iteration.
#[derive(Debug)]
struct StopAt(u64);

impl System for StopAt {
    fn name(&self) -> &str {
        "stop_at"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        if ctx.info.iteration >= self.0 {
            ctx.request_stop();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Stops the whole server once its world reaches an iteration.
#[derive(Debug)]
struct StopServerAt(u64, StopHandle);

impl System for StopServerAt {
    fn name(&self) -> &str {
        "stop_server_at"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        if ctx.info.iteration >= self.0 {
            self.1.stop();
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn a_system_stopping_its_world_stops_the_server() {
    let server = Server::new(&unpaced());
    assert_eq!(server.add_system(Box::new(StopAt(3)), 0), Some(true));

    assert!(server.run(true, 0, false));
    assert_eq!(server.iteration_count(0), Some(3));
    assert_eq!(server.state(), RunState::Stopped);
    assert!(!server.run(true, 1, false));
}

#[test]
fn a_system_can_stop_every_world() {
    let server = Server::new(&unpaced().with_scene_string(TWO_WORLDS));
    let handle = server.stop_handle();
    assert_eq!(server.add_system(Box::new(StopServerAt(50, handle)), 0), Some(true));

    assert!(server.run(true, 0, false));
    assert_eq!(server.state(), RunState::Stopped);
    assert_eq!(server.iteration_count(0), Some(50));
    assert_eq!(server.world_running(1), Some(false));
}

/// Counts the updates it sees while time is held.
#[derive(Debug)]
struct CountHeld(Arc<AtomicU64>);

impl System for CountHeld {
    fn name(&self) -> &str {
        "count_held"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) -> SimResult<()> {
        if ctx.info.paused {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[test]
fn refused_paused_steps_leave_a_background_run_alone() {
    let server = Server::new(&unpaced());
    let held = Arc::new(AtomicU64::new(0));
    assert_eq!(server.add_system(Box::new(CountHeld(Arc::clone(&held))), 0), Some(true));

    assert!(server.run_once(true));
    assert_eq!(held.load(Ordering::SeqCst), 1);

    assert!(server.run(false, 0, false));
    for _ in 0..500 {
        assert!(!server.run_once(true));
    }
    server.stop();
    assert_eq!(held.load(Ordering::SeqCst), 1);
}

#[test]
fn single_step_background_runs_are_running_on_return() {
    for attempt in 0..200 {
        let server = Server::new(&unpaced());
        assert!(server.run(false, 1, false), "attempt {attempt}");
        assert!(server.running(), "attempt {attempt}");
        server.stop();
        assert_eq!(server.state(), RunState::Stopped);
    }
}
