use std::fmt;
use std::path::Path;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sh_runner::record::RecordSystem;
use sh_runner::{DefaultRunnerFactory, EntityId, EntityTarget, RunnerFactory, System, WorldRunner};
use sh_scene::{ParamValue, PluginDesc, SceneRoot};

use crate::assets::{AssetBridge, AssetClient, OfflineClient};
use crate::config::ServerConfig;
use crate::error::InitError;
use crate::lifecycle::{Lifecycle, RunState};
use crate::resolver::SceneResolver;
use crate::signal::SignalHandler;

/// State shared with the background run thread and with stop handles.
struct Shared {
    lifecycle: Mutex<Lifecycle>,
    started: Condvar,
    runners: Vec<Box<dyn WorldRunner>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_paused_all(&self, paused: bool) {
        for runner in &self.runners {
            runner.set_paused(paused);
        }
    }

    /// Step every world; worlds beyond the first get their own scoped thread.
    /// Returns whether any world actually stepped.
    fn step_all(&self, iterations: u64) -> bool {
        match self.runners.as_slice() {
            [runner] => runner.run(iterations),
            runners => thread::scope(|s| {
                let handles: Vec<_> = runners
                    .iter()
                    .map(|runner| s.spawn(move || runner.run(iterations)))
                    .collect();
                handles
                    .into_iter()
                    .fold(false, |stepped, handle| match handle.join() {
                        Ok(ran) => stepped | ran,
                        Err(panic) => std::panic::resume_unwind(panic),
                    })
            }),
        }
    }

    fn any_stop_requested(&self) -> bool {
        self.runners.iter().any(|r| r.stop_requested())
    }

    fn stop(&self) {
        if !self.lock().stop() {
            tracing::debug!("stop ignored: the server never ran");
            return;
        }
        for runner in &self.runners {
            runner.stop();
        }
        tracing::info!("server stopped");
    }

    fn run_background_loop(&self, iterations: u64) {
        self.lock().mark_background_running();
        self.started.notify_all();

        tracing::debug!(iterations, "background run started");
        if !self.step_all(iterations) {
            tracing::warn!("background run ended without stepping any world");
        }
        if self.any_stop_requested() {
            self.lock().stop();
        }
        tracing::debug!("background run finished");
    }
}

/// Cloneable handle that stops a server from any thread, including from a
/// system running inside one of its worlds.
///
/// The handle does not keep the server alive; stopping a dropped server does
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    shared: Weak<Shared>,
}

impl StopHandle {
    /// Stop the server. Same semantics as [`Server::stop`].
    pub fn stop(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.stop();
        }
    }

    /// Whether the server still exists.
    pub fn is_attached(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

/// Builds a [`Server`] with non-default collaborators.
pub struct ServerBuilder {
    config: ServerConfig,
    factory: Box<dyn RunnerFactory>,
    client: Arc<dyn AssetClient>,
    signals: SignalHandler,
}

impl ServerBuilder {
    /// Builder with the simulation runner, an offline asset client and a
    /// working signal handler.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            factory: Box::new(DefaultRunnerFactory::default()),
            client: Arc::new(OfflineClient),
            signals: SignalHandler::new(),
        }
    }

    /// Engine used for every world.
    pub fn runner_factory(mut self, factory: impl RunnerFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Client used when an asset is not cached.
    pub fn asset_client(mut self, client: impl AssetClient + 'static) -> Self {
        self.client = Arc::new(client);
        self
    }

    /// Signal dispatcher; the server registers a stop callback on it.
    pub fn signal_handler(mut self, signals: SignalHandler) -> Self {
        self.signals = signals;
        self
    }

    /// Resolve the scene and create one runner per world.
    ///
    /// Never fails: a server whose scene could not be resolved is returned
    /// in a permanently non-runnable state, with the reason available from
    /// [`Server::init_error`].
    pub fn build(self) -> Server {
        let bridge = AssetBridge::new(
            self.config.cache_dir(),
            self.config.resource_paths(),
            self.client,
        );

        let mut scene = match SceneResolver::new(&self.config, &bridge).resolve() {
            Ok(scene) => scene,
            Err(e) => {
                log_init_error(&e);
                return Server {
                    shared: None,
                    scene: None,
                    init_error: Some(e),
                    signals: self.signals,
                    run_thread: Mutex::new(None),
                };
            }
        };

        if self.config.use_log_record() {
            attach_record_plugin(&mut scene, &self.config.log_record_path());
        }

        let runners: Vec<Box<dyn WorldRunner>> = scene
            .worlds()
            .iter()
            .map(|world| self.factory.create(world, self.config.seed()))
            .collect();

        // Overrides whatever period the scene's physics implied.
        if let Some(period) = self.config.update_period() {
            for runner in &runners {
                runner.set_update_period(period);
            }
        }

        let shared = Arc::new(Shared {
            lifecycle: Mutex::new(Lifecycle::default()),
            started: Condvar::new(),
            runners,
        });

        let handle = StopHandle {
            shared: Arc::downgrade(&shared),
        };
        self.signals.add_callback(move |_| handle.stop());

        tracing::info!(
            worlds = scene.world_count(),
            seed = self.config.seed(),
            "server initialized"
        );

        Server {
            shared: Some(shared),
            scene: Some(scene),
            init_error: None,
            signals: self.signals,
            run_thread: Mutex::new(None),
        }
    }
}

fn log_init_error(error: &InitError) {
    match error {
        InitError::Scene(messages) => {
            for message in messages {
                tracing::error!("{message}");
            }
        }
        other => tracing::error!("{other}"),
    }
}

/// Add a `record` plugin to every world that does not declare one. With
/// several worlds each records into its own subdirectory.
fn attach_record_plugin(scene: &mut SceneRoot, dir: &Path) {
    let per_world = scene.world_count() > 1;
    for world in scene.worlds_mut() {
        if world.has_plugin(RecordSystem::PLUGIN_NAME) {
            continue;
        }
        let path = if per_world {
            dir.join(&world.name)
        } else {
            dir.to_path_buf()
        };
        world.add_plugin(
            PluginDesc::new(RecordSystem::PLUGIN_NAME)
                .with_param("path", ParamValue::String(path.display().to_string())),
        );
    }
}

/// The simulation host: resolves a scene, owns one runner per world, and
/// controls when they run.
///
/// Worlds are addressed by index, in scene order. Every per-world method
/// returns `None` for an index without a world, and for every index when
/// initialization failed.
pub struct Server {
    shared: Option<Arc<Shared>>,
    scene: Option<SceneRoot>,
    init_error: Option<InitError>,
    signals: SignalHandler,
    run_thread: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("state", &self.state())
            .field("worlds", &self.world_count())
            .field("init_error", &self.init_error)
            .finish()
    }
}

impl Server {
    /// Build a server with the default collaborators.
    pub fn new(config: &ServerConfig) -> Self {
        ServerBuilder::new(config.clone()).build()
    }

    /// Start building a server.
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Run every world.
    ///
    /// `iterations` bounds the step attempts per world (`0` = until
    /// stopped); `paused` is applied to every world first. A blocking run
    /// returns when the worlds finish. A non-blocking run returns once the
    /// background thread has marked the server running; the server then
    /// stays running until [`Server::stop`].
    ///
    /// Returns `false` if initialization failed, signal handling is not
    /// set up, the server is running, was stopped, or already used its one
    /// background run. A blocking run also returns `false` when no world
    /// stepped at all, which happens when a stop lands between the run
    /// being accepted and the worlds starting.
    pub fn run(&self, blocking: bool, iterations: u64, paused: bool) -> bool {
        let Some(shared) = self.runnable() else {
            return false;
        };
        if blocking {
            Self::run_blocking(shared, iterations, paused, false)
        } else {
            self.run_background(shared, iterations, paused)
        }
    }

    fn runnable(&self) -> Option<&Arc<Shared>> {
        let Some(shared) = &self.shared else {
            tracing::warn!("the server is not initialized and won't run");
            return None;
        };
        if !self.signals.initialized() {
            tracing::error!("signal handlers were not created; the server won't run");
            return None;
        }
        Some(shared)
    }

    /// `hold_first_step` marks each world's first step as blocking-paused,
    /// only after the lifecycle has accepted the run.
    fn run_blocking(shared: &Shared, iterations: u64, paused: bool, hold_first_step: bool) -> bool {
        if let Err(reason) = shared.lock().begin_blocking() {
            tracing::warn!(%reason, "run rejected");
            return false;
        }
        shared.set_paused_all(paused);
        if hold_first_step {
            for runner in &shared.runners {
                runner.set_next_step_as_blocking_paused(true);
            }
        }

        tracing::info!(iterations, paused, worlds = shared.runners.len(), "running");
        let stepped = shared.step_all(iterations);
        if !stepped {
            tracing::warn!("no world stepped; every runner was already stopped");
        }

        let stop_requested = shared.any_stop_requested();
        shared.lock().end_blocking(stop_requested);
        stepped
    }

    fn run_background(&self, shared: &Arc<Shared>, iterations: u64, paused: bool) -> bool {
        if let Err(reason) = shared.lock().begin_background() {
            tracing::warn!(%reason, "run rejected");
            return false;
        }
        shared.set_paused_all(paused);

        let worker = Arc::clone(shared);
        let spawned = thread::Builder::new()
            .name("simhost-run".into())
            .spawn(move || worker.run_background_loop(iterations));
        match spawned {
            Ok(handle) => {
                *self
                    .run_thread
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(handle);
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn the run thread");
                shared.lock().abort_launch();
                return false;
            }
        }

        // Wait until the thread has marked the server running, so a caller
        // checking `running()` right after this returns sees `true`.
        let mut lifecycle = shared.lock();
        while lifecycle.launching() {
            lifecycle = shared
                .started
                .wait(lifecycle)
                .unwrap_or_else(PoisonError::into_inner);
        }

        tracing::info!(iterations, paused, worlds = shared.runners.len(), "running in background");
        true
    }

    /// One blocking step of every world. With `paused`, the step is a
    /// blocking-paused step: systems run but time does not advance.
    pub fn run_once(&self, paused: bool) -> bool {
        let Some(shared) = self.runnable() else {
            return false;
        };
        Self::run_blocking(shared, 1, paused, paused)
    }

    /// Stop every world. Does nothing if the server never ran; otherwise
    /// the server can never run again. Does not wait for a blocking run on
    /// another thread to return.
    pub fn stop(&self) {
        if let Some(shared) = &self.shared {
            shared.stop();
        }
    }

    /// Handle that calls [`Server::stop`] from anywhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            shared: self.shared.as_ref().map(Arc::downgrade).unwrap_or_default(),
        }
    }

    /// Whether the server is running.
    pub fn running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Current run state. A server that failed to initialize stays `Idle`.
    pub fn state(&self) -> RunState {
        self.shared
            .as_ref()
            .map_or(RunState::Idle, |s| s.lock().state())
    }

    /// Why initialization failed, if it did.
    pub fn init_error(&self) -> Option<&InitError> {
        self.init_error.as_ref()
    }

    /// The resolved scene.
    pub fn scene(&self) -> Option<&SceneRoot> {
        self.scene.as_ref()
    }

    /// The signal dispatcher this server listens on.
    pub fn signal_handler(&self) -> &SignalHandler {
        &self.signals
    }

    /// Number of worlds; zero when initialization failed.
    pub fn world_count(&self) -> usize {
        self.shared.as_ref().map_or(0, |s| s.runners.len())
    }

    fn runner(&self, index: usize) -> Option<&dyn WorldRunner> {
        self.shared
            .as_ref()?
            .runners
            .get(index)
            .map(|r| r.as_ref())
    }

    // -- Per-world operations --

    /// Name of a world.
    pub fn world_name(&self, index: usize) -> Option<String> {
        self.runner(index).map(|r| r.world_name().to_string())
    }

    /// Whether a world's step loop is active.
    pub fn world_running(&self, index: usize) -> Option<bool> {
        self.runner(index).map(|r| r.running())
    }

    /// Pause or resume a world.
    pub fn set_paused(&self, paused: bool, index: usize) -> Option<()> {
        self.runner(index).map(|r| r.set_paused(paused))
    }

    /// Whether a world is paused.
    pub fn paused(&self, index: usize) -> Option<bool> {
        self.runner(index).map(|r| r.paused())
    }

    /// Completed iterations of a world.
    pub fn iteration_count(&self, index: usize) -> Option<u64> {
        self.runner(index).map(|r| r.iteration_count())
    }

    /// Live entities in a world.
    pub fn entity_count(&self, index: usize) -> Option<usize> {
        self.runner(index).map(|r| r.entity_count())
    }

    /// Systems attached to a world.
    pub fn system_count(&self, index: usize) -> Option<usize> {
        self.runner(index).map(|r| r.system_count())
    }

    /// Attach a system to a world.
    ///
    /// `Some(false)` means the server is running and the system was not
    /// attached; retry after [`Server::stop`]. `None` means no such world.
    pub fn add_system(&self, system: Box<dyn System>, index: usize) -> Option<bool> {
        let shared = self.shared.as_ref()?;
        // Held while attaching so a concurrent run cannot start halfway.
        let lifecycle = shared.lock();
        if !lifecycle.accepts_mutation() {
            tracing::error!(system = system.name(), "cannot add a system while the server is running");
            return Some(false);
        }
        let runner = shared.runners.get(index)?;
        runner.add_system(system);
        Some(true)
    }

    /// Whether a world has an entity with this exact name.
    pub fn has_entity(&self, name: &str, index: usize) -> Option<bool> {
        self.runner(index).map(|r| r.has_entity(name))
    }

    /// Id of the first entity with this name. The outer `None` means no
    /// such world, the inner one no such entity.
    pub fn entity_by_name(&self, name: &str, index: usize) -> Option<Option<EntityId>> {
        self.runner(index).map(|r| r.entity_by_name(name))
    }

    /// Queue removal of an entity (by id or name) in a world.
    pub fn request_remove_entity(
        &self,
        target: impl Into<EntityTarget>,
        recursive: bool,
        index: usize,
    ) -> Option<bool> {
        let target = target.into();
        self.runner(index)
            .map(|r| r.request_remove_entity(target, recursive))
    }

    /// Override the wall-clock period between a world's steps.
    pub fn set_update_period(&self, period: Duration, index: usize) -> Option<()> {
        self.runner(index).map(|r| r.set_update_period(period))
    }

    /// Wall-clock period between a world's steps.
    pub fn update_period(&self, index: usize) -> Option<Duration> {
        self.runner(index).map(|r| r.update_period())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.stop();
        let handle = self
            .run_thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            tracing::error!("the run thread panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unpaced(config: ServerConfig) -> Server {
        Server::new(&config.with_update_period(Duration::ZERO))
    }

    #[test]
    fn default_server_has_one_world() {
        let server = unpaced(ServerConfig::new());
        assert!(server.init_error().is_none());
        assert_eq!(server.world_count(), 1);
        assert_eq!(server.world_name(0).as_deref(), Some("default"));
        assert_eq!(server.entity_count(0), Some(1));
        assert_eq!(server.update_period(0), Some(Duration::ZERO));
        assert_eq!(server.state(), RunState::Idle);
    }

    #[test]
    fn blocking_run_counts_iterations() {
        let server = unpaced(ServerConfig::new());
        assert!(server.run(true, 25, false));
        assert_eq!(server.iteration_count(0), Some(25));
        assert_eq!(server.state(), RunState::Idle);
        assert!(server.run(true, 5, false));
        assert_eq!(server.iteration_count(0), Some(30));
    }

    #[test]
    fn run_once_paused_does_not_advance() {
        let server = unpaced(ServerConfig::new());
        assert!(server.run_once(true));
        assert_eq!(server.iteration_count(0), Some(0));
        assert_eq!(server.paused(0), Some(true));

        assert!(server.set_paused(false, 0).is_some());
        assert!(server.run_once(false));
        assert_eq!(server.iteration_count(0), Some(1));
    }

    #[test]
    fn update_period_comes_from_physics_without_override() {
        let server = Server::new(&ServerConfig::new().with_scene_string(
            "world \"w\" {\n    physics {\n        step_size 0.25\n        real_time_factor 0.5\n    }\n}",
        ));
        assert_eq!(server.update_period(0), Some(Duration::from_millis(500)));
    }

    #[test]
    fn unrepresentable_update_period_disables_the_server() {
        let server = Server::new(&ServerConfig::new().with_scene_string(
            "world \"w\" {\n    physics {\n        step_size 0.001\n        real_time_factor 1e-30\n    }\n}",
        ));
        assert!(matches!(server.init_error(), Some(InitError::Scene(_))));
        assert_eq!(server.world_count(), 0);
        assert!(!server.run(true, 1, false));
    }

    #[test]
    fn blocking_run_reports_when_no_world_stepped() {
        let server = unpaced(ServerConfig::new());
        let shared = server.shared.as_ref().unwrap();
        shared.runners[0].stop();

        assert!(!server.run(true, 1, false));
        assert_eq!(server.iteration_count(0), Some(0));
        assert_eq!(server.state(), RunState::Stopped);
    }

    #[test]
    fn record_plugin_is_attached_per_world() {
        let mut scene = SceneRoot::new();
        scene.add_world(sh_scene::WorldDesc::new("a"));
        scene.add_world(sh_scene::WorldDesc::new("b"));
        attach_record_plugin(&mut scene, Path::new("/rec"));
        let params = &scene.worlds()[1].plugins[0].params;
        assert_eq!(
            params.get("path"),
            Some(&ParamValue::String("/rec/b".into()))
        );
    }

    #[test]
    fn declared_record_plugin_is_not_duplicated() {
        let mut scene = SceneRoot::new();
        let mut world = sh_scene::WorldDesc::new("a");
        world.add_plugin(PluginDesc::new("record"));
        scene.add_world(world);
        attach_record_plugin(&mut scene, Path::new("/rec"));
        assert_eq!(scene.worlds()[0].plugins.len(), 1);
    }

    #[test]
    fn stop_handle_of_failed_server_is_detached() {
        let server = Server::new(&ServerConfig::new().with_scene_string("model \"m\" {}"));
        assert_eq!(server.init_error(), Some(&InitError::NoWorlds));
        let handle = server.stop_handle();
        assert!(!handle.is_attached());
        handle.stop();
    }
}
