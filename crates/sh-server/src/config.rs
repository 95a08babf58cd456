use std::path::{Path, PathBuf};
use std::time::Duration;

use sh_scene::SceneRoot;

/// Environment variable holding extra resource directories, separated the
/// way the platform separates `PATH` entries.
pub const RESOURCE_PATH_ENV: &str = "SIMHOST_RESOURCE_PATH";

/// Where the scene comes from.
#[derive(Debug, Clone, Default)]
pub enum SourceType {
    /// An already parsed scene, deep-copied at construction.
    SceneRoot(SceneRoot),
    /// Scene text. `path` only anchors relative includes.
    SceneString {
        /// Scene source text.
        text: String,
        /// File the text came from, if any.
        path: Option<PathBuf>,
    },
    /// A scene file or asset URI.
    SceneFile(PathBuf),
    /// Nothing configured: the default world is used.
    #[default]
    None,
}

/// Server configuration, captured once when the server is built.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    source: SourceType,
    resource_cache: Option<PathBuf>,
    update_period: Option<Duration>,
    use_log_record: bool,
    log_record_path: Option<PathBuf>,
    resource_paths: Vec<PathBuf>,
    seed: u64,
}

impl ServerConfig {
    /// Default configuration: default world, no recording.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already parsed scene.
    pub fn with_scene_root(mut self, root: SceneRoot) -> Self {
        self.source = SourceType::SceneRoot(root);
        self
    }

    /// Use inline scene text.
    pub fn with_scene_string(mut self, text: impl Into<String>) -> Self {
        self.source = SourceType::SceneString {
            text: text.into(),
            path: None,
        };
        self
    }

    /// Use inline scene text that was read from `path`.
    pub fn with_scene_string_at(mut self, text: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.source = SourceType::SceneString {
            text: text.into(),
            path: Some(path.into()),
        };
        self
    }

    /// Load the scene from a file or URI.
    pub fn with_scene_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = SourceType::SceneFile(path.into());
        self
    }

    /// Directory used to cache fetched assets.
    pub fn with_resource_cache(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_cache = Some(dir.into());
        self
    }

    /// Wall-clock period between steps, applied to every world.
    pub fn with_update_period(mut self, period: Duration) -> Self {
        self.update_period = Some(period);
        self
    }

    /// Attach the `record` system to every world.
    pub fn with_log_record(mut self, enabled: bool) -> Self {
        self.use_log_record = enabled;
        self
    }

    /// Directory the `record` system writes into.
    pub fn with_log_record_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_record_path = Some(dir.into());
        self
    }

    /// Add a directory searched for scene files and `model://` assets.
    pub fn with_resource_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.resource_paths.push(dir.into());
        self
    }

    /// Seed for the per-world RNGs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Configured scene source.
    pub fn source(&self) -> &SourceType {
        &self.source
    }

    /// Explicitly configured cache directory.
    pub fn resource_cache(&self) -> Option<&Path> {
        self.resource_cache.as_deref()
    }

    /// Cache directory in effect: the configured one, else
    /// `~/.simhost/fuel`, else `<tmp>/simhost/fuel`.
    pub fn cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.resource_cache {
            return dir.clone();
        }
        match std::env::var_os("HOME") {
            Some(home) if !home.is_empty() => PathBuf::from(home).join(".simhost").join("fuel"),
            _ => std::env::temp_dir().join("simhost").join("fuel"),
        }
    }

    /// Configured step period override.
    pub fn update_period(&self) -> Option<Duration> {
        self.update_period
    }

    /// Whether the `record` system is attached to every world.
    pub fn use_log_record(&self) -> bool {
        self.use_log_record
    }

    /// Record directory in effect: the configured one, else a fresh
    /// timestamped directory under `<tmp>/simhost/log`.
    pub fn log_record_path(&self) -> PathBuf {
        match &self.log_record_path {
            Some(dir) => dir.clone(),
            None => {
                let stamp = chrono::Local::now().format("%Y-%m-%dT%H-%M-%S%.3f");
                std::env::temp_dir()
                    .join("simhost")
                    .join("log")
                    .join(stamp.to_string())
            }
        }
    }

    /// Resource directories: configured ones first, then those from
    /// [`RESOURCE_PATH_ENV`].
    pub fn resource_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.resource_paths.clone();
        if let Some(env) = std::env::var_os(RESOURCE_PATH_ENV) {
            paths.extend(std::env::split_paths(&env).filter(|p| !p.as_os_str().is_empty()));
        }
        paths
    }

    /// RNG seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}
