use std::fs;
use std::path::{Path, PathBuf};

use sh_scene::SceneRoot;
use sh_sdl::LoadResult;

use crate::assets::AssetBridge;
use crate::config::{ServerConfig, SourceType};
use crate::error::InitError;

/// The world used when no source is configured and as the container for
/// files that hold only a model: one empty world named `default` with the
/// default physics (1 ms steps at real time).
pub const DEFAULT_WORLD: &str = "world \"default\" {}\n";

/// Turns the configured source into one validated scene.
#[derive(Debug)]
pub struct SceneResolver<'a> {
    config: &'a ServerConfig,
    bridge: &'a AssetBridge,
}

impl<'a> SceneResolver<'a> {
    /// Resolver for `config`, looking up assets through `bridge`.
    pub fn new(config: &'a ServerConfig, bridge: &'a AssetBridge) -> Self {
        Self { config, bridge }
    }

    /// Produce the scene, or every reason it could not be produced.
    ///
    /// A file holding only a model is placed in the default world. Inline
    /// text gets no such treatment: it must declare a world itself.
    pub fn resolve(&self) -> Result<SceneRoot, InitError> {
        let root = match self.config.source() {
            SourceType::SceneRoot(root) => {
                tracing::info!("loading scene from a parsed root");
                graph_or_errors(root.clone())?
            }
            SourceType::SceneString { text, path } => {
                match path {
                    Some(path) => tracing::info!(path = %path.display(), "loading scene string"),
                    None => tracing::info!("loading scene string, file path not available"),
                }
                let result =
                    sh_sdl::load_source_at(text, path.as_deref(), &self.bridge.parser_config());
                scene_or_errors(result)?
            }
            SourceType::SceneFile(file) => self.load_world_file(file)?,
            SourceType::None => {
                tracing::info!("loading default world");
                default_world()?
            }
        };

        if root.world_count() == 0 {
            return Err(InitError::NoWorlds);
        }
        Ok(root)
    }

    fn load_world_file(&self, file: &Path) -> Result<SceneRoot, InitError> {
        let path = self
            .locate_world_file(file)
            .ok_or_else(|| InitError::SourceNotFound(file.display().to_string()))?;
        tracing::info!(path = %path.display(), "loading world file");

        let result = sh_sdl::load_file(&path, &self.bridge.parser_config());
        let mut loaded = scene_or_errors(result)?;

        let Some(model) = loaded.take_model() else {
            return Ok(loaded);
        };

        tracing::info!(model = %model.name, "file holds a bare model; placing it in the default world");
        let mut root = default_world()?;
        let Some(world) = root.world_by_index_mut(0) else {
            return Err(InitError::Composition(
                "the default world is missing after synthesis".into(),
            ));
        };
        world
            .add_model(model)
            .map_err(|e| InitError::Composition(e.to_string()))?;

        let mut root = graph_or_errors(root)?;
        root.set_source_path(path);
        Ok(root)
    }

    /// Find a world file: as given, then through the asset bridge for URIs,
    /// then in each resource directory, then in the cache directory.
    /// A directory stands for the first scene file inside it.
    pub fn locate_world_file(&self, file: &Path) -> Option<PathBuf> {
        let found = self.locate(file)?;
        if found.is_dir() {
            return first_scene_file(&found);
        }
        Some(found)
    }

    fn locate(&self, file: &Path) -> Option<PathBuf> {
        if file.exists() {
            return Some(file.to_path_buf());
        }

        let text = file.to_string_lossy();
        if text.contains("://") {
            return self.bridge.fetch_resource_uri(&text);
        }

        self.bridge
            .resource_paths()
            .iter()
            .map(|dir| dir.join(file))
            .chain(std::iter::once(self.bridge.cache_dir().join(file)))
            .find(|candidate| candidate.exists())
    }
}

fn first_scene_file(dir: &Path) -> Option<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == sh_sdl::FILE_EXTENSION))
        .collect();
    files.sort();
    files.into_iter().next()
}

fn default_world() -> Result<SceneRoot, InitError> {
    scene_or_errors(sh_sdl::load_source(DEFAULT_WORLD))
}

/// Re-check a graph built outside the parser.
fn graph_or_errors(root: SceneRoot) -> Result<SceneRoot, InitError> {
    let errors = root.update_graphs();
    if !errors.is_empty() {
        return Err(InitError::Scene(errors.iter().map(ToString::to_string).collect()));
    }
    Ok(root)
}

fn scene_or_errors(result: LoadResult) -> Result<SceneRoot, InitError> {
    for warning in result.diagnostics.iter().filter(|d| !d.is_error()) {
        tracing::warn!("{}", warning.located_message());
    }
    if result.has_errors() {
        return Err(InitError::Scene(result.error_messages()));
    }
    Ok(result.root)
}
