use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sh_sdl::ParserConfig;

use crate::error::FetchError;

/// Downloads assets into the local cache.
pub trait AssetClient: Send + Sync + fmt::Debug {
    /// Fetch `uri` into `cache_dir` and return the local path.
    fn fetch(&self, uri: &str, cache_dir: &Path) -> Result<PathBuf, FetchError>;
}

/// A client without network access: every fetch fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineClient;

impl AssetClient for OfflineClient {
    fn fetch(&self, uri: &str, _cache_dir: &Path) -> Result<PathBuf, FetchError> {
        Err(FetchError::Offline(uri.to_string()))
    }
}

/// Serves `scheme://host/path` from `<root>/host/path`, copying into the
/// cache the way a remote fetch would.
#[derive(Debug, Clone)]
pub struct MirrorClient {
    root: PathBuf,
}

impl MirrorClient {
    /// Mirror rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetClient for MirrorClient {
    fn fetch(&self, uri: &str, cache_dir: &Path) -> Result<PathBuf, FetchError> {
        let (_, host, path) =
            split_uri(uri).ok_or_else(|| FetchError::UnsupportedUri(uri.to_string()))?;
        let source = self.root.join(host).join(path);
        if !source.exists() {
            return Err(FetchError::NotFound(uri.to_string()));
        }
        let dest = cache_dir.join(host).join(path);
        copy_tree(&source, &dest)?;
        Ok(dest)
    }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        fs::create_dir_all(to)?;
        for entry in fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(from, to)?;
    }
    Ok(())
}

/// Split `scheme://host/path`. Rejects empty hosts and `..` segments so a
/// URI can never address anything outside the cache.
pub(crate) fn split_uri(uri: &str) -> Option<(&str, &str, &str)> {
    let (scheme, rest) = uri.split_once("://")?;
    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let path = path.trim_end_matches('/');
    if scheme.is_empty() || host.is_empty() || host == ".." || path.split('/').any(|s| s == "..") {
        return None;
    }
    Some((scheme, host, path))
}

/// Resolves asset references found while loading scenes.
///
/// Both lookup hooks handed to the scene loader end up in
/// [`AssetBridge::resolve`]: resource directories and the cache are checked
/// first, then the client is asked to fetch. Failures come back as `None` so
/// the loader reports its usual "unable to find" error.
///
/// Fetching is synchronous and may block for as long as the client takes.
#[derive(Debug, Clone)]
pub struct AssetBridge {
    cache_dir: PathBuf,
    resource_paths: Vec<PathBuf>,
    client: Arc<dyn AssetClient>,
}

impl AssetBridge {
    /// Bridge over `client`, caching into `cache_dir`.
    pub fn new(
        cache_dir: impl Into<PathBuf>,
        resource_paths: Vec<PathBuf>,
        client: Arc<dyn AssetClient>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            resource_paths,
            client,
        }
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Directories searched before the cache.
    pub fn resource_paths(&self) -> &[PathBuf] {
        &self.resource_paths
    }

    /// Where a fetched URI lives in the cache: `<cache>/<host>/<path>`.
    pub fn cache_path(&self, uri: &str) -> Option<PathBuf> {
        let (_, host, path) = split_uri(uri)?;
        Some(self.cache_dir.join(host).join(path))
    }

    /// Hook for path-style references.
    pub fn fetch_resource(&self, path: &str) -> Option<PathBuf> {
        let _span = tracing::debug_span!("fetch_resource", path).entered();
        self.resolve(path)
    }

    /// Hook for URI references.
    pub fn fetch_resource_uri(&self, uri: &str) -> Option<PathBuf> {
        let _span = tracing::debug_span!("fetch_resource_uri", uri).entered();
        self.resolve(uri)
    }

    /// Local lookup first, then the client.
    pub fn resolve(&self, reference: &str) -> Option<PathBuf> {
        if let Some(local) = self.find_local(reference) {
            tracing::debug!(path = %local.display(), "asset found locally");
            return Some(local);
        }
        match self.client.fetch(reference, &self.cache_dir) {
            Ok(path) => {
                tracing::info!(reference, path = %path.display(), "fetched asset");
                Some(path)
            }
            Err(e) => {
                tracing::debug!(reference, error = %e, "asset fetch failed");
                None
            }
        }
    }

    fn find_local(&self, reference: &str) -> Option<PathBuf> {
        let candidates: Vec<PathBuf> = if let Some(rest) = reference.strip_prefix("model://") {
            self.resource_paths
                .iter()
                .chain(std::iter::once(&self.cache_dir))
                .map(|dir| dir.join(rest))
                .collect()
        } else if reference.contains("://") {
            self.cache_path(reference).into_iter().collect()
        } else {
            self.resource_paths
                .iter()
                .chain(std::iter::once(&self.cache_dir))
                .map(|dir| dir.join(reference))
                .collect()
        };
        candidates.into_iter().find(|p| p.exists())
    }

    /// Scene loader settings with both hooks routed through this bridge.
    pub fn parser_config(&self) -> ParserConfig {
        let for_files = self.clone();
        let for_uris = self.clone();
        ParserConfig::new()
            .with_find_file_callback(move |path| for_files.fetch_resource(path))
            .with_find_uri_callback(move |uri| for_uris.fetch_resource_uri(uri))
    }
}
