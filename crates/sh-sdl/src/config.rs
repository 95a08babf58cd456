use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Lookup hook: maps an include target to a local file, or `None` when it
/// cannot be found.
pub type FindHook = Arc<dyn Fn(&str) -> Option<PathBuf> + Send + Sync>;

/// Default bound on nested includes.
pub const DEFAULT_MAX_INCLUDE_DEPTH: usize = 16;

/// Settings for loading scene files.
///
/// The two hooks are where an asset cache plugs into the loader: `find_uri`
/// receives targets that look like URIs (`scheme://...`), `find_file`
/// receives plain paths that were not found relative to the including file.
#[derive(Clone)]
pub struct ParserConfig {
    find_file: Option<FindHook>,
    find_uri: Option<FindHook>,
    max_include_depth: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            find_file: None,
            find_uri: None,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
        }
    }
}

impl ParserConfig {
    /// A configuration with no hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook used for path-style include targets.
    pub fn with_find_file_callback(
        mut self,
        hook: impl Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    ) -> Self {
        self.find_file = Some(Arc::new(hook));
        self
    }

    /// Set the hook used for URI include targets.
    pub fn with_find_uri_callback(
        mut self,
        hook: impl Fn(&str) -> Option<PathBuf> + Send + Sync + 'static,
    ) -> Self {
        self.find_uri = Some(Arc::new(hook));
        self
    }

    /// Bound the include nesting depth.
    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Maximum include nesting depth.
    pub fn max_include_depth(&self) -> usize {
        self.max_include_depth
    }

    /// Run the path hook, if one is set.
    pub fn find_file(&self, target: &str) -> Option<PathBuf> {
        self.find_file.as_ref().and_then(|hook| hook(target))
    }

    /// Run the URI hook, if one is set.
    pub fn find_uri(&self, target: &str) -> Option<PathBuf> {
        self.find_uri.as_ref().and_then(|hook| hook(target))
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("find_file", &self.find_file.is_some())
            .field("find_uri", &self.find_uri.is_some())
            .field("max_include_depth", &self.max_include_depth)
            .finish()
    }
}
