use miette::Diagnostic;

/// Why a server could not be initialized. Any of these leaves the server
/// permanently non-runnable.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Diagnostic)]
pub enum InitError {
    /// The configured scene file could not be located.
    #[error("failed to find world [{0}]")]
    #[diagnostic(
        code(simhost::init::source_not_found),
        help("check the path, the resource paths, or the asset cache")
    )]
    SourceNotFound(String),

    /// The scene source was found but failed to load or validate.
    #[error("the scene failed to load: {}", .0.join("; "))]
    #[diagnostic(code(simhost::init::scene))]
    Scene(Vec<String>),

    /// The scene loaded but contains no world.
    #[error("the scene does not contain a world")]
    #[diagnostic(
        code(simhost::init::no_worlds),
        help("inline scene text must declare at least one `world` block")
    )]
    NoWorlds,

    /// Wrapping a bare model in the default world failed.
    #[error("could not place the model in the default world: {0}")]
    #[diagnostic(code(simhost::init::composition))]
    Composition(String),
}

/// Why an asset could not be fetched.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The client has no remote access.
    #[error("offline: cannot fetch {0}")]
    Offline(String),

    /// The reference is not a `scheme://host/path` URI.
    #[error("unsupported asset reference: {0}")]
    UnsupportedUri(String),

    /// The asset does not exist at the source.
    #[error("asset not found: {0}")]
    NotFound(String),

    /// Copying into the cache failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
