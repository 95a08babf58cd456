/// Alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

/// Errors raised by systems and the step loop.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// No plugin constructor is registered under this name.
    #[error("unknown plugin \"{0}\"")]
    UnknownPlugin(String),

    /// A plugin parameter is missing or has the wrong type.
    #[error("invalid parameter `{param}` for plugin \"{plugin}\": {reason}")]
    InvalidParam {
        /// Plugin name.
        plugin: String,
        /// Parameter name.
        param: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A system failed during configure or update.
    #[error("system error: {0}")]
    SystemError(String),

    /// Filesystem failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failure.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
