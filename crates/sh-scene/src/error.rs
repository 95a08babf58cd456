/// Alias for `Result<T, SceneError>`.
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors raised while composing or validating a scene graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    /// Two siblings of the same kind share a name.
    #[error("duplicate {kind} name \"{name}\" in {scope}")]
    DuplicateName {
        /// Element kind, e.g. "model" or "link".
        kind: &'static str,
        /// The repeated name.
        name: String,
        /// The enclosing element, e.g. `world "default"`.
        scope: String,
    },

    /// A numeric or structural value is outside its allowed range.
    #[error("invalid {what} in {scope}: {reason}")]
    InvalidValue {
        /// Which value is wrong, e.g. "step_size".
        what: &'static str,
        /// The enclosing element.
        scope: String,
        /// Human-readable explanation.
        reason: String,
    },

    /// An element that must carry a name was declared without one.
    #[error("{kind} is missing a name")]
    MissingName {
        /// Element kind.
        kind: &'static str,
    },

    /// A root holds both worlds and a bare model.
    #[error("a scene cannot contain both worlds and a top-level model")]
    MixedRoot,
}
