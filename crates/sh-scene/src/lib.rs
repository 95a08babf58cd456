//! Scene graph model for the simhost simulation host.
//!
//! This crate defines the in-memory description that the scene language
//! compiles into and that the server hands to each per-world runner. It is
//! independent of the parser: a [`SceneRoot`] can be built programmatically,
//! composed from parts, or deserialized from JSON.

/// Error types used throughout the crate.
pub mod error;
/// Models, links, lights, plugins and poses.
pub mod model;
/// The top-level container holding worlds or a bare model.
pub mod root;
/// Typed parameter values attached to scene elements.
pub mod value;
/// World descriptions and physics settings.
pub mod world;

/// Re-export error types.
pub use error::{SceneError, SceneResult};
/// Re-export model element types.
pub use model::{LightDesc, LinkDesc, ModelDesc, PluginDesc, Pose};
/// Re-export the scene root.
pub use root::SceneRoot;
/// Re-export parameter values.
pub use value::ParamValue;
/// Re-export world types.
pub use world::{Physics, WorldDesc};
