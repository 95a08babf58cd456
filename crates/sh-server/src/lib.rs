//! Lifecycle coordinator for the simhost simulation host.
//!
//! A [`Server`] takes a [`ServerConfig`], resolves it into one validated
//! scene (from a file, inline text, a prepared scene graph, or a default
//! empty world), creates one [`WorldRunner`](sh_runner::WorldRunner) per
//! world and then runs them, either on the calling thread or on a background
//! thread.
//!
//! ```no_run
//! use std::time::Duration;
//! use sh_server::{Server, ServerConfig};
//!
//! let config = ServerConfig::new()
//!     .with_scene_file("worlds/shapes.scene")
//!     .with_update_period(Duration::ZERO);
//! let server = Server::new(&config);
//! server.run(true, 1000, false);
//! println!("{:?}", server.iteration_count(0));
//! ```
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

/// Asset cache and fetch hooks for the scene loader.
pub mod assets;
/// Server configuration.
pub mod config;
/// Initialization and fetch errors.
pub mod error;
/// Run state machine.
pub mod lifecycle;
/// Turns a configured source into a scene.
pub mod resolver;
/// The server itself.
pub mod server;
/// Process signal dispatch.
pub mod signal;

pub use assets::{AssetBridge, AssetClient, MirrorClient, OfflineClient};
pub use config::{RESOURCE_PATH_ENV, ServerConfig, SourceType};
pub use error::{FetchError, InitError};
pub use lifecycle::{RunRejection, RunState};
pub use resolver::{DEFAULT_WORLD, SceneResolver};
pub use server::{Server, ServerBuilder, StopHandle};
pub use signal::SignalHandler;
