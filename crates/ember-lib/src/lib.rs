//! Minecraft launch orchestration.
//!
//! The pipeline resolves a version descriptor, materializes its transitive
//! dependencies (client jar, libraries, natives, assets), optionally layers
//! a Forge or custom descriptor on top, synthesizes the JVM command line
//! and spawns the game, reporting progress through an [`EventSink`].

pub mod archive;
pub mod arguments;
pub mod config;
pub mod error;
pub mod events;
pub mod forge;
pub mod launch;
pub mod materialize;
pub mod net;
pub mod options;
pub mod platform;
mod process_ext;
pub mod version;

pub use error::LaunchError;
pub use events::{EventSink, SilentSink};
pub use forge::Overlay;
pub use launch::{GameProcess, Launcher};
pub use net::{FetchOutcome, Fetcher, Retry};
pub use options::{LaunchOptions, Profile};
pub use platform::OsType;
pub use version::VersionDescriptor;
