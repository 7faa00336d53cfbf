//! # Cmdtree Architecture
//!
//! Cmdtree turns **directories of definition files** into a command-line
//! surface. The command tree is data: every group is a directory, every
//! command is a file, and the code behind a command is an action registered
//! by name. Release tracks (`alpha`, `beta`) are overlay directories that
//! share everything they do not redefine with the GA backbone.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Binary (main.rs, cli/)                                     │
//! │  - clap parsing of the host CLI, config file, logging       │
//! │  - The ONLY place that calls std::process::exit             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Dispatch (dispatch.rs, args.rs, help.rs, display.rs)       │
//! │  - Resolves argv to a node, parses flags and positionals    │
//! │  - Runs hooks and the action, classifies every error        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Loader (loader.rs, discovery.rs, definition.rs)            │
//! │  - Walks definition directories, builds the backbone        │
//! │  - Layers track overlays and extra mounts                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Tree (model.rs, tree.rs, walker.rs, tracks.rs)             │
//! │  - Arena of nodes; a node may be reached through many paths │
//! │  - Read-only once built                                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Shared Nodes
//!
//! A track overlay does not copy the backbone. The track group's children
//! are the *same* [`NodeId`](model::NodeId)s as the backbone's, except
//! where the overlay replaces one. Everything that depends on how a node was
//! reached (its presented path, release track, component, inherited flags)
//! is computed on a [`NodeView`](tree::NodeView), which carries the lineage.
//!
//! ## Key Principle: No I/O Assumptions Below Dispatch
//!
//! Loader and tree code return `Result`s and never print. The dispatcher
//! writes only to the [`Console`](dispatch::Console) it is given, so tests
//! capture both streams as byte buffers.
//!
//! ## Testing Strategy
//!
//! 1. **Units** (`#[cfg(test)]` in each module): parsing, flags, hooks,
//!    track arithmetic.
//! 2. **Integration** (`tests/`): definition trees written into temp
//!    directories, loaded and dispatched end to end.
//! 3. **Binary** (`tests/cli_binary.rs`): the `cmdtree` host run with
//!    `assert_cmd`.

pub mod actions;
pub mod args;
pub mod config;
pub mod definition;
pub mod discovery;
pub mod dispatch;
pub mod display;
pub mod error;
pub mod help;
pub mod hooks;
pub mod interrupt;
pub mod loader;
pub mod logging;
pub mod model;
pub mod services;
pub mod styles;
pub mod tracks;
pub mod tree;
pub mod walker;

pub use actions::{action_fn, Action, ActionRegistry, ActionResult, CommandContext};
pub use args::{FlagValue, ParsedArgs};
pub use config::CliConfig;
pub use dispatch::{Cli, Console, ErrorClass, Outcome};
pub use error::{ArgumentError, CommandError, DiscoveryError, LoaderError};
pub use loader::{CliLoader, TrackOverlay};
pub use model::{CommandPath, ReleaseTrack};
pub use tracks::AlternateTrackResolver;
pub use tree::{CommandTree, NodeView};
pub use walker::{Visitor, Walker};
