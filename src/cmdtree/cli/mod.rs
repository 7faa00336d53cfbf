//! # CLI Behavior
//!
//! The host CLI is the only place that knows about process exit codes and
//! the config file location. Everything it does goes through the library:
//!
//! - `exec`: loads the whole tree and dispatches the trailing argv. The exit
//!   code is the dispatcher's.
//! - `index`: prints the help index of the tree (or a branch) as JSON, or
//!   just the dotted paths with `--paths`. `--load-restricted` loads only the
//!   branch, which must print the same thing.
//! - `alternates`: prints the same command's path under the other tracks.
//! - `components`: prints the components a branch needs installed.
//!
//! ## Module Structure
//!
//! - `setup`: clap argument definitions and version string
//! - `commands`: config loading, logging setup and per-command handlers

mod commands;
pub mod setup;

pub use commands::run;
