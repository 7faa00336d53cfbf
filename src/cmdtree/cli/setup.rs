use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Returns the version string, including git hash and commit date for non-release builds.
/// Format: "0.3.0" for releases, "0.3.0@abc1234 2024-01-15 14:30" for dev builds
pub fn get_version() -> &'static str {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    const GIT_HASH: &str = env!("GIT_HASH");
    const GIT_COMMIT_DATE: &str = env!("GIT_COMMIT_DATE");
    const IS_RELEASE: &str = env!("IS_RELEASE");

    use std::sync::OnceLock;
    static VERSION_STRING: OnceLock<String> = OnceLock::new();

    VERSION_STRING.get_or_init(|| {
        if IS_RELEASE == "true" || GIT_HASH.is_empty() {
            VERSION.to_string()
        } else {
            format!("{}@{} {}", VERSION, GIT_HASH, GIT_COMMIT_DATE)
        }
    })
}

#[derive(Parser, Debug)]
#[command(name = "cmdtree", bin_name = "cmdtree", version = get_version())]
#[command(about = "Load, inspect and run directory-defined command trees", long_about = None)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = cmdtree::config::CONFIG_FILENAME)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch an argv through the loaded tree
    Exec {
        /// Arguments for the loaded CLI, binary name optional
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        argv: Vec<String>,
    },

    /// Print the help index of the tree
    Index {
        /// Start at this dotted path, e.g. test.cfg
        #[arg(long)]
        restrict: Option<String>,

        /// Include hidden nodes
        #[arg(long)]
        hidden: bool,

        /// Only load the restricted branch
        #[arg(long, requires = "restrict")]
        load_restricted: bool,

        /// Print dotted paths instead of JSON
        #[arg(long)]
        paths: bool,
    },

    /// Print a command's path under the other release tracks
    Alternates {
        /// Dotted or space separated path, e.g. test.alpha.cfg
        #[arg(required = true, num_args = 1..)]
        path: Vec<String>,

        /// Only paths that exist in the loaded tree
        #[arg(long)]
        existing: bool,
    },

    /// Print the components a branch needs installed
    Components {
        /// Start at this dotted path
        #[arg(long)]
        restrict: Option<String>,
    },
}
