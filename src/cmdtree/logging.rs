//! Log setup. Diagnostics go through `tracing` to stderr; user output never
//! does. The level comes from the `--verbosity` global flag.

use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

pub const VERBOSITY_CHOICES: &[&str] = &["debug", "info", "warning", "error", "critical", "none"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    Debug,
    Info,
    #[default]
    Warning,
    Error,
    Critical,
    None,
}

impl Verbosity {
    pub fn level_filter(&self) -> LevelFilter {
        match self {
            Verbosity::Debug => LevelFilter::DEBUG,
            Verbosity::Info => LevelFilter::INFO,
            Verbosity::Warning => LevelFilter::WARN,
            Verbosity::Error | Verbosity::Critical => LevelFilter::ERROR,
            Verbosity::None => LevelFilter::OFF,
        }
    }

    /// Pre-scans raw argv for `--verbosity`, before the tree is loaded, so
    /// loading itself is logged at the requested level. The last occurrence
    /// wins; unknown values are left for the argument parser to reject.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Option<Self> {
        let mut found = None;
        let mut tokens = argv.iter().map(AsRef::as_ref);
        while let Some(token) = tokens.next() {
            if token == "--" {
                break;
            }
            let value = match token.strip_prefix("--verbosity") {
                Some(rest) if rest.starts_with('=') => Some(&rest[1..]),
                Some("") => tokens.next(),
                _ => continue,
            };
            if let Some(parsed) = value.and_then(|v| v.parse().ok()) {
                found = Some(parsed);
            }
        }
        found
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Verbosity::Debug),
            "info" => Ok(Verbosity::Info),
            "warning" => Ok(Verbosity::Warning),
            "error" => Ok(Verbosity::Error),
            "critical" => Ok(Verbosity::Critical),
            "none" => Ok(Verbosity::None),
            other => Err(format!("unknown verbosity [{other}]")),
        }
    }
}

/// Installs the global fmt subscriber on stderr. A second call is a no-op.
pub fn init(verbosity: Verbosity) {
    let result = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(verbosity.level_filter())
        .with_target(false)
        .try_init();
    if result.is_err() {
        tracing::debug!("Log subscriber already installed");
    }
}
