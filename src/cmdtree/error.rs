//! # Error Taxonomy
//!
//! Build-time errors ([`DiscoveryError`], [`LoaderError`], [`ConfigError`])
//! bubble up to the embedder: without a tree there is no CLI.
//!
//! Run-time errors travel as `anyhow::Error` so that actions and hooks can use
//! `?` on anything. The dispatcher classifies them once by walking the error
//! chain for the typed errors below ([`ArgumentError`], [`CommandError`]) and
//! for `std::io::Error`; whatever is left is an internal error.

use crate::model::ReleaseTrack;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("command directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{}: unknown action [{action}]", .path.display())]
    UnknownAction { path: PathBuf, action: String },

    #[error("{}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },

    #[error("failed to walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

impl DiscoveryError {
    /// The file or directory the failure is about.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            DiscoveryError::MissingDirectory(path)
            | DiscoveryError::Read { path, .. }
            | DiscoveryError::Parse { path, .. }
            | DiscoveryError::UnknownAction { path, .. }
            | DiscoveryError::Invalid { path, .. }
            | DiscoveryError::Walk { path, .. } => Some(path),
        }
    }
}

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("duplicate name [{name}] under [{parent}]")]
    DuplicateName { parent: String, name: String },

    #[error("flag [{flag}] is declared more than once at [{path}]")]
    DuplicateFlag { path: String, flag: String },

    #[error("invalid flag name [{flag}] at [{path}]: flag names start with '--'")]
    InvalidFlagName { path: String, flag: String },

    #[error("command [{path}] has no action")]
    MissingAction { path: String },

    #[error("cycle detected at [{path}]")]
    Cycle { path: String },

    #[error("cannot mount [{mount}]: [{path}] is a command")]
    MountThroughCommand { mount: String, path: String },

    #[error("cannot mount [{mount}]: [{path}] already exists")]
    MountConflict { mount: String, path: String },

    #[error("invalid hook pattern [{pattern}]: {source}")]
    InvalidHookPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("release track [{0}] is registered more than once")]
    DuplicateTrack(ReleaseTrack),

    #[error("the GA track is the backbone and cannot be overlaid")]
    GaOverlay,
}

/// argv could not be parsed against the resolved target. Always exit code 2.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ArgumentError {
    #[error("unrecognized arguments: {}{}", .arguments.join(" "), suggest(.suggestion))]
    Unrecognized {
        arguments: Vec<String>,
        suggestion: Option<String>,
    },

    #[error("Invalid choice: '{token}'.{}", suggest_sentence(.suggestion))]
    InvalidCommand {
        token: String,
        suggestion: Option<String>,
    },

    #[error("argument {flag}: expected one argument")]
    ExpectedValue { flag: String },

    #[error("argument {flag}: does not take a value")]
    UnexpectedValue { flag: String },

    #[error("argument {flag}: Invalid choice: '{value}'. Valid choices are [{}].", .choices.join(", "))]
    InvalidChoice {
        flag: String,
        value: String,
        choices: Vec<String>,
    },

    #[error("argument {flag}: expected true or false, got '{value}'")]
    InvalidBool { flag: String, value: String },

    #[error("argument {flag}: Must be specified.")]
    MissingFlag { flag: String },

    #[error("argument {name}: Must be specified.")]
    MissingPositional { name: String },

    #[error("Command name argument expected.")]
    CommandExpected,
}

fn suggest(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{s}'?)"),
        None => String::new(),
    }
}

fn suggest_sentence(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" Did you mean '{s}'?"),
        None => String::new(),
    }
}

/// Errors raised by actions and hooks that the dispatcher presents to the
/// user in a single line instead of a crash report.
#[derive(Debug, Error)]
pub enum CommandError {
    /// User-presentable failure.
    #[error("{0}")]
    Known(String),

    /// A required scoping flag is missing and cannot be inferred.
    #[error(
        "The required property [{property}] is not currently set. Specify it with --{property}."
    )]
    UnderspecifiedResource { property: String },

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    CredentialRefresh(String),

    #[error("Aborted by user.")]
    UserCancelled,
}

impl CommandError {
    pub fn known(message: impl Into<String>) -> Self {
        CommandError::Known(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        CommandError::Network(message.into())
    }

    pub fn credential_refresh(message: impl Into<String>) -> Self {
        CommandError::CredentialRefresh(message.into())
    }

    pub fn underspecified(property: impl Into<String>) -> Self {
        CommandError::UnderspecifiedResource {
            property: property.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_with_suggestion() {
        let err = ArgumentError::Unrecognized {
            arguments: vec!["--flg".into()],
            suggestion: Some("--flag".into()),
        };
        assert_eq!(
            err.to_string(),
            "unrecognized arguments: --flg (did you mean '--flag'?)"
        );
    }

    #[test]
    fn test_invalid_command_without_suggestion() {
        let err = ArgumentError::InvalidCommand {
            token: "zzz".into(),
            suggestion: None,
        };
        assert_eq!(err.to_string(), "Invalid choice: 'zzz'.");
    }

    #[test]
    fn test_invalid_choice_lists_choices() {
        let err = ArgumentError::InvalidChoice {
            flag: "--verbosity".into(),
            value: "loud".into(),
            choices: vec!["debug".into(), "info".into()],
        };
        assert_eq!(
            err.to_string(),
            "argument --verbosity: Invalid choice: 'loud'. Valid choices are [debug, info]."
        );
    }

    #[test]
    fn test_underspecified_message() {
        let err = CommandError::underspecified("project");
        assert_eq!(
            err.to_string(),
            "The required property [project] is not currently set. Specify it with --project."
        );
    }

    #[test]
    fn test_loader_error_wraps_discovery() {
        let err: LoaderError = DiscoveryError::MissingDirectory(PathBuf::from("/nope")).into();
        assert_eq!(err.to_string(), "command directory not found: /nope");
    }
}
