//! # Node Model
//!
//! Plain data for the command tree. A [`Node`] is either a group (has
//! children, no action) or a command (has an action, no children). Nodes live
//! in the [`CommandTree`](crate::tree::CommandTree) arena and refer to each
//! other by [`NodeId`], which is what lets release-track overlays share
//! backbone nodes without copying them.

use crate::actions::ActionRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Release channel a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseTrack {
    Ga,
    Beta,
    Alpha,
}

impl ReleaseTrack {
    pub fn all() -> &'static [ReleaseTrack] {
        &[ReleaseTrack::Ga, ReleaseTrack::Beta, ReleaseTrack::Alpha]
    }

    /// The token that selects this track right after the binary name.
    /// GA has none.
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            ReleaseTrack::Ga => None,
            ReleaseTrack::Beta => Some("beta"),
            ReleaseTrack::Alpha => Some("alpha"),
        }
    }

    pub fn from_prefix(token: &str) -> Option<Self> {
        match token {
            "beta" => Some(ReleaseTrack::Beta),
            "alpha" => Some(ReleaseTrack::Alpha),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            ReleaseTrack::Ga => "GA",
            ReleaseTrack::Beta => "BETA",
            ReleaseTrack::Alpha => "ALPHA",
        }
    }
}

impl fmt::Display for ReleaseTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Group,
    Command,
}

/// Index of a node inside its tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Ordered names from the root down to a node, inclusive.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct CommandPath(Vec<String>);

impl CommandPath {
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Parses `a.b.c` into a path.
    pub fn from_dotted(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn starts_with(&self, prefix: &[String]) -> bool {
        self.0.starts_with(prefix)
    }

    /// `test.cfg.get` style rendering used in error lines and hooks.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// Space separated, the way the user types it.
    pub fn command_line(&self) -> String {
        self.0.join(" ")
    }
}

impl fmt::Display for CommandPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl From<&[&str]> for CommandPath {
    fn from(segments: &[&str]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for CommandPath {
    fn from(segments: [&str; N]) -> Self {
        Self(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Vec<String>> for CommandPath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

/// How many values a positional accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    #[default]
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Cardinality {
    pub fn min(&self) -> usize {
        match self {
            Cardinality::ExactlyOne | Cardinality::OneOrMore => 1,
            Cardinality::ZeroOrOne | Cardinality::ZeroOrMore => 0,
        }
    }

    pub fn max(&self) -> Option<usize> {
        match self {
            Cardinality::ExactlyOne | Cardinality::ZeroOrOne => Some(1),
            Cardinality::ZeroOrMore | Cardinality::OneOrMore => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionalSpec {
    pub name: String,
    pub description: String,
    pub cardinality: Cardinality,
}

/// A flag's default value. Switches default to a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FlagDefault {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSpec {
    /// Including the leading dashes.
    pub name: String,
    pub description: String,
    pub default: Option<FlagDefault>,
    pub choices: Option<Vec<String>>,
    pub repeated: bool,
    pub hidden: bool,
    pub required: bool,
    /// Takes no value; `--x` means true.
    pub switch: bool,
    pub metavar: Option<String>,
    /// Set on the synthesized `--no-x` flag, naming `--x`.
    pub inverse_of: Option<String>,
}

impl FlagSpec {
    pub fn switch(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default: Some(FlagDefault::Bool(false)),
            choices: None,
            repeated: false,
            hidden: false,
            required: false,
            switch: true,
            metavar: None,
            inverse_of: None,
        }
    }

    pub fn value(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            default: None,
            choices: None,
            repeated: false,
            hidden: false,
            required: false,
            switch: false,
            metavar: None,
            inverse_of: None,
        }
    }

    pub fn with_default(mut self, default: FlagDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Whether a `--no-<flag>` inverse is synthesized for this flag.
    pub fn wants_inverse(&self) -> bool {
        self.switch && self.default == Some(FlagDefault::Bool(true))
    }

    /// The synthesized inverse, e.g. `--no-user-output-enabled`.
    pub fn inverse(&self) -> FlagSpec {
        let bare = self.name.trim_start_matches('-');
        FlagSpec {
            name: format!("--no-{bare}"),
            description: format!("Disable {}.", self.name),
            default: None,
            choices: None,
            repeated: false,
            hidden: self.hidden,
            required: false,
            switch: true,
            metavar: None,
            inverse_of: Some(self.name.clone()),
        }
    }

    /// `NAME` for `--name`, unless an explicit metavar was declared.
    pub fn display_metavar(&self) -> String {
        self.metavar.clone().unwrap_or_else(|| {
            self.name
                .trim_start_matches('-')
                .replace('-', "_")
                .to_uppercase()
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deprecation {
    pub message: Option<String>,
    /// The command line that replaces this node, e.g. `test command2`.
    pub replacement: Option<String>,
    /// Running a removed node fails instead of warning.
    pub removed: bool,
}

impl Deprecation {
    pub fn warning(&self) -> String {
        let mut text = self.message.clone().unwrap_or_else(|| {
            "This command is deprecated and will be removed in a future release.".to_string()
        });
        if let Some(replacement) = &self.replacement {
            text.push_str(&format!(" Use `{replacement}` instead."));
        }
        text
    }

    pub fn removal_error(&self) -> String {
        let mut text = self
            .message
            .clone()
            .unwrap_or_else(|| "This command has been removed.".to_string());
        if let Some(replacement) = &self.replacement {
            text.push_str(&format!(" Use `{replacement}` instead."));
        }
        text
    }
}

/// Where a node came from. Used to decide which component marks a node
/// presented under a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Backbone,
    Track(ReleaseTrack),
    Synthesized,
}

/// A vertex in the command tree.
#[derive(Clone)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Canonical path of the owning tree position. Nodes shared into a
    /// track are presented under other paths through
    /// [`NodeView`](crate::tree::NodeView).
    pub path: CommandPath,
    /// `None` inherits from the nearest ancestor that sets it.
    pub release_track: Option<ReleaseTrack>,
    pub hidden: bool,
    pub deprecated: Option<Deprecation>,
    pub flags: Vec<FlagSpec>,
    pub positionals: Vec<PositionalSpec>,
    pub sections: BTreeMap<String, String>,
    pub capsule: String,
    pub children: Vec<NodeId>,
    pub component: Option<String>,
    pub action: Option<ActionRef>,
    pub origin: Origin,
}

impl Node {
    pub fn is_group(&self) -> bool {
        self.kind == NodeKind::Group
    }

    pub fn flag(&self, name: &str) -> Option<&FlagSpec> {
        self.flags.iter().find(|f| f.name == name)
    }

    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections.get(name).map(String::as_str)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("release_track", &self.release_track)
            .field("hidden", &self.hidden)
            .field("children", &self.children)
            .field("component", &self.component)
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_prefix_roundtrip() {
        for track in ReleaseTrack::all() {
            match track.prefix() {
                Some(prefix) => assert_eq!(ReleaseTrack::from_prefix(prefix), Some(*track)),
                None => assert_eq!(*track, ReleaseTrack::Ga),
            }
        }
        assert_eq!(ReleaseTrack::from_prefix("gamma"), None);
    }

    #[test]
    fn test_command_path_dotted_and_parent() {
        let path = CommandPath::from(["test", "cfg", "get"]);
        assert_eq!(path.dotted(), "test.cfg.get");
        assert_eq!(path.command_line(), "test cfg get");
        assert_eq!(path.parent(), Some(CommandPath::from(["test", "cfg"])));
        assert_eq!(CommandPath::from_dotted("test.cfg"), CommandPath::from(["test", "cfg"]));
    }

    #[test]
    fn test_cardinality_bounds() {
        assert_eq!(Cardinality::OneOrMore.min(), 1);
        assert_eq!(Cardinality::OneOrMore.max(), None);
        assert_eq!(Cardinality::ZeroOrOne.max(), Some(1));
    }

    #[test]
    fn test_inverse_only_for_true_switches() {
        let on = FlagSpec::switch("--user-output-enabled", "")
            .with_default(FlagDefault::Bool(true));
        assert!(on.wants_inverse());
        let inverse = on.inverse();
        assert_eq!(inverse.name, "--no-user-output-enabled");
        assert_eq!(inverse.inverse_of.as_deref(), Some("--user-output-enabled"));

        assert!(!FlagSpec::switch("--quiet", "").wants_inverse());
        assert!(!FlagSpec::value("--project", "").wants_inverse());
    }

    #[test]
    fn test_metavar_from_name() {
        assert_eq!(FlagSpec::value("--max-results", "").display_metavar(), "MAX_RESULTS");
    }

    #[test]
    fn test_deprecation_messages() {
        let dep = Deprecation {
            message: None,
            replacement: Some("test command2".into()),
            removed: false,
        };
        assert!(dep.warning().ends_with("Use `test command2` instead."));
        assert!(dep.removal_error().starts_with("This command has been removed."));
    }
}
