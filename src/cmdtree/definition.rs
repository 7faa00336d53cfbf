//! Definition units: the on-disk TOML schema of group and command files, and
//! the in-memory [`NodeDefinition`] that discovery hands to the loader.
//!
//! ```toml
//! capsule = "Print the given arguments."
//! action = "echo"
//!
//! [sections]
//! DESCRIPTION = "Writes argv back to stdout as JSON."
//!
//! [[flags]]
//! name = "--flag"
//! description = "Any value."
//!
//! [[positionals]]
//! name = "NAME"
//! cardinality = "zero-or-more"
//! ```

use crate::actions::{ActionRef, ActionRegistry};
use crate::error::DiscoveryError;
use crate::model::{
    Cardinality, Deprecation, FlagDefault, FlagSpec, NodeKind, PositionalSpec, ReleaseTrack,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefinitionFile {
    #[serde(default)]
    pub capsule: String,
    #[serde(default)]
    pub hidden: bool,
    pub release_track: Option<ReleaseTrack>,
    pub component: Option<String>,
    pub action: Option<String>,
    pub deprecated: Option<DeprecationFile>,
    #[serde(default)]
    pub sections: BTreeMap<String, String>,
    #[serde(default)]
    pub flags: Vec<FlagFile>,
    #[serde(default)]
    pub positionals: Vec<PositionalFile>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeprecationFile {
    pub message: Option<String>,
    pub replacement: Option<String>,
    #[serde(default)]
    pub removed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagType {
    Bool,
    String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FlagFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub default: Option<toml::Value>,
    #[serde(rename = "type")]
    pub kind: Option<FlagType>,
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub repeated: bool,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub required: bool,
    pub metavar: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionalFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cardinality: Cardinality,
}

/// Everything the loader needs to turn a unit into a node.
#[derive(Clone)]
pub struct NodeDefinition {
    pub kind: NodeKind,
    /// A directory without an initializer, or a group synthesized to hold a
    /// mount. Carries no help and never replaces an existing node.
    pub implicit: bool,
    pub source: Option<PathBuf>,
    pub capsule: String,
    pub hidden: bool,
    pub release_track: Option<ReleaseTrack>,
    pub component: Option<String>,
    pub deprecated: Option<Deprecation>,
    pub sections: BTreeMap<String, String>,
    pub flags: Vec<FlagSpec>,
    pub positionals: Vec<PositionalSpec>,
    pub action: Option<ActionRef>,
}

impl NodeDefinition {
    pub fn implicit_group() -> Self {
        Self {
            kind: NodeKind::Group,
            implicit: true,
            source: None,
            capsule: String::new(),
            hidden: false,
            release_track: None,
            component: None,
            deprecated: None,
            sections: BTreeMap::new(),
            flags: Vec::new(),
            positionals: Vec::new(),
            action: None,
        }
    }

    pub fn group(capsule: &str) -> Self {
        Self {
            capsule: capsule.to_string(),
            implicit: false,
            ..Self::implicit_group()
        }
    }

    pub fn command(capsule: &str, action: ActionRef) -> Self {
        Self {
            kind: NodeKind::Command,
            capsule: capsule.to_string(),
            implicit: false,
            action: Some(action),
            ..Self::implicit_group()
        }
    }
}

impl fmt::Debug for NodeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeDefinition")
            .field("kind", &self.kind)
            .field("implicit", &self.implicit)
            .field("source", &self.source)
            .field("capsule", &self.capsule)
            .field("hidden", &self.hidden)
            .field("flags", &self.flags.len())
            .field("positionals", &self.positionals.len())
            .field("has_action", &self.action.is_some())
            .finish()
    }
}

impl DefinitionFile {
    pub fn parse(path: &Path, content: &str) -> Result<Self, DiscoveryError> {
        toml::from_str(content).map_err(|source| DiscoveryError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Converts the file into a definition of the given kind. Commands
    /// resolve their action by name, falling back to `default_action`.
    pub fn into_definition(
        self,
        kind: NodeKind,
        path: &Path,
        default_action: &str,
        registry: &ActionRegistry,
    ) -> Result<NodeDefinition, DiscoveryError> {
        let invalid = |message: String| DiscoveryError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let action = match kind {
            NodeKind::Group => {
                if self.action.is_some() {
                    return Err(invalid("group definitions cannot declare an action".into()));
                }
                if !self.positionals.is_empty() {
                    return Err(invalid(
                        "group definitions cannot declare positional arguments".into(),
                    ));
                }
                None
            }
            NodeKind::Command => {
                let name = self.action.as_deref().unwrap_or(default_action);
                let action =
                    registry
                        .get(name)
                        .ok_or_else(|| DiscoveryError::UnknownAction {
                            path: path.to_path_buf(),
                            action: name.to_string(),
                        })?;
                Some(action)
            }
        };

        let flags = self
            .flags
            .into_iter()
            .map(|flag| flag.into_spec().map_err(|message| invalid(message)))
            .collect::<Result<Vec<_>, _>>()?;

        let positionals = self
            .positionals
            .into_iter()
            .map(|p| PositionalSpec {
                name: p.name,
                description: p.description,
                cardinality: p.cardinality,
            })
            .collect();

        Ok(NodeDefinition {
            kind,
            implicit: false,
            source: Some(path.to_path_buf()),
            capsule: self.capsule,
            hidden: self.hidden,
            release_track: self.release_track,
            component: self.component,
            deprecated: self.deprecated.map(|d| Deprecation {
                message: d.message,
                replacement: d.replacement,
                removed: d.removed,
            }),
            sections: self.sections,
            flags,
            positionals,
            action,
        })
    }
}

impl FlagFile {
    fn into_spec(self) -> Result<FlagSpec, String> {
        let default = match self.default {
            None => None,
            Some(value) => Some(convert_default(&self.name, value)?),
        };
        let switch = match self.kind {
            Some(FlagType::Bool) => true,
            Some(FlagType::String) => false,
            None => matches!(default, Some(FlagDefault::Bool(_))),
        };
        if switch && matches!(default, Some(FlagDefault::Text(_)) | Some(FlagDefault::List(_))) {
            return Err(format!("flag [{}] is a switch with a non-boolean default", self.name));
        }
        if switch && self.choices.is_some() {
            return Err(format!("flag [{}] is a switch and cannot declare choices", self.name));
        }
        let default = match (switch, default) {
            (true, None) => Some(FlagDefault::Bool(false)),
            (_, default) => default,
        };

        Ok(FlagSpec {
            name: self.name,
            description: self.description,
            default,
            choices: self.choices,
            repeated: self.repeated,
            hidden: self.hidden,
            required: self.required,
            switch,
            metavar: self.metavar,
            inverse_of: None,
        })
    }
}

fn convert_default(flag: &str, value: toml::Value) -> Result<FlagDefault, String> {
    match value {
        toml::Value::Boolean(b) => Ok(FlagDefault::Bool(b)),
        toml::Value::String(s) => Ok(FlagDefault::Text(s)),
        toml::Value::Integer(i) => Ok(FlagDefault::Text(i.to_string())),
        toml::Value::Float(f) => Ok(FlagDefault::Text(f.to_string())),
        toml::Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s),
                toml::Value::Integer(i) => Ok(i.to_string()),
                other => Err(format!(
                    "flag [{flag}] has an unsupported list default item: {other}"
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(FlagDefault::List),
        other => Err(format!("flag [{flag}] has an unsupported default: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::action_fn;

    fn registry() -> ActionRegistry {
        let mut registry = ActionRegistry::new();
        registry.register("echo", action_fn(|_ctx| Ok(None)));
        registry
    }

    #[test]
    fn test_parse_full_command() {
        let src = r#"
capsule = "Echo."
action = "echo"
release_track = "beta"

[deprecated]
replacement = "test other"

[sections]
DESCRIPTION = "Long text."

[[flags]]
name = "--enabled"
default = true

[[flags]]
name = "--zone"
choices = ["a", "b"]
default = "a"

[[positionals]]
name = "NAME"
cardinality = "one-or-more"
"#;
        let path = Path::new("cmd.toml");
        let def = DefinitionFile::parse(path, src)
            .unwrap()
            .into_definition(NodeKind::Command, path, "unused", &registry())
            .unwrap();

        assert_eq!(def.capsule, "Echo.");
        assert_eq!(def.release_track, Some(ReleaseTrack::Beta));
        assert!(def.action.is_some());
        assert_eq!(def.flags.len(), 2);
        assert!(def.flags[0].switch);
        assert!(def.flags[0].wants_inverse());
        assert!(!def.flags[1].switch);
        assert_eq!(def.flags[1].default, Some(FlagDefault::Text("a".into())));
        assert_eq!(def.positionals[0].cardinality, Cardinality::OneOrMore);
        assert_eq!(
            def.deprecated.unwrap().replacement.as_deref(),
            Some("test other")
        );
    }

    #[test]
    fn test_default_action_name_used_when_absent() {
        let path = Path::new("echo.toml");
        let def = DefinitionFile::parse(path, "capsule = \"x\"")
            .unwrap()
            .into_definition(NodeKind::Command, path, "echo", &registry())
            .unwrap();
        assert!(def.action.is_some());
    }

    #[test]
    fn test_unknown_action_rejected() {
        let path = Path::new("cmd.toml");
        let err = DefinitionFile::parse(path, "action = \"nope\"")
            .unwrap()
            .into_definition(NodeKind::Command, path, "cmd", &registry())
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::UnknownAction { action, .. } if action == "nope"));
    }

    #[test]
    fn test_group_cannot_have_positionals() {
        let src = "[[positionals]]\nname = \"X\"\n";
        let path = Path::new("__init__.toml");
        let err = DefinitionFile::parse(path, src)
            .unwrap()
            .into_definition(NodeKind::Group, path, "g", &registry())
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let path = Path::new("cmd.toml");
        let err = DefinitionFile::parse(path, "capsul = \"typo\"").unwrap_err();
        assert!(matches!(err, DiscoveryError::Parse { .. }));
    }

    #[test]
    fn test_explicit_bool_type_without_default() {
        let src = "[[flags]]\nname = \"--force\"\ntype = \"bool\"\n";
        let path = Path::new("cmd.toml");
        let def = DefinitionFile::parse(path, src)
            .unwrap()
            .into_definition(NodeKind::Command, path, "echo", &registry())
            .unwrap();
        assert!(def.flags[0].switch);
        assert_eq!(def.flags[0].default, Some(FlagDefault::Bool(false)));
    }
}
