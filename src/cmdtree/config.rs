use crate::error::ConfigError;
use crate::model::ReleaseTrack;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "cmdtree.json";
const DEFAULT_NAME: &str = "cmdtree";
const DEFAULT_ROOT: &str = "commands";

/// Describes a CLI to load, stored in cmdtree.json
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    /// Binary name; the root group's name
    #[serde(default = "default_name")]
    pub name: String,

    /// Directory holding the GA definitions
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Skip definition units that fail to load instead of failing
    #[serde(default)]
    pub allow_non_existing_modules: bool,

    /// Extra directories mounted at dotted paths
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,

    /// Release-track overlays
    #[serde(default)]
    pub tracks: Vec<TrackConfig>,

    /// Return internal errors to the caller instead of the crash line
    #[serde(default)]
    pub print_full_trace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleConfig {
    pub path: String,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackConfig {
    pub track: ReleaseTrack,
    pub dir: PathBuf,
    #[serde(default)]
    pub component: Option<String>,
    #[serde(default)]
    pub hidden: bool,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(DEFAULT_ROOT)
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            root: default_root(),
            allow_non_existing_modules: false,
            modules: Vec::new(),
            tracks: Vec::new(),
            print_full_trace: false,
        }
    }
}

impl CliConfig {
    /// Load config from the given file, or return defaults if not found.
    /// Relative directories are resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if !path.exists() {
            return Ok(Self::default().resolved(&base));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: CliConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(config.resolved(&base))
    }

    /// Save config to the given file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, content).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn resolved(mut self, base: &Path) -> Self {
        let resolve = |dir: &Path| {
            if dir.is_relative() {
                base.join(dir)
            } else {
                dir.to_path_buf()
            }
        };
        self.root = resolve(&self.root);
        for module in &mut self.modules {
            module.dir = resolve(&module.dir);
        }
        for track in &mut self.tracks {
            track.dir = resolve(&track.dir);
        }
        self
    }
}
