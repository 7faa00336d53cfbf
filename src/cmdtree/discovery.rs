//! # Discovery
//!
//! Lazily walks one directory and yields a [`DiscoveredUnit`] per group or
//! command, depth first, entries in file-name order:
//!
//! ```text
//! root/
//!   __init__.toml        -> group at []
//!   command1.toml        -> command at [command1]
//!   cfg/
//!     __init__.toml      -> group at [cfg]
//!     get.toml           -> command at [cfg, get]
//!   extra_stuff/         -> implicit group at [extra-stuff]
//!   _private.toml        -> skipped
//!   notes.md             -> ignored
//! ```
//!
//! Discovery knows nothing about tracks or mounts; the loader places units.

use crate::actions::ActionRegistry;
use crate::definition::{DefinitionFile, NodeDefinition};
use crate::error::DiscoveryError;
use crate::model::NodeKind;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

pub const GROUP_FILE: &str = "__init__.toml";
pub const UNIT_EXTENSION: &str = "toml";

/// A non-fatal problem recorded while building a tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: Option<PathBuf>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug)]
pub struct DiscoveredUnit {
    /// Names relative to the discovery root; empty for the root itself.
    pub path: Vec<String>,
    pub definition: NodeDefinition,
}

type Entries = walkdir::FilterEntry<walkdir::IntoIter, fn(&DirEntry) -> bool>;

enum State {
    Pending,
    Walking(Entries),
    Done,
}

pub struct Discovery<'r> {
    root: PathBuf,
    registry: &'r ActionRegistry,
    allow_non_existing_modules: bool,
    action_prefix: Vec<String>,
    restrict: Option<Vec<String>>,
    state: State,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> Discovery<'r> {
    pub fn new(root: impl Into<PathBuf>, registry: &'r ActionRegistry) -> Self {
        Self {
            root: root.into(),
            registry,
            allow_non_existing_modules: false,
            action_prefix: Vec::new(),
            restrict: None,
            state: State::Pending,
            diagnostics: Vec::new(),
        }
    }

    /// Skip units that fail to load instead of failing.
    pub fn allow_non_existing_modules(mut self, allow: bool) -> Self {
        self.allow_non_existing_modules = allow;
        self
    }

    /// Prepended to each unit's path when deriving its default action name.
    pub fn action_prefix(mut self, prefix: Vec<String>) -> Self {
        self.action_prefix = prefix;
        self
    }

    /// Only yield units on the line from the root to `path` and below it.
    pub fn restrict(mut self, path: Vec<String>) -> Self {
        self.restrict = Some(path);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn start(&mut self) -> Result<(), DiscoveryError> {
        if !self.root.is_dir() {
            self.state = State::Done;
            return Err(DiscoveryError::MissingDirectory(self.root.clone()));
        }
        let entries = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(is_visible as fn(&DirEntry) -> bool);
        self.state = State::Walking(entries);
        Ok(())
    }

    /// Either swallows the error into a diagnostic or ends the walk with it.
    fn fail(&mut self, err: DiscoveryError) -> Option<Result<DiscoveredUnit, DiscoveryError>> {
        if self.allow_non_existing_modules {
            tracing::warn!("Skipping unit: {err}");
            self.diagnostics
                .push(Diagnostic::new(err.path().cloned(), err.to_string()));
            None
        } else {
            self.state = State::Done;
            Some(Err(err))
        }
    }

    fn on_restricted_line(&self, path: &[String]) -> bool {
        match &self.restrict {
            None => true,
            Some(restrict) => restrict.starts_with(path) || path.starts_with(restrict),
        }
    }

    fn load(
        &self,
        file: &Path,
        kind: NodeKind,
        path: &[String],
    ) -> Result<NodeDefinition, DiscoveryError> {
        let content = fs::read_to_string(file).map_err(|source| DiscoveryError::Read {
            path: file.to_path_buf(),
            source,
        })?;
        let default_action = self
            .action_prefix
            .iter()
            .chain(path.iter())
            .cloned()
            .collect::<Vec<_>>()
            .join(".");
        DefinitionFile::parse(file, &content)?.into_definition(
            kind,
            file,
            &default_action,
            self.registry,
        )
    }

    fn relative_path(&self, entry: &DirEntry) -> Vec<String> {
        let relative = entry.path().strip_prefix(&self.root).unwrap_or(entry.path());
        let mut names: Vec<String> = relative
            .components()
            .map(|c| normalize_name(&c.as_os_str().to_string_lossy()))
            .collect();
        if entry.file_type().is_file() {
            if let (Some(last), Some(stem)) = (names.last_mut(), entry.path().file_stem()) {
                *last = normalize_name(&stem.to_string_lossy());
            }
        }
        names
    }
}

impl Iterator for Discovery<'_> {
    type Item = Result<DiscoveredUnit, DiscoveryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let State::Pending = self.state {
            if let Err(err) = self.start() {
                return self.fail(err);
            }
        }

        loop {
            let next = match &mut self.state {
                State::Walking(entries) => entries.next()?,
                _ => return None,
            };

            let entry = match next {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.clone());
                    match self.fail(DiscoveryError::Walk { path, source }) {
                        Some(err) => return Some(err),
                        None => continue,
                    }
                }
            };

            let path = self.relative_path(&entry);

            if entry.file_type().is_dir() {
                if !self.on_restricted_line(&path) {
                    self.skip_current_dir();
                    continue;
                }
                let init = entry.path().join(GROUP_FILE);
                if !init.is_file() {
                    tracing::debug!("Implicit group at {}", entry.path().display());
                    return Some(Ok(DiscoveredUnit {
                        path,
                        definition: NodeDefinition::implicit_group(),
                    }));
                }
                match self.load(&init, NodeKind::Group, &path) {
                    Ok(definition) => return Some(Ok(DiscoveredUnit { path, definition })),
                    Err(err) => {
                        self.skip_current_dir();
                        match self.fail(err) {
                            Some(err) => return Some(err),
                            None => continue,
                        }
                    }
                }
            }

            if !entry.file_type().is_file() {
                continue;
            }
            let is_unit = entry.path().extension().and_then(|e| e.to_str()) == Some(UNIT_EXTENSION);
            if !is_unit || !self.on_restricted_line(&path) {
                continue;
            }
            match self.load(entry.path(), NodeKind::Command, &path) {
                Ok(definition) => return Some(Ok(DiscoveredUnit { path, definition })),
                Err(err) => match self.fail(err) {
                    Some(err) => return Some(err),
                    None => continue,
                },
            }
        }
    }
}

impl Discovery<'_> {
    fn skip_current_dir(&mut self) {
        if let State::Walking(entries) = &mut self.state {
            entries.skip_current_dir();
        }
    }
}

/// The root is always visible; `_` and `.` entries never are. The group
/// file is read through its directory.
fn is_visible(entry: &DirEntry) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let name = entry.file_name().to_string_lossy();
    !(name.starts_with('_') || name.starts_with('.'))
}

pub fn normalize_name(name: &str) -> String {
    name.replace('_', "-")
}
