//! # Walker
//!
//! Depth-first traversal of a loaded tree. A [`Visitor`] sees every node
//! together with the value it returned for the node's parent (`None` for the
//! node the walk starts at) and the walk returns the value produced for that
//! starting node.
//!
//! ```text
//! Walker::new(&tree)            // whole tree, hidden subtrees skipped
//!     .restrict(["test", "cfg"])// start at test.cfg if it exists
//!     .include_hidden(true)     // descend into hidden nodes too
//!     .walk(&mut visitor)
//! ```
//!
//! A restriction naming a missing node visits only the real root.

use crate::model::{CommandPath, ReleaseTrack};
use crate::tree::{CommandTree, NodeView};
use serde::Serialize;
use std::collections::BTreeSet;

pub trait Visitor {
    type Output;

    fn visit(
        &mut self,
        node: &NodeView<'_>,
        parent: Option<&Self::Output>,
        is_group: bool,
    ) -> Self::Output;
}

pub struct Walker<'t> {
    tree: &'t CommandTree,
    restrict: Option<CommandPath>,
    include_hidden: bool,
}

impl<'t> Walker<'t> {
    pub fn new(tree: &'t CommandTree) -> Self {
        Self {
            tree,
            restrict: None,
            include_hidden: false,
        }
    }

    pub fn restrict(mut self, path: impl Into<CommandPath>) -> Self {
        let path = path.into();
        self.restrict = if path.is_empty() { None } else { Some(path) };
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    pub fn walk<V: Visitor>(&self, visitor: &mut V) -> V::Output {
        let start = match &self.restrict {
            None => self.tree.root(),
            Some(path) => match self.tree.resolve_path(path) {
                Some(view) => view,
                None => {
                    tracing::debug!("Restriction [{path}] not found, visiting the root only");
                    let root = self.tree.root();
                    return visitor.visit(&root, None, root.is_group());
                }
            },
        };
        self.walk_from(&start, None, visitor)
    }

    fn walk_from<V: Visitor>(
        &self,
        view: &NodeView<'_>,
        parent: Option<&V::Output>,
        visitor: &mut V,
    ) -> V::Output {
        let result = visitor.visit(view, parent, view.is_group());
        for child in view.children() {
            if child.is_hidden() && !self.include_hidden {
                continue;
            }
            self.walk_from(&child, Some(&result), visitor);
        }
        result
    }
}

/// Lists `(path, is_group)` in visit order.
#[derive(Debug, Default)]
pub struct CommandLister {
    pub entries: Vec<(CommandPath, bool)>,
}

impl CommandLister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(path, _)| path.dotted()).collect()
    }
}

impl Visitor for CommandLister {
    type Output = ();

    fn visit(&mut self, node: &NodeView<'_>, _parent: Option<&()>, is_group: bool) {
        self.entries.push((node.path().clone(), is_group));
    }
}

/// Collects every effective component in the visited subtree, which is the
/// set that has to be installed to run it.
#[derive(Debug, Default)]
pub struct ComponentCollector {
    pub components: BTreeSet<String>,
}

impl ComponentCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Visitor for ComponentCollector {
    type Output = ();

    fn visit(&mut self, node: &NodeView<'_>, _parent: Option<&()>, _is_group: bool) {
        if let Some(component) = node.component() {
            self.components.insert(component.to_string());
        }
    }
}

/// One node of the help index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HelpEntry {
    pub name: String,
    pub path: String,
    pub capsule: String,
    pub group: bool,
    pub release_track: ReleaseTrack,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    pub flags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<HelpEntry>,
}

/// Builds a nested help index. Each visit returns the index of the entry in
/// a flat arena; [`HelpIndexBuilder::finish`] nests them.
#[derive(Debug, Default)]
pub struct HelpIndexBuilder {
    entries: Vec<HelpEntry>,
    children: Vec<Vec<usize>>,
}

impl HelpIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(mut self, root: usize) -> Option<HelpEntry> {
        if root >= self.entries.len() {
            return None;
        }
        Some(self.nest(root))
    }

    fn nest(&mut self, index: usize) -> HelpEntry {
        let children = std::mem::take(&mut self.children[index]);
        let commands = children.into_iter().map(|child| self.nest(child)).collect();
        let mut entry = self.entries[index].clone();
        entry.commands = commands;
        entry
    }
}

impl Visitor for HelpIndexBuilder {
    type Output = usize;

    fn visit(&mut self, node: &NodeView<'_>, parent: Option<&usize>, is_group: bool) -> usize {
        let data = node.node();
        let flags = data
            .flags
            .iter()
            .filter(|f| !f.hidden && f.inverse_of.is_none())
            .map(|f| f.name.clone())
            .collect();
        let index = self.entries.len();
        self.entries.push(HelpEntry {
            name: data.name.clone(),
            path: node.path().command_line(),
            capsule: data.capsule.clone(),
            group: is_group,
            release_track: node.release_track(),
            hidden: data.hidden,
            deprecated: data.deprecated.is_some(),
            flags,
            commands: Vec::new(),
        });
        self.children.push(Vec::new());
        if let Some(parent) = parent {
            self.children[*parent].push(index);
        }
        index
    }
}

/// Walks and returns the help index as pretty JSON.
pub fn help_index_json(walker: &Walker<'_>) -> serde_json::Result<String> {
    let mut builder = HelpIndexBuilder::new();
    let root = walker.walk(&mut builder);
    serde_json::to_string_pretty(&builder.finish(root))
}
