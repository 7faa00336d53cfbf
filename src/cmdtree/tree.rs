//! # Command Tree
//!
//! The tree is an arena of [`Node`]s addressed by [`NodeId`]. A release-track
//! overlay is a subtree under the real root whose untouched branches point at
//! the very same ids as the GA backbone, so "the same node" means "the same
//! id" no matter which track it is reached through.
//!
//! Because one node can be reached through several paths, anything that
//! depends on *how* it was reached (the presented path, the effective release
//! track, the effective component, inherited flags) lives on [`NodeView`],
//! which is a node plus the lineage of ids used to get there.

use crate::error::LoaderError;
use crate::model::{CommandPath, FlagSpec, Node, NodeId, ReleaseTrack};
use std::collections::BTreeMap;

/// A track subtree mounted under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMount {
    pub track: ReleaseTrack,
    pub root: NodeId,
    pub component: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CommandTree {
    nodes: Vec<Node>,
    root: NodeId,
    tracks: Vec<TrackMount>,
}

impl CommandTree {
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> NodeView<'_> {
        NodeView {
            tree: self,
            lineage: vec![self.root],
            path: CommandPath::new(vec![self.name().to_string()]),
        }
    }

    /// The binary name.
    pub fn name(&self) -> &str {
        &self.node(self.root).name
    }

    /// Number of distinct nodes. Shared nodes count once.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn tracks(&self) -> &[TrackMount] {
        &self.tracks
    }

    pub fn track_mount(&self, track: ReleaseTrack) -> Option<&TrackMount> {
        self.tracks.iter().find(|m| m.track == track)
    }

    pub fn registered_tracks(&self) -> Vec<ReleaseTrack> {
        self.tracks.iter().map(|m| m.track).collect()
    }

    /// Looks up a node by its full path, root name included.
    pub fn resolve<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeView<'_>> {
        let (first, rest) = path.split_first()?;
        if first.as_ref() != self.name() {
            return None;
        }
        let mut view = self.root();
        for segment in rest {
            view = view.child(segment.as_ref())?;
        }
        Some(view)
    }

    pub fn resolve_path(&self, path: &CommandPath) -> Option<NodeView<'_>> {
        self.resolve(path.segments())
    }
}

/// A node as reached through a particular path.
#[derive(Clone)]
pub struct NodeView<'t> {
    tree: &'t CommandTree,
    lineage: Vec<NodeId>,
    path: CommandPath,
}

impl<'t> NodeView<'t> {
    pub fn tree(&self) -> &'t CommandTree {
        self.tree
    }

    pub fn id(&self) -> NodeId {
        *self.lineage.last().unwrap_or(&self.tree.root)
    }

    pub fn node(&self) -> &'t Node {
        self.tree.node(self.id())
    }

    pub fn name(&self) -> &'t str {
        &self.node().name
    }

    /// The path this node was reached through.
    pub fn path(&self) -> &CommandPath {
        &self.path
    }

    pub fn lineage(&self) -> &[NodeId] {
        &self.lineage
    }

    pub fn is_group(&self) -> bool {
        self.node().is_group()
    }

    pub fn is_hidden(&self) -> bool {
        self.node().hidden
    }

    pub fn is_root(&self) -> bool {
        self.lineage.len() == 1
    }

    pub fn parent(&self) -> Option<NodeView<'t>> {
        if self.is_root() {
            return None;
        }
        let mut lineage = self.lineage.clone();
        lineage.pop();
        Some(NodeView {
            tree: self.tree,
            lineage,
            path: self.path.parent().unwrap_or_default(),
        })
    }

    pub fn child(&self, name: &str) -> Option<NodeView<'t>> {
        self.node()
            .children
            .iter()
            .find(|id| self.tree.node(**id).name == name)
            .map(|id| self.descend(*id))
    }

    /// Children in declaration order, hidden ones included.
    pub fn children(&self) -> Vec<NodeView<'t>> {
        self.node()
            .children
            .iter()
            .map(|id| self.descend(*id))
            .collect()
    }

    pub fn visible_children(&self) -> Vec<NodeView<'t>> {
        self.children()
            .into_iter()
            .filter(|child| !child.is_hidden())
            .collect()
    }

    fn descend(&self, id: NodeId) -> NodeView<'t> {
        let mut lineage = self.lineage.clone();
        lineage.push(id);
        NodeView {
            tree: self.tree,
            lineage,
            path: self.path.child(&self.tree.node(id).name),
        }
    }

    fn ancestry(&self) -> impl Iterator<Item = &'t Node> + '_ {
        let tree = self.tree;
        self.lineage.iter().rev().map(move |id| tree.node(*id))
    }

    /// First release track set walking root-ward, GA when none is.
    pub fn release_track(&self) -> ReleaseTrack {
        self.ancestry()
            .find_map(|node| node.release_track)
            .unwrap_or(ReleaseTrack::Ga)
    }

    /// Nearest component set walking root-ward. Backbone nodes reached
    /// through a track pick up the track root's component.
    pub fn component(&self) -> Option<&'t str> {
        self.ancestry().find_map(|node| node.component.as_deref())
    }

    /// Whether this is a backbone node presented under another path.
    pub fn is_shared(&self) -> bool {
        self.node().path != self.path
    }

    /// Own flags merged with every ancestor's; nearer declarations win.
    pub fn effective_flags(&self) -> EffectiveFlags<'t> {
        let mut flags = BTreeMap::new();
        for id in &self.lineage {
            let node = self.tree.node(*id);
            for spec in &node.flags {
                flags.insert(
                    spec.name.clone(),
                    EffectiveFlag {
                        spec,
                        declared_at: Some(*id),
                        global: *id == self.tree.root,
                    },
                );
            }
        }
        EffectiveFlags { flags }
    }
}

impl std::fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeView")
            .field("path", &self.path)
            .field("id", &self.id())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EffectiveFlag<'t> {
    pub spec: &'t FlagSpec,
    pub declared_at: Option<NodeId>,
    /// Declared at the real root.
    pub global: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EffectiveFlags<'t> {
    flags: BTreeMap<String, EffectiveFlag<'t>>,
}

impl<'t> EffectiveFlags<'t> {
    /// A flat set not attached to any tree.
    pub fn from_specs(specs: &'t [FlagSpec]) -> Self {
        let flags = specs
            .iter()
            .map(|spec| {
                (
                    spec.name.clone(),
                    EffectiveFlag {
                        spec,
                        declared_at: None,
                        global: false,
                    },
                )
            })
            .collect();
        Self { flags }
    }

    pub fn get(&self, name: &str) -> Option<&EffectiveFlag<'t>> {
        self.flags.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &EffectiveFlag<'t>> {
        self.flags.values()
    }

    pub fn visible_names(&self) -> impl Iterator<Item = &str> {
        self.flags
            .values()
            .filter(|f| !f.spec.hidden)
            .map(|f| f.spec.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Arena under construction. Only the loader builds trees.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<Node>,
    tracks: Vec<TrackMount>,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Appends `child` to `parent`, rejecting a sibling name clash.
    pub fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<(), LoaderError> {
        let name = self.node(child).name.clone();
        let clash = self
            .node(parent)
            .children
            .iter()
            .any(|id| self.node(*id).name == name);
        if clash {
            return Err(LoaderError::DuplicateName {
                parent: self.node(parent).path.dotted(),
                name,
            });
        }
        self.node_mut(parent).children.push(child);
        Ok(())
    }

    pub fn add_track(&mut self, mount: TrackMount) {
        self.tracks.push(mount);
    }

    pub fn finish(self, root: NodeId) -> CommandTree {
        CommandTree {
            nodes: self.nodes,
            root,
            tracks: self.tracks,
        }
    }
}
