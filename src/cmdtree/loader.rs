//! # Loader
//!
//! Turns directories of definition files into a runnable [`Cli`].
//!
//! ## Build Order
//!
//! 1. Discover the root directory: the GA *backbone*. Built-in global flags
//!    are added to the root.
//! 2. Attach extra mounts that are not track-prefixed, synthesizing missing
//!    intermediate groups. They become part of the backbone, so every track
//!    inherits them.
//! 3. Synthesize `version` when a version function is set.
//! 4. For each track overlay, build a group named after the track under the
//!    root. Backbone branches the overlay leaves alone are attached by id;
//!    nodes the overlay defines replace the backbone node at the same
//!    relative path; groups on the way to a replacement are copied;
//!    overlay-only nodes are added. Track-prefixed mounts are applied inside
//!    their overlay.
//! 5. Validate: duplicate names, cycles, commands without actions. Flags
//!    shadowing an ancestor's are accepted and reported as diagnostics.
//!
//! ## Restriction
//!
//! [`CliLoader::restrict`] limits discovery to the line from the root to the
//! given path plus everything under it. A path whose second segment is a
//! track only builds that track's overlay; any other path builds none.

use crate::actions::{action_fn, ActionRegistry};
use crate::config::CliConfig;
use crate::definition::NodeDefinition;
use crate::discovery::{DiscoveredUnit, Discovery, Diagnostic};
use crate::dispatch::Cli;
use crate::error::{DiscoveryError, LoaderError};
use crate::hooks::{components_exclude, hook_fn, Hook, HookFn, HookRegistry};
use crate::interrupt::Interrupt;
use crate::logging::VERBOSITY_CHOICES;
use crate::model::{CommandPath, FlagDefault, FlagSpec, Node, NodeId, NodeKind, Origin, ReleaseTrack};
use crate::services::{
    CrashReporter, CredentialProvider, CredentialProviders, LogCrashReporter, Telemetry,
    TracingTelemetry, UpdateManager,
};
use crate::tree::{CommandTree, NodeView, TrackMount, TreeBuilder};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type VersionFn = Arc<dyn Fn() -> String + Send + Sync>;
pub type KnownErrorHandler = Arc<dyn Fn(&anyhow::Error) + Send + Sync>;

/// A directory of definitions layered over the backbone for one track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackOverlay {
    pub track: ReleaseTrack,
    pub dir: PathBuf,
    pub component: Option<String>,
    pub hidden: bool,
}

impl TrackOverlay {
    pub fn new(track: ReleaseTrack, dir: impl Into<PathBuf>) -> Self {
        Self {
            track,
            dir: dir.into(),
            component: None,
            hidden: false,
        }
    }

    pub fn component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
}

struct PendingHook {
    callable: HookFn,
    include: Option<String>,
    exclude: Option<String>,
}

impl PendingHook {
    fn compile(&self) -> Result<Hook, LoaderError> {
        Hook::new(
            self.callable.clone(),
            self.include.as_deref(),
            self.exclude.as_deref(),
        )
    }
}

/// The flags every CLI carries at its root.
pub fn global_flags() -> Vec<FlagSpec> {
    vec![
        FlagSpec::switch("--help", "Display detailed help."),
        FlagSpec::switch(
            "--quiet",
            "Disable all interactive prompts when running commands.",
        ),
        FlagSpec::value(
            "--verbosity",
            "Override the default verbosity for this command.",
        )
        .with_choices(VERBOSITY_CHOICES)
        .with_default(FlagDefault::Text("warning".to_string())),
        FlagSpec::value(
            "--format",
            "Set the format for printing command output resources.",
        )
        .with_choices(&["json", "text", "none"]),
        FlagSpec::switch(
            "--user-output-enabled",
            "Print user intended output to the console.",
        )
        .with_default(FlagDefault::Bool(true)),
        FlagSpec::value("--project", "The project ID to use for this invocation."),
    ]
}

pub struct CliLoader {
    name: String,
    root: PathBuf,
    registry: ActionRegistry,
    allow_non_existing_modules: bool,
    modules: Vec<(String, PathBuf)>,
    tracks: Vec<TrackOverlay>,
    version_func: Option<VersionFn>,
    known_error_handler: Option<KnownErrorHandler>,
    pre_hooks: Vec<PendingHook>,
    post_hooks: Vec<PendingHook>,
    update_manager: Option<Arc<dyn UpdateManager>>,
    telemetry: Arc<dyn Telemetry>,
    crash_reporter: Arc<dyn CrashReporter>,
    credential_providers: CredentialProviders,
    interrupt: Interrupt,
    print_full_trace: bool,
    restrict: Option<CommandPath>,
}

impl CliLoader {
    pub fn new(name: &str, root: impl Into<PathBuf>, registry: ActionRegistry) -> Self {
        Self {
            name: name.to_string(),
            root: root.into(),
            registry,
            allow_non_existing_modules: false,
            modules: Vec::new(),
            tracks: Vec::new(),
            version_func: None,
            known_error_handler: None,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
            update_manager: None,
            telemetry: Arc::new(TracingTelemetry),
            crash_reporter: Arc::new(LogCrashReporter),
            credential_providers: CredentialProviders::default(),
            interrupt: Interrupt::new(),
            print_full_trace: false,
            restrict: None,
        }
    }

    pub fn from_config(config: &CliConfig, registry: ActionRegistry) -> Self {
        let mut loader = Self::new(&config.name, &config.root, registry)
            .allow_non_existing_modules(config.allow_non_existing_modules)
            .print_full_trace(config.print_full_trace);
        for module in &config.modules {
            loader = loader.add_module(&module.path, &module.dir);
        }
        for track in &config.tracks {
            loader = loader.add_track(TrackOverlay {
                track: track.track,
                dir: track.dir.clone(),
                component: track.component.clone(),
                hidden: track.hidden,
            });
        }
        loader
    }

    pub fn allow_non_existing_modules(mut self, allow: bool) -> Self {
        self.allow_non_existing_modules = allow;
        self
    }

    /// Mounts `dir` at the dotted `path`, e.g. `test.tools` or `alpha.tools`.
    pub fn add_module(mut self, path: &str, dir: impl AsRef<Path>) -> Self {
        self.modules
            .push((path.to_string(), dir.as_ref().to_path_buf()));
        self
    }

    pub fn add_track(mut self, overlay: TrackOverlay) -> Self {
        self.tracks.push(overlay);
        self
    }

    pub fn version_func<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.version_func = Some(Arc::new(f));
        self
    }

    pub fn known_error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&anyhow::Error) + Send + Sync + 'static,
    {
        self.known_error_handler = Some(Arc::new(f));
        self
    }

    pub fn pre_run_hook<F>(mut self, f: F, include: Option<&str>, exclude: Option<&str>) -> Self
    where
        F: Fn(&CommandPath) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_hooks.push(PendingHook {
            callable: hook_fn(f),
            include: include.map(str::to_string),
            exclude: exclude.map(str::to_string),
        });
        self
    }

    pub fn post_run_hook<F>(mut self, f: F, include: Option<&str>, exclude: Option<&str>) -> Self
    where
        F: Fn(&CommandPath) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_hooks.push(PendingHook {
            callable: hook_fn(f),
            include: include.map(str::to_string),
            exclude: exclude.map(str::to_string),
        });
        self
    }

    /// Registers the update-check post hook and component install checks.
    pub fn update_manager(mut self, manager: Arc<dyn UpdateManager>) -> Self {
        self.update_manager = Some(manager);
        self
    }

    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn crash_reporter(mut self, reporter: Arc<dyn CrashReporter>) -> Self {
        self.crash_reporter = reporter;
        self
    }

    pub fn credential_provider(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credential_providers.push(provider);
        self
    }

    pub fn interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn print_full_trace(mut self, enabled: bool) -> Self {
        self.print_full_trace = enabled;
        self
    }

    /// Only build the branch at `path` (root name optional).
    pub fn restrict(mut self, path: impl Into<CommandPath>) -> Self {
        self.restrict = Some(path.into());
        self
    }

    pub fn generate(self) -> Result<Cli, LoaderError> {
        self.check_tracks()?;
        let mut diagnostics = Vec::new();

        let restrict = self.relative_restriction();
        let (track_filter, branch) = match &restrict {
            Some(segments) => match self.track_for_prefix(&segments[0]) {
                Some(track) => (Some(track), non_empty(segments[1..].to_vec())),
                None => (None, Some(segments.clone())),
            },
            None => (None, None),
        };

        let mut units = self.discover(&self.root, Vec::new(), branch.clone(), &mut diagnostics)?;
        if units.first().map_or(true, |unit| !unit.path.is_empty()) {
            units.insert(
                0,
                DiscoveredUnit {
                    path: Vec::new(),
                    definition: NodeDefinition::implicit_group(),
                },
            );
        }
        add_global_flags(&mut units[0].definition);

        for (mount, dir) in &self.modules {
            let segments = self.mount_segments(mount);
            if segments
                .first()
                .is_some_and(|first| self.track_for_prefix(first).is_some())
            {
                continue;
            }
            if !on_line(branch.as_deref(), &segments) {
                continue;
            }
            self.mount(&mut units, mount, &segments, dir, branch.as_deref(), &mut diagnostics)?;
        }

        if let Some(version) = &self.version_func {
            let path = vec!["version".to_string()];
            if !units.iter().any(|unit| unit.path == path) && on_line(branch.as_deref(), &path) {
                units.push(DiscoveredUnit {
                    path,
                    definition: version_definition(version.clone()),
                });
            }
        }

        let mut builder = TreeBuilder::new();
        let root = self.build_backbone(&mut builder, units)?;

        let mut track_roots = Vec::new();
        for overlay in &self.tracks {
            if restrict.is_some() && track_filter != Some(overlay.track) {
                continue;
            }
            let prefix = overlay.track.prefix().ok_or(LoaderError::GaOverlay)?;
            let mut overlay_units = self.discover(
                &overlay.dir,
                vec![prefix.to_string()],
                branch.clone(),
                &mut diagnostics,
            )?;

            for (mount, dir) in &self.modules {
                let segments = self.mount_segments(mount);
                if segments.first().map(String::as_str) != Some(prefix) {
                    continue;
                }
                let inner = segments[1..].to_vec();
                if !on_line(branch.as_deref(), &inner) {
                    continue;
                }
                if overlay_units.is_empty() {
                    overlay_units.push(DiscoveredUnit {
                        path: Vec::new(),
                        definition: NodeDefinition::implicit_group(),
                    });
                }
                self.mount(
                    &mut overlay_units,
                    mount,
                    &inner,
                    dir,
                    branch.as_deref(),
                    &mut diagnostics,
                )?;
            }

            let id = self.overlay_track(&mut builder, root, overlay, overlay_units, &track_roots)?;
            track_roots.push(id);
        }

        let tree = builder.finish(root);
        validate(&tree, &mut diagnostics)?;

        let mut hooks = HookRegistry::new();
        for pending in &self.pre_hooks {
            hooks.add_pre(pending.compile()?);
        }
        for pending in &self.post_hooks {
            hooks.add_post(pending.compile()?);
        }
        if let Some(manager) = &self.update_manager {
            let manager = manager.clone();
            let tracks: Vec<ReleaseTrack> = self.tracks.iter().map(|t| t.track).collect();
            let exclude = components_exclude(&self.name, &tracks);
            hooks.add_post(Hook::new(
                hook_fn(move |path| manager.check_for_updates(path)),
                None,
                Some(&exclude),
            )?);
        }

        tracing::debug!(
            "Loaded [{}]: {} nodes, {} tracks, {} diagnostics",
            self.name,
            tree.len(),
            tree.tracks().len(),
            diagnostics.len()
        );

        Ok(Cli {
            tree,
            hooks,
            diagnostics,
            known_error_handler: self.known_error_handler,
            update_manager: self.update_manager,
            telemetry: self.telemetry,
            crash_reporter: self.crash_reporter,
            credential_providers: self.credential_providers,
            interrupt: self.interrupt,
            print_full_trace: self.print_full_trace,
        })
    }

    fn check_tracks(&self) -> Result<(), LoaderError> {
        let mut seen = BTreeSet::new();
        for overlay in &self.tracks {
            if overlay.track == ReleaseTrack::Ga {
                return Err(LoaderError::GaOverlay);
            }
            if !seen.insert(overlay.track) {
                return Err(LoaderError::DuplicateTrack(overlay.track));
            }
        }
        Ok(())
    }

    fn track_for_prefix(&self, token: &str) -> Option<ReleaseTrack> {
        ReleaseTrack::from_prefix(token).filter(|track| self.tracks.iter().any(|t| t.track == *track))
    }

    fn relative_restriction(&self) -> Option<Vec<String>> {
        let segments = self.restrict.as_ref()?.segments();
        let relative = match segments.split_first() {
            Some((first, rest)) if *first == self.name => rest.to_vec(),
            _ => segments.to_vec(),
        };
        non_empty(relative)
    }

    fn mount_segments(&self, mount: &str) -> Vec<String> {
        let path = CommandPath::from_dotted(mount);
        match path.segments().split_first() {
            Some((first, rest)) if *first == self.name => rest.to_vec(),
            _ => path.segments().to_vec(),
        }
    }

    fn discover(
        &self,
        dir: &Path,
        action_prefix: Vec<String>,
        restrict: Option<Vec<String>>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<DiscoveredUnit>, LoaderError> {
        let mut discovery = Discovery::new(dir, &self.registry)
            .allow_non_existing_modules(self.allow_non_existing_modules)
            .action_prefix(action_prefix);
        if let Some(restrict) = restrict {
            discovery = discovery.restrict(restrict);
        }
        let units = discovery
            .by_ref()
            .collect::<Result<Vec<_>, DiscoveryError>>()?;
        diagnostics.extend(discovery.take_diagnostics());
        tracing::debug!("Discovered {} units under {}", units.len(), dir.display());
        Ok(units)
    }

    /// Adds the units of `dir` at `segments` (relative to the units' root).
    fn mount(
        &self,
        units: &mut Vec<DiscoveredUnit>,
        mount: &str,
        segments: &[String],
        dir: &Path,
        branch: Option<&[String]>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<(), LoaderError> {
        if segments.is_empty() {
            return Err(LoaderError::MountConflict {
                mount: mount.to_string(),
                path: self.name.clone(),
            });
        }
        for depth in 1..segments.len() {
            let prefix = &segments[..depth];
            match units.iter().find(|unit| unit.path == prefix) {
                Some(unit) if unit.definition.kind == NodeKind::Command => {
                    return Err(LoaderError::MountThroughCommand {
                        mount: mount.to_string(),
                        path: self.dotted(prefix),
                    });
                }
                Some(_) => {}
                None => units.push(DiscoveredUnit {
                    path: prefix.to_vec(),
                    definition: NodeDefinition::implicit_group(),
                }),
            }
        }
        if units.iter().any(|unit| unit.path == segments) {
            return Err(LoaderError::MountConflict {
                mount: mount.to_string(),
                path: self.dotted(segments),
            });
        }

        let inner = branch.and_then(|branch| {
            (branch.len() > segments.len() && branch.starts_with(segments))
                .then(|| branch[segments.len()..].to_vec())
        });
        let mounted = self.discover(dir, segments.to_vec(), inner, diagnostics)?;
        tracing::debug!("Mounted {} units at [{mount}]", mounted.len());
        for unit in mounted {
            let mut path = segments.to_vec();
            path.extend(unit.path);
            units.push(DiscoveredUnit {
                path,
                definition: unit.definition,
            });
        }
        Ok(())
    }

    fn dotted(&self, relative: &[String]) -> String {
        std::iter::once(self.name.as_str())
            .chain(relative.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn full_path(&self, relative: &[String]) -> CommandPath {
        let mut segments = vec![self.name.clone()];
        segments.extend(relative.iter().cloned());
        CommandPath::new(segments)
    }

    fn build_backbone(
        &self,
        builder: &mut TreeBuilder,
        units: Vec<DiscoveredUnit>,
    ) -> Result<NodeId, LoaderError> {
        let mut placed: HashMap<Vec<String>, NodeId> = HashMap::new();
        for DiscoveredUnit { path, definition } in units {
            let origin = if definition.source.is_none() && !definition.implicit {
                Origin::Synthesized
            } else {
                Origin::Backbone
            };
            let Some((name, parent_path)) = path.split_last() else {
                let id = builder.add(make_node(&self.name, self.full_path(&[]), definition, origin)?);
                placed.insert(Vec::new(), id);
                continue;
            };
            let Some(&parent) = placed.get(parent_path) else {
                tracing::debug!("Skipping [{}]: parent was not loaded", self.dotted(&path));
                continue;
            };
            if !builder.node(parent).is_group() {
                return Err(LoaderError::MountThroughCommand {
                    mount: self.dotted(&path),
                    path: self.dotted(parent_path),
                });
            }
            let node = make_node(name, self.full_path(&path), definition, origin)?;
            let id = builder.add(node);
            builder.attach(parent, id)?;
            placed.insert(path, id);
        }
        placed
            .get(&Vec::<String>::new())
            .copied()
            .ok_or_else(|| DiscoveryError::MissingDirectory(self.root.clone()).into())
    }

    fn overlay_track(
        &self,
        builder: &mut TreeBuilder,
        backbone: NodeId,
        overlay: &TrackOverlay,
        units: Vec<DiscoveredUnit>,
        track_roots: &[NodeId],
    ) -> Result<NodeId, LoaderError> {
        let prefix = overlay.track.prefix().ok_or(LoaderError::GaOverlay)?;
        let track_path = self.full_path(&[prefix.to_string()]);

        let mut defs = HashMap::new();
        let mut order = Vec::new();
        for DiscoveredUnit { path, definition } in units {
            if defs.contains_key(&path) {
                let name = path.last().cloned().unwrap_or_default();
                let parent = track_path.segments().iter().chain(&path[..path.len().saturating_sub(1)]);
                return Err(LoaderError::DuplicateName {
                    parent: parent.cloned().collect::<Vec<_>>().join("."),
                    name,
                });
            }
            order.push(path.clone());
            defs.insert(path, definition);
        }

        let backbone_root = builder.node(backbone);
        let mut root = match defs.remove(&Vec::<String>::new()).filter(|def| !def.implicit) {
            Some(def) => make_node(prefix, track_path.clone(), def, Origin::Track(overlay.track))?,
            None => Node {
                name: prefix.to_string(),
                kind: NodeKind::Group,
                path: track_path.clone(),
                release_track: None,
                hidden: false,
                deprecated: None,
                flags: Vec::new(),
                positionals: Vec::new(),
                sections: backbone_root.sections.clone(),
                capsule: backbone_root.capsule.clone(),
                children: Vec::new(),
                component: None,
                action: None,
                origin: Origin::Track(overlay.track),
            },
        };
        if !root.is_group() {
            return Err(LoaderError::MountConflict {
                mount: track_path.dotted(),
                path: track_path.dotted(),
            });
        }
        root.release_track = Some(overlay.track);
        root.hidden |= overlay.hidden;
        if root.component.is_none() {
            root.component = overlay.component.clone();
        }
        let root_id = builder.add(root);

        let mut overlay_ctx = Overlay {
            track: overlay.track,
            track_path: track_path.clone(),
            defs,
            placed: HashMap::new(),
        };
        overlay_ctx.placed.insert(Vec::new(), root_id);

        let backbone_children: Vec<NodeId> = builder
            .node(backbone)
            .children
            .iter()
            .filter(|id| !track_roots.contains(id))
            .copied()
            .collect();
        for child in backbone_children {
            let rel = vec![builder.node(child).name.clone()];
            let id = overlay_ctx.place(builder, child, rel)?;
            builder.attach(root_id, id)?;
        }

        for path in order {
            let Some(definition) = overlay_ctx.defs.remove(&path) else {
                continue;
            };
            let Some((name, parent_path)) = path.split_last() else {
                continue;
            };
            let parent = overlay_ctx
                .placed
                .get(parent_path)
                .copied()
                .filter(|id| builder.node(*id).is_group())
                .ok_or_else(|| LoaderError::MountThroughCommand {
                    mount: overlay_ctx.path_of(&path).dotted(),
                    path: overlay_ctx.path_of(parent_path).dotted(),
                })?;
            let node = make_node(
                name,
                overlay_ctx.path_of(&path),
                definition,
                Origin::Track(overlay.track),
            )?;
            let id = builder.add(node);
            builder.attach(parent, id)?;
            overlay_ctx.placed.insert(path, id);
        }

        builder.attach(backbone, root_id)?;
        builder.add_track(TrackMount {
            track: overlay.track,
            root: root_id,
            component: overlay.component.clone(),
        });
        tracing::debug!(
            "Track [{}] mounted with {} own nodes",
            overlay.track,
            overlay_ctx.placed.len()
        );
        Ok(root_id)
    }
}

/// Placement state for one track overlay.
struct Overlay {
    track: ReleaseTrack,
    track_path: CommandPath,
    /// Overlay units not placed yet, keyed by path relative to the track.
    defs: HashMap<Vec<String>, NodeDefinition>,
    /// Track-owned nodes by relative path.
    placed: HashMap<Vec<String>, NodeId>,
}

impl Overlay {
    fn path_of(&self, rel: &[String]) -> CommandPath {
        let mut segments = self.track_path.segments().to_vec();
        segments.extend(rel.iter().cloned());
        CommandPath::new(segments)
    }

    fn has_pending_below(&self, rel: &[String]) -> bool {
        self.defs
            .keys()
            .any(|key| key.len() > rel.len() && key.starts_with(rel))
    }

    /// The id to use at `rel` inside the track: a replacement, a copy of the
    /// backbone group, or the backbone node itself.
    fn place(
        &mut self,
        builder: &mut TreeBuilder,
        backbone_id: NodeId,
        rel: Vec<String>,
    ) -> Result<NodeId, LoaderError> {
        let own = self.defs.remove(&rel).filter(|def| !def.implicit);
        let below = self.has_pending_below(&rel);
        let backbone_is_group = builder.node(backbone_id).is_group();
        let name = builder.node(backbone_id).name.clone();

        match own {
            Some(definition) => {
                let is_group = definition.kind == NodeKind::Group;
                let node = make_node(&name, self.path_of(&rel), definition, Origin::Track(self.track))?;
                let id = builder.add(node);
                self.placed.insert(rel.clone(), id);
                if is_group && backbone_is_group {
                    self.merge_children(builder, backbone_id, id, &rel)?;
                }
                Ok(id)
            }
            None if below && backbone_is_group => {
                let mut copy = builder.node(backbone_id).clone();
                copy.path = self.path_of(&rel);
                copy.children = Vec::new();
                let id = builder.add(copy);
                self.placed.insert(rel.clone(), id);
                self.merge_children(builder, backbone_id, id, &rel)?;
                Ok(id)
            }
            None => Ok(backbone_id),
        }
    }

    fn merge_children(
        &mut self,
        builder: &mut TreeBuilder,
        from: NodeId,
        into: NodeId,
        rel: &[String],
    ) -> Result<(), LoaderError> {
        let children = builder.node(from).children.clone();
        for child in children {
            let mut child_rel = rel.to_vec();
            child_rel.push(builder.node(child).name.clone());
            let id = self.place(builder, child, child_rel)?;
            builder.attach(into, id)?;
        }
        Ok(())
    }
}

fn non_empty(segments: Vec<String>) -> Option<Vec<String>> {
    if segments.is_empty() {
        None
    } else {
        Some(segments)
    }
}

/// Whether `path` is an ancestor of, equal to, or below the branch.
fn on_line(branch: Option<&[String]>, path: &[String]) -> bool {
    match branch {
        None => true,
        Some(branch) => branch.starts_with(path) || path.starts_with(branch),
    }
}

fn add_global_flags(root: &mut NodeDefinition) {
    for flag in global_flags() {
        if !root.flags.iter().any(|declared| declared.name == flag.name) {
            root.flags.push(flag);
        }
    }
}

fn version_definition(version: VersionFn) -> NodeDefinition {
    let action = action_fn(move |ctx| {
        writeln!(ctx.out(), "{}", version())?;
        Ok(None)
    });
    NodeDefinition::command("Print version information.", action)
}

/// Builds a node from a definition, synthesizing `--no-` inverses and
/// rejecting malformed or duplicate flags.
fn make_node(
    name: &str,
    path: CommandPath,
    definition: NodeDefinition,
    origin: Origin,
) -> Result<Node, LoaderError> {
    let dotted = path.dotted();
    let mut flags: Vec<FlagSpec> = Vec::with_capacity(definition.flags.len());
    for flag in definition.flags {
        if !flag.name.starts_with("--") || flag.name.len() <= 2 {
            return Err(LoaderError::InvalidFlagName {
                path: dotted,
                flag: flag.name,
            });
        }
        let inverse = flag.wants_inverse().then(|| flag.inverse());
        for spec in std::iter::once(flag).chain(inverse) {
            if flags.iter().any(|existing| existing.name == spec.name) {
                return Err(LoaderError::DuplicateFlag {
                    path: dotted,
                    flag: spec.name,
                });
            }
            flags.push(spec);
        }
    }

    Ok(Node {
        name: name.to_string(),
        kind: definition.kind,
        path,
        release_track: definition.release_track,
        hidden: definition.hidden,
        deprecated: definition.deprecated,
        flags,
        positionals: definition.positionals,
        sections: definition.sections,
        capsule: definition.capsule,
        children: Vec::new(),
        component: definition.component,
        action: definition.action,
        origin,
    })
}

fn validate(tree: &CommandTree, diagnostics: &mut Vec<Diagnostic>) -> Result<(), LoaderError> {
    let mut reported = BTreeSet::new();
    validate_view(tree, &tree.root(), &mut reported, diagnostics)
}

fn validate_view(
    tree: &CommandTree,
    view: &NodeView<'_>,
    reported: &mut BTreeSet<(NodeId, String)>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<(), LoaderError> {
    let node = view.node();
    let lineage = view.lineage();
    if lineage[..lineage.len() - 1].contains(&view.id()) {
        return Err(LoaderError::Cycle {
            path: view.path().dotted(),
        });
    }
    if !node.is_group() && node.action.is_none() {
        return Err(LoaderError::MissingAction {
            path: view.path().dotted(),
        });
    }

    if let Some(parent) = view.parent() {
        let inherited = parent.effective_flags();
        for flag in node.flags.iter().filter(|f| f.inverse_of.is_none()) {
            let Some(shadowed) = inherited.get(&flag.name) else {
                continue;
            };
            if !reported.insert((view.id(), flag.name.clone())) {
                continue;
            }
            let declared_at = shadowed
                .declared_at
                .map(|id| tree.node(id).path.dotted())
                .unwrap_or_default();
            let message = format!(
                "flag [{}] at [{}] shadows the flag declared at [{}]",
                flag.name,
                node.path.dotted(),
                declared_at
            );
            tracing::warn!("{message}");
            diagnostics.push(Diagnostic::new(None, message));
        }
    }

    for child in view.children() {
        validate_view(tree, &child, reported, diagnostics)?;
    }
    Ok(())
}
