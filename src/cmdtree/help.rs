//! Help pages synthesized from a node's capsule, sections and flags.
//!
//! The page is assembled as plain data ([`HelpPage`]) and rendered with the
//! `helpdoc` template engine, so the layout lives in one template and the
//! tests can assert on the data.

use crate::model::{Cardinality, FlagSpec, PositionalSpec, ReleaseTrack};
use crate::styles::HELP_THEME;
use crate::tracks::AlternateTrackResolver;
use crate::tree::NodeView;
use serde::Serialize;

const WIDTH: usize = 80;

const PAGE_TEMPLATE: &str = r#"
{%- for block in blocks %}
{%- if not loop.first %}

{% endif %}
{{- block.title | style("heading") }}
{%- if block.body %}
{{ block.body | wrap(width, 4) }}
{%- endif %}
{%- for entry in block.entries %}
    {{ entry.term | style(entry.style) }}
{%- if entry.text %}
{{ entry.text | wrap(width, 8) }}
{%- endif %}
{%- endfor %}
{%- endfor %}"#;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HelpItem {
    pub term: String,
    pub text: String,
    pub style: &'static str,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HelpBlock {
    pub title: String,
    pub body: String,
    pub entries: Vec<HelpItem>,
}

impl HelpBlock {
    fn text(title: &str, body: String) -> Self {
        Self {
            title: title.to_string(),
            body,
            entries: Vec::new(),
        }
    }

    fn entries(title: &str, entries: Vec<HelpItem>) -> Self {
        Self {
            title: title.to_string(),
            body: String::new(),
            entries,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HelpPage {
    pub width: usize,
    pub blocks: Vec<HelpBlock>,
}

impl HelpPage {
    pub fn block(&self, title: &str) -> Option<&HelpBlock> {
        self.blocks.iter().find(|b| b.title == title)
    }

    pub fn render(&self, use_color: bool) -> anyhow::Result<String> {
        Ok(helpdoc::render_with_color(
            PAGE_TEMPLATE,
            self,
            &HELP_THEME,
            use_color,
        )?)
    }
}

pub fn render_help(view: &NodeView<'_>, use_color: bool) -> anyhow::Result<String> {
    help_page(view).render(use_color)
}

pub fn help_page(view: &NodeView<'_>) -> HelpPage {
    let node = view.node();
    let mut blocks = Vec::new();

    let name_line = if node.capsule.is_empty() {
        view.path().command_line()
    } else {
        format!("{} - {}", view.path().command_line(), node.capsule)
    };
    blocks.push(HelpBlock::text("NAME", name_line));
    blocks.push(HelpBlock::text("SYNOPSIS", synopsis(view)));

    if let Some(deprecation) = &node.deprecated {
        let text = if deprecation.removed {
            deprecation.removal_error()
        } else {
            deprecation.warning()
        };
        blocks.push(HelpBlock::text("DEPRECATION", text));
    }

    if let Some(description) = node.section("DESCRIPTION") {
        blocks.push(HelpBlock::text("DESCRIPTION", description.to_string()));
    }

    if !node.positionals.is_empty() {
        let entries = node
            .positionals
            .iter()
            .map(|p| HelpItem {
                term: positional_usage(p),
                text: p.description.clone(),
                style: "positional",
            })
            .collect();
        blocks.push(HelpBlock::entries("POSITIONAL ARGUMENTS", entries));
    }

    let flags = view.effective_flags();
    let local: Vec<&FlagSpec> = flags
        .iter()
        .filter(|f| !f.global && !f.spec.hidden && f.spec.inverse_of.is_none())
        .map(|f| f.spec)
        .collect();
    let (required, optional): (Vec<&FlagSpec>, Vec<&FlagSpec>) =
        local.into_iter().partition(|spec| spec.required);
    if !required.is_empty() {
        blocks.push(HelpBlock::entries("REQUIRED FLAGS", flag_entries(&required)));
    }
    if !optional.is_empty() {
        blocks.push(HelpBlock::entries("FLAGS", flag_entries(&optional)));
    }

    let globals: Vec<&str> = flags
        .iter()
        .filter(|f| f.global && !f.spec.hidden && f.spec.inverse_of.is_none())
        .map(|f| f.spec.name.as_str())
        .collect();
    if !globals.is_empty() {
        blocks.push(HelpBlock::text("GLOBAL FLAGS", globals.join(", ")));
    }

    if view.is_group() {
        let (groups, commands): (Vec<_>, Vec<_>) = view
            .visible_children()
            .into_iter()
            .partition(|child| child.is_group());
        if !groups.is_empty() {
            blocks.push(HelpBlock::entries("GROUPS", child_entries(&groups, "group")));
        }
        if !commands.is_empty() {
            blocks.push(HelpBlock::entries(
                "COMMANDS",
                child_entries(&commands, "command"),
            ));
        }
    }

    for (title, text) in &node.sections {
        if title != "DESCRIPTION" {
            blocks.push(HelpBlock::text(title, text.clone()));
        }
    }

    let notes = track_notes(view);
    if !notes.is_empty() {
        blocks.push(HelpBlock::text("NOTES", notes.join("\n\n")));
    }

    HelpPage {
        width: WIDTH,
        blocks,
    }
}

fn synopsis(view: &NodeView<'_>) -> String {
    let node = view.node();
    let mut parts = vec![view.path().command_line()];

    if view.is_group() {
        let children = view.visible_children();
        let has_groups = children.iter().any(|c| c.is_group());
        let has_commands = children.iter().any(|c| !c.is_group());
        match (has_groups, has_commands) {
            (true, true) => parts.push("GROUP | COMMAND".to_string()),
            (true, false) => parts.push("GROUP".to_string()),
            (false, true) => parts.push("COMMAND".to_string()),
            (false, false) => {}
        }
    } else {
        let flags = view.effective_flags();
        for flag in flags
            .iter()
            .filter(|f| !f.global && !f.spec.hidden && f.spec.inverse_of.is_none())
        {
            let usage = flag_usage(flag.spec);
            if flag.spec.required {
                parts.push(usage);
            } else {
                parts.push(format!("[{usage}]"));
            }
        }
        parts.extend(node.positionals.iter().map(positional_usage));
    }

    parts.push("[GLOBAL-FLAG ...]".to_string());
    parts.join(" ")
}

fn flag_usage(spec: &FlagSpec) -> String {
    if spec.switch {
        if spec.wants_inverse() {
            format!("--[no-]{}", spec.name.trim_start_matches('-'))
        } else {
            spec.name.clone()
        }
    } else {
        format!("{}={}", spec.name, spec.display_metavar())
    }
}

fn positional_usage(spec: &PositionalSpec) -> String {
    let name = &spec.name;
    match spec.cardinality {
        Cardinality::ExactlyOne => name.clone(),
        Cardinality::ZeroOrOne => format!("[{name}]"),
        Cardinality::ZeroOrMore => format!("[{name} ...]"),
        Cardinality::OneOrMore => format!("{name} [{name} ...]"),
    }
}

fn flag_entries(specs: &[&FlagSpec]) -> Vec<HelpItem> {
    specs
        .iter()
        .map(|spec| {
            let mut text = spec.description.clone();
            if let Some(choices) = &spec.choices {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(&format!(
                    "{} must be one of: {}.",
                    spec.display_metavar(),
                    choices.join(", ")
                ));
            }
            if spec.repeated {
                text.push_str(" May be repeated.");
            }
            HelpItem {
                term: flag_usage(spec),
                text: text.trim().to_string(),
                style: "flag",
            }
        })
        .collect()
}

fn child_entries(children: &[NodeView<'_>], style: &'static str) -> Vec<HelpItem> {
    children
        .iter()
        .map(|child| {
            let capsule = &child.node().capsule;
            let text = match child.release_track() {
                ReleaseTrack::Ga => capsule.clone(),
                track => format!("({track}) {capsule}").trim().to_string(),
            };
            HelpItem {
                term: child.name().to_string(),
                text,
                style,
            }
        })
        .collect()
}

fn track_notes(view: &NodeView<'_>) -> Vec<String> {
    let mut notes = Vec::new();
    let track = view.release_track();
    if let Some(prefix) = track.prefix() {
        notes.push(format!(
            "This command is currently in {prefix} and might change without notice."
        ));
    }

    let resolver = AlternateTrackResolver::for_tree(view.tree());
    let alternates = resolver.existing(view.tree(), view.path());
    if !alternates.is_empty() {
        let lines: Vec<String> = alternates
            .values()
            .map(|path| format!("$ {}", path.command_line()))
            .collect();
        let intro = if lines.len() == 1 {
            "This variant is also available:"
        } else {
            "These variants are also available:"
        };
        notes.push(format!("{intro}\n\n{}", lines.join("\n")));
    }
    notes
}
