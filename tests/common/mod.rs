#![allow(dead_code)]

use cmdtree::actions::{builtin, ActionRegistry};
use cmdtree::dispatch::{Cli, Console, Outcome};
use cmdtree::loader::{CliLoader, TrackOverlay};
use cmdtree::model::ReleaseTrack;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

/// A definition tree written into a temp directory.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// The tree most tests run against:
    ///
    /// ```text
    /// ga/                      test
    ///   command1.toml          test command1 [--flag VALUE]
    ///   cfg/                   test cfg
    ///     get.toml             test cfg get NAME
    ///     set.toml             test cfg set NAME VALUE
    ///   secret/ (hidden)       test secret
    ///     hidden_command.toml  test secret hidden-command
    /// alpha/
    ///   command1.toml          test alpha command1 (replaces the GA one)
    /// ```
    pub fn standard() -> Self {
        let fixture = Self::new();
        fixture
            .write("ga/__init__.toml", r#"capsule = "Test CLI.""#)
            .write(
                "ga/command1.toml",
                r#"
capsule = "First command."

[[flags]]
name = "--flag"
description = "Any value."
"#,
            )
            .write(
                "ga/cfg/__init__.toml",
                r#"
capsule = "Manage configuration."

[[flags]]
name = "--scope"
description = "Configuration scope."
choices = ["user", "project"]
default = "user"
"#,
            )
            .write(
                "ga/cfg/get.toml",
                r#"
capsule = "Print a property."
action = "args"

[[positionals]]
name = "NAME"
description = "Property name."
"#,
            )
            .write(
                "ga/cfg/set.toml",
                r#"
capsule = "Set a property."
action = "args"

[[positionals]]
name = "NAME"

[[positionals]]
name = "VALUE"
"#,
            )
            .write(
                "ga/secret/__init__.toml",
                r#"
capsule = "Internal tools."
hidden = true
"#,
            )
            .write(
                "ga/secret/hidden_command.toml",
                r#"
capsule = "Does internal things."
action = "echo"
"#,
            )
            .write(
                "alpha/command1.toml",
                r#"capsule = "First command, next version.""#,
            );
        fixture
    }

    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// `test` rooted at `ga/` with an alpha overlay from `alpha/`.
    pub fn loader(&self) -> CliLoader {
        self.loader_with(registry())
    }

    pub fn loader_with(&self, registry: ActionRegistry) -> CliLoader {
        CliLoader::new("test", self.path("ga"), registry).add_track(
            TrackOverlay::new(ReleaseTrack::Alpha, self.path("alpha")).component("alpha"),
        )
    }
}

/// Built-ins plus the default-named actions of the standard tree.
pub fn registry() -> ActionRegistry {
    let mut registry = ActionRegistry::with_builtins();
    registry.register_fn("command1", builtin::echo);
    registry.register_fn("alpha.command1", |ctx| {
        let line = format!("alpha {}", ctx.args().argv().join(" "));
        writeln!(ctx.out(), "{line}")?;
        Ok(None)
    });
    registry
}

pub struct Run {
    pub outcome: Outcome,
    pub stdout: String,
    pub stderr: String,
}

pub fn run(cli: &Cli, argv: &[&str]) -> Run {
    let mut out = Vec::new();
    let mut err = Vec::new();
    let outcome = {
        let mut console = Console::new(&mut out, &mut err);
        cli.execute_with(argv, &mut console).unwrap()
    };
    Run {
        outcome,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err).unwrap(),
    }
}
