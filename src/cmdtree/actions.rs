//! # Actions
//!
//! A command's body is an [`Action`]: a handler object looked up by name in an
//! [`ActionRegistry`] while definition files are discovered. Definition files
//! only carry the name; the embedder registers the code.
//!
//! Actions write user output through [`CommandContext::out`] and may return a
//! value, which the dispatcher renders per `--format`. Errors are
//! `anyhow::Error`; return a [`CommandError`] (or let an `io::Error`
//! propagate) to get the matching single-line report instead of a crash.

use crate::args::ParsedArgs;
use crate::error::CommandError;
use crate::interrupt::Interrupt;
use crate::model::CommandPath;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

pub type ActionResult = anyhow::Result<Option<Value>>;

pub trait Action: Send + Sync {
    fn run(&self, ctx: &mut CommandContext<'_>) -> ActionResult;
}

pub type ActionRef = Arc<dyn Action>;

struct FnAction<F>(F);

impl<F> Action for FnAction<F>
where
    F: Fn(&mut CommandContext<'_>) -> ActionResult + Send + Sync,
{
    fn run(&self, ctx: &mut CommandContext<'_>) -> ActionResult {
        (self.0)(ctx)
    }
}

/// Wraps a closure as an action.
pub fn action_fn<F>(f: F) -> ActionRef
where
    F: Fn(&mut CommandContext<'_>) -> ActionResult + Send + Sync + 'static,
{
    Arc::new(FnAction(f))
}

/// Everything an action gets to see.
pub struct CommandContext<'a> {
    path: &'a CommandPath,
    args: &'a ParsedArgs,
    out: &'a mut dyn Write,
    interrupt: &'a Interrupt,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        path: &'a CommandPath,
        args: &'a ParsedArgs,
        out: &'a mut dyn Write,
        interrupt: &'a Interrupt,
    ) -> Self {
        Self {
            path,
            args,
            out,
            interrupt,
        }
    }

    pub fn path(&self) -> &CommandPath {
        self.path
    }

    pub fn args(&self) -> &ParsedArgs {
        self.args
    }

    /// User output. A sink when user output is disabled.
    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn quiet(&self) -> bool {
        self.args.get_bool("--quiet")
    }

    /// Long-running actions call this between units of work.
    pub fn check_cancelled(&self) -> Result<(), CommandError> {
        self.interrupt.check()
    }

    /// The value of a scoping flag such as `--project`, or an
    /// underspecified-resource error naming it.
    pub fn require_flag(&self, name: &str) -> Result<&str, CommandError> {
        self.args
            .get_str(name)
            .ok_or_else(|| CommandError::underspecified(name.trim_start_matches('-')))
    }
}

#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, ActionRef>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with [`builtin`] actions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    pub fn register(&mut self, name: &str, action: ActionRef) -> &mut Self {
        if self.actions.insert(name.to_string(), action).is_some() {
            tracing::debug!("Action [{name}] re-registered");
        }
        self
    }

    pub fn register_fn<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&mut CommandContext<'_>) -> ActionResult + Send + Sync + 'static,
    {
        self.register(name, action_fn(f))
    }

    pub fn get(&self, name: &str) -> Option<ActionRef> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Actions available to definition files without any embedder code.
pub mod builtin {
    use super::*;
    use serde_json::json;

    pub const ECHO: &str = "echo";
    pub const ARGS: &str = "args";
    pub const FAIL: &str = "fail";

    pub fn register(registry: &mut ActionRegistry) {
        registry.register_fn(ECHO, echo);
        registry.register_fn(ARGS, args);
        registry.register_fn(FAIL, fail);
    }

    /// Writes the normalized argv as a one-line JSON array, items separated
    /// by `", "`.
    pub fn echo(ctx: &mut CommandContext<'_>) -> ActionResult {
        let items = ctx
            .args()
            .argv()
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;
        writeln!(ctx.out(), "[{}]", items.join(", "))?;
        Ok(None)
    }

    /// Returns the bound flags and positionals for display.
    pub fn args(ctx: &mut CommandContext<'_>) -> ActionResult {
        let flags: serde_json::Map<String, Value> = ctx
            .args()
            .specified_flags()
            .map(|(name, value)| Ok((name.to_string(), serde_json::to_value(value)?)))
            .collect::<Result<_, serde_json::Error>>()?;
        Ok(Some(json!({
            "command": ctx.path().dotted(),
            "flags": flags,
            "positionals": ctx.args().positionals(),
        })))
    }

    /// Fails with a known error carrying `--message`.
    pub fn fail(ctx: &mut CommandContext<'_>) -> ActionResult {
        let message = ctx.args().get_str("--message").unwrap_or("command failed");
        Err(CommandError::known(message).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(action: &ActionRef, args: &ParsedArgs) -> (ActionResult, String) {
        let path = CommandPath::from(["test", "command1"]);
        let interrupt = Interrupt::new();
        let mut out = Vec::new();
        let result = {
            let mut ctx = CommandContext::new(&path, args, &mut out, &interrupt);
            action.run(&mut ctx)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ActionRegistry::with_builtins();
        assert!(registry.contains("echo"));
        assert!(registry.get("nope").is_none());
        assert_eq!(registry.names(), vec!["args", "echo", "fail"]);
    }

    #[test]
    fn test_register_fn_closure() {
        let mut registry = ActionRegistry::new();
        registry.register_fn("hello", |ctx| {
            let path = ctx.path().to_string();
            writeln!(ctx.out(), "hello from {}", path)?;
            Ok(None)
        });
        let action = registry.get("hello").unwrap();
        let (result, out) = run(&action, &ParsedArgs::default());
        assert!(result.unwrap().is_none());
        assert_eq!(out, "hello from test.command1\n");
    }

    #[test]
    fn test_fail_is_known_error() {
        let registry = ActionRegistry::with_builtins();
        let (result, _) = run(&registry.get("fail").unwrap(), &ParsedArgs::default());
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::Known(msg)) if msg == "command failed"
        ));
    }

    #[test]
    fn test_require_flag_underspecified() {
        let path = CommandPath::from(["test"]);
        let args = ParsedArgs::default();
        let interrupt = Interrupt::new();
        let mut out = Vec::new();
        let ctx = CommandContext::new(&path, &args, &mut out, &interrupt);
        let err = ctx.require_flag("--project").unwrap_err();
        assert!(matches!(err, CommandError::UnderspecifiedResource { property } if property == "project"));
    }

    #[test]
    fn test_check_cancelled() {
        let path = CommandPath::from(["test"]);
        let args = ParsedArgs::default();
        let interrupt = Interrupt::new();
        let mut out = Vec::new();
        let ctx = CommandContext::new(&path, &args, &mut out, &interrupt);
        assert!(ctx.check_cancelled().is_ok());
        interrupt.raise();
        assert!(ctx.check_cancelled().is_err());
    }
}
