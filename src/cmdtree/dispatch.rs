//! # Dispatch
//!
//! [`Cli::execute_with`] runs one invocation against the built tree:
//!
//! 1. Strip the binary name and register credential providers for the
//!    duration of the call.
//! 2. Resolve the longest prefix of argv naming a node. Flags may precede
//!    the command path; value flags known at the node reached so far take
//!    their value with them.
//! 3. `--help` anywhere prints the resolved node's help. A group target
//!    prints help and fails with a usage error.
//! 4. Parse the remaining tokens, check deprecation and component install,
//!    run pre-hooks, the action and post-hooks, framed by telemetry.
//!
//! Every error is caught once here, classified by walking its `anyhow`
//! chain, reported as a single line on the error stream and turned into an
//! exit code. Only internal errors with `print_full_trace` set escape.

use crate::actions::CommandContext;
use crate::args::ArgParser;
use crate::discovery::Diagnostic;
use crate::display::{display, Format};
use crate::error::{ArgumentError, CommandError};
use crate::help::render_help;
use crate::hooks::HookRegistry;
use crate::interrupt::Interrupt;
use crate::loader::KnownErrorHandler;
use crate::model::{CommandPath, ReleaseTrack};
use crate::services::{CrashReporter, CredentialProviders, Telemetry, UpdateManager};
use crate::tracks::AlternateTrackResolver;
use crate::tree::{CommandTree, NodeView};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_CANCELLED: i32 = 130;

const NETWORK_HINT: &str = "This may be due to network connectivity issues. Please check your \
network settings, and the status of the service you are trying to reach.";
const FILESYSTEM_HINT: &str = "This may be due to a problem accessing the local file system.";

/// How a failed dispatch is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorClass {
    Argument,
    Known,
    BrokenPipe,
    Network,
    CredentialRefresh,
    FileSystem,
    Cancelled,
    Internal,
}

impl ErrorClass {
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorClass::BrokenPipe => EXIT_SUCCESS,
            ErrorClass::Argument => EXIT_USAGE,
            ErrorClass::Cancelled => EXIT_CANCELLED,
            ErrorClass::Known
            | ErrorClass::Network
            | ErrorClass::CredentialRefresh
            | ErrorClass::FileSystem
            | ErrorClass::Internal => EXIT_ERROR,
        }
    }

    /// Classes handed to the known-error handler.
    pub fn is_known(&self) -> bool {
        matches!(
            self,
            ErrorClass::Known
                | ErrorClass::Network
                | ErrorClass::CredentialRefresh
                | ErrorClass::FileSystem
        )
    }
}

/// Classifies by the first recognizable error in the chain.
pub fn classify(err: &anyhow::Error) -> ErrorClass {
    for cause in err.chain() {
        if cause.downcast_ref::<ArgumentError>().is_some() {
            return ErrorClass::Argument;
        }
        if let Some(command) = cause.downcast_ref::<CommandError>() {
            return match command {
                CommandError::Known(_) | CommandError::UnderspecifiedResource { .. } => {
                    ErrorClass::Known
                }
                CommandError::Network(_) => ErrorClass::Network,
                CommandError::CredentialRefresh(_) => ErrorClass::CredentialRefresh,
                CommandError::UserCancelled => ErrorClass::Cancelled,
            };
        }
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            return match io_err.kind() {
                io::ErrorKind::BrokenPipe => ErrorClass::BrokenPipe,
                io::ErrorKind::ConnectionRefused
                | io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::NotConnected
                | io::ErrorKind::TimedOut
                | io::ErrorKind::AddrNotAvailable => ErrorClass::Network,
                _ => ErrorClass::FileSystem,
            };
        }
    }
    ErrorClass::Internal
}

/// The two streams a dispatch writes to.
pub struct Console<'a> {
    out: Box<dyn Write + 'a>,
    err: Box<dyn Write + 'a>,
    color: bool,
}

impl<'a> Console<'a> {
    pub fn new(out: impl Write + 'a, err: impl Write + 'a) -> Self {
        Self {
            out: Box::new(out),
            err: Box::new(err),
            color: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn out(&mut self) -> &mut dyn Write {
        &mut *self.out
    }

    pub fn err(&mut self) -> &mut dyn Write {
        &mut *self.err
    }
}

impl Console<'static> {
    pub fn stdio() -> Self {
        Console::new(io::stdout(), io::stderr()).with_color(helpdoc::stdout_supports_color())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub exit_code: i32,
    /// What the action returned, when it ran and succeeded.
    pub result: Option<Value>,
    /// The resolved target, when resolution got that far.
    pub path: Option<CommandPath>,
}

impl Outcome {
    fn exit(exit_code: i32, path: CommandPath) -> Self {
        Self {
            exit_code,
            result: None,
            path: Some(path),
        }
    }
}

/// A loaded CLI, built by [`CliLoader::generate`](crate::loader::CliLoader::generate).
pub struct Cli {
    pub(crate) tree: CommandTree,
    pub(crate) hooks: HookRegistry,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) known_error_handler: Option<KnownErrorHandler>,
    pub(crate) update_manager: Option<Arc<dyn UpdateManager>>,
    pub(crate) telemetry: Arc<dyn Telemetry>,
    pub(crate) crash_reporter: Arc<dyn CrashReporter>,
    pub(crate) credential_providers: CredentialProviders,
    pub(crate) interrupt: Interrupt,
    pub(crate) print_full_trace: bool,
}

/// How far a dispatch got; the error path reports against it.
struct Progress {
    path: CommandPath,
    started: bool,
}

impl Cli {
    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    /// Problems tolerated while loading: skipped units, shadowed flags.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    pub fn alternate_tracks(&self, path: &CommandPath) -> BTreeMap<ReleaseTrack, CommandPath> {
        AlternateTrackResolver::for_tree(&self.tree).alternates(path)
    }

    /// Runs `argv` against stdout and stderr.
    pub fn execute<S: AsRef<str>>(&self, argv: &[S]) -> anyhow::Result<Outcome> {
        let mut console = Console::stdio();
        self.execute_with(argv, &mut console)
    }

    pub fn execute_with<S: AsRef<str>>(
        &self,
        argv: &[S],
        console: &mut Console<'_>,
    ) -> anyhow::Result<Outcome> {
        let argv = self.normalize(argv);
        let _registration = self.credential_providers.register_all();

        let mut progress = Progress {
            path: CommandPath::new(vec![self.name().to_string()]),
            started: false,
        };
        let result = self.dispatch(&argv, console, &mut progress);
        let outcome = match result {
            Ok(outcome) => {
                if progress.started {
                    self.telemetry
                        .finished(&progress.path, outcome.exit_code, None);
                }
                outcome
            }
            Err(err) => self.handle_error(err, console, &progress)?,
        };
        let _ = console.err().flush();
        Ok(outcome)
    }

    fn normalize<S: AsRef<str>>(&self, argv: &[S]) -> Vec<String> {
        let mut tokens: Vec<String> = argv.iter().map(|s| s.as_ref().to_string()).collect();
        let is_binary = tokens.first().is_some_and(|first| {
            first == self.name()
                || Path::new(first)
                    .file_stem()
                    .is_some_and(|stem| stem == self.name())
        });
        if is_binary {
            tokens.remove(0);
        }
        tokens
    }

    /// Returns the target, the tokens left for the argument parser and the
    /// token that stopped resolution, if any.
    fn resolve<'t>(&'t self, argv: &[String]) -> (NodeView<'t>, Vec<String>, Option<String>) {
        let mut view = self.tree.root();
        let mut leading = Vec::new();
        let mut i = 0;

        while i < argv.len() {
            let token = &argv[i];
            if token == "--" {
                break;
            }
            if token.starts_with("--") {
                leading.push(token.clone());
                i += 1;
                let takes_value = !token.contains('=')
                    && view
                        .effective_flags()
                        .get(token)
                        .is_some_and(|flag| !flag.spec.switch);
                if takes_value && i < argv.len() {
                    leading.push(argv[i].clone());
                    i += 1;
                }
                continue;
            }
            match view.is_group().then(|| view.child(token)).flatten() {
                Some(child) => {
                    view = child;
                    i += 1;
                }
                None => break,
            }
        }

        let stray = argv.get(i).filter(|t| !t.starts_with("--")).cloned();
        leading.extend(argv[i..].iter().cloned());
        (view, leading, stray)
    }

    fn dispatch(
        &self,
        argv: &[String],
        console: &mut Console<'_>,
        progress: &mut Progress,
    ) -> anyhow::Result<Outcome> {
        let (view, tokens, stray) = self.resolve(argv);
        let path = view.path().clone();
        progress.path = path.clone();
        tracing::debug!("Resolved [{}] with {} tokens left", path, tokens.len());

        if wants_help(&tokens) {
            let page = render_help(&view, console.color)?;
            writeln!(console.out(), "{page}")?;
            console.out().flush()?;
            return Ok(Outcome::exit(EXIT_SUCCESS, path));
        }

        if view.is_group() {
            if let Some(token) = stray {
                let children = view.visible_children();
                let suggestion = crate::args::suggest_similar(
                    &token,
                    children.iter().map(|child| child.name()),
                );
                return Err(ArgumentError::InvalidCommand {
                    token,
                    suggestion,
                }
                .into());
            }
            let page = render_help(&view, console.color)?;
            writeln!(console.out(), "{page}")?;
            return Err(ArgumentError::CommandExpected.into());
        }

        let flags = view.effective_flags();
        let node = view.node();
        let args = ArgParser::new(&flags, &node.positionals).parse(&tokens, argv)?;

        if let Some(deprecation) = &node.deprecated {
            if deprecation.removed {
                return Err(CommandError::known(deprecation.removal_error()).into());
            }
            writeln!(console.err(), "WARNING: {}", deprecation.warning())?;
        }

        self.interrupt.check()?;
        self.telemetry.started(&path);
        progress.started = true;

        if let (Some(manager), Some(component)) = (&self.update_manager, view.component()) {
            manager.ensure_installed(component, &path)?;
        }

        self.hooks.run_pre(&path)?;
        self.interrupt.check()?;

        let action = node
            .action
            .clone()
            .ok_or_else(|| anyhow::anyhow!("command [{path}] has no action"))?;
        let output_enabled = args.get_bool("--user-output-enabled");
        let result = {
            let mut sink = io::sink();
            let out: &mut dyn Write = if output_enabled {
                console.out()
            } else {
                &mut sink
            };
            let mut ctx = CommandContext::new(&path, &args, out, &self.interrupt);
            action.run(&mut ctx)?
        };
        self.interrupt.check()?;

        if output_enabled {
            if let Some(value) = &result {
                display(value, Format::from_flag(args.get_str("--format")), console.out())?;
            }
            console.out().flush()?;
        }

        self.hooks.run_post(&path)?;
        self.interrupt.check()?;

        Ok(Outcome {
            exit_code: EXIT_SUCCESS,
            result,
            path: Some(path),
        })
    }

    fn handle_error(
        &self,
        err: anyhow::Error,
        console: &mut Console<'_>,
        progress: &Progress,
    ) -> anyhow::Result<Outcome> {
        let class = classify(&err);
        let exit_code = class.exit_code();
        let path = &progress.path;
        let dotted = path.dotted();
        tracing::debug!("Command [{dotted}] failed as {class:?}: {err:#}");

        if class.is_known() {
            if let Some(handler) = &self.known_error_handler {
                handler(&err);
            }
        }

        let line = match class {
            ErrorClass::BrokenPipe => None,
            ErrorClass::Argument | ErrorClass::Known => Some(format!("ERROR: ({dotted}) {err:#}")),
            ErrorClass::Network => Some(format!("ERROR: ({dotted}) {err:#} {NETWORK_HINT}")),
            ErrorClass::FileSystem => Some(format!("ERROR: ({dotted}) {err:#} {FILESYSTEM_HINT}")),
            ErrorClass::CredentialRefresh => Some(format!(
                "ERROR: ({dotted}) There was a problem refreshing your current auth tokens: {err:#}"
            )),
            ErrorClass::Cancelled => Some("Aborted by user.".to_string()),
            ErrorClass::Internal => {
                self.crash_reporter.report(path, &err);
                Some(format!(
                    "ERROR: {} crashed (InternalError): {err:#}",
                    self.name()
                ))
            }
        };

        if progress.started {
            self.telemetry.finished(path, exit_code, Some(class));
        }

        if class == ErrorClass::Internal && self.print_full_trace {
            return Err(err);
        }

        if let Some(line) = line {
            if let Err(write_err) = writeln!(console.err(), "{line}") {
                tracing::debug!("Cannot report error: {write_err}");
            }
        }

        Ok(Outcome::exit(exit_code, path.clone()))
    }
}

fn wants_help(tokens: &[String]) -> bool {
    tokens
        .iter()
        .take_while(|t| *t != "--")
        .any(|t| t == "--help")
}
