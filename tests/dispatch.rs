mod common;

use common::{registry, run, Fixture};
use cmdtree::dispatch::{Console, ErrorClass, EXIT_CANCELLED, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};
use cmdtree::error::CommandError;
use cmdtree::interrupt::Interrupt;
use cmdtree::model::{CommandPath, ReleaseTrack};
use cmdtree::services::{CredentialProvider, RecordingTelemetry, TelemetryEvent, UpdateManager};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[test]
fn test_simple_dispatch() {
    let fixture = Fixture::standard();
    let telemetry = Arc::new(RecordingTelemetry::new());
    let cli = fixture
        .loader()
        .telemetry(telemetry.clone())
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1", "--flag", "value"]);
    assert_eq!(result.outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(result.stdout, "[\"command1\", \"--flag\", \"value\"]\n");
    assert_eq!(result.stderr, "");
    assert_eq!(
        telemetry.events(),
        vec![
            TelemetryEvent::Started("test.command1".into()),
            TelemetryEvent::Finished {
                command: "test.command1".into(),
                exit_code: 0,
                error: None,
            },
        ]
    );
}

#[test]
fn test_track_switch() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let alpha = run(&cli, &["test", "alpha", "command1"]);
    assert_eq!(alpha.outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(alpha.stdout, "alpha alpha command1\n");

    let ga = run(&cli, &["test", "command1"]);
    assert_eq!(ga.stdout, "[\"command1\"]\n");
}

#[test]
fn test_alternate_tracks() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let from_ga = cli.alternate_tracks(&CommandPath::from(["test", "command1"]));
    let expected: BTreeMap<_, _> = [(
        ReleaseTrack::Alpha,
        CommandPath::from(["test", "alpha", "command1"]),
    )]
    .into_iter()
    .collect();
    assert_eq!(from_ga, expected);

    let from_alpha = cli.alternate_tracks(&CommandPath::from(["test", "alpha", "command1"]));
    let expected: BTreeMap<_, _> = [(ReleaseTrack::Ga, CommandPath::from(["test", "command1"]))]
        .into_iter()
        .collect();
    assert_eq!(from_alpha, expected);
}

struct ClosedPipe;

impl Write for ClosedPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[test]
fn test_broken_pipe_is_silent() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let mut err = Vec::new();
    let outcome = {
        let mut console = Console::new(ClosedPipe, &mut err);
        cli.execute_with(&["test", "command1"], &mut console).unwrap()
    };
    assert_eq!(outcome.exit_code, EXIT_SUCCESS);
    assert!(err.is_empty());
}

#[test]
fn test_known_error() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |_ctx| Err(CommandError::known("msg").into()));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let telemetry = Arc::new(RecordingTelemetry::new());
    let cli = fixture
        .loader_with(actions)
        .known_error_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .telemetry(telemetry.clone())
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_ERROR);
    assert_eq!(result.stderr, "ERROR: (test.command1) msg\n");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        telemetry.events().last(),
        Some(&TelemetryEvent::Finished {
            command: "test.command1".into(),
            exit_code: EXIT_ERROR,
            error: Some(ErrorClass::Known),
        })
    );
}

#[test]
fn test_underspecified_resource_is_known() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |ctx| {
        let project = ctx.require_flag("--project")?;
        Ok(Some(Value::String(project.to_string())))
    });
    let cli = fixture.loader_with(actions).generate().unwrap();

    let missing = run(&cli, &["test", "command1"]);
    assert_eq!(missing.outcome.exit_code, EXIT_ERROR);
    assert_eq!(
        missing.stderr,
        "ERROR: (test.command1) The required property [project] is not currently set. \
Specify it with --project.\n"
    );

    let given = run(&cli, &["test", "command1", "--project=p1"]);
    assert_eq!(given.outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(given.stdout, "p1\n");
}

#[test]
fn test_unknown_flag_suggests() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "command1", "--flg", "x"]);
    assert_eq!(result.outcome.exit_code, EXIT_USAGE);
    assert!(result
        .stderr
        .starts_with("ERROR: (test.command1) unrecognized arguments: --flg"));
    assert!(result.stderr.contains("(did you mean '--flag'?)"));
    assert!(!result.stderr.contains("panicked"));
}

#[test]
fn test_unknown_command_suggests() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "comand1"]);
    assert_eq!(result.outcome.exit_code, EXIT_USAGE);
    assert_eq!(
        result.stderr,
        "ERROR: (test) Invalid choice: 'comand1'. Did you mean 'command1'?\n"
    );
}

#[test]
fn test_group_target_prints_help() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "cfg"]);
    assert_eq!(result.outcome.exit_code, EXIT_USAGE);
    assert!(result.stdout.contains("COMMANDS"));
    assert!(result.stdout.contains("get"));
    assert_eq!(
        result.stderr,
        "ERROR: (test.cfg) Command name argument expected.\n"
    );
}

#[test]
fn test_help_anywhere() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "cfg", "--help", "get"]);
    assert_eq!(result.outcome.exit_code, EXIT_SUCCESS);
    assert!(result.stdout.contains("test cfg get - Print a property."));
    assert_eq!(result.stderr, "");

    let after = run(&cli, &["test", "cfg", "get", "NAME", "--help"]);
    assert_eq!(after.outcome.exit_code, EXIT_SUCCESS);
    assert!(after.stdout.contains("SYNOPSIS"));
}

#[test]
fn test_missing_positional() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "cfg", "get"]);
    assert_eq!(result.outcome.exit_code, EXIT_USAGE);
    assert_eq!(
        result.stderr,
        "ERROR: (test.cfg.get) argument NAME: Must be specified.\n"
    );
}

#[test]
fn test_invalid_choice() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "cfg", "get", "x", "--scope=global"]);
    assert_eq!(result.outcome.exit_code, EXIT_USAGE);
    assert!(result.stderr.contains("Invalid choice: 'global'"));
}

#[test]
fn test_result_formats() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let json = run(&cli, &["test", "cfg", "get", "account", "--format=json"]);
    assert_eq!(json.outcome.exit_code, EXIT_SUCCESS);
    let value: Value = serde_json::from_str(&json.stdout).unwrap();
    assert_eq!(value["command"], "test.cfg.get");
    assert_eq!(value["positionals"]["NAME"][0], "account");
    assert_eq!(json.outcome.result.as_ref(), Some(&value));

    let text = run(&cli, &["test", "cfg", "get", "account"]);
    assert!(text.stdout.contains("command: test.cfg.get\n"));

    let none = run(&cli, &["test", "cfg", "get", "account", "--format", "none"]);
    assert_eq!(none.stdout, "");
}

#[test]
fn test_user_output_disabled() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "command1", "--no-user-output-enabled"]);
    assert_eq!(result.outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(result.stdout, "");

    let result = run(&cli, &["test", "cfg", "get", "a", "--user-output-enabled=false"]);
    assert_eq!(result.stdout, "");
    assert!(result.outcome.result.is_some());
}

#[test]
fn test_flags_before_command_path() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "--project", "p1", "cfg", "get", "a"]);
    assert_eq!(result.outcome.exit_code, EXIT_SUCCESS);
    let value = result.outcome.result.unwrap();
    assert_eq!(value["flags"]["--project"], "p1");
    assert_eq!(value["positionals"]["NAME"][0], "a");
}

#[test]
fn test_hooks_run_in_order_and_filter() {
    let fixture = Fixture::standard();
    let log = Arc::new(Mutex::new(Vec::new()));
    let (pre, post, cfg_only) = (log.clone(), log.clone(), log.clone());
    let cli = fixture
        .loader()
        .pre_run_hook(
            move |path| {
                pre.lock().unwrap().push(format!("pre {path}"));
                Ok(())
            },
            None,
            Some(r"\.secret"),
        )
        .pre_run_hook(
            move |path| {
                cfg_only.lock().unwrap().push(format!("cfg {path}"));
                Ok(())
            },
            Some(r"^test\.cfg"),
            None,
        )
        .post_run_hook(
            move |path| {
                post.lock().unwrap().push(format!("post {path}"));
                Ok(())
            },
            None,
            None,
        )
        .generate()
        .unwrap();

    run(&cli, &["test", "cfg", "get", "a"]);
    run(&cli, &["test", "secret", "hidden-command"]);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "pre test.cfg.get",
            "cfg test.cfg.get",
            "post test.cfg.get",
            "post test.secret.hidden-command",
        ]
    );
}

#[test]
fn test_failing_pre_hook_skips_action() {
    let fixture = Fixture::standard();
    let cli = fixture
        .loader()
        .pre_run_hook(
            |_| Err(CommandError::known("not allowed").into()),
            None,
            None,
        )
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_ERROR);
    assert_eq!(result.stdout, "");
    assert_eq!(result.stderr, "ERROR: (test.command1) not allowed\n");
}

#[derive(Default)]
struct Provider {
    events: Mutex<Vec<&'static str>>,
}

impl CredentialProvider for Provider {
    fn name(&self) -> &str {
        "test"
    }

    fn register(&self) {
        self.events.lock().unwrap().push("register");
    }

    fn unregister(&self) {
        self.events.lock().unwrap().push("unregister");
    }
}

#[test]
fn test_credential_providers_wrap_dispatch() {
    let fixture = Fixture::standard();
    let provider = Arc::new(Provider::default());
    let cli = fixture
        .loader()
        .credential_provider(provider.clone())
        .generate()
        .unwrap();

    run(&cli, &["test", "command1"]);
    run(&cli, &["test", "nope"]);
    assert_eq!(
        *provider.events.lock().unwrap(),
        vec!["register", "unregister", "register", "unregister"]
    );
}

#[test]
fn test_cancelled() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();
    cli.interrupt().raise();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_CANCELLED);
    assert_eq!(result.stderr, "Aborted by user.\n");
    assert_eq!(result.stdout, "");
}

#[test]
fn test_action_observes_cancellation() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |ctx| {
        ctx.check_cancelled()?;
        Ok(None)
    });
    let cli = fixture.loader_with(actions).generate().unwrap();

    assert_eq!(run(&cli, &["test", "command1"]).outcome.exit_code, EXIT_SUCCESS);
    cli.interrupt().raise();
    assert_eq!(run(&cli, &["test", "command1"]).outcome.exit_code, EXIT_CANCELLED);
}

#[test]
fn test_interrupt_during_action_cancels() {
    let fixture = Fixture::standard();
    let interrupt = Interrupt::new();
    let signal = interrupt.clone();
    let mut actions = registry();
    actions.register_fn("command1", move |ctx| {
        signal.raise();
        writeln!(ctx.out(), "still running")?;
        Ok(Some(Value::from("done")))
    });
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let cli = fixture
        .loader_with(actions)
        .interrupt(interrupt)
        .post_run_hook(
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            None,
            None,
        )
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_CANCELLED);
    assert_eq!(result.stderr, "Aborted by user.\n");
    assert!(!result.stdout.contains("done"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_interrupt_during_post_hook_cancels() {
    let fixture = Fixture::standard();
    let interrupt = Interrupt::new();
    let signal = interrupt.clone();
    let cli = fixture
        .loader()
        .interrupt(interrupt)
        .post_run_hook(
            move |_| {
                signal.raise();
                Ok(())
            },
            None,
            None,
        )
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_CANCELLED);
}

#[test]
fn test_network_and_filesystem_hints() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |_ctx| {
        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused").into())
    });
    actions.register_fn("echo", |_ctx| {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "permission denied").into())
    });
    let cli = fixture.loader_with(actions).generate().unwrap();

    let network = run(&cli, &["test", "command1"]);
    assert_eq!(network.outcome.exit_code, EXIT_ERROR);
    assert!(network
        .stderr
        .starts_with("ERROR: (test.command1) connection refused This may be due to network"));

    let filesystem = run(&cli, &["test", "secret", "hidden-command"]);
    assert_eq!(filesystem.outcome.exit_code, EXIT_ERROR);
    assert!(filesystem
        .stderr
        .ends_with("This may be due to a problem accessing the local file system.\n"));
}

#[test]
fn test_credential_refresh_error() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |_ctx| {
        Err(CommandError::credential_refresh("token expired").into())
    });
    let cli = fixture.loader_with(actions).generate().unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_ERROR);
    assert_eq!(
        result.stderr,
        "ERROR: (test.command1) There was a problem refreshing your current auth tokens: \
token expired\n"
    );
}

#[test]
fn test_crash_is_reported() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |_ctx| Err(anyhow::anyhow!("boom")));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let cli = fixture
        .loader_with(actions)
        .known_error_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "command1"]);
    assert_eq!(result.outcome.exit_code, EXIT_ERROR);
    assert_eq!(result.stderr, "ERROR: test crashed (InternalError): boom\n");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_full_trace_returns_internal_error() {
    let fixture = Fixture::standard();
    let mut actions = registry();
    actions.register_fn("command1", |_ctx| Err(anyhow::anyhow!("boom")));
    let cli = fixture
        .loader_with(actions)
        .print_full_trace(true)
        .generate()
        .unwrap();

    let mut out = Vec::new();
    let mut err = Vec::new();
    let result = {
        let mut console = Console::new(&mut out, &mut err);
        cli.execute_with(&["test", "command1"], &mut console)
    };
    assert_eq!(result.unwrap_err().to_string(), "boom");
}

#[test]
fn test_deprecated_and_removed_commands() {
    let fixture = Fixture::standard();
    fixture
        .write(
            "ga/old.toml",
            r#"
action = "echo"

[deprecated]
replacement = "test command1"
"#,
        )
        .write(
            "ga/gone.toml",
            r#"
action = "echo"

[deprecated]
replacement = "test command1"
removed = true
"#,
        );
    let cli = fixture.loader().generate().unwrap();

    let old = run(&cli, &["test", "old"]);
    assert_eq!(old.outcome.exit_code, EXIT_SUCCESS);
    assert_eq!(
        old.stderr,
        "WARNING: This command is deprecated and will be removed in a future release. \
Use `test command1` instead.\n"
    );

    let gone = run(&cli, &["test", "gone"]);
    assert_eq!(gone.outcome.exit_code, EXIT_ERROR);
    assert_eq!(
        gone.stderr,
        "ERROR: (test.gone) This command has been removed. Use `test command1` instead.\n"
    );
    assert_eq!(gone.stdout, "");
}

#[test]
fn test_version_command() {
    let fixture = Fixture::standard();
    let cli = fixture
        .loader()
        .version_func(|| "1.2.3".to_string())
        .generate()
        .unwrap();

    let result = run(&cli, &["test", "version"]);
    assert_eq!(result.stdout, "1.2.3\n");
}

#[test]
fn test_binary_path_is_stripped() {
    let fixture = Fixture::standard();
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["/usr/local/bin/test", "command1"]);
    assert_eq!(result.stdout, "[\"command1\"]\n");

    let bare = run(&cli, &["command1"]);
    assert_eq!(bare.stdout, "[\"command1\"]\n");
}

#[derive(Default)]
struct Updates {
    installs: Mutex<Vec<String>>,
    checks: Mutex<Vec<String>>,
}

impl UpdateManager for Updates {
    fn check_for_updates(&self, path: &CommandPath) -> anyhow::Result<()> {
        self.checks.lock().unwrap().push(path.dotted());
        Ok(())
    }

    fn ensure_installed(&self, component: &str, path: &CommandPath) -> anyhow::Result<()> {
        self.installs
            .lock()
            .unwrap()
            .push(format!("{component} {path}"));
        Ok(())
    }
}

#[test]
fn test_update_manager_hooks() {
    let fixture = Fixture::standard();
    fixture
        .write("ga/components/__init__.toml", r#"capsule = "Manage components.""#)
        .write("ga/components/update.toml", r#"action = "echo""#);
    let updates = Arc::new(Updates::default());
    let cli = fixture
        .loader()
        .update_manager(updates.clone())
        .generate()
        .unwrap();

    run(&cli, &["test", "alpha", "cfg", "get", "a"]);
    run(&cli, &["test", "command1"]);
    run(&cli, &["test", "components", "update"]);
    run(&cli, &["test", "alpha", "components", "update"]);

    assert_eq!(
        *updates.installs.lock().unwrap(),
        vec![
            "alpha test.alpha.cfg.get",
            "alpha test.alpha.components.update"
        ]
    );
    assert_eq!(
        *updates.checks.lock().unwrap(),
        vec!["test.alpha.cfg.get", "test.command1"]
    );
}

#[test]
fn test_builtin_fail_action() {
    let fixture = Fixture::standard();
    fixture.write(
        "ga/explode.toml",
        r#"
action = "fail"

[[flags]]
name = "--message"
default = "it broke"
"#,
    );
    let cli = fixture.loader().generate().unwrap();

    let result = run(&cli, &["test", "explode"]);
    assert_eq!(result.stderr, "ERROR: (test.explode) it broke\n");
}
