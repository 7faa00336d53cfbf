//! Collaborators the dispatcher talks to but does not implement: telemetry,
//! credential providers, the update manager and the crash reporter. Each is
//! a trait so embedders plug in their own; the defaults here only log.

use crate::dispatch::ErrorClass;
use crate::model::CommandPath;
use std::sync::{Arc, Mutex};

pub trait Telemetry: Send + Sync {
    fn started(&self, path: &CommandPath);
    fn finished(&self, path: &CommandPath, exit_code: i32, error: Option<ErrorClass>);
}

/// Emits telemetry as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn started(&self, path: &CommandPath) {
        tracing::info!(command = %path, "Command started");
    }

    fn finished(&self, path: &CommandPath, exit_code: i32, error: Option<ErrorClass>) {
        tracing::info!(command = %path, exit_code, error = ?error, "Command finished");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryEvent {
    Started(String),
    Finished {
        command: String,
        exit_code: i32,
        error: Option<ErrorClass>,
    },
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn record(&self, event: TelemetryEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Telemetry for RecordingTelemetry {
    fn started(&self, path: &CommandPath) {
        self.record(TelemetryEvent::Started(path.dotted()));
    }

    fn finished(&self, path: &CommandPath, exit_code: i32, error: Option<ErrorClass>) {
        self.record(TelemetryEvent::Finished {
            command: path.dotted(),
            exit_code,
            error,
        });
    }
}

/// Something that must be registered with the process for the duration of
/// a dispatch, e.g. a token source for an auth library.
pub trait CredentialProvider: Send + Sync {
    fn name(&self) -> &str;
    fn register(&self);
    fn unregister(&self);
}

#[derive(Clone, Default)]
pub struct CredentialProviders {
    providers: Vec<Arc<dyn CredentialProvider>>,
}

impl CredentialProviders {
    pub fn push(&mut self, provider: Arc<dyn CredentialProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registers every provider; they are unregistered, in reverse order,
    /// when the returned guard drops.
    pub fn register_all(&self) -> ProviderRegistration<'_> {
        for provider in &self.providers {
            tracing::debug!("Registering credential provider [{}]", provider.name());
            provider.register();
        }
        ProviderRegistration {
            providers: &self.providers,
        }
    }
}

#[must_use = "providers are unregistered as soon as the guard drops"]
pub struct ProviderRegistration<'a> {
    providers: &'a [Arc<dyn CredentialProvider>],
}

impl Drop for ProviderRegistration<'_> {
    fn drop(&mut self) {
        for provider in self.providers.iter().rev() {
            tracing::debug!("Unregistering credential provider [{}]", provider.name());
            provider.unregister();
        }
    }
}

pub trait UpdateManager: Send + Sync {
    /// Called by the post-run hook after every command outside the CLI's own
    /// `components` subtree. How often it actually checks is up to the
    /// implementation.
    fn check_for_updates(&self, path: &CommandPath) -> anyhow::Result<()>;

    /// Called before running a command whose effective component is set.
    fn ensure_installed(&self, component: &str, path: &CommandPath) -> anyhow::Result<()> {
        let _ = (component, path);
        Ok(())
    }
}

pub trait CrashReporter: Send + Sync {
    fn report(&self, path: &CommandPath, error: &anyhow::Error);
}

#[derive(Debug, Default)]
pub struct LogCrashReporter;

impl CrashReporter for LogCrashReporter {
    fn report(&self, path: &CommandPath, error: &anyhow::Error) {
        tracing::error!(command = %path, "Command crashed: {error:?}");
    }
}
