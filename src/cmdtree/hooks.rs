//! Pre-run and post-run hooks.
//!
//! A hook is a callable plus optional include/exclude regexes matched
//! against the dot-joined target path (`test.alpha.cfg.get`). Hooks run in
//! registration order; the first failure stops the phase and is classified
//! by the dispatcher like any action error.

use crate::error::LoaderError;
use crate::model::{CommandPath, ReleaseTrack};
use regex::Regex;
use std::sync::Arc;

pub type HookFn = Arc<dyn Fn(&CommandPath) -> anyhow::Result<()> + Send + Sync>;

pub fn hook_fn<F>(f: F) -> HookFn
where
    F: Fn(&CommandPath) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct Hook {
    callable: HookFn,
    include: Option<Regex>,
    exclude: Option<Regex>,
}

impl Hook {
    pub fn new(
        callable: HookFn,
        include: Option<&str>,
        exclude: Option<&str>,
    ) -> Result<Self, LoaderError> {
        Ok(Self {
            callable,
            include: include.map(compile).transpose()?,
            exclude: exclude.map(compile).transpose()?,
        })
    }

    pub fn matches(&self, dotted: &str) -> bool {
        let included = self.include.as_ref().map_or(true, |re| re.is_match(dotted));
        let excluded = self.exclude.as_ref().is_some_and(|re| re.is_match(dotted));
        included && !excluded
    }

    pub fn call(&self, path: &CommandPath) -> anyhow::Result<()> {
        (self.callable)(path)
    }
}

impl std::fmt::Debug for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hook")
            .field("include", &self.include.as_ref().map(Regex::as_str))
            .field("exclude", &self.exclude.as_ref().map(Regex::as_str))
            .finish()
    }
}

fn compile(pattern: &str) -> Result<Regex, LoaderError> {
    Regex::new(pattern).map_err(|source| LoaderError::InvalidHookPattern {
        pattern: pattern.to_string(),
        source,
    })
}

#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    pre: Vec<Hook>,
    post: Vec<Hook>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pre(&mut self, hook: Hook) {
        self.pre.push(hook);
    }

    pub fn add_post(&mut self, hook: Hook) {
        self.post.push(hook);
    }

    pub fn pre_hooks(&self) -> &[Hook] {
        &self.pre
    }

    pub fn post_hooks(&self) -> &[Hook] {
        &self.post
    }

    pub fn run_pre(&self, path: &CommandPath) -> anyhow::Result<()> {
        run_matching(&self.pre, path, "pre")
    }

    pub fn run_post(&self, path: &CommandPath) -> anyhow::Result<()> {
        run_matching(&self.post, path, "post")
    }
}

fn run_matching(hooks: &[Hook], path: &CommandPath, phase: &str) -> anyhow::Result<()> {
    let dotted = path.dotted();
    for (index, hook) in hooks.iter().enumerate() {
        if !hook.matches(&dotted) {
            continue;
        }
        tracing::debug!("Running {phase}-run hook #{index} for [{dotted}]");
        hook.call(path)?;
    }
    Ok(())
}

/// Exclude pattern for the update-check hook: the CLI's own `components`
/// subtree under every track.
pub fn components_exclude(name: &str, tracks: &[ReleaseTrack]) -> String {
    let prefixes: Vec<&str> = tracks.iter().filter_map(ReleaseTrack::prefix).collect();
    let track_group = if prefixes.is_empty() {
        String::new()
    } else {
        format!("(\\.({}))?", prefixes.join("|"))
    };
    format!(
        "^{}{}\\.components(\\..*)?$",
        regex::escape(name),
        track_group
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder(log: Arc<Mutex<Vec<String>>>, tag: &'static str) -> HookFn {
        hook_fn(move |path| {
            log.lock().unwrap().push(format!("{tag}:{path}"));
            Ok(())
        })
    }

    #[test]
    fn test_include_exclude_filtering() {
        let noop = hook_fn(|_| Ok(()));
        let hook = Hook::new(noop.clone(), Some(r"^test\.cfg"), Some(r"\.set$")).unwrap();
        assert!(hook.matches("test.cfg.get"));
        assert!(!hook.matches("test.cfg.set"));
        assert!(!hook.matches("test.command1"));

        let all = Hook::new(noop, None, None).unwrap();
        assert!(all.matches("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        let noop = hook_fn(|_| Ok(()));
        let err = Hook::new(noop, Some("("), None).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidHookPattern { pattern, .. } if pattern == "("));
    }

    #[test]
    fn test_registration_order_and_stop_on_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = HookRegistry::new();
        registry.add_pre(Hook::new(recorder(log.clone(), "a"), None, None).unwrap());
        registry.add_pre(Hook::new(recorder(log.clone(), "b"), None, Some("skip")).unwrap());
        registry.add_pre(Hook::new(hook_fn(|_| anyhow::bail!("boom")), None, None).unwrap());
        registry.add_pre(Hook::new(recorder(log.clone(), "c"), None, None).unwrap());

        let err = registry
            .run_pre(&CommandPath::from(["test", "command1"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(
            *log.lock().unwrap(),
            vec!["a:test.command1", "b:test.command1"]
        );
    }

    #[test]
    fn test_components_exclude_pattern() {
        let pattern = components_exclude("test", &[ReleaseTrack::Beta, ReleaseTrack::Alpha]);
        assert_eq!(pattern, r"^test(\.(beta|alpha))?\.components(\..*)?$");
        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match("test.components"));
        assert!(re.is_match("test.alpha.components.update"));
        assert!(!re.is_match("test.cfg.components"));
        assert!(!re.is_match("test.componentsx"));

        assert_eq!(
            components_exclude("test", &[]),
            r"^test\.components(\..*)?$"
        );
    }
}
