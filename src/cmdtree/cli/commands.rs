use super::setup::{get_version, Cli, Commands};
use anyhow::{Context, Result};
use clap::Parser;
use cmdtree::actions::ActionRegistry;
use cmdtree::config::CliConfig;
use cmdtree::dispatch::{Cli as LoadedCli, EXIT_SUCCESS};
use cmdtree::interrupt::Interrupt;
use cmdtree::loader::CliLoader;
use cmdtree::logging::{self, Verbosity};
use cmdtree::model::CommandPath;
use cmdtree::tracks::AlternateTrackResolver;
use cmdtree::walker::{help_index_json, CommandLister, ComponentCollector, Walker};
use std::fmt::Display;
use std::io::{self, Write};

pub fn run() -> Result<i32> {
    let raw: Vec<String> = std::env::args().collect();
    logging::init(Verbosity::from_argv(&raw).unwrap_or_default());

    let cli = Cli::parse();
    let config = CliConfig::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    tracing::debug!("Config: {:?}", config);

    match cli.command {
        Commands::Exec { argv } => handle_exec(&config, &argv),
        Commands::Index {
            restrict,
            hidden,
            load_restricted,
            paths,
        } => handle_index(&config, restrict, hidden, load_restricted, paths),
        Commands::Alternates { path, existing } => handle_alternates(&config, &path, existing),
        Commands::Components { restrict } => handle_components(&config, restrict),
    }
}

fn loader(config: &CliConfig) -> CliLoader {
    CliLoader::from_config(config, ActionRegistry::with_builtins())
        .version_func(|| get_version().to_string())
}

fn load(loader: CliLoader) -> Result<LoadedCli> {
    let cli = loader.generate()?;
    for diagnostic in cli.diagnostics() {
        tracing::warn!("{diagnostic}");
    }
    Ok(cli)
}

fn handle_exec(config: &CliConfig, argv: &[String]) -> Result<i32> {
    let interrupt = Interrupt::new();
    if let Err(e) = interrupt.install() {
        tracing::warn!("Interrupts will not be handled: {e}");
    }
    let cli = load(loader(config).interrupt(interrupt))?;
    let outcome = cli.execute(argv)?;
    Ok(outcome.exit_code)
}

fn handle_index(
    config: &CliConfig,
    restrict: Option<String>,
    hidden: bool,
    load_restricted: bool,
    paths: bool,
) -> Result<i32> {
    let restrict = restrict.map(|dotted| CommandPath::from_dotted(&dotted));
    let mut loader = loader(config);
    if load_restricted {
        if let Some(path) = &restrict {
            loader = loader.restrict(path.clone());
        }
    }
    let cli = load(loader)?;

    let mut walker = Walker::new(cli.tree()).include_hidden(hidden);
    if let Some(path) = restrict {
        walker = walker.restrict(path);
    }

    if paths {
        let mut lister = CommandLister::new();
        walker.walk(&mut lister);
        print_lines(io::stdout().lock(), lister.paths())
    } else {
        print_lines(io::stdout().lock(), [help_index_json(&walker)?])
    }
}

fn handle_alternates(config: &CliConfig, path: &[String], existing: bool) -> Result<i32> {
    let path = CommandPath::from_dotted(&path.join("."));
    let cli = load(loader(config))?;
    let resolver = AlternateTrackResolver::for_tree(cli.tree());
    let alternates = if existing {
        resolver.existing(cli.tree(), &path)
    } else {
        resolver.alternates(&path)
    };
    let lines = alternates
        .into_iter()
        .map(|(track, alternate)| format!("{track}: {}", alternate.command_line()));
    print_lines(io::stdout().lock(), lines)
}

fn handle_components(config: &CliConfig, restrict: Option<String>) -> Result<i32> {
    let cli = load(loader(config))?;
    let mut walker = Walker::new(cli.tree()).include_hidden(true);
    if let Some(dotted) = restrict {
        walker = walker.restrict(CommandPath::from_dotted(&dotted));
    }
    let mut collector = ComponentCollector::new();
    walker.walk(&mut collector);
    print_lines(io::stdout().lock(), collector.components)
}

/// Writes one item per line. A reader that went away (`cmdtree index | head`)
/// is not an error.
fn print_lines<W, I>(mut out: W, lines: I) -> Result<i32>
where
    W: Write,
    I: IntoIterator,
    I::Item: Display,
{
    let written = lines
        .into_iter()
        .try_for_each(|line| writeln!(out, "{line}"))
        .and_then(|()| out.flush());
    match written {
        Ok(()) => Ok(EXIT_SUCCESS),
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
            tracing::debug!("Output closed early");
            Ok(EXIT_SUCCESS)
        }
        Err(e) => Err(e.into()),
    }
}
