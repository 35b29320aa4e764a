use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, error, trace, warn};

use gamefactory::config::FactoryConfig;
use gamefactory::content::theme::derive_theme;
use gamefactory::fallback::{BaselineCatalog, FallbackSelector};
use gamefactory::history::SpecHistory;
use gamefactory::spec::{novelty_report, parse_spec, ArtifactSpecification};

/// Inspect specifications, themes and fallbacks for generated games
#[derive(Parser)]
#[command(name = "gamefactory")]
#[command(about = "Quality-gated game artifact generation tools", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to configuration file (.yml, .yaml or .toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a specification document
    CheckSpec {
        /// Specification JSON, optionally wrapped in a code fence
        file: PathBuf,
    },
    /// Print the theme derived from a specification
    Theme { file: PathBuf },
    /// Compare a specification against prior ones
    Novelty {
        file: PathBuf,
        /// History file; defaults to the configured history path
        #[arg(long)]
        history: Option<PathBuf>,
        /// Append the specification to the history afterwards
        #[arg(long)]
        record: bool,
    },
    /// Show which baseline a failed generation would fall back to
    Fallback {
        file: PathBuf,
        /// Baseline catalog (YAML); defaults to the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match FactoryConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e.user_message());
            std::process::exit(2);
        }
    };

    let log_level = match cli.verbose {
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(cli.verbose >= 2)
        .with_writer(std::io::stderr)
        .init();

    debug!("gamefactory started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let result = match cli.command {
        Commands::CheckSpec { file } => run_check_spec(&file, &config),
        Commands::Theme { file } => run_theme(&file, &config),
        Commands::Novelty {
            file,
            history,
            record,
        } => run_novelty(&file, history, record, &config),
        Commands::Fallback { file, catalog } => run_fallback(&file, catalog.as_deref(), &config),
        Commands::Config => run_config(&config),
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_spec(path: &Path, config: &FactoryConfig) -> anyhow::Result<ArtifactSpecification> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read specification {}", path.display()))?;
    parse_spec(&raw, config.generation.stage_count)
        .with_context(|| format!("Invalid specification in {}", path.display()))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

fn run_check_spec(path: &Path, config: &FactoryConfig) -> anyhow::Result<()> {
    let spec = load_spec(path, config)?;

    println!("{} ({})", spec.name, spec.id);
    println!("  category: {}", spec.behavior.category);
    println!(
        "  inputs:   {}",
        spec.behavior
            .inputs
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  entities: {}", spec.behavior.entities.len());
    println!("  stages:   {}", spec.stages.len());
    println!("  mood:     {}", spec.visual.mood);

    let regressions = spec.difficulty_regressions();
    if !regressions.is_empty() {
        warn!(stages = ?regressions, "Difficulty drops at some stages");
        println!("  note: difficulty drops at stage(s) {:?}", regressions);
    }
    Ok(())
}

fn run_theme(path: &Path, config: &FactoryConfig) -> anyhow::Result<()> {
    let spec = load_spec(path, config)?;
    print_json(&derive_theme(&spec.visual))
}

fn run_novelty(
    path: &Path,
    history: Option<PathBuf>,
    record: bool,
    config: &FactoryConfig,
) -> anyhow::Result<()> {
    let spec = load_spec(path, config)?;
    let history_path = history.unwrap_or_else(|| config.effective_history_path());
    let mut history = SpecHistory::load(&history_path)
        .with_context(|| format!("Failed to load history {}", history_path.display()))?;

    let priors = history.recent(history.len());
    let report = novelty_report(
        &spec.summary(),
        &priors,
        config.generation.novelty_warn_threshold,
    );
    if report.is_similar {
        warn!(
            most_similar = ?report.most_similar,
            similarity = report.max_similarity,
            "Specification closely resembles a prior one"
        );
    }
    print_json(&report)?;

    if record {
        history.append(spec.summary());
        history
            .save()
            .with_context(|| format!("Failed to save history {}", history_path.display()))?;
    }
    Ok(())
}

fn run_fallback(
    path: &Path,
    catalog: Option<&Path>,
    config: &FactoryConfig,
) -> anyhow::Result<()> {
    let spec = load_spec(path, config)?;
    let catalog = match catalog {
        Some(path) => BaselineCatalog::from_file(path)
            .with_context(|| format!("Failed to load catalog {}", path.display()))?,
        None => BaselineCatalog::builtin(),
    };
    let selector = FallbackSelector::new(catalog);

    for candidate in selector.rank(&spec) {
        println!("{:<20} {:.3}", candidate.baseline_id, candidate.score);
    }
    let chosen = selector.choose(&spec);
    println!("chosen: {} ({:.3})", chosen.baseline_id, chosen.score);
    Ok(())
}

fn run_config(config: &FactoryConfig) -> anyhow::Result<()> {
    print!(
        "{}",
        serde_yaml::to_string(config).context("Failed to serialize configuration")?
    );
    Ok(())
}
