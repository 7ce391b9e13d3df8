//! specgate - Validate specs and change proposals
//!
//! specgate checks base specs under `specs/` and the delta specs, tasks and
//! dependencies of changes under `changes/`, and reports every finding with
//! its file and line.

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use owo_colors::OwoColorize;
use specgate::config::CONFIG_PATH;
use specgate::output::{OutputFormat, render_dependency_report, render_results};
use specgate::{find_project_root, load_config, load_config_or_default};
use specgate_core::{
    BulkItem, BulkOptions, CancellationToken, ItemSelection, ValidationMode, discover, find_item,
    validate_dependencies, validate_dependencies_for_accept, validate_items,
};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// CLI arguments
#[derive(Debug, Parser)]
#[command(name = "specgate", version, about = "Validate specs and change proposals")]
struct Args {
    /// Subcommand to run
    #[command(subcommand)]
    command: Command,

    /// Project root (default: nearest ancestor containing specs/ or changes/)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Path to config file (default: .config/specgate/config.yaml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,
}

/// Subcommands
#[derive(Debug, Subcommand)]
enum Command {
    /// Validate specs and changes
    Validate {
        /// Change ID or capability name (default: everything)
        item: Option<String>,

        /// Validate every change and spec
        #[arg(long, conflicts_with = "item")]
        all: bool,

        /// Validate every spec
        #[arg(long, conflicts_with = "item")]
        specs: bool,

        /// Validate every change
        #[arg(long, conflicts_with = "item")]
        changes: bool,

        /// Treat missing SHALL/MUST and missing scenarios as errors
        #[arg(long, conflicts_with = "lenient")]
        strict: bool,

        /// Treat missing SHALL/MUST and missing scenarios as warnings
        #[arg(long)]
        lenient: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        /// Validate one item at a time
        #[arg(long)]
        sequential: bool,
    },

    /// Show the dependency report of a change
    Deps {
        /// Change ID
        change: String,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Fail unless every change required by CHANGE is archived
    AcceptCheck {
        /// Change ID
        change: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SPECGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let project_root = match args.root {
        Some(root) => root,
        None => find_project_root(
            &std::env::current_dir().wrap_err("Failed to get current directory")?,
        ),
    };

    // An explicit --config must exist; the default location is optional
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_config_or_default(&project_root.join(CONFIG_PATH))?,
    };

    debug!(root = %project_root.display(), ?config, "resolved project");

    match args.command {
        Command::Validate {
            item,
            all,
            specs,
            changes,
            strict,
            lenient,
            json,
            sequential,
        } => {
            let selection = match (all, specs, changes) {
                (false, true, false) => ItemSelection::Specs,
                (false, false, true) => ItemSelection::Changes,
                _ => ItemSelection::All,
            };
            let mode = if lenient {
                ValidationMode::Lenient
            } else if strict {
                ValidationMode::Strict
            } else {
                config.mode
            };
            let options = BulkOptions {
                mode,
                parallel: config.parallel && !sequential,
            };
            let format = if json { OutputFormat::Json } else { config.format };

            let all_valid =
                run_validate(&project_root, item.as_deref(), selection, &options, format)?;
            if !all_valid {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Deps { change, json } => {
            let format = if json { OutputFormat::Json } else { config.format };
            run_deps(&project_root, &change, format)
        }
        Command::AcceptCheck { change } => {
            validate_dependencies_for_accept(&change, &project_root)
                .wrap_err_with(|| format!("Change '{change}' is not ready to accept"))?;
            eprintln!(
                "{} Every change required by {} is archived",
                "OK".green().bold(),
                change.cyan()
            );
            Ok(())
        }
    }
}

/// Returns whether every validated item is valid.
fn run_validate(
    project_root: &Path,
    item: Option<&str>,
    selection: ItemSelection,
    options: &BulkOptions,
    format: OutputFormat,
) -> Result<bool> {
    let items: Vec<BulkItem> = match item {
        Some(name) => match find_item(project_root, name) {
            Some(item) => vec![item],
            None => eyre::bail!(
                "No change or spec named '{}' under {}",
                name,
                project_root.display()
            ),
        },
        None => discover(project_root, selection)
            .wrap_err_with(|| format!("Failed to list items under {}", project_root.display()))?,
    };

    if items.is_empty() {
        eprintln!(
            "{} Nothing to validate under {}",
            "!".yellow().bold(),
            project_root.display()
        );
        return Ok(true);
    }

    if format == OutputFormat::Text {
        eprintln!(
            "{} Validating {} item{}...",
            "->".blue().bold(),
            items.len(),
            if items.len() == 1 { "" } else { "s" }
        );
    }

    debug!(
        items = items.len(),
        mode = ?options.mode,
        parallel = options.parallel,
        "validating"
    );
    let results = validate_items(project_root, &items, options, &CancellationToken::new())?;
    print!("{}", render_results(&results, format)?);

    Ok(results.iter().all(|r| r.valid))
}

fn run_deps(project_root: &Path, change: &str, format: OutputFormat) -> Result<()> {
    let report = validate_dependencies(change, project_root)
        .wrap_err_with(|| format!("Failed to check dependencies of '{change}'"))?;
    print!("{}", render_dependency_report(change, &report, format)?);
    if !report.valid {
        std::process::exit(1);
    }
    Ok(())
}
