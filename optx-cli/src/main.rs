//! Command-line interface for optx
//! Applies operation documents (`.op` files and markdown with ```op blocks) to a project tree.
//!
//! Usage:
//!   optx `<doc>...` [--root `<dir>`]               - Apply documents, in order
//!   optx --dir `<dir>` [--recursive]               - Apply every document in a directory
//!   optx `<doc>` --dry-run --verbose               - Show what would happen, with the full trail
//!   optx --list-languages                          - List registered language capabilities
//!
//! Exit status is 0 when every document committed (or would commit), 1 when any document did
//! not, and 2 for usage or configuration errors.

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use optx_config::{Loader, OptxConfig};
use optx_exec::{
    cleanup_stale_artifacts, collect_documents, render_summary, BatchDriver, BatchOptions,
    DiskWorkspace, DocumentSource, ExecutionReport, Outcome, Workspace,
};
use optx_lang::CapabilityRegistry;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Project-local configuration picked up from the root when present
const LOCAL_CONFIG: &str = "optx.toml";

fn build_cli() -> Command {
    Command::new("optx")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Apply operation documents to a project, all or nothing")
        .arg_required_else_help(true)
        .arg(
            Arg::new("paths")
                .help("Operation documents (.op, .md) to apply, in order")
                .value_parser(value_parser!(PathBuf))
                .num_args(1..)
                .index(1),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .short('d')
                .help("Apply every document found in this directory")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("recursive")
                .long("recursive")
                .short('r')
                .help("Descend into subdirectories of --dir")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("root")
                .long("root")
                .help("Project root that targets are relative to")
                .value_parser(value_parser!(PathBuf))
                .default_value("."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file layered over the defaults and <root>/optx.toml")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .short('n')
                .help("Plan everything, write nothing")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Show every transaction and the diagnostic trail of failed documents")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("continue-on-error")
                .long("continue-on-error")
                .short('k')
                .help("Keep running the remaining documents after one fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("jobs")
                .long("jobs")
                .short('j')
                .help("Documents processed at the same time")
                .value_parser(value_parser!(u16).range(1..)),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Let create replace existing files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("partial")
                .long("partial")
                .help("Apply the valid transactions of a document and skip the failing ones")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .help("Per-document deadline in seconds")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .help("Report format")
                .value_parser(["text", "json"])
                .default_value("text"),
        )
        .arg(
            Arg::new("list-languages")
                .long("list-languages")
                .help("List the registered language capabilities and exit")
                .action(ArgAction::SetTrue),
        )
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

/// Log to stderr; `--verbose` wins over RUST_LOG
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(matches: &ArgMatches) -> Result<ExitCode> {
    let root = matches
        .get_one::<PathBuf>("root")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let config = load_config(matches, &root)?;
    let registry = config
        .languages
        .build_registry()
        .context("invalid language configuration")?;

    if matches.get_flag("list-languages") {
        print_languages(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let sources = gather_sources(matches, config.execution.recursive)?;
    let workspace = DiskWorkspace::new(&root)
        .with_context(|| format!("cannot open project root {}", root.display()))?;

    if config.staging.cleanup_on_start {
        let removed = cleanup_stale_artifacts(workspace.root(), config.staging.stale_after())
            .context("failed to clean up staging artifacts")?;
        if !removed.is_empty() {
            eprintln!("removed {} stale staging file(s)", removed.len());
        }
    }

    let verbose = matches.get_flag("verbose");
    let options = BatchOptions {
        dry_run: config.execution.dry_run,
        verbose,
        continue_on_error: config.execution.continue_on_error,
        max_parallelism: config.execution.max_parallelism,
        timeout: config.execution.timeout(),
        allow_overwrite: config.execution.allow_overwrite,
        partial_apply: config.execution.partial_apply,
    };
    tracing::debug!(
        documents = sources.len(),
        root = %workspace.root().display(),
        ?options,
        "starting batch"
    );
    let driver = BatchDriver::new(workspace, registry, options);
    let reports = driver.run_all(&sources);

    match matches.get_one::<String>("format").map(String::as_str) {
        Some("json") => {
            let json = serde_json::to_string_pretty(&reports).context("failed to encode reports")?;
            println!("{json}");
        }
        _ => print_reports(&reports, verbose),
    }

    if reports.len() < sources.len() {
        eprintln!(
            "{} document(s) not run after an earlier failure",
            sources.len() - reports.len()
        );
    }

    let success = reports.iter().all(ExecutionReport::is_success);
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Defaults, then `<root>/optx.toml`, then `--config`, then flags
fn load_config(matches: &ArgMatches, root: &Path) -> Result<OptxConfig> {
    let mut loader = Loader::new().with_optional_file(root.join(LOCAL_CONFIG));
    if let Some(path) = matches.get_one::<PathBuf>("config") {
        loader = loader.with_file(path);
    }

    let flags = [
        ("dry-run", "execution.dry-run"),
        ("continue-on-error", "execution.continue-on-error"),
        ("overwrite", "execution.allow-overwrite"),
        ("partial", "execution.partial-apply"),
        ("recursive", "execution.recursive"),
    ];
    for (flag, key) in flags {
        if matches.get_flag(flag) {
            loader = loader.set_override(key, true)?;
        }
    }
    if let Some(&jobs) = matches.get_one::<u16>("jobs") {
        loader = loader.set_override("execution.max-parallelism", i64::from(jobs))?;
    }
    if let Some(&secs) = matches.get_one::<u32>("timeout") {
        loader = loader.set_override("execution.timeout-secs", i64::from(secs))?;
    }

    loader.build().context("failed to load configuration")
}

fn gather_sources(matches: &ArgMatches, recursive: bool) -> Result<Vec<DocumentSource>> {
    let mut sources: Vec<DocumentSource> = matches
        .get_many::<PathBuf>("paths")
        .into_iter()
        .flatten()
        .cloned()
        .map(DocumentSource::File)
        .collect();

    if let Some(dir) = matches.get_one::<PathBuf>("dir") {
        sources.extend(collect_documents(dir, recursive)?);
    }
    if sources.is_empty() {
        bail!("no operation documents given");
    }
    Ok(sources)
}

fn print_reports(reports: &[ExecutionReport], verbose: bool) {
    for report in reports {
        println!("{}", render_summary(report, verbose));
        for path in report.changed_paths() {
            println!("  changed: {}", path.display());
        }
        if report.outcome == Outcome::WouldCommit {
            for path in &report.touched {
                println!("  would change: {}", path.display());
            }
        }
    }
}

fn print_languages(registry: &CapabilityRegistry) {
    println!("Registered language capabilities:\n");
    for (key, name) in registry.entries() {
        println!("  {key:<12} {name}");
    }
    println!("\nAnything else is passed through unchanged.");
}
