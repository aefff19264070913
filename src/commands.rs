//! Command runner behind the `fileorg` binary.
//!
//! Each subcommand resolves the configuration, builds the components it
//! needs from it and prints a summary on stdout. Soft errors (unreadable
//! entries, files that could not be moved) lower the exit code to
//! [`ExitCode::PartialSuccess`] instead of aborting.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytesize::ByteSize;
use chrono::Utc;
use serde_json::json;

use crate::actions::{move_verified, unique_destination, validate_preserves_copy};
use crate::cache::CacheStore;
use crate::cli::{
    Cli, Commands, DupesArgs, HistoryArgs, OutputFormat, ScanArgs, UndoArgs, WalkArgs,
};
use crate::config::Config;
use crate::duplicates::{DuplicateIndex, KeepStrategy, Selection};
use crate::error::{ExitCode, Interrupted};
use crate::logging::init_logging;
use crate::oplog::{OperationLog, UndoEngine};
use crate::scanner::{ScanOptions, ScanResult, Scanner};
use crate::signal::{install_handler, ShutdownHandler};

/// Run the parsed command line.
///
/// # Errors
///
/// Returns an error if the scanned root is unusable, the operation log
/// cannot be opened, a requested undo is refused, or the command was
/// interrupted (see [`Interrupted`]).
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.state_dir.as_deref());
    log::debug!("State directory: {}", config.state_dir.display());

    let handler = install_handler();
    match cli.command {
        Commands::Scan(args) => run_scan(&config, &args, &handler),
        Commands::Dupes(args) => run_dupes(&config, &args, &handler),
        Commands::History(args) => run_history(&config, &args),
        Commands::Undo(args) => run_undo(&config, &args),
    }
}

/// Scan options from the configuration with command-line overrides applied.
fn scan_options(config: &Config, walk: &WalkArgs) -> ScanOptions {
    let mut options = ScanOptions::from(config);
    options.exclude_dirs.extend(walk.exclude.iter().cloned());
    if walk.no_cache {
        options.use_cache = false;
    }
    if walk.include_hidden {
        options.include_hidden = true;
    }
    if let Some(threads) = walk.threads {
        options = options.with_hash_threads(threads);
    }
    options
}

fn build_scanner(config: &Config, walk: &WalkArgs, handler: &ShutdownHandler) -> Scanner {
    Scanner::new(scan_options(config, walk))
        .with_cache(CacheStore::new(config.cache_dir()))
        .with_shutdown_flag(handler.get_flag())
}

fn scan_root(scanner: &Scanner, path: &Path) -> Result<ScanResult> {
    let result = scanner
        .scan(path)
        .with_context(|| format!("failed to scan {}", path.display()))?;
    if result.interrupted {
        return Err(Interrupted.into());
    }
    for error in &result.errors {
        log::warn!("Skipped: {}", error);
    }
    Ok(result)
}

fn run_scan(config: &Config, args: &ScanArgs, handler: &ShutdownHandler) -> Result<ExitCode> {
    let scanner = build_scanner(config, &args.walk, handler);
    let result = scan_root(&scanner, &args.walk.path)?;

    match args.output {
        OutputFormat::Text => {
            println!(
                "Scanned {} files ({}) under {} in {:.2?}{}",
                result.records.len(),
                ByteSize::b(result.total_size()),
                result.root.display(),
                result.duration,
                if result.from_cache { " (from cache)" } else { "" }
            );
            if result.error_count > 0 {
                println!("{} entries could not be read", result.error_count);
            }
        }
        OutputFormat::Json => print_json(&json!({
            "root": result.root,
            "files": result.records.len(),
            "total_size": result.total_size(),
            "hashed": result.hashed_count(),
            "from_cache": result.from_cache,
            "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
        }))?,
    }

    Ok(if result.error_count > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_dupes(config: &Config, args: &DupesArgs, handler: &ShutdownHandler) -> Result<ExitCode> {
    let scanner = build_scanner(config, &args.walk, handler);
    let result = scan_root(&scanner, &args.walk.path)?;
    let scan_errors = result.error_count;

    let index = DuplicateIndex::new()
        .with_hash_threads(scanner.options().hash_threads)
        .with_shutdown_flag(handler.get_flag());
    let outcome = index.build(&result.records);
    if outcome.interrupted {
        return Err(Interrupted.into());
    }
    for error in &outcome.errors {
        log::warn!("Not compared: {}", error);
    }

    if outcome.stats.hashed_files > 0 {
        let hashed = result.with_records(outcome.records);
        if let Err(e) = scanner.persist(&hashed) {
            log::warn!("Failed to save computed hashes: {}", e);
        }
    }

    let strategy = args.keep.unwrap_or(config.keep_strategy);
    let selections: Vec<Selection> = outcome
        .groups
        .into_iter()
        .filter_map(|group| Selection::resolve(group, strategy))
        .collect();

    match args.output {
        OutputFormat::Text => print_selections(&selections, strategy),
        OutputFormat::Json => print_json(&json!({
            "strategy": strategy,
            "groups": selections.iter().map(|s| json!({
                "hash": s.group.hash_hex(),
                "size": s.group.size,
                "keep": s.keeper,
                "candidates": s.candidates,
            })).collect::<Vec<_>>(),
            "duplicate_files": outcome.stats.duplicate_files,
            "wasted_space": outcome.stats.wasted_space,
        }))?,
    }

    if selections.is_empty() {
        return Ok(ExitCode::NothingFound);
    }

    let mut soft_errors = scan_errors + outcome.stats.hash_errors;
    if let Some(dir) = &args.move_to {
        let batch = args
            .batch
            .clone()
            .unwrap_or_else(|| format!("dupes-{}", Utc::now().format("%Y%m%dT%H%M%S")));
        let log = open_log(config)?;
        let (moved, failed) = move_candidates(&log, &selections, dir, &batch, handler)?;
        soft_errors += failed;
        println!(
            "Moved {} files to {} (batch {}); undo with `fileorg undo --batch {}`",
            moved,
            dir.display(),
            batch,
            batch
        );
    }

    Ok(if soft_errors > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn print_selections(selections: &[Selection], strategy: KeepStrategy) {
    if selections.is_empty() {
        println!("No duplicates found");
        return;
    }
    for selection in selections {
        println!(
            "{} x {} ({})",
            selection.group.len(),
            ByteSize::b(selection.group.size),
            &selection.group.hash_hex()[..16]
        );
        println!("  keep    {}", selection.keeper.path.display());
        for candidate in &selection.candidates {
            println!("  extra   {}", candidate.path.display());
        }
    }
    let wasted: u64 = selections.iter().map(|s| s.group.wasted_space()).sum();
    println!(
        "{} groups, {} reclaimable (keeping {})",
        selections.len(),
        ByteSize::b(wasted),
        strategy
    );
}

/// Move every candidate into `dir` under `batch`. Returns (moved, failed).
fn move_candidates(
    log: &OperationLog,
    selections: &[Selection],
    dir: &Path,
    batch: &str,
    handler: &ShutdownHandler,
) -> Result<(usize, usize)> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;

    let mut moved = 0;
    let mut failed = 0;
    for selection in selections {
        let selected: Vec<PathBuf> = selection.candidates.iter().map(|c| c.path.clone()).collect();
        validate_preserves_copy(&selection.group.paths(), &selected)?;

        for candidate in &selection.candidates {
            if handler.is_shutdown_requested() {
                log::warn!("Stopped after moving {} files", moved);
                return Err(Interrupted.into());
            }
            let Some(name) = candidate.path.file_name() else {
                continue;
            };
            let destination = unique_destination(dir, name);
            match move_verified(log, candidate, &destination, Some(batch)) {
                Ok(op) => {
                    log::debug!("Recorded {}", op);
                    moved += 1;
                }
                Err(e) => {
                    log::warn!("Not moved: {}", e);
                    failed += 1;
                }
            }
        }
    }
    Ok((moved, failed))
}

fn open_log(config: &Config) -> Result<OperationLog> {
    let path = config.log_path();
    let log = OperationLog::open(&path)
        .with_context(|| format!("failed to open operation log {}", path.display()))?;
    Ok(log.with_content_fingerprints(config.verify_content_on_undo))
}

fn run_history(config: &Config, args: &HistoryArgs) -> Result<ExitCode> {
    let log = open_log(config)?;
    let operations = if args.all {
        log.list_recent(args.limit)?
    } else {
        log.list_undoable(args.limit)?
    };

    match args.output {
        OutputFormat::Json => print_json(&operations)?,
        OutputFormat::Text if operations.is_empty() => println!("No operations recorded"),
        OutputFormat::Text => {
            for op in &operations {
                let batch = op.batch.as_deref().map(|b| format!(" ({b})")).unwrap_or_default();
                println!("{}  {}{}", op.timestamp.format("%Y-%m-%d %H:%M:%S"), op, batch);
            }
            if args.all {
                let stats = log.stats()?;
                println!(
                    "{} operations: {} pending, {} undone, {} failed",
                    stats.total, stats.pending, stats.undone, stats.failed
                );
            }
        }
    }

    Ok(if operations.is_empty() {
        ExitCode::NothingFound
    } else {
        ExitCode::Success
    })
}

fn run_undo(config: &Config, args: &UndoArgs) -> Result<ExitCode> {
    let log = open_log(config)?;
    let engine = UndoEngine::new(&log);

    if let Some(batch) = &args.batch {
        return undo_batch(&log, &engine, batch, args.dry_run);
    }

    let id = if args.last {
        match log.list_undoable(1)?.first() {
            Some(op) => op.id,
            None => {
                println!("Nothing to undo");
                return Ok(ExitCode::NothingFound);
            }
        }
    } else {
        args.id.context("an operation id, --batch or --last is required")?
    };

    if args.dry_run {
        let op = engine.check(id)?;
        println!("Would undo {}", op);
    } else {
        let op = engine.undo(id)?;
        println!("Undone {}", op);
    }
    Ok(ExitCode::Success)
}

fn undo_batch(
    log: &OperationLog,
    engine: &UndoEngine<'_>,
    batch: &str,
    dry_run: bool,
) -> Result<ExitCode> {
    if dry_run {
        let pending = log.list_undoable_in_batch(batch)?;
        if pending.is_empty() {
            println!("Nothing to undo in batch {}", batch);
            return Ok(ExitCode::NothingFound);
        }
        let mut blocked = 0;
        for op in &pending {
            match engine.check(op.id) {
                Ok(op) => println!("Would undo {}", op),
                Err(e) => {
                    println!("Cannot undo #{}: {}", op.id, e);
                    blocked += 1;
                }
            }
        }
        return Ok(if blocked > 0 {
            ExitCode::PartialSuccess
        } else {
            ExitCode::Success
        });
    }

    let report = engine.undo_batch(batch)?;
    if report.undone_count() == 0 && report.failed_count() == 0 {
        println!("Nothing to undo in batch {}", batch);
        return Ok(ExitCode::NothingFound);
    }
    for op in &report.undone {
        println!("Undone {}", op);
    }
    for error in &report.failed {
        println!("Failed: {}", error);
    }
    println!(
        "Batch {}: {} undone, {} failed",
        batch,
        report.undone_count(),
        report.failed_count()
    );
    Ok(if report.is_complete() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    })
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}
