//! ArgMatches → harness settings.
//!
//! Precedence: built-in defaults, then `--config`, then command-line flags.

use std::path::PathBuf;

use clap::ArgMatches;
use stress_core::{HarnessConfig, HarnessError, HarnessResult, StorageMode, StoreErrorKind};
use stress_harness::ScenarioSelection;

/// What the CLI was asked to do.
#[derive(Debug)]
pub enum CliAction {
    /// Run scenarios with a fully resolved config
    Run {
        config: HarnessConfig,
        selection: ScenarioSelection,
    },
    /// Write a default config file
    Init { path: PathBuf },
}

/// Resolve parsed arguments into an action.
pub fn matches_to_action(matches: &ArgMatches) -> HarnessResult<CliAction> {
    match matches.subcommand() {
        Some(("init", sub)) => {
            let path = sub
                .get_one::<String>("path")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(stress_core::CONFIG_FILE_NAME));
            Ok(CliAction::Init { path })
        }
        Some(("run", sub)) => resolve_run(matches, Some(sub)),
        Some((other, _)) => Err(HarnessError::Config(format!("unknown command '{}'", other))),
        None => resolve_run(matches, None),
    }
}

fn resolve_run(matches: &ArgMatches, run: Option<&ArgMatches>) -> HarnessResult<CliAction> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => HarnessConfig::from_file(&PathBuf::from(path))?,
        None => HarnessConfig::default(),
    };
    if let Some(dir) = matches.get_one::<String>("dir") {
        config.data_dir = Some(PathBuf::from(dir));
    }

    let mut selection = ScenarioSelection::default();
    if let Some(run) = run {
        apply_overrides(&mut config, run)?;
        if let Some(name) = run.get_one::<String>("scenario") {
            selection = name.parse()?;
        }
    }

    config.validate()?;
    Ok(CliAction::Run { config, selection })
}

fn apply_overrides(config: &mut HarnessConfig, run: &ArgMatches) -> HarnessResult<()> {
    if let Some(&threads) = run.get_one::<usize>("threads") {
        config.threads = threads;
    }
    if let Some(&rows) = run.get_one::<u32>("rows") {
        config.row_count = rows;
    }
    if let Some(&ms) = run.get_one::<u64>("duration-ms") {
        config.duration_ms = ms;
    }
    if let Some(&ms) = run.get_one::<u64>("lock-timeout-ms") {
        config.lock_timeout_ms = ms;
    }
    if let Some(storage) = run.get_one::<String>("storage") {
        config.storage = storage.parse::<StorageMode>()?;
    }
    if let Some(&issuers) = run.get_one::<usize>("issuers") {
        config.shutdown_issuers = issuers;
    }
    if let Some(&passes) = run.get_one::<usize>("passes") {
        config.passes = passes;
    }
    if let Some(&seed) = run.get_one::<u64>("seed") {
        config.seed_base = seed;
    }
    if let Some(kinds) = run.get_many::<String>("acceptable") {
        config.acceptable_errors = kinds
            .map(|kind| kind.parse::<StoreErrorKind>())
            .collect::<HarnessResult<Vec<_>>>()?;
    }
    Ok(())
}
