//! strata-stress: run the concurrency stress scenarios against the bundled
//! SQLite store.
//!
//! - `strata-stress [run] [flags]`: run scenarios, print the summary, exit
//!   0 on pass, 1 on any failed verdict, 2 on a harness or config error
//! - `strata-stress init [path]`: write a default `stress.toml`

mod commands;
mod format;
mod parse;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use stress_core::{HarnessConfig, HarnessError, HarnessResult, StorageMode};
use stress_harness::{run_passes, RunSummary, ScenarioSelection};
use stress_store::SqliteStore;
use tempfile::TempDir;
use tracing::{info, Level};

use commands::build_cli;
use format::{format_error, format_summary, OutputMode};
use parse::{matches_to_action, CliAction};

const EXIT_PASS: i32 = 0;
const EXIT_FAIL: i32 = 1;
const EXIT_ERROR: i32 = 2;

fn main() {
    let matches = build_cli().get_matches();

    let output_mode = if matches.get_flag("json") {
        OutputMode::Json
    } else {
        OutputMode::Human
    };
    init_logging(log_level(
        matches.get_count("verbose"),
        matches.get_flag("quiet"),
    ));

    let code = match matches_to_action(&matches) {
        Ok(CliAction::Init { path }) => run_init(path, output_mode),
        Ok(CliAction::Run { config, selection }) => match run(&config, selection) {
            Ok(summary) => {
                println!("{}", format_summary(&summary, output_mode));
                if summary.is_success() {
                    EXIT_PASS
                } else {
                    EXIT_FAIL
                }
            }
            Err(e) => {
                eprintln!("{}", format_error(&e, output_mode));
                EXIT_ERROR
            }
        },
        Err(e) => {
            eprintln!("{}", format_error(&e, output_mode));
            EXIT_ERROR
        }
    };
    process::exit(code);
}

fn log_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn run_init(path: PathBuf, mode: OutputMode) -> i32 {
    match HarnessConfig::write_default_if_missing(&path) {
        Ok(()) => {
            eprintln!("Config ready at {}", path.display());
            EXIT_PASS
        }
        Err(e) => {
            eprintln!("{}", format_error(&e, mode));
            EXIT_ERROR
        }
    }
}

fn run(config: &HarnessConfig, selection: ScenarioSelection) -> HarnessResult<RunSummary> {
    let options = config.session_options();
    match config.storage {
        StorageMode::Memory => {
            let store = Arc::new(SqliteStore::in_memory(options)?);
            run_passes(&store, config, selection)
        }
        StorageMode::Persistent => {
            // Without --dir the store lives in a temp dir removed after the run.
            let (dir, _scratch) = match &config.data_dir {
                Some(dir) => (dir.clone(), None),
                None => {
                    let scratch = TempDir::new().map_err(HarnessError::Io)?;
                    (scratch.path().to_path_buf(), Some(scratch))
                }
            };
            info!(target: "stress::runner", dir = %dir.display(), "Using persistent store");
            let store = Arc::new(SqliteStore::persistent(&dir, options)?);
            run_passes(&store, config, selection)
        }
    }
}
