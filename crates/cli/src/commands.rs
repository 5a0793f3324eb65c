//! Clap command tree definition.

use clap::{Arg, ArgAction, Command};

/// Build the complete CLI command tree.
pub fn build_cli() -> Command {
    Command::new("strata-stress")
        .about("Concurrency-correctness harness for transactional stores")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Load settings from a stress.toml file")
                .global(true),
        )
        .arg(
            Arg::new("dir")
                .long("dir")
                .help("Directory for the persistent store (default: a temp dir)")
                .global(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the run summary and failure log as JSON")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("More log output (repeatable)")
                .action(ArgAction::Count)
                .conflicts_with("quiet")
                .global(true),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Only log errors")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(build_run())
        .subcommand(build_init())
}

fn build_run() -> Command {
    Command::new("run")
        .about("Run stress scenarios (the default when no subcommand is given)")
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .short('s')
                .help("Scenario to run: contention, shutdown or all")
                .default_value("all"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .short('t')
                .help("Number of contention workers")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("rows")
                .long("rows")
                .help("Size of the contended key space")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new("duration-ms")
                .long("duration-ms")
                .help("How long contention workers run, in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("lock-timeout-ms")
                .long("lock-timeout-ms")
                .help("Store lock timeout, in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("storage")
                .long("storage")
                .help("Storage mode: memory or persistent"),
        )
        .arg(
            Arg::new("issuers")
                .long("issuers")
                .help("Shutdown issuers racing the writer")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("passes")
                .long("passes")
                .short('p')
                .help("Repeat the selected scenarios this many times")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed base; worker i of pass 1 uses seed + i")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("acceptable")
                .long("acceptable")
                .help("Store error kind contention workers may tolerate (repeatable)")
                .action(ArgAction::Append),
        )
}

fn build_init() -> Command {
    Command::new("init")
        .about("Write a default stress.toml if none exists")
        .arg(Arg::new("path").help("Target file (default: ./stress.toml)"))
}
