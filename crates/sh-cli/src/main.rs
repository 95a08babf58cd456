//! Command-line frontend for the simhost simulation host.

mod commands;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "simhost",
    about = "simhost: load a scene and step its worlds",
    version,
    propagate_version = true
)]
struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a scene and run its worlds
    Run {
        /// Scene file, directory or URI (default: an empty world)
        file: Option<PathBuf>,

        /// Inline scene text instead of a file
        #[arg(short, long, conflicts_with = "file")]
        string: Option<String>,

        /// Steps per world; 0 runs until interrupted
        #[arg(short, long, default_value = "1000")]
        iterations: u64,

        /// Start every world paused
        #[arg(short, long)]
        paused: bool,

        /// Wall-clock milliseconds between steps (default: from physics)
        #[arg(long)]
        period_ms: Option<u64>,

        /// Record every world's state
        #[arg(short, long)]
        record: bool,

        /// Directory for recordings (implies --record)
        #[arg(long)]
        record_path: Option<PathBuf>,

        /// Asset cache directory
        #[arg(long)]
        cache: Option<PathBuf>,

        /// Extra directory to search for scenes and models
        #[arg(long = "resource-path")]
        resource_paths: Vec<PathBuf>,

        /// RNG seed handed to every world
        #[arg(long, default_value = "0")]
        seed: u64,
    },

    /// Validate a scene file and report diagnostics
    Check {
        /// Scene file
        file: PathBuf,
    },

    /// Summarize the worlds of a scene file
    Show {
        /// Scene file
        file: PathBuf,

        /// Print the scene graph as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the version, asset locations and the default world
    Info,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            file,
            string,
            iterations,
            paused,
            period_ms,
            record,
            record_path,
            cache,
            resource_paths,
            seed,
        } => commands::run::run(&commands::run::RunOptions {
            file,
            string,
            iterations,
            paused,
            period_ms,
            record: record || record_path.is_some(),
            record_path,
            cache,
            resource_paths,
            seed,
        }),
        Commands::Check { file } => commands::check::run(&file),
        Commands::Show { file, json } => commands::show::run(&file, json),
        Commands::Info => commands::info::run(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
