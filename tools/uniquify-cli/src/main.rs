//! Uniquify CLI: command-line interface for variant generation and
//! single-video processing.
//!
//! Usage:
//!   uniquify generate <INPUT> [OPTIONS]   Generate N variants as a run
//!   uniquify process <INPUT> -o <OUTPUT>  Process one video
//!   uniquify split <INPUT>                Split into bounded chunks
//!   uniquify merge -o <OUTPUT> <CHUNKS>…  Concatenate chunks
//!   uniquify probe <INPUT>                Show media information
//!   uniquify runs [--run <NAME>]          List runs or show one
//!   uniquify presets                      List filter presets
//!   uniquify publish <RUN> --to <DIR>     Hand a run to the collaborators
//!   uniquify check                        Check system capabilities

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uniquify_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "uniquify",
    about = "Generate perceptually similar, bit-distinct variants of a video",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate variants of one input as a run
    Generate {
        /// Input video
        input: PathBuf,

        /// Number of versions
        #[arg(short = 'n', long)]
        versions: Option<usize>,

        /// Run name (default: run_<timestamp>)
        #[arg(long)]
        run_name: Option<String>,

        /// Effect combination, e.g. `temporal,social`; repeat to build a
        /// palette
        #[arg(long = "combo")]
        combos: Vec<String>,

        /// Process versions one at a time
        #[arg(long)]
        sequential: bool,

        /// Worker pool size
        #[arg(long)]
        workers: Option<usize>,

        /// Run seed for reproducible parameters
        #[arg(long)]
        seed: Option<u64>,

        /// Base output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Process one video without run bookkeeping
    Process {
        /// Input video
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Comma-separated effects, in order
        #[arg(long, default_value = "temporal,visual")]
        effects: String,

        /// Use a filter preset instead of --effects (see `uniquify presets`)
        #[arg(long)]
        preset: Option<String>,

        /// Seed for reproducible parameters
        #[arg(long)]
        seed: Option<u64>,

        /// Process the input whole, however long
        #[arg(long)]
        no_chunking: bool,

        /// Maximum chunk duration (seconds)
        #[arg(long)]
        chunk_secs: Option<f64>,
    },

    /// Split a video into chunks with stream copy
    Split {
        /// Input video
        input: PathBuf,

        /// Directory for chunk files
        #[arg(short, long, default_value = "chunks")]
        output: PathBuf,

        /// Maximum chunk duration (seconds)
        #[arg(long)]
        max_secs: Option<f64>,
    },

    /// Concatenate chunk files, in the given order
    Merge {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Chunk files
        #[arg(required = true)]
        chunks: Vec<PathBuf>,
    },

    /// Show media information
    Probe {
        /// Input video
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List runs, or show one run
    Runs {
        /// Run name
        #[arg(long)]
        run: Option<String>,

        /// Base output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// List filter presets
    Presets,

    /// Deliver, approve and upload a finished run into a local directory
    Publish {
        /// Run name
        run: String,

        /// Upload directory
        #[arg(long)]
        to: PathBuf,

        /// Remote folder inside the upload directory
        #[arg(long, default_value = "uniquify")]
        remote_root: String,

        /// Base output directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Check system capabilities
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };

    // Initialize logging
    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    uniquify_common::logging::init_logging(&logging);

    match cli.command {
        Commands::Generate {
            input,
            versions,
            run_name,
            combos,
            sequential,
            workers,
            seed,
            output_dir,
        } => {
            commands::generate::run(
                &config,
                commands::generate::GenerateArgs {
                    input,
                    versions,
                    run_name,
                    combos,
                    sequential,
                    workers,
                    seed,
                    output_dir,
                },
            )
            .await
        }
        Commands::Process {
            input,
            output,
            effects,
            preset,
            seed,
            no_chunking,
            chunk_secs,
        } => {
            commands::process::run(
                &config,
                input,
                output,
                effects,
                preset,
                seed,
                no_chunking,
                chunk_secs,
            )
            .await
        }
        Commands::Split {
            input,
            output,
            max_secs,
        } => commands::split::run(&config, input, output, max_secs),
        Commands::Merge { output, chunks } => commands::merge::run(output, chunks),
        Commands::Probe { input, json } => commands::probe::run(input, json),
        Commands::Runs {
            run,
            output_dir,
            json,
        } => commands::runs::run(&config, run, output_dir, json),
        Commands::Presets => commands::presets::run(),
        Commands::Publish {
            run,
            to,
            remote_root,
            output_dir,
        } => commands::publish::run(&config, run, to, remote_root, output_dir).await,
        Commands::Check => commands::check::run(&config),
    }
}
