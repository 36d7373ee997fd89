//! Command-line entry point for the cloud classification pipeline.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use cloudcls::acquire;
use cloudcls::config::load_config;
use cloudcls::dataset::csv_io::{read_csv, write_csv};
use cloudcls::error::PipelineError;
use cloudcls::features::generate_features;
use cloudcls::http_client::RetryConfig;
use cloudcls::{logging, pipeline, storage};

#[derive(Parser)]
#[command(name = "cloudcls")]
#[command(about = "Cloud classification batch pipeline", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage and write artifacts into a new run directory
    Run {
        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Root for run directories; defaults to `run.output` from the config
        #[arg(short, long)]
        artifacts: Option<PathBuf>,
    },

    /// Download raw data to a local file
    Acquire {
        /// Source URL
        #[arg(short, long)]
        url: String,

        /// Destination file
        #[arg(short, long)]
        out: PathBuf,

        /// Maximum number of attempts
        #[arg(long, default_value = "4")]
        attempts: usize,
    },

    /// Generate features for an existing CSV dataset
    Features {
        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Input CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Output CSV
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Upload a directory to the configured bucket
    Upload {
        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Directory to upload
        #[arg(short, long)]
        dir: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = logging::init() {
        eprintln!("Logging disabled: {err}");
    }
    if let Err(err) = run(cli.command) {
        tracing::error!("{err}");
        eprintln!("{err}");
        std::process::exit(err.exit_code());
    }
}

fn run(command: Commands) -> Result<(), PipelineError> {
    match command {
        Commands::Run { config, artifacts } => {
            let config = load_config(&config)?;
            let root = artifacts.unwrap_or_else(|| config.run.output.clone());
            let run_dir = pipeline::run(&config, &root)?;
            println!("{}", run_dir.display());
        }
        Commands::Acquire { url, out, attempts } => {
            let retry = RetryConfig {
                max_attempts: attempts.max(1),
                ..RetryConfig::default()
            };
            acquire::acquire_data(&url, &out, retry)?;
        }
        Commands::Features { config, input, out } => {
            let config = load_config(&config)?;
            let dataset = read_csv(&input)?;
            let features = generate_features(dataset, &config.generate_features)?;
            write_csv(&features, &out)?;
        }
        Commands::Upload { config, dir } => {
            let config = load_config(&config)?;
            for locator in storage::upload_artifacts(&dir, &config.aws)? {
                println!("{locator}");
            }
        }
    }
    Ok(())
}
