//! ravendb-ingest command line

mod commands;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use ravendb_ingest::IngestError;
use ravendb_ingest::sampling::SamplingPolicy;

#[derive(Parser)]
#[command(name = "ravendb-ingest", version, about = "Catalog RavenDB databases and infer collection schemas")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run an ingestion recipe against a RavenDB server
    Run {
        /// Recipe file (.yml, .yaml or .toml)
        #[arg(short, long)]
        config: PathBuf,

        /// Connect and infer, but do not write to the sink
        #[arg(long)]
        dry_run: bool,
    },

    /// Infer the schema of exported documents (JSON array or JSON lines)
    Infer {
        /// Documents file
        #[arg(short, long)]
        file: PathBuf,

        /// Collection name used in the record
        #[arg(long, default_value = "Documents")]
        collection: String,

        /// Database name used in the record
        #[arg(long, default_value = "offline")]
        database: String,

        /// Documents to sample, 0 for all
        #[arg(long, default_value_t = 0)]
        sampling_size: usize,

        /// Sampling policy (head, reservoir)
        #[arg(long, default_value = "head")]
        policy: SamplingPolicy,

        /// Seed for reservoir sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Maximum nesting depth
        #[arg(long, default_value_t = 10)]
        max_depth: usize,

        /// Keep the @metadata field in the schema
        #[arg(long)]
        keep_metadata: bool,

        /// Environment used in the dataset URN
        #[arg(long, default_value = "PROD")]
        env: String,

        /// Write the record here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.json_logs, cli.verbose) {
        eprintln!("Failed to initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Run { config, dry_run } => commands::run::handle_run(&config, dry_run).await,
        Command::Infer {
            file,
            collection,
            database,
            sampling_size,
            policy,
            seed,
            max_depth,
            keep_metadata,
            env,
            output,
        } => {
            let args = commands::infer::InferArgs {
                file,
                collection,
                database,
                sampling_size,
                policy,
                seed,
                max_depth,
                remove_metadata: !keep_metadata,
                env,
                output,
            };
            commands::infer::handle_infer(&args).await
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<IngestError>() {
                Some(ingest) => eprintln!("Error: {}", ingest.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
