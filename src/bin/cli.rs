//! slotkv CLI
//!
//! Command-line interface for inspecting and editing a local slotkv storage.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use slotkv::{Config, StorageKey, Storage, StoreContext, SyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// slotkv CLI
#[derive(Parser, Debug)]
#[command(name = "slotkv-cli")]
#[command(about = "CLI for the slotkv embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./slotkv_data")]
    data_dir: String,

    /// Logical storage name (a directory under the data directory)
    #[arg(short, long, default_value = "default")]
    name: String,

    /// fsync after every slot write
    #[arg(long)]
    sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Add a key-value pair; fails if the key exists
    Add {
        key: String,
        value: String,
    },

    /// Set a key-value pair, overwriting any existing value
    Put {
        key: String,
        value: String,
    },

    /// Delete a key
    Del {
        key: String,
    },

    /// List values with min <= key < max
    Range {
        /// Inclusive lower bound
        #[arg(long)]
        min: Option<String>,

        /// Exclusive upper bound
        #[arg(long)]
        max: Option<String>,

        /// Every key starting with this prefix (overrides --min/--max)
        #[arg(long)]
        prefix: Option<String>,

        /// Maximum number of values
        #[arg(short, long)]
        count: Option<usize>,
    },

    /// Show bucket files and occupancy
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,slotkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> slotkv::Result<ExitCode> {
    let sync_strategy = if args.sync {
        SyncStrategy::SyncData
    } else {
        SyncStrategy::Flush
    };
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .sync_strategy(sync_strategy)
        .build();

    let context = StoreContext::new(config);
    let store = context.open::<String>(&args.name).await?;

    match args.command {
        Commands::Get { key } => match store.get(&key).await? {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("(not found)");
                return Ok(ExitCode::from(1));
            }
        },
        Commands::Add { key, value } => {
            if !store.add(&key, &value).await? {
                eprintln!("key already exists: {}", key);
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Put { key, value } => store.put(&key, &value).await?,
        Commands::Del { key } => {
            if !store.delete(&key).await? {
                eprintln!("(not found)");
                return Ok(ExitCode::from(1));
            }
        }
        Commands::Range {
            min,
            max,
            prefix,
            count,
        } => {
            let (min, max) = match prefix {
                Some(prefix) => {
                    let (lo, hi) = StorageKey::prefix_range(&prefix)?;
                    (Some(lo), Some(hi))
                }
                None => (min, max),
            };
            for value in store.range(min.as_deref(), max.as_deref(), count).await? {
                println!("{}", value);
            }
        }
        Commands::Stats => {
            let report = store.scan_report();
            println!("storage:  {}", store.name());
            println!("dir:      {}", store.dir().display());
            println!("keys:     {}", store.len().await);
            println!("corrupt:  {}", report.corrupt);
            for bucket in store.buckets().await {
                println!("bucket {:>6}: {} slots", bucket.capacity, bucket.count);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}
