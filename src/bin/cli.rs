//! RUStore CLI Client
//!
//! Command-line interface for interacting with RUStore.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rustore::{Client, PutStatus, RemoveStatus};
use tracing_subscriber::{fmt, EnvFilter};

/// RUStore CLI
#[derive(Parser, Debug)]
#[command(name = "rustore-cli")]
#[command(about = "CLI for the RUStore object store")]
struct Args {
    /// Server address, e.g. 127.0.0.1:7000
    #[arg(short, long)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a UTF-8 value under a key
    Put {
        /// The key to store under
        key: String,

        /// The value to store
        value: String,
    },

    /// Store the contents of a file under a key
    PutFile {
        key: String,

        /// File to upload
        path: PathBuf,
    },

    /// Print the object stored under a key
    Get {
        /// The key to fetch
        key: String,
    },

    /// Write the object stored under a key to a file
    GetFile {
        key: String,

        /// Destination file
        path: PathBuf,
    },

    /// Remove a key
    Remove {
        /// The key to remove
        key: String,
    },

    /// List all keys
    List,
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> rustore::Result<()> {
    let mut client = Client::connect(&args.server)?;

    match args.command {
        Commands::Put { key, value } => report_put(&key, client.put(&key, value.as_bytes())?),
        Commands::PutFile { key, path } => report_put(&key, client.put_file(&key, &path)?),
        Commands::Get { key } => match client.get(&key)? {
            Some(data) => println!("{}", String::from_utf8_lossy(&data)),
            None => println!("key \"{}\" does not exist", key),
        },
        Commands::GetFile { key, path } => {
            if client.get_file(&key, &path)? {
                println!("wrote \"{}\" to {}", key, path.display());
            } else {
                println!("key \"{}\" does not exist", key);
            }
        }
        Commands::Remove { key } => match client.remove(&key)? {
            RemoveStatus::Success => println!("removed \"{}\"", key),
            RemoveStatus::KeyNotExists => println!("key \"{}\" does not exist", key),
        },
        Commands::List => {
            let keys = client.list()?;
            if keys.is_empty() {
                println!("(empty)");
            }
            for key in keys {
                println!("{}", key);
            }
        }
    }

    client.disconnect()
}

fn report_put(key: &str, status: PutStatus) {
    match status {
        PutStatus::Success => println!("stored \"{}\"", key),
        PutStatus::KeyAlreadyExists => println!("key \"{}\" already exists", key),
    }
}
