use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "vrl",
    about = "Vehicle Record Ledger: keyed records over an append-only ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger file (overrides the configuration)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Index snapshot file (overrides the configuration)
    #[arg(long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Submitting identity: a 0x address or a label to derive one from
    #[arg(long, global = true)]
    pub identity: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Append a record given as a JSON object
    Append(AppendArgs),
    /// Show the newest record for a key
    Latest(KeyArgs),
    /// Show every record for a key, oldest first
    History(KeyArgs),
    /// Append a tombstone for a key
    Delete(KeyArgs),
    /// List every record on the ledger
    List,
    /// Show the ledger head
    Head,
    /// Discard and rebuild the index for a field
    Rebuild(FieldArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
}

#[derive(Args)]
pub struct AppendArgs {
    /// e.g. '{"vin":"V1","vehicle_make":"Toyota"}'
    pub record: String,
}

#[derive(Args)]
pub struct KeyArgs {
    pub key: String,
    #[arg(short = 'f', long)]
    pub key_field: Option<String>,
}

#[derive(Args)]
pub struct FieldArgs {
    #[arg(short = 'f', long)]
    pub key_field: Option<String>,
}
