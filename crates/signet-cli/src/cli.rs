use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "signet",
    about = "Signet: resolve encoded object tokens into signed URLs",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Encode an object reference into a token
    Encode(EncodeArgs),
    /// Decode a token and show its object reference
    Decode(DecodeArgs),
    /// Check that a cache key has the app|project|key shape
    CheckKey(CheckKeyArgs),
    /// Resolve tokens into signed URLs
    Resolve(ResolveArgs),
    /// Start the HTTP server
    Serve(ServeArgs),
}

#[derive(Args)]
pub struct EncodeArgs {
    #[arg(long)]
    pub bucket: String,
    #[arg(long)]
    pub object: String,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub region: Option<String>,
}

#[derive(Args)]
pub struct DecodeArgs {
    pub token: String,
}

#[derive(Args)]
pub struct CheckKeyArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// TOML config file; defaults apply when absent
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// URL validity in seconds; defaults to the configured expiry
    #[arg(long)]
    pub expiry: Option<u64>,
    #[arg(required = true)]
    pub tokens: Vec<String>,
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Overrides `server.bind_addr` from the config
    #[arg(long)]
    pub bind: Option<String>,
}
