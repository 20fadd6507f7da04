use clap::Parser;
use std::path::PathBuf;

use super::commands::Commands;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct CliArgs {
    /// Policy file overlaying the builtin defaults
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory of site profile files merged over the builtins
    #[arg(short, long, value_name = "DIR")]
    pub profiles: Option<PathBuf>,

    /// Credential file (defaults to the per-user config directory)
    #[arg(long, value_name = "FILE")]
    pub credentials: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}
