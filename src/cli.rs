//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "edgeblock")]
#[command(author, version, about = "DNS blocklist compiler for dnsmasq on EdgeOS-style routers")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file path (YAML)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Read the blocklist configuration from a file instead of the router
    #[arg(short, long, global = true)]
    pub file: Option<PathBuf>,

    /// Output directory for dnsmasq files
    #[arg(short, long, global = true)]
    pub dir: Option<PathBuf>,

    /// Quiet mode (for cron/systemd timer)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch sources, write dnsmasq files and reload dnsmasq once
    Update {
        /// Validate configuration and report without writing or reloading
        #[arg(long)]
        dry_run: bool,
    },

    /// Run an update cycle on a fixed interval until interrupted
    Watch {
        /// Polling interval (e.g., 30m, 4h); defaults to the settings value
        #[arg(short, long)]
        interval: Option<String>,
    },

    /// Print the parsed blocklist configuration as JSON
    Show,

    /// Show version
    Version,
}
