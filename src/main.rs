//! edgeblock - DNS blocklist compiler for dnsmasq
//!
//! Turns the router's blacklist configuration into dnsmasq address files.

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use edgeblock::cli::{Cli, Commands};
use edgeblock::commands::GlobalOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let options = GlobalOptions {
        config: cli.config,
        file: cli.file,
        dir: cli.dir,
    };

    // Execute command
    match cli.command {
        Commands::Update { dry_run } => edgeblock::commands::update::run(&options, dry_run).await,
        Commands::Watch { interval } => {
            edgeblock::commands::watch::run(&options, interval.as_deref()).await
        }
        Commands::Show => edgeblock::commands::show::run(&options).await,
        Commands::Version => {
            println!("edgeblock {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
