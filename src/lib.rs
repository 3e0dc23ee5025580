//! # edgeblock - DNS blocklist compiler for dnsmasq
//!
//! Reads the blacklist section of a router's nested-block configuration,
//! fetches the listed sources, filters them against include and exclude
//! rules and writes dnsmasq `address=/name/ip` files, one per rule group and
//! source kind. Files left behind by disabled sources are removed and dnsmasq
//! is reloaded after every cycle.
//!
//! ## Features
//!
//! - **Live configuration** - Re-reads the router configuration every cycle
//! - **Concurrent fetching** - Bounded worker pool, per-request timeouts
//! - **Wildcard rules** - `*.example.com` and `ads.*` include/exclude patterns
//! - **Deterministic output** - Entries sorted, first-seen IP wins on duplicates
//! - **Atomic writes** - dnsmasq never reads a half-written file
//! - **Orphan cleanup** - Only files this tool could have produced are touched
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        edgeblock                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: update, watch, show, version               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scheduler (tokio interval + watch channel)                 │
//! │    └── Once, DryRun, Every(interval)                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline                                                   │
//! │    ├── Reader: router API, file, static text                │
//! │    ├── Parser: text -> ConfigTree                           │
//! │    ├── Factory: enabled sources split by kind               │
//! │    ├── Fetcher (reqwest + rustls): file, inline, URL        │
//! │    ├── Filter: normalize, dedup, exclude/include            │
//! │    ├── Compiler: address files per group and kind           │
//! │    ├── Purge: remove orphaned files                         │
//! │    └── Reload: shell -c "service dnsmasq restart"           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use edgeblock::cmd_abstraction::RealCommandExecutor;
//! use edgeblock::config::Settings;
//! use edgeblock::fs_abstraction::RealFileSystem;
//! use edgeblock::pipeline::{Mode, Pipeline};
//! use edgeblock::reader::StaticReader;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = r#"
//! blacklist {
//!     dns-redirect-ip 0.0.0.0
//!     domains {
//!         include adsrvr.org
//!     }
//! }
//! "#;
//!
//!     let pipeline = Pipeline::new(
//!         Settings::default(),
//!         Arc::new(StaticReader::new(config)),
//!         Arc::new(RealFileSystem),
//!         Arc::new(RealCommandExecutor::new()),
//!     )?;
//!     let report = pipeline.run_cycle(Mode::DryRun).await?;
//!     println!("{}", report);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - Process execution seam
//! - [`commands`] - CLI command implementations
//! - [`compiler`] - dnsmasq file rendering and atomic writes
//! - [`config`] - Settings loading and validation
//! - [`error`] - Error types
//! - [`factory`] - Source partitioning by kind
//! - [`fetcher`] - File, inline and HTTP source retrieval
//! - [`filter`] - Normalization, dedup and include/exclude matching
//! - [`fs_abstraction`] - Filesystem seam
//! - [`lock`] - File locking for concurrent execution prevention
//! - [`model`] - Typed configuration tree
//! - [`parser`] - Router configuration parser
//! - [`pipeline`] - One complete update cycle
//! - [`purge`] - Orphaned file removal
//! - [`reader`] - Configuration text providers
//! - [`reload`] - dnsmasq reload
//! - [`scheduler`] - Single-shot and polling execution
//! - [`signal`] - Graceful shutdown signal handling
//! - [`utils`] - Common utility functions (formatting, truncation)

pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod compiler;
pub mod config;
pub mod error;
pub mod factory;
pub mod fetcher;
pub mod filter;
pub mod fs_abstraction;
pub mod lock;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod purge;
pub mod reader;
pub mod reload;
pub mod scheduler;
pub mod signal;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Settings;
pub use error::{EdgeblockError, FetchError};
pub use model::{ConfigTree, Entry, RuleGroup, Source, SourceKind};
