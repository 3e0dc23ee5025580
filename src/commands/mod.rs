//! CLI command implementations.

pub mod show;
pub mod update;
pub mod watch;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::cmd_abstraction::{CommandExecutor, RealCommandExecutor};
use crate::config::Settings;
use crate::fs_abstraction::{FileSystem, RealFileSystem};
use crate::pipeline::Pipeline;
use crate::reader::{ConfigReader, FileReader, SessionReader};

/// Settings file read when `--config` is not given and it exists.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/edgeblock/edgeblock.yaml";

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub file: Option<PathBuf>,
    pub dir: Option<PathBuf>,
}

impl GlobalOptions {
    /// Defaults, then the settings file, then command-line overrides.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)
                .with_context(|| format!("Failed to load settings from {:?}", path))?,
            None if Path::new(DEFAULT_SETTINGS_PATH).exists() => {
                debug!("Using settings from {}", DEFAULT_SETTINGS_PATH);
                Settings::load(DEFAULT_SETTINGS_PATH)?
            }
            None => Settings::default(),
        };

        if let Some(dir) = &self.dir {
            settings.dir = dir.clone();
        }
        settings.validate()?;
        Ok(settings)
    }

    /// The router's live configuration unless `--file` was given.
    pub fn reader(
        &self,
        settings: &Settings,
        fs: Arc<dyn FileSystem>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Arc<dyn ConfigReader> {
        match &self.file {
            Some(path) => Arc::new(FileReader::new(fs, path.clone())),
            None => Arc::new(SessionReader::new(executor, settings)),
        }
    }

    /// Wire a pipeline against the real filesystem and process runner.
    pub fn pipeline(&self, settings: Settings) -> Result<Pipeline> {
        let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
        let executor: Arc<dyn CommandExecutor> = Arc::new(RealCommandExecutor::new());
        let reader = self.reader(&settings, Arc::clone(&fs), Arc::clone(&executor));
        Pipeline::new(settings, reader, fs, executor)
    }
}
