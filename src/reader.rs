//! Providers of raw configuration text.
//!
//! The pipeline only sees [`ConfigReader::read`]; whether the text comes
//! from the router's live configuration API, a saved file or a fixed string
//! is decided once at startup.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::cmd_abstraction::{CommandExecutor, CommandOutput};
use crate::config::Settings;
use crate::fs_abstraction::FileSystem;
use crate::utils::truncate;

pub trait ConfigReader: Send + Sync {
    fn read(&self) -> Result<String>;
}

/// Reads the configuration through the router's CLI shell API
/// (`cli-shell-api showCfg service dns forwarding`).
///
/// Inside a configuration session the API only answers `showConfig`, so the
/// verb is picked per read by asking `cli-shell-api inSession` first.
pub struct SessionReader {
    executor: Arc<dyn CommandExecutor>,
    api: String,
    level: String,
}

impl SessionReader {
    pub fn new(executor: Arc<dyn CommandExecutor>, settings: &Settings) -> Self {
        Self {
            executor,
            api: settings.config_api.clone(),
            level: settings.config_level.clone(),
        }
    }

    /// An `inSession` query that cannot run counts as "not in a session".
    fn in_session(&self) -> bool {
        match self.executor.execute(&self.api, &["inSession".to_string()]) {
            Ok(output) => output.success,
            Err(e) => {
                debug!("{} inSession failed: {:#}", self.api, e);
                false
            }
        }
    }

    fn verb(in_session: bool) -> &'static str {
        if in_session {
            "showConfig"
        } else {
            "showCfg"
        }
    }

    fn args(&self, verb: &str) -> Vec<String> {
        std::iter::once(verb)
            .chain(self.level.split_whitespace())
            .map(str::to_string)
            .collect()
    }
}

impl ConfigReader for SessionReader {
    fn read(&self) -> Result<String> {
        let verb = Self::verb(self.in_session());
        let CommandOutput {
            stdout,
            stderr,
            success,
            code,
        } = self
            .executor
            .execute(&self.api, &self.args(verb))
            .with_context(|| format!("Failed to query configuration via {}", self.api))?;

        if !success {
            anyhow::bail!(
                "{} {} {} exited with {:?}: {}",
                self.api,
                verb,
                self.level,
                code,
                truncate(stderr.trim(), 200)
            );
        }

        Ok(stdout)
    }
}

/// Reads a saved configuration file (e.g. `/config/config.boot`).
pub struct FileReader {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileReader {
    pub fn new(fs: Arc<dyn FileSystem>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }
}

impl ConfigReader for FileReader {
    fn read(&self) -> Result<String> {
        self.fs
            .read_to_string(&self.path)
            .with_context(|| format!("Failed to read configuration file {:?}", self.path))
    }
}

/// Fixed configuration text, used by tests and dry runs.
#[derive(Debug, Clone)]
pub struct StaticReader {
    text: String,
}

impl StaticReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl ConfigReader for StaticReader {
    fn read(&self) -> Result<String> {
        Ok(self.text.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd_abstraction::MockCommandExecutor;
    use crate::fs_abstraction::MockFileSystem;
    use std::io;

    #[test]
    fn test_static_reader() {
        let reader = StaticReader::new("hosts {\n}\n");
        assert_eq!(reader.read().unwrap(), "hosts {\n}\n");
        // Repeatable
        assert_eq!(reader.read().unwrap(), "hosts {\n}\n");
    }

    fn expect_in_session(mock: &mut MockCommandExecutor, active: bool) {
        mock.expect_execute()
            .withf(|cmd, args| cmd == "/bin/cli-shell-api" && args == ["inSession"])
            .times(1)
            .returning(move |_, _| {
                Ok(CommandOutput {
                    success: active,
                    code: Some(if active { 0 } else { 1 }),
                    ..Default::default()
                })
            });
    }

    fn expect_show(mock: &mut MockCommandExecutor, verb: &'static str) {
        mock.expect_execute()
            .withf(move |cmd, args| {
                cmd == "/bin/cli-shell-api" && args == [verb, "service", "dns", "forwarding"]
            })
            .times(1)
            .returning(|_, _| {
                Ok(CommandOutput {
                    stdout: "blacklist {\n}\n".to_string(),
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            });
    }

    #[test]
    fn test_session_reader_queries_level() {
        let mut mock = MockCommandExecutor::new();
        expect_in_session(&mut mock, false);
        expect_show(&mut mock, "showCfg");

        let reader = SessionReader::new(Arc::new(mock), &Settings::default());
        assert_eq!(reader.read().unwrap(), "blacklist {\n}\n");
    }

    #[test]
    fn test_session_reader_uses_show_config_in_session() {
        let mut mock = MockCommandExecutor::new();
        expect_in_session(&mut mock, true);
        expect_show(&mut mock, "showConfig");

        let reader = SessionReader::new(Arc::new(mock), &Settings::default());
        assert_eq!(reader.read().unwrap(), "blacklist {\n}\n");
    }

    #[test]
    fn test_session_reader_session_query_error_uses_show_cfg() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute()
            .withf(|_, args| args == ["inSession"])
            .returning(|_, _| Err(anyhow::anyhow!("No such file or directory")));
        expect_show(&mut mock, "showCfg");

        let reader = SessionReader::new(Arc::new(mock), &Settings::default());
        assert!(reader.read().is_ok());
    }

    #[test]
    fn test_session_reader_failure() {
        let mut mock = MockCommandExecutor::new();
        mock.expect_execute().returning(|_, _| {
            Ok(CommandOutput {
                stderr: "Specified configuration path is not valid".to_string(),
                success: false,
                code: Some(1),
                ..Default::default()
            })
        });

        let reader = SessionReader::new(Arc::new(mock), &Settings::default());
        let err = reader.read().unwrap_err();
        assert!(err.to_string().contains("not valid"));
    }

    #[test]
    fn test_file_reader_missing_file() {
        let mut mock = MockFileSystem::new();
        mock.expect_read_to_string()
            .returning(|_| Err(io::Error::new(io::ErrorKind::NotFound, "missing")));

        let reader = FileReader::new(Arc::new(mock), "/config/config.boot");
        let err = reader.read().unwrap_err();
        assert!(err.to_string().contains("config.boot"));
    }
}
