//! Error types for edgeblock.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EdgeblockError {
    #[error("Malformed configuration (line {line}): {reason}")]
    MalformedConfig { line: usize, reason: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to purge orphaned files:\n{0}")]
    Purge(PurgeFailures),

    #[error("Reload command '{command}' failed (exit code {code:?}): {output}")]
    Reload {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),
}

impl EdgeblockError {
    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        Self::MalformedConfig {
            line,
            reason: reason.into(),
        }
    }
}

/// Per-source retrieval failure. Never escalates past the fetch stage.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("File not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Unreachable {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("Failed to read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Content too large: {size} bytes (max: {max} bytes)")]
    TooLarge { size: usize, max: usize },
}

/// Removal failures collected across one purge pass.
#[derive(Debug, Default)]
pub struct PurgeFailures(pub Vec<(PathBuf, std::io::Error)>);

impl std::fmt::Display for PurgeFailures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lines: Vec<String> = self
            .0
            .iter()
            .map(|(path, err)| format!("could not remove {:?}: {}", path, err))
            .collect();
        f.write_str(&lines.join("\n"))
    }
}
