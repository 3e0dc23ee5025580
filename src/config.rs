//! Runtime settings for edgeblock.
//!
//! [`Settings`] is built once at startup (defaults, optional YAML file, CLI
//! overrides) and handed to the pipeline by shared reference. Nothing in the
//! pipeline mutates it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::EdgeblockError;
use crate::model::{SourceKind, Wildcard};

/// Placeholders every file name format must contain.
const REQUIRED_PLACEHOLDERS: &[&str] = &["{group}", "{kind}", "{ext}"];

/// Maximum size per source (10 MB)
const DEFAULT_MAX_SOURCE_SIZE: usize = 10 * 1024 * 1024;

/// Parse an interval such as "30s", "5m", "4h" or "1d".
/// Requires ASCII-only input to prevent Unicode-related edge cases
pub fn parse_interval(interval: &str) -> Option<Duration> {
    if !interval.is_ascii() || interval.len() < 2 {
        return None;
    }

    let (num_part, suffix) = interval.split_at(interval.len() - 1);
    let value: u64 = num_part.parse().ok()?;
    let secs = match suffix {
        "s" => value,
        "m" => value.checked_mul(60)?,
        "h" => value.checked_mul(3600)?,
        "d" => value.checked_mul(86_400)?,
        _ => return None,
    };
    if secs == 0 {
        return None;
    }
    Some(Duration::from_secs(secs))
}

/// Explicit "merge the excludes of `from` into `to`" step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludeLink {
    pub from: String,
    pub to: String,
}

impl ExcludeLink {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Output directory for dnsmasq configuration files
    pub dir: PathBuf,

    /// Output path format ({dir}, {group}, {kind}, {ext})
    pub file_name_format: String,

    /// Output file extension
    pub ext: String,

    /// dnsmasq address line prefix
    pub prefix: String,

    /// HTTP method used for URL sources
    pub method: String,

    /// Per-request timeout (e.g. "30s")
    pub timeout: String,

    /// Polling interval for the watch command (e.g. "5m")
    pub poll_interval: String,

    /// Fetch worker limit, defaults to available parallelism
    pub cores: Option<usize>,

    /// Known rule group names
    pub nodes: Vec<String>,

    /// Legal source kinds
    pub source_kinds: Vec<SourceKind>,

    pub wildcard: Wildcard,

    /// Exclude lists merged across groups before filtering
    pub exclude_links: Vec<ExcludeLink>,

    /// Command that makes dnsmasq reload its configuration
    pub reload_command: String,

    /// Shell used to run the reload command
    pub shell: String,

    /// Router configuration API binary
    pub config_api: String,

    /// Configuration level holding the blocklist tree
    pub config_level: String,

    pub lock_file: PathBuf,

    /// Maximum accepted size for a single source, in bytes
    pub max_source_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/etc/dnsmasq.d"),
            file_name_format: "{dir}/{group}.{kind}.{ext}".to_string(),
            ext: "blacklist.conf".to_string(),
            prefix: "address=".to_string(),
            method: "GET".to_string(),
            timeout: "30s".to_string(),
            poll_interval: "5m".to_string(),
            cores: None,
            nodes: default_nodes(),
            source_kinds: SourceKind::ALL.to_vec(),
            wildcard: Wildcard::default(),
            exclude_links: vec![
                ExcludeLink::new("blacklist", "domains"),
                ExcludeLink::new("blacklist", "hosts"),
            ],
            reload_command: "service dnsmasq restart".to_string(),
            shell: "/bin/bash".to_string(),
            config_api: "/bin/cli-shell-api".to_string(),
            config_level: "service dns forwarding".to_string(),
            lock_file: PathBuf::from("/var/run/edgeblock.lock"),
            max_source_size: DEFAULT_MAX_SOURCE_SIZE,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        let settings: Settings = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {:?}", path.as_ref()))?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings values
    pub fn validate(&self) -> Result<(), EdgeblockError> {
        let invalid = |msg: String| Err(EdgeblockError::Settings(msg));

        if parse_interval(&self.timeout).is_none() {
            return invalid(format!(
                "Invalid timeout '{}'. Use format like '30s', '5m'",
                self.timeout
            ));
        }

        if parse_interval(&self.poll_interval).is_none() {
            return invalid(format!(
                "Invalid poll_interval '{}'. Use format like '30m', '4h', '1d'",
                self.poll_interval
            ));
        }

        for placeholder in REQUIRED_PLACEHOLDERS {
            if !self.file_name_format.contains(placeholder) {
                return invalid(format!(
                    "file_name_format '{}' must contain {}",
                    self.file_name_format, placeholder
                ));
            }
        }

        if self.nodes.is_empty() || self.nodes.iter().any(|n| n.trim().is_empty()) {
            return invalid("nodes must list at least one non-empty group name".to_string());
        }

        if self.source_kinds.is_empty() {
            return invalid("source_kinds must not be empty".to_string());
        }

        if self.wildcard.node.is_empty() || self.wildcard.name.is_empty() {
            return invalid("wildcard node and name must not be empty".to_string());
        }

        let wildcard = &self.wildcard;
        if !wildcard.node.ends_with('.') || !wildcard.node.contains(wildcard.name.as_str()) {
            return invalid(format!(
                "wildcard node '{}' must contain name '{}' and end with '.'",
                wildcard.node, wildcard.name
            ));
        }

        if self.method.parse::<reqwest::Method>().is_err() {
            return invalid(format!("Invalid HTTP method '{}'", self.method));
        }

        if self.cores == Some(0) {
            return invalid("cores must be at least 1".to_string());
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        parse_interval(&self.timeout).unwrap_or(Duration::from_secs(30))
    }

    pub fn poll_interval(&self) -> Duration {
        parse_interval(&self.poll_interval).unwrap_or(Duration::from_secs(300))
    }

    /// Worker limit for concurrent fetches.
    pub fn workers(&self) -> usize {
        self.cores.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Output path for one (group, kind) pair.
    pub fn output_path(&self, group: &str, kind: SourceKind) -> PathBuf {
        let formatted = self
            .file_name_format
            .replace("{dir}", &self.dir.to_string_lossy())
            .replace("{group}", group)
            .replace("{kind}", kind.as_str())
            .replace("{ext}", &self.ext);
        PathBuf::from(formatted)
    }

    /// Every path this tool could have written, used to recognize orphans.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        self.nodes
            .iter()
            .flat_map(|group| {
                self.source_kinds
                    .iter()
                    .map(move |kind| self.output_path(group, *kind))
            })
            .collect()
    }
}

fn default_nodes() -> Vec<String> {
    ["blacklist", "domains", "hosts"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
