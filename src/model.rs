//! Typed configuration tree produced by the parser.
//!
//! A [`ConfigTree`] is rebuilt from scratch on every cycle, so live edits to
//! the router configuration are picked up without a restart.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

/// Name of the synthetic inline source built from a group's include list.
pub const PRE_CONFIGURED: &str = "pre-configured";

/// Root of a parsed configuration: rule groups in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConfigTree {
    pub groups: Vec<RuleGroup>,
}

impl ConfigTree {
    pub fn group(&self, name: &str) -> Option<&RuleGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    pub fn group_mut(&mut self, name: &str) -> Option<&mut RuleGroup> {
        self.groups.iter_mut().find(|g| g.name == name)
    }

    /// Union the excludes of `from` into `to`. Unknown groups are ignored.
    pub fn inherit_excludes(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        let Some(excludes) = self.group(from).map(|g| g.excludes.clone()) else {
            return;
        };
        if let Some(target) = self.group_mut(to) {
            target.excludes.extend(excludes);
        }
    }
}

/// One top-level named block ("blacklist", "domains", "hosts").
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleGroup {
    pub name: String,
    pub disabled: bool,
    /// Default redirect IP for entries whose source has no override
    pub ip: String,
    pub includes: BTreeSet<String>,
    pub excludes: BTreeSet<String>,
    pub sources: BTreeMap<String, Source>,
}

impl RuleGroup {
    /// Sources that take part in a fetch cycle.
    pub fn enabled_sources(&self) -> impl Iterator<Item = &Source> {
        self.sources.values().filter(|s| !s.disabled)
    }
}

/// One content origin within a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub name: String,
    pub disabled: bool,
    pub description: String,
    /// Leading text stripped from every line (e.g. "127.0.0.1 ")
    pub prefix: String,
    /// Overrides the group IP when set
    pub ip: Option<String>,
    pub origin: Origin,
}

impl Source {
    pub fn kind(&self) -> SourceKind {
        self.origin.kind()
    }

    /// IP attached to entries from this source.
    pub fn resolve_ip<'a>(&'a self, group: &'a RuleGroup) -> &'a str {
        self.ip.as_deref().unwrap_or(&group.ip)
    }
}

/// Where a source's content comes from. Fixed at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    File(PathBuf),
    Inline(String),
    Url(String),
}

impl Origin {
    pub fn kind(&self) -> SourceKind {
        match self {
            Origin::File(_) => SourceKind::File,
            Origin::Inline(_) => SourceKind::PreConfigured,
            Origin::Url(_) => SourceKind::Url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "pre-configured")]
    PreConfigured,
    #[serde(rename = "url")]
    Url,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::File, SourceKind::PreConfigured, SourceKind::Url];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::File => "file",
            SourceKind::PreConfigured => PRE_CONFIGURED,
            SourceKind::Url => "url",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized rule ready for output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Destination domain or host
    pub name: String,
    pub ip: String,
    /// Kind of the source that produced this entry
    pub kind: SourceKind,
}

/// Marker pair describing wildcard patterns in include/exclude lists.
///
/// A pattern starting with `node` (e.g. `*.example.com`) matches by suffix,
/// a pattern ending with `.` + `name` (e.g. `ads.*`) matches by prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wildcard {
    pub node: String,
    pub name: String,
}

impl Default for Wildcard {
    fn default() -> Self {
        Self {
            node: "*.".to_string(),
            name: "*".to_string(),
        }
    }
}

impl Wildcard {
    /// True when `value` carries the wildcard marker and cannot be emitted.
    pub fn is_pattern(&self, value: &str) -> bool {
        value.contains(self.name.as_str())
    }
}
