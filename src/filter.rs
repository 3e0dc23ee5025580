//! Line normalization, deduplication and include/exclude resolution.

use std::collections::HashSet;

use crate::model::{Entry, RuleGroup, Source, Wildcard};

/// Lines starting with one of these (after trimming) are comments.
const COMMENT_MARKERS: &[&str] = &["#", "!", "//"];

/// Turn raw source content into entries for `group`.
///
/// Per line: skip blanks and comments, strip the source prefix when present,
/// drop trailing comments, keep the first field. The source's override IP
/// wins over the group IP.
pub fn normalize(raw: &str, source: &Source, group: &RuleGroup, wildcard: &Wildcard) -> Vec<Entry> {
    let ip = source.resolve_ip(group);
    let kind = source.kind();

    raw.lines()
        .filter_map(|line| normalize_line(line, &source.prefix))
        .filter(|name| !wildcard.is_pattern(name))
        .map(|name| Entry {
            name: name.to_string(),
            ip: ip.to_string(),
            kind,
        })
        .collect()
}

fn normalize_line<'l>(line: &'l str, prefix: &str) -> Option<&'l str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || COMMENT_MARKERS.iter().any(|m| trimmed.starts_with(m)) {
        return None;
    }

    // Not every list is consistent about its prefix, so a missing one is fine
    let rest = if prefix.is_empty() {
        trimmed
    } else {
        trimmed
            .strip_prefix(prefix)
            .or_else(|| trimmed.strip_prefix(prefix.trim()).filter(|_| !prefix.trim().is_empty()))
            .unwrap_or(trimmed)
    };

    let rest = rest.split('#').next().unwrap_or_default();
    // Zone-file lists quote the name: zone "example.com" { ... }
    rest.split_whitespace()
        .next()
        .map(|field| field.trim_matches(|c: char| c == '"' || c == '\''))
        .filter(|name| !name.is_empty())
}

/// Exact, subdomain and wildcard matching against a set of patterns.
#[derive(Debug, Default, Clone)]
pub struct Matcher {
    exact: HashSet<String>,
    suffixes: Vec<String>,
    prefixes: Vec<String>,
}

impl Matcher {
    pub fn new<'p>(patterns: impl IntoIterator<Item = &'p String>, wildcard: &Wildcard) -> Self {
        let mut matcher = Self::default();
        let trailing = format!(".{}", wildcard.name);

        for pattern in patterns {
            let pattern = pattern.trim();
            if pattern.is_empty() {
                continue;
            }
            if let Some(rest) = pattern.strip_prefix(wildcard.node.as_str()) {
                // "*.example.com" -> ".example.com"
                matcher.suffixes.push(format!(".{}", rest));
            } else if let Some(rest) = pattern.strip_suffix(trailing.as_str()) {
                // "ads.*" -> "ads."
                matcher.prefixes.push(format!("{}.", rest));
            } else {
                matcher.exact.insert(pattern.to_string());
            }
        }

        matcher
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.suffixes.is_empty() && self.prefixes.is_empty()
    }

    /// True if `name` equals a pattern, is a subdomain of one, or matches a
    /// wildcard pattern.
    pub fn matches(&self, name: &str) -> bool {
        if !self.exact.is_empty() {
            let mut part = name;
            loop {
                if self.exact.contains(part) {
                    return true;
                }
                // Strip leading label
                match part.find('.') {
                    Some(idx) if idx + 1 < part.len() => part = &part[idx + 1..],
                    _ => break,
                }
            }
        }

        self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
            || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

/// Counts from one resolution pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Surviving entries sorted by destination
    pub entries: Vec<Entry>,
    pub duplicates: usize,
    pub excluded: usize,
}

/// Exclude/include rules for one group.
#[derive(Debug, Clone)]
pub struct GroupFilter {
    excludes: Matcher,
    includes: Matcher,
}

impl GroupFilter {
    /// Uses the group's effective excludes; cross-group composition must
    /// already have been applied to `group`.
    pub fn new(group: &RuleGroup, wildcard: &Wildcard) -> Self {
        Self {
            excludes: Matcher::new(&group.excludes, wildcard),
            includes: Matcher::new(&group.includes, wildcard),
        }
    }

    /// Dropped when excluded and not included; include always wins.
    pub fn keeps(&self, name: &str) -> bool {
        !self.excludes.matches(name) || self.includes.matches(name)
    }

    /// Collapse duplicates (first seen wins), apply excludes, sort.
    pub fn resolve(&self, entries: impl IntoIterator<Item = Entry>) -> Resolved {
        let mut seen = HashSet::new();
        let mut out = Resolved::default();

        for entry in entries {
            if !seen.insert(entry.name.clone()) {
                out.duplicates += 1;
                continue;
            }
            if !self.keeps(&entry.name) {
                out.excluded += 1;
                continue;
            }
            out.entries.push(entry);
        }

        out.entries.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }
}
