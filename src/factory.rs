//! Splits a configuration tree into per-kind retrieval sets.

use crate::model::{ConfigTree, RuleGroup, Source, SourceKind};

/// One fetchable source and the group that owns it.
#[derive(Debug, Clone, Copy)]
pub struct Pair<'a> {
    pub group: &'a RuleGroup,
    pub source: &'a Source,
}

impl Pair<'_> {
    /// "group/source" label for logs.
    pub fn label(&self) -> String {
        format!("{}/{}", self.group.name, self.source.name)
    }
}

/// Enabled sources partitioned by origin kind, each ordered by group name
/// then source name.
#[derive(Debug, Default)]
pub struct Partition<'a> {
    pub files: Vec<Pair<'a>>,
    pub pre: Vec<Pair<'a>>,
    pub urls: Vec<Pair<'a>>,
}

impl<'a> Partition<'a> {
    pub fn get(&self, kind: SourceKind) -> &[Pair<'a>] {
        match kind {
            SourceKind::File => &self.files,
            SourceKind::PreConfigured => &self.pre,
            SourceKind::Url => &self.urls,
        }
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.pre.len() + self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All pairs restricted to `kinds`, in deterministic (group, source) order.
    pub fn merged(&self, kinds: &[SourceKind]) -> Vec<Pair<'a>> {
        let mut all: Vec<Pair<'a>> = kinds
            .iter()
            .flat_map(|kind| self.get(*kind).iter().copied())
            .collect();
        all.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
        all
    }
}

fn sort_key<'a>(pair: &Pair<'a>) -> (&'a str, &'a str) {
    (pair.group.name.as_str(), pair.source.name.as_str())
}

/// Partition enabled sources of enabled groups by origin kind.
pub fn partition(tree: &ConfigTree) -> Partition<'_> {
    let mut out = Partition::default();

    for group in tree.groups.iter().filter(|g| !g.disabled) {
        for source in group.enabled_sources() {
            let pair = Pair { group, source };
            match source.kind() {
                SourceKind::File => out.files.push(pair),
                SourceKind::PreConfigured => out.pre.push(pair),
                SourceKind::Url => out.urls.push(pair),
            }
        }
    }

    for set in [&mut out.files, &mut out.pre, &mut out.urls] {
        set.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));
    }

    out
}
