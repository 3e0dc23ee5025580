//! One full cycle: read, parse, fetch, filter, compile, purge, reload.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cmd_abstraction::CommandExecutor;
use crate::compiler::{compile_group, file_name, BlacklistFile, WriteOutcome};
use crate::config::Settings;
use crate::factory::partition;
use crate::fetcher::{Fetched, Fetcher};
use crate::filter::{normalize, GroupFilter};
use crate::fs_abstraction::FileSystem;
use crate::model::{ConfigTree, Entry, RuleGroup, SourceKind};
use crate::parser::Parser;
use crate::purge::{existing_files, purge};
use crate::reader::ConfigReader;
use crate::reload::Reloader;
use crate::utils::format_count;

/// Whether a cycle touches disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Apply,
    /// Validate configuration and report without writing, purging or reloading
    DryRun,
}

/// Fate of one (group, kind) output file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Written,
    /// No entries; any previous file is purged
    Skipped,
    Failed(String),
    /// Dry run: would have been written
    Pending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub count: usize,
    pub status: FileStatus,
}

/// Per-group statistics for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupReport {
    pub group: String,
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
    pub raw: usize,
    pub duplicates: usize,
    pub excluded: usize,
    pub kept: usize,
    pub files: Vec<FileReport>,
}

impl GroupReport {
    pub fn written(&self) -> impl Iterator<Item = &FileReport> {
        self.files.iter().filter(|f| f.status == FileStatus::Written)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub mode: Mode,
    pub groups: Vec<GroupReport>,
    pub purged: Vec<PathBuf>,
    pub purge_error: Option<String>,
    /// `None` when no reload was attempted
    pub reload: Option<Result<(), String>>,
}

impl CycleReport {
    fn new(mode: Mode) -> Self {
        Self {
            mode,
            groups: Vec::new(),
            purged: Vec::new(),
            purge_error: None,
            reload: None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupReport> {
        self.groups.iter().find(|g| g.group == name)
    }

    pub fn total_kept(&self) -> usize {
        self.groups.iter().map(|g| g.kept).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.groups.iter().map(|g| g.failed.len()).sum()
    }

    pub fn files_written(&self) -> usize {
        self.groups.iter().map(|g| g.written().count()).sum()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.mode {
            Mode::Apply => "",
            Mode::DryRun => "[dry-run] ",
        };
        write!(
            f,
            "{}{} entries in {} groups, {} files written, {} purged, {} failed sources",
            prefix,
            format_count(self.total_kept()),
            self.groups.len(),
            self.files_written(),
            self.purged.len(),
            self.total_failed()
        )
    }
}

/// The stages of a cycle wired to their collaborators.
pub struct Pipeline {
    settings: Settings,
    reader: Arc<dyn ConfigReader>,
    fs: Arc<dyn FileSystem>,
    fetcher: Fetcher,
    reloader: Reloader,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        reader: Arc<dyn ConfigReader>,
        fs: Arc<dyn FileSystem>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Result<Self> {
        let fetcher = Fetcher::new(&settings)?;
        let reloader = Reloader::new(executor, &settings);
        Ok(Self {
            settings,
            reader,
            fs,
            fetcher,
            reloader,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Read and parse the current configuration, with cross-group excludes
    /// already composed.
    pub async fn load_tree(&self) -> Result<ConfigTree> {
        let reader = Arc::clone(&self.reader);
        let raw = tokio::task::spawn_blocking(move || reader.read())
            .await
            .context("Configuration reader task panicked")??;

        let mut tree = Parser::new(&self.settings).parse(&raw)?;
        for link in &self.settings.exclude_links {
            tree.inherit_excludes(&link.from, &link.to);
        }
        Ok(tree)
    }

    /// Run one cycle. Only a failure to obtain a configuration is an error;
    /// per-source, per-file, purge and reload failures are logged and
    /// recorded in the report.
    pub async fn run_cycle(&self, mode: Mode) -> Result<CycleReport> {
        let tree = self.load_tree().await?;
        let parts = partition(&tree);
        let pairs = parts.merged(&self.settings.source_kinds);
        info!(
            "Fetching {} sources from {} groups ({} workers)...",
            pairs.len(),
            tree.groups.iter().filter(|g| !g.disabled).count(),
            self.fetcher.workers()
        );

        let fetched = self.fetcher.fetch_all(&pairs).await;

        let mut report = CycleReport::new(mode);
        let mut expected = BTreeSet::new();

        for group in tree.groups.iter().filter(|g| !g.disabled) {
            let group_report = self.process_group(group, &fetched, mode, &mut expected);
            info!(
                "{}: {} entries ({} raw, {} duplicates, {} excluded)",
                group.name,
                format_count(group_report.kept),
                format_count(group_report.raw),
                format_count(group_report.duplicates),
                format_count(group_report.excluded)
            );
            report.groups.push(group_report);
        }

        if mode == Mode::Apply {
            let existing = existing_files(self.fs.as_ref(), &self.settings);
            match purge(self.fs.as_ref(), &expected, &existing) {
                Ok(removed) => report.purged = removed,
                Err(e) => {
                    warn!("{}", e);
                    report.purge_error = Some(e.to_string());
                }
            }

            report.reload = Some(self.reload().await);
        }

        info!("{}", report);
        Ok(report)
    }

    /// The reload command can take seconds; keep it off the async workers.
    async fn reload(&self) -> Result<(), String> {
        let reloader = self.reloader.clone();
        let result = match tokio::task::spawn_blocking(move || reloader.reload()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("Reload task panicked: {}", e)),
        };
        if let Err(e) = &result {
            warn!("{}", e);
        }
        result
    }

    fn process_group(
        &self,
        group: &RuleGroup,
        fetched: &[Fetched<'_>],
        mode: Mode,
        expected: &mut BTreeSet<PathBuf>,
    ) -> GroupReport {
        let mut report = GroupReport {
            group: group.name.clone(),
            ..Default::default()
        };
        let mut entries: Vec<Entry> = Vec::new();

        for item in fetched.iter().filter(|f| f.pair.group.name == group.name) {
            let source = item.pair.source;
            match &item.result {
                Ok(raw) => {
                    let normalized = normalize(raw, source, group, &self.settings.wildcard);
                    debug!("{}: {} entries", item.pair.label(), normalized.len());
                    report.fetched.push(source.name.clone());
                    entries.extend(normalized);
                }
                Err(_) => {
                    report.failed.push(source.name.clone());
                }
            }
        }

        report.raw = entries.len();
        let resolved = GroupFilter::new(group, &self.settings.wildcard).resolve(entries);
        report.duplicates = resolved.duplicates;
        report.excluded = resolved.excluded;
        report.kept = resolved.entries.len();

        for file in compile_group(&self.settings, &group.name, &resolved.entries) {
            let status = match mode {
                Mode::DryRun if file.is_empty() => FileStatus::Skipped,
                Mode::DryRun => FileStatus::Pending,
                Mode::Apply => self.write(&file, expected),
            };
            report.files.push(FileReport {
                path: file.path.clone(),
                kind: file.kind,
                count: file.count(),
                status,
            });
        }

        report
    }

    fn write(&self, file: &BlacklistFile, expected: &mut BTreeSet<PathBuf>) -> FileStatus {
        match file.write(self.fs.as_ref()) {
            Ok(WriteOutcome::Written { path, count }) => {
                info!("Wrote {} ({} entries)", file_name(&path), format_count(count));
                expected.insert(path);
                FileStatus::Written
            }
            Ok(WriteOutcome::Skipped { .. }) => FileStatus::Skipped,
            Err(e) => {
                // The old file, if any, is better than none
                warn!("{}", e);
                expected.insert(file.path.clone());
                FileStatus::Failed(e.to_string())
            }
        }
    }
}
