//! Renders resolved entries into dnsmasq address files.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::Settings;
use crate::error::EdgeblockError;
use crate::fs_abstraction::FileSystem;
use crate::model::{Entry, SourceKind};

/// One output artifact: destination path plus the rendered lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistFile {
    pub group: String,
    pub kind: SourceKind,
    pub path: PathBuf,
    buffer: String,
    count: usize,
}

/// What happened to a [`BlacklistFile`] on write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { path: PathBuf, count: usize },
    /// Nothing to write; any existing file is left to the purge stage.
    Skipped { path: PathBuf },
}

impl BlacklistFile {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contents(&self) -> &str {
        &self.buffer
    }

    /// Atomically replace the destination file. Empty files are never written.
    pub fn write(&self, fs: &dyn FileSystem) -> Result<WriteOutcome, EdgeblockError> {
        if self.is_empty() {
            debug!("No entries for {}/{}, skipping {:?}", self.group, self.kind, self.path);
            return Ok(WriteOutcome::Skipped {
                path: self.path.clone(),
            });
        }

        let write_err = |source| EdgeblockError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !fs.exists(parent) {
                fs.create_dir_all(parent).map_err(write_err)?;
            }
        }
        fs.write_atomic(&self.path, self.buffer.as_bytes())
            .map_err(write_err)?;

        debug!("Wrote {} entries to {:?}", self.count, self.path);
        Ok(WriteOutcome::Written {
            path: self.path.clone(),
            count: self.count,
        })
    }
}

/// Format one address directive, e.g. `address=/ads.example.com/0.0.0.0`.
pub fn format_line(prefix: &str, entry: &Entry) -> String {
    format!("{}/{}/{}", prefix, entry.name, entry.ip)
}

/// Render the entries of `kind` for one group. `entries` must already be
/// sorted; their order is kept.
pub fn compile(settings: &Settings, group: &str, kind: SourceKind, entries: &[Entry]) -> BlacklistFile {
    let mut buffer = String::new();
    let mut count = 0;

    for entry in entries.iter().filter(|e| e.kind == kind) {
        buffer.push_str(&format_line(&settings.prefix, entry));
        buffer.push('\n');
        count += 1;
    }

    BlacklistFile {
        group: group.to_string(),
        kind,
        path: settings.output_path(group, kind),
        buffer,
        count,
    }
}

/// One [`BlacklistFile`] per configured source kind, empty ones included so
/// callers can report them as skipped.
pub fn compile_group(settings: &Settings, group: &str, entries: &[Entry]) -> Vec<BlacklistFile> {
    settings
        .source_kinds
        .iter()
        .map(|kind| compile(settings, group, *kind, entries))
        .collect()
}

/// Path helper used by reports.
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs_abstraction::{MockFileSystem, RealFileSystem};
    use std::io;
    use tempfile::TempDir;

    fn entry(name: &str, ip: &str, kind: SourceKind) -> Entry {
        Entry {
            name: name.to_string(),
            ip: ip.to_string(),
            kind,
        }
    }

    fn settings_in(dir: &Path) -> Settings {
        Settings {
            dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_line() {
        let e = entry("ads.example.com", "192.168.1.1", SourceKind::File);
        assert_eq!(format_line("address=", &e), "address=/ads.example.com/192.168.1.1");
        assert_eq!(format_line("server=", &e), "server=/ads.example.com/192.168.1.1");
    }

    #[test]
    fn test_compile_filters_by_kind() {
        let settings = settings_in(Path::new("/tmp/out"));
        let entries = vec![
            entry("a.com", "0.0.0.0", SourceKind::Url),
            entry("b.com", "0.0.0.0", SourceKind::File),
            entry("c.com", "0.0.0.0", SourceKind::Url),
        ];
        let file = compile(&settings, "domains", SourceKind::Url, &entries);
        assert_eq!(file.count(), 2);
        assert_eq!(file.contents(), "address=/a.com/0.0.0.0\naddress=/c.com/0.0.0.0\n");
        assert_eq!(file.path, PathBuf::from("/tmp/out/domains.url.blacklist.conf"));
    }

    #[test]
    fn test_compile_group_covers_all_kinds() {
        let settings = settings_in(Path::new("/tmp/out"));
        let files = compile_group(
            &settings,
            "hosts",
            &[entry("a.com", "0.0.0.0", SourceKind::PreConfigured)],
        );
        assert_eq!(files.len(), 3);
        let non_empty: Vec<_> = files.iter().filter(|f| !f.is_empty()).collect();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].kind, SourceKind::PreConfigured);
    }

    #[test]
    fn test_write_empty_is_skipped() {
        // No filesystem call may happen for an empty file
        let fs = MockFileSystem::new();
        let settings = settings_in(Path::new("/tmp/out"));
        let file = compile(&settings, "hosts", SourceKind::File, &[]);
        assert!(matches!(file.write(&fs).unwrap(), WriteOutcome::Skipped { .. }));
    }

    #[test]
    fn test_write_creates_dir_and_file() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(&dir.path().join("dnsmasq.d"));
        let file = compile(
            &settings,
            "hosts",
            SourceKind::File,
            &[entry("ads.example.com", "192.168.1.1", SourceKind::File)],
        );

        let outcome = file.write(&RealFileSystem).unwrap();
        assert_eq!(
            outcome,
            WriteOutcome::Written {
                path: file.path.clone(),
                count: 1
            }
        );
        let written = std::fs::read_to_string(&file.path).unwrap();
        assert_eq!(written, "address=/ads.example.com/192.168.1.1\n");
    }

    #[test]
    fn test_write_overwrites_previous() {
        let dir = TempDir::new().unwrap();
        let settings = settings_in(dir.path());
        let first = compile(
            &settings,
            "domains",
            SourceKind::Url,
            &[
                entry("a.com", "0.0.0.0", SourceKind::Url),
                entry("b.com", "0.0.0.0", SourceKind::Url),
            ],
        );
        first.write(&RealFileSystem).unwrap();

        let second = compile(
            &settings,
            "domains",
            SourceKind::Url,
            &[entry("c.com", "0.0.0.0", SourceKind::Url)],
        );
        second.write(&RealFileSystem).unwrap();

        let written = std::fs::read_to_string(&second.path).unwrap();
        assert_eq!(written, "address=/c.com/0.0.0.0\n");
    }

    #[test]
    fn test_write_failure_names_path() {
        let mut fs = MockFileSystem::new();
        fs.expect_exists().returning(|_| true);
        fs.expect_write_atomic()
            .returning(|_, _| Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only")));

        let settings = settings_in(Path::new("/tmp/out"));
        let file = compile(
            &settings,
            "hosts",
            SourceKind::File,
            &[entry("a.com", "0.0.0.0", SourceKind::File)],
        );
        let err = file.write(&fs).unwrap_err();
        assert!(matches!(err, EdgeblockError::Write { .. }));
        assert!(err.to_string().contains("hosts.file.blacklist.conf"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            file_name(Path::new("/etc/dnsmasq.d/hosts.url.blacklist.conf")),
            "hosts.url.blacklist.conf"
        );
    }
}
