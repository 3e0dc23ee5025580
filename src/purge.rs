//! Removes output files left behind by disabled or deleted sources.
//!
//! Only names this tool could have produced (see
//! [`Settings::candidate_paths`]) are ever considered, so unrelated files in
//! the dnsmasq directory are never touched.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::{EdgeblockError, PurgeFailures};
use crate::fs_abstraction::FileSystem;

/// Candidate output files currently present on disk.
pub fn existing_files(fs: &dyn FileSystem, settings: &Settings) -> Vec<PathBuf> {
    settings
        .candidate_paths()
        .into_iter()
        .filter(|path| fs.exists(path))
        .collect()
}

/// Remove every file in `existing` that is not in `expected`.
///
/// All removals are attempted; failures are collected into one error. A file
/// that vanished in the meantime counts as removed.
pub fn purge(
    fs: &dyn FileSystem,
    expected: &BTreeSet<PathBuf>,
    existing: &[PathBuf],
) -> Result<Vec<PathBuf>, EdgeblockError> {
    let mut removed = Vec::new();
    let mut failures = PurgeFailures::default();

    for path in existing.iter().filter(|p| !expected.contains(*p)) {
        match fs.remove_file(path) {
            Ok(()) => {
                info!("Removed orphaned {:?}", path);
                removed.push(path.clone());
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{:?} already gone", path);
            }
            Err(e) => {
                warn!("Could not remove {:?}: {}", path, e);
                failures.0.push((path.clone(), e));
            }
        }
    }

    if failures.0.is_empty() {
        Ok(removed)
    } else {
        Err(EdgeblockError::Purge(failures))
    }
}
