//! Update command implementation.

use anyhow::Result;
use tracing::{info, warn};

use super::GlobalOptions;
use crate::lock::LockGuard;
use crate::pipeline::FileStatus;
use crate::scheduler::{Schedule, Scheduler};
use crate::signal::ShutdownToken;
use crate::utils::format_count;

/// Run the update command
pub async fn run(options: &GlobalOptions, dry_run: bool) -> Result<()> {
    let settings = options.settings()?;

    // A dry run never touches the output directory, so it needs no lock
    let _lock = if dry_run {
        None
    } else {
        Some(LockGuard::acquire(&settings.lock_file)?)
    };

    let (schedule, label) = if dry_run {
        (Schedule::DryRun, "Validating blocklist configuration...")
    } else {
        (Schedule::Once, "Updating blocklists...")
    };
    info!("{}", label);

    let pipeline = options.pipeline(settings)?;
    let scheduler = Scheduler::new(pipeline, schedule, ShutdownToken::new());
    let Some(report) = scheduler.run().await? else {
        return Ok(());
    };

    println!();
    for group in &report.groups {
        println!(
            "  {:<12} {:>8} entries ({} duplicates, {} excluded)",
            group.group,
            format_count(group.kept),
            format_count(group.duplicates),
            format_count(group.excluded)
        );
        for file in &group.files {
            match &file.status {
                FileStatus::Skipped => {}
                FileStatus::Failed(reason) => println!("    [FAIL] {}", reason),
                status => println!("    [{:?}] {}", status, file.path.display()),
            }
        }
        for source in &group.failed {
            println!("    [WARN] source '{}' could not be fetched", source);
        }
    }

    if let Some(Err(reason)) = &report.reload {
        warn!("dnsmasq was not reloaded: {}", reason);
    }

    println!();
    println!(
        "[OK] {} entries in {} files",
        format_count(report.total_kept()),
        if dry_run {
            report
                .groups
                .iter()
                .map(|g| g.files.iter().filter(|f| f.status == FileStatus::Pending).count())
                .sum::<usize>()
        } else {
            report.files_written()
        }
    );

    Ok(())
}
