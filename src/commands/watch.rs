//! Watch command implementation: poll and rebuild until interrupted.

use anyhow::{Context, Result};

use super::GlobalOptions;
use crate::config::parse_interval;
use crate::lock::LockGuard;
use crate::scheduler::{Schedule, Scheduler};
use crate::signal::{self, ShutdownToken};

/// Run the watch command
pub async fn run(options: &GlobalOptions, interval: Option<&str>) -> Result<()> {
    let settings = options.settings()?;
    let period = match interval {
        Some(raw) => parse_interval(raw)
            .with_context(|| format!("Invalid interval '{}'. Use format like '30m', '4h'", raw))?,
        None => settings.poll_interval(),
    };

    let _lock = LockGuard::acquire(&settings.lock_file)?;

    let token = ShutdownToken::new();
    signal::listen(token.clone());

    let pipeline = options.pipeline(settings)?;
    Scheduler::new(pipeline, Schedule::Every(period), token)
        .run()
        .await?;
    Ok(())
}
