//! Show command implementation.

use anyhow::{Context, Result};

use super::GlobalOptions;

/// Print the parsed configuration tree, excludes already composed.
pub async fn run(options: &GlobalOptions) -> Result<()> {
    let settings = options.settings()?;
    let pipeline = options.pipeline(settings)?;
    let tree = pipeline.load_tree().await?;

    let json = serde_json::to_string_pretty(&tree).context("Failed to serialize configuration")?;
    println!("{}", json);
    Ok(())
}
