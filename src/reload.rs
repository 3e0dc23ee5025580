//! Tells dnsmasq to pick up the freshly written files.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cmd_abstraction::{args_to_strings, CommandExecutor, CommandOutput};
use crate::config::Settings;
use crate::error::EdgeblockError;
use crate::utils::truncate;

/// Maximum length of command output carried in errors and logs
const MAX_OUTPUT_LEN: usize = 500;

/// Runs `shell -c <reload_command>` through the command executor.
#[derive(Clone)]
pub struct Reloader {
    executor: Arc<dyn CommandExecutor>,
    shell: String,
    command: String,
}

impl Reloader {
    pub fn new(executor: Arc<dyn CommandExecutor>, settings: &Settings) -> Self {
        Self {
            executor,
            shell: settings.shell.clone(),
            command: settings.reload_command.clone(),
        }
    }

    /// Run the reload command. A non-zero exit or a failure to start the
    /// shell is a [`EdgeblockError::Reload`] carrying the captured output.
    pub fn reload(&self) -> Result<CommandOutput, EdgeblockError> {
        debug!("Reloading dnsmasq: {} -c '{}'", self.shell, self.command);

        let args = args_to_strings(&["-c", self.command.as_str()]);
        let output = self
            .executor
            .execute(&self.shell, &args)
            .map_err(|e| EdgeblockError::Reload {
                command: self.command.clone(),
                code: None,
                output: format!("{:#}", e),
            })?;

        if !output.success {
            return Err(EdgeblockError::Reload {
                command: self.command.clone(),
                code: output.code,
                output: truncate(&output.combined(), MAX_OUTPUT_LEN),
            });
        }

        let combined = output.combined();
        if combined.is_empty() {
            info!("dnsmasq reloaded");
        } else {
            info!("dnsmasq reloaded: {}", truncate(&combined, MAX_OUTPUT_LEN));
        }
        Ok(output)
    }
}
