use std::process::{Command, Stdio};
use tracing::info;

use super::platform::LaunchCommand;
use crate::error::{ReplacerError, ReplacerResult};

/// Starts the relaunched executable
pub trait ProcessLauncher: Send + Sync {
    /// Spawn `command` without waiting for it
    fn spawn(&self, command: &LaunchCommand) -> ReplacerResult<()>;
}

/// Spawns a detached child through `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLauncher;

impl ProcessLauncher for SystemLauncher {
    fn spawn(&self, command: &LaunchCommand) -> ReplacerResult<()> {
        let child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                ReplacerError::io_error(e, Some(std::path::PathBuf::from(&command.program)))
            })?;

        // fire-and-forget: the child outlives this process
        info!("Launched {:?} (pid {})", command.program, child.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsString;

    #[test]
    fn test_spawn_missing_program_fails() {
        let command = LaunchCommand {
            program: OsString::from("/nonexistent/multreplacer-test-binary"),
            args: Vec::new(),
        };
        let err = SystemLauncher.spawn(&command).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
