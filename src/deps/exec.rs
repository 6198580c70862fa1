use crate::error::{Result, SetupError};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Exit status of a finished command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
}

impl RunStatus {
    #[must_use]
    pub const fn success(self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs command lines on behalf of readiness checks and installers
pub trait CommandRunner: Send + Sync {
    /// Run `command_line` in `work_dir` and wait for it to finish
    ///
    /// # Errors
    /// Returns `SetupError::Launch` if the program cannot be found or
    /// launched. A program that runs and exits non-zero is not an error.
    fn run(&self, command_line: &str, work_dir: &Path) -> Result<RunStatus>;
}

/// Runs commands as child processes of this one
///
/// The command line is split on whitespace. The program is looked up in the
/// working directory first (so freshly downloaded installers run), then on
/// `PATH`. Windows Installer packages are handed to `msiexec`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn resolve_program(program: &str, work_dir: &Path) -> Result<PathBuf> {
        let local = work_dir.join(program);
        if local.is_file() {
            return Ok(local);
        }

        which::which(program).map_err(|e| SetupError::Launch {
            command: program.to_string(),
            reason: format!("not found in working directory or PATH: {e}"),
        })
    }

    fn build_command(command_line: &str, work_dir: &Path) -> Result<Command> {
        let mut parts = command_line.split_whitespace();
        let program = parts.next().ok_or_else(|| SetupError::Launch {
            command: command_line.to_string(),
            reason: "empty command line".to_string(),
        })?;

        let resolved = Self::resolve_program(program, work_dir)?;

        let mut command = if is_msi_package(&resolved) {
            let mut msiexec = Command::new("msiexec");
            msiexec.arg("/i").arg(&resolved);
            msiexec
        } else {
            Command::new(&resolved)
        };

        command
            .args(parts)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        Ok(command)
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, command_line: &str, work_dir: &Path) -> Result<RunStatus> {
        let mut command = Self::build_command(command_line, work_dir)?;

        tracing::debug!("Running {command:?}");

        let status = command.status().map_err(|e| SetupError::Launch {
            command: command_line.to_string(),
            reason: format!("failed to launch: {e}"),
        })?;

        tracing::debug!("'{command_line}' exited with {status}");

        Ok(RunStatus {
            code: status.code(),
        })
    }
}

fn is_msi_package(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"))
}
