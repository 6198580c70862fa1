use crate::deps::descriptor::{Dependency, Readiness};
use crate::deps::exec::CommandRunner;
use crate::error::SetupError;
use std::path::Path;

/// Evaluate a dependency's readiness predicate
///
/// Never fails: a check command that cannot be run counts as "not satisfied"
/// so that provisioning goes ahead.
pub fn is_satisfied(dep: &Dependency, runner: &dyn CommandRunner, work_dir: &Path) -> bool {
    match dep.readiness() {
        Readiness::Command(cmd) => match runner.run(cmd, work_dir) {
            Ok(status) if status.success() => true,
            Ok(status) => {
                tracing::debug!("{}: check '{cmd}' exited with {:?}", dep.name, status.code);
                false
            }
            Err(e) => {
                let reason = match e {
                    SetupError::Launch { reason, .. } => reason,
                    other => other.to_string(),
                };
                let err = SetupError::ReadinessCheck {
                    command: cmd.to_string(),
                    reason,
                };
                tracing::warn!("{}: {err}", dep.name);
                false
            }
        },
        Readiness::PathExists(path) => {
            let full = work_dir.join(path);
            let exists = full.exists();
            tracing::debug!("{}: {} exists: {exists}", dep.name, full.display());
            exists
        }
        Readiness::Unspecified => {
            tracing::debug!("{}: no readiness check, provisioning", dep.name);
            false
        }
    }
}
