use crate::config::DownloadConfig;
use crate::deps::check::is_satisfied;
use crate::deps::descriptor::{Dependency, PostAction};
use crate::deps::download::{Fetcher, HttpFetcher};
use crate::deps::exec::{CommandRunner, SystemRunner};
use crate::deps::extract::{ArchiveExtractor, ZipExtractor};
use crate::deps::table::DependencyTable;
use crate::error::{Result, SetupError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-run settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionOptions {
    /// Never fetch artifacts; post-processing uses whatever file is present
    pub skip_download: bool,
    /// Base for downloads, relative check paths, extraction targets and commands
    pub work_dir: PathBuf,
}

impl Default for ProvisionOptions {
    fn default() -> Self {
        Self {
            skip_download: false,
            work_dir: PathBuf::from("."),
        }
    }
}

/// What the post-fetch step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionTaken {
    Executed,
    Extracted { files: usize },
    Nothing,
}

/// Result of processing one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    AlreadySatisfied,
    Provisioned { downloaded: bool, action: ActionTaken },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReport {
    pub name: String,
    pub outcome: Outcome,
}

/// Outcome of a whole provisioning run, in table order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub dependencies: Vec<DependencyReport>,
}

impl ProvisionReport {
    /// Number of dependencies that were already satisfied
    #[must_use]
    pub fn satisfied_count(&self) -> usize {
        self.dependencies
            .iter()
            .filter(|d| d.outcome == Outcome::AlreadySatisfied)
            .count()
    }

    /// Number of dependencies that were provisioned in this run
    #[must_use]
    pub fn provisioned_count(&self) -> usize {
        self.dependencies.len() - self.satisfied_count()
    }
}

/// Readiness of one dependency, for check-only runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub name: String,
    pub satisfied: bool,
}

/// Create `dir` if needed and make it absolute
///
/// The path is made absolute lexically rather than canonicalized, so on
/// Windows it keeps its drive-letter form instead of gaining a `\\?\` prefix
/// that installers reject.
pub fn prepare_work_dir(dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    Ok(std::path::absolute(dir)?)
}

/// Checks, downloads and installs dependencies one after another
///
/// Any download or post-processing failure aborts the run; dependencies
/// already handled are left as they are. Check commands, installers and
/// archive extraction run on the blocking thread pool.
pub struct Provisioner {
    fetcher: Box<dyn Fetcher>,
    runner: Arc<dyn CommandRunner>,
    extractor: Arc<dyn ArchiveExtractor>,
    options: ProvisionOptions,
}

impl std::fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioner")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Provisioner {
    /// Create a provisioner using HTTP downloads, child processes and zip extraction
    pub fn new(download: &DownloadConfig, options: ProvisionOptions) -> Result<Self> {
        Ok(Self {
            fetcher: Box::new(HttpFetcher::new(download)?),
            runner: Arc::new(SystemRunner::new()),
            extractor: Arc::new(ZipExtractor::new()),
            options,
        })
    }

    /// Replace the artifact fetcher
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    /// Replace the command runner used for checks and installers
    #[must_use]
    pub fn with_runner(mut self, runner: impl CommandRunner + 'static) -> Self {
        self.runner = Arc::new(runner);
        self
    }

    /// Replace the archive extractor
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl ArchiveExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Provision every dependency the table lists for `platform`
    ///
    /// # Errors
    /// - `SetupError::NoDependencies` if the platform has no (or an empty) list
    /// - the first fatal download or post-processing error
    pub async fn provision(
        &self,
        table: &DependencyTable,
        platform: &str,
    ) -> Result<ProvisionReport> {
        let deps = table.for_platform(platform)?;
        tracing::debug!("{} dependencies for {platform}", deps.len());
        self.provision_all(deps).await
    }

    /// Provision the given dependencies in order, stopping at the first fatal error
    pub async fn provision_all(&self, deps: &[Dependency]) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();

        for dep in deps {
            let outcome = self.process_dependency(dep).await.inspect_err(|e| {
                tracing::error!("{} dependency failed", dep.name);
                tracing::debug!("{e:?}");
            })?;

            report.dependencies.push(DependencyReport {
                name: dep.name.clone(),
                outcome,
            });
        }

        Ok(report)
    }

    /// Evaluate readiness without downloading or installing anything
    #[must_use]
    pub fn check_all(&self, deps: &[Dependency]) -> Vec<CheckReport> {
        deps.iter()
            .map(|dep| CheckReport {
                name: dep.name.clone(),
                satisfied: is_satisfied(dep, self.runner.as_ref(), &self.options.work_dir),
            })
            .collect()
    }

    /// Check one dependency and provision it if needed
    pub async fn process_dependency(&self, dep: &Dependency) -> Result<Outcome> {
        tracing::debug!("processing dependency {} {}", dep.name, dep.url);

        if self.check(dep).await? {
            tracing::info!("{} dependency is fulfilled", dep.name);
            return Ok(Outcome::AlreadySatisfied);
        }

        tracing::info!("{} dependency processing ...", dep.name);

        let archive = self.options.work_dir.join(dep.artifact_name()?);

        let downloaded = if self.options.skip_download {
            tracing::debug!("Skipping download of {}", dep.url);
            false
        } else {
            self.download(dep, &archive).await?;
            true
        };

        let action = self.post_process(dep, &archive).await?;

        Ok(Outcome::Provisioned { downloaded, action })
    }

    async fn check(&self, dep: &Dependency) -> Result<bool> {
        let runner = Arc::clone(&self.runner);
        let dep = dep.clone();
        let work_dir = self.options.work_dir.clone();

        run_blocking(move || Ok(is_satisfied(&dep, runner.as_ref(), &work_dir))).await
    }

    async fn download(&self, dep: &Dependency, destination: &Path) -> Result<()> {
        tracing::debug!("downloading {}", destination.display());

        let bytes = self
            .fetcher
            .fetch(&dep.url, destination)
            .await
            .map_err(|e| match e {
                SetupError::Download { url, reason, .. } => SetupError::Download {
                    name: dep.name.clone(),
                    url,
                    reason,
                },
                other => SetupError::Download {
                    name: dep.name.clone(),
                    url: dep.url.clone(),
                    reason: other.to_string(),
                },
            })?;

        tracing::debug!("{}: fetched {bytes} bytes", dep.name);
        Ok(())
    }

    async fn post_process(&self, dep: &Dependency, archive: &Path) -> Result<ActionTaken> {
        match dep.post_action() {
            PostAction::Exec(command) => {
                tracing::debug!("Running executable {command}");

                let fail = |reason: String| SetupError::PostProcessExec {
                    name: dep.name.clone(),
                    command: command.to_string(),
                    reason,
                };

                let runner = Arc::clone(&self.runner);
                let command_line = command.to_string();
                let work_dir = self.options.work_dir.clone();
                let status = run_blocking(move || runner.run(&command_line, &work_dir))
                    .await
                    .map_err(|e| match e {
                        SetupError::Launch { reason, .. } => fail(reason),
                        other => fail(other.to_string()),
                    })?;

                if !status.success() {
                    return Err(fail(match status.code {
                        Some(code) => format!("exited with status {code}"),
                        None => "terminated by signal".to_string(),
                    }));
                }

                Ok(ActionTaken::Executed)
            }
            PostAction::ExtractTo(dir) => {
                let destination = self.options.work_dir.join(dir);
                tracing::debug!(
                    "Extracting {} to {}",
                    archive.display(),
                    destination.display()
                );

                let extractor = Arc::clone(&self.extractor);
                let archive_path = archive.to_path_buf();
                let files = run_blocking(move || extractor.extract_all(&archive_path, &destination))
                    .await
                    .map_err(|e| match e {
                        SetupError::ArchiveExtract {
                            archive, reason, ..
                        } => SetupError::ArchiveExtract {
                            name: dep.name.clone(),
                            archive,
                            reason,
                        },
                        other => SetupError::ArchiveExtract {
                            name: dep.name.clone(),
                            archive: archive.display().to_string(),
                            reason: other.to_string(),
                        },
                    })?;

                Ok(ActionTaken::Extracted { files })
            }
            PostAction::None => {
                tracing::debug!("{}: no post-processing configured", dep.name);
                Ok(ActionTaken::Nothing)
            }
        }
    }
}

/// Run blocking work (child processes, archive IO) off the async workers
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SetupError::Io(std::io::Error::other(e)))?
}
