use async_trait::async_trait;
use sdk_setup::config::DownloadConfig;
use sdk_setup::deps::{
    ActionTaken, ArchiveExtractor, CommandRunner, Dependency, DependencyTable, Fetcher, Outcome,
    ProvisionOptions, Provisioner, RunStatus, ZipExtractor,
};
use sdk_setup::error::{Result, SetupError};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Fetcher that records requests and writes a fixed payload
#[derive(Clone, Default)]
struct RecordingFetcher {
    calls: Arc<Mutex<Vec<(String, PathBuf)>>>,
    payload: Vec<u8>,
    fail: bool,
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), destination.to_path_buf()));

        if self.fail {
            return Err(SetupError::Download {
                name: String::new(),
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }

        std::fs::write(destination, &self.payload)?;
        Ok(self.payload.len() as u64)
    }
}

/// Runner with scripted exit codes; unknown commands are "not found"
#[derive(Clone, Default)]
struct ScriptedRunner {
    codes: HashMap<String, i32>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedRunner {
    fn with(mut self, command: &str, code: i32) -> Self {
        self.codes.insert(command.to_string(), code);
        self
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, command_line: &str, _work_dir: &Path) -> Result<RunStatus> {
        self.calls.lock().unwrap().push(command_line.to_string());
        match self.codes.get(command_line) {
            Some(code) => Ok(RunStatus { code: Some(*code) }),
            None => Err(SetupError::Launch {
                command: command_line.to_string(),
                reason: "not found".to_string(),
            }),
        }
    }
}

/// Extractor that records calls without touching the filesystem
#[derive(Clone, Default)]
struct RecordingExtractor {
    calls: Arc<Mutex<Vec<(PathBuf, PathBuf)>>>,
}

impl ArchiveExtractor for RecordingExtractor {
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<usize> {
        self.calls
            .lock()
            .unwrap()
            .push((archive.to_path_buf(), destination.to_path_buf()));
        Ok(1)
    }
}

fn tool_dependency() -> Dependency {
    serde_json::from_str(
        r#"{
            "name": "Tool",
            "url": "https://example.com/tool.zip",
            "check": {"exists": "out/tool.exe"},
            "after": {"extract_to": "out"}
        }"#,
    )
    .unwrap()
}

fn installer_dependency(check: &str, exec: &str) -> Dependency {
    Dependency {
        name: "Installer".to_string(),
        url: "https://example.com/setup.msi".to_string(),
        check: sdk_setup::deps::descriptor::CheckSpec {
            cmd: Some(check.to_string()),
            exists: None,
        },
        after: sdk_setup::deps::descriptor::AfterSpec {
            exec: Some(exec.to_string()),
            extract_to: None,
        },
    }
}

fn provisioner(work_dir: &Path, skip_download: bool) -> Provisioner {
    let options = ProvisionOptions {
        skip_download,
        work_dir: work_dir.to_path_buf(),
    };
    Provisioner::new(&DownloadConfig::default(), options).expect("Failed to create provisioner")
}

fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[tokio::test]
async fn test_missing_dependency_is_downloaded_and_extracted() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let extractor = RecordingExtractor::default();

    let provisioner = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_extractor(extractor.clone());

    let report = provisioner
        .provision_all(&[tool_dependency()])
        .await
        .expect("Provisioning failed");

    let fetches = fetcher.calls.lock().unwrap();
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].0, "https://example.com/tool.zip");
    assert_eq!(fetches[0].1, dir.path().join("tool.zip"));

    let extractions = extractor.calls.lock().unwrap();
    assert_eq!(extractions.len(), 1);
    assert_eq!(extractions[0].0, dir.path().join("tool.zip"));
    assert_eq!(extractions[0].1, dir.path().join("out"));

    assert_eq!(
        report.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: true,
            action: ActionTaken::Extracted { files: 1 },
        }
    );
}

#[tokio::test]
async fn test_satisfied_dependency_is_skipped() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/tool.exe"), b"").unwrap();

    let fetcher = RecordingFetcher::default();
    let extractor = RecordingExtractor::default();

    let report = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_extractor(extractor.clone())
        .provision_all(&[tool_dependency()])
        .await
        .unwrap();

    assert!(fetcher.calls.lock().unwrap().is_empty());
    assert!(extractor.calls.lock().unwrap().is_empty());
    assert_eq!(report.dependencies[0].outcome, Outcome::AlreadySatisfied);
    assert_eq!(report.satisfied_count(), 1);
}

#[tokio::test]
async fn test_download_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher {
        fail: true,
        ..RecordingFetcher::default()
    };
    let extractor = RecordingExtractor::default();

    let second = Dependency {
        name: "Second".to_string(),
        ..tool_dependency()
    };

    let result = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_extractor(extractor.clone())
        .provision_all(&[tool_dependency(), second])
        .await;

    match result {
        Err(SetupError::Download { name, url, .. }) => {
            assert_eq!(name, "Tool");
            assert_eq!(url, "https://example.com/tool.zip");
        }
        other => panic!("Expected download error, got {other:?}"),
    }

    // Run stops at the first failure
    assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    assert!(extractor.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_skip_download_still_post_processes() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let extractor = RecordingExtractor::default();

    let report = provisioner(dir.path(), true)
        .with_fetcher(fetcher.clone())
        .with_extractor(extractor.clone())
        .provision_all(&[tool_dependency()])
        .await
        .unwrap();

    assert!(fetcher.calls.lock().unwrap().is_empty());
    assert_eq!(extractor.calls.lock().unwrap().len(), 1);
    assert_eq!(
        report.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: false,
            action: ActionTaken::Extracted { files: 1 },
        }
    );
}

#[tokio::test]
async fn test_skip_download_without_local_archive_fails() {
    let dir = TempDir::new().unwrap();

    let result = provisioner(dir.path(), true)
        .with_fetcher(RecordingFetcher::default())
        .provision_all(&[tool_dependency()])
        .await;

    match result {
        Err(SetupError::ArchiveExtract { name, .. }) => assert_eq!(name, "Tool"),
        other => panic!("Expected extract error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_failing_check_command_triggers_install() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let runner = ScriptedRunner::default()
        .with("cmake --version", 1)
        .with("setup.msi", 0);

    let report = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_runner(runner.clone())
        .provision_all(&[installer_dependency("cmake --version", "setup.msi")])
        .await
        .unwrap();

    assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    assert_eq!(
        *runner.calls.lock().unwrap(),
        vec!["cmake --version".to_string(), "setup.msi".to_string()]
    );
    assert_eq!(
        report.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: true,
            action: ActionTaken::Executed,
        }
    );
}

#[tokio::test]
async fn test_missing_check_command_triggers_install() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let runner = ScriptedRunner::default().with("setup.msi", 0);

    provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_runner(runner)
        .provision_all(&[installer_dependency("cmake --version", "setup.msi")])
        .await
        .unwrap();

    assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_passing_check_command_skips_install() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let runner = ScriptedRunner::default().with("cmake --version", 0);

    let report = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_runner(runner.clone())
        .provision_all(&[installer_dependency("cmake --version", "setup.msi")])
        .await
        .unwrap();

    assert!(fetcher.calls.lock().unwrap().is_empty());
    assert_eq!(runner.calls.lock().unwrap().len(), 1);
    assert_eq!(report.dependencies[0].outcome, Outcome::AlreadySatisfied);
}

#[tokio::test]
async fn test_installer_failure_is_fatal() {
    let dir = TempDir::new().unwrap();
    let runner = ScriptedRunner::default().with("setup.msi", 1603);

    let result = provisioner(dir.path(), false)
        .with_fetcher(RecordingFetcher::default())
        .with_runner(runner)
        .provision_all(&[installer_dependency("cmake --version", "setup.msi")])
        .await;

    match result {
        Err(SetupError::PostProcessExec {
            name,
            command,
            reason,
        }) => {
            assert_eq!(name, "Installer");
            assert_eq!(command, "setup.msi");
            assert!(reason.contains("1603"));
        }
        other => panic!("Expected exec error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_installer_launch_failure_is_fatal() {
    let dir = TempDir::new().unwrap();

    let result = provisioner(dir.path(), false)
        .with_fetcher(RecordingFetcher::default())
        .with_runner(ScriptedRunner::default())
        .provision_all(&[installer_dependency("cmake --version", "setup.msi")])
        .await;

    match result {
        Err(SetupError::PostProcessExec { command, reason, .. }) => {
            assert_eq!(command, "setup.msi");
            assert_eq!(reason, "not found");
        }
        other => panic!("Expected exec error, got {other:?}"),
    }
}

/// Runner that only succeeds once another task on the runtime signals it
struct HandshakeRunner {
    signal: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl CommandRunner for HandshakeRunner {
    fn run(&self, _command_line: &str, _work_dir: &Path) -> Result<RunStatus> {
        let signal = self.signal.lock().unwrap();
        match signal.recv_timeout(std::time::Duration::from_secs(5)) {
            Ok(()) => Ok(RunStatus { code: Some(0) }),
            Err(_) => Ok(RunStatus { code: Some(99) }),
        }
    }
}

#[tokio::test(flavor = "current_thread")]
async fn test_installer_runs_off_the_async_thread() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = std::sync::mpsc::channel();
    let dep: Dependency = serde_json::from_str(
        r#"{
            "name": "Installer",
            "url": "https://example.com/setup.msi",
            "check": {"exists": "installed.marker"},
            "after": {"exec": "setup.msi"}
        }"#,
    )
    .unwrap();

    // Can only run if the installer is not blocking the single runtime thread
    let notifier = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(()).unwrap();
    });

    let report = provisioner(dir.path(), true)
        .with_runner(HandshakeRunner {
            signal: Mutex::new(rx),
        })
        .provision_all(&[dep])
        .await
        .unwrap();

    notifier.await.unwrap();
    assert_eq!(
        report.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: false,
            action: ActionTaken::Executed
        }
    );
}

#[tokio::test]
async fn test_no_check_and_no_action() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let dep: Dependency =
        serde_json::from_str(r#"{"name": "Raw", "url": "https://example.com/data.bin"}"#).unwrap();

    let report = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .provision_all(&[dep])
        .await
        .unwrap();

    assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    assert_eq!(
        report.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: true,
            action: ActionTaken::Nothing,
        }
    );
}

#[tokio::test]
async fn test_empty_platform_is_error() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let table = DependencyTable::embedded().unwrap();

    let result = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .provision(&table, "Linux")
        .await;

    assert!(matches!(result, Err(SetupError::NoDependencies { .. })));
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_provision_by_platform() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher::default();
    let extractor = RecordingExtractor::default();

    let mut table = DependencyTable::default();
    table.insert("TestOS", vec![tool_dependency()]);

    let report = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_extractor(extractor.clone())
        .provision(&table, "TestOS")
        .await
        .unwrap();

    assert_eq!(report.dependencies.len(), 1);
    assert_eq!(report.provisioned_count(), 1);
}

#[tokio::test]
async fn test_real_archive_rerun_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let fetcher = RecordingFetcher {
        payload: zip_bytes(&[("tool.exe", b"binary"), ("docs/README", b"read me")]),
        ..RecordingFetcher::default()
    };

    let provisioner = provisioner(dir.path(), false)
        .with_fetcher(fetcher.clone())
        .with_extractor(ZipExtractor::new());

    let first = provisioner.provision_all(&[tool_dependency()]).await.unwrap();
    assert_eq!(
        first.dependencies[0].outcome,
        Outcome::Provisioned {
            downloaded: true,
            action: ActionTaken::Extracted { files: 2 },
        }
    );
    assert_eq!(
        std::fs::read(dir.path().join("out/tool.exe")).unwrap(),
        b"binary"
    );
    assert!(dir.path().join("out/docs/README").exists());

    let second = provisioner.provision_all(&[tool_dependency()]).await.unwrap();
    assert_eq!(second.dependencies[0].outcome, Outcome::AlreadySatisfied);
    assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
}

#[test]
fn test_check_all() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("out")).unwrap();
    std::fs::write(dir.path().join("out/tool.exe"), b"").unwrap();

    let runner = ScriptedRunner::default().with("cmake --version", 1);
    let checks = provisioner(dir.path(), false)
        .with_runner(runner)
        .check_all(&[
            tool_dependency(),
            installer_dependency("cmake --version", "setup.msi"),
        ]);

    assert_eq!(checks.len(), 2);
    assert!(checks[0].satisfied);
    assert!(!checks[1].satisfied);
}
