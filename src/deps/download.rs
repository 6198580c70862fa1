use crate::config::DownloadConfig;
use crate::error::{Result, SetupError};
use async_trait::async_trait;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Fetches an artifact to a local file
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `destination`, returning the number of bytes written
    ///
    /// The error's `reason` describes the failure; the caller attaches the
    /// dependency name.
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}

/// HTTP(S) downloader backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
    show_progress: bool,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("client", &"Client { ... }")
            .field("show_progress", &self.show_progress)
            .finish()
    }
}

impl HttpFetcher {
    /// Create new fetcher from config
    pub fn new(config: &DownloadConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        let client = builder
            .build()
            .map_err(|e| SetupError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            show_progress: config.show_progress,
        })
    }

    fn progress_bar(&self, total: Option<u64>, file_name: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }

        match total {
            Some(total) => {
                let pb = ProgressBar::new(total);
                if let Ok(style) = ProgressStyle::with_template(
                    "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})",
                ) {
                    pb.set_style(style.progress_chars("█▓░"));
                }
                pb.set_message(file_name.to_string());
                pb
            }
            None => {
                let pb = ProgressBar::new_spinner();
                if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} {bytes}") {
                    pb.set_style(style);
                }
                pb.set_message(file_name.to_string());
                pb
            }
        }
    }

    async fn stream_to_file(
        &self,
        response: reqwest::Response,
        tmp_path: &Path,
        file_name: &str,
    ) -> std::result::Result<u64, String> {
        let pb = self.progress_bar(response.content_length(), file_name);

        let mut file = fs::File::create(tmp_path)
            .await
            .map_err(|e| format!("cannot create {}: {e}", tmp_path.display()))?;

        let mut downloaded = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| format!("error reading download stream: {e}"))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| format!("error writing {}: {e}", tmp_path.display()))?;
            downloaded += chunk.len() as u64;
            pb.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| format!("error writing {}: {e}", tmp_path.display()))?;
        pb.finish_and_clear();

        Ok(downloaded)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64> {
        let fail = |reason: String| SetupError::Download {
            name: String::new(),
            url: url.to_string(),
            reason,
        };

        let file_name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!("Downloading {url} to {}", destination.display());

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(fail(format!("HTTP {status}")));
        }

        // Write to temporary file, then rename into place
        let tmp_path = partial_path(destination);
        match self.stream_to_file(response, &tmp_path, &file_name).await {
            Ok(bytes) => {
                if let Err(e) = fs::rename(&tmp_path, destination).await {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(fail(format!(
                        "cannot move download to {}: {e}",
                        destination.display()
                    )));
                }
                tracing::debug!("Downloaded {file_name} ({})", format_bytes(bytes));
                Ok(bytes)
            }
            Err(reason) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(fail(reason))
            }
        }
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Format bytes as human-readable string
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}
