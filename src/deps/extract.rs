use crate::error::{Result, SetupError};
use std::fs::{self, File};
use std::io;
use std::path::Path;

/// Unpacks a downloaded archive
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every entry of `archive` below `destination`, returning the
    /// number of files written
    ///
    /// # Errors
    /// Returns `SetupError::ArchiveExtract` if the archive cannot be opened or
    /// read, or if an entry would land outside `destination`.
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<usize>;
}

/// Zip archive extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct ZipExtractor;

impl ZipExtractor {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ArchiveExtractor for ZipExtractor {
    fn extract_all(&self, archive: &Path, destination: &Path) -> Result<usize> {
        let fail = |reason: String| SetupError::ArchiveExtract {
            name: String::new(),
            archive: archive.display().to_string(),
            reason,
        };

        let file = File::open(archive).map_err(|e| fail(format!("cannot open: {e}")))?;
        let mut zip =
            zip::ZipArchive::new(file).map_err(|e| fail(format!("not a valid zip: {e}")))?;

        fs::create_dir_all(destination)?;

        let mut extracted = 0;
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| fail(format!("failed to read entry {i}: {e}")))?;

            // Reject absolute paths and `..` components
            let relative = entry
                .enclosed_name()
                .ok_or_else(|| fail(format!("entry escapes destination: {}", entry.name())))?;
            let out_path = destination.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| fail(format!("failed to write {}: {e}", out_path.display())))?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    fs::set_permissions(&out_path, fs::Permissions::from_mode(mode & 0o7777))?;
                }
            }

            extracted += 1;
        }

        tracing::debug!(
            "Extracted {extracted} files from {} to {}",
            archive.display(),
            destination.display()
        );

        Ok(extracted)
    }
}
