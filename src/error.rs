use thiserror::Error;

/// Main error type for sdk-setup
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("No dependencies defined for platform '{platform}'\n\nTroubleshooting:\n- Check the platform name (Windows, Linux, Darwin)\n- Use --list to inspect the dependency table\n- Pass --deps-file to use a custom table")]
    NoDependencies { platform: String },

    #[error("Failed to download {name} from {url}: {reason}\n\nTroubleshooting:\n- Check internet connection\n- Verify the URL is still reachable\n- Re-run with --skip-download if the file is already present")]
    Download {
        name: String,
        url: String,
        reason: String,
    },

    #[error("Failed to run '{command}' for {name}: {reason}")]
    PostProcessExec {
        name: String,
        command: String,
        reason: String,
    },

    #[error("Failed to extract {archive} for {name}: {reason}\n\nTroubleshooting:\n- Delete the archive and run again to download a fresh copy\n- Check free disk space in the target directory")]
    ArchiveExtract {
        name: String,
        archive: String,
        reason: String,
    },

    #[error("Failed to launch '{command}': {reason}")]
    Launch { command: String, reason: String },

    #[error("Readiness check '{command}' failed: {reason}")]
    ReadinessCheck { command: String, reason: String },

    #[error("Dependency table error: {0}")]
    Table(String),

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/sdk-setup/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SetupError>;
