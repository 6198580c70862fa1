use clap::Parser;
use sdk_setup::config::Config;
use sdk_setup::deps::{
    current_platform, prepare_work_dir, Dependency, DependencyTable, Outcome, ProvisionOptions,
    Provisioner,
};
use sdk_setup::error::Result;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdk-setup")]
#[command(about = "Initial setup of an SDK workspace: downloads and installs third-party dependencies", long_about = None)]
struct Cli {
    /// Be more verbose
    #[arg(short, long)]
    verbose: bool,

    /// Omit download steps
    #[arg(long)]
    skip_download: bool,

    /// Provision the dependency list of another platform (Windows, Linux, Darwin)
    #[arg(long)]
    platform: Option<String>,

    /// Load the dependency table from a JSON file
    #[arg(long, value_name = "PATH")]
    deps_file: Option<PathBuf>,

    /// Directory to download, extract and install into
    #[arg(short = 'C', long, value_name = "DIR")]
    work_dir: Option<PathBuf>,

    /// Config file (default: ~/.config/sdk-setup/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Only report which dependencies are satisfied
    #[arg(long, conflicts_with = "list")]
    check_only: bool,

    /// Print the dependency table for the platform and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = match cli.config {
        Some(path) => {
            tracing::debug!("Config path: {}", path.display());
            Config::load_from(&path)?
        }
        None => Config::load()?,
    };

    let platform = cli
        .platform
        .or(config.setup.platform)
        .unwrap_or_else(|| current_platform().to_string());

    let table = match cli.deps_file.or(config.setup.deps_file) {
        Some(path) => {
            tracing::debug!("Loading dependency table from {}", path.display());
            DependencyTable::load(&path)?
        }
        None => DependencyTable::embedded()?,
    };

    if cli.list {
        print_table(&platform, table.for_platform(&platform)?);
        return Ok(ExitCode::SUCCESS);
    }

    let work_dir = cli
        .work_dir
        .or(config.setup.work_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let work_dir = prepare_work_dir(&work_dir)?;
    tracing::debug!("Working directory: {}", work_dir.display());

    let options = ProvisionOptions {
        skip_download: cli.skip_download,
        work_dir,
    };
    let provisioner = Provisioner::new(&config.download, options)?;

    if cli.check_only {
        let checks = provisioner.check_all(table.for_platform(&platform)?);
        let mut all_satisfied = true;
        for check in &checks {
            let state = if check.satisfied { "fulfilled" } else { "missing" };
            println!("{:<40} {state}", check.name);
            all_satisfied &= check.satisfied;
        }
        return Ok(if all_satisfied {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    tracing::info!("Setting up dependencies for {platform}");
    let report = provisioner.provision(&table, &platform).await?;

    for dep in &report.dependencies {
        if let Outcome::Provisioned { downloaded, action } = dep.outcome {
            tracing::debug!("{}: downloaded={downloaded} action={action:?}", dep.name);
        }
    }
    tracing::info!(
        "Done: {} already fulfilled, {} provisioned",
        report.satisfied_count(),
        report.provisioned_count()
    );

    Ok(ExitCode::SUCCESS)
}

fn print_table(platform: &str, deps: &[Dependency]) {
    println!("Dependencies for {platform}:");
    for dep in deps {
        println!("  {}", dep.name);
        println!("    url:   {}", dep.url);
        println!("    check: {:?}", dep.readiness());
        println!("    after: {:?}", dep.post_action());
    }
}
