pub mod check;
pub mod descriptor;
pub mod download;
pub mod exec;
pub mod extract;
pub mod provisioner;
pub mod table;

pub use descriptor::{Dependency, PostAction, Readiness};
pub use download::{Fetcher, HttpFetcher};
pub use exec::{CommandRunner, RunStatus, SystemRunner};
pub use extract::{ArchiveExtractor, ZipExtractor};
pub use provisioner::{
    prepare_work_dir, ActionTaken, CheckReport, DependencyReport, Outcome, ProvisionOptions,
    ProvisionReport, Provisioner,
};
pub use table::{current_platform, DependencyTable};
