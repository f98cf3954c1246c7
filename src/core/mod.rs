pub mod docker;
pub mod error;
pub mod discovery;
pub mod labels;
pub mod executor;
pub mod retention;
pub mod schedule;
pub mod scheduler;

pub use docker::{ContainerInfo, ContainerRuntime, DockerRuntime, ExecOutput};
pub use error::{BackupError, Stage};
pub use discovery::Discovery;
pub use labels::BackupConfig;
pub use executor::{Artifact, ExitCode, Executor, OutputScan, Strict, SuccessCheck};
pub use retention::{prune, PruneReport};
pub use schedule::{CronSchedule, ScheduleIndex, Selection};
pub use scheduler::{BackupRunResult, RunSummary, Scheduler};
