use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use crate::cache_store::Marker;

/// Set in the environment of a detached job so the child can clean up its pid file.
pub const JOB_ENV: &str = "BITWARDEN_ALFRED_JOB";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("job already running: {0}")]
    AlreadyRunning(&'static str),
    #[error("failed to spawn job {name}: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Long-running work done by a detached copy of this binary. Its only signal
/// back is the completion marker, read on a later invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Sync { force: bool },
    Icons,
}

impl Job {
    pub const SYNC: &'static str = "sync";
    pub const ICONS: &'static str = "icons";

    pub fn name(self) -> &'static str {
        match self {
            Self::Sync { .. } => Self::SYNC,
            Self::Icons => Self::ICONS,
        }
    }

    pub fn completion_marker(self) -> Marker {
        match self {
            Self::Sync { .. } => Marker::Sync,
            Self::Icons => Marker::IconCache,
        }
    }

    /// Arguments for the child process; the foreground variant of the operation.
    pub fn args(self) -> Vec<String> {
        let args: &[&str] = match self {
            Self::Sync { force: true } => &["--sync", "--force"],
            Self::Sync { force: false } => &["--sync"],
            Self::Icons => &["--icons"],
        };
        args.iter().map(|arg| arg.to_string()).collect()
    }
}

pub trait JobRunner {
    fn is_running(&self, name: &str) -> bool;
    fn start(&self, job: Job) -> Result<(), JobError>;
}

/// Starts jobs as detached processes and tracks them by pid file.
pub struct ProcessJobRunner {
    jobs_dir: PathBuf,
    exe: PathBuf,
}

impl ProcessJobRunner {
    pub fn new(jobs_dir: &Path, exe: &Path) -> Self {
        Self {
            jobs_dir: jobs_dir.to_path_buf(),
            exe: exe.to_path_buf(),
        }
    }

    fn pid_path(&self, name: &str) -> PathBuf {
        pid_path(&self.jobs_dir, name)
    }
}

impl JobRunner for ProcessJobRunner {
    fn is_running(&self, name: &str) -> bool {
        let path = self.pid_path(name);
        let Ok(raw) = std::fs::read_to_string(&path) else {
            return false;
        };
        let Ok(pid) = raw.trim().parse::<u32>() else {
            let _ = std::fs::remove_file(&path);
            return false;
        };

        if process_alive(pid) {
            return true;
        }
        let _ = std::fs::remove_file(&path);
        false
    }

    fn start(&self, job: Job) -> Result<(), JobError> {
        let name = job.name();
        if self.is_running(name) {
            return Err(JobError::AlreadyRunning(name));
        }

        std::fs::create_dir_all(&self.jobs_dir)?;
        let child = Command::new(&self.exe)
            .args(job.args())
            .env(JOB_ENV, name)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| JobError::Spawn { name, source })?;

        std::fs::write(self.pid_path(name), child.id().to_string())?;
        crate::logging::info(&format!("started background job {name} pid={}", child.id()));
        Ok(())
    }
}

/// Returns `Ok(false)` when a job of the same name is already running.
pub fn start_unless_running(jobs: &dyn JobRunner, job: Job) -> Result<bool, JobError> {
    if jobs.is_running(job.name()) {
        return Ok(false);
    }
    match jobs.start(job) {
        Ok(()) => Ok(true),
        Err(JobError::AlreadyRunning(_)) => Ok(false),
        Err(error) => Err(error),
    }
}

/// Called by the child when its work is done.
pub fn finish(jobs_dir: &Path, name: &str) {
    let _ = std::fs::remove_file(pid_path(jobs_dir, name));
}

fn pid_path(jobs_dir: &Path, name: &str) -> PathBuf {
    jobs_dir.join(format!("{name}.pid"))
}

fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}
