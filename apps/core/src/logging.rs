//! Append-only file log shared by the foreground process and its detached
//! jobs. Each line carries the pid so interleaved writers can be told apart.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use walkdir::WalkDir;

const LOG_FILE_NAME: &str = "bitwarden-alfred.log";
const ARCHIVE_PREFIX: &str = "bitwarden-alfred-";
const MAX_LOG_BYTES: u64 = 1_000_000;
const MAX_ARCHIVES: usize = 5;

/// Alfred sets this while its workflow debugger is open.
const DEBUG_ENV: &str = "alfred_debug";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
        }
    }
}

struct Sink {
    file: Mutex<File>,
    min_level: Level,
    echo_to_stderr: bool,
}

static SINK: OnceLock<Sink> = OnceLock::new();
static PANIC_HOOK: OnceLock<()> = OnceLock::new();

pub fn logs_dir() -> PathBuf {
    crate::config::stable_app_data_dir().join("logs")
}

pub fn init() -> Result<(), std::io::Error> {
    init_in(&logs_dir())
}

/// Opens the log in `log_dir`, archiving it first when it has grown too big.
/// Later calls in the same process keep the first sink.
pub fn init_in(log_dir: &Path) -> Result<(), std::io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);
    archive_if_oversized(&log_path, log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let debugging = std::env::var(DEBUG_ENV).is_ok_and(|value| value == "1");
    let _ = SINK.set(Sink {
        file: Mutex::new(file),
        min_level: if debugging { Level::Debug } else { Level::Info },
        echo_to_stderr: debugging,
    });

    install_panic_hook();
    Ok(())
}

pub fn debug(message: &str) {
    log(Level::Debug, message);
}

pub fn info(message: &str) {
    log(Level::Info, message);
}

pub fn warn(message: &str) {
    log(Level::Warn, message);
}

pub fn error(message: &str) {
    log(Level::Error, message);
}

pub fn log(level: Level, message: &str) {
    let Some(sink) = SINK.get() else {
        return;
    };
    if level < sink.min_level {
        return;
    }

    let line = format_line(unix_secs(), std::process::id(), level, message);
    if sink.echo_to_stderr {
        eprint!("{line}");
    }
    if let Ok(mut file) = sink.file.lock() {
        let _ = file.write_all(line.as_bytes());
    }
}

fn format_line(ts: u64, pid: u32, level: Level, message: &str) -> String {
    format!("[{ts}] [{}] [{pid}] {message}\n", level.as_str())
}

fn unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn archive_if_oversized(log_path: &Path, log_dir: &Path) -> Result<(), std::io::Error> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if size < MAX_LOG_BYTES {
        return Ok(());
    }

    // Two processes may rotate in the same second; the pid keeps names apart.
    let archived = log_dir.join(format!(
        "{ARCHIVE_PREFIX}{}-{}.log",
        unix_secs(),
        std::process::id()
    ));
    fs::rename(log_path, archived)?;
    prune_archives(log_dir);
    Ok(())
}

fn archives(log_dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(log_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(ARCHIVE_PREFIX) && name.ends_with(".log"))
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

fn prune_archives(log_dir: &Path) {
    let found = archives(log_dir);
    let excess = found.len().saturating_sub(MAX_ARCHIVES);
    for oldest in found.into_iter().take(excess) {
        let _ = fs::remove_file(oldest);
    }
}

fn install_panic_hook() {
    PANIC_HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_default();
            error(&format!("panic at {location}: {payload}"));
            previous(info);
        }));
    });
}
