use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "https://bitwarden.com";
pub const DEFAULT_WEBUI_URL: &str = "https://vault.bitwarden.com";
const APP_DIR_NAME: &str = "bitwarden-alfred";
const CONFIG_FILE_NAME: &str = "config.toml";
const CACHE_DB_FILE_NAME: &str = "cache.sqlite3";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub email: String,
    pub server: String,
    pub webui: String,
    pub sfa: bool,
    pub sfa_mode: i32,
    pub use_apikey: bool,
    pub max_results: u16,
    pub reordering_disabled: bool,
    pub icon_cache_enabled: bool,
    pub icon_cache_age_secs: u64,
    pub auto_fetch_icon_cache_age_secs: u64,
    pub bw_exec: String,
    pub bw_data_path: PathBuf,
    pub open_command: String,
    pub icon_service_url: String,
    pub search_keyword: String,
    pub folder_keyword: String,
    pub config_keyword: String,
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(skip)]
    pub cache_dir: PathBuf,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = stable_app_data_dir();
        Self {
            email: String::new(),
            server: DEFAULT_SERVER_URL.to_string(),
            webui: DEFAULT_WEBUI_URL.to_string(),
            sfa: false,
            sfa_mode: 0,
            use_apikey: false,
            max_results: 1000,
            reordering_disabled: true,
            icon_cache_enabled: true,
            icon_cache_age_secs: 30 * 86_400,
            auto_fetch_icon_cache_age_secs: 86_400,
            bw_exec: "/usr/local/bin/bw".to_string(),
            bw_data_path: default_bw_data_path(),
            open_command: "/usr/bin/open".to_string(),
            icon_service_url: "https://icons.bitwarden.net".to_string(),
            search_keyword: ".bw".to_string(),
            folder_keyword: ".bwf".to_string(),
            config_keyword: ".bwconfig".to_string(),
            config_path: data_dir.join(CONFIG_FILE_NAME),
            cache_dir: stable_cache_dir(),
            data_dir,
        }
    }
}

impl Config {
    pub fn cache_db_path(&self) -> PathBuf {
        self.cache_dir.join(CACHE_DB_FILE_NAME)
    }

    pub fn icons_dir(&self) -> PathBuf {
        self.data_dir.join("icons")
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.cache_dir.join("jobs")
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.cache_dir.join("attachments")
    }

    /// 2FA mode passed to `bw login --method`, or -1 when 2FA is off.
    pub fn effective_sfa_mode(&self) -> i32 {
        if self.sfa {
            self.sfa_mode
        } else {
            -1
        }
    }
}

/// Alfred exports per-workflow directories; outside Alfred everything lives
/// under the system temp dir.
pub fn stable_app_data_dir() -> PathBuf {
    env_dir("alfred_workflow_data").unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME))
}

pub fn stable_cache_dir() -> PathBuf {
    env_dir("alfred_workflow_cache")
        .unwrap_or_else(|| std::env::temp_dir().join(APP_DIR_NAME).join("cache"))
}

fn env_dir(key: &str) -> Option<PathBuf> {
    std::env::var_os(key)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn default_bw_data_path() -> PathBuf {
    if let Some(dir) = env_dir("BITWARDENCLI_APPDATA_DIR") {
        return dir.join("data.json");
    }
    let home = env_dir("HOME").unwrap_or_default();
    home.join("Library")
        .join("Application Support")
        .join("Bitwarden CLI")
        .join("data.json")
}

pub fn validate(cfg: &Config) -> Result<(), String> {
    crate::settings::validate_max_results(cfg.max_results)?;

    if cfg.bw_exec.trim().is_empty() {
        return Err("bw_exec is required".into());
    }

    if cfg.config_path.as_os_str().is_empty() {
        return Err("config_path is required".into());
    }

    if cfg.cache_dir.as_os_str().is_empty() || cfg.data_dir.as_os_str().is_empty() {
        return Err("data and cache directories are required".into());
    }

    Ok(())
}

/// Reads the config file at `path` (or the default location). A missing file
/// yields defaults; workflow variables then override the file.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let defaults = Config::default();
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| defaults.config_path.clone());

    let mut cfg = match std::fs::read_to_string(&config_path) {
        Ok(raw) => toml::from_str::<Config>(&raw)?,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Config::default(),
        Err(error) => return Err(error.into()),
    };
    cfg.data_dir = defaults.data_dir;
    cfg.cache_dir = defaults.cache_dir;
    cfg.config_path = config_path;

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    validate(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    std::fs::write(&cfg.config_path, raw)?;
    Ok(())
}

pub fn apply_env_overrides<F>(cfg: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = non_empty("BW_EXEC") {
        cfg.bw_exec = value;
    }
    if let Some(value) = non_empty("EMAIL") {
        cfg.email = value;
    }
    if let Some(value) = non_empty("MAX_RESULTS").and_then(|v| v.trim().parse().ok()) {
        cfg.max_results = value;
    }
}
