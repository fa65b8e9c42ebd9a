use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use walkdir::WalkDir;

use crate::cache_store::Marker;
use crate::config::Config;
use crate::contract::Outcome;
use crate::dispatcher::Workflow;
use crate::jobs::{self, Job};
use crate::model::VaultItem;
use crate::vault_search;

const ICON_EXTENSION: &str = "png";

#[derive(Debug, Error)]
pub enum IconError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("empty icon for {0}")]
    Empty(String),
}

pub trait IconFetcher {
    fn fetch(&self, host: &str) -> Result<Vec<u8>, IconError>;
}

/// Downloads `<base>/<host>/icon.png` from a Bitwarden-style icon service.
pub struct HttpIconFetcher {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpIconFetcher {
    pub fn new(base_url: &str) -> Result<Self, IconError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("bitwarden-alfred-workflow/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl IconFetcher for HttpIconFetcher {
    fn fetch(&self, host: &str) -> Result<Vec<u8>, IconError> {
        let url = format!("{}/{host}/icon.png", self.base_url);
        let bytes = self.client.get(url).send()?.error_for_status()?.bytes()?;
        if bytes.is_empty() {
            return Err(IconError::Empty(host.to_string()));
        }
        Ok(bytes.to_vec())
    }
}

pub fn icon_file(cfg: &Config, host: &str) -> PathBuf {
    cfg.icons_dir().join(format!("{host}.{ICON_EXTENSION}"))
}

/// Hosts that already have a favicon on disk.
pub fn cached_hosts(icons_dir: &Path) -> HashSet<String> {
    WalkDir::new(icons_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == ICON_EXTENSION)
        })
        .filter_map(|entry| {
            entry
                .path()
                .file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
        .collect()
}

/// Distinct URI hosts across `items` with no cached favicon, sorted.
pub fn missing_hosts(items: &[VaultItem], cached: &HashSet<String>) -> Vec<String> {
    items
        .iter()
        .flat_map(|item| item.uris().filter_map(crate::model::uri_host).collect::<Vec<_>>())
        .filter(|host| !cached.contains(host))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn run_icons(wf: &Workflow<'_>, background: bool) -> Outcome {
    if background {
        return Outcome::Text(match jobs::start_unless_running(wf.jobs, Job::Icons) {
            Ok(true) => "Downloading favicons in the background.".to_string(),
            Ok(false) => "Favicon download already running.".to_string(),
            Err(error) => {
                crate::logging::error(&format!("cannot start icon job: {error}"));
                format!("Unable to start favicon download: {error}")
            }
        });
    }

    let Some(data) = vault_search::load_cached(wf.store) else {
        return Outcome::Text("No cached items. Run a sync first.".to_string());
    };

    let icons_dir = wf.config.icons_dir();
    if let Err(error) = std::fs::create_dir_all(&icons_dir) {
        crate::logging::error(&format!("cannot create icons dir: {error}"));
        return Outcome::Text(format!("Unable to create icon cache: {error}"));
    }

    let missing = missing_hosts(&data.items, &cached_hosts(&icons_dir));
    let mut downloaded = 0_usize;
    let mut failed = 0_usize;
    for host in &missing {
        let result = wf
            .icons
            .fetch(host)
            .and_then(|bytes| Ok(std::fs::write(icon_file(&wf.config, host), bytes)?));
        match result {
            Ok(()) => downloaded += 1,
            Err(error) => {
                failed += 1;
                crate::logging::warn(&format!("favicon for {host} failed: {error}"));
            }
        }
    }

    if let Err(error) = wf.store.store_timestamp(Marker::IconCache) {
        crate::logging::error(&format!("cannot refresh icon marker: {error}"));
    }
    crate::logging::info(&format!(
        "favicons downloaded={downloaded} failed={failed} hosts={}",
        missing.len()
    ));

    if failed == 0 {
        Outcome::Text(format!("Downloaded {downloaded} favicons."))
    } else {
        Outcome::Text(format!("Downloaded {downloaded} favicons, {failed} failed."))
    }
}
