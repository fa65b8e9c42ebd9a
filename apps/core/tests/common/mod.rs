#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashSet;

use bitwarden_alfred_core::cache_crypto::CacheCipher;
use bitwarden_alfred_core::cache_store::CacheStore;
use bitwarden_alfred_core::config::Config;
use bitwarden_alfred_core::dispatcher::Workflow;
use bitwarden_alfred_core::icons::{IconError, IconFetcher};
use bitwarden_alfred_core::jobs::{Job, JobError, JobRunner};
use bitwarden_alfred_core::model::{Folder, VaultItem};
use bitwarden_alfred_core::session::{MemoryTokenStore, SessionState};
use bitwarden_alfred_core::vault_cli::{CliError, VaultCli};

/// Scripted `bw`: the first rule whose prefix matches the joined arguments wins.
#[derive(Default)]
pub struct FakeCli {
    rules: RefCell<Vec<(String, Result<String, String>)>>,
    pub calls: RefCell<Vec<Vec<String>>>,
}

impl FakeCli {
    pub fn respond(&self, prefix: &str, output: &str) {
        self.rules
            .borrow_mut()
            .push((prefix.to_string(), Ok(output.to_string())));
    }

    pub fn fail(&self, prefix: &str, stderr: &str) {
        self.rules
            .borrow_mut()
            .push((prefix.to_string(), Err(stderr.to_string())));
    }

    pub fn call_lines(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|args| args.join(" ")).collect()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        self.call_lines()
            .iter()
            .filter(|line| line.starts_with(prefix))
            .count()
    }
}

impl VaultCli for FakeCli {
    fn run(&self, args: &[String]) -> Result<String, CliError> {
        self.calls.borrow_mut().push(args.to_vec());
        let line = args.join(" ");
        let rules = self.rules.borrow();
        match rules.iter().find(|(prefix, _)| line.starts_with(prefix.as_str())) {
            Some((_, Ok(output))) => Ok(output.clone()),
            Some((_, Err(stderr))) => Err(CliError::Failed {
                status: Some(1),
                stderr: stderr.clone(),
            }),
            None => Ok(String::new()),
        }
    }
}

#[derive(Default)]
pub struct FakeJobs {
    running: RefCell<HashSet<String>>,
    pub started: RefCell<Vec<Job>>,
}

impl FakeJobs {
    pub fn with_running(name: &str) -> Self {
        let jobs = Self::default();
        jobs.running.borrow_mut().insert(name.to_string());
        jobs
    }
}

impl JobRunner for FakeJobs {
    fn is_running(&self, name: &str) -> bool {
        self.running.borrow().contains(name)
    }

    fn start(&self, job: Job) -> Result<(), JobError> {
        if self.is_running(job.name()) {
            return Err(JobError::AlreadyRunning(job.name()));
        }
        self.running.borrow_mut().insert(job.name().to_string());
        self.started.borrow_mut().push(job);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeIcons {
    pub fetched: RefCell<Vec<String>>,
    pub failing: HashSet<String>,
}

impl IconFetcher for FakeIcons {
    fn fetch(&self, host: &str) -> Result<Vec<u8>, IconError> {
        self.fetched.borrow_mut().push(host.to_string());
        if self.failing.contains(host) {
            return Err(IconError::Empty(host.to_string()));
        }
        Ok(b"\x89PNG".to_vec())
    }
}

/// Owns every collaborator of a `Workflow`, with all paths inside a temp dir.
pub struct Harness {
    pub dir: tempfile::TempDir,
    pub config: Config,
    pub store: CacheStore,
    pub cli: FakeCli,
    pub jobs: FakeJobs,
    pub tokens: MemoryTokenStore,
    pub icons: FakeIcons,
    pub session: SessionState,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = temp_config(dir.path());
        Self {
            store: CacheStore::open_memory()
                .unwrap()
                .with_cipher(CacheCipher::generate()),
            config,
            dir,
            cli: FakeCli::default(),
            jobs: FakeJobs::default(),
            tokens: MemoryTokenStore::default(),
            icons: FakeIcons::default(),
            session: SessionState::new("user-1", "session-key"),
        }
    }

    /// Fresh icon and auto-fetch markers so searches render straight away.
    pub fn with_fresh_markers(self) -> Self {
        use bitwarden_alfred_core::cache_store::Marker;
        self.store.store_timestamp(Marker::IconCache).unwrap();
        self.store.store_timestamp(Marker::AutoFetch).unwrap();
        self
    }

    pub fn with_vault(self, items: &[VaultItem], folders: &[Folder]) -> Self {
        bitwarden_alfred_core::sync::write_cache(&self.store, items, folders).unwrap();
        self
    }

    pub fn wf(&self) -> Workflow<'_> {
        Workflow {
            config: self.config.clone(),
            session: self.session.clone(),
            store: &self.store,
            cli: &self.cli,
            jobs: &self.jobs,
            tokens: &self.tokens,
            icons: &self.icons,
        }
    }
}

pub fn temp_config(root: &std::path::Path) -> Config {
    Config {
        data_dir: root.join("data"),
        cache_dir: root.join("cache"),
        config_path: root.join("data").join("config.toml"),
        bw_data_path: root.join("bw").join("data.json"),
        ..Config::default()
    }
}

pub fn login_item(id: &str, folder_id: &str, name: &str, username: &str, uri: &str) -> VaultItem {
    let folder_id = if folder_id.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::Value::from(folder_id)
    };
    serde_json::from_value(serde_json::json!({
        "id": id,
        "folderId": folder_id,
        "type": 1,
        "name": name,
        "login": {
            "username": username,
            "password": "hunter2",
            "totp": null,
            "uris": [{"uri": uri}]
        }
    }))
    .unwrap()
}

pub fn folder(id: &str, name: &str) -> Folder {
    Folder {
        id: id.to_string(),
        name: name.to_string(),
    }
}
