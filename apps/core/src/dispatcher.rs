use thiserror::Error;

use crate::action_executor::{self, OpenError};
use crate::auth;
use crate::cache_store::CacheStore;
use crate::config::{self, Config};
use crate::contract::Outcome;
use crate::icons::{self, IconFetcher};
use crate::jobs::JobRunner;
use crate::menus;
use crate::session::{SessionState, TokenStore};
use crate::settings::{self, SettingKey};
use crate::sync::{self, SyncRequest};
use crate::vault_cli::{self, VaultCli};
use crate::vault_search::{self, GetItemRequest, SearchScope};

/// Everything a handler may touch during one invocation.
pub struct Workflow<'a> {
    pub config: Config,
    pub session: SessionState,
    pub store: &'a CacheStore,
    pub cli: &'a dyn VaultCli,
    pub jobs: &'a dyn JobRunner,
    pub tokens: &'a dyn TokenStore,
    pub icons: &'a dyn IconFetcher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Search {
        query: String,
        item_id: Option<String>,
    },
    Folder {
        query: String,
        folder_id: Option<String>,
    },
    GetItem {
        id: String,
        path: String,
        totp: bool,
        attachment: Option<String>,
    },
    Config {
        query: String,
    },
    Auth {
        query: String,
    },
    AuthConfig {
        menu: String,
        query: String,
    },
    SetConfigs {
        key: String,
        value: String,
    },
    Login {
        code: String,
    },
    Logout,
    Lock,
    Unlock,
    Sync(SyncRequest),
    Icons {
        background: bool,
    },
    Open {
        target: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Folder { .. } => "folder",
            Self::GetItem { .. } => "getitem",
            Self::Config { .. } => "conf",
            Self::Auth { .. } => "auth",
            Self::AuthConfig { .. } => "authconfig",
            Self::SetConfigs { .. } => "setconfigs",
            Self::Login { .. } => "login",
            Self::Logout => "logout",
            Self::Lock => "lock",
            Self::Unlock => "unlock",
            Self::Sync(_) => "sync",
            Self::Icons { .. } => "icons",
            Self::Open { .. } => "open",
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Open(#[from] OpenError),
}

pub fn dispatch(wf: &mut Workflow<'_>, operation: Operation) -> Result<Outcome, DispatchError> {
    crate::logging::info(&format!("dispatch {}", operation.name()));

    let outcome = match operation {
        Operation::Search { query, item_id } => Outcome::Feedback(vault_search::run_search(
            wf,
            &query,
            SearchScope::new(false, item_id.as_deref()),
        )),
        Operation::Folder { query, folder_id } => Outcome::Feedback(vault_search::run_search(
            wf,
            &query,
            SearchScope::new(true, folder_id.as_deref()),
        )),
        Operation::GetItem {
            id,
            path,
            totp,
            attachment,
        } => vault_search::run_get_item(
            wf,
            GetItemRequest {
                id: &id,
                path: &path,
                totp,
                attachment: attachment.as_deref(),
            },
        ),
        Operation::Config { query } => Outcome::Feedback(menus::config_menu(&wf.config, &query)),
        Operation::Auth { query } => Outcome::Feedback(menus::auth_menu(&wf.config, &query)),
        Operation::AuthConfig { menu, query } => {
            Outcome::Feedback(menus::authconfig_menu(&wf.config, &menu, &query))
        }
        Operation::SetConfigs { key, value } => run_set_configs(wf, &key, &value),
        Operation::Login { code } => auth::run_login(wf, &code),
        Operation::Logout => auth::run_logout(wf),
        Operation::Lock => auth::run_lock(wf),
        Operation::Unlock => auth::run_unlock(wf),
        Operation::Sync(request) => sync::run_sync(wf, request),
        Operation::Icons { background } => icons::run_icons(wf, background),
        Operation::Open { target } => {
            action_executor::open_target(&wf.config.open_command, &target)?;
            Outcome::Text(String::new())
        }
    };

    Ok(outcome)
}

/// Persists one setting. Only `server` reaches the vault CLI, once per call.
pub fn run_set_configs(wf: &mut Workflow<'_>, key: &str, raw_value: &str) -> Outcome {
    let Some(key) = SettingKey::parse(key) else {
        return Outcome::Text(format!("Unknown setting '{}'.", key.trim()));
    };

    let value = match settings::normalize_value(key, raw_value) {
        Ok(value) => value,
        Err(message) => return Outcome::Text(message),
    };

    if key == SettingKey::Server {
        if let Err(error) = vault_cli::config_server(wf.cli, &value) {
            crate::logging::error(&format!("bw config server failed: {error}"));
            return Outcome::Text(format!(
                "Unable to set Bitwarden server {value}: {}",
                error.user_message()
            ));
        }
    }

    let mut updated = wf.config.clone();
    if let Err(message) = settings::apply(&mut updated, key, &value) {
        return Outcome::Text(message);
    }
    if let Err(error) = config::save(&updated) {
        crate::logging::error(&format!("cannot save config: {error}"));
        return Outcome::Text(format!("Unable to save config: {error}"));
    }
    wf.config = updated;
    crate::logging::info(&format!("set {}", key.as_str()));

    let shown = if key == SettingKey::SfaMode {
        settings::sfa_method_name(wf.config.sfa_mode).to_string()
    } else {
        value
    };
    Outcome::Text(format!("DONE: Set {} to: \n{shown}", key.as_str()))
}
