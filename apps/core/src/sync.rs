use crate::auth::NOT_UNLOCKED_MSG;
use crate::cache_store::{CacheError, CacheStore, Marker};
use crate::contract::Outcome;
use crate::dispatcher::Workflow;
use crate::jobs::{self, Job};
use crate::model::{Folder, VaultItem};
use crate::vault_cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncRequest {
    pub force: bool,
    pub last: bool,
    pub background: bool,
}

pub fn run_sync(wf: &Workflow<'_>, request: SyncRequest) -> Outcome {
    if request.last {
        return Outcome::Text(match vault_cli::last_sync(wf.cli) {
            Ok(date) => format!("Last sync: {date}"),
            Err(error) => {
                crate::logging::error(&format!("sync --last failed: {error}"));
                format!("Unable to get last sync date: {}", error.user_message())
            }
        });
    }

    if request.background {
        let job = Job::Sync {
            force: request.force,
        };
        return Outcome::Text(match jobs::start_unless_running(wf.jobs, job) {
            Ok(true) => "Syncing Bitwarden secrets in the background.".to_string(),
            Ok(false) => "Sync already running.".to_string(),
            Err(error) => {
                crate::logging::error(&format!("cannot start sync job: {error}"));
                format!("Unable to start sync: {error}")
            }
        });
    }

    let Some(session) = wf.session.session_key() else {
        crate::logging::warn("sync skipped: vault is locked");
        return Outcome::Text(NOT_UNLOCKED_MSG.to_string());
    };

    if let Err(error) = vault_cli::sync(wf.cli, session, request.force) {
        crate::logging::error(&format!("bw sync failed: {error}"));
        return Outcome::Text(format!("Unable to sync: {}", error.user_message()));
    }

    let fetched = vault_cli::list_items(wf.cli, session)
        .and_then(|items| Ok((items, vault_cli::list_folders(wf.cli, session)?)));
    let (items, folders) = match fetched {
        Ok(data) => data,
        Err(error) => {
            crate::logging::error(&format!("cannot list vault: {error}"));
            return Outcome::Text(format!("Unable to read the vault: {}", error.user_message()));
        }
    };

    match write_cache(wf.store, &items, &folders) {
        Ok(()) => {
            crate::logging::info(&format!(
                "sync done items={} folders={}",
                items.len(),
                folders.len()
            ));
            Outcome::Text(format!("Synced {} items.", items.len()))
        }
        Err(error) => {
            crate::logging::error(&format!("cannot write vault cache: {error}"));
            Outcome::Text(format!("Unable to write the cache: {error}"))
        }
    }
}

/// Secrets are blanked and the rest is sealed before anything reaches disk.
pub fn write_cache(
    store: &CacheStore,
    items: &[VaultItem],
    folders: &[Folder],
) -> Result<(), CacheError> {
    let redacted: Vec<VaultItem> = items.iter().map(VaultItem::redacted).collect();
    store.store_sealed_json(Marker::Items, &redacted)?;
    store.store_sealed_json(Marker::Folders, folders)?;
    store.store_timestamp(Marker::Sync)
}
