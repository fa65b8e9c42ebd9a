use std::time::Duration;

use crate::cache_store::{CacheStore, Marker};
use crate::config::Config;
use crate::jobs::{Job, JobRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No data and no sync marker; offer to start a sync.
    TriggerSync,
    /// No data, but a sync job is already on it.
    Refreshing,
    TriggerIconRefresh,
    Render { auto_fetch: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheState {
    pub data_cached: bool,
    pub sync_marker: bool,
    pub sync_running: bool,
    pub icon_cache_enabled: bool,
    pub icon_cache_stale: bool,
    pub auto_fetch_stale: bool,
}

/// Data existence is checked before icon freshness; auto-fetch never stops rendering.
pub fn decide(state: &CacheState) -> Decision {
    if !state.data_cached && !state.sync_marker {
        return if state.sync_running {
            Decision::Refreshing
        } else {
            Decision::TriggerSync
        };
    }

    if state.icon_cache_enabled && state.icon_cache_stale {
        return Decision::TriggerIconRefresh;
    }

    Decision::Render {
        auto_fetch: state.auto_fetch_stale,
    }
}

/// `data_cached` is whether items and folders were actually loaded; a cache
/// that exists but fails to read counts as absent. Passes that never start
/// the icon job (`fetches_icons == false`) leave the auto-fetch window alone.
pub fn observe(
    store: &CacheStore,
    cfg: &Config,
    jobs: &dyn JobRunner,
    data_cached: bool,
    fetches_icons: bool,
) -> CacheState {
    CacheState {
        data_cached,
        sync_marker: store.exists(Marker::Sync),
        sync_running: jobs.is_running(Job::SYNC),
        icon_cache_enabled: cfg.icon_cache_enabled,
        icon_cache_stale: store.expired(
            Marker::IconCache,
            Duration::from_secs(cfg.icon_cache_age_secs),
        ),
        auto_fetch_stale: fetches_icons
            && store.expired(
                Marker::AutoFetch,
                Duration::from_secs(cfg.auto_fetch_icon_cache_age_secs),
            ),
    }
}

/// Observes, decides and records the side effects of a rendering pass: the
/// last-usage timestamp and, when due, a fresh auto-fetch marker.
pub fn evaluate(
    store: &CacheStore,
    cfg: &Config,
    jobs: &dyn JobRunner,
    data_cached: bool,
    fetches_icons: bool,
) -> Decision {
    let state = observe(store, cfg, jobs, data_cached, fetches_icons);
    let decision = decide(&state);
    crate::logging::debug(&format!("cache state {state:?} -> {decision:?}"));

    match decision {
        Decision::Refreshing => crate::logging::info("sync job already running"),
        Decision::Render { auto_fetch } => {
            if let Err(error) = store.store_timestamp(Marker::LastUsage) {
                crate::logging::warn(&format!("cannot record last usage: {error}"));
            }
            if auto_fetch {
                if let Err(error) = store.store_timestamp(Marker::AutoFetch) {
                    crate::logging::warn(&format!("cannot refresh auto-fetch marker: {error}"));
                }
            }
        }
        Decision::TriggerSync | Decision::TriggerIconRefresh => {}
    }

    decision
}
