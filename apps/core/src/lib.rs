pub mod action_executor;
pub mod auth;
pub mod cache_crypto;
pub mod cache_store;
pub mod config;
pub mod contract;
pub mod dispatcher;
pub mod freshness;
pub mod icons;
pub mod jobs;
pub mod logging;
pub mod menus;
pub mod model;
pub mod runtime;
pub mod search;
pub mod session;
pub mod settings;
pub mod sync;
pub mod vault_cli;
pub mod vault_search;
