use crate::cache_store::Marker;
use crate::contract::Outcome;
use crate::dispatcher::Workflow;
use crate::jobs::{self, Job};
use crate::vault_cli::{self, CliError};

pub const NOT_LOGGED_IN_MSG: &str = "Not logged in to Bitwarden.";
pub const NOT_UNLOCKED_MSG: &str = "Bitwarden is locked.";

fn failed(operation: &str, error: &CliError) -> Outcome {
    crate::logging::error(&format!("{operation} failed: {error}"));
    Outcome::Text(error.user_message())
}

/// Keeps the session key and kicks off a background sync so the next search
/// finds fresh data.
fn remember_session(wf: &Workflow<'_>, token: &str, force_sync: bool) -> Result<(), Outcome> {
    if let Err(error) = wf.tokens.set(token) {
        crate::logging::error(&format!("cannot store session key: {error}"));
        return Err(Outcome::Text(format!("Unable to store the session key: {error}")));
    }
    if let Err(error) = jobs::start_unless_running(wf.jobs, Job::Sync { force: force_sync }) {
        crate::logging::warn(&format!("cannot start sync after unlock: {error}"));
    }
    Ok(())
}

/// `code` is the 2FA code typed into Alfred; required only when 2FA is on.
pub fn run_login(wf: &Workflow<'_>, code: &str) -> Outcome {
    let cfg = &wf.config;

    let token = if cfg.use_apikey {
        if let Err(error) = vault_cli::login_apikey(wf.cli) {
            return failed("login --apikey", &error);
        }
        match vault_cli::unlock(wf.cli) {
            Ok(token) => token,
            Err(error) => return failed("unlock after apikey login", &error),
        }
    } else {
        if cfg.email.trim().is_empty() {
            return Outcome::Text("Set your Bitwarden email first (.bwconfig).".to_string());
        }
        let code = code.trim();
        let two_factor = match cfg.effective_sfa_mode() {
            -1 => None,
            _ if code.is_empty() => {
                return Outcome::Text("A 2FA code is required to login.".to_string());
            }
            mode => Some((mode, code)),
        };
        match vault_cli::login_password(wf.cli, cfg.email.trim(), two_factor) {
            Ok(token) => token,
            Err(error) => return failed("login", &error),
        }
    };

    match remember_session(wf, &token, true) {
        Ok(()) => {
            crate::logging::info("logged in");
            Outcome::Text("Logged In.".to_string())
        }
        Err(outcome) => outcome,
    }
}

pub fn run_unlock(wf: &Workflow<'_>) -> Outcome {
    if !wf.session.is_logged_in() {
        return Outcome::Text(NOT_LOGGED_IN_MSG.to_string());
    }

    let token = match vault_cli::unlock(wf.cli) {
        Ok(token) => token,
        Err(error) => return failed("unlock", &error),
    };
    match remember_session(wf, &token, false) {
        Ok(()) => {
            crate::logging::info("unlocked");
            Outcome::Text("Unlocked".to_string())
        }
        Err(outcome) => outcome,
    }
}

fn forget_session(wf: &Workflow<'_>) {
    if let Err(error) = wf.tokens.delete() {
        crate::logging::warn(&format!("cannot delete session key: {error}"));
    }
}

pub fn run_lock(wf: &Workflow<'_>) -> Outcome {
    let result = vault_cli::lock(wf.cli);
    forget_session(wf);
    match result {
        Ok(()) => Outcome::Text("Locked".to_string()),
        Err(error) => failed("lock", &error),
    }
}

/// Logging out also drops the cached vault, so the next search asks for a sync.
pub fn run_logout(wf: &Workflow<'_>) -> Outcome {
    let result = vault_cli::logout(wf.cli);
    forget_session(wf);
    for marker in [Marker::Items, Marker::Folders, Marker::Sync] {
        if let Err(error) = wf.store.remove(marker) {
            crate::logging::warn(&format!("cannot remove {} cache: {error}", marker.name()));
        }
    }
    match result {
        Ok(()) => Outcome::Text("Logged Out".to_string()),
        Err(error) => failed("logout", &error),
    }
}
