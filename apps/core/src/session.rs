use std::cell::RefCell;

use thiserror::Error;

use crate::config::Config;

const KEYCHAIN_SERVICE: &str = "bitwarden-alfred-workflow";
const KEYCHAIN_ACCOUNT: &str = "session";
/// Keychain account holding the key that seals the vault cache.
pub const CACHE_KEY_ACCOUNT: &str = "cache-key";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Where the unlocked session key lives between invocations.
pub trait TokenStore {
    fn get(&self) -> Result<Option<String>, TokenError>;
    fn set(&self, token: &str) -> Result<(), TokenError>;
    fn delete(&self) -> Result<(), TokenError>;
}

pub struct KeychainTokenStore {
    service: String,
    account: String,
}

impl Default for KeychainTokenStore {
    fn default() -> Self {
        Self::for_account(KEYCHAIN_ACCOUNT)
    }
}

impl KeychainTokenStore {
    pub fn for_account(account: &str) -> Self {
        Self {
            service: KEYCHAIN_SERVICE.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, TokenError> {
        Ok(keyring::Entry::new(&self.service, &self.account)?)
    }
}

impl TokenStore for KeychainTokenStore {
    fn get(&self) -> Result<Option<String>, TokenError> {
        match self.entry()?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error.into()),
        }
    }

    fn set(&self, token: &str) -> Result<(), TokenError> {
        self.entry()?.set_password(token)?;
        Ok(())
    }

    fn delete(&self) -> Result<(), TokenError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error.into()),
        }
    }
}

/// Process-local token store, used when no keychain is wanted.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RefCell<Option<String>>,
}

impl MemoryTokenStore {
    pub fn with_token(token: &str) -> Self {
        Self {
            token: RefCell::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Result<Option<String>, TokenError> {
        Ok(self.token.borrow().clone())
    }

    fn set(&self, token: &str) -> Result<(), TokenError> {
        *self.token.borrow_mut() = Some(token.to_string());
        Ok(())
    }

    fn delete(&self) -> Result<(), TokenError> {
        *self.token.borrow_mut() = None;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Empty when bw has no logged-in account.
    pub user_id: String,
    /// Empty when the vault is locked.
    pub session_key: String,
}

impl SessionState {
    pub fn new(user_id: &str, session_key: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            session_key: session_key.to_string(),
        }
    }

    /// Built once per invocation. Read failures are logged and leave the
    /// corresponding field empty.
    pub fn load(cfg: &Config, tokens: &dyn TokenStore) -> Self {
        let user_id = match std::fs::read_to_string(&cfg.bw_data_path) {
            Ok(raw) => user_id_from_bw_data(&raw).unwrap_or_default(),
            Err(error) => {
                crate::logging::warn(&format!(
                    "cannot read bw data file {}: {error}",
                    cfg.bw_data_path.display()
                ));
                String::new()
            }
        };

        let session_key = match tokens.get() {
            Ok(token) => token.unwrap_or_default(),
            Err(error) => {
                crate::logging::warn(&format!("cannot read session key: {error}"));
                String::new()
            }
        };

        Self {
            user_id,
            session_key,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub fn is_unlocked(&self) -> bool {
        self.is_logged_in() && !self.session_key.is_empty()
    }

    pub fn session_key(&self) -> Option<&str> {
        if self.is_unlocked() {
            Some(&self.session_key)
        } else {
            None
        }
    }
}

/// Active account id from the bw CLI's `data.json`; several bw releases used
/// different keys for it.
pub fn user_id_from_bw_data(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    ["global_account_activeAccountId", "activeUserId", "userId"]
        .iter()
        .filter_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .find(|id| !id.is_empty())
        .map(str::to_string)
}
