use clap::{ArgGroup, Parser};
use thiserror::Error;

use crate::cache_crypto::{self, CacheCipher};
use crate::cache_store::{CacheError, CacheStore};
use crate::config::{self, ConfigError};
use crate::dispatcher::{self, DispatchError, Operation, Workflow};
use crate::icons::{HttpIconFetcher, IconError};
use crate::jobs::{self, ProcessJobRunner, JOB_ENV};
use crate::session::{KeychainTokenStore, SessionState, CACHE_KEY_ACCOUNT};
use crate::sync::SyncRequest;
use crate::vault_cli::BwCli;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("icon fetcher error: {0}")]
    Icons(#[from] IconError),
    #[error("{0}")]
    Dispatch(#[from] DispatchError),
    #[error("render error: {0}")]
    Render(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Alfred workflow to get secrets from Bitwarden.
#[derive(Debug, Parser)]
#[command(name = "bitwarden-alfred-workflow", version)]
#[command(group(
    ArgGroup::new("operation")
        .args([
            "search", "conf", "setconfigs", "auth", "authconfig", "lock", "unlock",
            "login", "logout", "sync", "icons", "folder", "open", "getitem",
        ])
        .multiple(false)
))]
pub struct CliArgs {
    /// Run a new search (default)
    #[arg(long)]
    pub search: bool,
    /// Show/filter configuration
    #[arg(long)]
    pub conf: bool,
    /// Set a config value: <key> <value>
    #[arg(long)]
    pub setconfigs: bool,
    /// Show/filter auth actions
    #[arg(long)]
    pub auth: bool,
    /// Show an auth config sub-menu selected with --id
    #[arg(long)]
    pub authconfig: bool,
    #[arg(long)]
    pub lock: bool,
    #[arg(long)]
    pub unlock: bool,
    /// Login; the query is the 2FA code when 2FA is enabled
    #[arg(long)]
    pub login: bool,
    #[arg(long)]
    pub logout: bool,
    /// Sync secrets
    #[arg(long)]
    pub sync: bool,
    /// Download favicons
    #[arg(long)]
    pub icons: bool,
    /// Filter folders, or list a folder's items with --id
    #[arg(long)]
    pub folder: bool,
    /// Open the query with the OS open handler
    #[arg(long)]
    pub open: bool,
    /// Get a field of the item given by --id; the query is the field path
    #[arg(long)]
    pub getitem: bool,

    /// Force a full sync
    #[arg(long)]
    pub force: bool,
    /// Get the current TOTP code for --id
    #[arg(long)]
    pub totp: bool,
    /// Print the date of the last sync
    #[arg(long)]
    pub last: bool,
    /// Run the job detached
    #[arg(long)]
    pub background: bool,

    #[arg(long)]
    pub id: Option<String>,
    #[arg(long)]
    pub attachment: Option<String>,

    #[arg(trailing_var_arg = true)]
    pub query: Vec<String>,
}

impl CliArgs {
    pub fn into_operation(self) -> Operation {
        let query = self.query.join(" ").trim().to_string();

        if self.folder {
            return Operation::Folder {
                query,
                folder_id: self.id,
            };
        }
        if self.getitem {
            return Operation::GetItem {
                id: self.id.unwrap_or_default(),
                path: query,
                totp: self.totp,
                attachment: self.attachment,
            };
        }
        if self.conf {
            return Operation::Config { query };
        }
        if self.auth {
            return Operation::Auth { query };
        }
        if self.authconfig {
            return Operation::AuthConfig {
                menu: self.id.unwrap_or_default(),
                query,
            };
        }
        if self.setconfigs {
            let mut words = self.query.into_iter();
            let key = words.next().unwrap_or_default();
            let value = words.collect::<Vec<_>>().join(" ");
            return Operation::SetConfigs { key, value };
        }
        if self.login {
            return Operation::Login { code: query };
        }
        if self.logout {
            return Operation::Logout;
        }
        if self.lock {
            return Operation::Lock;
        }
        if self.unlock {
            return Operation::Unlock;
        }
        if self.sync {
            return Operation::Sync(SyncRequest {
                force: self.force,
                last: self.last,
                background: self.background,
            });
        }
        if self.icons {
            return Operation::Icons {
                background: self.background,
            };
        }
        if self.open {
            return Operation::Open { target: query };
        }

        Operation::Search {
            query,
            item_id: self.id,
        }
    }
}

/// `args` excludes the program name.
pub fn parse_cli_args(args: &[String]) -> Result<Operation, clap::Error> {
    let argv = std::iter::once("bitwarden-alfred-workflow".to_string()).chain(args.iter().cloned());
    Ok(CliArgs::try_parse_from(argv)?.into_operation())
}

pub fn run_with_options(operation: Operation) -> Result<(), RuntimeError> {
    let config = config::load(None)?;
    if let Err(error) = crate::logging::init() {
        eprintln!("[bitwarden-alfred] logging disabled: {error}");
    }

    let store = CacheStore::open_from_config(&config)?;
    // Without a key the vault cache reads as absent and syncs cannot write it.
    let store = match cache_crypto::load_or_create_key(&KeychainTokenStore::for_account(
        CACHE_KEY_ACCOUNT,
    )) {
        Ok(key) => store.with_cipher(CacheCipher::new(&key)),
        Err(error) => {
            crate::logging::error(&format!("cache key unavailable: {error}"));
            store
        }
    };
    let cli = BwCli::new(&config.bw_exec);
    let exe = std::env::current_exe()?;
    let jobs_dir = config.jobs_dir();
    let jobs = ProcessJobRunner::new(&jobs_dir, &exe);
    let tokens = KeychainTokenStore::default();
    let icons = HttpIconFetcher::new(&config.icon_service_url)?;
    let session = SessionState::load(&config, &tokens);

    let mut wf = Workflow {
        config,
        session,
        store: &store,
        cli: &cli,
        jobs: &jobs,
        tokens: &tokens,
        icons: &icons,
    };

    let result = dispatcher::dispatch(&mut wf, operation);

    // A detached job clears its own pid file once the work is done.
    if let Ok(name) = std::env::var(JOB_ENV) {
        jobs::finish(&jobs_dir, &name);
        crate::logging::info(&format!("background job {name} finished"));
    }

    let rendered = result?.render()?;
    print!("{rendered}");
    Ok(())
}
