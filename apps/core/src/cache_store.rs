use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::cache_crypto::{CacheCipher, CryptoError};
use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Items,
    Folders,
    Sync,
    IconCache,
    AutoFetch,
    LastUsage,
}

impl Marker {
    pub const ALL: [Marker; 6] = [
        Self::Items,
        Self::Folders,
        Self::Sync,
        Self::IconCache,
        Self::AutoFetch,
        Self::LastUsage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Items => "items",
            Self::Folders => "folders",
            Self::Sync => "sync",
            Self::IconCache => "icon-cache",
            Self::AutoFetch => "auto-fetch",
            Self::LastUsage => "last-usage",
        }
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cache entry missing: {0}")]
    Missing(&'static str),
    #[error("cannot seal {0}: no cache key")]
    NoCipher(&'static str),
    #[error("sealed entry {marker}: {source}")]
    Crypto {
        marker: &'static str,
        #[source]
        source: CryptoError,
    },
}

/// Named, timestamped cache slots kept in one SQLite file. No locking beyond
/// SQLite's own: concurrent writers to one marker resolve last-writer-wins.
/// JSON slots are sealed with the store's cipher; without one they can be
/// neither written nor read.
pub struct CacheStore {
    db: Connection,
    cipher: Option<CacheCipher>,
}

impl CacheStore {
    pub fn open_memory() -> Result<Self, CacheError> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn open_file(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        db.busy_timeout(Duration::from_secs(5))?;
        Self::init(db)
    }

    pub fn open_from_config(cfg: &Config) -> Result<Self, CacheError> {
        Self::open_file(&cfg.cache_db_path())
    }

    fn init(db: Connection) -> Result<Self, CacheError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS marker (
                name TEXT PRIMARY KEY,
                payload BLOB NOT NULL,
                written_at_ms INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self { db, cipher: None })
    }

    pub fn with_cipher(mut self, cipher: CacheCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn exists(&self, marker: Marker) -> bool {
        matches!(self.written_at_ms(marker), Ok(Some(_)))
    }

    pub fn expired(&self, marker: Marker, max_age: Duration) -> bool {
        self.expired_at(marker, max_age, SystemTime::now())
    }

    /// True when the marker was never written or is older than `max_age` at `now`.
    pub fn expired_at(&self, marker: Marker, max_age: Duration, now: SystemTime) -> bool {
        let Ok(Some(written)) = self.written_at_ms(marker) else {
            return true;
        };
        let age_ms = epoch_ms(now).saturating_sub(written);
        age_ms > i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX)
    }

    pub fn store(&self, marker: Marker, payload: &[u8]) -> Result<(), CacheError> {
        self.store_at(marker, payload, SystemTime::now())
    }

    pub fn store_at(
        &self,
        marker: Marker,
        payload: &[u8],
        now: SystemTime,
    ) -> Result<(), CacheError> {
        self.db.execute(
            "INSERT INTO marker (name, payload, written_at_ms) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET payload=excluded.payload, written_at_ms=excluded.written_at_ms",
            params![marker.name(), payload, epoch_ms(now)],
        )?;
        Ok(())
    }

    /// Stores the current Unix time as a UTF-8 decimal string.
    pub fn store_timestamp(&self, marker: Marker) -> Result<(), CacheError> {
        let now = SystemTime::now();
        let secs = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
        self.store_at(marker, secs.to_string().as_bytes(), now)
    }

    pub fn load(&self, marker: Marker) -> Result<Vec<u8>, CacheError> {
        self.db
            .query_row(
                "SELECT payload FROM marker WHERE name = ?1",
                params![marker.name()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .ok_or(CacheError::Missing(marker.name()))
    }

    pub fn store_sealed_json<T: Serialize + ?Sized>(
        &self,
        marker: Marker,
        value: &T,
    ) -> Result<(), CacheError> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or(CacheError::NoCipher(marker.name()))?;
        let plaintext = serde_json::to_vec(value)?;
        let sealed = cipher.seal(&plaintext).map_err(|source| CacheError::Crypto {
            marker: marker.name(),
            source,
        })?;
        self.store(marker, &sealed)
    }

    pub fn load_sealed_json<T: DeserializeOwned>(&self, marker: Marker) -> Result<T, CacheError> {
        let cipher = self
            .cipher
            .as_ref()
            .ok_or(CacheError::NoCipher(marker.name()))?;
        let sealed = self.load(marker)?;
        let plaintext = cipher.open(&sealed).map_err(|source| CacheError::Crypto {
            marker: marker.name(),
            source,
        })?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub fn remove(&self, marker: Marker) -> Result<(), CacheError> {
        self.db
            .execute("DELETE FROM marker WHERE name = ?1", params![marker.name()])?;
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CacheError> {
        self.db.execute("DELETE FROM marker", [])?;
        Ok(())
    }

    fn written_at_ms(&self, marker: Marker) -> Result<Option<i64>, CacheError> {
        Ok(self
            .db
            .query_row(
                "SELECT written_at_ms FROM marker WHERE name = ?1",
                params![marker.name()],
                |row| row.get::<_, i64>(0),
            )
            .optional()?)
    }
}

fn epoch_ms(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
