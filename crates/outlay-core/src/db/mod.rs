//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `transactions` - Expense storage and the detector's transaction source
//! - `subscriptions` - Detected and manual subscriptions, reminders

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use tracing::{debug, info};

use crate::error::{Error, Result};

mod subscriptions;
mod transactions;

pub use transactions::InsertCounts;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable holding the database passphrase
pub const DB_KEY_ENV: &str = "OUTLAY_DB_KEY";

/// Salt for passphrase stretching. Fixed so a database can be moved or renamed;
/// changing it locks out every existing encrypted file.
const KEY_SALT: &[u8] = b"outlay/sqlcipher/v1";

const POOL_SIZE: u32 = 8;

/// Stretch a passphrase into a raw 256-bit SQLCipher key (hex encoded)
fn stretch_passphrase(passphrase: &str) -> Result<String> {
    if passphrase.is_empty() {
        return Err(Error::Encryption("Passphrase must not be empty".into()));
    }

    let mut key = [0u8; 32];
    argon2::Argon2::default()
        .hash_password_into(passphrase.as_bytes(), KEY_SALT, &mut key)
        .map_err(|e| Error::Encryption(format!("Key derivation failed: {}", e)))?;
    Ok(hex::encode(key))
}

fn column_error<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a `CURRENT_TIMESTAMP` column inside a row mapper
pub(crate) fn parse_timestamp_column(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .map_err(|e| column_error(idx, e))
}

/// Parse a stored `YYYY-MM-DD` date inside a row mapper
pub(crate) fn parse_date_column(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| column_error(idx, e))
}

/// How the database file is protected at rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    /// Plain SQLite file
    Plaintext,
    /// SQLCipher, keyed from this passphrase
    Passphrase(String),
}

impl KeySource {
    /// Read the passphrase from `OUTLAY_DB_KEY`
    pub fn from_env() -> Result<Self> {
        match std::env::var(DB_KEY_ENV) {
            Ok(pass) if !pass.is_empty() => Ok(Self::Passphrase(pass)),
            _ => Err(Error::Encryption(format!(
                "{} is not set. Export a passphrase, or pass --no-encrypt for a plain database.",
                DB_KEY_ENV
            ))),
        }
    }
}

/// Pooled handle to the outlay store
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    location: Option<PathBuf>,
    encrypted: bool,
}

impl Database {
    /// Open (creating if needed) the database at `path` and bring its schema up to date
    pub fn open(path: impl AsRef<Path>, keys: KeySource) -> Result<Self> {
        let path = path.as_ref();
        let manager = SqliteConnectionManager::file(path);

        let (manager, encrypted) = match keys {
            KeySource::Plaintext => (manager, false),
            KeySource::Passphrase(pass) => {
                let pragma = format!("PRAGMA key = \"x'{}'\";", stretch_passphrase(&pass)?);
                (manager.with_init(move |conn| conn.execute_batch(&pragma)), true)
            }
        };

        let pool = Pool::builder().max_size(POOL_SIZE).build(manager)?;
        let db = Self {
            pool,
            location: Some(path.to_path_buf()),
            encrypted,
        };
        if encrypted {
            db.check_key()?;
        }
        db.run_migrations()?;

        debug!(path = %path.display(), encrypted, "Database opened");
        Ok(db)
    }

    /// Open an encrypted database keyed from `OUTLAY_DB_KEY`
    pub fn open_from_env(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, KeySource::from_env()?)
    }

    /// Open a plain, unencrypted database
    pub fn open_unencrypted(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(path, KeySource::Plaintext)
    }

    /// A private in-memory database (for testing)
    ///
    /// The pool holds a single connection that never expires, so every
    /// caller sees the same memory database for the handle's lifetime.
    pub fn in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?;

        let db = Self {
            pool,
            location: None,
            encrypted: false,
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Backing file, or `None` for an in-memory database
    pub fn path(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Whether the file was opened through SQLCipher with a key
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// A wrong key only shows up on the first page read
    fn check_key(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .map_err(|e| {
                Error::Encryption(format!(
                    "Cannot read database (wrong passphrase or not an encrypted file): {}",
                    e
                ))
            })?;
        Ok(())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- WAL mode: readers don't block writers
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Expenses (amount is always a non-negative magnitude)
            CREATE TABLE IF NOT EXISTS transactions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                date DATE NOT NULL,
                title TEXT NOT NULL,
                merchant_name TEXT,
                category TEXT,
                amount REAL NOT NULL,
                data_source TEXT NOT NULL DEFAULT 'manual',   -- manual, import, bank
                import_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(user_id, import_hash)
            );

            CREATE INDEX IF NOT EXISTS idx_transactions_user_date ON transactions(user_id, date);

            -- Subscriptions (detected or entered by hand)
            CREATE TABLE IF NOT EXISTS subscriptions (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                amount REAL NOT NULL,
                frequency TEXT NOT NULL DEFAULT 'monthly',    -- daily, weekly, monthly, yearly
                next_billing_date DATE NOT NULL,
                category TEXT NOT NULL DEFAULT 'Subscription',
                merchant_name TEXT,
                icon TEXT NOT NULL DEFAULT '💳',
                detection_method TEXT NOT NULL DEFAULT 'manual', -- auto, manual
                related_transaction_ids TEXT NOT NULL DEFAULT '[]', -- JSON array of transaction ids
                status TEXT NOT NULL DEFAULT 'active',        -- active, cancelled
                reminder_enabled BOOLEAN NOT NULL DEFAULT 1,
                reminder_days_before INTEGER NOT NULL DEFAULT 3,
                last_reminder_sent DATE,
                total_spent REAL NOT NULL DEFAULT 0,
                occurrence_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- At most one active subscription per user and name; detection upserts on this
            CREATE UNIQUE INDEX IF NOT EXISTS idx_subscriptions_active_name
                ON subscriptions(user_id, name) WHERE status = 'active';
            CREATE INDEX IF NOT EXISTS idx_subscriptions_user_status
                ON subscriptions(user_id, status, next_billing_date);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
