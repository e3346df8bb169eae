//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `observations` - Behavioral observation log and host stats snapshots
//! - `predictions` - Predicted patterns and their lifecycle
//! - `interventions` - Same-day interventions and their lifecycle
//! - `wellbeing` - Append-only wellbeing scores
//! - `knowledge` - Subject facts used for prediction enrichment

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod interventions;
mod knowledge;
mod observations;
mod predictions;
mod wellbeing;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "CADENCE_DB_KEY";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this would invalidate all existing encrypted databases
    const APP_SALT: &[u8; 16] = b"cadence-salt-v01";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Format a timestamp the way it is stored in SQLite
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(DATETIME_FORMAT).to_string()
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::NaiveDateTime::parse_from_str(s, DATETIME_FORMAT)
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a JSON object column, treating anything else as an empty map
pub(crate) fn parse_json_map(s: &str) -> serde_json::Map<String, serde_json::Value> {
    match serde_json::from_str(s) {
        Ok(serde_json::Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    }
}

/// True when an insert was rejected by a cooldown trigger or another constraint
pub(crate) fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    db_path: String,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `CADENCE_DB_KEY` to be set. Use `new_unencrypted()` for
    /// development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases (not recommended for production).",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Create a throwaway database (for testing)
    ///
    /// Uses a temporary file rather than `:memory:` because each pooled
    /// connection would otherwise see its own empty database.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "cadence_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let path = path.to_string_lossy().to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- Behavioral observations (append-only, written by the session analyzer)
            CREATE TABLE IF NOT EXISTS observations (
                id INTEGER PRIMARY KEY,
                subject_id TEXT NOT NULL,
                timestamp DATETIME NOT NULL,
                mood_score REAL NOT NULL,               -- [-1, 1]
                energy_level REAL NOT NULL,             -- [0, 1]
                focus_score REAL NOT NULL,              -- [0, 1]
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_observations_subject_time ON observations(subject_id, timestamp);

            -- Latest activity stats per subject (tasks, streak), maintained by the host
            CREATE TABLE IF NOT EXISTS subject_stats (
                subject_id TEXT PRIMARY KEY,
                tasks_completed INTEGER NOT NULL DEFAULT 0,
                current_streak INTEGER NOT NULL DEFAULT 0,
                open_tasks_count INTEGER NOT NULL DEFAULT 0,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            -- Forward-looking predictions
            CREATE TABLE IF NOT EXISTS predicted_patterns (
                id INTEGER PRIMARY KEY,
                subject_id TEXT NOT NULL,
                pattern_type TEXT NOT NULL,             -- energy_crash, procrastination, ...
                confidence REAL NOT NULL,
                predicted_for DATETIME NOT NULL,
                time_horizon TEXT NOT NULL,             -- 24h, 3d, 7d
                trigger_factors TEXT NOT NULL,          -- JSON object
                enrichment_context TEXT NOT NULL,       -- JSON object, {} when unavailable
                status TEXT NOT NULL DEFAULT 'active',  -- active, confirmed, avoided, expired
                created_at DATETIME NOT NULL,
                resolved_at DATETIME
            );

            CREATE INDEX IF NOT EXISTS idx_predictions_subject_type ON predicted_patterns(subject_id, pattern_type, status, created_at);
            CREATE INDEX IF NOT EXISTS idx_predictions_status ON predicted_patterns(status, predicted_for);

            -- Cooldown backstop: one active prediction per (subject, pattern) per 24h
            CREATE TRIGGER IF NOT EXISTS trg_predictions_cooldown
            BEFORE INSERT ON predicted_patterns
            WHEN NEW.status = 'active' AND EXISTS (
                SELECT 1 FROM predicted_patterns
                WHERE subject_id = NEW.subject_id
                  AND pattern_type = NEW.pattern_type
                  AND status = 'active'
                  AND created_at > datetime(NEW.created_at, '-24 hours')
            )
            BEGIN
                SELECT RAISE(ABORT, 'active prediction within cooldown');
            END;

            -- Same-day interventions
            CREATE TABLE IF NOT EXISTS interventions (
                id INTEGER PRIMARY KEY,
                subject_id TEXT NOT NULL,
                type TEXT NOT NULL,                     -- hyperfocus, procrastination, ...
                trigger_pattern TEXT NOT NULL,
                message TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending', -- pending, dismissed, acted
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_interventions_subject_type ON interventions(subject_id, type, created_at);
            CREATE INDEX IF NOT EXISTS idx_interventions_status ON interventions(status);

            -- Cooldown backstop: one intervention per (subject, type) per 12h, any status
            CREATE TRIGGER IF NOT EXISTS trg_interventions_cooldown
            BEFORE INSERT ON interventions
            WHEN EXISTS (
                SELECT 1 FROM interventions
                WHERE subject_id = NEW.subject_id
                  AND type = NEW.type
                  AND created_at > datetime(NEW.created_at, '-12 hours')
            )
            BEGIN
                SELECT RAISE(ABORT, 'intervention within cooldown');
            END;

            -- Wellbeing scores (append-only)
            CREATE TABLE IF NOT EXISTS wellbeing_scores (
                id INTEGER PRIMARY KEY,
                subject_id TEXT NOT NULL,
                score REAL NOT NULL,
                zone TEXT NOT NULL,                     -- red, yellow, green
                components TEXT NOT NULL,               -- JSON: normalized inputs or no_data
                created_at DATETIME NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_wellbeing_subject_time ON wellbeing_scores(subject_id, created_at);

            -- Facts about a subject, searched to enrich predictions
            CREATE TABLE IF NOT EXISTS knowledge_facts (
                id INTEGER PRIMARY KEY,
                subject_id TEXT NOT NULL,
                fact TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_knowledge_subject ON knowledge_facts(subject_id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}
