//! Local SQLite store for command history and SSH host usage.
//!
//! The [`Store`] owns the single database connection. Every other module
//! reaches the database through methods on this handle; there is no global
//! connection.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use crate::error::StorageError;

/// How long a connection waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS commands (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        command TEXT NOT NULL,
        working_directory TEXT,
        exit_code INTEGER NOT NULL DEFAULT 0,
        timestamp TEXT NOT NULL,
        context TEXT,
        tags TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_commands_timestamp ON commands(timestamp);
    CREATE TABLE IF NOT EXISTS ssh_hosts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        hostname TEXT NOT NULL UNIQUE,
        username TEXT,
        port INTEGER NOT NULL DEFAULT 22,
        key_path TEXT,
        last_used TEXT NOT NULL,
        usage_count INTEGER NOT NULL DEFAULT 1
    );
    CREATE TABLE IF NOT EXISTS command_patterns (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern_name TEXT NOT NULL,
        commands TEXT,
        description TEXT,
        usage_count INTEGER NOT NULL DEFAULT 0
    );
";

/// Schema summary handed to the chat model so it can write queries.
pub const SCHEMA_DESCRIPTION: &str = "\
commands(id INTEGER, command TEXT, working_directory TEXT, exit_code INTEGER, timestamp TEXT, context TEXT, tags TEXT)
ssh_hosts(id INTEGER, hostname TEXT UNIQUE, username TEXT, port INTEGER, key_path TEXT, last_used TEXT, usage_count INTEGER)
command_patterns(id INTEGER, pattern_name TEXT, commands TEXT, description TEXT, usage_count INTEGER)
Timestamps are UTC text like '2024-01-31 18:04:05.123456+00:00'.";

/// Handle to the command database.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open a throwaway in-memory database with the full schema.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create all tables that do not exist yet. Safe to call repeatedly.
    pub fn ensure_schema(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }
}
