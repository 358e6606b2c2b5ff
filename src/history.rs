//! Command history logging.
//!
//! Every logged command becomes a [`CommandRecord`]. When the command is an
//! `ssh` invocation the matching [`SshHost`] row is upserted in the same
//! transaction, so a host counter never drifts from the history it came from.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Row, Transaction, TransactionBehavior, params};
use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;
use crate::ssh::{SshTarget, parse_ssh_command};
use crate::store::Store;

/// Total attempts made by [`Store::log_command_with_retry`].
pub const LOG_ATTEMPTS: u32 = 3;

/// Fixed pause between attempts while another process holds the lock.
pub const RETRY_DELAY: Duration = Duration::from_millis(100);

// ============================================================================
// Records
// ============================================================================

/// One executed shell command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandRecord {
    pub id: i64,
    pub command: String,
    pub working_directory: Option<String>,
    pub exit_code: i32,
    pub timestamp: DateTime<Utc>,
    pub context: Option<String>,
    pub tags: Option<String>,
}

impl CommandRecord {
    pub(crate) const COLUMNS: &'static str =
        "id, command, working_directory, exit_code, timestamp, context, tags";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            command: row.get(1)?,
            working_directory: row.get(2)?,
            exit_code: row.get(3)?,
            timestamp: row.get(4)?,
            context: row.get(5)?,
            tags: row.get(6)?,
        })
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Usage counter for one SSH destination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SshHost {
    pub id: i64,
    pub hostname: String,
    pub username: Option<String>,
    pub port: u16,
    pub key_path: Option<String>,
    pub last_used: DateTime<Utc>,
    pub usage_count: i64,
}

impl SshHost {
    pub(crate) const COLUMNS: &'static str =
        "id, hostname, username, port, key_path, last_used, usage_count";

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hostname: row.get(1)?,
            username: row.get(2)?,
            port: row.get(3)?,
            key_path: row.get(4)?,
            last_used: row.get(5)?,
            usage_count: row.get(6)?,
        })
    }
}

/// A command about to be logged.
#[derive(Debug, Clone, Default)]
pub struct NewCommand {
    pub command: String,
    /// Defaults to the current directory of this process.
    pub working_directory: Option<String>,
    pub exit_code: i32,
    pub context: Option<String>,
}

impl NewCommand {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn exit_code(mut self, exit_code: i32) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn working_directory(mut self, dir: impl Into<String>) -> Self {
        self.working_directory = Some(dir.into());
        self
    }

    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

// ============================================================================
// Logging
// ============================================================================

impl Store {
    /// Insert a command record and, for `ssh` commands, upsert the host row.
    ///
    /// Returns the id of the new command record.
    pub fn log_command(&mut self, entry: &NewCommand) -> Result<i64, StorageError> {
        let now = Utc::now();
        let working_directory = entry.working_directory.clone().or_else(|| {
            std::env::current_dir()
                .ok()
                .map(|dir| dir.display().to_string())
        });

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO commands (command, working_directory, exit_code, timestamp, context)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.command,
                working_directory,
                entry.exit_code,
                now,
                entry.context
            ],
        )?;
        let id = tx.last_insert_rowid();

        if let Some(target) = parse_ssh_command(&entry.command) {
            upsert_host(&tx, &target, now)?;
        }

        tx.commit()?;
        Ok(id)
    }

    /// [`log_command`](Self::log_command), retried while the database is locked.
    ///
    /// Makes up to [`LOG_ATTEMPTS`] attempts, sleeping [`RETRY_DELAY`] between
    /// them. Errors other than lock contention are returned immediately.
    pub fn log_command_with_retry(&mut self, entry: &NewCommand) -> Result<i64, StorageError> {
        let mut attempt = 1;
        loop {
            match self.log_command(entry) {
                Err(e) if e.is_locked() && attempt < LOG_ATTEMPTS => {
                    debug!(attempt, "database locked, retrying: {e}");
                    std::thread::sleep(RETRY_DELAY);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Insert a host row or bump the existing one.
///
/// A missing username, port, or key path keeps the stored value; SSH config
/// files usually supply those defaults.
fn upsert_host(
    tx: &Transaction<'_>,
    target: &SshTarget,
    now: DateTime<Utc>,
) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO ssh_hosts (hostname, username, port, key_path, last_used, usage_count)
         VALUES (?1, ?2, COALESCE(?3, 22), ?4, ?5, 1)
         ON CONFLICT(hostname) DO UPDATE SET
             username = COALESCE(excluded.username, ssh_hosts.username),
             port = COALESCE(?3, ssh_hosts.port),
             key_path = COALESCE(excluded.key_path, ssh_hosts.key_path),
             last_used = excluded.last_used,
             usage_count = ssh_hosts.usage_count + 1",
        params![
            target.hostname,
            target.username,
            target.port,
            target.key_path,
            now
        ],
    )?;
    debug!(hostname = %target.hostname, "recorded ssh host usage");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_rows(store: &Store) -> Vec<SshHost> {
        let sql = format!("SELECT {} FROM ssh_hosts ORDER BY id", SshHost::COLUMNS);
        let mut stmt = store.conn.prepare(&sql).unwrap();
        stmt.query_map([], SshHost::from_row)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn command_count(store: &Store) -> i64 {
        store
            .conn
            .query_row("SELECT COUNT(*) FROM commands", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_log_plain_command() {
        let mut store = Store::open_in_memory().unwrap();
        let entry = NewCommand::new("ls -la")
            .working_directory("/tmp")
            .exit_code(2)
            .context("after deploy");

        let id = store.log_command(&entry).unwrap();
        let record = store
            .conn
            .query_row(
                &format!("SELECT {} FROM commands WHERE id = ?1", CommandRecord::COLUMNS),
                [id],
                CommandRecord::from_row,
            )
            .unwrap();

        assert_eq!(record.command, "ls -la");
        assert_eq!(record.working_directory.as_deref(), Some("/tmp"));
        assert_eq!(record.exit_code, 2);
        assert_eq!(record.context.as_deref(), Some("after deploy"));
        assert_eq!(record.tags, None);
        assert!(!record.succeeded());
        assert!(host_rows(&store).is_empty());
    }

    #[test]
    fn test_working_directory_defaults_to_cwd() {
        let mut store = Store::open_in_memory().unwrap();
        store.log_command(&NewCommand::new("pwd")).unwrap();

        let cwd: Option<String> = store
            .conn
            .query_row("SELECT working_directory FROM commands", [], |row| {
                row.get(0)
            })
            .unwrap();
        let expected = std::env::current_dir().unwrap().display().to_string();
        assert_eq!(cwd.as_deref(), Some(expected.as_str()));
    }

    #[test]
    fn test_ssh_host_upsert_counts_and_username() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .log_command(&NewCommand::new("ssh prod.example.com"))
            .unwrap();
        store
            .log_command(&NewCommand::new("ssh admin@prod.example.com"))
            .unwrap();

        let hosts = host_rows(&store);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "prod.example.com");
        assert_eq!(hosts[0].usage_count, 2);
        assert_eq!(hosts[0].username.as_deref(), Some("admin"));
        assert_eq!(hosts[0].port, 22);
    }

    #[test]
    fn test_ssh_without_user_keeps_stored_username() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .log_command(&NewCommand::new("ssh admin@box -i ~/.ssh/box"))
            .unwrap();
        store.log_command(&NewCommand::new("ssh box")).unwrap();

        let hosts = host_rows(&store);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].username.as_deref(), Some("admin"));
        assert_eq!(hosts[0].usage_count, 2);
    }

    #[test]
    fn test_ssh_port_is_recorded_and_stripped() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .log_command(&NewCommand::new("ssh -p 2222 user@host:2222"))
            .unwrap();

        let hosts = host_rows(&store);
        assert_eq!(hosts.len(), 1);
        assert_eq!(hosts[0].hostname, "host");
        assert_eq!(hosts[0].port, 2222);
    }

    #[test]
    fn test_ssh_without_target_still_logs_command() {
        let mut store = Store::open_in_memory().unwrap();
        store.log_command(&NewCommand::new("ssh -v")).unwrap();

        assert_eq!(command_count(&store), 1);
        assert!(host_rows(&store).is_empty());
    }

    #[test]
    fn test_retry_gives_up_after_three_locked_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.db");
        let mut store = Store::open(&path).unwrap();
        store.conn.busy_timeout(Duration::ZERO).unwrap();

        let holder = rusqlite::Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let started = std::time::Instant::now();
        let err = store
            .log_command_with_retry(&NewCommand::new("echo blocked"))
            .unwrap_err();

        assert!(err.is_locked());
        assert!(started.elapsed() >= RETRY_DELAY * (LOG_ATTEMPTS - 1));

        holder.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(command_count(&store), 0);
    }

    #[test]
    fn test_retry_succeeds_once_lock_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.db");
        let mut store = Store::open(&path).unwrap();
        store.conn.busy_timeout(Duration::ZERO).unwrap();

        let holder = rusqlite::Connection::open(&path).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
        let release = std::thread::spawn(move || {
            std::thread::sleep(RETRY_DELAY / 2);
            holder.execute_batch("ROLLBACK;").unwrap();
        });

        store
            .log_command_with_retry(&NewCommand::new("echo eventually"))
            .unwrap();
        release.join().unwrap();
        assert_eq!(command_count(&store), 1);
    }

    #[test]
    fn test_concurrent_writers_lose_nothing() {
        const WRITERS: usize = 8;
        const PER_WRITER: usize = 5;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.db");
        drop(Store::open(&path).unwrap());

        let handles: Vec<_> = (0..WRITERS)
            .map(|writer| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let mut store = Store::open(&path).unwrap();
                    for n in 0..PER_WRITER {
                        let entry = NewCommand::new(format!("echo {writer}-{n}"));
                        store.log_command_with_retry(&entry).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(command_count(&store), (WRITERS * PER_WRITER) as i64);
    }
}
