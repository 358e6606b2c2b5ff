//! Read-only lookups over the command store.

use rusqlite::Batch;
use rusqlite::types::ValueRef;

use crate::error::StorageError;
use crate::history::{CommandRecord, SshHost};
use crate::store::Store;

/// Default page size for [`Store::recent_commands`].
pub const DEFAULT_RECENT_LIMIT: usize = 50;

/// Maximum number of records returned by [`Store::search_commands`].
pub const SEARCH_LIMIT: usize = 20;

/// Maximum number of entries returned by [`Store::suggest`].
pub const SUGGEST_LIMIT: usize = 5;

/// Leading keywords accepted by [`Store::run_query`].
const READ_KEYWORDS: [&str; 3] = ["SELECT", "WITH", "EXPLAIN"];

/// Rows kept by [`Store::run_query`]; the rest of the result set is dropped.
pub const MAX_QUERY_ROWS: usize = 200;

/// Rows produced by [`Store::run_query`], each field rendered as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRows {
    pub rows: Vec<Vec<String>>,
    /// More than [`MAX_QUERY_ROWS`] rows were available.
    pub truncated: bool,
}

impl Store {
    /// Most recent commands first.
    pub fn recent_commands(&self, limit: usize) -> Result<Vec<CommandRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM commands ORDER BY timestamp DESC, id DESC LIMIT ?1",
            CommandRecord::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                [i64::try_from(limit).unwrap_or(i64::MAX)],
                CommandRecord::from_row,
            )?
            .collect::<Result<_, _>>()?;
        Ok(records)
    }

    /// Commands containing `substring`, newest first, capped at [`SEARCH_LIMIT`].
    ///
    /// Matching is case-sensitive.
    pub fn search_commands(&self, substring: &str) -> Result<Vec<CommandRecord>, StorageError> {
        let sql = format!(
            "SELECT {} FROM commands WHERE instr(command, ?1) > 0
             ORDER BY timestamp DESC, id DESC LIMIT ?2",
            CommandRecord::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let records = stmt
            .query_map(
                rusqlite::params![substring, SEARCH_LIMIT as i64],
                CommandRecord::from_row,
            )?
            .collect::<Result<_, _>>()?;
        Ok(records)
    }

    /// All known SSH hosts, most used first, ties broken by most recent use.
    pub fn list_ssh_hosts(&self) -> Result<Vec<SshHost>, StorageError> {
        let sql = format!(
            "SELECT {} FROM ssh_hosts ORDER BY usage_count DESC, last_used DESC, id DESC",
            SshHost::COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let hosts = stmt
            .query_map([], SshHost::from_row)?
            .collect::<Result<_, _>>()?;
        Ok(hosts)
    }

    /// Up to [`SUGGEST_LIMIT`] distinct command texts matching `partial`.
    pub fn suggest(&self, partial: &str) -> Result<Vec<String>, StorageError> {
        let mut suggestions: Vec<String> = Vec::new();
        for record in self.search_commands(partial)? {
            if suggestions.len() == SUGGEST_LIMIT {
                break;
            }
            if !suggestions.contains(&record.command) {
                suggestions.push(record.command);
            }
        }
        Ok(suggestions)
    }

    /// Execute a single read-only statement and return its rows as text.
    ///
    /// The text usually comes from a remote model reply, so anything that is
    /// not a plain read is rejected with [`StorageError::ReadOnly`] before it
    /// runs.
    pub fn run_query(&self, sql: &str) -> Result<QueryRows, StorageError> {
        let sql = sql.trim().trim_end_matches(';').trim();
        let keyword = sql
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        if !READ_KEYWORDS.contains(&keyword.as_str()) {
            return Err(StorageError::ReadOnly(sql.to_string()));
        }

        let mut batch = Batch::new(&self.conn, sql);
        let Some(mut stmt) = batch.next()? else {
            return Err(StorageError::ReadOnly(sql.to_string()));
        };
        if batch.next()?.is_some() {
            return Err(StorageError::MultipleStatements(sql.to_string()));
        }
        // Catches writes hidden behind a leading WITH.
        if !stmt.readonly() {
            return Err(StorageError::ReadOnly(sql.to_string()));
        }

        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;
        let mut out = QueryRows::default();
        while let Some(row) = rows.next()? {
            if out.rows.len() == MAX_QUERY_ROWS {
                out.truncated = true;
                break;
            }
            let mut fields = Vec::with_capacity(column_count);
            for i in 0..column_count {
                fields.push(render_value(row.get_ref(i)?));
            }
            out.rows.push(fields);
        }
        Ok(out)
    }
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}
