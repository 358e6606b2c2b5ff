//! AI bridge: grounds a natural-language question in local history, sends it
//! to the chat model, and runs any read query the model asks for.
//!
//! The model answers with either a shell command plus explanation, or a line
//! starting with [`SQL_MARKER`] followed by a query against the local store.
//! In the second case the query runs through [`Store::run_query`] and its rows
//! are appended to the reply.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::StorageError;
use crate::llm::LlmClient;
use crate::query::{MAX_QUERY_ROWS, QueryRows};
use crate::store::{SCHEMA_DESCRIPTION, Store};

/// Line prefix the model uses to request a database lookup.
pub const SQL_MARKER: &str = "SQL_QUERY:";

/// Recent commands included in the context bundle.
pub const CONTEXT_COMMANDS: usize = 20;

/// Most-used hosts included in the context bundle.
pub const CONTEXT_HOSTS: usize = 10;

static SQL_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?m)^\s*{}(.*)$", regex::escape(SQL_MARKER)))
        .expect("SQL marker pattern is valid")
});

// ============================================================================
// Context Bundle
// ============================================================================

/// Snapshot of local state sent along with every question.
#[derive(Debug, Clone, Default)]
pub struct ContextBundle {
    pub recent_commands: Vec<String>,
    pub hosts: Vec<String>,
    pub shell: String,
    pub working_directory: String,
}

impl ContextBundle {
    /// Gather recent commands, top hosts, shell, and current directory.
    pub fn collect(store: &Store) -> Result<Self, StorageError> {
        let recent_commands = store
            .recent_commands(CONTEXT_COMMANDS)?
            .into_iter()
            .map(|r| r.command)
            .collect();
        let hosts = store
            .list_ssh_hosts()?
            .into_iter()
            .take(CONTEXT_HOSTS)
            .map(|h| match h.username {
                Some(user) => format!("{user}@{} ({} uses)", h.hostname, h.usage_count),
                None => format!("{} ({} uses)", h.hostname, h.usage_count),
            })
            .collect();

        Ok(Self {
            recent_commands,
            hosts,
            shell: std::env::var("SHELL").unwrap_or_else(|_| "unknown".to_string()),
            working_directory: std::env::current_dir()
                .map(|dir| dir.display().to_string())
                .unwrap_or_default(),
        })
    }

    fn render(&self) -> String {
        let mut out = format!(
            "Shell: {}\nWorking directory: {}\n",
            self.shell, self.working_directory
        );

        out.push_str("Recent commands (newest first):\n");
        if self.recent_commands.is_empty() {
            out.push_str("  (none)\n");
        }
        for command in &self.recent_commands {
            out.push_str(&format!("  {command}\n"));
        }

        out.push_str("Known SSH hosts:\n");
        if self.hosts.is_empty() {
            out.push_str("  (none)\n");
        }
        for host in &self.hosts {
            out.push_str(&format!("  {host}\n"));
        }
        out
    }
}

// ============================================================================
// Prompt and Reply Handling
// ============================================================================

/// System instruction embedding the context bundle and the store schema.
pub fn system_prompt(context: &ContextBundle) -> String {
    format!(
        "You are a terminal assistant. Answer with the shell command that does what the user \
         asks, followed by a one or two sentence explanation.\n\
         \n\
         If the question is about the user's own command history or SSH hosts, instead reply \
         with a single line `{SQL_MARKER} <query>` containing one read-only SQLite SELECT \
         against this database:\n\
         {SCHEMA_DESCRIPTION}\n\
         \n\
         {}",
        context.render()
    )
}

/// The query following [`SQL_MARKER`] on the first line that starts with it.
pub fn extract_sql(reply: &str) -> Option<String> {
    let captures = SQL_LINE.captures(reply)?;
    let sql = captures[1]
        .trim()
        .trim_matches('`')
        .trim()
        .trim_end_matches(';')
        .trim();
    if sql.is_empty() {
        None
    } else {
        Some(sql.to_string())
    }
}

/// Render the outcome of a bridged query as a text block.
pub fn format_query_result(result: &Result<QueryRows, StorageError>) -> String {
    match result {
        Ok(result) if result.rows.is_empty() => "Query results: no results".to_string(),
        Ok(result) => {
            let lines: Vec<String> = result.rows.iter().map(|row| row.join(" | ")).collect();
            let mut text = format!("Query results:\n{}", lines.join("\n"));
            if result.truncated {
                text.push_str(&format!("\n(showing first {MAX_QUERY_ROWS} rows)"));
            }
            text
        }
        Err(e) => format!("Query error: {e}"),
    }
}

/// Answer `question`, never failing: errors come back as text.
pub async fn ask(store: &Store, llm: &dyn LlmClient, question: &str) -> String {
    let context = ContextBundle::collect(store).unwrap_or_else(|e| {
        warn!("Could not read history for context: {e}");
        ContextBundle::default()
    });

    let reply = match llm.complete(&system_prompt(&context), question).await {
        Ok(completion) => completion.text,
        Err(e) => return format!("Error: {e}"),
    };

    match extract_sql(&reply) {
        Some(sql) => {
            debug!(%sql, "running query requested by model");
            let result = store.run_query(&sql);
            format!("{}\n\n{}", reply.trim_end(), format_query_result(&result))
        }
        None => reply,
    }
}
