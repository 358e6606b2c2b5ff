//! Human-readable rendering for the `ta` subcommands.

use chrono::{DateTime, Local, Utc};

use crate::history::{CommandRecord, SshHost};

const SUCCESS_MARK: &str = "✓";
const FAILURE_MARK: &str = "✗";

fn local_time(ts: &DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// One history line: status marker, time, command, directory.
pub fn format_record(record: &CommandRecord) -> String {
    let mark = if record.succeeded() {
        SUCCESS_MARK.to_string()
    } else {
        format!("{FAILURE_MARK} ({})", record.exit_code)
    };
    let mut line = format!("{mark} [{}] {}", local_time(&record.timestamp), record.command);
    if let Some(dir) = &record.working_directory {
        line.push_str(&format!("  ({dir})"));
    }
    line
}

/// One host line: destination, usage count, last use.
pub fn format_host(host: &SshHost) -> String {
    let mut destination = match &host.username {
        Some(user) => format!("{user}@{}", host.hostname),
        None => host.hostname.clone(),
    };
    if host.port != 22 {
        destination.push_str(&format!(":{}", host.port));
    }

    let times = if host.usage_count == 1 { "time" } else { "times" };
    let mut line = format!(
        "{destination}  used {} {times}, last {}",
        host.usage_count,
        local_time(&host.last_used)
    );
    if let Some(key) = &host.key_path {
        line.push_str(&format!("  [key: {key}]"));
    }
    line
}

/// Numbered suggestion list, or a notice when there is nothing to suggest.
pub fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        return "No suggestions found.".to_string();
    }
    suggestions
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {s}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}
