//! termassist: command history, SSH host tracking, and an AI helper for the shell.

pub mod bridge;
pub mod config;
pub mod display;
pub mod error;
pub mod history;
pub mod llm;
pub mod query;
pub mod ssh;
pub mod store;

use std::path::PathBuf;

/// Directory under the home directory holding the database.
pub const APP_DIR: &str = ".termassist";

/// Database file name inside [`APP_DIR`].
pub const DB_FILE: &str = "commands.db";

/// Default database location: `~/.termassist/commands.db`.
pub fn default_db_path() -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(APP_DIR).join(DB_FILE)
}
