//! Runtime configuration resolved from environment variables.
//!
//! | Variable          | Default                                      |
//! |-------------------|----------------------------------------------|
//! | `TA_API_URL`      | `https://api.openai.com/v1/chat/completions` |
//! | `TA_API_KEY`      | unset (no `Authorization` header)            |
//! | `TA_MODEL`        | `gpt-4o-mini`                                |
//! | `TA_TIMEOUT_SECS` | `30`                                         |
//! | `TA_DB_PATH`      | `~/.termassist/commands.db`                  |

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::default_db_path;

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings shared by the dispatcher, the store, and the chat client.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on a single chat request, connect included.
    pub timeout: Duration,
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            db_path: default_db_path(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout = match get("TA_TIMEOUT_SECS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!("Ignoring invalid TA_TIMEOUT_SECS '{raw}'");
                    defaults.timeout
                }
            },
            None => defaults.timeout,
        };

        Self {
            api_url: get("TA_API_URL").unwrap_or(defaults.api_url),
            api_key: get("TA_API_KEY"),
            model: get("TA_MODEL").unwrap_or(defaults.model),
            timeout,
            db_path: get("TA_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
        }
    }
}
