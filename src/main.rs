use std::io::Write;

use clap::{Parser, Subcommand};
use tracing::{debug, warn};

use termassist::bridge;
use termassist::config::Config;
use termassist::display::{format_host, format_record, format_suggestions};
use termassist::history::{CommandRecord, NewCommand};
use termassist::llm::ChatClient;
use termassist::store::Store;

#[derive(Parser)]
#[command(
    name = "ta",
    about = "Terminal assistant: command history, SSH hosts, and AI help"
)]
struct Cli {
    /// Output machine-readable JSON (default: human-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the assistant a question in plain language
    Ask {
        /// The question (remaining args are joined)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Record a command (called by the shell hook after every command)
    Log {
        /// Exit status of the command
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        exit_code: i32,
        /// Directory the command ran in (default: current directory)
        #[arg(long)]
        cwd: Option<String>,
        /// Free-form context stored with the record
        #[arg(long)]
        context: Option<String>,
        /// The command line (remaining args are joined)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Search logged commands by substring
    Search {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        query: Vec<String>,
    },
    /// Show recent commands
    History {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// List SSH hosts by usage
    Ssh,
    /// Suggest previously used commands matching partial text
    Suggest {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        partial: Vec<String>,
    },
}

// ============================================================================
// Output Formatting
// ============================================================================

fn print_records(
    out: &mut impl Write,
    records: &[CommandRecord],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(records)?)?;
    } else if records.is_empty() {
        eprintln!("No commands found.");
    } else {
        for record in records {
            writeln!(out, "{}", format_record(record))?;
        }
    }
    Ok(())
}

/// Join positional words, or `None` when nothing usable was given.
fn joined(words: &[String]) -> Option<String> {
    let text = words.join(" ");
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Store one entry, reporting failures only through tracing.
fn log_entry(config: &Config, entry: &NewCommand) -> bool {
    let result = Store::open(&config.db_path)
        .and_then(|mut store| store.log_command_with_retry(entry));
    match result {
        Ok(id) => {
            debug!(id, "command logged");
            true
        }
        Err(e) => {
            warn!("Failed to log command: {e}");
            false
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

async fn run(
    cli: Cli,
    config: &Config,
    out: &mut impl Write,
) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Some(Command::Ask { query }) => {
            let Some(question) = joined(&query) else {
                writeln!(out, "Usage: ta ask \"<question>\"")?;
                return Ok(());
            };

            let llm = match ChatClient::new(config) {
                Ok(llm) => llm,
                Err(e) => {
                    writeln!(out, "Error: {e}")?;
                    return Ok(());
                }
            };

            // Answer without history rather than not at all.
            let store = Store::open(&config.db_path).or_else(|e| {
                warn!("Could not open history database: {e}");
                Store::open_in_memory()
            })?;

            writeln!(out, "{}", bridge::ask(&store, &llm, &question).await)?;
        }
        Some(Command::Log {
            exit_code,
            cwd,
            context,
            command,
        }) => {
            let Some(command) = joined(&command) else {
                writeln!(out, "Usage: ta log <command...>")?;
                return Ok(());
            };

            let mut entry = NewCommand::new(command.as_str()).exit_code(exit_code);
            entry.working_directory = cwd;
            entry.context = context;

            // Runs from the shell hook after every command, so nothing but
            // the confirmation reaches the terminal.
            if log_entry(config, &entry) {
                writeln!(out, "Logged: {command}")?;
            }
        }
        Some(Command::Search { query }) => {
            let Some(query) = joined(&query) else {
                writeln!(out, "Usage: ta search <query...>")?;
                return Ok(());
            };
            let store = Store::open(&config.db_path)?;
            let records = store.search_commands(&query)?;
            print_records(out, &records, cli.json)?;
        }
        Some(Command::History { limit }) => {
            let store = Store::open(&config.db_path)?;
            let records = store.recent_commands(limit)?;
            print_records(out, &records, cli.json)?;
        }
        Some(Command::Ssh) => {
            let store = Store::open(&config.db_path)?;
            let hosts = store.list_ssh_hosts()?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&hosts)?)?;
            } else if hosts.is_empty() {
                eprintln!("No SSH hosts recorded yet.");
            } else {
                for host in &hosts {
                    writeln!(out, "{}", format_host(host))?;
                }
            }
        }
        Some(Command::Suggest { partial }) => {
            let Some(partial) = joined(&partial) else {
                writeln!(out, "Usage: ta suggest <partial command...>")?;
                return Ok(());
            };
            let store = Store::open(&config.db_path)?;
            let suggestions = store.suggest(&partial)?;
            if cli.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&suggestions)?)?;
            } else {
                writeln!(out, "{}", format_suggestions(&suggestions))?;
            }
        }
        None => {
            Cli::parse_from(["ta", "--help"]);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();
    run(cli, &config, &mut std::io::stdout()).await
}
