//! Redwoods Mailer CLI - sign in, inspect the session, listen on the
//! message channel and watch the offline sync indicator from a terminal.

mod app;
mod commands;
mod credentials;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use redwoods_core::mail::{SortKey, SortOrder};
use redwoods_core::AccountType;

#[derive(Parser, Debug)]
#[command(name = "redwoods", version, about = "Redwoods Mailer from the terminal")]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Keep the password in the OS keychain
        #[arg(long)]
        remember: bool,
    },
    /// Create an account; a verification link is emailed
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long, value_parser = parse_account_type, default_value = "Organization")]
        account_type: AccountType,
    },
    /// Sign out and forget the remembered password
    Logout,
    /// Show the current session
    Status,
    /// Email a password reset link
    ResetPassword { email: String },
    /// Change the password of the signed-in account
    UpdatePassword,
    /// Confirm an email address with a one-time code
    Verify { email: String, code: String },
    /// Refresh the session token
    Refresh,
    /// Print messages from the live channel until interrupted
    Listen {
        /// Channel address (defaults to the configured one)
        #[arg(long)]
        url: Option<String>,
    },
    /// Simulate syncing pending offline data
    Sync {
        #[arg(long, default_value_t = 45)]
        emails: u32,
        #[arg(long, default_value_t = 23)]
        messages: u32,
        #[arg(long, default_value_t = 3)]
        drafts: u32,
        #[arg(long, default_value_t = 12)]
        attachments: u32,
        /// Chance that an item fails, from 0 to 1
        #[arg(long, default_value_t = 0.1)]
        failure_rate: f64,
        /// Start offline and sync on reconnect
        #[arg(long)]
        offline: bool,
    },
    /// List the sample inbox
    Inbox {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, value_enum, default_value_t = SortArg::Date)]
        sort: SortArg,
        /// Oldest or A-Z first
        #[arg(long)]
        asc: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SortArg {
    Date,
    Sender,
    Subject,
}

impl From<SortArg> for SortKey {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Date => SortKey::Date,
            SortArg::Sender => SortKey::Sender,
            SortArg::Subject => SortKey::Subject,
        }
    }
}

fn parse_account_type(value: &str) -> Result<AccountType, String> {
    value.parse()
}

/// Initialize the tracing subscriber for logging.
///
/// `RUST_LOG` controls the level (default `warn`). The returned guard
/// flushes the log file on drop.
fn init_tracing(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr));

    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path.file_name().context("Log file path has no file name")?;
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            registry
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Ok(Some(guard))
        }
        None => {
            registry.init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _log_guard = init_tracing(cli.log_file.as_deref())?;
    info!("Redwoods CLI starting");

    match cli.command {
        Command::Login { email, remember } => commands::login(email, remember).await,
        Command::Signup {
            email,
            name,
            account_type,
        } => commands::signup(&email, &name, account_type).await,
        Command::Logout => commands::logout().await,
        Command::Status => commands::status().await,
        Command::ResetPassword { email } => commands::reset_password(&email).await,
        Command::UpdatePassword => commands::update_password().await,
        Command::Verify { email, code } => commands::verify(&email, &code).await,
        Command::Refresh => commands::refresh().await,
        Command::Listen { url } => commands::listen(url).await,
        Command::Sync {
            emails,
            messages,
            drafts,
            attachments,
            failure_rate,
            offline,
        } => {
            let counts =
                redwoods_core::offline::OfflineCounts::new(emails, messages, drafts, attachments);
            commands::sync(counts, failure_rate, offline).await
        }
        Command::Inbox { search, sort, asc } => {
            let order = if asc {
                SortOrder::Ascending
            } else {
                SortOrder::Descending
            };
            commands::inbox(&search, sort.into(), order);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_signup() {
        let cli = Cli::try_parse_from([
            "redwoods",
            "signup",
            "--email",
            "ada@example.com",
            "--name",
            "Ada",
            "--account-type",
            "ngo",
        ])
        .unwrap();
        match cli.command {
            Command::Signup { account_type, .. } => assert_eq!(account_type, AccountType::Ngo),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_account_type_is_rejected() {
        let result = Cli::try_parse_from([
            "redwoods",
            "signup",
            "--email",
            "a@example.com",
            "--name",
            "A",
            "--account-type",
            "pirate",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_log_file_is_global() {
        let cli = Cli::try_parse_from(["redwoods", "status", "--log-file", "/tmp/redwoods.log"]).unwrap();
        assert_eq!(cli.log_file.as_deref(), Some(Path::new("/tmp/redwoods.log")));
    }
}
