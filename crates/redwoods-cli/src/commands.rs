//! Subcommand implementations.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::warn;

use redwoods_core::auth::{AuthOutcome, Navigator};
use redwoods_core::config::Config;
use redwoods_core::mail::{Mailbox, SortKey, SortOrder};
use redwoods_core::offline::{OfflineCounts, RandomFailures, SyncSimulator};
use redwoods_core::shell::DashboardKind;
use redwoods_core::utils::{format_last_sync, format_relative_timestamp, truncate_string};
use redwoods_core::AccountType;

use crate::app::App;
use crate::credentials::CredentialStore;

/// Password source for non-interactive use.
const ENV_PASSWORD: &str = "REDWOODS_PASSWORD";

/// How long login waits for the signed-in notification before printing.
const SESSION_SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Width of the preview column in the inbox listing.
const PREVIEW_WIDTH: usize = 48;

fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env();
    Ok(config)
}

async fn open_app() -> Result<App> {
    App::new(load_config()?).await
}

fn prompt_line(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

fn prompt_new_password() -> Result<String> {
    let password = prompt_password("New password: ")?;
    let confirm = prompt_password("Confirm password: ")?;
    if password != confirm {
        bail!("Passwords do not match");
    }
    Ok(password)
}

/// Turn an action outcome into a CLI result.
fn report(outcome: AuthOutcome, what: &str) -> Result<()> {
    match outcome.into_result() {
        Ok(()) => Ok(()),
        Err(e) => bail!("{} failed: {}", what, e.message()),
    }
}

pub async fn login(email: Option<String>, remember: bool) -> Result<()> {
    let mut app = open_app().await?;

    let email = match email.or_else(|| app.config.last_email.clone()) {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = match std::env::var(ENV_PASSWORD).ok().filter(|p| !p.is_empty()) {
        Some(password) => password,
        None => match CredentialStore::get_password(&email) {
            Some(password) => password,
            None => prompt_password("Password: ")?,
        },
    };

    report(app.actions()?.sign_in(&email, &password).await, "Sign-in")?;

    if let Err(e) = app.remember_email(&email) {
        warn!(error = %e, "Failed to save last email");
    }
    if remember {
        CredentialStore::store(&email, &password)?;
    }

    match app.store()?.wait_for_identity(SESSION_SETTLE_TIMEOUT).await {
        Some(identity) => println!("Signed in as {} <{}>", identity.display_name(), identity.email),
        None => println!("Signed in as {}", email),
    }
    Ok(())
}

pub async fn signup(email: &str, name: &str, account_type: AccountType) -> Result<()> {
    let app = open_app().await?;
    let password = prompt_new_password()?;

    let mut metadata = Map::new();
    metadata.insert("name".to_string(), Value::String(name.to_string()));
    metadata.insert("userType".to_string(), Value::String(account_type.tag().to_string()));

    report(app.actions()?.sign_up(email, &password, metadata).await, "Sign-up")?;
    println!("Check {} for a verification link.", email);
    Ok(())
}

pub async fn logout() -> Result<()> {
    let app = open_app().await?;
    let email = app.store()?.identity().map(|identity| identity.email);

    app.actions()?.sign_out().await;

    if let Some(email) = email.or_else(|| app.config.last_email.clone()) {
        if let Err(e) = CredentialStore::delete(&email) {
            tracing::debug!(error = %e, "No remembered password to delete");
        }
    }
    println!("Signed out.");
    Ok(())
}

pub async fn status() -> Result<()> {
    let app = open_app().await?;
    let state = app.store()?.snapshot();

    println!("Phase:     {:?}", state.phase);
    match &state.identity {
        Some(identity) => {
            let dashboard = DashboardKind::for_identity(identity);
            println!("Signed in: {} <{}>", identity.display_name(), identity.email);
            println!("Account:   {}", identity.account_type());
            println!("Dashboard: {}", dashboard.title());
        }
        None => println!("Signed in: no"),
    }
    println!("Route:     {}", app.router.current_path());
    Ok(())
}

pub async fn reset_password(email: &str) -> Result<()> {
    let app = open_app().await?;
    report(app.actions()?.reset_password(email).await, "Password reset")?;
    println!("If {} has an account, a reset link is on its way.", email);
    Ok(())
}

pub async fn update_password() -> Result<()> {
    let app = open_app().await?;
    if !app.store()?.snapshot().is_authenticated() {
        bail!("Not signed in. Run `redwoods login` first.");
    }
    let password = prompt_new_password()?;
    report(app.actions()?.update_password(&password).await, "Password update")?;
    println!("Password updated.");
    Ok(())
}

pub async fn verify(email: &str, code: &str) -> Result<()> {
    let app = open_app().await?;
    report(app.actions()?.verify_otp(email, code).await, "Verification")?;
    println!("Email verified.");
    Ok(())
}

pub async fn refresh() -> Result<()> {
    let app = open_app().await?;
    report(app.actions()?.refresh_session().await, "Session refresh")?;
    println!("Session refreshed.");
    Ok(())
}

pub async fn listen(url: Option<String>) -> Result<()> {
    let mut app = open_app().await?;
    let identity = app.store()?.identity();
    let channel = app.attach_channel(url)?;

    let _subscription = channel.subscribe(|message| match serde_json::to_string(&message) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!(error = %e, "Failed to print channel message"),
    });

    let mut state = channel.watch();
    let mut greeted = false;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = state.borrow_and_update().clone();
                if current.connected {
                    eprintln!("connected");
                    if !greeted {
                        if let Some(identity) = &identity {
                            greeted = channel.send(&json!({"type": "hello", "user": identity.id}));
                        }
                    }
                } else if let Some(error) = &current.error {
                    eprintln!(
                        "disconnected: {} (reconnect attempt {}/{})",
                        error,
                        current.reconnect_attempt,
                        channel.config().reconnect_attempts
                    );
                } else if !current.connecting {
                    eprintln!("disconnected");
                }
            }
        }
    }

    channel.disconnect();
    Ok(())
}

pub async fn sync(counts: OfflineCounts, failure_rate: f64, offline: bool) -> Result<()> {
    let sim = SyncSimulator::with_oracle(counts, RandomFailures::new(failure_rate));
    println!(
        "Pending: {} emails, {} messages, {} drafts, {} attachments ({} MB)",
        counts.emails,
        counts.messages,
        counts.drafts,
        counts.attachments,
        sim.storage_usage_mb()
    );
    println!("Last sync: {}", format_last_sync(sim.status().last_sync, Utc::now()));

    let handle = if offline {
        let _ = sim.set_online(false);
        println!("Offline. Reconnecting...");
        sim.set_online(true)
    } else {
        sim.start_sync()
    };
    let Some(handle) = handle else {
        println!("Nothing to sync.");
        return Ok(());
    };

    let mut status = sim.watch();
    let mut last_progress = None;
    let progress_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = status.borrow_and_update().clone();
            if last_progress != Some(current.progress) && current.progress % 10 == 0 {
                last_progress = Some(current.progress);
                eprintln!(
                    "{:>3}% ({} synced, {} failed)",
                    current.progress, current.synced_items, current.failed_items
                );
            }
        }
    });

    let report = handle.await.context("Sync task stopped unexpectedly")?;
    progress_task.abort();
    let Some(report) = report else {
        println!("Sync cancelled.");
        return Ok(());
    };

    println!("Synced {} items, {} failed.", report.synced, report.failed);
    let remaining = report.remaining;
    println!(
        "Still pending: {} emails, {} messages, {} drafts, {} attachments ({} MB)",
        remaining.emails,
        remaining.messages,
        remaining.drafts,
        remaining.attachments,
        remaining.storage_usage_mb()
    );
    println!("Last sync: {}", format_last_sync(sim.status().last_sync, Utc::now()));
    Ok(())
}

pub fn inbox(search: &str, sort: SortKey, order: SortOrder) {
    let now = Utc::now();
    let mailbox = Mailbox::demo(now);
    let visible = mailbox.visible(search, sort, order);

    if visible.is_empty() {
        println!("No emails match '{}'.", search);
        return;
    }
    for email in visible {
        let unread = if email.is_read { ' ' } else { '*' };
        let star = if email.is_starred { '★' } else { ' ' };
        let clip = if email.has_attachments() { '@' } else { ' ' };
        println!(
            "{}{}{} {:<18} {:<34} {:>10}",
            unread,
            star,
            clip,
            truncate_string(&email.sender.name, 18),
            truncate_string(&email.subject, 34),
            format_relative_timestamp(email.timestamp, now),
        );
        println!("     {}", truncate_string(&email.preview, PREVIEW_WIDTH));
    }
    println!("{} unread", mailbox.unread_count());
}
