//! `nerd accounts` subcommands: a thin CLI facade over
//! `nerd_accounts::AccountStore` (spec.md §6.1).

use anyhow::{Context, Result};
use chrono::Utc;
use nerd_accounts::AccountStore;
use nerd_core::config::Config;
use nerd_core::types::Account;

fn store_from_config(config: &Config) -> AccountStore {
    let path = shellexpand_tilde(&config.accounts.store_path);
    AccountStore::new(path)
}

/// Expands a leading `~` the same way `nerd_core::config` resolves
/// `~/.nerd/...` paths, since `AccountsConfig::store_path` is stored
/// as a plain string.
fn shellexpand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

pub async fn list(config: &Config, json: bool) -> Result<()> {
    let store = store_from_config(config);
    store.load().await.context("loading account store")?;
    let accounts = store.list().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&accounts)?);
        return Ok(());
    }

    if accounts.is_empty() {
        println!("no accounts configured");
        return Ok(());
    }
    for account in accounts {
        println!(
            "[{}] {} (health pending, failures={}, cooling_down_until={})",
            account.index, account.email, account.consecutive_failures, account.cooling_down_until
        );
    }
    Ok(())
}

pub async fn add(config: &Config, email: &str) -> Result<()> {
    let store = store_from_config(config);
    store.load().await.context("loading account store")?;
    let now = Utc::now();
    let account = Account::new(email, now);
    let added = store.add(account, now).await.context("adding account")?;
    println!("added {} at index {}", added.email, added.index);
    Ok(())
}

pub async fn remove(config: &Config, email: &str) -> Result<()> {
    let store = store_from_config(config);
    store.load().await.context("loading account store")?;
    store.delete(email).await.context("removing account")?;
    println!("removed {email}");
    Ok(())
}

pub async fn show(config: &Config, email: &str, json: bool) -> Result<()> {
    let store = store_from_config(config);
    store.load().await.context("loading account store")?;
    match store.get(email).await {
        Some(account) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&account)?);
            } else {
                println!("{account:#?}");
            }
            Ok(())
        }
        None => anyhow::bail!("no account found for {email}"),
    }
}
