//! One-shot CLI commands

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::auth::{BackendClient, RevocationClient};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::lifecycle::{outcome_message, LifecycleController, OpStatus, Operation};
use crate::models::TokenId;
use crate::tokens::{FileStorage, TokenStore};

/// Build the controller from configuration: file storage, HTTP services, wall clock.
pub fn controller(config: &Config) -> Result<LifecycleController> {
    let http = reqwest::Client::new();
    let exchange = BackendClient::new(http.clone(), &config.backend_url)
        .with_context(|| format!("Invalid backend_url {:?}", config.backend_url))?;
    let revoker = RevocationClient::new(http, &config.revoke_url)
        .with_context(|| format!("Invalid revoke_url {:?}", config.revoke_url))?;

    let storage = FileStorage::new(config.tokens_path()?);
    tracing::debug!("Token file: {}", storage.path().display());
    let clock = Arc::new(SystemClock);
    let store = TokenStore::load(Box::new(storage), clock.now());

    Ok(
        LifecycleController::new(store, Arc::new(exchange), Arc::new(revoker), clock)
            .with_reset_after(config.status_reset()),
    )
}

/// Print the URL that starts the authorization flow
pub async fn login(ctrl: &LifecycleController) -> Result<()> {
    let url = ctrl
        .auth_url()
        .await
        .context("Error generating auth URL")?;

    println!();
    println!("To sign in, visit: {}", url);
    println!("Then run:          token-cli callback <code>");
    println!();
    Ok(())
}

/// Complete the flow with the code the provider redirected back with
pub async fn callback(ctrl: &LifecycleController, code: &str) -> Result<()> {
    if code.trim().is_empty() {
        bail!("No authorization code given");
    }
    let record = ctrl.authorize(code).await?;
    println!("Stored token {} (valid for {}s).", record.id, record.expires_in);
    Ok(())
}

/// Print every stored token with its remaining lifetime
pub fn list(ctrl: &LifecycleController) -> Result<()> {
    let tokens = ctrl.tokens();
    if tokens.is_empty() {
        println!("No tokens found. Run 'token-cli login' to authenticate.");
        return Ok(());
    }

    for token in &tokens {
        println!();
        println!("Token {} ({})", token.id, token.created_local());
        println!("  Status:        {}", ctrl.expiry(token));
        println!("  Access token:  {}", token.access_token);
        println!("  Refresh token: {}", token.refresh_token);
    }
    Ok(())
}

pub async fn refresh(ctrl: &LifecycleController, id: TokenId) -> Result<()> {
    let status = ctrl.refresh(id).await;
    report(Operation::Refresh, status)
}

pub async fn revoke(ctrl: &LifecycleController, id: TokenId) -> Result<()> {
    let status = ctrl.revoke(id).await;
    report(Operation::Revoke, status)
}

pub fn delete(ctrl: &LifecycleController, id: TokenId) -> Result<()> {
    ctrl.delete(id).context("Failed to delete token")?;
    println!("Token {} deleted.", id);
    Ok(())
}

/// Show the effective configuration, optionally writing it to disk
pub fn show_config(config: &Config, init: bool) -> Result<()> {
    if init {
        let path = config.save()?;
        println!("Wrote {}", path.display());
    } else {
        println!("Config file: {}", Config::config_path()?.display());
    }
    println!("Token file:  {}", config.tokens_path()?.display());
    println!();
    print!(
        "{}",
        toml::to_string_pretty(config).context("Failed to serialize config")?
    );
    Ok(())
}

fn report(op: Operation, status: OpStatus) -> Result<()> {
    let message = outcome_message(op, status).unwrap_or("Operation did not complete.");
    match status {
        OpStatus::Success => {
            println!("{}", message);
            Ok(())
        }
        _ => bail!("{}", message),
    }
}
