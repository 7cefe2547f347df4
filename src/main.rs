//! Pesa Wallet - session runner
//!
//! ```text
//! pesa_wallet [dev | --env dev] [--status] [--serve-webhooks]
//! ```
//!
//! Session identity comes from the environment:
//! `PESA_USER_ID`, `PESA_ROLE` (individual | institution | admin), `PESA_AUTH_TOKEN`.

use std::net::SocketAddr;

use anyhow::{Context, Result};

use pesa_wallet::config::AppConfig;
use pesa_wallet::kyc::UserRole;
use pesa_wallet::logging::init_logging;
use pesa_wallet::session::SessionContext;
use pesa_wallet::{WalletApp, webhook};

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    match args.get(1) {
        Some(env) if !env.starts_with('-') => env.clone(),
        _ => "dev".to_string(),
    }
}

fn has_flag(flag: &str) -> bool {
    std::env::args().any(|a| a == flag)
}

fn session_from_env(config: &AppConfig) -> Result<SessionContext> {
    let user_id = std::env::var("PESA_USER_ID")
        .context("PESA_USER_ID is not set")?
        .parse()
        .context("PESA_USER_ID must be a number")?;
    let role = match std::env::var("PESA_ROLE") {
        Ok(raw) => raw.parse::<UserRole>().map_err(anyhow::Error::msg)?,
        Err(_) => UserRole::Individual,
    };
    let token = std::env::var("PESA_AUTH_TOKEN").context("PESA_AUTH_TOKEN is not set")?;
    Ok(SessionContext::new(user_id, role, token).with_currency(config.currency.clone()))
}

// ============================================================
// MAIN
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).with_context(|| format!("loading config for {}", env))?;
    let _log_guard = init_logging(&config);

    tracing::info!("Starting pesa_wallet in {} mode", env);

    let session = session_from_env(&config)?;
    let app = WalletApp::connect(&config, session).context("building gateway transport")?;

    let status = app.check_gateway().await;
    if has_flag("--status") {
        match status {
            Some(s) if s.available => println!("Gateway available"),
            Some(s) => println!(
                "Gateway unavailable: {}",
                s.message.unwrap_or_else(|| "no reason given".to_string())
            ),
            None => println!("Gateway status unknown"),
        }
        return Ok(());
    }

    let reconciled = app.on_foreground().await;
    for (id, result) in &reconciled {
        match result {
            Ok(state) => tracing::info!(transaction_id = %id, %state, "Reconciled"),
            Err(e) => tracing::warn!(transaction_id = %id, error = %e, "Reconcile failed"),
        }
    }
    if let Some(balance) = app.wallet().balance() {
        println!("Balance: {}", app.session().currency.label(balance));
    }

    if has_flag("--serve-webhooks") {
        let addr: SocketAddr = format!("{}:{}", config.webhook.host, config.webhook.port)
            .parse()
            .context("invalid webhook bind address")?;
        println!("Webhook receiver on http://{}{}", addr, webhook::WEBHOOK_PATH);

        tokio::select! {
            result = webhook::serve(addr, app.watcher().clone()) => {
                result.context("webhook server stopped")?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown requested");
            }
        }
        app.on_background();
    }

    Ok(())
}
