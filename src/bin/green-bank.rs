use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use green_bank::{
    command::MONEY_SCALE,
    config::{BankConfig, DEFAULT_LISTEN, DEFAULT_TOKEN_TTL_HOURS},
    credentials::Argon2Verifier,
    http::{AppState, build_router},
    store::in_memory::InMemoryLedgerStore,
};
use rust_decimal::Decimal;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "green-bank", version, about = "Green Bank REST service")]
struct Cli {
    /// Socket address to bind, e.g. 127.0.0.1:5000
    #[arg(long, default_value = DEFAULT_LISTEN, env = "BANK_LISTEN")]
    listen: SocketAddr,
    /// HMAC secret used to sign session tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,
    /// Session token lifetime in hours.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_HOURS, env = "BANK_TOKEN_TTL_HOURS")]
    token_ttl_hours: i64,
    /// Balance granted to every new account.
    #[arg(long, default_value = "1000", env = "BANK_STARTING_BALANCE")]
    starting_balance: Decimal,
}

impl Cli {
    fn into_config(self) -> Result<BankConfig> {
        anyhow::ensure!(
            self.token_ttl_hours > 0,
            "token TTL must be positive, got {}",
            self.token_ttl_hours
        );
        anyhow::ensure!(
            self.starting_balance >= Decimal::ZERO,
            "starting balance must not be negative, got {}",
            self.starting_balance
        );
        anyhow::ensure!(
            self.starting_balance.normalize().scale() <= MONEY_SCALE,
            "starting balance must be in whole cents, got {}",
            self.starting_balance
        );
        let defaults = BankConfig::default();
        let jwt_secret = self.jwt_secret.unwrap_or_else(|| {
            warn!("JWT_SECRET is not set, falling back to the development secret");
            defaults.jwt_secret
        });
        Ok(BankConfig {
            listen: self.listen,
            jwt_secret,
            token_ttl: Duration::hours(self.token_ttl_hours),
            starting_balance: self.starting_balance,
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "green_bank=info,info".to_string()),
        )
        .init();

    let config = Cli::parse().into_config()?;
    let state = AppState::new(
        &config,
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(Argon2Verifier::new()),
    );
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind `{}`", config.listen))?;
    info!("green-bank listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
