use std::net::SocketAddr;

use chrono::Duration;
use rust_decimal::Decimal;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct BankConfig {
    pub listen: SocketAddr,
    /// HMAC secret for session tokens.
    pub jwt_secret: String,
    pub token_ttl: Duration,
    /// Granted to every account when its owner registers.
    pub starting_balance: Decimal,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 5000)),
            jwt_secret: "secret".to_owned(),
            token_ttl: Duration::hours(DEFAULT_TOKEN_TTL_HOURS),
            starting_balance: Decimal::ONE_THOUSAND,
        }
    }
}
