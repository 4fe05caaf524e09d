use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::BankError,
    ledger::{Role, UserId},
};

/// Verified identity carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: UserId,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Issues and validates bearer tokens.
pub trait SessionTokenIssuer: Send + Sync {
    fn issue(&self, user_id: UserId, role: Role) -> Result<String, BankError>;

    /// Fails with [`BankError::Unauthenticated`] for malformed, tampered or
    /// expired tokens.
    fn verify(&self, token: &str) -> Result<Claims, BankError>;
}

/// HS256 JWT issuer.
pub struct JwtIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl JwtIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
        }
    }
}

impl SessionTokenIssuer for JwtIssuer {
    fn issue(&self, user_id: UserId, role: Role) -> Result<String, BankError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            role,
            iat: now,
            exp: now + self.ttl.num_seconds(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| BankError::internal(format!("failed to sign session token: {err}")))
    }

    fn verify(&self, token: &str) -> Result<Claims, BankError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(%err, "rejected session token");
                match err.kind() {
                    ErrorKind::ExpiredSignature => {
                        BankError::Unauthenticated("Token has expired".to_owned())
                    }
                    _ => BankError::Unauthenticated("Token is not valid".to_owned()),
                }
            })
    }
}

/// Operations gated by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ListUsers,
    AdjustBalances,
}

impl Role {
    pub fn grants(self, capability: Capability) -> bool {
        match (self, capability) {
            (Role::Admin, _) => true,
            (Role::User, Capability::ListUsers | Capability::AdjustBalances) => false,
        }
    }
}

/// Claim check run after authentication succeeded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authorizer;

impl Authorizer {
    pub fn require(&self, claims: &Claims, capability: Capability) -> Result<(), BankError> {
        if claims.role.grants(capability) {
            Ok(())
        } else {
            debug!(user = %claims.sub, ?capability, "capability denied");
            Err(BankError::Forbidden)
        }
    }
}
