use rust_decimal::Decimal;
use thiserror::Error;

use crate::{account::AccountError, command::CommandError, store::StoreError};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Unauthenticated(String),
    #[error("Access denied. Admin privileges required.")]
    Forbidden,
    #[error("{0}")]
    NotFound(String),
    #[error("Insufficient funds")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Invalid PIN")]
    InvalidPin,
    #[error("{0}")]
    BusinessRule(String),
    #[error("{0}")]
    Internal(String),
}

impl BankError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn business(message: impl Into<String>) -> Self {
        Self::BusinessRule(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors a caller can fix by changing its request. Everything else is
    /// either an access problem or a fault on our side.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }
}

impl From<CommandError> for BankError {
    fn from(err: CommandError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<AccountError> for BankError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::InsufficientFunds {
                requested,
                available,
            } => Self::InsufficientFunds {
                requested,
                available,
            },
            AccountError::BalanceOutOfRange { .. } => {
                Self::business("Amount exceeds the supported balance range")
            }
        }
    }
}

impl From<StoreError> for BankError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type BankResult<T> = Result<T, BankError>;
