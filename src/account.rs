use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    command::{BalanceAction, BalanceCommand},
    ledger::{AccountNumber, UserId},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Checking,
    Savings,
}

#[derive(Debug, PartialEq, Eq)]
pub enum BalanceEventKind {
    Credited,
    Debited,
}

#[derive(Debug)]
pub struct BalanceEvent {
    amount: Decimal,
    kind: BalanceEventKind,
}

impl BalanceEvent {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn kind(&self) -> &BalanceEventKind {
        &self.kind
    }
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Balance of {balance} cannot absorb {amount} exactly")]
    BalanceOutOfRange { balance: Decimal, amount: Decimal },
}

/// `a + b` when the sum fits without overflow or rounding.
fn exact_sum(a: Decimal, b: Decimal) -> Option<Decimal> {
    let sum = a.checked_add(b)?;
    (sum.checked_sub(b)? == a && sum.checked_sub(a)? == b).then_some(sum)
}

/// `a - b` when the difference fits without overflow or rounding.
fn exact_difference(a: Decimal, b: Decimal) -> Option<Decimal> {
    let difference = a.checked_sub(b)?;
    (exact_sum(difference, b)? == a).then_some(difference)
}

/// Balance holder owned by exactly one user.
///
/// The balance changes only by applying a [`BalanceEvent`], and events are
/// only produced by [`Account::handle_command`]. Nothing else writes to it.
#[derive(Debug, Clone)]
pub struct Account {
    account_number: AccountNumber,
    owner: UserId,
    balance: Decimal,
    account_type: AccountType,
    status: AccountStatus,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Account with its initial grant, created together with its owner.
    pub fn open(owner: UserId, account_number: AccountNumber, starting_balance: Decimal) -> Self {
        Self {
            account_number,
            owner,
            balance: starting_balance,
            account_type: AccountType::default(),
            status: AccountStatus::default(),
            created_at: Utc::now(),
        }
    }

    pub fn account_number(&self) -> &AccountNumber {
        &self.account_number
    }

    pub fn owner(&self) -> UserId {
        self.owner
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn account_type(&self) -> AccountType {
        self.account_type
    }

    pub fn status(&self) -> AccountStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Events from [`Account::handle_command`] on the same state are known to
    /// stay in range, so applying them cannot fail.
    pub fn apply(&mut self, event: &BalanceEvent) {
        match event.kind {
            BalanceEventKind::Credited => {
                self.balance += event.amount;
            }
            BalanceEventKind::Debited => {
                self.balance -= event.amount;
            }
        }
    }

    pub fn handle_command(&self, command: BalanceCommand) -> Result<BalanceEvent, AccountError> {
        let amount = command.amount();
        let out_of_range = || AccountError::BalanceOutOfRange {
            balance: self.balance,
            amount,
        };
        match command.action() {
            BalanceAction::Credit => {
                exact_sum(self.balance, amount).ok_or_else(out_of_range)?;
                Ok(BalanceEvent {
                    amount,
                    kind: BalanceEventKind::Credited,
                })
            }
            BalanceAction::Debit => {
                if self.balance < amount {
                    return Err(AccountError::InsufficientFunds {
                        requested: amount,
                        available: self.balance,
                    });
                }
                exact_difference(self.balance, amount).ok_or_else(out_of_range)?;
                Ok(BalanceEvent {
                    amount,
                    kind: BalanceEventKind::Debited,
                })
            }
        }
    }
}
