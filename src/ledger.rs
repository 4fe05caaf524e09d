use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type UserId = Uuid;

/// Sequence number assigned by the store when a ledger entry is appended.
pub type EntrySequence = u64;

const ACCOUNT_NUMBER_MIN: u64 = 1_000_000_000;
const ACCOUNT_NUMBER_MAX: u64 = 9_999_999_999;

/// 10-digit account identifier. Assigned once, never changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountNumber(String);

impl AccountNumber {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self(
            rng.gen_range(ACCOUNT_NUMBER_MIN..=ACCOUNT_NUMBER_MAX)
                .to_string(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for AccountNumber {
    fn from(value: &str) -> Self {
        Self(value.trim().to_owned())
    }
}

impl fmt::Display for AccountNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    /// Trimmed and lower-cased; unique across the store.
    pub email: String,
    pub password_hash: String,
    /// Absent until the user sets a PIN.
    pub pin_hash: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub account_number: AccountNumber,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
    Transfer,
    Deposit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

/// Ledger entry before the store has accepted it.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub counterparty: String,
    pub description: String,
    pub status: TransactionStatus,
}

impl NewTransaction {
    pub fn completed(
        user_id: UserId,
        kind: TransactionKind,
        amount: Decimal,
        counterparty: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            kind,
            amount,
            counterparty: counterparty.into(),
            description: description.into(),
            status: TransactionStatus::Completed,
        }
    }
}

/// Immutable ledger entry. It points at the owning user, never at the account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: Uuid,
    #[serde(rename = "user")]
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub counterparty: String,
    pub description: String,
    pub status: TransactionStatus,
    pub date: DateTime<Utc>,
    #[serde(skip)]
    pub sequence: EntrySequence,
}

impl Transaction {
    pub fn record(entry: NewTransaction, sequence: EntrySequence) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: entry.user_id,
            kind: entry.kind,
            amount: entry.amount,
            counterparty: entry.counterparty,
            description: entry.description,
            status: entry.status,
            date: Utc::now(),
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_account_numbers_have_ten_digits() {
        let mut rng = rand::thread_rng();
        for _ in 0..1000 {
            let number = AccountNumber::generate(&mut rng);
            assert_eq!(number.as_str().len(), 10);
            assert!(number.as_str().bytes().all(|b| b.is_ascii_digit()));
            assert_ne!(number.as_str().as_bytes()[0], b'0');
        }
    }

    #[test]
    fn transaction_serializes_as_ledger_row() {
        let entry = NewTransaction::completed(
            Uuid::nil(),
            TransactionKind::Debit,
            Decimal::new(15000, 2),
            "Bob Stone",
            "Transfer",
        );
        let row = serde_json::to_value(Transaction::record(entry, 7)).unwrap();
        assert_eq!(row["type"], "debit");
        assert_eq!(row["amount"], 150.0);
        assert_eq!(row["counterparty"], "Bob Stone");
        assert_eq!(row["status"], "completed");
        assert!(row.get("sequence").is_none());
    }
}
