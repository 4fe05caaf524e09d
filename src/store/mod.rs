use thiserror::Error;

use crate::{
    account::Account,
    error::BankError,
    ledger::{AccountNumber, NewTransaction, Transaction, User, UserId},
};

pub mod in_memory;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("a user with email `{0}` already exists")]
    DuplicateEmail(String),
    #[error("user {0} already exists")]
    DuplicateUser(UserId),
    #[error("account number {0} is already assigned")]
    DuplicateAccountNumber(AccountNumber),
    #[error("user {0} already owns an account")]
    DuplicateOwner(UserId),
    #[error("user {0} does not exist")]
    MissingUser(UserId),
    #[error("account {0} does not exist")]
    MissingAccount(AccountNumber),
}

/// Read access to users, accounts and ledger entries.
pub trait LedgerView {
    fn user(&self, id: UserId) -> Option<User>;
    fn user_by_email(&self, email: &str) -> Option<User>;
    fn users(&self) -> Vec<User>;
    fn account_of(&self, owner: UserId) -> Option<Account>;
    fn account_by_number(&self, number: &AccountNumber) -> Option<Account>;
    /// Entries of one user, newest first.
    fn transactions_of(&self, user: UserId) -> Vec<Transaction>;
}

/// Writes staged inside a single store transaction.
///
/// Nothing written through this trait is visible to other callers until the
/// enclosing transaction commits, and nothing is kept if it aborts.
pub trait LedgerTx: LedgerView {
    fn insert_user(&mut self, user: User) -> Result<(), StoreError>;
    fn update_user(&mut self, user: User) -> Result<(), StoreError>;
    fn insert_account(&mut self, account: Account) -> Result<(), StoreError>;
    fn update_account(&mut self, account: Account) -> Result<(), StoreError>;
    fn append_transaction(&mut self, entry: NewTransaction) -> Result<Transaction, StoreError>;
}

/// Persistence for users, accounts and the transaction ledger.
///
/// Every mutation goes through [`LedgerStore::run_transaction`]: the unit of
/// work either commits as a whole or leaves no trace. Transactions touching
/// the same account are serialized by the store.
pub trait LedgerStore: Send + Sync {
    fn run_read(
        &self,
        work: &mut dyn FnMut(&dyn LedgerView) -> Result<(), BankError>,
    ) -> Result<(), BankError>;

    fn run_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn LedgerTx) -> Result<(), BankError>,
    ) -> Result<(), BankError>;
}

/// Runs `work` against a consistent view of the store.
pub fn read<T>(
    store: &dyn LedgerStore,
    work: impl FnOnce(&dyn LedgerView) -> Result<T, BankError>,
) -> Result<T, BankError> {
    let mut work = Some(work);
    let mut output = None;
    store.run_read(&mut |view| {
        let work = work
            .take()
            .ok_or_else(|| BankError::internal("read unit of work ran twice"))?;
        output = Some(work(view)?);
        Ok(())
    })?;
    output.ok_or_else(|| BankError::internal("read unit of work did not run"))
}

/// Runs `work` as one atomic unit. The result is returned only after the
/// store has committed every write made by `work`.
pub fn with_transaction<T>(
    store: &dyn LedgerStore,
    work: impl FnOnce(&mut dyn LedgerTx) -> Result<T, BankError>,
) -> Result<T, BankError> {
    let mut work = Some(work);
    let mut output = None;
    store.run_transaction(&mut |tx| {
        let work = work
            .take()
            .ok_or_else(|| BankError::internal("transaction unit of work ran twice"))?;
        output = Some(work(tx)?);
        Ok(())
    })?;
    output.ok_or_else(|| BankError::internal("transaction unit of work did not run"))
}
