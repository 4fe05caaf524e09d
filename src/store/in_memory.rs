use std::{collections::HashMap, sync::RwLock};

use tracing::warn;

use crate::{
    account::Account,
    error::BankError,
    ledger::{AccountNumber, EntrySequence, NewTransaction, Transaction, User, UserId},
};

use super::{LedgerStore, LedgerTx, LedgerView, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    accounts: HashMap<AccountNumber, Account>,
    account_owners: HashMap<UserId, AccountNumber>,
    transactions: Vec<Transaction>,
    next_sequence: EntrySequence,
}

impl LedgerState {
    fn commit(&mut self, changes: Changes) {
        for (id, user) in changes.users {
            self.emails.insert(user.email.clone(), id);
            self.users.insert(id, user);
        }
        for (number, account) in changes.accounts {
            self.account_owners.insert(account.owner(), number.clone());
            self.accounts.insert(number, account);
        }
        self.transactions.extend(changes.transactions);
        self.next_sequence = changes.next_sequence;
    }
}

impl LedgerView for LedgerState {
    fn user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).cloned()
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        self.emails
            .get(email)
            .and_then(|id| self.users.get(id))
            .cloned()
    }

    fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|user| user.created_at);
        users
    }

    fn account_of(&self, owner: UserId) -> Option<Account> {
        self.account_owners
            .get(&owner)
            .and_then(|number| self.accounts.get(number))
            .cloned()
    }

    fn account_by_number(&self, number: &AccountNumber) -> Option<Account> {
        self.accounts.get(number).cloned()
    }

    fn transactions_of(&self, user: UserId) -> Vec<Transaction> {
        newest_first(
            self.transactions
                .iter()
                .filter(|tx| tx.user_id == user)
                .cloned()
                .collect(),
        )
    }
}

fn newest_first(mut entries: Vec<Transaction>) -> Vec<Transaction> {
    entries.sort_by(|a, b| b.sequence.cmp(&a.sequence));
    entries
}

/// Writes of one transaction, merged into [`LedgerState`] on commit.
#[derive(Debug)]
struct Changes {
    users: HashMap<UserId, User>,
    accounts: HashMap<AccountNumber, Account>,
    transactions: Vec<Transaction>,
    next_sequence: EntrySequence,
}

/// Copy-on-write overlay over the committed state.
struct StagedTx<'a> {
    base: &'a LedgerState,
    changes: Changes,
}

impl<'a> StagedTx<'a> {
    fn new(base: &'a LedgerState) -> Self {
        Self {
            base,
            changes: Changes {
                users: HashMap::new(),
                accounts: HashMap::new(),
                transactions: Vec::new(),
                next_sequence: base.next_sequence,
            },
        }
    }

    fn into_changes(self) -> Changes {
        self.changes
    }
}

impl LedgerView for StagedTx<'_> {
    fn user(&self, id: UserId) -> Option<User> {
        self.changes
            .users
            .get(&id)
            .cloned()
            .or_else(|| self.base.user(id))
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        // emails never change once stored, so a staged user can only shadow
        // a committed one with the same id and address
        self.changes
            .users
            .values()
            .find(|user| user.email == email)
            .cloned()
            .or_else(|| self.base.user_by_email(email))
    }

    fn users(&self) -> Vec<User> {
        let mut users: Vec<User> = self
            .base
            .users
            .values()
            .filter(|user| !self.changes.users.contains_key(&user.id))
            .chain(self.changes.users.values())
            .cloned()
            .collect();
        users.sort_by_key(|user| user.created_at);
        users
    }

    fn account_of(&self, owner: UserId) -> Option<Account> {
        self.changes
            .accounts
            .values()
            .find(|account| account.owner() == owner)
            .cloned()
            .or_else(|| self.base.account_of(owner))
    }

    fn account_by_number(&self, number: &AccountNumber) -> Option<Account> {
        self.changes
            .accounts
            .get(number)
            .cloned()
            .or_else(|| self.base.account_by_number(number))
    }

    fn transactions_of(&self, user: UserId) -> Vec<Transaction> {
        newest_first(
            self.base
                .transactions
                .iter()
                .chain(self.changes.transactions.iter())
                .filter(|tx| tx.user_id == user)
                .cloned()
                .collect(),
        )
    }
}

impl LedgerTx for StagedTx<'_> {
    fn insert_user(&mut self, user: User) -> Result<(), StoreError> {
        if self.user_by_email(&user.email).is_some() {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        if self.user(user.id).is_some() {
            return Err(StoreError::DuplicateUser(user.id));
        }
        self.changes.users.insert(user.id, user);
        Ok(())
    }

    fn update_user(&mut self, mut user: User) -> Result<(), StoreError> {
        let Some(current) = self.user(user.id) else {
            return Err(StoreError::MissingUser(user.id));
        };
        // identity fields are immutable
        user.email = current.email;
        user.account_number = current.account_number;
        user.created_at = current.created_at;
        self.changes.users.insert(user.id, user);
        Ok(())
    }

    fn insert_account(&mut self, account: Account) -> Result<(), StoreError> {
        if self.user(account.owner()).is_none() {
            return Err(StoreError::MissingUser(account.owner()));
        }
        if self.account_of(account.owner()).is_some() {
            return Err(StoreError::DuplicateOwner(account.owner()));
        }
        if self.account_by_number(account.account_number()).is_some() {
            return Err(StoreError::DuplicateAccountNumber(
                account.account_number().clone(),
            ));
        }
        self.changes
            .accounts
            .insert(account.account_number().clone(), account);
        Ok(())
    }

    fn update_account(&mut self, account: Account) -> Result<(), StoreError> {
        match self.account_by_number(account.account_number()) {
            Some(current) if current.owner() == account.owner() => {
                self.changes
                    .accounts
                    .insert(account.account_number().clone(), account);
                Ok(())
            }
            _ => Err(StoreError::MissingAccount(account.account_number().clone())),
        }
    }

    fn append_transaction(&mut self, entry: NewTransaction) -> Result<Transaction, StoreError> {
        if self.user(entry.user_id).is_none() {
            return Err(StoreError::MissingUser(entry.user_id));
        }
        let recorded = Transaction::record(entry, self.changes.next_sequence);
        self.changes.next_sequence += 1;
        self.changes.transactions.push(recorded.clone());
        Ok(recorded)
    }
}

/// Process-local ledger store.
///
/// A transaction holds the write lock from its first read to its commit, so
/// transactions are serializable. Reads share the lock.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn run_read(
        &self,
        work: &mut dyn FnMut(&dyn LedgerView) -> Result<(), BankError>,
    ) -> Result<(), BankError> {
        let state = self.state.read().unwrap_or_else(|poisoned| {
            warn!("ledger store lock was poisoned, recovering committed state");
            self.state.clear_poison();
            poisoned.into_inner()
        });
        work(&*state)
    }

    /// A unit of work that panics never reaches the commit, so the state
    /// behind a poisoned lock is still the last committed one.
    fn run_transaction(
        &self,
        work: &mut dyn FnMut(&mut dyn LedgerTx) -> Result<(), BankError>,
    ) -> Result<(), BankError> {
        let mut state = self.state.write().unwrap_or_else(|poisoned| {
            warn!("ledger store lock was poisoned, recovering committed state");
            self.state.clear_poison();
            poisoned.into_inner()
        });
        let mut staged = StagedTx::new(&state);
        work(&mut staged)?;
        let changes = staged.into_changes();
        state.commit(changes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::{
        account::Account,
        command::BalanceCommand,
        ledger::{Role, TransactionKind},
        store::{read, with_transaction},
    };

    use super::*;

    fn user(email: &str, number: &str) -> User {
        User {
            id: Uuid::new_v4(),
            first_name: "Ada".to_owned(),
            last_name: "Lovelace".to_owned(),
            email: email.to_owned(),
            password_hash: "hash".to_owned(),
            pin_hash: None,
            phone_number: None,
            address: None,
            account_number: AccountNumber::from(number),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    fn seed(store: &InMemoryLedgerStore, email: &str, number: &str) -> User {
        let user = user(email, number);
        with_transaction(store, |tx| {
            tx.insert_user(user.clone())?;
            tx.insert_account(Account::open(
                user.id,
                user.account_number.clone(),
                Decimal::ONE_THOUSAND,
            ))?;
            Ok(())
        })
        .unwrap();
        user
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let store = InMemoryLedgerStore::new();
        let ada = seed(&store, "ada@example.com", "5551112222");

        let err = with_transaction(&store, |tx| {
            let mut account = tx.account_of(ada.id).unwrap();
            let command = BalanceCommand::from_delta(Decimal::TEN).unwrap();
            let event = account.handle_command(command)?;
            account.apply(&event);
            tx.update_account(account)?;
            tx.append_transaction(NewTransaction::completed(
                ada.id,
                TransactionKind::Deposit,
                Decimal::TEN,
                "Admin",
                "test",
            ))?;
            // staged writes are visible inside the transaction
            assert_eq!(
                tx.account_of(ada.id).unwrap().balance(),
                Decimal::from(1010)
            );
            assert_eq!(tx.transactions_of(ada.id).len(), 1);
            Err::<(), _>(BankError::internal("crash mid-commit"))
        })
        .unwrap_err();
        assert!(matches!(err, BankError::Internal(_)));

        let (balance, history) = read(&store, |view| {
            Ok((
                view.account_of(ada.id).unwrap().balance(),
                view.transactions_of(ada.id),
            ))
        })
        .unwrap();
        assert_eq!(balance, Decimal::ONE_THOUSAND);
        assert!(history.is_empty());
    }

    #[test]
    fn panicked_transaction_leaves_store_usable() {
        let store = InMemoryLedgerStore::new();
        let ada = seed(&store, "ada@example.com", "5551112222");

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            with_transaction(&store, |tx| -> Result<(), BankError> {
                let mut user = tx.user(ada.id).unwrap();
                user.first_name = "Augusta".to_owned();
                tx.update_user(user)?;
                panic!("unit of work blew up");
            })
        }));
        assert!(outcome.is_err());

        let stored = read(&store, |view| Ok(view.user(ada.id).unwrap())).unwrap();
        assert_eq!(stored.first_name, "Ada");
        with_transaction(&store, |tx| {
            tx.append_transaction(NewTransaction::completed(
                ada.id,
                TransactionKind::Deposit,
                Decimal::ONE,
                "Admin",
                "after recovery",
            ))?;
            Ok(())
        })
        .unwrap();
        let history = read(&store, |view| Ok(view.transactions_of(ada.id))).unwrap();
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn uniqueness_is_enforced() {
        let store = InMemoryLedgerStore::new();
        let ada = seed(&store, "ada@example.com", "5551112222");

        let err = with_transaction(&store, |tx| {
            tx.insert_user(user("ada@example.com", "5551113333"))?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, BankError::Internal(_)));

        let grace = user("grace@example.com", "5551112222");
        let err = with_transaction(&store, |tx| {
            tx.insert_user(grace.clone())?;
            tx.insert_account(Account::open(
                grace.id,
                grace.account_number.clone(),
                Decimal::ONE_THOUSAND,
            ))?;
            Ok(())
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "account number 5551112222 is already assigned"
        );

        let users = read(&store, |view| Ok(view.users())).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, ada.id);
    }

    #[test]
    fn update_user_keeps_identity_fields() {
        let store = InMemoryLedgerStore::new();
        let ada = seed(&store, "ada@example.com", "5551112222");

        with_transaction(&store, |tx| {
            let mut changed = tx.user(ada.id).unwrap();
            changed.first_name = "Augusta".to_owned();
            changed.email = "other@example.com".to_owned();
            changed.account_number = AccountNumber::from("1234567890");
            tx.update_user(changed)?;
            Ok(())
        })
        .unwrap();

        let stored = read(&store, |view| Ok(view.user(ada.id).unwrap())).unwrap();
        assert_eq!(stored.first_name, "Augusta");
        assert_eq!(stored.email, "ada@example.com");
        assert_eq!(stored.account_number.as_str(), "5551112222");
    }

    #[test]
    fn transactions_are_listed_newest_first() {
        let store = InMemoryLedgerStore::new();
        let ada = seed(&store, "ada@example.com", "5551112222");
        for description in ["first", "second", "third"] {
            with_transaction(&store, |tx| {
                tx.append_transaction(NewTransaction::completed(
                    ada.id,
                    TransactionKind::Deposit,
                    Decimal::ONE,
                    "Admin",
                    description,
                ))?;
                Ok(())
            })
            .unwrap();
        }
        let history = read(&store, |view| Ok(view.transactions_of(ada.id))).unwrap();
        let descriptions: Vec<&str> = history.iter().map(|tx| tx.description.as_str()).collect();
        assert_eq!(descriptions, ["third", "second", "first"]);
    }
}
