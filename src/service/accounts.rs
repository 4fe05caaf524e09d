use std::sync::Arc;

use rust_decimal::Decimal;

use crate::{
    account::Account,
    command::BalanceCommand,
    error::{BankError, BankResult},
    ledger::{AccountNumber, Transaction, UserId},
    store::{LedgerStore, LedgerTx, read},
};

/// Balance reads and the single primitive allowed to move a balance.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn balance(&self, user_id: UserId) -> BankResult<Decimal> {
        read(self.store.as_ref(), |view| {
            view.account_of(user_id)
                .map(|account| account.balance())
                .ok_or_else(|| BankError::not_found("Account"))
        })
    }

    /// Ledger of the user, newest first.
    pub fn transactions(&self, user_id: UserId) -> BankResult<Vec<Transaction>> {
        read(self.store.as_ref(), |view| Ok(view.transactions_of(user_id)))
    }

    /// Adds `delta` to the balance of `account_number` within `tx`.
    ///
    /// Negative deltas still go through the account's funds check, but
    /// callers are expected to have validated them already.
    pub fn apply_delta(
        tx: &mut dyn LedgerTx,
        account_number: &AccountNumber,
        delta: Decimal,
    ) -> BankResult<Account> {
        let mut account = tx
            .account_by_number(account_number)
            .ok_or_else(|| BankError::not_found("Account"))?;
        if let Some(command) = BalanceCommand::from_delta(delta) {
            let event = account.handle_command(command)?;
            account.apply(&event);
            tx.update_account(account.clone())?;
        }
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        service::fixtures::{TestBank, dec},
        store::with_transaction,
    };

    use super::*;

    #[test]
    fn balance_of_new_account_is_the_starting_grant() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");
        assert_eq!(bank.accounts.balance(ada.id).unwrap(), dec("1000"));
    }

    #[test]
    fn balance_of_unknown_user_is_not_found() {
        let bank = TestBank::new();
        let err = bank.accounts.balance(uuid::Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, BankError::NotFound(message) if message == "Account not found"));
    }

    #[test]
    fn apply_delta_moves_balance_both_ways() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");

        let account = with_transaction(bank.store.as_ref(), |tx| {
            AccountService::apply_delta(tx, &ada.account_number, dec("-250.50"))?;
            AccountService::apply_delta(tx, &ada.account_number, dec("0.25"))
        })
        .unwrap();
        assert_eq!(account.balance(), dec("749.75"));
        assert_eq!(bank.accounts.balance(ada.id).unwrap(), dec("749.75"));

        let err = with_transaction(bank.store.as_ref(), |tx| {
            AccountService::apply_delta(tx, &ada.account_number, dec("-749.76"))
        })
        .unwrap_err();
        assert!(matches!(err, BankError::InsufficientFunds { .. }));
        assert_eq!(bank.accounts.balance(ada.id).unwrap(), dec("749.75"));
    }
}
