use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    command::TransferCommand,
    credentials::CredentialVerifier,
    error::{BankError, BankResult},
    ledger::{NewTransaction, TransactionKind},
    service::AccountService,
    store::{LedgerStore, read, with_transaction},
};

/// Confirmation of a committed transfer. Balances are not echoed back.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub message: &'static str,
}

/// Moves money between two accounts and records both sides in the ledger.
pub struct TransferEngine {
    store: Arc<dyn LedgerStore>,
    credentials: Arc<dyn CredentialVerifier>,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn LedgerStore>, credentials: Arc<dyn CredentialVerifier>) -> Self {
        Self { store, credentials }
    }

    /// Debits the sender, credits the recipient and appends a `debit` and a
    /// `credit` entry, all in one store transaction.
    ///
    /// Every check runs before the first write, so a rejected transfer
    /// changes nothing. The funds check and the debit happen inside the same
    /// transaction, which keeps concurrent transfers from spending the same
    /// balance twice.
    pub fn transfer(&self, command: TransferCommand) -> BankResult<TransferReceipt> {
        let amount = command.amount.value();
        let sender = read(self.store.as_ref(), |view| {
            view.user(command.sender)
                .ok_or_else(|| BankError::not_found("Sender"))
        })?;

        // hashing is slow, keep it out of the transaction
        if !self
            .credentials
            .verify(&command.pin, sender.pin_hash.as_deref())
        {
            warn!(user = %sender.id, "transfer rejected: invalid PIN");
            return Err(BankError::InvalidPin);
        }

        let recipient_account = with_transaction(self.store.as_ref(), |tx| {
            let sender_account = tx
                .account_of(sender.id)
                .ok_or_else(|| BankError::not_found("Sender account"))?;
            AccountService::apply_delta(tx, sender_account.account_number(), -amount)?;
            if sender_account.account_number() == &command.recipient_account {
                return Err(BankError::business("Cannot transfer to your own account"));
            }
            let recipient_account = tx
                .account_by_number(&command.recipient_account)
                .ok_or_else(|| BankError::not_found("Recipient account"))?;
            let recipient = tx
                .user(recipient_account.owner())
                .ok_or_else(|| BankError::not_found("Recipient"))?;
            let recipient_account =
                AccountService::apply_delta(tx, recipient_account.account_number(), amount)?;

            tx.append_transaction(NewTransaction::completed(
                sender.id,
                TransactionKind::Debit,
                amount,
                recipient.display_name(),
                command.description.as_str(),
            ))?;
            tx.append_transaction(NewTransaction::completed(
                recipient.id,
                TransactionKind::Credit,
                amount,
                sender.display_name(),
                command.description.as_str(),
            ))?;
            Ok(recipient_account)
        })
        .inspect_err(|err| {
            if !err.is_client_error() {
                error!(%err, sender = %sender.id, "transfer aborted, nothing committed");
            }
        })?;

        info!(
            sender = %sender.account_number,
            recipient = %recipient_account.account_number(),
            %amount,
            "transfer committed"
        );
        Ok(TransferReceipt {
            message: "Transfer successful",
        })
    }
}
