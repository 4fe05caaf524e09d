use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};

use crate::{
    command::AdjustmentCommand,
    error::{BankError, BankResult},
    ledger::{NewTransaction, TransactionKind},
    service::AccountService,
    session::{Authorizer, Capability, Claims},
    store::{LedgerStore, with_transaction},
};

pub const ADMIN_COUNTERPARTY: &str = "Admin";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentReceipt {
    pub message: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

/// One-sided balance credit on behalf of an administrator.
pub struct AdminAdjustmentService {
    store: Arc<dyn LedgerStore>,
    authorizer: Authorizer,
}

impl AdminAdjustmentService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            authorizer: Authorizer,
        }
    }

    /// Credits the target's account and appends one `deposit` entry.
    pub fn credit_account(
        &self,
        caller: &Claims,
        command: AdjustmentCommand,
    ) -> BankResult<AdjustmentReceipt> {
        self.authorizer.require(caller, Capability::AdjustBalances)?;
        let amount = command.amount.value();

        let account = with_transaction(self.store.as_ref(), |tx| {
            let user = tx
                .user(command.target)
                .ok_or_else(|| BankError::not_found("User"))?;
            let account = tx
                .account_of(user.id)
                .ok_or_else(|| BankError::not_found("Account"))?;
            let account = AccountService::apply_delta(tx, account.account_number(), amount)?;
            tx.append_transaction(NewTransaction::completed(
                user.id,
                TransactionKind::Deposit,
                amount,
                ADMIN_COUNTERPARTY,
                command.description.as_str(),
            ))?;
            Ok(account)
        })
        .inspect_err(|err| {
            if !err.is_client_error() {
                error!(%err, target = %command.target, "balance adjustment aborted");
            }
        })?;

        info!(
            admin = %caller.sub,
            account = %account.account_number(),
            %amount,
            "balance adjusted"
        );
        Ok(AdjustmentReceipt {
            message: "Balance updated successfully",
            new_balance: account.balance(),
        })
    }
}
