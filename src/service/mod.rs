use std::sync::Arc;

use crate::{
    config::BankConfig, credentials::CredentialVerifier, session::SessionTokenIssuer,
    store::LedgerStore,
};

pub mod accounts;
pub mod admin;
pub mod transfer;
pub mod users;

pub use accounts::AccountService;
pub use admin::{AdjustmentReceipt, AdminAdjustmentService};
pub use transfer::{TransferEngine, TransferReceipt};
pub use users::{LoginOutcome, UserOverview, UserProfile, UserService, UserSummary};

/// All services wired over one shared ledger store.
pub struct Bank {
    pub users: UserService,
    pub accounts: AccountService,
    pub transfers: TransferEngine,
    pub admin: AdminAdjustmentService,
}

impl Bank {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        credentials: Arc<dyn CredentialVerifier>,
        issuer: Arc<dyn SessionTokenIssuer>,
        config: &BankConfig,
    ) -> Self {
        Self {
            users: UserService::new(
                store.clone(),
                credentials.clone(),
                issuer,
                config.starting_balance,
            ),
            accounts: AccountService::new(store.clone()),
            transfers: TransferEngine::new(store.clone(), credentials),
            admin: AdminAdjustmentService::new(store),
        }
    }
}
