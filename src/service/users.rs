use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    account::{Account, AccountStatus},
    command::{LoginCommand, PasswordChangeCommand, PinCommand, ProfileUpdate, RegisterCommand},
    credentials::CredentialVerifier,
    error::{BankError, BankResult},
    ledger::{AccountNumber, Role, User, UserId},
    session::{Authorizer, Capability, Claims, SessionTokenIssuer},
    store::{LedgerStore, LedgerTx, read, with_transaction},
};

/// Collisions on a random 10-digit number are rare; give up well before
/// this turns into a busy loop.
const ACCOUNT_NUMBER_ATTEMPTS: usize = 16;

/// User as shown to its owner. Never carries password or PIN hashes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub account_number: AccountNumber,
    pub role: Role,
    pub has_pin: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            phone_number: user.phone_number.clone(),
            address: user.address.clone(),
            account_number: user.account_number.clone(),
            role: user.role,
            has_pin: user.pin_hash.is_some(),
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub account_number: AccountNumber,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub user: UserSummary,
}

/// Admin listing row: profile plus the state of the user's account.
#[derive(Debug, Clone, Serialize)]
pub struct UserOverview {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub status: AccountStatus,
}

/// Registration, authentication and self-service profile management.
pub struct UserService {
    store: Arc<dyn LedgerStore>,
    credentials: Arc<dyn CredentialVerifier>,
    issuer: Arc<dyn SessionTokenIssuer>,
    authorizer: Authorizer,
    starting_balance: Decimal,
}

impl UserService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        credentials: Arc<dyn CredentialVerifier>,
        issuer: Arc<dyn SessionTokenIssuer>,
        starting_balance: Decimal,
    ) -> Self {
        Self {
            store,
            credentials,
            issuer,
            authorizer: Authorizer,
            starting_balance,
        }
    }

    /// Creates the user and its account together, or neither.
    pub fn register(&self, command: RegisterCommand) -> BankResult<UserProfile> {
        let password_hash = self.credentials.prepare(&command.password)?;
        let user = with_transaction(self.store.as_ref(), |tx| {
            if tx.user_by_email(&command.email).is_some() {
                debug!(email = %command.email, "registration rejected: duplicate email");
                return Err(BankError::business("User already exists"));
            }
            let user = User {
                id: Uuid::new_v4(),
                first_name: command.first_name.clone(),
                last_name: command.last_name.clone(),
                email: command.email.clone(),
                password_hash: password_hash.clone(),
                pin_hash: None,
                phone_number: command.phone_number.clone(),
                address: command.address.clone(),
                account_number: unused_account_number(tx)?,
                role: Role::User,
                created_at: Utc::now(),
            };
            tx.insert_user(user.clone())?;
            tx.insert_account(Account::open(
                user.id,
                user.account_number.clone(),
                self.starting_balance,
            ))?;
            Ok(user)
        })?;

        info!(user = %user.id, account = %user.account_number, "user registered");
        Ok(UserProfile::from(&user))
    }

    /// Unknown email and wrong password are indistinguishable to the caller.
    pub fn login(&self, command: LoginCommand) -> BankResult<LoginOutcome> {
        let user = read(self.store.as_ref(), |view| {
            Ok(view.user_by_email(&command.email))
        })?;
        // unknown emails still pay for a full hash check
        let verified = self.credentials.verify(
            &command.password,
            user.as_ref().map(|user| user.password_hash.as_str()),
        );
        let Some(user) = user.filter(|_| verified) else {
            warn!("login rejected");
            return Err(BankError::InvalidCredentials);
        };

        let token = self.issuer.issue(user.id, user.role)?;
        info!(user = %user.id, "user logged in");
        Ok(LoginOutcome {
            token,
            user: UserSummary {
                id: user.id,
                first_name: user.first_name,
                last_name: user.last_name,
                email: user.email,
                account_number: user.account_number,
                role: user.role,
            },
        })
    }

    pub fn profile(&self, user_id: UserId) -> BankResult<UserProfile> {
        read(self.store.as_ref(), |view| {
            view.user(user_id)
                .map(|user| UserProfile::from(&user))
                .ok_or_else(|| BankError::not_found("User"))
        })
    }

    pub fn update_profile(
        &self,
        user_id: UserId,
        update: ProfileUpdate,
    ) -> BankResult<UserProfile> {
        let update = update.normalized();
        with_transaction(self.store.as_ref(), |tx| {
            let mut user = tx
                .user(user_id)
                .ok_or_else(|| BankError::not_found("User"))?;
            if let Some(first_name) = update.first_name {
                user.first_name = first_name;
            }
            if let Some(last_name) = update.last_name {
                user.last_name = last_name;
            }
            if let Some(phone_number) = update.phone_number {
                user.phone_number = Some(phone_number);
            }
            if let Some(address) = update.address {
                user.address = Some(address);
            }
            tx.update_user(user.clone())?;
            Ok(UserProfile::from(&user))
        })
    }

    pub fn change_password(
        &self,
        user_id: UserId,
        command: PasswordChangeCommand,
    ) -> BankResult<()> {
        let user = self.existing_user(user_id)?;
        if !self
            .credentials
            .verify(&command.current_password, Some(&user.password_hash))
        {
            warn!(user = %user_id, "password change rejected: wrong current password");
            return Err(BankError::business("Current password is incorrect"));
        }
        let password_hash = self.credentials.prepare(&command.new_password)?;
        self.update_secret(user_id, |user| user.password_hash = password_hash)?;
        info!(user = %user_id, "password updated");
        Ok(())
    }

    /// Creates or replaces the transfer PIN.
    pub fn set_pin(&self, user_id: UserId, command: PinCommand) -> BankResult<()> {
        self.existing_user(user_id)?;
        let pin_hash = self.credentials.prepare(&command.pin)?;
        self.update_secret(user_id, |user| user.pin_hash = Some(pin_hash))?;
        info!(user = %user_id, "PIN updated");
        Ok(())
    }

    /// Every user with its account balance and status. Users without an
    /// account report a zero balance and an inactive status.
    pub fn list_with_balances(&self, caller: &Claims) -> BankResult<Vec<UserOverview>> {
        self.authorizer.require(caller, Capability::ListUsers)?;
        read(self.store.as_ref(), |view| {
            Ok(view
                .users()
                .iter()
                .map(|user| {
                    let account = view.account_of(user.id);
                    UserOverview {
                        profile: UserProfile::from(user),
                        balance: account
                            .as_ref()
                            .map_or(Decimal::ZERO, |account| account.balance()),
                        status: account
                            .as_ref()
                            .map_or(AccountStatus::Inactive, |account| account.status()),
                    }
                })
                .collect())
        })
    }

    fn existing_user(&self, user_id: UserId) -> BankResult<User> {
        read(self.store.as_ref(), |view| {
            view.user(user_id)
                .ok_or_else(|| BankError::not_found("User"))
        })
    }

    fn update_secret(&self, user_id: UserId, change: impl FnOnce(&mut User)) -> BankResult<()> {
        with_transaction(self.store.as_ref(), |tx| {
            let mut user = tx
                .user(user_id)
                .ok_or_else(|| BankError::not_found("User"))?;
            change(&mut user);
            tx.update_user(user)?;
            Ok(())
        })
    }
}

fn unused_account_number(tx: &dyn LedgerTx) -> BankResult<AccountNumber> {
    let mut rng = rand::thread_rng();
    (0..ACCOUNT_NUMBER_ATTEMPTS)
        .map(|_| AccountNumber::generate(&mut rng))
        .find(|number| tx.account_by_number(number).is_none())
        .ok_or_else(|| BankError::internal("could not allocate a free account number"))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::{
        command::{LoginInput, PasswordChangeInput, RegistrationInput},
        service::fixtures::{PASSWORD, TestBank, dec},
        session::{JwtIssuer, SessionTokenIssuer},
        store::in_memory::InMemoryLedgerStore,
    };

    use super::*;

    fn registration(email: &str) -> RegisterCommand {
        RegisterCommand::parse(RegistrationInput {
            first_name: Some("Ada".to_owned()),
            last_name: Some("Lovelace".to_owned()),
            email: Some(email.to_owned()),
            password: Some(PASSWORD.to_owned()),
            phone_number: Some(" 555-0100 ".to_owned()),
            address: None,
        })
        .unwrap()
    }

    fn login(email: &str, password: &str) -> LoginCommand {
        LoginCommand::parse(LoginInput {
            email: Some(email.to_owned()),
            password: Some(password.to_owned()),
        })
        .unwrap()
    }

    #[test]
    fn registration_creates_user_and_account() {
        let bank = TestBank::new();
        let profile = bank.users.register(registration("ada@example.com")).unwrap();
        assert_eq!(profile.account_number.as_str().len(), 10);
        assert_eq!(profile.phone_number.as_deref(), Some("555-0100"));
        assert_eq!(profile.role, Role::User);
        assert!(!profile.has_pin);
        assert_eq!(bank.accounts.balance(profile.id).unwrap(), dec("1000"));

        let stored = bank.user(profile.id);
        assert_ne!(stored.password_hash, PASSWORD);
    }

    #[test]
    fn duplicate_email_creates_nothing() {
        let bank = TestBank::new();
        bank.users.register(registration("ada@example.com")).unwrap();

        let err = bank
            .users
            .register(registration("ADA@example.com"))
            .unwrap_err();
        assert_eq!(err.to_string(), "User already exists");

        let (users, accounts) = read(bank.store.as_ref(), |view| {
            let users = view.users();
            let accounts = users
                .iter()
                .filter(|user| view.account_of(user.id).is_some())
                .count();
            Ok((users.len(), accounts))
        })
        .unwrap();
        assert_eq!((users, accounts), (1, 1));
    }

    #[test]
    fn login_does_not_reveal_which_part_was_wrong() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");

        let unknown = bank
            .users
            .login(login("nobody@example.com", PASSWORD))
            .unwrap_err();
        let wrong = bank
            .users
            .login(login("ada@example.com", "wrong password"))
            .unwrap_err();
        assert_eq!(unknown.to_string(), "Invalid credentials");
        assert_eq!(wrong.to_string(), unknown.to_string());

        let outcome = bank
            .users
            .login(login("ada@example.com", PASSWORD))
            .unwrap();
        assert_eq!(outcome.user.id, ada.id);
        assert_eq!(outcome.user.account_number, ada.account_number);
    }

    #[derive(Default)]
    struct CountingVerifier {
        checks: AtomicUsize,
    }

    impl CredentialVerifier for CountingVerifier {
        fn prepare(&self, secret: &str) -> Result<String, BankError> {
            Ok(format!("hashed:{secret}"))
        }

        fn verify(&self, secret: &str, hash: Option<&str>) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst);
            hash == Some(format!("hashed:{secret}").as_str())
        }
    }

    #[test]
    fn unknown_email_still_runs_a_credential_check() {
        let verifier = Arc::new(CountingVerifier::default());
        let users = UserService::new(
            Arc::new(InMemoryLedgerStore::new()),
            verifier.clone(),
            Arc::new(JwtIssuer::new("test-secret", chrono::Duration::hours(1))),
            dec("1000"),
        );
        users.register(registration("ada@example.com")).unwrap();

        let err = users
            .login(login("nobody@example.com", PASSWORD))
            .unwrap_err();
        assert!(matches!(err, BankError::InvalidCredentials));
        assert_eq!(verifier.checks.load(Ordering::SeqCst), 1);

        users.login(login("ada@example.com", PASSWORD)).unwrap();
        assert_eq!(verifier.checks.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn login_token_carries_role() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");
        bank.promote(&ada);
        let outcome = bank
            .users
            .login(login("ada@example.com", PASSWORD))
            .unwrap();
        let issuer = JwtIssuer::new("test-secret", chrono::Duration::hours(1));
        let claims = issuer.verify(&outcome.token).unwrap();
        assert_eq!(claims.sub, ada.id);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn password_change_requires_current_password() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");
        let change = |current: &str| {
            PasswordChangeCommand::parse(PasswordChangeInput {
                current_password: Some(current.to_owned()),
                new_password: Some("battery staple".to_owned()),
            })
            .unwrap()
        };

        let err = bank
            .users
            .change_password(ada.id, change("not my password"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Current password is incorrect");

        bank.users.change_password(ada.id, change(PASSWORD)).unwrap();
        assert!(
            bank.users
                .login(login("ada@example.com", PASSWORD))
                .is_err()
        );
        assert!(
            bank.users
                .login(login("ada@example.com", "battery staple"))
                .is_ok()
        );
    }

    #[test]
    fn profile_update_skips_blank_fields() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");

        let profile = bank
            .users
            .update_profile(
                ada.id,
                ProfileUpdate {
                    first_name: Some("  ".to_owned()),
                    last_name: Some("King".to_owned()),
                    phone_number: None,
                    address: Some("12 St James's Square".to_owned()),
                },
            )
            .unwrap();
        assert_eq!(profile.first_name, "Ada");
        assert_eq!(profile.last_name, "King");
        assert_eq!(profile.address.as_deref(), Some("12 St James's Square"));
        assert_eq!(profile.account_number, ada.account_number);
    }

    #[test]
    fn pin_is_stored_hashed() {
        let bank = TestBank::new();
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");
        bank.set_pin(&ada, "1234");

        let stored = bank.user(ada.id);
        let pin_hash = stored.pin_hash.unwrap();
        assert_ne!(pin_hash, "1234");
        assert!(bank.users.profile(ada.id).unwrap().has_pin);
    }

    #[test]
    fn admin_listing_includes_balances() {
        let bank = TestBank::new();
        let root = bank.register("Root", "Admin", "root@example.com");
        let ada = bank.register("Ada", "Lovelace", "ada@example.com");

        let err = bank
            .users
            .list_with_balances(&bank.claims(&ada))
            .unwrap_err();
        assert!(matches!(err, BankError::Forbidden));

        let admin = bank.promote(&root);
        let listing = bank.users.list_with_balances(&admin).unwrap();
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().all(|row| row.balance == dec("1000")
            && row.status == AccountStatus::Active));

        let row = serde_json::to_value(&listing[0]).unwrap();
        assert!(row.get("passwordHash").is_none());
        assert_eq!(row["balance"], 1000.0);
        assert_eq!(row["status"], "active");
    }
}
