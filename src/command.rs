use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::ledger::{AccountNumber, UserId};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const PIN_LENGTH: usize = 4;
pub const DEFAULT_TRANSFER_DESCRIPTION: &str = "Transfer";
pub const DEFAULT_ADJUSTMENT_DESCRIPTION: &str = "Admin deposit";
/// Amounts are whole cents.
pub const MONEY_SCALE: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Amount must be a positive number")]
    NonPositiveAmount,
    #[error("Recipient account number is required")]
    RecipientRequired,
    #[error("PIN is required")]
    PinRequired,
    #[error("PIN must be 4 digits")]
    MalformedPin,
    #[error("User ID is required")]
    UserIdRequired,
    #[error("User ID is invalid")]
    MalformedUserId,
    #[error("First name is required")]
    FirstNameRequired,
    #[error("Last name is required")]
    LastNameRequired,
    #[error("Please include a valid email")]
    InvalidEmail,
    #[error("Password is required")]
    PasswordRequired,
    #[error("Password must be at least 8 characters")]
    ShortPassword,
    #[error("Current password is required")]
    CurrentPasswordRequired,
    #[error("New password must be at least 8 characters")]
    ShortNewPassword,
}

/// Strictly positive amount of money, at least one cent, in whole cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositiveAmount(Decimal);

impl PositiveAmount {
    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for PositiveAmount {
    type Error = CommandError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        if value > Decimal::ZERO && value.normalize().scale() <= MONEY_SCALE {
            Ok(Self(value))
        } else {
            Err(CommandError::NonPositiveAmount)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceAction {
    Credit,
    Debit,
}

/// Request to move an account balance; turned into an event by the account.
#[derive(Debug, Clone, Copy)]
pub struct BalanceCommand {
    action: BalanceAction,
    amount: PositiveAmount,
}

impl BalanceCommand {
    pub fn new(action: BalanceAction, amount: PositiveAmount) -> Self {
        Self { action, amount }
    }

    /// Signed delta to command. A zero delta carries no command.
    pub fn from_delta(delta: Decimal) -> Option<Self> {
        if delta > Decimal::ZERO {
            Some(Self::new(BalanceAction::Credit, PositiveAmount(delta)))
        } else if delta < Decimal::ZERO {
            Some(Self::new(BalanceAction::Debit, PositiveAmount(-delta)))
        } else {
            None
        }
    }

    pub fn action(&self) -> BalanceAction {
        self.action
    }

    pub fn amount(&self) -> Decimal {
        self.amount.value()
    }
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_amount(amount: Option<Decimal>) -> Result<PositiveAmount, CommandError> {
    amount
        .ok_or(CommandError::NonPositiveAmount)
        .and_then(PositiveAmount::try_from)
}

fn description_or(description: Option<String>, default: &str) -> String {
    required(description).unwrap_or_else(|| default.to_owned())
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferInput {
    pub recipient_account: Option<String>,
    pub amount: Option<Decimal>,
    pub pin: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransferCommand {
    pub sender: UserId,
    pub recipient_account: AccountNumber,
    pub amount: PositiveAmount,
    pub pin: String,
    pub description: String,
}

impl TransferCommand {
    /// Amount is checked first so nothing is looked up for a bad amount.
    pub fn parse(sender: UserId, input: TransferInput) -> Result<Self, CommandError> {
        let amount = parse_amount(input.amount)?;
        let recipient_account = required(input.recipient_account)
            .ok_or(CommandError::RecipientRequired)?;
        let pin = input
            .pin
            .filter(|pin| !pin.is_empty())
            .ok_or(CommandError::PinRequired)?;
        Ok(Self {
            sender,
            recipient_account: AccountNumber::from(recipient_account.as_str()),
            amount,
            pin,
            description: description_or(input.description, DEFAULT_TRANSFER_DESCRIPTION),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentInput {
    pub user_id: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AdjustmentCommand {
    pub target: UserId,
    pub amount: PositiveAmount,
    pub description: String,
}

impl AdjustmentCommand {
    pub fn parse(input: AdjustmentInput) -> Result<Self, CommandError> {
        let user_id = required(input.user_id).ok_or(CommandError::UserIdRequired)?;
        let amount = parse_amount(input.amount)?;
        let target = Uuid::parse_str(&user_id).map_err(|_| CommandError::MalformedUserId)?;
        Ok(Self {
            target,
            amount,
            description: description_or(input.description, DEFAULT_ADJUSTMENT_DESCRIPTION),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationInput {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegisterCommand {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

fn normalize_email(email: Option<String>) -> Result<String, CommandError> {
    let email = required(email)
        .map(|email| email.to_lowercase())
        .ok_or(CommandError::InvalidEmail)?;
    if email.validate_email() {
        Ok(email)
    } else {
        Err(CommandError::InvalidEmail)
    }
}

fn long_enough(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

impl RegisterCommand {
    pub fn parse(input: RegistrationInput) -> Result<Self, CommandError> {
        let first_name = required(input.first_name).ok_or(CommandError::FirstNameRequired)?;
        let last_name = required(input.last_name).ok_or(CommandError::LastNameRequired)?;
        let email = normalize_email(input.email)?;
        let password = input
            .password
            .filter(|p| long_enough(p))
            .ok_or(CommandError::ShortPassword)?;
        Ok(Self {
            first_name,
            last_name,
            email,
            password,
            phone_number: required(input.phone_number),
            address: required(input.address),
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

impl LoginCommand {
    pub fn parse(input: LoginInput) -> Result<Self, CommandError> {
        let email = normalize_email(input.email)?;
        let password = input.password.ok_or(CommandError::PasswordRequired)?;
        Ok(Self { email, password })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeInput {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PasswordChangeCommand {
    pub current_password: String,
    pub new_password: String,
}

impl PasswordChangeCommand {
    pub fn parse(input: PasswordChangeInput) -> Result<Self, CommandError> {
        let current_password = input
            .current_password
            .ok_or(CommandError::CurrentPasswordRequired)?;
        let new_password = input
            .new_password
            .filter(|p| long_enough(p))
            .ok_or(CommandError::ShortNewPassword)?;
        Ok(Self {
            current_password,
            new_password,
        })
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PinInput {
    pub pin: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PinCommand {
    pub pin: String,
}

impl PinCommand {
    pub fn parse(input: PinInput) -> Result<Self, CommandError> {
        match input.pin {
            Some(pin) if pin.len() == PIN_LENGTH && pin.bytes().all(|b| b.is_ascii_digit()) => {
                Ok(Self { pin })
            }
            _ => Err(CommandError::MalformedPin),
        }
    }
}

/// Profile fields to overwrite. Missing or blank fields are left untouched.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

impl ProfileUpdate {
    pub fn normalized(self) -> Self {
        Self {
            first_name: required(self.first_name),
            last_name: required(self.last_name),
            phone_number: required(self.phone_number),
            address: required(self.address),
        }
    }
}
