use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    command::{
        AdjustmentCommand, AdjustmentInput, LoginCommand, LoginInput, PasswordChangeCommand,
        PasswordChangeInput, PinCommand, PinInput, ProfileUpdate, RegisterCommand,
        RegistrationInput, TransferCommand, TransferInput,
    },
    config::BankConfig,
    credentials::CredentialVerifier,
    error::{BankError, BankResult},
    ledger::Transaction,
    service::{
        AdjustmentReceipt, Bank, LoginOutcome, TransferReceipt, UserOverview, UserProfile,
    },
    session::{Authorizer, Capability, JwtIssuer, SessionTokenIssuer},
    store::LedgerStore,
};

pub mod error;
pub mod session;

use error::ApiError;
use session::Session;

#[derive(Clone)]
pub struct AppState {
    pub bank: Arc<Bank>,
    pub issuer: Arc<dyn SessionTokenIssuer>,
}

impl AppState {
    pub fn new(
        config: &BankConfig,
        store: Arc<dyn LedgerStore>,
        credentials: Arc<dyn CredentialVerifier>,
    ) -> Self {
        let issuer: Arc<dyn SessionTokenIssuer> =
            Arc::new(JwtIssuer::new(&config.jwt_secret, config.token_ttl));
        let bank = Bank::new(store, credentials, issuer.clone(), config);
        Self {
            bank: Arc::new(bank),
            issuer,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/users/me", get(me))
        .route("/users/profile", put(update_profile))
        .route("/users/password", put(change_password))
        .route("/users/create-pin", post(create_pin))
        .route("/accounts/balance", get(balance))
        .route("/transactions", get(transactions))
        .route("/transactions/transfer", post(transfer))
        .route("/admin/users", get(list_users))
        .route("/admin/add-balance", post(add_balance))
        .with_state(state)
}

/// Runs a service call on the blocking pool. Credential hashing and store
/// locks must not stall the async workers.
async fn run<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Bank) -> BankResult<T> + Send + 'static,
{
    let bank = state.bank.clone();
    tokio::task::spawn_blocking(move || work(&bank))
        .await
        .map_err(|err| BankError::internal(format!("service task failed: {err}")))?
        .map_err(ApiError::from)
}

#[derive(Debug, Serialize)]
struct Message {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

#[derive(Debug, Serialize)]
struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    balance: Decimal,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "green-bank",
    })
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegistrationInput>, JsonRejection>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let Json(input) = payload?;
    let command = RegisterCommand::parse(input)?;
    run(&state, move |bank| bank.users.register(command)).await?;
    Ok((
        StatusCode::CREATED,
        Json(Message {
            message: "User registered successfully",
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginInput>, JsonRejection>,
) -> Result<Json<LoginOutcome>, ApiError> {
    let Json(input) = payload?;
    let command = LoginCommand::parse(input)?;
    run(&state, move |bank| bank.users.login(command))
        .await
        .map(Json)
}

async fn me(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<UserProfile>, ApiError> {
    run(&state, move |bank| bank.users.profile(claims.sub))
        .await
        .map(Json)
}

async fn update_profile(
    State(state): State<AppState>,
    Session(claims): Session,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Json(update) = payload?;
    run(&state, move |bank| bank.users.update_profile(claims.sub, update))
        .await
        .map(Json)
}

async fn change_password(
    State(state): State<AppState>,
    Session(claims): Session,
    payload: Result<Json<PasswordChangeInput>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Json(input) = payload?;
    let command = PasswordChangeCommand::parse(input)?;
    run(&state, move |bank| bank.users.change_password(claims.sub, command)).await?;
    Ok(Json(Message {
        message: "Password updated successfully",
    }))
}

async fn create_pin(
    State(state): State<AppState>,
    Session(claims): Session,
    payload: Result<Json<PinInput>, JsonRejection>,
) -> Result<Json<Message>, ApiError> {
    let Json(input) = payload?;
    let command = PinCommand::parse(input)?;
    run(&state, move |bank| bank.users.set_pin(claims.sub, command)).await?;
    Ok(Json(Message {
        message: "PIN created successfully",
    }))
}

async fn balance(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = run(&state, move |bank| bank.accounts.balance(claims.sub)).await?;
    Ok(Json(BalanceResponse { balance }))
}

async fn transactions(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    run(&state, move |bank| bank.accounts.transactions(claims.sub))
        .await
        .map(Json)
}

async fn transfer(
    State(state): State<AppState>,
    Session(claims): Session,
    payload: Result<Json<TransferInput>, JsonRejection>,
) -> Result<Json<TransferReceipt>, ApiError> {
    let Json(input) = payload?;
    let command = TransferCommand::parse(claims.sub, input)?;
    run(&state, move |bank| bank.transfers.transfer(command))
        .await
        .map(Json)
}

async fn list_users(
    State(state): State<AppState>,
    Session(claims): Session,
) -> Result<Json<Vec<UserOverview>>, ApiError> {
    run(&state, move |bank| bank.users.list_with_balances(&claims))
        .await
        .map(Json)
}

async fn add_balance(
    State(state): State<AppState>,
    Session(claims): Session,
    payload: Result<Json<AdjustmentInput>, JsonRejection>,
) -> Result<Json<AdjustmentReceipt>, ApiError> {
    // role before body
    Authorizer.require(&claims, Capability::AdjustBalances)?;
    let Json(input) = payload?;
    let command = AdjustmentCommand::parse(input)?;
    run(&state, move |bank| bank.admin.credit_account(&claims, command))
        .await
        .map(Json)
}
