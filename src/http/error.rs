use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::{command::CommandError, error::BankError};

/// Error surfaced to HTTP clients as `{"message": ...}`.
#[derive(Debug)]
pub struct ApiError(BankError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            BankError::Validation(_)
            | BankError::InvalidCredentials
            | BankError::InsufficientFunds { .. }
            | BankError::InvalidPin
            | BankError::BusinessRule(_) => StatusCode::BAD_REQUEST,
            BankError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            BankError::Forbidden => StatusCode::FORBIDDEN,
            BankError::NotFound(_) => StatusCode::NOT_FOUND,
            BankError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<BankError> for ApiError {
    fn from(err: BankError) -> Self {
        Self(err)
    }
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        Self(err.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(BankError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self.0 {
            BankError::Internal(detail) => {
                error!(%detail, "request failed");
                "Server error".to_owned()
            }
            other => other.to_string(),
        };
        (status, Json(serde_json::json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use rust_decimal::Decimal;

    use super::*;

    async fn render(err: BankError) -> (StatusCode, serde_json::Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn errors_map_to_status_and_message() {
        let cases = [
            (
                BankError::from(CommandError::NonPositiveAmount),
                StatusCode::BAD_REQUEST,
                "Amount must be a positive number",
            ),
            (
                BankError::InsufficientFunds {
                    requested: Decimal::TEN,
                    available: Decimal::ONE,
                },
                StatusCode::BAD_REQUEST,
                "Insufficient funds",
            ),
            (BankError::InvalidPin, StatusCode::BAD_REQUEST, "Invalid PIN"),
            (
                BankError::InvalidCredentials,
                StatusCode::BAD_REQUEST,
                "Invalid credentials",
            ),
            (
                BankError::Unauthenticated("Token is not valid".to_owned()),
                StatusCode::UNAUTHORIZED,
                "Token is not valid",
            ),
            (
                BankError::Forbidden,
                StatusCode::FORBIDDEN,
                "Access denied. Admin privileges required.",
            ),
            (
                BankError::not_found("Recipient account"),
                StatusCode::NOT_FOUND,
                "Recipient account not found",
            ),
        ];
        for (err, status, message) in cases {
            assert_eq!(render(err).await, (status, serde_json::json!({ "message": message })));
        }
    }

    #[tokio::test]
    async fn internal_detail_is_withheld() {
        let (status, body) = render(BankError::internal("lock poisoned at ledger.rs:42")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, serde_json::json!({ "message": "Server error" }));
    }
}
