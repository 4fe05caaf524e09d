use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::{error::BankError, session::Claims};

use super::{AppState, error::ApiError};

/// Claims of the caller, taken from a valid `Authorization: Bearer` token.
#[derive(Debug, Clone)]
pub struct Session(pub Claims);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            BankError::Unauthenticated("No token, authorization denied".to_owned())
        })?;
        Ok(Session(state.issuer.verify(token)?))
    }
}
