//! Authentication middleware and extractors

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::api::SharedState;
use crate::auth::models::Authenticated;
use crate::auth::service::AccountService;
use crate::error::{Error, Rejection, Result};

/// Pull the raw token out of the Authorization header.
///
/// A header without the `Bearer ` prefix is taken whole; it will then fail
/// signature verification like any other garbage.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    if token.is_empty() {
        return None;
    }
    Some(token)
}

/// Authenticate a request from its headers.
///
/// Fails closed: a missing header, any validator rejection and storage
/// errors all end up as `Error::Unauthorized`.
pub async fn authenticate(accounts: &AccountService, headers: &HeaderMap) -> Result<Authenticated> {
    let Some(token) = extract_bearer_token(headers) else {
        tracing::debug!("Rejected request: {}", Rejection::MissingToken);
        return Err(Error::Unauthorized(Rejection::MissingToken));
    };

    accounts.validate(token).await.map_err(|rejection| {
        tracing::debug!("Rejected request: {}", rejection);
        Error::Unauthorized(rejection)
    })
}

/// Middleware for requiring authentication.
///
/// On success the [`Authenticated`] user and token are placed in the request
/// extensions for handlers to pick up.
pub async fn require_auth(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> std::result::Result<Response, Error> {
    let authenticated = authenticate(&state.accounts, req.headers()).await?;
    req.extensions_mut().insert(authenticated);
    Ok(next.run(req).await)
}
