//! API route handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use super::server::SharedState;
use crate::auth::models::{
    AuthResponse, Authenticated, EmailUpdate, LoginRequest, PublicUser, RegisterRequest,
    TokenResponse, UserUpdate,
};
use crate::error::Error;

/// Body of every failed authentication, whatever the actual reason
pub const AUTH_FAILED_MESSAGE: &str = "Please authenticate.";

/// Body of every failed login, whichever of identity or password was wrong
pub const LOGIN_FAILED_MESSAGE: &str = "Unable to login";

/// Body of a profile update naming fields outside the allow-list
pub const INVALID_UPDATES_MESSAGE: &str = "Invalid updates!";

// Request/Response types

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, AUTH_FAILED_MESSAGE.to_string()),
            Error::InvalidCredentials => (StatusCode::BAD_REQUEST, LOGIN_FAILED_MESSAGE.to_string()),
            Error::DuplicateIdentity(_) => (StatusCode::CONFLICT, self.to_string()),
            Error::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            Error::UserNotFound(_) => (StatusCode::NOT_FOUND, "User not found".to_string()),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            _ if self.is_storage() => {
                tracing::error!("Storage failure while handling request: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            _ => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

fn bad_json(rejection: JsonRejection) -> Error {
    Error::Validation(rejection.body_text())
}

// Health check

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn user_index() -> &'static str {
    "User route is working"
}

// Sessions

pub async fn register(
    State(state): State<SharedState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(req) = payload.map_err(bad_json)?;
    let (user, token) = state.accounts.register(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.to_public_view(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, Error> {
    let Json(req) = payload.map_err(|_| Error::InvalidCredentials)?;
    let identity = req.identity().ok_or(Error::InvalidCredentials)?;
    let (user, token) = state.accounts.login(identity, &req.password).await?;
    Ok(Json(AuthResponse {
        user: user.to_public_view(),
        token,
    }))
}

pub async fn logout(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Json<MessageBody>, Error> {
    state.accounts.logout(&auth.user.id, &auth.token).await?;
    Ok(MessageBody::new("Logged out"))
}

pub async fn logout_all(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Json<MessageBody>, Error> {
    let removed = state.accounts.logout_all(&auth.user.id).await?;
    Ok(MessageBody::new(format!("Logged out of {} session(s)", removed)))
}

pub async fn refresh(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Json<TokenResponse>, Error> {
    let token = state.accounts.refresh(&auth.user.id, &auth.token).await?;
    Ok(Json(TokenResponse { token }))
}

// Profile

pub async fn me(Extension(auth): Extension<Authenticated>) -> Json<PublicUser> {
    Json(auth.user.to_public_view())
}

pub async fn update_me(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<Json<PublicUser>, Error> {
    let Json(update) =
        payload.map_err(|_| Error::Validation(INVALID_UPDATES_MESSAGE.to_string()))?;
    let user = state.accounts.update_profile(&auth.user.id, update).await?;
    Ok(Json(user.to_public_view()))
}

pub async fn delete_me(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
) -> Result<Json<PublicUser>, Error> {
    let user = state.accounts.delete(&auth.user.id).await?;
    Ok(Json(user.to_public_view()))
}

pub async fn update_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
    Path(id): Path<String>,
    payload: Result<Json<EmailUpdate>, JsonRejection>,
) -> Result<Json<PublicUser>, Error> {
    let Json(update) =
        payload.map_err(|_| Error::Validation(INVALID_UPDATES_MESSAGE.to_string()))?;
    let user = state
        .accounts
        .update_email(&auth.user.id, &id, &update.email)
        .await?;
    Ok(Json(user.to_public_view()))
}

pub async fn delete_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<Authenticated>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, Error> {
    state.accounts.delete_account(&auth.user.id, &id).await?;
    Ok(MessageBody::new("User deleted successfully"))
}
