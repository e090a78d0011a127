//! HTTP API server

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_auth, AccountService};
use crate::config::Config;
use crate::error::Result;
use crate::store::{open_store, UserStore};

use super::routes;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub accounts: AccountService,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build state around an already opened store
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Result<SharedState> {
        let accounts = AccountService::new(store, &config.auth)?;
        Ok(Arc::new(Self { config, accounts }))
    }

    /// Open the configured store and build state from it
    pub async fn from_config(config: Config) -> Result<SharedState> {
        config.validate()?;
        let store = open_store(&config.storage).await?;
        Self::new(config, store)
    }
}

/// Run the HTTP API server
pub async fn run_server(config: Config, host: &str, port: u16) -> Result<()> {
    let state = AppState::from_config(config).await?;

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    serve(listener, state).await
}

/// Serve the API on an already bound listener
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<()> {
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}

/// Create the router with all routes
pub fn create_router(state: SharedState) -> Router {
    let protected = Router::new()
        .route("/user/logout", post(routes::logout))
        .route("/user/logoutAll", post(routes::logout_all))
        .route("/user/refresh", post(routes::refresh))
        .route(
            "/user/me",
            get(routes::me)
                .patch(routes::update_me)
                .delete(routes::delete_me),
        )
        .route(
            "/user/{id}",
            put(routes::update_user).delete(routes::delete_user),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(routes::health))
        .route("/user", get(routes::user_index))
        .route("/user/register", post(routes::register))
        .route("/user/login", post(routes::login))
        .merge(protected)
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
