//! taskd - task manager backend
//!
//! The library holds the account and bearer-token session core, the
//! document stores it runs on, and the HTTP API and CLI around them.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod store;

pub use auth::{AccountService, User};
pub use config::Config;
pub use error::Error;
