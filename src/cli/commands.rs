//! CLI command implementations

use anyhow::Result;
use std::fs;
use std::path::Path;

use crate::api::AppState;
use crate::cli::{info, print_prune_table, print_user_table, success, warn, OutputFormat, UserSummary};
use crate::config::{self, loader::CONFIG_FILENAME, Config};

/// Write a default taskd.toml configuration file
pub async fn init() -> Result<()> {
    let config_path = Path::new(CONFIG_FILENAME);

    if config_path.exists() {
        warn(&format!("{} already exists", CONFIG_FILENAME));
        return Ok(());
    }

    fs::write(config_path, config::loader::default_config_content())?;

    success(&format!("Created {}", CONFIG_FILENAME));
    info("Export JWT_SECRET (32+ random bytes) and run 'taskd serve'");

    Ok(())
}

/// Start the HTTP API server
pub async fn serve(config_path: Option<&Path>, host: Option<String>, port: Option<u16>) -> Result<()> {
    let config = load_config(config_path)?;
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info(&format!("Starting server at http://{}:{}", host, port));

    crate::api::run_server(config, &host, port).await?;
    Ok(())
}

/// Remove expired tokens from every user
pub async fn prune(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let state = AppState::from_config(config).await?;

    let reports = state.accounts.prune_all().await?;
    print_prune_table(&reports);

    let removed: usize = reports.iter().map(|r| r.removed).sum();
    success(&format!(
        "Pruned {} expired token(s) across {} user(s)",
        removed,
        reports.len()
    ));
    Ok(())
}

/// List users and their sessions
pub async fn users(config_path: Option<&Path>, format: OutputFormat) -> Result<()> {
    let config = load_config(config_path)?;
    let state = AppState::from_config(config).await?;

    let now = chrono::Utc::now();
    let summaries: Vec<UserSummary> = state
        .accounts
        .store()
        .list()
        .await?
        .iter()
        .map(|user| UserSummary::from_user(user, now))
        .collect();

    match format {
        OutputFormat::Table => print_user_table(&summaries),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summaries)?),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Ok(config::load_config(path)?)
}
