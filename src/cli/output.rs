//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use serde::Serialize;

use crate::auth::{PruneReport, User};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// One row of the users listing
#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub active_tokens: usize,
    pub expired_tokens: usize,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserSummary {
    pub fn from_user(user: &User, now: chrono::DateTime<chrono::Utc>) -> Self {
        let expired = user.tokens.expired_count(now);
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            active_tokens: user.tokens.len() - expired,
            expired_tokens: expired,
            created_at: user.created_at,
        }
    }
}

/// Print a table of users
pub fn print_user_table(users: &[UserSummary]) {
    if users.is_empty() {
        info("No users registered yet");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("User").fg(Color::Cyan),
            Cell::new("Email").fg(Color::Cyan),
            Cell::new("Sessions").fg(Color::Cyan),
            Cell::new("Expired").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
        ]);

    for user in users {
        let expired_color = if user.expired_tokens > 0 {
            Color::Yellow
        } else {
            Color::Reset
        };
        table.add_row(vec![
            Cell::new(&user.username),
            Cell::new(&user.email),
            Cell::new(user.active_tokens),
            Cell::new(user.expired_tokens).fg(expired_color),
            Cell::new(user.created_at.format("%Y-%m-%d %H:%M").to_string()),
        ]);
    }

    println!("{table}");
}

/// Print what a prune run removed
pub fn print_prune_table(reports: &[PruneReport]) {
    let removed: usize = reports.iter().map(|r| r.removed).sum();
    if removed == 0 {
        info("No expired tokens found");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("User").fg(Color::Cyan),
            Cell::new("Removed").fg(Color::Cyan),
            Cell::new("Remaining").fg(Color::Cyan),
        ]);

    for report in reports.iter().filter(|r| r.removed > 0) {
        table.add_row(vec![
            Cell::new(&report.username),
            Cell::new(report.removed).fg(Color::Red),
            Cell::new(report.remaining).fg(Color::Green),
        ]);
    }

    println!("{table}");
}
