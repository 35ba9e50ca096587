//! User account command handlers

use std::io::{self, BufRead, Write};

use crate::config::Config;
use crate::db::Store;
use crate::models::UserRole;
use crate::security;
use crate::services::{AuthService, SeaOrmAuthService};

fn prompt_password() -> anyhow::Result<String> {
    print!("Password: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub async fn cmd_create_user(
    config: &Config,
    username: &str,
    email: &str,
    password: Option<&str>,
    admin: bool,
) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => prompt_password()?,
    };

    let store = Store::new(&config.general.database_path).await?;
    let min_password_length =
        usize::try_from(config.account_manager.min_password_length).unwrap_or(usize::MAX);
    let auth = SeaOrmAuthService::new(store, config.security.clone(), min_password_length);

    let role = if admin { UserRole::Admin } else { UserRole::User };
    let user = auth.create_user(username, email, &password, role).await?;

    println!("✓ Created user '{}' (ID: {}, role: {})", user.username, user.id, role.as_str());
    println!(
        "  BOINC clients log in with the protocol hash {}",
        security::hash_protocol_password(username, &password)
    );

    Ok(())
}

pub async fn cmd_set_active(config: &Config, username: &str, active: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    store.user_repo().set_active(username, active).await?;

    let state = if active { "enabled" } else { "disabled" };
    println!("✓ Account '{username}' {state}");

    Ok(())
}

pub fn cmd_protocol_hash(username: &str, password: &str) {
    println!("{}", security::hash_protocol_password(username, password));
}
