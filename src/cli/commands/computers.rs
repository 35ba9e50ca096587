//! Computer and attachment command handlers

use rust_decimal::Decimal;

use crate::config::Config;
use crate::db::{NewAttachment, Store};
use crate::security::AccountKeyCipher;

pub async fn cmd_set_key(
    config: &Config,
    username: &str,
    project_id: i32,
    account_key: &str,
) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let user = store
        .user_repo()
        .get_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;
    let project = store
        .project_repo()
        .get(project_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Project not found: {project_id}"))?;

    let cipher = AccountKeyCipher::from_config(&config.security);
    store
        .project_key_repo()
        .upsert(user.id, project.id, account_key.trim(), &cipher)
        .await?;

    println!("✓ Stored account key for '{}' on {}", user.username, project.name);

    Ok(())
}

pub async fn cmd_computers(config: &Config, username: &str) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let user = store
        .user_repo()
        .get_by_username(username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;
    let computers = store.computer_repo().list_for_user(user.id).await?;

    if computers.is_empty() {
        println!("No computers have contacted the manager for '{username}' yet.");
        return Ok(());
    }

    println!("Computers of {} ({} total)", user.username, computers.len());
    println!("{:-<70}", "");

    for computer in computers {
        println!("[{}] {} ({})", computer.id, computer.hostname, computer.cpid);
        println!(
            "  UUID: {} | Last seen: {}",
            computer.uuid,
            computer.last_seen_at.as_deref().unwrap_or("never")
        );

        let attachments = store.attachment_repo().list_for_computer(computer.id).await?;
        for attachment in attachments {
            let suffix = if attachment.detach_when_done {
                " (detaching)"
            } else {
                ""
            };
            println!(
                "  → project {} share {}{}",
                attachment.project_id, attachment.resource_share, suffix
            );
        }
    }

    Ok(())
}

pub async fn cmd_attach(
    config: &Config,
    computer_id: i32,
    project_id: i32,
    resource_share: Decimal,
    detach_when_done: bool,
) -> anyhow::Result<()> {
    if resource_share < Decimal::ZERO {
        anyhow::bail!("Resource share must not be negative");
    }

    let store = Store::new(&config.general.database_path).await?;

    if store.computer_repo().get(computer_id).await?.is_none() {
        anyhow::bail!("Computer not found: {computer_id}");
    }
    if store.project_repo().get(project_id).await?.is_none() {
        anyhow::bail!("Project not found: {project_id}");
    }

    let attachment = store
        .attachment_repo()
        .create(NewAttachment {
            resource_share,
            detach_when_done,
            ..NewAttachment::new(computer_id, project_id)
        })
        .await?;

    println!(
        "✓ Computer {computer_id} attached to project {project_id} (attachment {})",
        attachment.id
    );

    Ok(())
}

pub async fn cmd_detach(config: &Config, computer_id: i32, project_id: i32) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;

    let attachment = store
        .attachment_repo()
        .list_for_computer(computer_id)
        .await?
        .into_iter()
        .find(|a| a.project_id == project_id)
        .ok_or_else(|| {
            anyhow::anyhow!("Computer {computer_id} is not attached to project {project_id}")
        })?;

    store
        .attachment_repo()
        .set_detach_when_done(attachment.id, true)
        .await?;

    println!("✓ Computer {computer_id} will detach from project {project_id} once its work is done");

    Ok(())
}
