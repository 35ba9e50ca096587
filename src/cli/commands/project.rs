//! Project catalogue command handlers

use crate::config::Config;
use crate::db::{NewProject, Store};

pub async fn cmd_project_add(
    config: &Config,
    name: &str,
    url: &str,
    signed_url: &str,
    description: &str,
) -> anyhow::Result<()> {
    url::Url::parse(url).map_err(|e| anyhow::anyhow!("Invalid project URL '{url}': {e}"))?;

    let store = Store::new(&config.general.database_path).await?;
    let project = store
        .project_repo()
        .create(NewProject {
            name,
            url,
            signed_url,
            description,
            enabled: true,
        })
        .await?;

    println!("✓ Added project '{}' (ID: {})", project.name, project.id);

    Ok(())
}

pub async fn cmd_project_list(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let projects = store.project_repo().list().await?;

    if projects.is_empty() {
        println!("No projects configured.");
        println!();
        println!("Add one with: acctmgr project add <name> <url> <signed_url>");
        return Ok(());
    }

    println!("Projects ({} total)", projects.len());
    println!("{:-<70}", "");

    for project in projects {
        let marker = if project.enabled { "•" } else { "✗" };
        println!("{} [{}] {} - {}", marker, project.id, project.name, project.url);
    }

    Ok(())
}

pub async fn cmd_project_set_enabled(config: &Config, id: i32, enabled: bool) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    store.project_repo().set_enabled(id, enabled).await?;

    if enabled {
        println!("✓ Project {id} enabled");
    } else {
        println!("✓ Project {id} disabled; computers will detach on their next contact");
    }

    Ok(())
}
