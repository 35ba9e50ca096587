use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use crate::entities::projects;
use crate::models::Project;

impl From<projects::Model> for Project {
    fn from(model: projects::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            url: model.url,
            signed_url: model.signed_url,
            description: model.description,
            enabled: model.enabled,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub name: &'a str,
    pub url: &'a str,
    pub signed_url: &'a str,
    pub description: &'a str,
    pub enabled: bool,
}

pub struct ProjectRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProjectRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewProject<'_>) -> Result<Project> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = projects::ActiveModel {
            name: Set(new.name.to_string()),
            url: Set(new.url.to_string()),
            signed_url: Set(new.signed_url.to_string()),
            description: Set(new.description.to_string()),
            enabled: Set(new.enabled),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert project")?;

        Ok(Project::from(model))
    }

    pub async fn get(&self, id: i32) -> Result<Option<Project>> {
        let project = projects::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query project")?;

        Ok(project.map(Project::from))
    }

    pub async fn get_by_ids(&self, ids: &[i32]) -> Result<Vec<Project>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = projects::Entity::find()
            .filter(projects::Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(projects::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to query projects by ID")?;

        Ok(rows.into_iter().map(Project::from).collect())
    }

    pub async fn list(&self) -> Result<Vec<Project>> {
        let rows = projects::Entity::find()
            .order_by_asc(projects::Column::Name)
            .all(self.conn)
            .await
            .context("Failed to list projects")?;

        Ok(rows.into_iter().map(Project::from).collect())
    }

    pub async fn set_enabled(&self, id: i32, enabled: bool) -> Result<()> {
        let model = projects::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query project")?
            .ok_or_else(|| anyhow::anyhow!("Project not found: {id}"))?;

        let mut active: projects::ActiveModel = model.into();
        active.enabled = Set(enabled);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(self.conn).await?;

        Ok(())
    }
}
