use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set};

use tracing::warn;

use crate::entities::project_attachments;
use crate::models::ProjectAttachment;

impl TryFrom<project_attachments::Model> for ProjectAttachment {
    type Error = anyhow::Error;

    fn try_from(model: project_attachments::Model) -> Result<Self> {
        let resource_share = Decimal::from_str(&model.resource_share).with_context(|| {
            format!(
                "Attachment {} has an invalid resource_share '{}'",
                model.id, model.resource_share
            )
        })?;

        Ok(Self {
            id: model.id,
            computer_id: model.computer_id,
            project_id: model.project_id,
            resource_share,
            suspended: model.suspended,
            dont_request_more_work: model.dont_request_more_work,
            detach_when_done: model.detach_when_done,
            no_cpu: model.no_cpu,
            no_gpu_nvidia: model.no_gpu_nvidia,
            no_gpu_amd: model.no_gpu_amd,
            no_gpu_intel: model.no_gpu_intel,
        })
    }
}

/// Desired state for a new attachment. `new` gives the usual defaults.
#[derive(Debug, Clone)]
pub struct NewAttachment {
    pub computer_id: i32,
    pub project_id: i32,
    pub resource_share: Decimal,
    pub suspended: bool,
    pub dont_request_more_work: bool,
    pub detach_when_done: bool,
    pub no_cpu: bool,
    pub no_gpu_nvidia: bool,
    pub no_gpu_amd: bool,
    pub no_gpu_intel: bool,
}

impl NewAttachment {
    #[must_use]
    pub fn new(computer_id: i32, project_id: i32) -> Self {
        Self {
            computer_id,
            project_id,
            resource_share: Decimal::ONE_HUNDRED,
            suspended: false,
            dont_request_more_work: false,
            detach_when_done: false,
            no_cpu: false,
            no_gpu_nvidia: false,
            no_gpu_amd: false,
            no_gpu_intel: false,
        }
    }
}

pub struct AttachmentRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> AttachmentRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn create(&self, new: NewAttachment) -> Result<ProjectAttachment> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = project_attachments::ActiveModel {
            computer_id: Set(new.computer_id),
            project_id: Set(new.project_id),
            resource_share: Set(new.resource_share.normalize().to_string()),
            suspended: Set(new.suspended),
            dont_request_more_work: Set(new.dont_request_more_work),
            detach_when_done: Set(new.detach_when_done),
            no_cpu: Set(new.no_cpu),
            no_gpu_nvidia: Set(new.no_gpu_nvidia),
            no_gpu_amd: Set(new.no_gpu_amd),
            no_gpu_intel: Set(new.no_gpu_intel),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert project attachment")?;

        ProjectAttachment::try_from(model)
    }

    /// Attachments of one computer. Rows that fail to load are logged and
    /// left out.
    pub async fn list_for_computer(&self, computer_id: i32) -> Result<Vec<ProjectAttachment>> {
        let models = project_attachments::Entity::find()
            .filter(project_attachments::Column::ComputerId.eq(computer_id))
            .order_by_asc(project_attachments::Column::ProjectId)
            .all(self.conn)
            .await
            .context("Failed to list project attachments")?;

        // A corrupt row only costs its own project.
        Ok(models
            .into_iter()
            .filter_map(|model| match ProjectAttachment::try_from(model) {
                Ok(attachment) => Some(attachment),
                Err(e) => {
                    warn!(computer_id, error = %e, "Skipping unreadable project attachment");
                    None
                }
            })
            .collect())
    }

    pub async fn set_detach_when_done(&self, id: i32, detach_when_done: bool) -> Result<()> {
        let model = project_attachments::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query project attachment")?
            .ok_or_else(|| anyhow::anyhow!("Project attachment not found: {id}"))?;

        let mut active: project_attachments::ActiveModel = model.into();
        active.detach_when_done = Set(detach_when_done);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(self.conn).await?;

        Ok(())
    }

    pub async fn delete_by_ids(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = project_attachments::Entity::delete_many()
            .filter(project_attachments::Column::Id.is_in(ids.iter().copied()))
            .exec(self.conn)
            .await
            .context("Failed to delete project attachments")?;

        Ok(result.rows_affected)
    }
}
