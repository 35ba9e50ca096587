use anyhow::{Context, Result};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

use crate::entities::preference_groups;
use crate::models::PreferenceGroup;
use crate::protocol::PreferenceSettings;

impl TryFrom<preference_groups::Model> for PreferenceGroup {
    type Error = anyhow::Error;

    fn try_from(model: preference_groups::Model) -> Result<Self> {
        let settings: PreferenceSettings = serde_json::from_str(&model.settings)
            .with_context(|| format!("Preference group {} has invalid settings", model.id))?;

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            description: model.description,
            is_default: model.is_default,
            settings,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewPreferenceGroup {
    pub user_id: Option<i32>,
    pub name: String,
    pub description: String,
    pub is_default: bool,
    pub settings: PreferenceSettings,
}

/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default)]
pub struct PreferenceGroupUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_default: Option<bool>,
    pub settings: Option<PreferenceSettings>,
}

fn scope(user_id: Option<i32>) -> Condition {
    user_id.map_or_else(
        || Condition::all().add(preference_groups::Column::UserId.is_null()),
        |id| Condition::all().add(preference_groups::Column::UserId.eq(id)),
    )
}

pub struct PreferenceGroupRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> PreferenceGroupRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn get(&self, id: i32) -> Result<Option<PreferenceGroup>> {
        preference_groups::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query preference group")?
            .map(PreferenceGroup::try_from)
            .transpose()
    }

    /// The default group of a user, or the global default for `None`.
    pub async fn find_default(&self, user_id: Option<i32>) -> Result<Option<PreferenceGroup>> {
        preference_groups::Entity::find()
            .filter(scope(user_id))
            .filter(preference_groups::Column::IsDefault.eq(true))
            .order_by_asc(preference_groups::Column::Id)
            .one(self.conn)
            .await
            .context("Failed to query default preference group")?
            .map(PreferenceGroup::try_from)
            .transpose()
    }

    pub async fn get_by_name(
        &self,
        user_id: Option<i32>,
        name: &str,
    ) -> Result<Option<PreferenceGroup>> {
        preference_groups::Entity::find()
            .filter(scope(user_id))
            .filter(preference_groups::Column::Name.eq(name))
            .one(self.conn)
            .await
            .context("Failed to query preference group by name")?
            .map(PreferenceGroup::try_from)
            .transpose()
    }

    pub async fn list(&self, user_id: Option<i32>) -> Result<Vec<PreferenceGroup>> {
        preference_groups::Entity::find()
            .filter(scope(user_id))
            .order_by_asc(preference_groups::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list preference groups")?
            .into_iter()
            .map(PreferenceGroup::try_from)
            .collect()
    }

    /// Plain insert. Keeping a single default per scope is the caller's job.
    pub async fn insert(&self, new: &NewPreferenceGroup) -> Result<PreferenceGroup> {
        let now = chrono::Utc::now().to_rfc3339();
        let settings =
            serde_json::to_string(&new.settings).context("Failed to encode preference settings")?;

        let active = preference_groups::ActiveModel {
            user_id: Set(new.user_id),
            name: Set(new.name.clone()),
            description: Set(new.description.clone()),
            is_default: Set(new.is_default),
            settings: Set(settings),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert preference group")?;

        PreferenceGroup::try_from(model)
    }

    pub async fn update(
        &self,
        id: i32,
        update: &PreferenceGroupUpdate,
    ) -> Result<Option<PreferenceGroup>> {
        let Some(model) = preference_groups::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query preference group")?
        else {
            return Ok(None);
        };

        let mut active: preference_groups::ActiveModel = model.into();
        if let Some(name) = &update.name {
            active.name = Set(name.clone());
        }
        if let Some(description) = &update.description {
            active.description = Set(description.clone());
        }
        if let Some(is_default) = update.is_default {
            active.is_default = Set(is_default);
        }
        if let Some(settings) = &update.settings {
            active.settings = Set(
                serde_json::to_string(settings).context("Failed to encode preference settings")?,
            );
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        PreferenceGroup::try_from(active.update(self.conn).await?).map(Some)
    }

    /// Clears the default flag on every group in the scope except `keep`.
    pub async fn clear_default(&self, user_id: Option<i32>, keep: Option<i32>) -> Result<u64> {
        let mut query = preference_groups::Entity::update_many()
            .col_expr(preference_groups::Column::IsDefault, Expr::value(false))
            .filter(scope(user_id))
            .filter(preference_groups::Column::IsDefault.eq(true));

        if let Some(keep) = keep {
            query = query.filter(preference_groups::Column::Id.ne(keep));
        }

        let result = query
            .exec(self.conn)
            .await
            .context("Failed to clear default preference group")?;

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = preference_groups::Entity::delete_by_id(id)
            .exec(self.conn)
            .await
            .context("Failed to delete preference group")?;

        Ok(result.rows_affected > 0)
    }
}
