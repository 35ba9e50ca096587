use anyhow::{Context, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbBackend, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use uuid::Uuid;

use crate::entities::computers;
use crate::models::Computer;

impl TryFrom<computers::Model> for Computer {
    type Error = anyhow::Error;

    fn try_from(model: computers::Model) -> Result<Self> {
        let uuid = Uuid::parse_str(&model.uuid)
            .with_context(|| format!("Computer {} has an invalid uuid", model.id))?;

        Ok(Self {
            id: model.id,
            user_id: model.user_id,
            uuid,
            cpid: model.cpid,
            previous_cpid: model.previous_cpid,
            hostname: model.hostname,
            preference_group_id: model.preference_group_id,
            last_seen_at: model.last_seen_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewComputer<'a> {
    pub user_id: i32,
    pub cpid: &'a str,
    pub previous_cpid: Option<&'a str>,
    pub hostname: &'a str,
}

pub struct ComputerRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ComputerRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Row locks are requested only on backends that support them; SQLite
    /// serializes writers on its own.
    fn maybe_locked(&self, query: Select<computers::Entity>, lock: bool) -> Select<computers::Entity> {
        if lock && self.conn.get_database_backend() != DbBackend::Sqlite {
            query.lock_exclusive()
        } else {
            query
        }
    }

    async fn fetch_one(&self, query: Select<computers::Entity>) -> Result<Option<Computer>> {
        query
            .one(self.conn)
            .await
            .context("Failed to query computer")?
            .map(Computer::try_from)
            .transpose()
    }

    pub async fn get(&self, id: i32) -> Result<Option<Computer>> {
        self.fetch_one(computers::Entity::find_by_id(id)).await
    }

    /// Looks up a computer by its opaque UUID, restricted to one owner.
    pub async fn find_by_uuid(&self, user_id: i32, uuid: Uuid, lock: bool) -> Result<Option<Computer>> {
        let query = computers::Entity::find()
            .filter(computers::Column::Uuid.eq(uuid.to_string()))
            .filter(computers::Column::UserId.eq(user_id));

        self.fetch_one(self.maybe_locked(query, lock)).await
    }

    /// Most recently seen computer of `user_id` with the given CPID.
    pub async fn find_by_cpid(&self, user_id: i32, cpid: &str, lock: bool) -> Result<Option<Computer>> {
        let query = computers::Entity::find()
            .filter(computers::Column::UserId.eq(user_id))
            .filter(computers::Column::Cpid.eq(cpid))
            .order_by_desc(computers::Column::UpdatedAt)
            .order_by_desc(computers::Column::Id);

        self.fetch_one(self.maybe_locked(query, lock)).await
    }

    pub async fn list_for_user(&self, user_id: i32) -> Result<Vec<Computer>> {
        computers::Entity::find()
            .filter(computers::Column::UserId.eq(user_id))
            .order_by_asc(computers::Column::Id)
            .all(self.conn)
            .await
            .context("Failed to list computers")?
            .into_iter()
            .map(Computer::try_from)
            .collect()
    }

    pub async fn count_with_preference_group(&self, group_id: i32) -> Result<u64> {
        computers::Entity::find()
            .filter(computers::Column::PreferenceGroupId.eq(group_id))
            .count(self.conn)
            .await
            .context("Failed to count computers in preference group")
    }

    pub async fn create(&self, new: NewComputer<'_>) -> Result<Computer> {
        let now = chrono::Utc::now().to_rfc3339();

        let active = computers::ActiveModel {
            uuid: Set(Uuid::new_v4().to_string()),
            user_id: Set(new.user_id),
            cpid: Set(new.cpid.to_string()),
            previous_cpid: Set(new.previous_cpid.map(str::to_string)),
            hostname: Set(new.hostname.to_string()),
            preference_group_id: Set(None),
            last_seen_at: Set(Some(now.clone())),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert computer")?;

        Computer::try_from(model)
    }

    /// Records a scheduler contact: refreshes identity fields and the
    /// last-seen timestamp.
    pub async fn record_contact(
        &self,
        id: i32,
        cpid: &str,
        previous_cpid: Option<&str>,
        hostname: &str,
    ) -> Result<Computer> {
        let model = computers::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query computer")?
            .ok_or_else(|| anyhow::anyhow!("Computer not found: {id}"))?;

        let now = chrono::Utc::now().to_rfc3339();
        let mut active: computers::ActiveModel = model.into();
        active.cpid = Set(cpid.to_string());
        if let Some(previous) = previous_cpid {
            active.previous_cpid = Set(Some(previous.to_string()));
        }
        active.hostname = Set(hostname.to_string());
        active.last_seen_at = Set(Some(now.clone()));
        active.updated_at = Set(now);

        Computer::try_from(active.update(self.conn).await?)
    }

    pub async fn set_preference_group(&self, id: i32, group_id: Option<i32>) -> Result<()> {
        let model = computers::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query computer")?
            .ok_or_else(|| anyhow::anyhow!("Computer not found: {id}"))?;

        let mut active: computers::ActiveModel = model.into();
        active.preference_group_id = Set(group_id);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(self.conn).await?;

        Ok(())
    }
}
