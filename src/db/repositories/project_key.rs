use std::collections::HashMap;

use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};

use crate::entities::user_project_keys;
use crate::security::AccountKeyCipher;

/// Per-user, per-project account keys, encrypted at rest.
pub struct ProjectKeyRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ProjectKeyRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    /// Stores `account_key` for the pair, replacing any previous key.
    pub async fn upsert(
        &self,
        user_id: i32,
        project_id: i32,
        account_key: &str,
        cipher: &AccountKeyCipher,
    ) -> Result<()> {
        let sealed = cipher
            .encrypt(account_key)
            .context("Failed to encrypt account key")?;
        let now = chrono::Utc::now().to_rfc3339();

        let existing = user_project_keys::Entity::find()
            .filter(user_project_keys::Column::UserId.eq(user_id))
            .filter(user_project_keys::Column::ProjectId.eq(project_id))
            .one(self.conn)
            .await
            .context("Failed to query account key")?;

        if let Some(existing) = existing {
            let mut active: user_project_keys::ActiveModel = existing.into();
            active.encrypted_account_key = Set(sealed);
            active.updated_at = Set(now);
            active.update(self.conn).await?;
        } else {
            let active = user_project_keys::ActiveModel {
                user_id: Set(user_id),
                project_id: Set(project_id),
                encrypted_account_key: Set(sealed),
                created_at: Set(now.clone()),
                updated_at: Set(now),
                ..Default::default()
            };
            active
                .insert(self.conn)
                .await
                .context("Failed to insert account key")?;
        }

        Ok(())
    }

    /// Sealed keys of `user_id` for the given projects.
    pub async fn encrypted_for_user(
        &self,
        user_id: i32,
        project_ids: &[i32],
    ) -> Result<HashMap<i32, String>> {
        if project_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = user_project_keys::Entity::find()
            .filter(user_project_keys::Column::UserId.eq(user_id))
            .filter(user_project_keys::Column::ProjectId.is_in(project_ids.iter().copied()))
            .all(self.conn)
            .await
            .context("Failed to query account keys")?;

        Ok(rows
            .into_iter()
            .map(|row| (row.project_id, row.encrypted_account_key))
            .collect())
    }

    /// Plaintext keys of `user_id` for the given projects. Keys that fail to
    /// decrypt come back empty.
    pub async fn decrypted_for_user(
        &self,
        user_id: i32,
        project_ids: &[i32],
        cipher: &AccountKeyCipher,
    ) -> Result<HashMap<i32, String>> {
        let sealed = self.encrypted_for_user(user_id, project_ids).await?;

        Ok(sealed
            .into_iter()
            .map(|(project_id, ciphertext)| (project_id, cipher.decrypt(&ciphertext)))
            .collect())
    }
}
