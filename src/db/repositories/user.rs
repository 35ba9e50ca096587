use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;
use crate::models::{User, UserRole};
use crate::security;

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            role: UserRole::parse(&model.role),
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Both password hashes of a user. Never leaves the service layer.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub password_hash: String,
    pub boinc_password_hash: String,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub role: UserRole,
}

pub struct UserRepository<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> UserRepository<'a, C> {
    #[must_use]
    pub const fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    async fn find_model(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(self.conn)
            .await
            .context("Failed to query user by username")
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.find_model(username).await?.map(User::from))
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username together with its password hashes
    pub async fn get_with_credentials(
        &self,
        username: &str,
    ) -> Result<Option<(User, StoredCredentials)>> {
        Ok(self.find_model(username).await?.map(|model| {
            let credentials = StoredCredentials {
                password_hash: model.password_hash.clone(),
                boinc_password_hash: model.boinc_password_hash.clone(),
            };
            (User::from(model), credentials)
        }))
    }

    /// Creates a user, deriving both the Argon2 and the protocol hash from
    /// the plaintext password.
    pub async fn create(&self, new_user: NewUser<'_>, config: &SecurityConfig) -> Result<User> {
        if self.find_model(new_user.username).await?.is_some() {
            anyhow::bail!("User already exists: {}", new_user.username);
        }

        let (password_hash, boinc_password_hash) =
            derive_hashes(new_user.username, new_user.password, config).await?;
        let now = chrono::Utc::now().to_rfc3339();

        let active = users::ActiveModel {
            username: Set(new_user.username.to_string()),
            email: Set(new_user.email.to_string()),
            password_hash: Set(password_hash),
            boinc_password_hash: Set(boinc_password_hash),
            role: Set(new_user.role.as_str().to_string()),
            is_active: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = active
            .insert(self.conn)
            .await
            .context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Replaces the password, recomputing both hashes.
    pub async fn set_password(
        &self,
        username: &str,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<()> {
        let user = self
            .find_model(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let (password_hash, boinc_password_hash) =
            derive_hashes(username, new_password, config).await?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(password_hash);
        active.boinc_password_hash = Set(boinc_password_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(self.conn).await?;

        Ok(())
    }

    /// Renames a user. The protocol hash embeds the username, so the
    /// password is required to recompute it.
    pub async fn rename(
        &self,
        username: &str,
        new_username: &str,
        password: &str,
        config: &SecurityConfig,
    ) -> Result<User> {
        if self.find_model(new_username).await?.is_some() {
            anyhow::bail!("User already exists: {new_username}");
        }

        let user = self
            .find_model(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let (password_hash, boinc_password_hash) =
            derive_hashes(new_username, password, config).await?;

        let mut active: users::ActiveModel = user.into();
        active.username = Set(new_username.to_string());
        active.password_hash = Set(password_hash);
        active.boinc_password_hash = Set(boinc_password_hash);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        Ok(User::from(active.update(self.conn).await?))
    }

    pub async fn set_active(&self, username: &str, is_active: bool) -> Result<()> {
        let user = self
            .find_model(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {username}"))?;

        let mut active: users::ActiveModel = user.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        active.update(self.conn).await?;

        Ok(())
    }
}

/// Argon2 is CPU-intensive, so it runs on the blocking pool.
async fn derive_hashes(
    username: &str,
    password: &str,
    config: &SecurityConfig,
) -> Result<(String, String)> {
    let password_owned = password.to_string();
    let config = config.clone();
    let password_hash =
        task::spawn_blocking(move || security::hash_password(&password_owned, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

    let boinc_password_hash = security::hash_protocol_password(username, password);

    Ok((password_hash, boinc_password_hash))
}
