//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use tokio::task;
use tracing::debug;

use crate::config::SecurityConfig;
use crate::db::{NewUser, Store};
use crate::models::{User, UserRole};
use crate::security;
use crate::services::auth_service::{AuthError, AuthService};

pub struct SeaOrmAuthService {
    store: Store,
    security: SecurityConfig,
    min_password_length: usize,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, security: SecurityConfig, min_password_length: usize) -> Self {
        Self {
            store,
            security,
            min_password_length,
        }
    }

    fn validate_password(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn authenticate(&self, username: &str, password_hash: &str) -> Result<User, AuthError> {
        let Some((user, credentials)) = self.store.user_repo().get_with_credentials(username).await?
        else {
            debug!(username, "Scheduler RPC for unknown user");
            return Err(AuthError::UnknownUser);
        };

        if !user.is_active {
            debug!(username, "Scheduler RPC for disabled account");
            return Err(AuthError::Inactive);
        }

        if !security::protocol_hash_matches(&credentials.boinc_password_hash, password_hash) {
            return Err(AuthError::BadPasswordHash);
        }

        Ok(user)
    }

    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some((user, credentials)) = self.store.user_repo().get_with_credentials(username).await?
        else {
            return Err(AuthError::InvalidCredentials);
        };

        let password = password.to_string();
        let stored = credentials.password_hash;

        // Argon2 verification is CPU-intensive
        let is_valid = task::spawn_blocking(move || security::verify_password(&password, &stored))
            .await
            .map_err(|e| AuthError::Internal(format!("Password verification task panicked: {e}")))?;

        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        Ok(user)
    }

    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("Username cannot be empty".to_string()));
        }
        self.validate_password(password)?;

        if self.store.user_repo().get_by_username(username).await?.is_some() {
            return Err(AuthError::Validation(format!(
                "User '{username}' already exists"
            )));
        }

        let user = self
            .store
            .user_repo()
            .create(
                NewUser {
                    username,
                    email,
                    password,
                    role,
                },
                &self.security,
            )
            .await?;

        Ok(user)
    }

    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        self.validate_password(new_password)?;

        if current_password == new_password {
            return Err(AuthError::Validation(
                "New password must be different from current password".to_string(),
            ));
        }

        match self.login(username, current_password).await {
            Ok(_) => {}
            Err(AuthError::InvalidCredentials | AuthError::Inactive) => {
                return Err(AuthError::Validation(
                    "Current password is incorrect".to_string(),
                ));
            }
            Err(e) => return Err(e),
        }

        self.store
            .user_repo()
            .set_password(username, new_password, &self.security)
            .await?;

        Ok(())
    }
}
