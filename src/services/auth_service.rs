//! Domain service for authentication and user management.
//!
//! Covers both credential paths: the protocol hash BOINC clients send with
//! every scheduler RPC, and interactive passwords.

use thiserror::Error;

use crate::models::{User, UserRole};
use crate::protocol::BoincErrorCode;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unknown user")]
    UnknownUser,

    #[error("Password hash does not match")]
    BadPasswordHash,

    #[error("Account is disabled")]
    Inactive,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Code reported to a BOINC client. Disabled accounts are reported like a
    /// wrong password.
    #[must_use]
    pub const fn error_code(&self) -> BoincErrorCode {
        match self {
            Self::UnknownUser => BoincErrorCode::BadUserName,
            Self::BadPasswordHash | Self::Inactive | Self::InvalidCredentials => {
                BoincErrorCode::BadPassword
            }
            Self::Validation(_) | Self::Database(_) | Self::Internal(_) => {
                BoincErrorCode::Internal
            }
        }
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Authenticates a scheduler RPC by username and protocol hash.
    ///
    /// # Errors
    ///
    /// [`AuthError::UnknownUser`] when no such user exists,
    /// [`AuthError::Inactive`] or [`AuthError::BadPasswordHash`] otherwise.
    async fn authenticate(&self, username: &str, password_hash: &str) -> Result<User, AuthError>;

    /// Verifies an interactive password.
    async fn login(&self, username: &str, password: &str) -> Result<User, AuthError>;

    /// Creates an account with both password hashes derived from `password`.
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: UserRole,
    ) -> Result<User, AuthError>;

    /// Changes a user's password.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Validation`] if current password is incorrect or new password invalid.
    async fn change_password(
        &self,
        username: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError>;
}
