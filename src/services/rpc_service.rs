//! Request orchestration for the account-manager RPC.

use thiserror::Error;

use crate::protocol::wire::ProjectConfig;
use crate::protocol::{AccountManagerReply, AccountManagerRequest, BoincErrorCode, WireError};
use crate::services::auth_service::AuthError;
use crate::services::preference_service::PreferenceError;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Malformed(#[from] WireError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Preferences(#[from] PreferenceError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RpcError {
    #[must_use]
    pub const fn error_code(&self) -> BoincErrorCode {
        match self {
            Self::Malformed(_) => BoincErrorCode::XmlParse,
            Self::Auth(e) => e.error_code(),
            Self::Preferences(_) | Self::Database(_) | Self::Internal(_) => BoincErrorCode::Internal,
        }
    }

    /// Label used for the `outcome` metric and log field.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self.error_code() {
            BoincErrorCode::XmlParse => "malformed",
            BoincErrorCode::BadUserName => "unknown_user",
            BoincErrorCode::BadPassword => "bad_password",
            BoincErrorCode::Internal => "error",
        }
    }
}

impl From<sea_orm::DbErr> for RpcError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for RpcError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(format!("{err:#}"))
    }
}

/// The message a client sees for an error code. Never carries internal detail.
#[must_use]
pub const fn client_message(code: BoincErrorCode) -> &'static str {
    match code {
        BoincErrorCode::XmlParse => "Invalid request format",
        BoincErrorCode::BadUserName => "Invalid username",
        BoincErrorCode::BadPassword => "Invalid password",
        BoincErrorCode::Internal => "Internal server error",
    }
}

/// A reply ready to encode, plus the error it reports, if any.
#[derive(Debug, Clone)]
pub struct RpcOutcome {
    pub reply: AccountManagerReply,
    pub error: Option<BoincErrorCode>,
}

#[async_trait::async_trait]
pub trait RpcService: Send + Sync {
    /// Decodes and processes a raw request body. Every failure is folded into
    /// an error reply.
    async fn handle(&self, body: &[u8]) -> RpcOutcome;

    /// Authenticates, identifies the computer and reconciles it, committing
    /// any attachment deletions atomically.
    async fn process(&self, request: &AccountManagerRequest)
    -> Result<AccountManagerReply, RpcError>;

    /// Document served at `get_project_config.php`.
    fn project_config(&self) -> ProjectConfig;
}
