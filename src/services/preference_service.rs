//! Domain service for preference groups: resolution for a computer and
//! management of the groups themselves.

use thiserror::Error;

use crate::db::{NewPreferenceGroup, PreferenceGroupUpdate};
use crate::models::{Computer, PreferenceGroup};

#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("Preference group not found: {0}")]
    NotFound(i32),

    #[error("A preference group named '{0}' already exists")]
    Conflict(String),

    #[error("Preference group {0} is still assigned to computers")]
    InUse(i32),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for PreferenceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for PreferenceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait PreferenceService: Send + Sync {
    /// The group whose knobs apply to `computer`: its explicit assignment,
    /// else its owner's default, else the global default (created with
    /// factory values when missing).
    async fn resolve_for_computer(&self, computer: &Computer)
    -> Result<PreferenceGroup, PreferenceError>;

    /// The global default group, created on first use.
    async fn ensure_global_default(&self) -> Result<PreferenceGroup, PreferenceError>;

    async fn list_groups(&self, user_id: Option<i32>) -> Result<Vec<PreferenceGroup>, PreferenceError>;

    /// Creates a group. A new default replaces the previous default of the
    /// same scope atomically.
    async fn create_group(&self, new: NewPreferenceGroup) -> Result<PreferenceGroup, PreferenceError>;

    async fn update_group(
        &self,
        id: i32,
        update: PreferenceGroupUpdate,
    ) -> Result<PreferenceGroup, PreferenceError>;

    /// Deletes a group that no computer is assigned to.
    async fn delete_group(&self, id: i32) -> Result<(), PreferenceError>;

    /// Pins `computer_id` to a group, or back to defaults with `None`.
    async fn assign_to_computer(
        &self,
        computer_id: i32,
        group_id: Option<i32>,
    ) -> Result<(), PreferenceError>;
}
