//! `SeaORM` implementation of the `PreferenceService` trait.
//!
//! Resolution is exposed as free functions generic over the connection so the
//! RPC pipeline can run it inside its own transaction.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::{debug, info, warn};

use crate::db::{
    ComputerRepository, NewPreferenceGroup, PreferenceGroupRepository, PreferenceGroupUpdate,
    Store, is_unique_violation,
};
use crate::models::{Computer, PreferenceGroup};
use crate::protocol::PreferenceSettings;
use crate::services::preference_service::{PreferenceError, PreferenceService};

pub const DEFAULT_GROUP_NAME: &str = "Default";
pub const DEFAULT_GROUP_DESCRIPTION: &str = "Default preference group with default BOINC settings";

fn factory_default_group() -> NewPreferenceGroup {
    NewPreferenceGroup {
        user_id: None,
        name: DEFAULT_GROUP_NAME.to_string(),
        description: DEFAULT_GROUP_DESCRIPTION.to_string(),
        is_default: true,
        settings: PreferenceSettings::default(),
    }
}

/// Returns the global default group, creating it if needed.
///
/// Concurrent first requests may both try to create it. The insert runs in a
/// savepoint and the loser of the race re-reads the winner's row.
pub async fn ensure_global_default<C>(conn: &C) -> Result<PreferenceGroup, PreferenceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if let Some(group) = PreferenceGroupRepository::new(conn).find_default(None).await? {
        return Ok(group);
    }

    let savepoint = conn.begin().await?;
    match PreferenceGroupRepository::new(&savepoint)
        .insert(&factory_default_group())
        .await
    {
        Ok(group) => {
            savepoint.commit().await?;
            info!(group_id = group.id, "Created global default preference group");
            Ok(group)
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await?;
            PreferenceGroupRepository::new(conn)
                .find_default(None)
                .await?
                .ok_or_else(|| {
                    PreferenceError::Internal(
                        "Global default preference group vanished after conflict".to_string(),
                    )
                })
        }
        Err(e) => Err(e.into()),
    }
}

/// The group whose settings apply to `computer`.
///
/// An assigned group sticks. Otherwise the user's default, then the global
/// default, is bound to the computer so later changes of either default do
/// not move it.
pub async fn resolve_for_computer<C>(
    conn: &C,
    computer: &Computer,
) -> Result<PreferenceGroup, PreferenceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    let groups = PreferenceGroupRepository::new(conn);

    if let Some(group_id) = computer.preference_group_id {
        match groups.get(group_id).await? {
            Some(group) if group.user_id.is_none_or(|owner| owner == computer.user_id) => {
                return Ok(group);
            }
            Some(_) => warn!(
                computer_id = computer.id,
                group_id, "Computer is assigned to another user's preference group, ignoring"
            ),
            None => {}
        }
    }

    let group = match groups.find_default(Some(computer.user_id)).await? {
        Some(group) => group,
        None => ensure_global_default(conn).await?,
    };

    ComputerRepository::new(conn)
        .set_preference_group(computer.id, Some(group.id))
        .await?;
    debug!(
        computer_id = computer.id,
        group_id = group.id,
        "Bound computer to preference group"
    );

    Ok(group)
}

/// Inserts a group, first clearing any existing default in its scope.
pub async fn create_group<C>(
    conn: &C,
    new: &NewPreferenceGroup,
) -> Result<PreferenceGroup, PreferenceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    validate_name(&new.name)?;
    new.settings
        .validate()
        .map_err(PreferenceError::Validation)?;

    let txn = conn.begin().await?;
    let groups = PreferenceGroupRepository::new(&txn);

    if groups.get_by_name(new.user_id, &new.name).await?.is_some() {
        return Err(PreferenceError::Conflict(new.name.clone()));
    }

    if new.is_default {
        groups.clear_default(new.user_id, None).await?;
    }

    let group = groups.insert(new).await?;
    txn.commit().await?;

    Ok(group)
}

pub async fn update_group<C>(
    conn: &C,
    id: i32,
    update: &PreferenceGroupUpdate,
) -> Result<PreferenceGroup, PreferenceError>
where
    C: ConnectionTrait + TransactionTrait,
{
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    if let Some(settings) = &update.settings {
        settings.validate().map_err(PreferenceError::Validation)?;
    }

    let txn = conn.begin().await?;
    let groups = PreferenceGroupRepository::new(&txn);

    let existing = groups.get(id).await?.ok_or(PreferenceError::NotFound(id))?;

    if let Some(name) = update.name.as_deref().filter(|name| *name != existing.name)
        && groups.get_by_name(existing.user_id, name).await?.is_some()
    {
        return Err(PreferenceError::Conflict(name.to_string()));
    }

    if update.is_default == Some(true) {
        groups.clear_default(existing.user_id, Some(id)).await?;
    }

    let group = groups
        .update(id, update)
        .await?
        .ok_or(PreferenceError::NotFound(id))?;
    txn.commit().await?;

    Ok(group)
}

fn validate_name(name: &str) -> Result<(), PreferenceError> {
    if name.trim().is_empty() {
        return Err(PreferenceError::Validation(
            "Preference group name cannot be empty".to_string(),
        ));
    }
    Ok(())
}

pub struct SeaOrmPreferenceService {
    store: Store,
}

impl SeaOrmPreferenceService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PreferenceService for SeaOrmPreferenceService {
    async fn resolve_for_computer(
        &self,
        computer: &Computer,
    ) -> Result<PreferenceGroup, PreferenceError> {
        let _write_guard = self.store.write_guard().await;
        resolve_for_computer(&self.store.conn, computer).await
    }

    async fn ensure_global_default(&self) -> Result<PreferenceGroup, PreferenceError> {
        let _write_guard = self.store.write_guard().await;
        ensure_global_default(&self.store.conn).await
    }

    async fn list_groups(
        &self,
        user_id: Option<i32>,
    ) -> Result<Vec<PreferenceGroup>, PreferenceError> {
        Ok(self.store.preference_group_repo().list(user_id).await?)
    }

    async fn create_group(
        &self,
        new: NewPreferenceGroup,
    ) -> Result<PreferenceGroup, PreferenceError> {
        let _write_guard = self.store.write_guard().await;
        create_group(&self.store.conn, &new).await
    }

    async fn update_group(
        &self,
        id: i32,
        update: PreferenceGroupUpdate,
    ) -> Result<PreferenceGroup, PreferenceError> {
        let _write_guard = self.store.write_guard().await;
        update_group(&self.store.conn, id, &update).await
    }

    async fn delete_group(&self, id: i32) -> Result<(), PreferenceError> {
        let assigned = self
            .store
            .computer_repo()
            .count_with_preference_group(id)
            .await?;
        if assigned > 0 {
            return Err(PreferenceError::InUse(id));
        }

        if !self.store.preference_group_repo().delete(id).await? {
            return Err(PreferenceError::NotFound(id));
        }

        Ok(())
    }

    async fn assign_to_computer(
        &self,
        computer_id: i32,
        group_id: Option<i32>,
    ) -> Result<(), PreferenceError> {
        let computer = self
            .store
            .computer_repo()
            .get(computer_id)
            .await?
            .ok_or_else(|| {
                PreferenceError::Validation(format!("Computer not found: {computer_id}"))
            })?;

        if let Some(group_id) = group_id {
            let group = self
                .store
                .preference_group_repo()
                .get(group_id)
                .await?
                .ok_or(PreferenceError::NotFound(group_id))?;

            if group.user_id.is_some_and(|owner| owner != computer.user_id) {
                return Err(PreferenceError::Validation(
                    "Preference group belongs to another user".to_string(),
                ));
            }
        }

        ComputerRepository::new(&self.store.conn)
            .set_preference_group(computer_id, group_id)
            .await?;

        Ok(())
    }
}
