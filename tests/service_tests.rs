mod common;

use acctmgr::db::{NewPreferenceGroup, PreferenceGroupUpdate};
use acctmgr::protocol::PreferenceSettings;
use acctmgr::services::preference_service_impl::ensure_global_default;
use acctmgr::services::{AuthError, AuthService, PreferenceError, PreferenceService};
use common::{PASSWORD, spawn_app};
use rust_decimal::Decimal;

fn group(user_id: Option<i32>, name: &str, is_default: bool) -> NewPreferenceGroup {
    NewPreferenceGroup {
        user_id,
        name: name.to_string(),
        description: String::new(),
        is_default,
        settings: PreferenceSettings::default(),
    }
}

#[tokio::test]
async fn test_concurrent_bootstrap_creates_one_default() {
    let app = spawn_app().await;
    let conn = app.shared.store.conn.clone();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let conn = conn.clone();
        handles.push(tokio::spawn(async move { ensure_global_default(&conn).await }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let groups = app.shared.preference_service.list_groups(None).await.unwrap();
    assert_eq!(groups.len(), 1);
}

#[tokio::test]
async fn test_resolution_binds_and_sticks() {
    let app = spawn_app().await;
    let user = app.create_user("alice").await;
    let first = app.create_computer(&user, "cpid-1").await;
    let prefs = &app.shared.preference_service;
    let computers = app.shared.store.computer_repo();

    let global = prefs.resolve_for_computer(&first).await.unwrap();
    assert!(global.is_global());
    let first = computers.get(first.id).await.unwrap().unwrap();
    assert_eq!(first.preference_group_id, Some(global.id));

    let user_default = prefs
        .create_group(group(Some(user.id), "Home", true))
        .await
        .unwrap();

    // Already bound, so the new user default does not move it.
    let resolved = prefs.resolve_for_computer(&first).await.unwrap();
    assert_eq!(resolved.id, global.id);

    let second = app.create_computer(&user, "cpid-2").await;
    let resolved = prefs.resolve_for_computer(&second).await.unwrap();
    assert_eq!(resolved.id, user_default.id);

    let explicit = prefs
        .create_group(group(Some(user.id), "Laptop", false))
        .await
        .unwrap();
    prefs
        .assign_to_computer(first.id, Some(explicit.id))
        .await
        .unwrap();
    let first = computers.get(first.id).await.unwrap().unwrap();
    let resolved = prefs.resolve_for_computer(&first).await.unwrap();
    assert_eq!(resolved.id, explicit.id);
}

#[tokio::test]
async fn test_foreign_group_cannot_be_assigned() {
    let app = spawn_app().await;
    let alice = app.create_user("alice").await;
    let bob = app.create_user("bob").await;
    let computer = app.create_computer(&alice, "cpid-1").await;
    let prefs = &app.shared.preference_service;

    let bobs = prefs
        .create_group(group(Some(bob.id), "Bob's", false))
        .await
        .unwrap();

    let err = prefs
        .assign_to_computer(computer.id, Some(bobs.id))
        .await
        .unwrap_err();
    assert!(matches!(err, PreferenceError::Validation(_)));
}

#[tokio::test]
async fn test_single_default_per_scope() {
    let app = spawn_app().await;
    let user = app.create_user("alice").await;
    let prefs = &app.shared.preference_service;

    let first = prefs
        .create_group(group(Some(user.id), "First", true))
        .await
        .unwrap();
    let second = prefs
        .create_group(group(Some(user.id), "Second", true))
        .await
        .unwrap();

    let groups = prefs.list_groups(Some(user.id)).await.unwrap();
    let defaults: Vec<_> = groups.iter().filter(|g| g.is_default).map(|g| g.id).collect();
    assert_eq!(defaults, vec![second.id]);

    prefs
        .update_group(
            first.id,
            PreferenceGroupUpdate {
                is_default: Some(true),
                ..PreferenceGroupUpdate::default()
            },
        )
        .await
        .unwrap();
    let groups = prefs.list_groups(Some(user.id)).await.unwrap();
    let defaults: Vec<_> = groups.iter().filter(|g| g.is_default).map(|g| g.id).collect();
    assert_eq!(defaults, vec![first.id]);

    let duplicate = prefs
        .create_group(group(Some(user.id), "First", false))
        .await
        .unwrap_err();
    assert!(matches!(duplicate, PreferenceError::Conflict(_)));
}

#[tokio::test]
async fn test_invalid_settings_rejected() {
    let app = spawn_app().await;
    let mut new = group(None, "Broken", false);
    new.settings.cpu_usage_limit = Decimal::from(101);

    let err = app
        .shared
        .preference_service
        .create_group(new)
        .await
        .unwrap_err();
    assert!(matches!(err, PreferenceError::Validation(_)));
}

#[tokio::test]
async fn test_group_in_use_cannot_be_deleted() {
    let app = spawn_app().await;
    let user = app.create_user("alice").await;
    let computer = app.create_computer(&user, "cpid-1").await;
    let prefs = &app.shared.preference_service;

    let group = prefs
        .create_group(group(Some(user.id), "Busy", false))
        .await
        .unwrap();
    prefs
        .assign_to_computer(computer.id, Some(group.id))
        .await
        .unwrap();

    let err = prefs.delete_group(group.id).await.unwrap_err();
    assert!(matches!(err, PreferenceError::InUse(_)));

    prefs.assign_to_computer(computer.id, None).await.unwrap();
    prefs.delete_group(group.id).await.unwrap();
    assert!(matches!(
        prefs.delete_group(group.id).await.unwrap_err(),
        PreferenceError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_authenticate_and_login() {
    let app = spawn_app().await;
    app.create_user("Alice").await;
    let auth = &app.shared.auth_service;

    let hash = acctmgr::security::hash_protocol_password("alice", PASSWORD);
    let user = auth.authenticate("Alice", &hash.to_uppercase()).await.unwrap();
    assert_eq!(user.username, "Alice");

    assert!(matches!(
        auth.authenticate("nobody", &hash).await.unwrap_err(),
        AuthError::UnknownUser
    ));
    assert!(matches!(
        auth.authenticate("Alice", "deadbeef").await.unwrap_err(),
        AuthError::BadPasswordHash
    ));

    auth.login("Alice", PASSWORD).await.unwrap();
    assert!(auth.login("Alice", "wrong password").await.is_err());
}

#[tokio::test]
async fn test_password_change_updates_protocol_hash() {
    let app = spawn_app().await;
    app.create_user("alice").await;
    let auth = &app.shared.auth_service;

    let short = auth.change_password("alice", PASSWORD, "short").await;
    assert!(matches!(short, Err(AuthError::Validation(_))));

    auth.change_password("alice", PASSWORD, "a much longer one")
        .await
        .unwrap();

    let old = acctmgr::security::hash_protocol_password("alice", PASSWORD);
    let new = acctmgr::security::hash_protocol_password("alice", "a much longer one");
    assert!(auth.authenticate("alice", &old).await.is_err());
    auth.authenticate("alice", &new).await.unwrap();
}
