use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, SqlErr,
    Statement,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use repositories::attachment::{AttachmentRepository, NewAttachment};
pub use repositories::computer::{ComputerRepository, NewComputer};
pub use repositories::preference_group::{
    NewPreferenceGroup, PreferenceGroupRepository, PreferenceGroupUpdate,
};
pub use repositories::project::{NewProject, ProjectRepository};
pub use repositories::project_key::ProjectKeyRepository;
pub use repositories::user::{NewUser, StoredCredentials, UserRepository};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:");
            let path_str = path_str.split('?').next().unwrap_or(path_str);
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self {
            conn,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Serialises read-then-write transactions on SQLite.
    ///
    /// A deferred SQLite transaction that reads before it writes fails with
    /// `SQLITE_BUSY` when another one upgrades first, and the busy timeout
    /// does not apply to that upgrade. Hold the guard for the whole
    /// transaction. Other backends lock rows instead and get `None`.
    pub async fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        if self.conn.get_database_backend() == DbBackend::Sqlite {
            Some(self.write_lock.lock().await)
        } else {
            None
        }
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    #[must_use]
    pub const fn user_repo(&self) -> UserRepository<'_, DatabaseConnection> {
        UserRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn computer_repo(&self) -> ComputerRepository<'_, DatabaseConnection> {
        ComputerRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn project_repo(&self) -> ProjectRepository<'_, DatabaseConnection> {
        ProjectRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn attachment_repo(&self) -> AttachmentRepository<'_, DatabaseConnection> {
        AttachmentRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn project_key_repo(&self) -> ProjectKeyRepository<'_, DatabaseConnection> {
        ProjectKeyRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn preference_group_repo(&self) -> PreferenceGroupRepository<'_, DatabaseConnection> {
        PreferenceGroupRepository::new(&self.conn)
    }
}

/// Whether `err` (possibly wrapped in context) is a unique constraint
/// violation reported by the database.
#[must_use]
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<DbErr>()
            .and_then(DbErr::sql_err)
            .is_some_and(|e| matches!(e, SqlErr::UniqueConstraintViolation(_)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::models::UserRole;
    use crate::protocol::PreferenceSettings;
    use crate::security::AccountKeyCipher;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    async fn test_store() -> (Store, std::path::PathBuf) {
        let path = std::env::temp_dir().join(format!("acctmgr-db-test-{}.db", Uuid::new_v4()));
        let url = format!("sqlite:{}", path.display());
        let store = Store::new(&url).await.unwrap();
        (store, path)
    }

    fn fast_security() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            ..SecurityConfig::default()
        }
    }

    async fn seed_user(store: &Store, username: &str) -> crate::models::User {
        store
            .user_repo()
            .create(
                NewUser {
                    username,
                    email: "user@example.com",
                    password: "correct horse battery",
                    role: UserRole::User,
                },
                &fast_security(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_create_derives_both_hashes() {
        let (store, path) = test_store().await;
        seed_user(&store, "Alice").await;

        let (user, creds) = store
            .user_repo()
            .get_with_credentials("Alice")
            .await
            .unwrap()
            .unwrap();

        assert!(user.is_active);
        assert!(creds.password_hash.starts_with("$argon2id$"));
        assert_eq!(
            creds.boinc_password_hash,
            crate::security::hash_protocol_password("alice", "correct horse battery")
        );

        let duplicate = store
            .user_repo()
            .create(
                NewUser {
                    username: "Alice",
                    email: "",
                    password: "x",
                    role: UserRole::User,
                },
                &fast_security(),
            )
            .await;
        assert!(duplicate.is_err());

        drop(store);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_rename_recomputes_protocol_hash() {
        let (store, path) = test_store().await;
        seed_user(&store, "bob").await;

        store
            .user_repo()
            .rename("bob", "robert", "new password", &fast_security())
            .await
            .unwrap();

        let (_, creds) = store
            .user_repo()
            .get_with_credentials("robert")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            creds.boinc_password_hash,
            crate::security::hash_protocol_password("robert", "new password")
        );
        assert!(store.user_repo().get_by_username("bob").await.unwrap().is_none());

        drop(store);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_account_key_upsert_and_decrypt() {
        let (store, path) = test_store().await;
        let user = seed_user(&store, "carol").await;
        let project = store
            .project_repo()
            .create(NewProject {
                name: "P1",
                url: "https://p1.example/",
                signed_url: "sig",
                description: "",
                enabled: true,
            })
            .await
            .unwrap();
        let cipher = AccountKeyCipher::new("master", "salt", 1_000);

        let keys = store.project_key_repo();
        keys.upsert(user.id, project.id, "first", &cipher).await.unwrap();
        keys.upsert(user.id, project.id, "second", &cipher).await.unwrap();

        let sealed = keys.encrypted_for_user(user.id, &[project.id]).await.unwrap();
        assert_eq!(sealed.len(), 1);
        assert_ne!(sealed[&project.id], "second");

        let plain = keys
            .decrypted_for_user(user.id, &[project.id], &cipher)
            .await
            .unwrap();
        assert_eq!(plain[&project.id], "second");

        let wrong = AccountKeyCipher::new("other", "salt", 1_000);
        let plain = keys
            .decrypted_for_user(user.id, &[project.id], &wrong)
            .await
            .unwrap();
        assert_eq!(plain[&project.id], "");

        drop(store);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_global_default_is_unique() {
        let (store, path) = test_store().await;
        let groups = store.preference_group_repo();

        let new = NewPreferenceGroup {
            user_id: None,
            name: "Default".into(),
            description: String::new(),
            is_default: true,
            settings: PreferenceSettings::default(),
        };
        groups.insert(&new).await.unwrap();

        let err = groups.insert(&new).await.unwrap_err();
        assert!(is_unique_violation(&err));

        drop(store);
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_attachment_roundtrip_and_delete() {
        let (store, path) = test_store().await;
        let user = seed_user(&store, "dave").await;
        let computer = store
            .computer_repo()
            .create(NewComputer {
                user_id: user.id,
                cpid: "cpid",
                previous_cpid: None,
                hostname: "host",
            })
            .await
            .unwrap();
        let project = store
            .project_repo()
            .create(NewProject {
                name: "P1",
                url: "https://p1.example/",
                signed_url: "sig",
                description: "",
                enabled: true,
            })
            .await
            .unwrap();

        let mut new = NewAttachment::new(computer.id, project.id);
        new.resource_share = Decimal::new(125, 1);
        let attachment = store.attachment_repo().create(new).await.unwrap();
        assert_eq!(attachment.resource_share, Decimal::new(125, 1));

        let listed = store
            .attachment_repo()
            .list_for_computer(computer.id)
            .await
            .unwrap();
        assert_eq!(listed, vec![attachment.clone()]);

        let deleted = store
            .attachment_repo()
            .delete_by_ids(&[attachment.id])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store
            .attachment_repo()
            .list_for_computer(computer.id)
            .await
            .unwrap()
            .is_empty());

        drop(store);
        let _ = std::fs::remove_file(path);
    }
}
