use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{ConnectionTrait, Schema};

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one global default preference group. `CREATE INDEX ... WHERE` is
/// not expressible through the index builder for every backend, so it is
/// issued as raw SQL.
const UNIQUE_GLOBAL_DEFAULT_GROUP: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_preference_groups_global_default ON preference_groups (is_default) \
     WHERE is_default = 1 AND user_id IS NULL";

/// At most one default preference group per user.
const UNIQUE_USER_DEFAULT_GROUP: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
     idx_preference_groups_user_default ON preference_groups (user_id) \
     WHERE is_default = 1 AND user_id IS NOT NULL";

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(PreferenceGroups)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Projects)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Computers)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(ProjectAttachments)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(UserProjectKeys)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_computers_user_cpid")
                    .table(Computers)
                    .col(crate::entities::computers::Column::UserId)
                    .col(crate::entities::computers::Column::Cpid)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_project_attachments_computer_project")
                    .table(ProjectAttachments)
                    .col(crate::entities::project_attachments::Column::ComputerId)
                    .col(crate::entities::project_attachments::Column::ProjectId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_user_project_keys_user_project")
                    .table(UserProjectKeys)
                    .col(crate::entities::user_project_keys::Column::UserId)
                    .col(crate::entities::user_project_keys::Column::ProjectId)
                    .unique()
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();
        conn.execute_unprepared(UNIQUE_GLOBAL_DEFAULT_GROUP).await?;
        conn.execute_unprepared(UNIQUE_USER_DEFAULT_GROUP).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserProjectKeys).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ProjectAttachments).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Computers).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Projects).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PreferenceGroups).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
