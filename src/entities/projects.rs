use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    #[sea_orm(unique)]
    pub url: String,

    /// Project URL signed with the manager's private key
    pub signed_url: String,

    pub description: String,

    pub enabled: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::project_attachments::Entity")]
    ProjectAttachments,
    #[sea_orm(has_many = "super::user_project_keys::Entity")]
    UserProjectKeys,
}

impl Related<super::project_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectAttachments.def()
    }
}

impl Related<super::user_project_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserProjectKeys.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
