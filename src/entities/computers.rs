use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "computers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Opaque identity echoed by the client
    #[sea_orm(unique)]
    pub uuid: String,

    pub user_id: i32,

    /// BOINC host cross-project id
    pub cpid: String,

    pub previous_cpid: Option<String>,

    pub hostname: String,

    pub preference_group_id: Option<i32>,

    pub last_seen_at: Option<String>,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(
        belongs_to = "super::preference_groups::Entity",
        from = "Column::PreferenceGroupId",
        to = "super::preference_groups::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    PreferenceGroups,
    #[sea_orm(has_many = "super::project_attachments::Entity")]
    ProjectAttachments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::preference_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PreferenceGroups.def()
    }
}

impl Related<super::project_attachments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProjectAttachments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
