use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "project_attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub computer_id: i32,

    pub project_id: i32,

    /// Decimal stored as text
    pub resource_share: String,

    pub suspended: bool,

    pub dont_request_more_work: bool,

    pub detach_when_done: bool,

    pub no_cpu: bool,

    pub no_gpu_nvidia: bool,

    pub no_gpu_amd: bool,

    pub no_gpu_intel: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::computers::Entity",
        from = "Column::ComputerId",
        to = "super::computers::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Computers,
    #[sea_orm(
        belongs_to = "super::projects::Entity",
        from = "Column::ProjectId",
        to = "super::projects::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Projects,
}

impl Related<super::computers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Computers.def()
    }
}

impl Related<super::projects::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Projects.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
