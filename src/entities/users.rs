use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub username: String,

    pub email: String,

    /// Argon2id hash for interactive logins
    pub password_hash: String,

    /// md5(password + lowercase(username)), the hash BOINC clients send
    pub boinc_password_hash: String,

    /// `user` or `admin`
    pub role: String,

    pub is_active: bool,

    pub created_at: String,

    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::computers::Entity")]
    Computers,
    #[sea_orm(has_many = "super::user_project_keys::Entity")]
    UserProjectKeys,
    #[sea_orm(has_many = "super::preference_groups::Entity")]
    PreferenceGroups,
}

impl Related<super::computers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Computers.def()
    }
}

impl Related<super::user_project_keys::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::UserProjectKeys.def()
    }
}

impl Related<super::preference_groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PreferenceGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
