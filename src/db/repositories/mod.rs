pub mod attachment;
pub mod computer;
pub mod preference_group;
pub mod project;
pub mod project_key;
pub mod user;
