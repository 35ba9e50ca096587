pub mod prelude;

pub mod computers;
pub mod preference_groups;
pub mod project_attachments;
pub mod projects;
pub mod user_project_keys;
pub mod users;
