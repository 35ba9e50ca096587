pub use super::computers::Entity as Computers;
pub use super::preference_groups::Entity as PreferenceGroups;
pub use super::project_attachments::Entity as ProjectAttachments;
pub use super::projects::Entity as Projects;
pub use super::user_project_keys::Entity as UserProjectKeys;
pub use super::users::Entity as Users;
