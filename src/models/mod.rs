pub mod computer;
pub mod preference_group;
pub mod project;
pub mod user;

pub use computer::Computer;
pub use preference_group::PreferenceGroup;
pub use project::{Project, ProjectAttachment};
pub use user::{User, UserRole};
