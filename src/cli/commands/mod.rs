mod computers;
mod project;
mod user;

pub use computers::{cmd_attach, cmd_computers, cmd_detach, cmd_set_key};
pub use project::{cmd_project_add, cmd_project_list, cmd_project_set_enabled};
pub use user::{cmd_create_user, cmd_protocol_hash, cmd_set_active};
