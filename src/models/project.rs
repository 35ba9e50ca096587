use rust_decimal::Decimal;

use crate::protocol::version::ExcludedResources;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i32,
    pub name: String,
    pub url: String,
    /// Project URL signed with the manager's key, sent as `url_signature`.
    pub signed_url: String,
    pub description: String,
    pub enabled: bool,
}

/// Desired state of one project on one computer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectAttachment {
    pub id: i32,
    pub computer_id: i32,
    pub project_id: i32,
    pub resource_share: Decimal,
    pub suspended: bool,
    pub dont_request_more_work: bool,
    pub detach_when_done: bool,
    pub no_cpu: bool,
    pub no_gpu_nvidia: bool,
    pub no_gpu_amd: bool,
    pub no_gpu_intel: bool,
}

impl ProjectAttachment {
    #[must_use]
    pub const fn excluded_resources(&self) -> ExcludedResources {
        ExcludedResources {
            cpu: self.no_cpu,
            nvidia: self.no_gpu_nvidia,
            amd: self.no_gpu_amd,
            intel: self.no_gpu_intel,
        }
    }
}
