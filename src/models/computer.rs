use uuid::Uuid;

/// A BOINC client installation owned by one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Computer {
    pub id: i32,
    pub user_id: i32,
    /// Stable identity handed to the client in the reply's opaque block.
    pub uuid: Uuid,
    pub cpid: String,
    pub previous_cpid: Option<String>,
    pub hostname: String,
    pub preference_group_id: Option<i32>,
    pub last_seen_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
