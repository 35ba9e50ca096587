//! Identifying which stored computer a scheduler RPC comes from.

use anyhow::Result;
use sea_orm::ConnectionTrait;
use tracing::{debug, info};

use crate::db::{ComputerRepository, NewComputer};
use crate::models::{Computer, User};
use crate::protocol::AccountManagerRequest;

/// How a request was matched to a computer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputerMatch {
    /// By the UUID echoed back in `<opaque>`.
    Opaque,
    /// By the client's current CPID.
    Cpid,
    /// By the CPID the client had before it regenerated it.
    PreviousCpid,
    /// No match; a new computer was registered.
    Created,
}

impl ComputerMatch {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Opaque => "opaque",
            Self::Cpid => "cpid",
            Self::PreviousCpid => "previous_cpid",
            Self::Created => "created",
        }
    }
}

/// Finds or registers the computer `request` comes from and records the
/// contact. Candidate rows are locked until the caller's transaction ends.
///
/// Lookups never cross users: a UUID or CPID belonging to another account is
/// treated as unknown.
pub async fn upsert_from_request<C: ConnectionTrait>(
    conn: &C,
    user: &User,
    request: &AccountManagerRequest,
) -> Result<(Computer, ComputerMatch)> {
    let computers = ComputerRepository::new(conn);
    let cpid = request.host_cpid.trim();
    let previous = request.previous_cpid();
    let hostname = request.domain_name.trim();

    let mut found = None;

    if let Some(uuid) = request.opaque_uuid() {
        found = computers
            .find_by_uuid(user.id, uuid, true)
            .await?
            .map(|c| (c, ComputerMatch::Opaque));
    }

    if found.is_none() && !cpid.is_empty() {
        found = computers
            .find_by_cpid(user.id, cpid, true)
            .await?
            .map(|c| (c, ComputerMatch::Cpid));
    }

    if found.is_none()
        && let Some(previous) = previous
    {
        found = computers
            .find_by_cpid(user.id, previous, true)
            .await?
            .map(|c| (c, ComputerMatch::PreviousCpid));
    }

    if let Some((existing, matched)) = found {
        debug!(
            computer_id = existing.id,
            matched = matched.as_str(),
            "Matched computer"
        );
        let computer = computers
            .record_contact(existing.id, cpid, previous, hostname)
            .await?;
        return Ok((computer, matched));
    }

    let computer = computers
        .create(NewComputer {
            user_id: user.id,
            cpid,
            previous_cpid: previous,
            hostname,
        })
        .await?;

    info!(
        computer_id = computer.id,
        user_id = user.id,
        hostname,
        "Registered new computer"
    );

    Ok((computer, ComputerMatch::Created))
}
