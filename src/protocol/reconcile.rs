//! Reconciliation of a computer's desired project attachments against what the
//! client reports.
//!
//! This is a pure function of its inputs: it never touches the database. The
//! caller loads the rows, runs [`reconcile`], then applies the returned
//! deletions inside the same transaction.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::version::ClientCapabilities;
use super::wire::{AccountDirective, ClientProject};
use crate::models::{Project, ProjectAttachment};

/// How a single attachment compares to the client's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The project is disabled: detach it and forget the attachment.
    ProjectDisabled,
    /// The user has no usable account key for this project: detach it too.
    MissingKey,
    /// The client no longer reports a project flagged detach-when-done.
    DetachConfirmed,
    /// The client does not report the project at all.
    Reattach,
    /// Reported, but at least one setting differs.
    SettingsDrift,
    /// Reported and in sync.
    InSync,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ProjectDisabled => "project_disabled",
            Self::MissingKey => "missing_key",
            Self::DetachConfirmed => "detach_confirmed",
            Self::Reattach => "reattach",
            Self::SettingsDrift => "settings_drift",
            Self::InSync => "in_sync",
        }
    }
}

pub struct ReconcileInput<'a> {
    pub attachments: &'a [ProjectAttachment],
    /// Every project referenced by `attachments`, enabled or not.
    pub projects: &'a HashMap<i32, Project>,
    /// Decrypted account keys by project id. Empty strings count as missing.
    pub account_keys: &'a HashMap<i32, String>,
    pub client_projects: &'a [ClientProject],
    pub capabilities: ClientCapabilities,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub directives: Vec<AccountDirective>,
    /// Attachment ids to delete before the transaction commits.
    pub deletions: Vec<i32>,
    pub verdicts: Vec<(i32, Verdict)>,
}

/// Canonical form used to match client URLs against project URLs.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Classifies one attachment. `client` is the matching entry of the client's
/// project list, if any.
#[must_use]
pub fn classify(
    attachment: &ProjectAttachment,
    project: &Project,
    key: Option<&str>,
    client: Option<&ClientProject>,
) -> Verdict {
    if !project.enabled {
        return Verdict::ProjectDisabled;
    }

    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return Verdict::MissingKey;
    };

    let Some(client) = client else {
        return if attachment.detach_when_done {
            Verdict::DetachConfirmed
        } else {
            Verdict::Reattach
        };
    };

    let drifted = client.account_key.as_deref() != Some(key)
        || client.resource_share != Some(attachment.resource_share)
        || client.suspended_via_gui != attachment.suspended
        || client.dont_request_more_work != attachment.dont_request_more_work
        || client.detach_when_done != attachment.detach_when_done;

    if drifted {
        Verdict::SettingsDrift
    } else {
        Verdict::InSync
    }
}

/// Computes the directives for one request.
///
/// Attachments are processed in ascending project id order so identical
/// inputs always produce identical replies.
#[must_use]
pub fn reconcile(input: &ReconcileInput<'_>) -> ReconcileOutcome {
    let client_by_url: HashMap<String, &ClientProject> = input
        .client_projects
        .iter()
        .map(|p| (normalize_url(&p.url), p))
        .collect();

    let mut attachments: Vec<&ProjectAttachment> = input.attachments.iter().collect();
    attachments.sort_by_key(|a| (a.project_id, a.id));

    let mut outcome = ReconcileOutcome::default();

    for attachment in attachments {
        let Some(project) = input.projects.get(&attachment.project_id) else {
            warn!(
                attachment_id = attachment.id,
                project_id = attachment.project_id,
                "Attachment references a missing project, skipping"
            );
            continue;
        };

        let key = input
            .account_keys
            .get(&project.id)
            .map(String::as_str)
            .filter(|k| !k.is_empty());
        let client = client_by_url.get(&normalize_url(&project.url)).copied();

        let verdict = classify(attachment, project, key, client);
        debug!(
            project_id = project.id,
            project = %project.name,
            verdict = verdict.as_str(),
            "Reconciled attachment"
        );
        outcome.verdicts.push((project.id, verdict));

        match verdict {
            Verdict::ProjectDisabled | Verdict::MissingKey => {
                if verdict == Verdict::MissingKey {
                    warn!(
                        project_id = project.id,
                        project = %project.name,
                        "No usable account key for attached project, detaching"
                    );
                }
                outcome
                    .directives
                    .push(AccountDirective::detach(&project.url, &project.signed_url));
                outcome.deletions.push(attachment.id);
            }
            // The client already finished detaching; there is nothing to tell it.
            Verdict::DetachConfirmed => outcome.deletions.push(attachment.id),
            Verdict::Reattach | Verdict::SettingsDrift | Verdict::InSync => {
                // `key` is Some for every verdict past MissingKey.
                let Some(key) = key else { continue };
                if let Some(directive) =
                    attach_directive(project, attachment, key, client, input.capabilities)
                {
                    outcome.directives.push(directive);
                }
            }
        }
    }

    outcome
}

fn attach_directive(
    project: &Project,
    attachment: &ProjectAttachment,
    key: &str,
    client: Option<&ClientProject>,
    capabilities: ClientCapabilities,
) -> Option<AccountDirective> {
    if !capabilities.accepts_account_key(key) {
        warn!(
            project_id = project.id,
            client_version = %capabilities.version,
            "Client cannot accept a weak account key, skipping project"
        );
        return None;
    }

    // A client that already holds the key does not need it again.
    let authenticator = if client.and_then(|c| c.account_key.as_deref()) == Some(key) {
        String::new()
    } else {
        key.to_string()
    };

    let mut directive = AccountDirective {
        url: project.url.clone(),
        url_signature: project.signed_url.clone(),
        authenticator,
        resource_share: Some(attachment.resource_share),
        suspend: Some(attachment.suspended),
        dont_request_more_work: Some(attachment.dont_request_more_work),
        detach_when_done: Some(attachment.detach_when_done),
        ..AccountDirective::default()
    };
    directive.apply_exclusion(capabilities.resource_exclusion(attachment.excluded_resources()));

    Some(directive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    const P1_URL: &str = "https://p1.example/";
    const P2_URL: &str = "https://p2.example/";

    fn project(id: i32, url: &str, enabled: bool) -> Project {
        Project {
            id,
            name: format!("Project {id}"),
            url: url.to_string(),
            signed_url: format!("signed:{url}"),
            description: String::new(),
            enabled,
        }
    }

    fn attachment(id: i32, project_id: i32) -> ProjectAttachment {
        ProjectAttachment {
            id,
            computer_id: 1,
            project_id,
            resource_share: Decimal::from(100),
            suspended: false,
            dont_request_more_work: false,
            detach_when_done: false,
            no_cpu: false,
            no_gpu_nvidia: false,
            no_gpu_amd: false,
            no_gpu_intel: false,
        }
    }

    fn reported(url: &str, key: Option<&str>) -> ClientProject {
        ClientProject {
            url: url.to_string(),
            resource_share: Some(Decimal::from(100)),
            account_key: key.map(str::to_string),
            ..ClientProject::default()
        }
    }

    fn run(
        attachments: &[ProjectAttachment],
        projects: &[Project],
        keys: &[(i32, &str)],
        client: &[ClientProject],
        version: &str,
    ) -> ReconcileOutcome {
        let projects: HashMap<i32, Project> = projects.iter().map(|p| (p.id, p.clone())).collect();
        let keys: HashMap<i32, String> = keys.iter().map(|(id, k)| (*id, (*k).to_string())).collect();

        reconcile(&ReconcileInput {
            attachments,
            projects: &projects,
            account_keys: &keys,
            client_projects: client,
            capabilities: ClientCapabilities::detect(version),
        })
    }

    #[test]
    fn test_new_attachment_is_sent_with_key() {
        let outcome = run(
            &[attachment(10, 1)],
            &[project(1, P1_URL, true)],
            &[(1, "K1")],
            &[],
            "7.16.3",
        );

        assert_eq!(outcome.directives.len(), 1);
        let directive = &outcome.directives[0];
        assert_eq!(directive.url, P1_URL);
        assert_eq!(directive.url_signature, format!("signed:{P1_URL}"));
        assert_eq!(directive.authenticator, "K1");
        assert!(!directive.detach);
        assert_eq!(directive.resource_share, Some(Decimal::from(100)));
        assert!(outcome.deletions.is_empty());
        assert_eq!(outcome.verdicts, vec![(1, Verdict::Reattach)]);
    }

    #[test]
    fn test_detach_when_done_confirmed_deletes_row() {
        let mut att = attachment(20, 2);
        att.detach_when_done = true;

        let outcome = run(&[att], &[project(2, P2_URL, true)], &[(2, "K2")], &[], "7.16.3");

        assert!(outcome.directives.is_empty());
        assert_eq!(outcome.deletions, vec![20]);
        assert_eq!(outcome.verdicts, vec![(2, Verdict::DetachConfirmed)]);
    }

    #[test]
    fn test_disabled_project_is_detached_even_without_key() {
        let outcome = run(&[attachment(30, 3)], &[project(3, P1_URL, false)], &[], &[], "7.16.3");

        assert_eq!(outcome.directives.len(), 1);
        assert!(outcome.directives[0].detach);
        assert_eq!(outcome.deletions, vec![30]);
    }

    #[test]
    fn test_missing_key_detaches_and_deletes() {
        for keys in [&[(1, "")][..], &[][..]] {
            let outcome = run(
                &[attachment(10, 1)],
                &[project(1, P1_URL, true)],
                keys,
                &[reported(P1_URL, Some("K1"))],
                "7.16.3",
            );

            assert_eq!(outcome.directives.len(), 1);
            let directive = &outcome.directives[0];
            assert!(directive.detach);
            assert_eq!(directive.authenticator, "");
            assert_eq!(directive.resource_share, None);
            assert_eq!(directive.suspend, None);
            assert_eq!(outcome.deletions, vec![10]);
            assert_eq!(outcome.verdicts, vec![(1, Verdict::MissingKey)]);
        }
    }

    #[test]
    fn test_in_sync_project_is_resent_without_authenticator() {
        let outcome = run(
            &[attachment(10, 1)],
            &[project(1, P1_URL, true)],
            &[(1, "K1")],
            &[reported("https://P1.example", Some("K1"))],
            "7.16.3",
        );

        assert_eq!(outcome.verdicts, vec![(1, Verdict::InSync)]);
        assert_eq!(outcome.directives.len(), 1);
        assert_eq!(outcome.directives[0].authenticator, "");
    }

    #[test]
    fn test_settings_drift_resends_state() {
        let mut att = attachment(10, 1);
        att.suspended = true;

        let outcome = run(
            &[att],
            &[project(1, P1_URL, true)],
            &[(1, "K1")],
            &[reported(P1_URL, Some("OLD"))],
            "7.16.3",
        );

        assert_eq!(outcome.verdicts, vec![(1, Verdict::SettingsDrift)]);
        let directive = &outcome.directives[0];
        assert_eq!(directive.authenticator, "K1");
        assert_eq!(directive.suspend, Some(true));
    }

    #[test]
    fn test_weak_key_suppressed_for_old_client() {
        let outcome = run(
            &[attachment(10, 1)],
            &[project(1, P1_URL, true)],
            &[(1, "123_abc")],
            &[],
            "7.0.64",
        );
        assert!(outcome.directives.is_empty());
        assert!(outcome.deletions.is_empty());

        let outcome = run(
            &[attachment(10, 1)],
            &[project(1, P1_URL, true)],
            &[(1, "123_abc")],
            &[],
            "7.2.42",
        );
        assert_eq!(outcome.directives.len(), 1);
    }

    #[test]
    fn test_missing_project_row_is_skipped() {
        let outcome = run(&[attachment(10, 99)], &[], &[(99, "K")], &[], "7.16.3");

        assert!(outcome.directives.is_empty());
        assert!(outcome.deletions.is_empty());
        assert!(outcome.verdicts.is_empty());
    }

    #[test]
    fn test_exclusions_follow_client_dialect() {
        let mut att = attachment(10, 1);
        att.no_gpu_nvidia = true;
        att.no_gpu_intel = true;

        let modern = run(&[att.clone()], &[project(1, P1_URL, true)], &[(1, "K1")], &[], "7.16.3");
        assert_eq!(
            modern.directives[0].no_rsc,
            vec!["NVIDIA".to_string(), "intel_gpu".to_string()]
        );
        assert!(!modern.directives[0].no_cuda);

        let legacy = run(&[att], &[project(1, P1_URL, true)], &[(1, "K1")], &[], "6.12.0");
        assert!(legacy.directives[0].no_rsc.is_empty());
        assert!(legacy.directives[0].no_cuda);
    }

    #[test]
    fn test_output_order_is_deterministic() {
        let attachments = [attachment(3, 30), attachment(1, 10), attachment(2, 20)];
        let projects = [
            project(10, "https://a.example/", true),
            project(20, "https://b.example/", true),
            project(30, "https://c.example/", true),
        ];
        let keys = [(10, "A"), (20, "B"), (30, "C")];

        let first = run(&attachments, &projects, &keys, &[], "7.16.3");
        let second = run(&attachments, &projects, &keys, &[], "7.16.3");

        assert_eq!(first, second);
        let urls: Vec<&str> = first.directives.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.example/", "https://b.example/", "https://c.example/"]
        );
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url(" https://Example.org/ "), "https://example.org");
        assert_eq!(normalize_url("https://example.org//"), "https://example.org");
    }
}
