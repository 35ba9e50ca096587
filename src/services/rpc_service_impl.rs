//! `SeaORM` implementation of the `RpcService` trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, TransactionTrait};
use tracing::{debug, info, warn};

use crate::config::AccountManagerConfig;
use crate::db::{AttachmentRepository, ProjectKeyRepository, ProjectRepository, Store};
use crate::models::{Computer, Project, User};
use crate::protocol::wire::{self, Opaque, ProjectConfig};
use crate::protocol::{
    AccountManagerReply, AccountManagerRequest, BoincErrorCode, ClientCapabilities,
    ReconcileInput, reconcile,
};
use crate::security::AccountKeyCipher;
use crate::services::auth_service::AuthService;
use crate::services::computer_registry;
use crate::services::preference_service_impl::resolve_for_computer;
use crate::services::rpc_service::{RpcError, RpcOutcome, RpcService, client_message};

pub struct SeaOrmRpcService {
    store: Store,
    cipher: Arc<AccountKeyCipher>,
    auth: Arc<dyn AuthService>,
    config: AccountManagerConfig,
}

impl SeaOrmRpcService {
    #[must_use]
    pub fn new(
        store: Store,
        cipher: Arc<AccountKeyCipher>,
        auth: Arc<dyn AuthService>,
        config: AccountManagerConfig,
    ) -> Self {
        Self {
            store,
            cipher,
            auth,
            config,
        }
    }

    fn error_reply(&self, err: &RpcError) -> RpcOutcome {
        let code = err.error_code();
        RpcOutcome {
            reply: AccountManagerReply::failure(
                &self.config.name,
                &self.config.public_key,
                code,
                client_message(code),
            ),
            error: Some(code),
        }
    }

    /// Loads everything the computer's reconciliation needs through `conn`
    /// and computes the reply.
    async fn build_reply<C>(
        &self,
        conn: &C,
        user: &User,
        computer: &Computer,
        request: &AccountManagerRequest,
    ) -> Result<(AccountManagerReply, Vec<i32>), RpcError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let group = resolve_for_computer(conn, computer).await?;

        let attachments = AttachmentRepository::new(conn)
            .list_for_computer(computer.id)
            .await?;

        let mut project_ids: Vec<i32> = attachments.iter().map(|a| a.project_id).collect();
        project_ids.sort_unstable();
        project_ids.dedup();

        let projects: HashMap<i32, Project> = ProjectRepository::new(conn)
            .get_by_ids(&project_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        // Keys of disabled projects are never sent, so they are not decrypted.
        let enabled_ids: Vec<i32> = project_ids
            .iter()
            .copied()
            .filter(|id| projects.get(id).is_some_and(|p| p.enabled))
            .collect();
        let account_keys = ProjectKeyRepository::new(conn)
            .decrypted_for_user(user.id, &enabled_ids, &self.cipher)
            .await?;

        let capabilities = ClientCapabilities::detect(&request.client_version);
        let outcome = reconcile(&ReconcileInput {
            attachments: &attachments,
            projects: &projects,
            account_keys: &account_keys,
            client_projects: &request.projects,
            capabilities,
        });

        for directive in &outcome.directives {
            let kind = if directive.detach { "detach" } else { "attach" };
            metrics::counter!("acctmgr_directives_total", "kind" => kind).increment(1);
        }

        let mut reply = AccountManagerReply::new(&self.config.name, &self.config.public_key);
        reply.repeat_sec = Some(self.config.repeat_sec);
        reply.opaque = Some(Opaque {
            uuid: Some(computer.uuid.to_string()),
        });
        reply.global_preferences = Some(
            group
                .settings
                .to_global_preferences(&self.config.url, group.mod_time()),
        );
        reply.accounts = outcome.directives;

        debug!(
            computer_id = computer.id,
            preference_group_id = group.id,
            client_version = %capabilities.version,
            directives = reply.accounts.len(),
            deletions = outcome.deletions.len(),
            "Reconciled computer"
        );

        Ok((reply, outcome.deletions))
    }
}

#[async_trait]
impl RpcService for SeaOrmRpcService {
    async fn handle(&self, body: &[u8]) -> RpcOutcome {
        let start = Instant::now();

        let result = match wire::decode_request(body) {
            Ok(request) => self.process(&request).await,
            Err(e) => Err(RpcError::from(e)),
        };

        let outcome = match result {
            Ok(reply) => {
                metrics::counter!("acctmgr_rpc_requests_total", "outcome" => "ok").increment(1);
                RpcOutcome { reply, error: None }
            }
            Err(e) => {
                if e.error_code() == BoincErrorCode::Internal {
                    warn!(error = %e, "Scheduler RPC failed");
                } else {
                    debug!(error = %e, outcome = e.outcome(), "Rejected scheduler RPC");
                }
                metrics::counter!("acctmgr_rpc_requests_total", "outcome" => e.outcome())
                    .increment(1);
                self.error_reply(&e)
            }
        };

        metrics::histogram!("acctmgr_rpc_duration_seconds").record(start.elapsed().as_secs_f64());

        outcome
    }

    async fn process(
        &self,
        request: &AccountManagerRequest,
    ) -> Result<AccountManagerReply, RpcError> {
        let user = self
            .auth
            .authenticate(&request.name, &request.password_hash)
            .await?;

        let _write_guard = self.store.write_guard().await;
        let txn = self.store.conn.begin().await?;

        let (computer, matched) =
            computer_registry::upsert_from_request(&txn, &user, request).await?;

        let (reply, deletions) = self.build_reply(&txn, &user, &computer, request).await?;

        if !deletions.is_empty() {
            let removed = AttachmentRepository::new(&txn)
                .delete_by_ids(&deletions)
                .await?;
            info!(
                computer_id = computer.id,
                removed, "Removed detached project attachments"
            );
        }

        txn.commit().await?;

        info!(
            user = %user.username,
            computer_id = computer.id,
            matched = matched.as_str(),
            platform = %request.platform_name,
            directives = reply.accounts.len(),
            "Processed scheduler RPC"
        );

        Ok(reply)
    }

    fn project_config(&self) -> ProjectConfig {
        ProjectConfig::account_manager(&self.config.name, self.config.min_password_length)
    }
}
