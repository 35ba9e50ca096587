#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use acctmgr::config::Config;
use acctmgr::db::{NewAttachment, NewComputer, NewProject};
use acctmgr::models::{Computer, Project, ProjectAttachment, User, UserRole};
use acctmgr::protocol::AccountManagerReply;
use acctmgr::security::hash_protocol_password;
use acctmgr::services::AuthService;
use acctmgr::state::SharedState;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use tower::ServiceExt;
use uuid::Uuid;

pub const AM_URL: &str = "https://am.example/";
pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub shared: Arc<SharedState>,
    path: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub fn test_config(database_path: &str) -> Config {
    let mut config = Config::default();
    config.general.database_path = database_path.to_string();
    config.account_manager.name = "Test AM".to_string();
    config.account_manager.url = AM_URL.to_string();
    config.account_manager.public_key = "test-public-key".to_string();
    config.account_manager.min_password_length = 8;
    config.security.master_encryption_key = "integration-master-key".to_string();
    config.security.kdf_iterations = 1_000;
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config
}

pub async fn spawn_app() -> TestApp {
    let path = std::env::temp_dir().join(format!("acctmgr-it-{}.db", Uuid::new_v4()));
    let config = test_config(&format!("sqlite:{}", path.display()));

    let shared = Arc::new(
        SharedState::new(config)
            .await
            .expect("Failed to create shared state"),
    );
    let router = acctmgr::api::router(acctmgr::api::create_app_state(shared.clone(), None));

    TestApp {
        router,
        shared,
        path,
    }
}

impl TestApp {
    pub async fn create_user(&self, username: &str) -> User {
        self.shared
            .auth_service
            .create_user(username, "user@example.com", PASSWORD, UserRole::User)
            .await
            .expect("Failed to create user")
    }

    pub async fn create_project(&self, name: &str, url: &str, enabled: bool) -> Project {
        self.shared
            .store
            .project_repo()
            .create(NewProject {
                name,
                url,
                signed_url: &format!("signature-of-{name}"),
                description: "",
                enabled,
            })
            .await
            .expect("Failed to create project")
    }

    pub async fn set_key(&self, user: &User, project: &Project, key: &str) {
        self.shared
            .store
            .project_key_repo()
            .upsert(user.id, project.id, key, &self.shared.cipher)
            .await
            .expect("Failed to store key");
    }

    pub async fn create_computer(&self, user: &User, cpid: &str) -> Computer {
        self.shared
            .store
            .computer_repo()
            .create(NewComputer {
                user_id: user.id,
                cpid,
                previous_cpid: None,
                hostname: "seeded-host",
            })
            .await
            .expect("Failed to create computer")
    }

    pub async fn attach(&self, computer: &Computer, project: &Project) -> ProjectAttachment {
        self.attach_with(NewAttachment::new(computer.id, project.id))
            .await
    }

    pub async fn attach_with(&self, new: NewAttachment) -> ProjectAttachment {
        self.shared
            .store
            .attachment_repo()
            .create(new)
            .await
            .expect("Failed to create attachment")
    }

    pub async fn attachments(&self, computer: &Computer) -> Vec<ProjectAttachment> {
        self.shared
            .store
            .attachment_repo()
            .list_for_computer(computer.id)
            .await
            .unwrap()
    }

    pub async fn post_rpc(&self, body: String) -> (StatusCode, AccountManagerReply) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/boinc/rpc.php")
                    .header(header::CONTENT_TYPE, "application/xml")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/xml"
        );

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let reply = quick_xml::de::from_str(&text)
            .unwrap_or_else(|e| panic!("Reply did not decode ({e}):\n{text}"));

        (status, reply)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }
}

/// Builder for `<acct_mgr_request>` bodies.
pub struct RpcRequest {
    pub username: String,
    pub password_hash: String,
    pub cpid: String,
    pub previous_cpid: Option<String>,
    pub client_version: String,
    pub opaque_uuid: Option<String>,
    pub projects: Vec<String>,
}

impl RpcRequest {
    pub fn new(username: &str, cpid: &str) -> Self {
        Self {
            username: username.to_string(),
            password_hash: hash_protocol_password(username, PASSWORD),
            cpid: cpid.to_string(),
            previous_cpid: None,
            client_version: "7.24.1".to_string(),
            opaque_uuid: None,
            projects: Vec::new(),
        }
    }

    pub fn version(mut self, version: &str) -> Self {
        self.client_version = version.to_string();
        self
    }

    pub fn password_hash(mut self, hash: &str) -> Self {
        self.password_hash = hash.to_string();
        self
    }

    pub fn previous_cpid(mut self, cpid: &str) -> Self {
        self.previous_cpid = Some(cpid.to_string());
        self
    }

    pub fn opaque(mut self, uuid: &str) -> Self {
        self.opaque_uuid = Some(uuid.to_string());
        self
    }

    /// Adds a project the client reports as attached.
    pub fn reporting(mut self, url: &str, account_key: &str) -> Self {
        self.projects.push(format!(
            "<project>\n<url>{url}</url>\n<project_name>Reported</project_name>\n\
             <suspended_via_gui>0</suspended_via_gui>\n<account_key>{account_key}</account_key>\n\
             <hostid>42</hostid>\n<attached_via_acct_mgr/>\n\
             <resource_share>100.000000</resource_share>\n</project>"
        ));
        self
    }

    pub fn build(&self) -> String {
        let previous = self
            .previous_cpid
            .as_ref()
            .map(|cpid| format!("<previous_host_cpid>{cpid}</previous_host_cpid>"))
            .unwrap_or_default();
        let opaque = self
            .opaque_uuid
            .as_ref()
            .map(|uuid| format!("<opaque><uuid>{uuid}</uuid></opaque>"))
            .unwrap_or_default();

        format!(
            r#"<?xml version="1.0" encoding="UTF-8" ?>
<acct_mgr_request>
  <name>{name}</name>
  <password_hash>{hash}</password_hash>
  <host_cpid>{cpid}</host_cpid>
  {previous}
  <domain_name>test-host</domain_name>
  <client_version>{version}</client_version>
  <run_mode>auto</run_mode>
  <platform_name>x86_64-pc-linux-gnu</platform_name>
  {opaque}
  {projects}
  <host_info>
    <p_ncpus>8</p_ncpus>
    <os_name>Linux</os_name>
  </host_info>
</acct_mgr_request>
"#,
            name = self.username,
            hash = self.password_hash,
            cpid = self.cpid,
            version = self.client_version,
            projects = self.projects.join("\n"),
        )
    }
}
