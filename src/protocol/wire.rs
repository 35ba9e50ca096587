//! XML codec for the account-manager RPC.
//!
//! Decoding is lenient in the places real clients are sloppy (unknown
//! elements, empty flag elements, missing statistics blocks) and strict about
//! the identity fields every request must carry.

use quick_xml::Reader;
use quick_xml::events::Event;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::version::ResourceExclusion;

pub const REQUEST_ROOT: &str = "acct_mgr_request";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Failed to encode reply: {0}")]
    Encode(String),
}

/// Error numbers understood by the BOINC client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoincErrorCode {
    Internal,
    XmlParse,
    BadUserName,
    BadPassword,
}

impl BoincErrorCode {
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Internal => -1,
            Self::XmlParse => -112,
            Self::BadUserName => -188,
            Self::BadPassword => -206,
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename = "acct_mgr_request")]
pub struct AccountManagerRequest {
    pub name: String,
    pub password_hash: String,
    pub host_cpid: String,
    #[serde(default)]
    pub previous_host_cpid: Option<String>,
    pub domain_name: String,
    pub client_version: String,
    pub run_mode: String,
    pub platform_name: String,
    #[serde(default)]
    pub opaque: Option<Opaque>,
    #[serde(default, rename = "project")]
    pub projects: Vec<ClientProject>,
    #[serde(default)]
    pub host_info: Option<HostInfo>,
    #[serde(default)]
    pub time_stats: Option<TimeStats>,
    #[serde(default)]
    pub net_stats: Option<NetStats>,
}

impl AccountManagerRequest {
    /// The computer UUID echoed back from a previous reply, if it is usable.
    #[must_use]
    pub fn opaque_uuid(&self) -> Option<uuid::Uuid> {
        self.opaque
            .as_ref()
            .and_then(|o| o.uuid.as_deref())
            .and_then(|raw| uuid::Uuid::parse_str(raw.trim()).ok())
    }

    /// The previous CPID, ignoring the empty element some clients send.
    #[must_use]
    pub fn previous_cpid(&self) -> Option<&str> {
        self.previous_host_cpid
            .as_deref()
            .map(str::trim)
            .filter(|cpid| !cpid.is_empty())
    }
}

/// Opaque block the client stores and echoes back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opaque {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

/// A project the client currently has attached, as it reports it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClientProject {
    pub url: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default, with = "flag")]
    pub suspended_via_gui: bool,
    #[serde(default)]
    pub hostid: Option<i64>,
    #[serde(default, with = "opt_decimal")]
    pub not_started_dur: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub in_progress_dur: Option<Decimal>,
    #[serde(default, with = "flag")]
    pub attached_via_acct_mgr: bool,
    #[serde(default, with = "flag")]
    pub dont_request_more_work: bool,
    #[serde(default, with = "flag")]
    pub detach_when_done: bool,
    #[serde(default, with = "flag")]
    pub ended: bool,
    #[serde(default, with = "opt_decimal")]
    pub resource_share: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub disk_usage: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub disk_share: Option<Decimal>,
    #[serde(default)]
    pub account_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HostInfo {
    #[serde(default)]
    pub timezone: Option<i64>,
    #[serde(default)]
    pub domain_name: Option<String>,
    #[serde(default)]
    pub ip_addr: Option<String>,
    #[serde(default)]
    pub host_cpid: Option<String>,
    #[serde(default)]
    pub p_ncpus: Option<i64>,
    #[serde(default)]
    pub p_vendor: Option<String>,
    #[serde(default)]
    pub p_model: Option<String>,
    #[serde(default)]
    pub p_features: Option<String>,
    #[serde(default, with = "opt_decimal")]
    pub p_fpops: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub p_iops: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub p_membw: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub p_calculated: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub m_nbytes: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub m_cache: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub m_swap: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub d_total: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub d_free: Option<Decimal>,
    #[serde(default)]
    pub os_name: Option<String>,
    #[serde(default)]
    pub os_version: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TimeStats {
    #[serde(default, with = "opt_decimal")]
    pub on_frac: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub connected_frac: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub cpu_and_network_available_frac: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub active_frac: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub gpu_active_frac: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub client_start_time: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub previous_uptime: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub session_active_duration: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub session_gpu_active_duration: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NetStats {
    #[serde(default, with = "opt_decimal")]
    pub bwup: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub avg_up: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub avg_time_up: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub bwdown: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub avg_down: Option<Decimal>,
    #[serde(default, with = "opt_decimal")]
    pub avg_time_down: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "acct_mgr_reply")]
pub struct AccountManagerReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_num: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_msg: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub signing_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_sec: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque: Option<Opaque>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_preferences: Option<GlobalPreferences>,
    #[serde(default, rename = "account")]
    pub accounts: Vec<AccountDirective>,
}

impl AccountManagerReply {
    #[must_use]
    pub fn new(name: impl Into<String>, signing_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_key: signing_key.into(),
            ..Self::default()
        }
    }

    /// A reply carrying only the manager identity and an error.
    #[must_use]
    pub fn failure(
        name: impl Into<String>,
        signing_key: impl Into<String>,
        code: BoincErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error_num: Some(code.code()),
            error_msg: Some(message.into()),
            ..Self::new(name, signing_key)
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.error_num.is_some_and(|code| code != 0)
    }
}

/// One `<account>` element: an instruction about a single project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDirective {
    pub url: String,
    #[serde(default)]
    pub url_signature: String,
    #[serde(default)]
    pub authenticator: String,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub detach: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_decimal")]
    pub resource_share: Option<Decimal>,
    // The client only touches these three when the element is present, so
    // attach directives carry an explicit value and detach directives none.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_flag")]
    pub suspend: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_flag")]
    pub dont_request_more_work: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_flag")]
    pub detach_when_done: Option<bool>,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub no_cpu: bool,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub no_cuda: bool,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub no_ati: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_rsc: Vec<String>,
}

impl AccountDirective {
    /// Tells the client to drop the project immediately.
    #[must_use]
    pub fn detach(url: impl Into<String>, url_signature: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            url_signature: url_signature.into(),
            detach: true,
            ..Self::default()
        }
    }

    pub fn apply_exclusion(&mut self, exclusion: ResourceExclusion) {
        match exclusion {
            ResourceExclusion::Named(names) => {
                self.no_cpu = false;
                self.no_cuda = false;
                self.no_ati = false;
                self.no_rsc = names;
            }
            ResourceExclusion::Legacy {
                no_cpu,
                no_cuda,
                no_ati,
            } => {
                self.no_cpu = no_cpu;
                self.no_cuda = no_cuda;
                self.no_ati = no_ati;
                self.no_rsc.clear();
            }
        }
    }
}

/// `<global_preferences>` block. Every knob is always written so the client
/// never falls back to its own defaults for a value the manager owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_project: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", with = "opt_decimal")]
    pub mod_time: Option<Decimal>,
    #[serde(with = "decimal")]
    pub battery_charge_min_pct: Decimal,
    #[serde(with = "decimal")]
    pub battery_max_temperature: Decimal,
    #[serde(with = "flag")]
    pub run_on_batteries: bool,
    #[serde(with = "flag")]
    pub run_if_user_active: bool,
    #[serde(with = "flag")]
    pub run_gpu_if_user_active: bool,
    #[serde(with = "decimal")]
    pub suspend_if_no_recent_input: Decimal,
    #[serde(with = "decimal")]
    pub idle_time_to_run: Decimal,
    #[serde(with = "decimal")]
    pub start_hour: Decimal,
    #[serde(with = "decimal")]
    pub end_hour: Decimal,
    #[serde(with = "decimal")]
    pub net_start_hour: Decimal,
    #[serde(with = "decimal")]
    pub net_end_hour: Decimal,
    #[serde(with = "flag")]
    pub leave_apps_in_memory: bool,
    #[serde(with = "decimal")]
    pub max_ncpus_pct: Decimal,
    #[serde(with = "decimal")]
    pub niu_max_ncpus_pct: Decimal,
    #[serde(with = "decimal")]
    pub cpu_usage_limit: Decimal,
    #[serde(with = "decimal")]
    pub niu_cpu_usage_limit: Decimal,
    #[serde(with = "decimal")]
    pub suspend_cpu_usage: Decimal,
    #[serde(with = "decimal")]
    pub niu_suspend_cpu_usage: Decimal,
    #[serde(with = "decimal")]
    pub cpu_scheduling_period_minutes: Decimal,
    pub max_cpus: i32,
    #[serde(with = "decimal")]
    pub work_buf_min_days: Decimal,
    #[serde(with = "decimal")]
    pub work_buf_additional_days: Decimal,
    #[serde(with = "decimal")]
    pub disk_interval: Decimal,
    #[serde(with = "decimal")]
    pub disk_max_used_gb: Decimal,
    #[serde(with = "decimal")]
    pub disk_max_used_pct: Decimal,
    #[serde(with = "decimal")]
    pub disk_min_free_gb: Decimal,
    #[serde(with = "decimal")]
    pub vm_max_used_pct: Decimal,
    #[serde(with = "decimal")]
    pub ram_max_used_busy_pct: Decimal,
    #[serde(with = "decimal")]
    pub ram_max_used_idle_pct: Decimal,
    #[serde(with = "flag")]
    pub confirm_before_connecting: bool,
    #[serde(with = "flag")]
    pub hangup_if_dialed: bool,
    #[serde(with = "decimal")]
    pub max_bytes_sec_up: Decimal,
    #[serde(with = "decimal")]
    pub max_bytes_sec_down: Decimal,
    #[serde(with = "decimal")]
    pub daily_xfer_limit_mb: Decimal,
    pub daily_xfer_period_days: i32,
    #[serde(with = "flag")]
    pub network_wifi_only: bool,
    #[serde(with = "flag")]
    pub dont_verify_images: bool,
}

/// Answer to `get_project_config.php`, identifying this server as an
/// account manager.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "project_config")]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub account_manager: bool,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub client_account_creation_disabled: bool,
    #[serde(default)]
    pub min_passwd_length: u32,
    #[serde(default, skip_serializing_if = "is_false", with = "flag")]
    pub uses_username: bool,
}

impl ProjectConfig {
    #[must_use]
    pub fn account_manager(name: impl Into<String>, min_passwd_length: u32) -> Self {
        Self {
            name: name.into(),
            account_manager: true,
            client_account_creation_disabled: true,
            min_passwd_length,
            uses_username: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Decodes an `<acct_mgr_request>` document.
pub fn decode_request(body: &[u8]) -> Result<AccountManagerRequest, WireError> {
    let text = std::str::from_utf8(body)
        .map_err(|e| WireError::Malformed(format!("body is not UTF-8: {e}")))?;

    let root = root_element(text)?;
    if root != REQUEST_ROOT {
        return Err(WireError::Malformed(format!(
            "expected <{REQUEST_ROOT}>, found <{root}>"
        )));
    }

    quick_xml::de::from_str(text).map_err(|e| WireError::Malformed(e.to_string()))
}

pub fn encode_reply(reply: &AccountManagerReply) -> Result<String, WireError> {
    encode_document(reply)
}

pub fn encode_project_config(config: &ProjectConfig) -> Result<String, WireError> {
    encode_document(config)
}

fn encode_document<T: Serialize>(document: &T) -> Result<String, WireError> {
    let mut body = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");

    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    serializer.expand_empty_elements(true);

    document
        .serialize(serializer)
        .map_err(|e| WireError::Encode(e.to_string()))?;

    body.push('\n');
    Ok(body)
}

fn root_element(text: &str) -> Result<String, WireError> {
    let mut reader = Reader::from_str(text);

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(WireError::Malformed("document has no root element".into()));
            }
            Ok(_) => {}
            Err(e) => return Err(WireError::Malformed(e.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Scalar encodings
// ---------------------------------------------------------------------------

/// Decimals go on the wire with six fractional digits.
#[must_use]
pub fn format_decimal(value: &Decimal) -> String {
    format!("{value:.6}")
}

pub fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| format!("invalid decimal '{trimmed}'"))
}

/// Flag semantics: an empty element means set, otherwise the text is an
/// integer where non-zero means set.
pub fn parse_flag(raw: &str) -> Result<bool, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(true);
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value != 0);
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("invalid flag '{trimmed}'")),
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

mod flag {
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_flag(&raw).map_err(de::Error::custom)
    }
}

mod opt_flag {
    use serde::{Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(value: &Option<bool>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(set) => super::flag::serialize(set, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<bool>, D::Error> {
        super::flag::deserialize(deserializer).map(Some)
    }
}

mod decimal {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_decimal(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_decimal(&raw).map_err(de::Error::custom)
    }
}

mod opt_decimal {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serializer, de};

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => super::decimal::serialize(value, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw.trim().is_empty() {
            return Ok(None);
        }
        super::parse_decimal(&raw).map(Some).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODERN_REQUEST: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<acct_mgr_request>
   <name>alice</name>
   <password_hash>0123456789abcdef0123456789abcdef</password_hash>
   <host_cpid>cpid-1</host_cpid>
   <previous_host_cpid></previous_host_cpid>
   <domain_name>workstation</domain_name>
   <client_version>7.24.1</client_version>
   <run_mode>auto</run_mode>
   <platform_name>x86_64-pc-linux-gnu</platform_name>
   <opaque>
      <uuid>6f1a3f0e-9a55-4a5c-8a49-0b7c5c3d9b11</uuid>
   </opaque>
   <working_global_preferences>
      <global_preferences><run_on_batteries>0</run_on_batteries></global_preferences>
   </working_global_preferences>
   <project>
      <url>https://einstein.phys.uwm.edu/</url>
      <project_name>Einstein@Home</project_name>
      <suspended_via_gui/>
      <hostid>12345</hostid>
      <attached_via_acct_mgr/>
      <dont_request_more_work>0</dont_request_more_work>
      <resource_share>100.000000</resource_share>
      <disk_usage>1.5e9</disk_usage>
      <account_key>abc123</account_key>
   </project>
   <host_info>
      <p_ncpus>8</p_ncpus>
      <p_fpops>4.2e9</p_fpops>
      <os_name>Linux</os_name>
      <coprocs><coproc_cuda><count>1</count></coproc_cuda></coprocs>
   </host_info>
   <project>
      <url>https://www.worldcommunitygrid.org</url>
      <project_name>WCG</project_name>
   </project>
   <time_stats><on_frac>0.98</on_frac></time_stats>
</acct_mgr_request>
"#;

    #[test]
    fn test_decode_full_request() {
        let request = decode_request(MODERN_REQUEST.as_bytes()).unwrap();

        assert_eq!(request.name, "alice");
        assert_eq!(request.host_cpid, "cpid-1");
        assert_eq!(request.previous_cpid(), None);
        assert_eq!(request.domain_name, "workstation");
        assert_eq!(request.client_version, "7.24.1");
        assert_eq!(
            request.opaque_uuid().map(|u| u.to_string()),
            Some("6f1a3f0e-9a55-4a5c-8a49-0b7c5c3d9b11".to_string())
        );

        assert_eq!(request.projects.len(), 2);
        let einstein = &request.projects[0];
        assert!(einstein.suspended_via_gui);
        assert!(einstein.attached_via_acct_mgr);
        assert!(!einstein.dont_request_more_work);
        assert!(!einstein.detach_when_done);
        assert_eq!(einstein.hostid, Some(12345));
        assert_eq!(einstein.resource_share, Some(Decimal::from(100)));
        assert_eq!(einstein.disk_usage, Some(Decimal::from(1_500_000_000_i64)));
        assert_eq!(einstein.account_key.as_deref(), Some("abc123"));

        let wcg = &request.projects[1];
        assert!(!wcg.suspended_via_gui);
        assert_eq!(wcg.resource_share, None);
        assert_eq!(wcg.account_key, None);

        let host = request.host_info.unwrap();
        assert_eq!(host.p_ncpus, Some(8));
        assert_eq!(host.os_name.as_deref(), Some("Linux"));
        assert!(request.time_stats.is_some());
        assert!(request.net_stats.is_none());
    }

    #[test]
    fn test_decode_rejects_missing_required_field() {
        let body = "<acct_mgr_request><name>alice</name></acct_mgr_request>";
        assert!(matches!(
            decode_request(body.as_bytes()),
            Err(WireError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_wrong_root_and_garbage() {
        let wrong_root = MODERN_REQUEST.replace("acct_mgr_request", "acct_mgr_reply");
        assert!(matches!(
            decode_request(wrong_root.as_bytes()),
            Err(WireError::Malformed(_))
        ));
        assert!(decode_request(b"this is not xml").is_err());
        assert!(decode_request(b"").is_err());
        assert!(decode_request(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag(""), Ok(true));
        assert_eq!(parse_flag("1"), Ok(true));
        assert_eq!(parse_flag(" 2 "), Ok(true));
        assert_eq!(parse_flag("0"), Ok(false));
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_decimal_formatting() {
        assert_eq!(format_decimal(&Decimal::from(100)), "100.000000");
        assert_eq!(format_decimal(&Decimal::new(25, 2)), "0.250000");
        assert_eq!(parse_decimal("1e3"), Ok(Decimal::from(1000)));
        assert!(parse_decimal("lots").is_err());
    }

    #[test]
    fn test_encode_reply_omits_false_flags() {
        let mut attach = AccountDirective {
            url: "https://einstein.phys.uwm.edu/".into(),
            url_signature: "sig".into(),
            authenticator: "key".into(),
            resource_share: Some(Decimal::from(50)),
            suspend: Some(false),
            dont_request_more_work: Some(true),
            detach_when_done: Some(false),
            ..AccountDirective::default()
        };
        attach.apply_exclusion(ResourceExclusion::Named(vec!["NVIDIA".into()]));

        let mut reply = AccountManagerReply::new("Test AM", "KEY");
        reply.repeat_sec = Some(3600);
        reply.accounts = vec![
            attach,
            AccountDirective::detach("https://old.example/", "old-sig"),
        ];

        let xml = encode_reply(&reply).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<acct_mgr_reply>"));
        assert!(xml.contains("<repeat_sec>3600</repeat_sec>"));
        assert!(xml.contains("<resource_share>50.000000</resource_share>"));
        assert!(xml.contains("<suspend>0</suspend>"));
        assert!(xml.contains("<dont_request_more_work>1</dont_request_more_work>"));
        assert!(xml.contains("<no_rsc>NVIDIA</no_rsc>"));
        assert!(xml.contains("<detach>1</detach>"));
        assert!(!xml.contains("<no_cpu>"));
        assert!(!xml.contains("<error_num>"));
        assert_eq!(xml.matches("<account>").count(), 2);
        assert_eq!(xml.matches("<detach>").count(), 1);
    }

    #[test]
    fn test_reply_decodes_back() {
        let mut reply = AccountManagerReply::failure("AM", "KEY", BoincErrorCode::BadPassword, "nope");
        reply.opaque = Some(Opaque {
            uuid: Some("abc".into()),
        });

        let xml = encode_reply(&reply).unwrap();
        let decoded: AccountManagerReply = quick_xml::de::from_str(&xml).unwrap();

        assert_eq!(decoded.error_num, Some(-206));
        assert_eq!(decoded.error_msg.as_deref(), Some("nope"));
        assert_eq!(decoded.opaque, reply.opaque);
        assert!(decoded.is_error());
        assert!(decoded.accounts.is_empty());
    }

    #[test]
    fn test_project_config_document() {
        let xml = encode_project_config(&ProjectConfig::account_manager("BoincHub", 16)).unwrap();

        assert!(xml.contains("<project_config>"));
        assert!(xml.contains("<name>BoincHub</name>"));
        assert!(xml.contains("<account_manager>1</account_manager>"));
        assert!(xml.contains("<min_passwd_length>16</min_passwd_length>"));
        assert!(xml.contains("<uses_username>1</uses_username>"));
    }
}
