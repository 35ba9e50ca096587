use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variables that override values from `config.toml`.
pub const ENV_DATABASE_URL: &str = "ACCTMGR_DATABASE_URL";
pub const ENV_MASTER_ENCRYPTION_KEY: &str = "ACCTMGR_MASTER_ENCRYPTION_KEY";
pub const ENV_ENCRYPTION_SALT: &str = "ACCTMGR_ENCRYPTION_SALT";
pub const ENV_PUBLIC_KEY: &str = "ACCTMGR_PUBLIC_KEY";
pub const ENV_URL: &str = "ACCTMGR_URL";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    pub server: ServerConfig,

    pub account_manager: AccountManagerConfig,

    pub security: SecurityConfig,

    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub database_path: String,

    pub log_level: String,

    /// `pretty` for human-readable output, `json` for structured logs.
    pub log_format: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    pub max_db_connections: u32,

    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_path: "sqlite:data/acctmgr.db".to_string(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub enabled: bool,

    pub bind_address: String,

    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0".to_string(),
            port: 8500,
        }
    }
}

/// Identity this server presents to BOINC clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountManagerConfig {
    pub name: String,

    /// Public URL clients use to reach the manager. Also sent as the
    /// `source_project` of distributed preferences.
    pub url: String,

    /// Public half of the key used to sign project URLs.
    pub public_key: String,

    /// How often clients should poll, in seconds.
    pub repeat_sec: u64,

    pub min_password_length: u32,
}

impl Default for AccountManagerConfig {
    fn default() -> Self {
        Self {
            name: "BoincHub".to_string(),
            url: "http://localhost:8500".to_string(),
            public_key: "INVALID SIGNING KEY".to_string(),
            repeat_sec: 3600,
            min_password_length: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Argon2 memory cost in KiB (default: 8192 = 8MB)
    pub argon2_memory_cost_kib: u32,

    /// Argon2 time cost (iterations)
    pub argon2_time_cost: u32,

    pub argon2_parallelism: u32,

    /// Secret the account-key encryption key is derived from. Required.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub master_encryption_key: String,

    pub encryption_salt: String,

    /// PBKDF2 rounds for deriving the account-key encryption key.
    pub kdf_iterations: u32,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            argon2_memory_cost_kib: 8192,
            argon2_time_cost: 3,
            argon2_parallelism: 1,
            master_encryption_key: String::new(),
            encryption_salt: "acctmgr-account-keys".to_string(),
            kdf_iterations: 100_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,

    pub loki_enabled: bool,

    pub loki_url: String,

    pub loki_labels: std::collections::HashMap<String, String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        let mut labels = std::collections::HashMap::new();
        labels.insert("app".to_string(), "acctmgr".to_string());

        Self {
            metrics_enabled: true,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
            loki_labels: labels,
        }
    }
}

impl Config {
    /// Loads the first config file found, then applies environment overrides.
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                let mut config = Self::load_from_path(path)?;
                config.apply_env_overrides();
                return Ok(config);
            }
        }

        info!("No config file found, using defaults");
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Config saved to: {}", path.display());
        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.general.database_path = url;
        }
        if let Some(key) = lookup(ENV_MASTER_ENCRYPTION_KEY) {
            self.security.master_encryption_key = key;
        }
        if let Some(salt) = lookup(ENV_ENCRYPTION_SALT) {
            self.security.encryption_salt = salt;
        }
        if let Some(public_key) = lookup(ENV_PUBLIC_KEY) {
            self.account_manager.public_key = public_key;
        }
        if let Some(url) = lookup(ENV_URL) {
            self.account_manager.url = url;
        }
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("acctmgr").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".acctmgr").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            Ok(false)
        } else {
            let config = Self::default();
            config.save_to_path(&path)?;
            info!("Created default config file: {}", path.display());
            Ok(true)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.security.master_encryption_key.trim().is_empty() {
            anyhow::bail!(
                "security.master_encryption_key must be set (or {ENV_MASTER_ENCRYPTION_KEY})"
            );
        }

        if self.security.encryption_salt.is_empty() {
            anyhow::bail!("security.encryption_salt cannot be empty");
        }

        if self.security.kdf_iterations == 0 {
            anyhow::bail!("security.kdf_iterations must be > 0");
        }

        if self.account_manager.name.trim().is_empty() {
            anyhow::bail!("account_manager.name cannot be empty");
        }

        url::Url::parse(&self.account_manager.url)
            .with_context(|| format!("Invalid account_manager.url: {}", self.account_manager.url))?;

        if self.account_manager.repeat_sec == 0 {
            anyhow::bail!("account_manager.repeat_sec must be > 0");
        }

        if !["pretty", "json"].contains(&self.general.log_format.as_str()) {
            anyhow::bail!(
                "general.log_format must be 'pretty' or 'json', got '{}'",
                self.general.log_format
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.account_manager.name, "BoincHub");
        assert_eq!(config.account_manager.repeat_sec, 3600);
        assert_eq!(config.account_manager.min_password_length, 16);
        assert_eq!(config.security.kdf_iterations, 100_000);
        assert_eq!(config.server.port, 8500);
    }

    #[test]
    fn test_default_config_requires_master_key() {
        let mut config = Config::default();
        assert!(config.validate().is_err());

        config.security.master_encryption_key = "secret".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization_hides_empty_master_key() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[account_manager]"));
        assert!(toml_str.contains("[security]"));
        assert!(!toml_str.contains("master_encryption_key"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [account_manager]
            name = "My AM"
            repeat_sec = 600
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.account_manager.name, "My AM");
        assert_eq!(config.account_manager.repeat_sec, 600);
        assert_eq!(config.account_manager.url, "http://localhost:8500");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_MASTER_ENCRYPTION_KEY, "from-env"),
            (ENV_DATABASE_URL, "sqlite:/tmp/am.db"),
            (ENV_PUBLIC_KEY, "   "),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|name| env.get(name).map(|v| (*v).to_string()));

        assert_eq!(config.security.master_encryption_key, "from-env");
        assert_eq!(config.general.database_path, "sqlite:/tmp/am.db");
        assert_eq!(config.account_manager.public_key, "INVALID SIGNING KEY");
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let mut config = Config::default();
        config.security.master_encryption_key = "secret".to_string();
        config.account_manager.url = "not a url".to_string();
        assert!(config.validate().is_err());
    }
}
