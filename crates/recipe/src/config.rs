use crate::error::{RecipeError, Result};
use crate::registry::{RetryPolicy, DEFAULT_AGENT_URL};
use crate::service::SERVICE_NAME;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/rb-reputation/provisioner.toml";

/// Provisioning attributes for the managed service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    pub service_name: String,
    /// Memory assigned to the service, in megabytes
    pub memory: u32,
    pub log_dir: PathBuf,
    pub config_dir: PathBuf,
    pub aerospike_ips: Vec<String>,
    pub user: String,
    pub group: String,
    /// Pin the package to this version instead of the latest available
    pub package_version: Option<String>,
    pub state_file: PathBuf,
    pub agent: AgentConfig,
    pub host: HostOverrides,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            service_name: SERVICE_NAME.to_string(),
            memory: 1024,
            log_dir: PathBuf::from("/var/log/rb-reputation"),
            config_dir: PathBuf::from("/etc/rb-reputation"),
            aerospike_ips: vec!["127.0.0.1".to_string()],
            user: SERVICE_NAME.to_string(),
            group: SERVICE_NAME.to_string(),
            package_version: None,
            state_file: PathBuf::from("/var/lib/rb-reputation/registration.json"),
            agent: AgentConfig::default(),
            host: HostOverrides::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_AGENT_URL.to_string(),
            timeout_secs: 10,
            retry_attempts: 1,
            retry_delay_secs: 2,
        }
    }
}

impl AgentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_attempts.max(1),
            delay: Duration::from_secs(self.retry_delay_secs),
        }
    }
}

/// Values that replace the discovered host facts when set
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostOverrides {
    pub hostname: Option<String>,
    pub ipaddress: Option<String>,
}

impl RecipeConfig {
    /// Load a TOML config file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| RecipeError::io(path, e))?;
        let config: RecipeConfig = toml::from_str(&raw)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load `path` when given, otherwise the default location if it exists,
    /// otherwise the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::load(default_path)
                } else {
                    debug!("No config file at {}, using defaults", DEFAULT_CONFIG_PATH);
                    Ok(Self::default())
                }
            }
        }
    }

    /// Apply environment overrides (`CONSUL_HTTP_ADDR`)
    pub fn apply_env(&mut self) {
        if let Ok(addr) = env::var("CONSUL_HTTP_ADDR") {
            if !addr.trim().is_empty() {
                self.agent.url = normalize_agent_url(&addr);
                debug!("Agent url taken from CONSUL_HTTP_ADDR: {}", self.agent.url);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(RecipeError::InvalidConfig("service_name is empty".to_string()));
        }
        if self.memory == 0 {
            return Err(RecipeError::InvalidConfig("memory must be greater than zero".to_string()));
        }
        if self.user.trim().is_empty() || self.group.trim().is_empty() {
            return Err(RecipeError::InvalidConfig("user and group must be set".to_string()));
        }
        if self.aerospike_ips.is_empty() {
            return Err(RecipeError::InvalidConfig("aerospike_ips is empty".to_string()));
        }
        if let Some(ip) = self.aerospike_ips.iter().find(|ip| ip.trim().is_empty()) {
            return Err(RecipeError::InvalidConfig(format!("invalid aerospike ip {:?}", ip)));
        }
        Ok(())
    }
}

/// `CONSUL_HTTP_ADDR` is commonly given as `host:port` without a scheme
pub fn normalize_agent_url(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("http://{}", addr)
    }
}
