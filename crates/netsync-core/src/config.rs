//! netsync.toml configuration parser.
//!
//! Every component receives the pieces it needs from a [`NetsyncConfig`]
//! at construction time; nothing reads configuration ambiently.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::parse_duration;
use crate::error::{ConfigError, ConfigResult};
use crate::types::DeployableUnit;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetsyncConfig {
    pub realtime: RealtimeConfig,
    pub services: ServicesConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub restart: RestartConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub featured_networks: FeaturedNetworksConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Realtime websocket endpoint.
    pub url: String,
    pub anon_key: String,
    /// Postgres URL used for the initial reconciliation query.
    pub database_url: String,
    /// Monitored table.
    pub table: String,
    pub chain_id: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: String,
    #[serde(default = "default_query_timeout")]
    pub query_timeout: String,
}

impl RealtimeConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        parse_duration(&self.heartbeat_interval).unwrap_or(Duration::from_secs(30))
    }

    pub fn query_timeout(&self) -> Duration {
        parse_duration(&self.query_timeout).unwrap_or(Duration::from_secs(30))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitConfig {
    pub service: String,
    pub container: String,
}

impl UnitConfig {
    pub fn unit(&self) -> DeployableUnit {
        DeployableUnit::new(&self.service, &self.container)
    }
}

/// The proxy is optional and only restarted when both names are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub service: Option<String>,
    pub container: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub frontend: UnitConfig,
    pub backend: UnitConfig,
    pub stats: UnitConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl ServicesConfig {
    pub fn frontend(&self) -> DeployableUnit {
        self.frontend.unit()
    }

    pub fn backend(&self) -> DeployableUnit {
        self.backend.unit()
    }

    pub fn stats(&self) -> DeployableUnit {
        self.stats.unit()
    }

    /// The proxy unit, if both its service and container names are configured.
    pub fn proxy(&self) -> Option<DeployableUnit> {
        match (&self.proxy.service, &self.proxy.container) {
            (Some(service), Some(container)) if !service.is_empty() && !container.is_empty() => {
                Some(DeployableUnit::new(service, container))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Compose file holding the service definitions.
    pub compose_file: PathBuf,
    /// When set, environment updates go to this flat file instead of the
    /// compose file.
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Pause after a successful recreation before the next job.
    #[serde(default = "default_settle_delay")]
    pub settle_delay: String,
    /// Pause before the worker processes its first job.
    #[serde(default = "default_startup_delay")]
    pub startup_delay: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,
    pub project_name: Option<String>,
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            settle_delay: default_settle_delay(),
            startup_delay: default_startup_delay(),
            queue_capacity: default_queue_capacity(),
            docker_bin: default_docker_bin(),
            project_name: None,
        }
    }
}

impl RestartConfig {
    pub fn settle_delay(&self) -> Duration {
        parse_duration(&self.settle_delay).unwrap_or(Duration::from_secs(10))
    }

    pub fn startup_delay(&self) -> Duration {
        parse_duration(&self.startup_delay).unwrap_or(Duration::ZERO)
    }
}

/// Validation bounds for the monitored fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_max_coin_length")]
    pub max_coin_length: usize,
    #[serde(default = "default_max_name_length")]
    pub max_name_length: usize,
    #[serde(default = "default_max_image_url_length")]
    pub max_image_url_length: usize,
    #[serde(default = "default_max_explorer_url_length")]
    pub max_explorer_url_length: usize,
    /// HEAD-probe image URLs before applying them.
    #[serde(default = "default_true")]
    pub verify_images: bool,
    #[serde(default = "default_image_probe_timeout")]
    pub image_probe_timeout: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_coin_length: default_max_coin_length(),
            max_name_length: default_max_name_length(),
            max_image_url_length: default_max_image_url_length(),
            max_explorer_url_length: default_max_explorer_url_length(),
            verify_images: true,
            image_probe_timeout: default_image_probe_timeout(),
        }
    }
}

impl LimitsConfig {
    pub fn image_probe_timeout(&self) -> Duration {
        parse_duration(&self.image_probe_timeout).unwrap_or(Duration::from_secs(10))
    }
}

/// A fixed entry rendered ahead of the current network in the featured list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturedNetwork {
    pub title: String,
    pub url: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturedNetworksConfig {
    #[serde(default = "default_pinned_networks")]
    pub pinned: Vec<FeaturedNetwork>,
    /// Group the current network is listed under.
    #[serde(default = "default_group")]
    pub group: String,
}

impl Default for FeaturedNetworksConfig {
    fn default() -> Self {
        Self {
            pinned: default_pinned_networks(),
            group: default_group(),
        }
    }
}

impl NetsyncConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: NetsyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, at runtime.
    pub fn validate(&self) -> ConfigResult<()> {
        let durations = [
            ("realtime.heartbeat_interval", &self.realtime.heartbeat_interval),
            ("realtime.query_timeout", &self.realtime.query_timeout),
            ("restart.settle_delay", &self.restart.settle_delay),
            ("restart.startup_delay", &self.restart.startup_delay),
            ("limits.image_probe_timeout", &self.limits.image_probe_timeout),
        ];
        for (field, value) in durations {
            if parse_duration(value).is_none() {
                return Err(ConfigError::Invalid(format!("{field}: bad duration {value:?}")));
            }
        }

        if self.realtime.table.trim().is_empty() {
            return Err(ConfigError::Invalid("realtime.table is empty".to_string()));
        }
        if self.restart.queue_capacity == 0 {
            return Err(ConfigError::Invalid(
                "restart.queue_capacity must be positive".to_string(),
            ));
        }

        let units = [
            ("frontend", &self.services.frontend),
            ("backend", &self.services.backend),
            ("stats", &self.services.stats),
        ];
        for (name, unit) in units {
            if unit.service.is_empty() || unit.container.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "services.{name} needs both service and container"
                )));
            }
        }
        Ok(())
    }
}

fn default_heartbeat_interval() -> String {
    "30s".to_string()
}

fn default_query_timeout() -> String {
    "30s".to_string()
}

fn default_settle_delay() -> String {
    "10s".to_string()
}

fn default_startup_delay() -> String {
    "0s".to_string()
}

fn default_queue_capacity() -> usize {
    100
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_max_coin_length() -> usize {
    20
}

fn default_max_name_length() -> usize {
    40
}

fn default_max_image_url_length() -> usize {
    2000
}

fn default_max_explorer_url_length() -> usize {
    255
}

fn default_true() -> bool {
    true
}

fn default_image_probe_timeout() -> String {
    "10s".to_string()
}

fn default_group() -> String {
    "Mainnets".to_string()
}

fn default_pinned_networks() -> Vec<FeaturedNetwork> {
    vec![FeaturedNetwork {
        title: "Aurora".to_string(),
        url: "https://explorer.aurora.dev/".to_string(),
        group: "Mainnets".to_string(),
    }]
}
