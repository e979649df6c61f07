//! TOML configuration file schema and parsing.
//!
//! Example config file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8080"
//! log_format = "json"
//!
//! [probe]
//! timeout_ms = 10000
//! metadata_bytes = 65536
//! extensions = [".mp4"]
//!
//! [list]
//! store_path = "/var/lib/vidlink/store.json"
//! recheck_interval_ms = 30000
//! seed_url = "https://cdn.example.com/promo.mp4"
//! indicator_hide_ms = 3000
//!
//! [[webhook]]
//! url = "https://hooks.example.com/video-alerts"
//! events = ["went_offline"]
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use vidlink_core::{validate, LinkConfig, WebhookConfig, DEFAULT_SEED_URL};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub list: ListConfig,

    #[serde(default)]
    pub webhook: Vec<WebhookConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_format: default_log_format(),
        }
    }
}

pub fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_log_format() -> String {
    "pretty".into()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_metadata_bytes")]
    pub metadata_bytes: u64,

    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            metadata_bytes: default_metadata_bytes(),
            extensions: default_extensions(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_metadata_bytes() -> u64 {
    64 * 1024
}

fn default_extensions() -> Vec<String> {
    vec![".mp4".into()]
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default = "default_recheck_interval_ms")]
    pub recheck_interval_ms: u64,

    /// Used when nothing is stored yet. An empty string disables seeding.
    #[serde(default = "default_seed_url")]
    pub seed_url: String,

    /// 0 keeps the indicator visible until the next update.
    #[serde(default = "default_indicator_hide_ms")]
    pub indicator_hide_ms: u64,

    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

impl Default for ListConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            recheck_interval_ms: default_recheck_interval_ms(),
            seed_url: default_seed_url(),
            indicator_hide_ms: default_indicator_hide_ms(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

pub fn default_store_path() -> PathBuf {
    PathBuf::from("vidlink-store.json")
}

fn default_recheck_interval_ms() -> u64 {
    30_000
}

fn default_seed_url() -> String {
    DEFAULT_SEED_URL.into()
}

fn default_indicator_hide_ms() -> u64 {
    3000
}

fn default_max_concurrent_probes() -> usize {
    4
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {}", path.display(), e))?;

        let config: AppConfig = toml::from_str(&content)
            .map_err(|e| format!("Failed to parse config file {}: {}", path.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    pub fn to_link_config(&self) -> LinkConfig {
        let seed = Some(self.list.seed_url.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let hide = Some(self.list.indicator_hide_ms).filter(|ms| *ms > 0);

        LinkConfig::default()
            .with_probe_timeout(self.probe.timeout_ms)
            .with_metadata_bytes(self.probe.metadata_bytes)
            .with_accepted_extensions(self.probe.extensions.iter().cloned())
            .with_recheck_interval(self.list.recheck_interval_ms)
            .with_seed_url(seed)
            .with_indicator_hide_delay(hide)
            .with_max_concurrent_probes(self.list.max_concurrent_probes)
    }

    fn validate(&self) -> Result<(), String> {
        for (i, wh) in self.webhook.iter().enumerate() {
            url::Url::parse(&wh.url)
                .map_err(|e| format!("Invalid webhook URL at index {}: {} ({})", i, wh.url, e))?;
        }

        if self.probe.timeout_ms == 0 {
            return Err("probe.timeout_ms must be greater than 0".into());
        }
        if self.probe.metadata_bytes == 0 {
            return Err("probe.metadata_bytes must be greater than 0".into());
        }
        if self.probe.extensions.is_empty() {
            return Err("probe.extensions must not be empty".into());
        }
        if let Some(ext) = self
            .probe
            .extensions
            .iter()
            .find(|e| e.trim_start_matches('.').trim().is_empty())
        {
            return Err(format!("Invalid extension '{}'", ext));
        }
        if self.list.recheck_interval_ms == 0 {
            return Err("list.recheck_interval_ms must be greater than 0".into());
        }
        if self.list.max_concurrent_probes == 0 {
            return Err("list.max_concurrent_probes must be greater than 0".into());
        }

        let seed = self.list.seed_url.trim();
        if !seed.is_empty() {
            validate(seed, &self.to_link_config().accepted_extensions)
                .map_err(|e| format!("Invalid list.seed_url {}: {}", seed, e))?;
        }

        match self.server.log_format.as_str() {
            "pretty" | "json" => {}
            other => {
                return Err(format!(
                    "Invalid log_format '{}': must be 'pretty' or 'json'",
                    other
                ));
            }
        }

        Ok(())
    }
}
