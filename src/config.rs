//! Top-level `proksi.toml` configuration: bind address, harvester config
//! directory, scorer target hosts, geolocator rate limit, and scheduler
//! sweep periods.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0:?}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file {0:?}: {1}")]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("failed to read harvester config directory {0:?}: {1}")]
    HarvesterDir(PathBuf, #[source] std::io::Error),
    #[error("failed to read harvester config {0:?}: {1}")]
    HarvesterRead(PathBuf, #[source] std::io::Error),
    #[error("failed to parse harvester config {0:?}: {1}")]
    HarvesterParse(PathBuf, #[source] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_harvester_dir")]
    pub harvester_dir: PathBuf,
    #[serde(default = "default_scorer_hosts")]
    pub scorer_hosts: Vec<String>,
    #[serde(default = "default_geolocation_url")]
    pub geolocation_url: String,
    #[serde(default = "default_geolocation_rate_per_minute")]
    pub geolocation_rate_per_minute: u32,
    #[serde(default = "default_anonymity_echo_url")]
    pub anonymity_echo_url: String,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_completion_sweep_secs")]
    pub completion_sweep_secs: u64,
    #[serde(default = "default_inspection_sweep_secs")]
    pub inspection_sweep_secs: u64,
    #[serde(default = "default_harvest_drive_secs")]
    pub harvest_drive_secs: u64,
    #[serde(default = "default_registry_size_threshold")]
    pub registry_size_threshold: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: default_probe_timeout_secs(),
            completion_sweep_secs: default_completion_sweep_secs(),
            inspection_sweep_secs: default_inspection_sweep_secs(),
            harvest_drive_secs: default_harvest_drive_secs(),
            registry_size_threshold: default_registry_size_threshold(),
        }
    }
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> proksi_scheduler::SchedulerConfig {
        proksi_scheduler::SchedulerConfig {
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            completion_sweep_period: Duration::from_secs(self.completion_sweep_secs),
            inspection_sweep_period: Duration::from_secs(self.inspection_sweep_secs),
            harvest_drive_period: Duration::from_secs(self.harvest_drive_secs),
            registry_size_threshold: self.registry_size_threshold,
        }
    }
}

fn default_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8081
}

fn default_harvester_dir() -> PathBuf {
    PathBuf::from("config/harvesters")
}

fn default_scorer_hosts() -> Vec<String> {
    vec![
        "https://www.wikipedia.org".into(),
        "https://www.mozilla.org".into(),
        "https://www.cloudflare.com".into(),
        "https://www.rust-lang.org".into(),
        "https://www.debian.org".into(),
        "https://www.kernel.org".into(),
        "https://www.python.org".into(),
        "https://www.apache.org".into(),
        "https://www.github.com".into(),
        "https://www.w3.org".into(),
    ]
}

fn default_geolocation_url() -> String {
    "http://ip-api.com/json".into()
}

fn default_geolocation_rate_per_minute() -> u32 {
    40
}

fn default_anonymity_echo_url() -> String {
    "https://httpbin.org/get".into()
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_completion_sweep_secs() -> u64 {
    15 * 60
}

fn default_inspection_sweep_secs() -> u64 {
    30 * 60
}

fn default_harvest_drive_secs() -> u64 {
    20 * 60
}

fn default_registry_size_threshold() -> usize {
    100
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))
    }

    /// Loads every `*.yaml`/`*.yml` document in `harvester_dir` as a
    /// [`proksi_harvest::Config`], matching
    /// `examples/original_source/pkg/spider/spider.go`'s `RenderSpiders`,
    /// which walks a directory of declarative spider definitions rather
    /// than hardcoding each one.
    pub fn load_harvesters(&self) -> Result<Vec<proksi_harvest::Config>, ConfigError> {
        let dir = &self.harvester_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut configs = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| ConfigError::HarvesterDir(dir.clone(), e))?;
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::HarvesterDir(dir.clone(), e))?;
            let path = entry.path();
            let is_yaml = matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            );
            if !is_yaml {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::HarvesterRead(path.clone(), e))?;
            let config: proksi_harvest::Config =
                serde_yaml::from_str(&raw).map_err(|e| ConfigError::HarvesterParse(path.clone(), e))?;
            configs.push(config);
        }
        Ok(configs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_fills_in_every_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.scorer_hosts.len(), 10);
        assert_eq!(config.scheduler.registry_size_threshold, 100);
    }

    #[test]
    fn partial_toml_overrides_only_what_it_sets() {
        let config: Config = toml::from_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.bind, default_bind());
    }

    #[test]
    fn missing_harvester_dir_yields_no_harvesters() {
        let config: Config = toml::from_str("harvester_dir = \"/does/not/exist\"\n").unwrap();
        assert!(config.load_harvesters().unwrap().is_empty());
    }
}
