use std::time::Duration;

use serde::Deserialize;

use crate::parser::ParserConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("id must be a non-empty string")]
    MissingId,
    #[error("urls must contain at least one entry")]
    MissingUrls,
    #[error("rule.interval must be >= 10 minutes, got {0:?}")]
    IntervalTooShort(Duration),
    #[error("rule.limit.parallelism must be >= 1, got {0}")]
    ParallelismTooLow(usize),
    #[error("rule.limit.delay must be >= 5 seconds, got {0:?}")]
    DelayTooShort(Duration),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Limit {
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    #[serde(default, with = "humantime_serde::option")]
    pub delay: Option<Duration>,
    #[serde(default, with = "humantime_serde::option")]
    pub jitter: Option<Duration>,
}

fn default_parallelism() -> usize {
    2
}

impl Default for Limit {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            delay: None,
            jitter: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(default, with = "humantime_serde::option")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub limit: Limit,
}

/// Declarative harvester definition, rendered from a config template the
/// same way `examples/original_source/pkg/spider/spider.go`'s
/// `RenderSpiders` expands one before parsing it.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub urls: Vec<String>,
    pub parser: ParserConfig,
    #[serde(default)]
    pub rule: Rule,
}

fn default_true() -> bool {
    true
}

const DEFAULT_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);
const DEFAULT_DELAY: Duration = Duration::from_secs(10);
const MIN_INTERVAL: Duration = Duration::from_secs(10 * 60);
const MIN_DELAY: Duration = Duration::from_secs(5);

/// Resolved, validated rule — `Rule`'s fields are optional in config so
/// they can fall back to sane defaults, this is what callers actually use.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRule {
    pub interval: Duration,
    pub parallelism: usize,
    pub delay: Duration,
    pub jitter: Duration,
}

impl Config {
    /// Fills in defaults for anything the config left unset, mirroring
    /// `Config.Configure()`.
    pub fn resolve_rule(&self) -> ResolvedRule {
        let interval = self.rule.interval.unwrap_or(DEFAULT_INTERVAL);
        let delay = self.rule.limit.delay.unwrap_or(DEFAULT_DELAY);
        let jitter = self.rule.limit.jitter.unwrap_or(delay / 10);
        ResolvedRule {
            interval,
            parallelism: self.rule.limit.parallelism.max(1),
            delay,
            jitter,
        }
    }

    /// Mirrors `Config.Validate()`: checked against the *resolved* rule, so
    /// a config that never mentions `rule` at all always validates.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::MissingId);
        }
        if self.urls.is_empty() {
            return Err(ConfigError::MissingUrls);
        }
        let resolved = self.resolve_rule();
        if resolved.interval < MIN_INTERVAL {
            return Err(ConfigError::IntervalTooShort(resolved.interval));
        }
        if resolved.parallelism < 1 {
            return Err(ConfigError::ParallelismTooLow(resolved.parallelism));
        }
        if resolved.delay < MIN_DELAY {
            return Err(ConfigError::DelayTooShort(resolved.delay));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{ParserConfig, RegexParserConfig};

    fn base_config() -> Config {
        Config {
            id: "test".into(),
            enabled: true,
            urls: vec!["https://example.com".into()],
            parser: ParserConfig::Regex(RegexParserConfig {
                ip_port_expr: r"(?P<ip>\d+\.\d+\.\d+\.\d+):(?P<port>\d+)".into(),
            }),
            rule: Rule {
                interval: None,
                limit: Limit::default(),
            },
        }
    }

    #[test]
    fn defaults_pass_validation() {
        base_config().validate().unwrap();
    }

    #[test]
    fn empty_id_is_rejected() {
        let mut c = base_config();
        c.id = String::new();
        assert_eq!(c.validate().unwrap_err(), ConfigError::MissingId);
    }

    #[test]
    fn empty_urls_is_rejected() {
        let mut c = base_config();
        c.urls.clear();
        assert_eq!(c.validate().unwrap_err(), ConfigError::MissingUrls);
    }

    #[test]
    fn too_short_interval_is_rejected() {
        let mut c = base_config();
        c.rule.interval = Some(Duration::from_secs(60));
        assert!(matches!(
            c.validate().unwrap_err(),
            ConfigError::IntervalTooShort(_)
        ));
    }

    #[test]
    fn humantime_strings_deserialize_into_durations() {
        let rule: Rule = serde_yaml::from_str("interval: 2h\nlimit:\n  parallelism: 3\n  delay: 15s\n  jitter: 1s\n").unwrap();
        assert_eq!(rule.interval, Some(Duration::from_secs(2 * 60 * 60)));
        assert_eq!(rule.limit.delay, Some(Duration::from_secs(15)));
        assert_eq!(rule.limit.jitter, Some(Duration::from_secs(1)));
    }
}
