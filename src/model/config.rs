use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

const ENV_CONFIG_PATH: &str = "FALLACY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config.yaml";

const ENV_SERVICE_URL: &str = "FALLACY_SERVICE_URL";
const ENV_TIMEOUT_MS: &str = "FALLACY_TIMEOUT_MS";
const ENV_LANGUAGE: &str = "FALLACY_LANGUAGE";
const ENV_APPEAL_THRESHOLD: &str = "FALLACY_APPEAL_THRESHOLD";
const ENV_APPEAL_POLICY: &str = "FALLACY_APPEAL_POLICY";
const ENV_RETRAIN_INTERVAL: &str = "FALLACY_RETRAIN_INTERVAL_SECS";
const ENV_STORAGE: &str = "FALLACY_STORAGE";

const DEFAULT_SERVICE_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_TIMEOUT_MS: u64 = 5000;
const DEFAULT_LANGUAGE: &str = "ko";
const DEFAULT_APPEAL_THRESHOLD: i64 = 100;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const DEFAULT_RETRAIN_INTERVAL_SECS: u64 = 3600;

/// Settings for the external classification service
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Base URL; endpoints are resolved relative to it (`{base}/detect`, ...)
    pub service_url: Url,
    pub timeout_ms: u64,
    pub language: String,
}

impl DetectionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolve an endpoint path against the base URL, keeping any base path
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.service_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            service_url: Url::parse(DEFAULT_SERVICE_URL).expect("default service URL is valid"),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// Who may file an appeal against an argument's judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppealPolicy {
    /// Only the argument's author
    #[default]
    AuthorOnly,
    /// Any authenticated member
    AnyUser,
}

impl AppealPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "author_only" => Some(AppealPolicy::AuthorOnly),
            "any_user" => Some(AppealPolicy::AnyUser),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppealConfig {
    /// PENDING appeals per argument that make it eligible for retraining
    pub threshold: i64,
    pub policy: AppealPolicy,
}

impl Default for AppealConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_APPEAL_THRESHOLD,
            policy: AppealPolicy::default(),
        }
    }
}

/// Sizing of the annotation work queue
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrainingConfig {
    pub check_interval_secs: u64,
}

impl RetrainingConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

impl Default for RetrainingConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: DEFAULT_RETRAIN_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Postgres,
    Memory,
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detection: DetectionConfig,
    pub appeal: AppealConfig,
    pub annotation: AnnotationConfig,
    pub retraining: RetrainingConfig,
    pub storage: StorageBackend,
}

impl Config {
    /// Load configuration from the config file, then apply environment overrides
    pub fn from_env() -> Self {
        let config_path =
            std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        let mut config = Self::load_config_file(&config_path).unwrap_or_default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(raw) = std::env::var(ENV_SERVICE_URL) {
            match Url::parse(&raw) {
                Ok(url) => self.detection.service_url = url,
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "Invalid {}, keeping {}", ENV_SERVICE_URL, self.detection.service_url)
                }
            }
        }

        if let Some(timeout) = env_parse(ENV_TIMEOUT_MS) {
            self.detection.timeout_ms = timeout;
        }

        if let Ok(language) = std::env::var(ENV_LANGUAGE) {
            self.detection.language = language;
        }

        if let Some(threshold) = env_parse(ENV_APPEAL_THRESHOLD) {
            self.appeal.threshold = threshold;
        }

        if let Ok(raw) = std::env::var(ENV_APPEAL_POLICY) {
            match AppealPolicy::parse(&raw) {
                Some(policy) => self.appeal.policy = policy,
                None => tracing::warn!(value = %raw, "Unknown appeal policy, keeping {:?}", self.appeal.policy),
            }
        }

        if let Some(interval) = env_parse(ENV_RETRAIN_INTERVAL) {
            self.retraining.check_interval_secs = interval;
        }

        if let Ok(raw) = std::env::var(ENV_STORAGE) {
            match raw.trim().to_lowercase().as_str() {
                "postgres" => self.storage = StorageBackend::Postgres,
                "memory" => self.storage = StorageBackend::Memory,
                _ => tracing::warn!(value = %raw, "Unknown storage backend, keeping {:?}", self.storage),
            }
        }
    }

    /// Load configuration from YAML file
    fn load_config_file(path: &str) -> Option<Config> {
        let path = Path::new(path);

        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config file not found, using defaults");
            return None;
        }

        match fs::read_to_string(path) {
            Ok(contents) => {
                let contents = contents.trim();
                if contents.is_empty() {
                    tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
                    return Some(Config::default());
                }

                match Self::parse_yaml(contents) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "Loaded configuration from file");
                        Some(config)
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to parse config file, using defaults");
                        None
                    }
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read config file, using defaults");
                None
            }
        }
    }

    fn parse_yaml(contents: &str) -> Result<Config, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.detection.timeout(), Duration::from_secs(5));
        assert_eq!(config.appeal.threshold, 100);
        assert_eq!(config.appeal.policy, AppealPolicy::AuthorOnly);
        assert_eq!(config.storage, StorageBackend::Postgres);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let config = Config::parse_yaml(
            r#"
detection:
  service_url: "http://classifier:9000/api/v1"
  timeout_ms: 1500
appeal:
  policy: any_user
storage: memory
"#,
        )
        .unwrap();

        assert_eq!(config.detection.timeout_ms, 1500);
        assert_eq!(config.detection.language, "ko");
        assert_eq!(config.appeal.policy, AppealPolicy::AnyUser);
        assert_eq!(config.appeal.threshold, 100);
        assert_eq!(config.annotation.workers, 4);
        assert_eq!(config.storage, StorageBackend::Memory);
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let mut detection = DetectionConfig::default();
        assert_eq!(detection.endpoint("detect"), "http://localhost:8000/api/v1/detect");

        detection.service_url = Url::parse("http://classifier:9000/api/v1/").unwrap();
        assert_eq!(detection.endpoint("/detect/batch"), "http://classifier:9000/api/v1/detect/batch");
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(Config::parse_yaml("appeal: [not, a, map]").is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(AppealPolicy::parse("ANY_USER"), Some(AppealPolicy::AnyUser));
        assert_eq!(AppealPolicy::parse("admins"), None);
    }
}
