use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::{Backoff, RetryPolicy};

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Source (Autotask-style) API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// REST base URL, entity names are appended (e.g. ".../V1.0/Tickets/query")
    #[serde(default = "default_source_url")]
    pub base_url: String,
    #[serde(default)]
    pub integration_code: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub secret: String,
    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_url(),
            integration_code: String::new(),
            username: String::new(),
            secret: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_source_url() -> String {
    "https://webservices14.autotask.net/ATServicesRest/V1.0".to_string()
}

fn default_timeout() -> u32 {
    60
}

/// Destination (Atera-style) API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DestinationConfig {
    #[serde(default = "default_destination_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Per-request timeout in seconds (default: 60)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            base_url: default_destination_url(),
            api_key: String::new(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_destination_url() -> String {
    "https://app.atera.com/api/v3".to_string()
}

/// Where snapshots, error artifacts and the audit log live
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_error_dir")]
    pub error_dir: PathBuf,
    #[serde(default = "default_audit_log")]
    pub audit_log: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            error_dir: default_error_dir(),
            audit_log: default_audit_log(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("json_files")
}

fn default_error_dir() -> PathBuf {
    PathBuf::from("errors")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from("log_info/audit.jsonl")
}

/// Retry settings per kind of request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Paginated fetches: retried on timeout only
    #[serde(
        default = "default_fetch_retry",
        deserialize_with = "fetch_retry_override"
    )]
    pub fetch: RetrySettings,
    /// Ticket creation: retried on any failure
    #[serde(
        default = "default_ticket_post_retry",
        deserialize_with = "ticket_post_retry_override"
    )]
    pub ticket_post: RetrySettings,
    /// Ticket note queries: retried on timeout and connection failure
    #[serde(
        default = "default_notes_retry",
        deserialize_with = "notes_retry_override"
    )]
    pub notes: RetrySettings,
    /// Pause between two tickets' note queries, in milliseconds
    #[serde(default = "default_note_throttle_ms")]
    pub note_throttle_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            fetch: default_fetch_retry(),
            ticket_post: default_ticket_post_retry(),
            notes: default_notes_retry(),
            note_throttle_ms: default_note_throttle_ms(),
        }
    }
}

fn default_fetch_retry() -> RetrySettings {
    RetrySettings::from(&RetryPolicy::fetch())
}

fn default_ticket_post_retry() -> RetrySettings {
    RetrySettings::from(&RetryPolicy::ticket_post())
}

fn default_notes_retry() -> RetrySettings {
    RetrySettings::from(&RetryPolicy::notes())
}

fn default_note_throttle_ms() -> u64 {
    500
}

/// A retry section as written by the operator. Keys left out keep the
/// value of the section's preset.
#[derive(Debug, Default, Deserialize)]
struct RetryOverride {
    max_attempts: Option<u32>,
    backoff: Option<BackoffKind>,
    delay_ms: Option<u64>,
    max_delay_ms: Option<u64>,
}

impl RetryOverride {
    fn apply(self, preset: RetrySettings) -> RetrySettings {
        RetrySettings {
            max_attempts: self.max_attempts.unwrap_or(preset.max_attempts),
            backoff: self.backoff.unwrap_or(preset.backoff),
            delay_ms: self.delay_ms.unwrap_or(preset.delay_ms),
            max_delay_ms: self.max_delay_ms.or(preset.max_delay_ms),
        }
    }
}

fn fetch_retry_override<'de, D: Deserializer<'de>>(d: D) -> Result<RetrySettings, D::Error> {
    RetryOverride::deserialize(d).map(|o| o.apply(default_fetch_retry()))
}

fn ticket_post_retry_override<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<RetrySettings, D::Error> {
    RetryOverride::deserialize(d).map(|o| o.apply(default_ticket_post_retry()))
}

fn notes_retry_override<'de, D: Deserializer<'de>>(d: D) -> Result<RetrySettings, D::Error> {
    RetryOverride::deserialize(d).map(|o| o.apply(default_notes_retry()))
}

/// Serializable form of a [`RetryPolicy`]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    /// Base delay in milliseconds (the step for linear, the first delay
    /// for exponential)
    pub delay_ms: u64,
    /// Upper bound for exponential backoff, in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Fixed,
    Linear,
    Exponential,
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        let delay = Duration::from_millis(self.delay_ms);
        let backoff = match self.backoff {
            BackoffKind::Fixed => Backoff::Fixed(delay),
            BackoffKind::Linear => Backoff::Linear(delay),
            BackoffKind::Exponential => Backoff::Exponential {
                initial: delay,
                max: Duration::from_millis(self.max_delay_ms.unwrap_or(self.delay_ms)),
            },
        };
        RetryPolicy::new(self.max_attempts, backoff)
    }
}

impl From<&RetryPolicy> for RetrySettings {
    fn from(policy: &RetryPolicy) -> Self {
        let (backoff, delay, max) = match policy.backoff {
            Backoff::Fixed(d) => (BackoffKind::Fixed, d, None),
            Backoff::Linear(d) => (BackoffKind::Linear, d, None),
            Backoff::Exponential { initial, max } => {
                (BackoffKind::Exponential, initial, Some(max.as_millis() as u64))
            }
        };
        Self {
            max_attempts: policy.max_attempts,
            backoff,
            delay_ms: delay.as_millis() as u64,
            max_delay_ms: max,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format for the console
    #[serde(default)]
    pub format: LogFormat,
    /// Optional file the log is also appended to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub source: SanitizedSourceConfig,
    pub destination: SanitizedDestinationConfig,
    pub paths: PathsConfig,
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedSourceConfig {
    pub base_url: String,
    pub integration_code_configured: bool,
    pub username_configured: bool,
    pub secret_configured: bool,
    pub timeout_secs: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDestinationConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            source: SanitizedSourceConfig {
                base_url: config.source.base_url.clone(),
                integration_code_configured: !config.source.integration_code.is_empty(),
                username_configured: !config.source.username.is_empty(),
                secret_configured: !config.source.secret.is_empty(),
                timeout_secs: config.source.timeout_secs,
            },
            destination: SanitizedDestinationConfig {
                base_url: config.destination.base_url.clone(),
                api_key_configured: !config.destination.api_key.is_empty(),
                timeout_secs: config.destination.timeout_secs,
            },
            paths: config.paths.clone(),
            retry: config.retry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.source.timeout_secs, 60);
        assert_eq!(config.destination.base_url, "https://app.atera.com/api/v3");
        assert_eq!(config.paths.data_dir.to_str().unwrap(), "json_files");
        assert_eq!(config.retry.fetch.max_attempts, 3);
        assert_eq!(config.retry.fetch.backoff, BackoffKind::Linear);
        assert_eq!(config.retry.fetch.delay_ms, 10_000);
        assert_eq!(config.retry.ticket_post.backoff, BackoffKind::Fixed);
        assert_eq!(config.retry.ticket_post.delay_ms, 5_000);
        assert_eq!(config.retry.notes.max_attempts, 5);
        assert_eq!(config.retry.note_throttle_ms, 500);
        assert_eq!(config.logging.format, LogFormat::Text);
    }

    #[test]
    fn test_deserialize_credentials() {
        let toml = r#"
[source]
integration_code = "CODE"
username = "api@example.com"
secret = "hunter2"
timeout_secs = 30

[destination]
api_key = "atera-key"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.source.integration_code, "CODE");
        assert_eq!(config.source.timeout_secs, 30);
        assert_eq!(config.destination.api_key, "atera-key");
    }

    #[test]
    fn test_retry_settings_round_trip_through_policy() {
        let toml = r#"
[retry.notes]
max_attempts = 4
backoff = "exponential"
delay_ms = 250
max_delay_ms = 2000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let policy = config.retry.notes.policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(
            policy.backoff,
            Backoff::Exponential {
                initial: Duration::from_millis(250),
                max: Duration::from_secs(2),
            }
        );
        assert_eq!(RetrySettings::from(&policy), config.retry.notes);
    }

    #[test]
    fn test_partial_retry_section_keeps_preset() {
        let toml = r#"
[retry.fetch]
max_attempts = 5

[retry.notes]
max_delay_ms = 30000
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let fetch = config.retry.fetch.policy();
        assert_eq!(fetch.max_attempts, 5);
        assert_eq!(fetch.backoff, Backoff::Linear(Duration::from_secs(10)));

        let notes = config.retry.notes.policy();
        assert_eq!(notes.max_attempts, 5);
        assert_eq!(
            notes.backoff,
            Backoff::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(30),
            }
        );
        assert_eq!(config.retry.ticket_post, RetrySettings::from(&RetryPolicy::ticket_post()));
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config = Config::default();
        config.source.secret = "s3cret".to_string();
        config.destination.api_key = "key".to_string();

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.source.secret_configured);
        assert!(!sanitized.source.username_configured);
        assert!(sanitized.destination.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("s3cret"));
        assert!(!json.contains("\"key\""));
    }
}
