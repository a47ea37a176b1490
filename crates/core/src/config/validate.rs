use super::{types::Config, ConfigError};

/// Which credentials a run needs. Stages that only touch one API should
/// not demand the other's secrets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirements {
    pub source: bool,
    pub destination: bool,
}

impl Requirements {
    pub const ALL: Requirements = Requirements {
        source: true,
        destination: true,
    };
    pub const NONE: Requirements = Requirements {
        source: false,
        destination: false,
    };
}

/// Validate configuration
/// Currently validates:
/// - Base URLs are http(s)
/// - Timeouts and retry attempts are not 0
/// - Required credentials are present
pub fn validate_config(config: &Config, required: Requirements) -> Result<(), ConfigError> {
    for (name, url) in [
        ("source.base_url", &config.source.base_url),
        ("destination.base_url", &config.destination.base_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "{} must be an http(s) URL, got {:?}",
                name, url
            )));
        }
    }

    if config.source.timeout_secs == 0 || config.destination.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "timeout_secs cannot be 0".to_string(),
        ));
    }

    for (name, settings) in [
        ("retry.fetch", &config.retry.fetch),
        ("retry.ticket_post", &config.retry.ticket_post),
        ("retry.notes", &config.retry.notes),
    ] {
        if settings.max_attempts == 0 {
            return Err(ConfigError::ValidationError(format!(
                "{}.max_attempts cannot be 0",
                name
            )));
        }
    }

    if required.source {
        for (name, value) in [
            ("source.integration_code", &config.source.integration_code),
            ("source.username", &config.source.username),
            ("source.secret", &config.source.secret),
        ] {
            if value.is_empty() {
                return Err(ConfigError::ValidationError(format!("{} is required", name)));
            }
        }
    }

    if required.destination && config.destination.api_key.is_empty() {
        return Err(ConfigError::ValidationError(
            "destination.api_key is required".to_string(),
        ));
    }

    Ok(())
}
