use crate::config::types::{Config, OutputConfig, SearchConfig};
use crate::storage::Period;
use crate::ConfigError;
use url::Url;

/// Largest page the search endpoint will return
const MAX_PAGE_SIZE: u32 = 100;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the search endpoint and pacing settings
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if config.bearer_token.trim().is_empty() {
        return Err(ConfigError::Validation(
            "bearer-token cannot be empty".to_string(),
        ));
    }

    validate_base_query(&config.base_query)?;

    if config.sleep_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "sleep-interval must be >= 1s, got {}s",
            config.sleep_interval
        )));
    }

    if config.idle_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "idle-interval must be >= 1s, got {}s",
            config.idle_interval
        )));
    }

    Ok(())
}

/// Validates the base query string
///
/// The bounds are owned by the paginator, so the base query must not carry its own.
fn validate_base_query(query: &str) -> Result<(), ConfigError> {
    if query.trim().is_empty() {
        return Err(ConfigError::Validation(
            "base-query cannot be empty".to_string(),
        ));
    }

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "since_id" | "max_id" => {
                return Err(ConfigError::Validation(format!(
                    "base-query must not set '{}'",
                    key
                )));
            }
            "count" => {
                let count: u32 = value.parse().map_err(|_| {
                    ConfigError::Validation(format!("base-query count '{}' is not a number", value))
                })?;
                if count < 1 || count > MAX_PAGE_SIZE {
                    return Err(ConfigError::Validation(format!(
                        "base-query count must be between 1 and {}, got {}",
                        MAX_PAGE_SIZE, count
                    )));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.data_file.is_empty() {
        return Err(ConfigError::Validation(
            "data-file cannot be empty".to_string(),
        ));
    }

    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    if !(-12..=14).contains(&config.utc_offset_hours) {
        return Err(ConfigError::Validation(format!(
            "utc-offset-hours must be between -12 and 14, got {}",
            config.utc_offset_hours
        )));
    }

    if let Some(month) = &config.current_month {
        month
            .parse::<Period>()
            .map_err(|e| ConfigError::Validation(format!("current-month: {}", e)))?;
    }

    if let Some(path) = &config.checkpoint_path {
        if path.is_empty() {
            return Err(ConfigError::Validation(
                "checkpoint-path cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}
