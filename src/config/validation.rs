use crate::config::types::{ArchiveConfig, Config, CrawlerConfig, DirectoryConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_archive_config(&config.archive)?;
    validate_directory_config(&config.directory)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_fetches < 1 || config.max_concurrent_fetches > 256 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_fetches must be between 1 and 256, got {}",
            config.max_concurrent_fetches
        )));
    }

    if config.max_retry_attempts > 20 {
        return Err(ConfigError::Validation(format!(
            "max_retry_attempts must be <= 20, got {}",
            config.max_retry_attempts
        )));
    }

    if config.retry_backoff_base < 1 {
        return Err(ConfigError::Validation(
            "retry_backoff_base must be >= 1ms".to_string(),
        ));
    }

    if config.retry_backoff_cap < config.retry_backoff_base {
        return Err(ConfigError::Validation(format!(
            "retry_backoff_cap ({}ms) must be >= retry_backoff_base ({}ms)",
            config.retry_backoff_cap, config.retry_backoff_base
        )));
    }

    if config.run_deadline == Some(0) {
        return Err(ConfigError::Validation(
            "run_deadline must be >= 1s when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Validate crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates archive configuration
fn validate_archive_config(config: &ArchiveConfig) -> Result<(), ConfigError> {
    if config.path.is_empty() {
        return Err(ConfigError::Validation(
            "archive path cannot be empty".to_string(),
        ));
    }

    if matches!(&config.index_path, Some(path) if path.is_empty()) {
        return Err(ConfigError::Validation(
            "index_path cannot be empty when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates directory server configuration
fn validate_directory_config(config: &DirectoryConfig) -> Result<(), ConfigError> {
    if config.endpoints.is_empty() {
        return Err(ConfigError::Validation(
            "at least one directory endpoint is required".to_string(),
        ));
    }

    for endpoint in config.endpoints.iter().chain(&config.authorities) {
        validate_endpoint(endpoint)?;
    }

    if config.timeout < 1 {
        return Err(ConfigError::Validation(
            "directory timeout must be >= 1s".to_string(),
        ));
    }

    Ok(())
}

/// Validates a `host:port` DirPort endpoint
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    if endpoint.contains("://") || endpoint.contains('/') {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must be host:port without scheme or path",
            endpoint
        )));
    }

    // Url::port() hides default ports, so the port is checked by hand
    let port_ok = endpoint
        .rsplit_once(':')
        .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
        .unwrap_or(false);
    if !port_ok {
        return Err(ConfigError::InvalidUrl(format!(
            "Endpoint '{}' must include both host and port",
            endpoint
        )));
    }

    Url::parse(&format!("http://{}/", endpoint)).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", endpoint, e))
    })?;

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    // Basic email format check: must contain @ and have text on both sides
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
