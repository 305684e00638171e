use crate::config::types::{
    Config, FetcherConfig, JobConfig, OutputConfig, SourceConfig, UserAgentConfig,
};
use crate::config::ID_PLACEHOLDER;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_user_agent_config(&config.user_agent)?;
    validate_source_config(&config.source)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_job_config(&config.job)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the client identification sent with every request
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let name_ok = !config.client_name.is_empty()
        && config
            .client_name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-');
    if !name_ok {
        return Err(ConfigError::Validation(format!(
            "client_name must be non-empty alphanumerics and hyphens, got '{}'",
            config.client_name
        )));
    }

    if config.client_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "client_version cannot be empty".to_string(),
        ));
    }

    validate_email(&config.contact_email)
}

/// Validates the remote source locations
fn validate_source_config(config: &SourceConfig) -> Result<(), ConfigError> {
    if !config.detail_url.contains(ID_PLACEHOLDER) {
        return Err(ConfigError::Validation(format!(
            "detail_url must contain the {} placeholder, got '{}'",
            ID_PLACEHOLDER, config.detail_url
        )));
    }

    let sample = config.detail_url.replace(ID_PLACEHOLDER, "1");
    validate_http_url("detail_url", &sample)?;
    validate_http_url("query_url", &config.query_url)?;

    if config.query_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "query_version cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch timing
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.page_timeout_secs < 1 || config.page_timeout_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "page_timeout_secs must be between 1 and 300, got {}",
            config.page_timeout_secs
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout_secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.settle_delay_ms / 1000 >= config.page_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "settle_delay_ms ({}ms) must be shorter than page_timeout_secs ({}s)",
            config.settle_delay_ms, config.page_timeout_secs
        )));
    }

    Ok(())
}

/// Validates job defaults
fn validate_job_config(config: &JobConfig) -> Result<(), ConfigError> {
    if config.interval_ms < 100 {
        return Err(ConfigError::Validation(format!(
            "interval_ms must be >= 100ms, got {}ms",
            config.interval_ms
        )));
    }

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint_every must be >= 1, got {}",
            config.checkpoint_every
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "checkpoint_path cannot be empty".to_string(),
        ));
    }

    if config.results_path.is_empty() {
        return Err(ConfigError::Validation(
            "results_path cannot be empty".to_string(),
        ));
    }

    if config.checkpoint_path == config.results_path {
        return Err(ConfigError::Validation(
            "checkpoint_path and results_path must differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            name, value
        )));
    }

    Ok(())
}

/// Checks the contact address has a local part and a dotted domain
fn validate_email(email: &str) -> Result<(), ConfigError> {
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !domain.contains('@') =>
        {
            Ok(())
        }
        _ => Err(ConfigError::Validation(format!(
            "contact_email must look like name@domain.tld, got '{}'",
            email
        ))),
    }
}
