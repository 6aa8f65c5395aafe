use super::{types::Config, ConfigError};

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// Validate configuration
/// Currently validates:
/// - Media service URL and API key are set
/// - Catalog URL is set and the search limit is not 0
/// - Timeouts are not 0
/// - Download directory is set
/// - At least one media type is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Media service validation
    if config.media_service.url.trim().is_empty() {
        return Err(invalid("media_service.url cannot be empty"));
    }
    if config.media_service.api_key.trim().is_empty() {
        return Err(invalid("media_service.api_key cannot be empty"));
    }
    if config.media_service.timeout_secs == 0 {
        return Err(invalid("media_service.timeout_secs cannot be 0"));
    }

    // Catalog validation
    if config.catalog.api_url.trim().is_empty() {
        return Err(invalid("catalog.api_url cannot be empty"));
    }
    if config.catalog.timeout_secs == 0 {
        return Err(invalid("catalog.timeout_secs cannot be 0"));
    }
    if config.catalog.search_limit == 0 {
        return Err(invalid("catalog.search_limit cannot be 0"));
    }

    if config.retrieval.download_dir.as_os_str().is_empty() {
        return Err(invalid("retrieval.download_dir cannot be empty"));
    }
    if config.ledger.path.as_os_str().is_empty() {
        return Err(invalid("ledger.path cannot be empty"));
    }

    if !config.run.movies_enabled && !config.run.episodes_enabled {
        return Err(invalid(
            "run.movies_enabled and run.episodes_enabled are both false, nothing to do",
        ));
    }

    Ok(())
}
