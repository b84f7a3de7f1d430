use crate::config::types::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, OutputFormat, RobotsConfig, ScopeConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_seed(&config.seed)?;
    validate_crawler_config(&config.crawler)?;
    validate_scope_config(&config.scope)?;
    validate_robots_config(&config.robots)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the seed URL: absolute, http or https, with a host
fn validate_seed(seed: &str) -> Result<(), ConfigError> {
    let url = Url::parse(seed)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' must use http or https",
            seed
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            seed
        )));
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 || config.batch_size > 1000 {
        return Err(ConfigError::Validation(format!(
            "batch-size must be between 1 and 1000, got {}",
            config.batch_size
        )));
    }

    if let Some(workers) = config.workers {
        if !(1..=256).contains(&workers) {
            return Err(ConfigError::Validation(format!(
                "workers must be between 1 and 256, got {}",
                workers
            )));
        }
    }

    if config.fetch_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "fetch-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_render_attempts < 1 {
        return Err(ConfigError::Validation(
            "max-render-attempts must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates asset extensions
fn validate_scope_config(config: &ScopeConfig) -> Result<(), ConfigError> {
    if config.asset_extensions.is_empty() {
        return Err(ConfigError::Validation(
            "asset-extensions cannot be empty".to_string(),
        ));
    }

    for ext in &config.asset_extensions {
        if ext.is_empty() || ext.contains(['.', '/', '\\']) || ext.chars().any(char::is_whitespace) {
            return Err(ConfigError::Validation(format!(
                "asset extension '{}' must be a bare extension like \"pdf\"",
                ext
            )));
        }
    }

    Ok(())
}

/// Validates robots configuration
fn validate_robots_config(config: &RobotsConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if let Some(selector) = &config.ready_selector {
        scraper::Selector::parse(selector).map_err(|e| {
            ConfigError::Validation(format!("Invalid ready-selector '{}': {}", selector, e))
        })?;
    }
    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    match config.format {
        OutputFormat::Files if config.directory.as_os_str().is_empty() => Err(
            ConfigError::Validation("output directory cannot be empty".to_string()),
        ),
        OutputFormat::Sqlite if config.database_path.as_os_str().is_empty() => Err(
            ConfigError::Validation("database-path cannot be empty".to_string()),
        ),
        _ => Ok(()),
    }
}
