use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reads, parses and validates the TOML file at `path`
///
/// ```no_run
/// use std::path::Path;
/// use tidewalk::config::load_config;
///
/// # fn main() -> Result<(), tidewalk::ConfigError> {
/// let config = load_config(Path::new("tidewalk.toml"))?;
/// println!("Seed: {}", config.seed);
/// # Ok(())
/// # }
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    load_config_with_hash(path).map(|(config, _)| config)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Returns the hex SHA-256 digest of configuration text
///
/// Runs in the history database carry this so two runs can be compared by
/// the settings that produced them.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// Reads the file once, returning the validated config and the digest of its text
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config = parse_config(&content)?;
    Ok((config, content_hash(&content)))
}
