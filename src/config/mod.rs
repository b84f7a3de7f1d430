//! Configuration module for Tidewalk
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tidewalk::config::load_config;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), tidewalk::ConfigError> {
//! let config = load_config(Path::new("tidewalk.toml"))?;
//! println!("Crawling from {} in batches of {}", config.seed, config.crawler.batch_size);
//! # Ok(())
//! # }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, OutputFormat, RobotsConfig, ScopeConfig,
};

// Re-export parser functions
pub use parser::{content_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
