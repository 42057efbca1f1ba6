mod schema;

pub use schema::*;

use std::path::Path;
use thiserror::Error;

/// Paths probed when no registry is given on the command line
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/replcheck.toml", "replcheck.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("no server registry found (searched {})", DEFAULT_CONFIG_PATHS.join(", "))]
    Missing,

    #[error("master name '{0}' not defined in configuration")]
    UnknownMaster(String),
}

/// Load and validate the server registry from a specific path
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Load the registry from the first default path that exists
pub fn load_default_config() -> Result<Config, ConfigError> {
    for path in DEFAULT_CONFIG_PATHS {
        if Path::new(path).exists() {
            return load_config(path);
        }
    }
    Err(ConfigError::Missing)
}
