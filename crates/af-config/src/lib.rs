//! af-config: typed case configuration and validation.

pub mod schema;
pub mod validate;

pub use schema::*;
pub use validate::{ValidationError, validate_config};

use af_core::ErrorKind;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl ConfigError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConfigError::Io(_) => ErrorKind::Storage,
            ConfigError::Validation(_) | ConfigError::Yaml(_) => ErrorKind::Configuration,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_config(self)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

pub fn load_yaml(path: &std::path::Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path)?;
    Config::from_yaml_str(&content)
}

pub fn save_yaml(path: &std::path::Path, config: &Config) -> ConfigResult<()> {
    config.validate()?;
    std::fs::write(path, config.to_yaml_string()?)?;
    Ok(())
}
