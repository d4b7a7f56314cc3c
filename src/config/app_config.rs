use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::storage::{
    DEFAULT_TABLE_NAME, PostgresConfig, StorageConfig, StorageType,
};

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Where webhook registrations are kept
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// `memory` or `postgres`
    pub backend: String,
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub table_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        let postgres = PostgresConfig::default();

        Self {
            backend: "memory".to_string(),
            url: None,
            max_connections: postgres.max_connections,
            min_connections: postgres.min_connections,
            connect_timeout_secs: postgres.connect_timeout_secs,
            idle_timeout_secs: postgres.idle_timeout_secs,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

impl StorageSettings {
    /// Resolves the settings into a backend configuration
    pub fn to_storage_config(&self) -> Result<StorageConfig, DomainError> {
        match self.backend.parse::<StorageType>()? {
            StorageType::InMemory => Ok(StorageConfig::in_memory()),
            StorageType::Postgres => {
                let url = self.url.clone().ok_or_else(|| {
                    DomainError::configuration("storage.url is required for the postgres backend")
                })?;

                let config = PostgresConfig::new(url)
                    .with_max_connections(self.max_connections)
                    .with_min_connections(self.min_connections)
                    .with_connect_timeout(self.connect_timeout_secs)
                    .with_idle_timeout(self.idle_timeout_secs);

                Ok(StorageConfig::postgres(config).with_table_name(self.table_name.clone()))
            }
        }
    }
}

impl AppConfig {
    /// Loads `config/default`, `config/local`, then `APP__*` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
