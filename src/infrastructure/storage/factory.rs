//! Storage factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;

use crate::domain::DomainError;
use crate::domain::storage::{Registration, UnitOfWorkFactory};

use super::in_memory::InMemoryRegistrationStore;
use super::postgres::{DEFAULT_TABLE_NAME, PostgresConfig, PostgresRegistrationStore};

/// Supported storage types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    /// In-memory storage (for testing/development)
    InMemory,
    /// PostgreSQL storage
    Postgres,
}

impl FromStr for StorageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "inmemory" | "in-memory" | "in_memory" => Ok(Self::InMemory),
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            other => Err(DomainError::configuration(format!(
                "Unknown storage backend '{}'",
                other
            ))),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// In-memory storage configuration
    InMemory,
    /// PostgreSQL storage configuration
    Postgres {
        config: PostgresConfig,
        table_name: String,
    },
}

impl StorageConfig {
    /// Creates an in-memory storage configuration
    pub fn in_memory() -> Self {
        Self::InMemory
    }

    /// Creates a PostgreSQL storage configuration using the default table
    pub fn postgres(config: PostgresConfig) -> Self {
        Self::Postgres {
            config,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }

    /// Creates a PostgreSQL configuration from a URL
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::postgres(PostgresConfig::new(url))
    }

    /// Overrides the PostgreSQL table name; ignored for other backends
    pub fn with_table_name(self, name: impl Into<String>) -> Self {
        match self {
            Self::Postgres { config, .. } => Self::Postgres {
                config,
                table_name: name.into(),
            },
            other => other,
        }
    }

    /// Returns the storage type
    pub fn storage_type(&self) -> StorageType {
        match self {
            Self::InMemory => StorageType::InMemory,
            Self::Postgres { .. } => StorageType::Postgres,
        }
    }
}

/// Factory for creating registration storage instances
#[derive(Debug)]
pub struct StorageFactory;

impl StorageFactory {
    /// Creates a unit-of-work factory based on the configuration
    pub async fn create<R>(
        config: &StorageConfig,
    ) -> Result<Arc<dyn UnitOfWorkFactory<R>>, DomainError>
    where
        R: Registration,
    {
        match config {
            StorageConfig::InMemory => Ok(Self::create_in_memory::<R>()),
            StorageConfig::Postgres { config, table_name } => {
                let storage = Self::create_postgres::<R>(config, table_name).await?;
                Ok(storage)
            }
        }
    }

    /// Creates an in-memory storage
    pub fn create_in_memory<R>() -> Arc<InMemoryRegistrationStore<R>>
    where
        R: Registration,
    {
        Arc::new(InMemoryRegistrationStore::new())
    }

    /// Creates a PostgreSQL storage and makes sure its table exists
    pub async fn create_postgres<R>(
        config: &PostgresConfig,
        table_name: &str,
    ) -> Result<Arc<PostgresRegistrationStore<R>>, DomainError>
    where
        R: Registration,
    {
        let storage = PostgresRegistrationStore::connect(config, table_name).await?;
        storage.ensure_table().await?;
        Ok(Arc::new(storage))
    }
}
