//! Storage infrastructure - Registration storage backends

mod factory;
mod in_memory;
mod postgres;

pub use factory::{StorageConfig, StorageFactory, StorageType};
pub use in_memory::InMemoryRegistrationStore;
pub use postgres::{
    DEFAULT_TABLE_NAME, PostgresConfig, PostgresRegistrationStore, validate_table_name,
};
