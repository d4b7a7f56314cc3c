//! Infrastructure layer - Storage backends and the webhook store

pub mod logging;
pub mod storage;
pub mod webhook;

pub use storage::{InMemoryRegistrationStore, PostgresRegistrationStore, StorageConfig, StorageFactory};
pub use webhook::StorageWebHookStore;
