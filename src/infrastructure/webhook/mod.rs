//! Webhook infrastructure implementations

mod storage_store;

pub use storage_store::StorageWebHookStore;
