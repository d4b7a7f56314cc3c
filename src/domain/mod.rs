//! Domain layer - Webhook records and persistence capabilities

pub mod error;
pub mod storage;
pub mod webhook;

pub use error::DomainError;
pub use storage::{RecordFilter, Registration, UnitOfWork, UnitOfWorkFactory, WebHookRegistration};
pub use webhook::{
    JsonWebHookConverter, KeyNormalizer, LowercaseKeyNormalizer, StoreResult, WILDCARD_FILTER,
    WebHook, WebHookConverter, WebHookEntity, WebHookPredicate, WebHookStore,
};
