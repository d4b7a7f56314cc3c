//! Webhook domain module for per-user subscription records

mod converter;
mod entity;
mod normalizer;
mod store;

pub use converter::{JsonWebHookConverter, WebHookConverter};
pub use entity::{WILDCARD_FILTER, WebHook, WebHookEntity};
pub use normalizer::{KeyNormalizer, LowercaseKeyNormalizer};
pub use store::{StoreResult, WebHookPredicate, WebHookStore};

#[cfg(test)]
pub use converter::MockWebHookConverter;
#[cfg(test)]
pub use normalizer::MockKeyNormalizer;
