//! Webhook store trait

use async_trait::async_trait;

use crate::domain::DomainError;

use super::entity::WebHookEntity;

/// Outcome of a store write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreResult {
    Success,
    NotFound,
    /// The persistence context failed; details are logged, not returned
    InternalError,
    /// Reserved, no operation currently reports it
    Conflict,
}

impl std::fmt::Display for StoreResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::InternalError => "internal_error",
            Self::Conflict => "conflict",
        };
        write!(f, "{}", s)
    }
}

/// Caller-supplied filter receiving a webhook and its owning user
pub type WebHookPredicate<'a, W> = dyn Fn(&W, &str) -> bool + Send + Sync + 'a;

/// Per-user webhook persistence
///
/// Read operations propagate persistence failures as
/// [`DomainError::Store`]; write operations report them as
/// [`StoreResult::InternalError`]. Every operation rejects empty keys with
/// [`DomainError::Validation`] before touching storage.
#[async_trait]
pub trait WebHookStore<W>: Send + Sync
where
    W: WebHookEntity,
{
    /// Returns every readable webhook owned by `user`
    async fn get_all(&self, user: &str) -> Result<Vec<W>, DomainError>;

    /// Returns the user's webhooks matching any of `actions` and the predicate
    async fn query(
        &self,
        user: &str,
        actions: &[String],
        predicate: Option<&WebHookPredicate<'_, W>>,
    ) -> Result<Vec<W>, DomainError>;

    /// Returns the webhook with the given id, if present and readable
    async fn lookup(&self, user: &str, id: &str) -> Result<Option<W>, DomainError>;

    async fn insert(&self, user: &str, webhook: &W) -> Result<StoreResult, DomainError>;

    /// Replaces the stored webhook with the same id
    async fn update(&self, user: &str, webhook: &W) -> Result<StoreResult, DomainError>;

    async fn delete(&self, user: &str, id: &str) -> Result<StoreResult, DomainError>;

    /// Removes every webhook owned by `user`; a no-op when there are none
    async fn delete_all(&self, user: &str) -> Result<(), DomainError>;

    /// Like [`WebHookStore::query`] over all users; the predicate receives the stored owner
    async fn query_across_all_users(
        &self,
        actions: &[String],
        predicate: Option<&WebHookPredicate<'_, W>>,
    ) -> Result<Vec<W>, DomainError>;
}
