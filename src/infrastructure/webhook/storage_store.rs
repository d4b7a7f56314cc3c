//! Storage-backed webhook store

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::domain::DomainError;
use crate::domain::storage::{RecordFilter, Registration, UnitOfWork, UnitOfWorkFactory};
use crate::domain::webhook::{
    JsonWebHookConverter, KeyNormalizer, LowercaseKeyNormalizer, StoreResult, WebHookConverter,
    WebHookEntity, WebHookPredicate, WebHookStore,
};

/// Webhook store over a unit-of-work persistence context
///
/// Every operation opens its own unit of work and releases it on return.
/// Update and delete check for the row and write it in the same unit, but
/// two writers racing on one `(user, id)` are last-committer-wins. A row that
/// disappears before the commit lands is reported as `NotFound`.
pub struct StorageWebHookStore<W, R>
where
    W: WebHookEntity,
    R: Registration,
{
    storage: Arc<dyn UnitOfWorkFactory<R>>,
    converter: Arc<dyn WebHookConverter<W, R>>,
    normalizer: Arc<dyn KeyNormalizer>,
}

impl<W, R> Debug for StorageWebHookStore<W, R>
where
    W: WebHookEntity,
    R: Registration,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWebHookStore")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl<W, R> StorageWebHookStore<W, R>
where
    W: WebHookEntity,
    R: Registration,
{
    /// Creates a store using JSON payloads and lowercase keys
    pub fn new(storage: Arc<dyn UnitOfWorkFactory<R>>) -> Self {
        Self {
            storage,
            converter: Arc::new(JsonWebHookConverter),
            normalizer: Arc::new(LowercaseKeyNormalizer),
        }
    }

    /// Replaces the payload conversion strategy
    pub fn with_converter(mut self, converter: Arc<dyn WebHookConverter<W, R>>) -> Self {
        self.converter = converter;
        self
    }

    /// Replaces the key normalization strategy
    pub fn with_normalizer(mut self, normalizer: Arc<dyn KeyNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    fn normalize_key(&self, name: &str, key: &str) -> Result<String, DomainError> {
        if key.trim().is_empty() {
            return Err(DomainError::validation(format!("'{}' must not be empty", name)));
        }

        Ok(self.normalizer.normalize(key))
    }

    fn decode(&self, registration: &R) -> Option<W> {
        let webhook = self.converter.to_domain(registration);

        if webhook.is_none() {
            warn!(
                user = registration.user(),
                id = registration.id(),
                "Skipping registration that could not be decoded"
            );
        }

        webhook
    }

    fn matches(
        webhook: &W,
        owner: &str,
        actions: &[String],
        predicate: Option<&WebHookPredicate<'_, W>>,
    ) -> bool {
        webhook.matches_any_action(actions) && predicate.is_none_or(|p| p(webhook, owner))
    }

    async fn fetch(&self, filter: RecordFilter) -> Result<Vec<R>, DomainError> {
        let mut uow = self.storage.begin().await?;
        uow.query(&filter).await
    }

    /// Encodes the webhook and re-stamps the normalized keys on the record
    fn encode(&self, user: &str, id: &str, webhook: &W) -> Result<R, DomainError> {
        let mut registration = self.converter.to_persisted(user, webhook)?;
        registration.set_user(user.to_string());
        registration.set_id(id.to_string());
        Ok(registration)
    }

    async fn try_insert(&self, user: &str, id: &str, webhook: &W) -> Result<(), DomainError> {
        let registration = self.encode(user, id, webhook)?;

        let mut uow = self.storage.begin().await?;
        uow.add(registration);
        uow.commit().await
    }

    /// Commits a change to a row read in the same unit
    async fn commit_existing(uow: Box<dyn UnitOfWork<R>>) -> Result<StoreResult, DomainError> {
        match uow.commit().await {
            Ok(()) => Ok(StoreResult::Success),
            Err(DomainError::NotFound { .. }) => Ok(StoreResult::NotFound),
            Err(e) => Err(e),
        }
    }

    async fn try_update(
        &self,
        user: &str,
        id: &str,
        webhook: &W,
    ) -> Result<StoreResult, DomainError> {
        let mut uow = self.storage.begin().await?;

        let existing = uow.query(&RecordFilter::key(user, id)).await?;
        let Some(mut registration) = existing.into_iter().next() else {
            return Ok(StoreResult::NotFound);
        };

        self.converter.apply_to_existing(user, webhook, &mut registration)?;
        registration.set_user(user.to_string());
        registration.set_id(id.to_string());

        uow.mark_modified(registration);
        Self::commit_existing(uow).await
    }

    async fn try_delete(&self, user: &str, id: &str) -> Result<StoreResult, DomainError> {
        let mut uow = self.storage.begin().await?;

        let existing = uow.query(&RecordFilter::key(user, id)).await?;
        let Some(registration) = existing.into_iter().next() else {
            return Ok(StoreResult::NotFound);
        };

        uow.mark_deleted(registration);
        Self::commit_existing(uow).await
    }

    async fn try_delete_all(&self, user: &str) -> Result<usize, DomainError> {
        let mut uow = self.storage.begin().await?;

        let registrations = uow.query(&RecordFilter::user(user)).await?;
        let count = registrations.len();

        for registration in registrations {
            uow.mark_deleted(registration);
        }

        uow.commit().await?;
        Ok(count)
    }

    fn write_failed(operation: &str, user: &str, id: &str, error: DomainError) -> StoreResult {
        error!(operation, user, id, error = %error, "Webhook store write failed");
        StoreResult::InternalError
    }
}

#[async_trait]
impl<W, R> WebHookStore<W> for StorageWebHookStore<W, R>
where
    W: WebHookEntity,
    R: Registration,
{
    async fn get_all(&self, user: &str) -> Result<Vec<W>, DomainError> {
        let user = self.normalize_key("user", user)?;

        let registrations = self
            .fetch(RecordFilter::user(&user))
            .await
            .map_err(|e| DomainError::store("get_all", e))?;

        Ok(registrations.iter().filter_map(|r| self.decode(r)).collect())
    }

    async fn query(
        &self,
        user: &str,
        actions: &[String],
        predicate: Option<&WebHookPredicate<'_, W>>,
    ) -> Result<Vec<W>, DomainError> {
        let user = self.normalize_key("user", user)?;

        let registrations = self
            .fetch(RecordFilter::user(&user))
            .await
            .map_err(|e| DomainError::store("query", e))?;

        Ok(registrations
            .iter()
            .filter_map(|r| self.decode(r))
            .filter(|w| Self::matches(w, &user, actions, predicate))
            .collect())
    }

    async fn lookup(&self, user: &str, id: &str) -> Result<Option<W>, DomainError> {
        let user = self.normalize_key("user", user)?;
        let id = self.normalize_key("id", id)?;

        let registrations = self
            .fetch(RecordFilter::key(&user, &id))
            .await
            .map_err(|e| DomainError::store("lookup", e))?;

        Ok(registrations.first().and_then(|r| self.decode(r)))
    }

    async fn insert(&self, user: &str, webhook: &W) -> Result<StoreResult, DomainError> {
        let user = self.normalize_key("user", user)?;
        let id = self.normalize_key("id", webhook.id())?;

        match self.try_insert(&user, &id, webhook).await {
            Ok(()) => {
                debug!(user = %user, id = %id, "Inserted webhook");
                Ok(StoreResult::Success)
            }
            Err(e) => Ok(Self::write_failed("insert", &user, &id, e)),
        }
    }

    async fn update(&self, user: &str, webhook: &W) -> Result<StoreResult, DomainError> {
        let user = self.normalize_key("user", user)?;
        let id = self.normalize_key("id", webhook.id())?;

        match self.try_update(&user, &id, webhook).await {
            Ok(result) => {
                debug!(user = %user, id = %id, result = %result, "Updated webhook");
                Ok(result)
            }
            Err(e) => Ok(Self::write_failed("update", &user, &id, e)),
        }
    }

    async fn delete(&self, user: &str, id: &str) -> Result<StoreResult, DomainError> {
        let user = self.normalize_key("user", user)?;
        let id = self.normalize_key("id", id)?;

        match self.try_delete(&user, &id).await {
            Ok(result) => {
                debug!(user = %user, id = %id, result = %result, "Deleted webhook");
                Ok(result)
            }
            Err(e) => Ok(Self::write_failed("delete", &user, &id, e)),
        }
    }

    async fn delete_all(&self, user: &str) -> Result<(), DomainError> {
        let user = self.normalize_key("user", user)?;

        let count = self
            .try_delete_all(&user)
            .await
            .map_err(|e| DomainError::store("delete_all", e))?;

        debug!(user = %user, count, "Deleted all webhooks");
        Ok(())
    }

    async fn query_across_all_users(
        &self,
        actions: &[String],
        predicate: Option<&WebHookPredicate<'_, W>>,
    ) -> Result<Vec<W>, DomainError> {
        let registrations = self
            .fetch(RecordFilter::All)
            .await
            .map_err(|e| DomainError::store("query_across_all_users", e))?;

        Ok(registrations
            .iter()
            .filter_map(|r| self.decode(r).map(|w| (w, r.user())))
            .filter(|(w, owner)| Self::matches(w, owner, actions, predicate))
            .map(|(w, _)| w)
            .collect())
    }
}
