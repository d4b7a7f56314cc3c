//! In-memory registration storage

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::DomainError;
use crate::domain::storage::{
    PendingChange, RecordFilter, Registration, UnitOfWork, UnitOfWorkFactory,
};

type RecordKey = (String, String);

fn record_key<R: Registration>(registration: &R) -> RecordKey {
    (registration.user().to_string(), registration.id().to_string())
}

/// Thread-safe in-memory registration storage
///
/// Useful for testing and development. Data is lost when the process terminates.
/// Each unit of work applies its pending changes all-or-nothing at commit.
#[derive(Debug)]
pub struct InMemoryRegistrationStore<R>
where
    R: Registration,
{
    records: Arc<RwLock<BTreeMap<RecordKey, R>>>,
}

impl<R> Default for InMemoryRegistrationStore<R>
where
    R: Registration,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<R> InMemoryRegistrationStore<R>
where
    R: Registration,
{
    /// Creates a new empty store
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Creates a store pre-populated with registrations
    pub fn with_registrations(registrations: Vec<R>) -> Self {
        let records = registrations
            .into_iter()
            .map(|r| (record_key(&r), r))
            .collect();

        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Returns the number of stored registrations
    pub fn len(&self) -> Result<usize, DomainError> {
        let records = self.records.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(records.len())
    }

    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl<R> UnitOfWorkFactory<R> for InMemoryRegistrationStore<R>
where
    R: Registration,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<R>>, DomainError> {
        Ok(Box::new(InMemoryUnitOfWork {
            records: Arc::clone(&self.records),
            pending: Vec::new(),
        }))
    }
}

struct InMemoryUnitOfWork<R> {
    records: Arc<RwLock<BTreeMap<RecordKey, R>>>,
    pending: Vec<PendingChange<R>>,
}

impl<R: Registration> InMemoryUnitOfWork<R> {
    fn apply(
        working: &mut BTreeMap<RecordKey, R>,
        change: PendingChange<R>,
    ) -> Result<(), DomainError> {
        let key = record_key(change.registration());

        match change {
            PendingChange::Added(r) => {
                if working.contains_key(&key) {
                    return Err(DomainError::conflict(format!(
                        "Registration '{}/{}' already exists",
                        key.0, key.1
                    )));
                }
                working.insert(key, r);
            }
            PendingChange::Modified(r) => match working.get_mut(&key) {
                Some(existing) => *existing = r,
                None => {
                    return Err(DomainError::not_found(format!(
                        "Registration '{}/{}' not found",
                        key.0, key.1
                    )));
                }
            },
            PendingChange::Deleted(_) => {
                if working.remove(&key).is_none() {
                    return Err(DomainError::not_found(format!(
                        "Registration '{}/{}' not found",
                        key.0, key.1
                    )));
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<R> UnitOfWork<R> for InMemoryUnitOfWork<R>
where
    R: Registration,
{
    async fn query(&mut self, filter: &RecordFilter) -> Result<Vec<R>, DomainError> {
        let records = self.records.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        let found = match filter {
            RecordFilter::Key { user, id } => records
                .get(&(user.clone(), id.clone()))
                .cloned()
                .into_iter()
                .collect(),
            _ => records
                .values()
                .filter(|r| filter.matches(*r))
                .cloned()
                .collect(),
        };

        Ok(found)
    }

    fn add(&mut self, registration: R) {
        self.pending.push(PendingChange::Added(registration));
    }

    fn mark_modified(&mut self, registration: R) {
        self.pending.push(PendingChange::Modified(registration));
    }

    fn mark_deleted(&mut self, registration: R) {
        self.pending.push(PendingChange::Deleted(registration));
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let Self {
            records: shared,
            pending,
        } = *self;

        let mut records = shared.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let count = pending.len();
        let mut working = records.clone();

        for change in pending {
            Self::apply(&mut working, change)?;
        }

        *records = working;
        debug!(changes = count, "Committed in-memory unit of work");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::storage::WebHookRegistration;

    fn registration(user: &str, id: &str, data: &str) -> WebHookRegistration {
        WebHookRegistration::from_parts(user.to_string(), id.to_string(), data.to_string())
    }

    fn store() -> InMemoryRegistrationStore<WebHookRegistration> {
        InMemoryRegistrationStore::new()
    }

    #[tokio::test]
    async fn test_add_and_query() {
        let store = store();

        let mut uow = store.begin().await.unwrap();
        uow.add(registration("alice", "w1", "a"));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let found = uow.query(&RecordFilter::key("alice", "w1")).await.unwrap();

        assert_eq!(found, vec![registration("alice", "w1", "a")]);
    }

    #[tokio::test]
    async fn test_query_by_user() {
        let store = InMemoryRegistrationStore::with_registrations(vec![
            registration("alice", "w1", "a"),
            registration("alice", "w2", "b"),
            registration("bob", "w1", "c"),
        ]);

        let mut uow = store.begin().await.unwrap();

        assert_eq!(uow.query(&RecordFilter::user("alice")).await.unwrap().len(), 2);
        assert_eq!(uow.query(&RecordFilter::user("bob")).await.unwrap().len(), 1);
        assert_eq!(uow.query(&RecordFilter::All).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_uncommitted_changes_are_discarded() {
        let store = store();

        {
            let mut uow = store.begin().await.unwrap();
            uow.add(registration("alice", "w1", "a"));
        }

        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_add_conflicts() {
        let store = InMemoryRegistrationStore::with_registrations(vec![registration(
            "alice", "w1", "a",
        )]);

        let mut uow = store.begin().await.unwrap();
        uow.add(registration("alice", "w1", "b"));
        let result = uow.commit().await;

        assert!(matches!(result, Err(DomainError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_failed_commit_applies_nothing() {
        let store = InMemoryRegistrationStore::with_registrations(vec![registration(
            "alice", "w1", "a",
        )]);

        let mut uow = store.begin().await.unwrap();
        uow.add(registration("alice", "w2", "b"));
        uow.add(registration("alice", "w1", "c"));
        assert!(uow.commit().await.is_err());

        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_modify() {
        let store = InMemoryRegistrationStore::with_registrations(vec![registration(
            "alice", "w1", "a",
        )]);

        let mut uow = store.begin().await.unwrap();
        uow.mark_modified(registration("alice", "w1", "updated"));
        uow.commit().await.unwrap();

        let mut uow = store.begin().await.unwrap();
        let found = uow.query(&RecordFilter::key("alice", "w1")).await.unwrap();
        assert_eq!(found[0].protected_data, "updated");
    }

    #[tokio::test]
    async fn test_modify_missing_is_not_found() {
        let store = store();

        let mut uow = store.begin().await.unwrap();
        uow.mark_modified(registration("alice", "w1", "a"));
        let result = uow.commit().await;

        assert!(matches!(result, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryRegistrationStore::with_registrations(vec![
            registration("alice", "w1", "a"),
            registration("alice", "w2", "b"),
        ]);

        let mut uow = store.begin().await.unwrap();
        uow.mark_deleted(registration("alice", "w1", "a"));
        uow.commit().await.unwrap();

        assert_eq!(store.len().unwrap(), 1);
    }
}
