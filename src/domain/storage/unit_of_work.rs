//! Unit-of-work capability over a registration record set

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::DomainError;

use super::registration::{RecordFilter, Registration};

/// A state transition recorded against a unit of work, applied at commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingChange<R> {
    Added(R),
    Modified(R),
    Deleted(R),
}

impl<R: Registration> PendingChange<R> {
    pub fn registration(&self) -> &R {
        match self {
            Self::Added(r) | Self::Modified(r) | Self::Deleted(r) => r,
        }
    }
}

/// Short-lived exclusive handle over the persistence context
///
/// Reads go straight to the backend. Writes are only recorded until `commit`.
/// Dropping a unit of work without committing discards its pending changes.
#[async_trait]
pub trait UnitOfWork<R>: Send
where
    R: Registration,
{
    /// Fetches every registration selected by the filter
    async fn query(&mut self, filter: &RecordFilter) -> Result<Vec<R>, DomainError>;

    /// Attaches a registration as a new row
    fn add(&mut self, registration: R);

    /// Marks an existing row as modified
    fn mark_modified(&mut self, registration: R);

    /// Marks an existing row for removal
    fn mark_deleted(&mut self, registration: R);

    /// Applies all pending changes as one unit and releases the scope
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}

/// Opens units of work; lifetime and pooling belong to the implementor
#[async_trait]
pub trait UnitOfWorkFactory<R>: Send + Sync + Debug
where
    R: Registration,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<R>>, DomainError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct Faults {
        begin: Option<String>,
        query: Option<String>,
        commit: Option<String>,
        remove_rows_at_commit: bool,
    }

    #[derive(Debug, Default)]
    struct Counters {
        opened: AtomicUsize,
        released: AtomicUsize,
        commits: AtomicUsize,
    }

    /// Mock unit-of-work factory for testing
    ///
    /// Keeps rows in a shared vector, counts opened and released scopes, and
    /// can be told to fail at begin, query or commit. Commits apply all
    /// changes or none, like the real backends.
    #[derive(Debug)]
    pub struct MockUnitOfWorkFactory<R>
    where
        R: Registration,
    {
        rows: Arc<Mutex<Vec<R>>>,
        faults: Arc<Mutex<Faults>>,
        counters: Arc<Counters>,
    }

    impl<R> Default for MockUnitOfWorkFactory<R>
    where
        R: Registration,
    {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<R> MockUnitOfWorkFactory<R>
    where
        R: Registration,
    {
        pub fn new() -> Self {
            Self {
                rows: Arc::new(Mutex::new(Vec::new())),
                faults: Arc::new(Mutex::new(Faults::default())),
                counters: Arc::new(Counters::default()),
            }
        }

        pub fn with_registration(self, registration: R) -> Self {
            self.rows.lock().unwrap().push(registration);
            self
        }

        pub fn with_begin_error(self, error: impl Into<String>) -> Self {
            self.faults.lock().unwrap().begin = Some(error.into());
            self
        }

        pub fn with_query_error(self, error: impl Into<String>) -> Self {
            self.faults.lock().unwrap().query = Some(error.into());
            self
        }

        pub fn with_commit_error(self, error: impl Into<String>) -> Self {
            self.faults.lock().unwrap().commit = Some(error.into());
            self
        }

        /// Clears every row just before each commit applies its changes,
        /// as if another writer committed first
        pub fn with_rows_removed_at_commit(self) -> Self {
            self.faults.lock().unwrap().remove_rows_at_commit = true;
            self
        }

        pub fn rows(&self) -> Vec<R> {
            self.rows.lock().unwrap().clone()
        }

        pub fn opened(&self) -> usize {
            self.counters.opened.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.counters.released.load(Ordering::SeqCst)
        }

        pub fn commits(&self) -> usize {
            self.counters.commits.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl<R> UnitOfWorkFactory<R> for MockUnitOfWorkFactory<R>
    where
        R: Registration,
    {
        async fn begin(&self) -> Result<Box<dyn UnitOfWork<R>>, DomainError> {
            if let Some(error) = self.faults.lock().unwrap().begin.clone() {
                return Err(DomainError::storage(error));
            }

            self.counters.opened.fetch_add(1, Ordering::SeqCst);

            Ok(Box::new(MockUnitOfWork {
                rows: Arc::clone(&self.rows),
                faults: Arc::clone(&self.faults),
                counters: Arc::clone(&self.counters),
                pending: Vec::new(),
            }))
        }
    }

    struct MockUnitOfWork<R> {
        rows: Arc<Mutex<Vec<R>>>,
        faults: Arc<Mutex<Faults>>,
        counters: Arc<Counters>,
        pending: Vec<PendingChange<R>>,
    }

    impl<R> Drop for MockUnitOfWork<R> {
        fn drop(&mut self) {
            self.counters.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn same_key<R: Registration>(a: &R, b: &R) -> bool {
        a.user() == b.user() && a.id() == b.id()
    }

    fn missing<R: Registration>(r: &R) -> DomainError {
        DomainError::not_found(format!("Registration '{}/{}' not found", r.user(), r.id()))
    }

    #[async_trait]
    impl<R> UnitOfWork<R> for MockUnitOfWork<R>
    where
        R: Registration,
    {
        async fn query(&mut self, filter: &RecordFilter) -> Result<Vec<R>, DomainError> {
            if let Some(error) = self.faults.lock().unwrap().query.clone() {
                return Err(DomainError::storage(error));
            }

            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| filter.matches(*r))
                .cloned()
                .collect())
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
            let remove_rows = {
                let faults = self.faults.lock().unwrap();
                if let Some(error) = faults.commit.clone() {
                    return Err(DomainError::storage(error));
                }
                faults.remove_rows_at_commit
            };

            let mut rows = self.rows.lock().unwrap();
            if remove_rows {
                rows.clear();
            }

            let mut working = rows.clone();

            for change in &self.pending {
                match change {
                    PendingChange::Added(r) => {
                        if working.iter().any(|existing| same_key(existing, r)) {
                            return Err(DomainError::conflict(format!(
                                "Registration '{}/{}' already exists",
                                r.user(),
                                r.id()
                            )));
                        }
                        working.push(r.clone());
                    }
                    PendingChange::Modified(r) => {
                        match working.iter_mut().find(|e| same_key(&**e, r)) {
                            Some(existing) => *existing = r.clone(),
                            None => return Err(missing(r)),
                        }
                    }
                    PendingChange::Deleted(r) => {
                        if !working.iter().any(|e| same_key(e, r)) {
                            return Err(missing(r));
                        }
                        working.retain(|e| !same_key(e, r));
                    }
                }
            }

            *rows = working;
            drop(rows);
            self.counters.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::storage::WebHookRegistration;

        fn registration(user: &str, id: &str) -> WebHookRegistration {
            WebHookRegistration::from_parts(user.to_string(), id.to_string(), "{}".to_string())
        }

        #[tokio::test]
        async fn test_mock_add_and_commit() {
            let factory: MockUnitOfWorkFactory<WebHookRegistration> = MockUnitOfWorkFactory::new();

            let mut uow = factory.begin().await.unwrap();
            uow.add(registration("alice", "w1"));
            uow.commit().await.unwrap();

            assert_eq!(factory.rows().len(), 1);
            assert_eq!(factory.commits(), 1);
            assert_eq!(factory.opened(), 1);
            assert_eq!(factory.released(), 1);
        }

        #[tokio::test]
        async fn test_mock_drop_discards_pending() {
            let factory: MockUnitOfWorkFactory<WebHookRegistration> = MockUnitOfWorkFactory::new();

            {
                let mut uow = factory.begin().await.unwrap();
                uow.add(registration("alice", "w1"));
            }

            assert!(factory.rows().is_empty());
            assert_eq!(factory.released(), 1);
        }

        #[tokio::test]
        async fn test_mock_duplicate_add_conflicts() {
            let factory = MockUnitOfWorkFactory::new().with_registration(registration("alice", "w1"));

            let mut uow = factory.begin().await.unwrap();
            uow.add(registration("alice", "w1"));
            let result = uow.commit().await;

            assert!(matches!(result, Err(DomainError::Conflict { .. })));
        }

        #[tokio::test]
        async fn test_mock_modify_missing_fails_and_applies_nothing() {
            let factory = MockUnitOfWorkFactory::new().with_registration(registration("alice", "w1"));

            let mut uow = factory.begin().await.unwrap();
            uow.mark_deleted(registration("alice", "w1"));
            uow.mark_modified(registration("alice", "w2"));
            let result = uow.commit().await;

            assert!(matches!(result, Err(DomainError::NotFound { .. })));
            assert_eq!(factory.rows(), vec![registration("alice", "w1")]);
            assert_eq!(factory.commits(), 0);
        }

        #[tokio::test]
        async fn test_mock_rows_removed_at_commit() {
            let factory = MockUnitOfWorkFactory::new()
                .with_registration(registration("alice", "w1"))
                .with_rows_removed_at_commit();

            let mut uow = factory.begin().await.unwrap();
            assert_eq!(uow.query(&RecordFilter::All).await.unwrap().len(), 1);
            uow.mark_deleted(registration("alice", "w1"));

            assert!(matches!(uow.commit().await, Err(DomainError::NotFound { .. })));
            assert!(factory.rows().is_empty());
        }

        #[tokio::test]
        async fn test_mock_query_error() {
            let factory: MockUnitOfWorkFactory<WebHookRegistration> =
                MockUnitOfWorkFactory::new().with_query_error("Simulated query error");

            let mut uow = factory.begin().await.unwrap();
            let result = uow.query(&RecordFilter::All).await;

            assert!(matches!(result, Err(DomainError::Storage { .. })));
        }

        #[tokio::test]
        async fn test_mock_begin_error() {
            let factory: MockUnitOfWorkFactory<WebHookRegistration> =
                MockUnitOfWorkFactory::new().with_begin_error("Simulated begin error");

            assert!(factory.begin().await.is_err());
            assert_eq!(factory.opened(), 0);
        }
    }
}
