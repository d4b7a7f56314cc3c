//! PostgreSQL registration storage with connection pooling

use std::fmt::Debug;
use std::marker::PhantomData;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;

use crate::domain::DomainError;
use crate::domain::storage::{
    PendingChange, RecordFilter, Registration, UnitOfWork, UnitOfWorkFactory,
};

/// Default table holding webhook registrations
pub const DEFAULT_TABLE_NAME: &str = "webhook_registrations";

const MAX_TABLE_NAME_LENGTH: usize = 63;

/// PostgreSQL storage configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to maintain
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout in seconds
    pub idle_timeout_secs: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/webhooks".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl PostgresConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    pub fn with_connect_timeout(mut self, secs: u64) -> Self {
        self.connect_timeout_secs = secs;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.idle_timeout_secs = secs;
        self
    }
}

/// Table names are interpolated into SQL, so only plain identifiers are accepted
pub fn validate_table_name(name: &str) -> Result<(), DomainError> {
    let valid_start = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if !valid_start
        || name.len() > MAX_TABLE_NAME_LENGTH
        || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(DomainError::configuration(format!(
            "Invalid table name '{}'",
            name
        )));
    }

    Ok(())
}

fn select_sql(table_name: &str, filter: &RecordFilter) -> String {
    let columns = format!("SELECT user_id, id, protected_data FROM {}", table_name);

    match filter {
        RecordFilter::All => format!("{} ORDER BY user_id, id", columns),
        RecordFilter::User(_) => format!("{} WHERE user_id = $1 ORDER BY id", columns),
        RecordFilter::Key { .. } => format!("{} WHERE user_id = $1 AND id = $2", columns),
    }
}

fn create_table_sql(table: &str) -> String {
    format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            user_id VARCHAR(256) NOT NULL,
            id VARCHAR(256) NOT NULL,
            protected_data TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            PRIMARY KEY (user_id, id)
        )
        "#,
        table
    )
}

fn registration_from_row<R: Registration>(row: &PgRow) -> Result<R, DomainError> {
    let read = |column: &str| -> Result<String, DomainError> {
        row.try_get(column).map_err(|e| {
            DomainError::storage(format!("Failed to read column '{}': {}", column, e))
        })
    };

    Ok(R::from_parts(
        read("user_id")?,
        read("id")?,
        read("protected_data")?,
    ))
}

/// PostgreSQL registration storage
///
/// Stores one row per `(user_id, id)` with the encoded webhook in
/// `protected_data`. Every unit of work runs inside its own transaction,
/// which is rolled back if the unit is dropped without committing.
pub struct PostgresRegistrationStore<R>
where
    R: Registration,
{
    pool: PgPool,
    table_name: String,
    _phantom: PhantomData<R>,
}

impl<R> Debug for PostgresRegistrationStore<R>
where
    R: Registration,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRegistrationStore")
            .field("table_name", &self.table_name)
            .finish()
    }
}

impl<R> PostgresRegistrationStore<R>
where
    R: Registration,
{
    /// Creates a store over an existing pool; the table name must be a valid identifier
    pub fn new(pool: PgPool, table_name: impl Into<String>) -> Result<Self, DomainError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;

        Ok(Self {
            pool,
            table_name,
            _phantom: PhantomData,
        })
    }

    /// Creates a new store with connection pooling
    pub async fn connect(
        config: &PostgresConfig,
        table_name: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let table_name = table_name.into();
        validate_table_name(&table_name)?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(std::time::Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Self::new(pool, table_name)
    }

    /// Ensures the registration table exists
    pub async fn ensure_table(&self) -> Result<(), DomainError> {
        let query = create_table_sql(&self.table_name);

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create table: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl<R> UnitOfWorkFactory<R> for PostgresRegistrationStore<R>
where
    R: Registration,
{
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<R>>, DomainError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to begin transaction: {}", e)))?;

        Ok(Box::new(PostgresUnitOfWork {
            tx,
            table_name: self.table_name.clone(),
            pending: Vec::new(),
        }))
    }
}

struct PostgresUnitOfWork<R> {
    tx: Transaction<'static, Postgres>,
    table_name: String,
    pending: Vec<PendingChange<R>>,
}

impl<R: Registration> PostgresUnitOfWork<R> {
    async fn execute(
        tx: &mut Transaction<'static, Postgres>,
        table_name: &str,
        change: &PendingChange<R>,
    ) -> Result<(), DomainError> {
        let r = change.registration();

        let query = match change {
            PendingChange::Added(_) => format!(
                "INSERT INTO {} (user_id, id, protected_data) VALUES ($1, $2, $3)",
                table_name
            ),
            PendingChange::Modified(_) => format!(
                "UPDATE {} SET protected_data = $3, updated_at = NOW() WHERE user_id = $1 AND id = $2",
                table_name
            ),
            PendingChange::Deleted(_) => format!(
                "DELETE FROM {} WHERE user_id = $1 AND id = $2",
                table_name
            ),
        };

        let mut statement = sqlx::query(&query).bind(r.user()).bind(r.id());

        if !matches!(change, PendingChange::Deleted(_)) {
            statement = statement.bind(r.protected_data());
        }

        let result = statement.execute(&mut **tx).await.map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => DomainError::conflict(
                format!("Registration '{}/{}' already exists", r.user(), r.id()),
            ),
            other => DomainError::storage(format!("Failed to apply change: {}", other)),
        })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!(
                "Registration '{}/{}' not found",
                r.user(),
                r.id()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl<R> UnitOfWork<R> for PostgresUnitOfWork<R>
where
    R: Registration,
{
    async fn query(&mut self, filter: &RecordFilter) -> Result<Vec<R>, DomainError> {
        let query = select_sql(&self.table_name, filter);
        let mut statement = sqlx::query(&query);

        match filter {
            RecordFilter::All => {}
            RecordFilter::User(user) => statement = statement.bind(user.as_str()),
            RecordFilter::Key { user, id } => {
                statement = statement.bind(user.as_str()).bind(id.as_str())
            }
        }

        let rows = statement
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to query registrations: {}", e)))?;

        rows.iter().map(registration_from_row::<R>).collect()
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
            mut tx,
            table_name,
            pending,
        } = *self;

        for change in &pending {
            Self::execute(&mut tx, &table_name, change).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to commit transaction: {}", e)))?;

        debug!(changes = pending.len(), table = %table_name, "Committed PostgreSQL unit of work");
        Ok(())
    }
}
