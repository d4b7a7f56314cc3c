//! Persisted registration record and record filters

use std::fmt::Debug;

/// Capability of a persisted webhook registration row
///
/// A registration is keyed by `(user, id)` and carries the serialized webhook
/// in `protected_data`. The storage layer never looks inside the payload.
pub trait Registration: Clone + Debug + Send + Sync + 'static {
    /// Builds a new record from its three columns
    fn from_parts(user: String, id: String, protected_data: String) -> Self;

    fn user(&self) -> &str;

    fn id(&self) -> &str;

    fn protected_data(&self) -> &str;

    fn set_user(&mut self, user: String);

    fn set_id(&mut self, id: String);

    fn set_protected_data(&mut self, protected_data: String);
}

/// Default registration row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebHookRegistration {
    pub user: String,
    pub id: String,
    pub protected_data: String,
}

impl Registration for WebHookRegistration {
    fn from_parts(user: String, id: String, protected_data: String) -> Self {
        Self {
            user,
            id,
            protected_data,
        }
    }

    fn user(&self) -> &str {
        &self.user
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn protected_data(&self) -> &str {
        &self.protected_data
    }

    fn set_user(&mut self, user: String) {
        self.user = user;
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn set_protected_data(&mut self, protected_data: String) {
        self.protected_data = protected_data;
    }
}

/// Selection of registrations handed to the persistence context
///
/// Kept as data rather than a closure so SQL backends can translate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every registration regardless of owner
    All,
    /// All registrations owned by one user
    User(String),
    /// The single registration with this `(user, id)` key
    Key { user: String, id: String },
}

impl RecordFilter {
    pub fn user(user: impl Into<String>) -> Self {
        Self::User(user.into())
    }

    pub fn key(user: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Key {
            user: user.into(),
            id: id.into(),
        }
    }

    /// Returns true if the registration is selected by this filter
    pub fn matches<R: Registration>(&self, registration: &R) -> bool {
        match self {
            Self::All => true,
            Self::User(user) => registration.user() == user,
            Self::Key { user, id } => registration.user() == user && registration.id() == id,
        }
    }
}
