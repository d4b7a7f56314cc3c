//! Webhook domain entities

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

/// Filter name that subscribes a webhook to every action
pub const WILDCARD_FILTER: &str = "*";

/// Capability of a domain webhook the store can persist
///
/// The store only ever looks at the id and the action filters; everything
/// else travels inside the serialized payload.
pub trait WebHookEntity:
    Clone + Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Identifier of the subscription within its owner
    fn id(&self) -> &str;

    /// Action names the webhook is subscribed to
    fn filters(&self) -> &BTreeSet<String>;

    /// Returns true if the webhook is subscribed to at least one requested action
    ///
    /// Comparison ignores ASCII case. A webhook carrying the wildcard filter
    /// matches every request, an empty one included; otherwise an empty
    /// request matches nothing.
    fn matches_any_action(&self, requested: &[String]) -> bool {
        let filters = self.filters();

        if filters.contains(WILDCARD_FILTER) {
            return true;
        }

        requested
            .iter()
            .any(|r| filters.iter().any(|f| f.eq_ignore_ascii_case(r)))
    }
}

/// Webhook subscription registered by a user
///
/// Field names serialize in PascalCase and maps are ordered so the encoded
/// payload is stable across writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebHook {
    /// Identifier, unique per user
    pub id: String,
    /// Target URI notifications are posted to
    pub web_hook_uri: String,
    /// Shared secret used by the sender to sign notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Paused webhooks stay registered but are skipped by senders
    #[serde(default)]
    pub is_paused: bool,
    /// Action names this webhook is subscribed to
    #[serde(default)]
    pub filters: BTreeSet<String>,
    /// Extra HTTP headers to send with each notification
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Free-form properties echoed back in each notification
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl WebHook {
    /// Creates a webhook with a freshly generated id
    pub fn new(web_hook_uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            web_hook_uri: web_hook_uri.into(),
            secret: None,
            description: None,
            is_paused: false,
            filters: BTreeSet::new(),
            headers: BTreeMap::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets the id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the signing secret
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Sets the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds an action filter
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.insert(filter.into());
        self
    }

    /// Adds a custom header
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Adds a property
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Sets the paused flag
    pub fn paused(mut self, is_paused: bool) -> Self {
        self.is_paused = is_paused;
        self
    }
}

impl WebHookEntity for WebHook {
    fn id(&self) -> &str {
        &self.id
    }

    fn filters(&self) -> &BTreeSet<String> {
        &self.filters
    }
}
