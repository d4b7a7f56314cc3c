//! Conversion between domain webhooks and persisted registrations

use tracing::debug;

use crate::domain::DomainError;
use crate::domain::storage::Registration;

use super::entity::WebHookEntity;

#[cfg(test)]
use mockall::automock;

/// Strategy for encoding webhooks into registrations and back
///
/// Swap this out to change the payload encoding (for example to encrypt
/// `protected_data`) without touching the store.
#[cfg_attr(test, automock)]
pub trait WebHookConverter<W, R>: Send + Sync
where
    W: WebHookEntity,
    R: Registration,
{
    /// Decodes a registration; `None` if the payload cannot be read
    fn to_domain(&self, registration: &R) -> Option<W>;

    /// Encodes a webhook into a new registration owned by `user`
    fn to_persisted(&self, user: &str, webhook: &W) -> Result<R, DomainError>;

    /// Encodes a webhook into an existing registration in place
    fn apply_to_existing(
        &self,
        user: &str,
        webhook: &W,
        registration: &mut R,
    ) -> Result<(), DomainError>;
}

/// Stores the webhook as compact JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonWebHookConverter;

impl JsonWebHookConverter {
    fn encode<W: WebHookEntity>(webhook: &W) -> Result<String, DomainError> {
        serde_json::to_string(webhook).map_err(|e| {
            DomainError::serialization(format!(
                "Failed to serialize webhook '{}': {}",
                webhook.id(),
                e
            ))
        })
    }
}

impl<W, R> WebHookConverter<W, R> for JsonWebHookConverter
where
    W: WebHookEntity,
    R: Registration,
{
    fn to_domain(&self, registration: &R) -> Option<W> {
        serde_json::from_str(registration.protected_data())
            .map_err(|e| {
                debug!(
                    user = registration.user(),
                    id = registration.id(),
                    error = %e,
                    "Could not decode registration payload"
                );
            })
            .ok()
    }

    fn to_persisted(&self, user: &str, webhook: &W) -> Result<R, DomainError> {
        let data = Self::encode(webhook)?;
        Ok(R::from_parts(user.to_string(), webhook.id().to_string(), data))
    }

    fn apply_to_existing(
        &self,
        user: &str,
        webhook: &W,
        registration: &mut R,
    ) -> Result<(), DomainError> {
        let data = Self::encode(webhook)?;
        registration.set_user(user.to_string());
        registration.set_id(webhook.id().to_string());
        registration.set_protected_data(data);
        Ok(())
    }
}
