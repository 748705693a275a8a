//! The identity registry contract.

use async_trait::async_trait;
use recipes_core::{ExternalId, Result};

use crate::error::RegistryError;
use crate::user::{User, UserDetails};

/// Records log-ins and answers whether an identity still has a local record.
#[async_trait]
pub trait IdentityRegistry: Send + Sync {
    /// Ensures a record exists for `id` and stamps its last log-in time.
    ///
    /// Returns true if this call created the record. Create-if-absent and the
    /// log-in stamp must happen atomically so that concurrent first log-ins
    /// for the same identity yield exactly one `true`.
    async fn record_log_in(&self, id: &ExternalId) -> Result<bool, RegistryError>;

    /// Returns true if a record exists for `id`.
    async fn exists(&self, id: &ExternalId) -> Result<bool, RegistryError>;

    /// Loads the record for `id`, if one exists.
    async fn find(&self, id: &ExternalId) -> Result<Option<User>, RegistryError>;

    /// Stores the details submitted on the registration-completion form.
    async fn update_details(
        &self,
        id: &ExternalId,
        details: &UserDetails,
    ) -> Result<(), RegistryError>;
}
