//! Organization override storage.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::errors::QuoteEngineError;
use crate::models::OrganizationOverride;

/// Per-organization provider overrides, keyed by provider id.
pub type OverrideMap = HashMap<String, OrganizationOverride>;

/// Source of organization overrides.
///
/// Writes are last-write-wins.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// All overrides an organization has configured.
    async fn get_overrides(&self, organization_id: &str) -> Result<OverrideMap, QuoteEngineError>;

    async fn set_override(
        &self,
        organization_id: &str,
        provider_id: &str,
        layer: OrganizationOverride,
    ) -> Result<(), QuoteEngineError>;

    async fn remove_override(
        &self,
        organization_id: &str,
        provider_id: &str,
    ) -> Result<(), QuoteEngineError>;
}

/// [`OverrideStore`] backed by a process-local map.
#[derive(Default)]
pub struct InMemoryOverrideStore {
    overrides: RwLock<HashMap<String, OverrideMap>>,
}

impl InMemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, OverrideMap>> {
        self.overrides
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, OverrideMap>> {
        self.overrides
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OverrideStore for InMemoryOverrideStore {
    async fn get_overrides(&self, organization_id: &str) -> Result<OverrideMap, QuoteEngineError> {
        Ok(self.read().get(organization_id).cloned().unwrap_or_default())
    }

    async fn set_override(
        &self,
        organization_id: &str,
        provider_id: &str,
        layer: OrganizationOverride,
    ) -> Result<(), QuoteEngineError> {
        if let Some(rate_limit) = &layer.rate_limit {
            rate_limit.validate()?;
        }
        self.write()
            .entry(organization_id.to_string())
            .or_default()
            .insert(provider_id.to_string(), layer);
        Ok(())
    }

    async fn remove_override(
        &self,
        organization_id: &str,
        provider_id: &str,
    ) -> Result<(), QuoteEngineError> {
        if let Some(layers) = self.write().get_mut(organization_id) {
            layers.remove(provider_id);
        }
        Ok(())
    }
}
