//! Empirical tracking of which optional-extension columns the store accepts.

use nutri_core::config::ExtensionPolicy;
use nutri_core::profile::{FieldUpdateSet, ProfileField};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// What this client has observed about one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSupport {
    /// Never written, never rejected
    #[default]
    Unknown,
    /// A write containing it succeeded
    Supported,
    /// The store reported it as an unknown column
    Unsupported,
}

/// Per-field schema knowledge for the optional-extension set.
///
/// Learned from write outcomes only; allowed fields are always considered
/// sendable.
#[derive(Debug, Default)]
pub struct SchemaSupport {
    policy: ExtensionPolicy,
    observed: RwLock<HashMap<ProfileField, FieldSupport>>,
}

impl SchemaSupport {
    pub fn new(policy: ExtensionPolicy) -> Self {
        Self {
            policy,
            observed: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ProfileField, FieldSupport>> {
        self.observed.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ProfileField, FieldSupport>> {
        self.observed.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn policy(&self) -> ExtensionPolicy {
        self.policy
    }

    pub fn support(&self, field: ProfileField) -> FieldSupport {
        self.read().get(&field).copied().unwrap_or_default()
    }

    /// Whether `field` should be included in the next write.
    pub fn should_send(&self, field: ProfileField) -> bool {
        if !field.is_optional_extension() {
            return true;
        }
        match self.policy {
            ExtensionPolicy::Enabled => true,
            ExtensionPolicy::Disabled => false,
            ExtensionPolicy::Auto => self.support(field) != FieldSupport::Unsupported,
        }
    }

    /// Drops extension fields the store is known (or configured) not to accept.
    pub fn filter(&self, updates: &FieldUpdateSet) -> FieldUpdateSet {
        updates.retain(|field| {
            let send = self.should_send(field);
            if !send {
                tracing::debug!(field = %field, "Omitting unsupported extension field");
            }
            send
        })
    }

    /// Records that a write containing `written` succeeded.
    pub fn record_written(&self, written: &FieldUpdateSet) {
        let mut observed = self.write();
        for field in written.fields().filter(ProfileField::is_optional_extension) {
            observed.insert(field, FieldSupport::Supported);
        }
    }

    /// Records that the store rejected `field` as an unknown column.
    pub fn record_rejected(&self, field: ProfileField) {
        if field.is_optional_extension() {
            self.write().insert(field, FieldSupport::Unsupported);
        }
    }
}
