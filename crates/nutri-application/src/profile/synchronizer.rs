//! Profile synchronizer.
//!
//! Reconciles a [`FieldUpdateSet`] with the remote profile record using an
//! existence check followed by either an update or an insert, and recovers
//! from schema drift by stripping fields the store does not know.

use super::schema_support::SchemaSupport;
use nutri_core::config::ProfileConfig;
use nutri_core::error::{NutriError, Result};
use nutri_core::profile::{FieldUpdateSet, Profile, ProfileField};
use nutri_core::session::Session;
use nutri_core::store::{FailureClass, Record, RecordKey, RecordStore, StoreFailure};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;

/// Which write the save ended with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOperation {
    Updated,
    Inserted,
    /// Nothing to write; the existing record was returned
    Unchanged,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveOutcome {
    /// The record as the store returned it
    pub profile: Profile,
    pub operation: WriteOperation,
    /// Fields stripped because the store does not have the column
    pub dropped: Vec<ProfileField>,
    /// Number of write attempts, including the successful one
    pub attempts: usize,
}

/// Owns the update-or-insert protocol for the profile table.
pub struct ProfileSynchronizer {
    store: Arc<dyn RecordStore>,
    table: String,
    key_column: String,
    default_display_name: String,
    schema: SchemaSupport,
}

impl ProfileSynchronizer {
    pub fn new(store: Arc<dyn RecordStore>, config: &ProfileConfig) -> Self {
        Self {
            store,
            table: config.table.clone(),
            key_column: config.key_column.clone(),
            default_display_name: config.default_display_name.clone(),
            schema: SchemaSupport::new(config.extension_fields),
        }
    }

    pub fn schema_support(&self) -> &SchemaSupport {
        &self.schema
    }

    fn key_for(&self, user_id: &str) -> RecordKey {
        RecordKey::new(&self.key_column, user_id)
    }

    /// Fetches the profile for `user_id`.
    pub async fn load(&self, user_id: &str) -> Result<Option<Profile>> {
        tracing::debug!(user_id, table = %self.table, "Loading profile");
        let record = self
            .store
            .fetch_one(&self.table, &self.key_for(user_id))
            .await?;
        record.map(Profile::from_record).transpose()
    }

    /// Name used for a freshly inserted profile: session metadata, then the
    /// email's local part, then the configured default.
    pub fn display_name_fallback(&self, session: &Session) -> String {
        session
            .metadata_display_name()
            .or_else(|| session.email_local_part())
            .unwrap_or(self.default_display_name.as_str())
            .to_string()
    }

    /// Writes `updates` to the profile of `session`'s user.
    ///
    /// A schema-drift failure naming a field of the current set strips that
    /// field and retries with the smaller set, so the loop makes at most
    /// `updates.len()` writes. Any other failure, or drift that cannot be
    /// attributed to a field still in the set, is returned as is.
    ///
    /// Once a write has succeeded the save succeeds: a returned record that
    /// does not decode is replaced by a bare profile for the user.
    pub async fn save(&self, session: &Session, updates: FieldUpdateSet) -> Result<SaveOutcome> {
        let user_id = session.user_id.as_str();
        let mut current = updates;
        let mut dropped: Vec<ProfileField> = Vec::new();
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!(user_id, attempt = attempts, fields = current.len(), "Saving profile");

            let failure = match self.write_once(session, &current).await {
                Ok((record, operation)) => {
                    self.schema.record_written(&current);
                    let profile = Profile::from_record(record).unwrap_or_else(|e| {
                        tracing::warn!(user_id, error = %e, "Saved profile did not decode");
                        Profile {
                            id: user_id.to_string(),
                            ..Profile::default()
                        }
                    });
                    tracing::info!(
                        user_id,
                        ?operation,
                        attempts,
                        dropped = dropped.len(),
                        "Profile saved"
                    );
                    return Ok(SaveOutcome {
                        profile,
                        operation,
                        dropped,
                        attempts,
                    });
                }
                Err(failure) => failure,
            };

            let field = match failure.classify() {
                FailureClass::Other => {
                    tracing::warn!(user_id, error = %failure, "Profile save failed");
                    return Err(NutriError::Store(failure));
                }
                FailureClass::SchemaDrift { field } => field,
            };

            // A stripped field is no longer in `current`, so a store that
            // keeps rejecting it ends up here rather than looping.
            let Some(strip) = field
                .as_deref()
                .and_then(|name| ProfileField::from_str(name).ok())
                .filter(|f| current.contains(*f))
            else {
                tracing::warn!(user_id, field = ?field, error = %failure, "Unrecoverable schema drift");
                return Err(NutriError::SchemaDrift { field, failure });
            };

            tracing::warn!(user_id, field = %strip, "Store lacks column; retrying without it");
            self.schema.record_rejected(strip);
            dropped.push(strip);
            current = current.without(strip);

            if current.is_empty() {
                return Err(NutriError::NothingPersisted {
                    removed: dropped.iter().map(ToString::to_string).collect(),
                });
            }
        }
    }

    async fn write_once(
        &self,
        session: &Session,
        updates: &FieldUpdateSet,
    ) -> std::result::Result<(Record, WriteOperation), StoreFailure> {
        let key = self.key_for(&session.user_id);

        if let Some(existing) = self.store.fetch_one(&self.table, &key).await? {
            if updates.is_empty() {
                return Ok((existing, WriteOperation::Unchanged));
            }
            let record = self
                .store
                .update_one(&self.table, &key, updates.to_record())
                .await?;
            return Ok((record, WriteOperation::Updated));
        }

        let mut fields = Record::new();
        fields.insert(self.key_column.clone(), Value::from(session.user_id.clone()));
        fields.insert(
            ProfileField::FullName.to_string(),
            Value::from(self.display_name_fallback(session)),
        );
        // caller-supplied values win over the fallback
        fields.extend(updates.to_record());

        let record = self.store.insert_one(&self.table, fields).await?;
        Ok((record, WriteOperation::Inserted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Calls {
        fetch: usize,
        update: usize,
        insert: usize,
    }

    // Mock RecordStore emulating a table with a fixed set of columns
    struct MockStore {
        columns: HashSet<String>,
        rows: Mutex<HashMap<String, Record>>,
        calls: Mutex<Calls>,
        failure: Option<StoreFailure>,
    }

    impl MockStore {
        fn with_columns(columns: &[&str]) -> Self {
            Self {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows: Mutex::new(HashMap::new()),
                calls: Mutex::new(Calls::default()),
                failure: None,
            }
        }

        fn full_schema() -> Self {
            let mut columns: Vec<String> = vec!["id".to_string()];
            columns.extend(nutri_core::profile::ProfileField::allowed().map(|f| f.to_string()));
            columns.extend(
                nutri_core::profile::ProfileField::optional_extensions().map(|f| f.to_string()),
            );
            let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
            Self::with_columns(&refs)
        }

        fn failing_with(mut self, failure: StoreFailure) -> Self {
            self.failure = Some(failure);
            self
        }

        fn seed(&self, id: &str) {
            let mut row = Record::new();
            row.insert("id".to_string(), json!(id));
            row.insert("full_name".to_string(), json!("Seeded"));
            self.rows.lock().unwrap().insert(id.to_string(), row);
        }

        fn row(&self, id: &str) -> Option<Record> {
            self.rows.lock().unwrap().get(id).cloned()
        }

        fn check(&self, fields: &Record) -> std::result::Result<(), StoreFailure> {
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            match fields.keys().find(|k| !self.columns.contains(*k)) {
                Some(unknown) => Err(StoreFailure::unknown_column_named(unknown, "profiles")),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl RecordStore for MockStore {
        async fn fetch_one(
            &self,
            _table: &str,
            key: &RecordKey,
        ) -> std::result::Result<Option<Record>, StoreFailure> {
            self.calls.lock().unwrap().fetch += 1;
            Ok(self.row(&key.value))
        }

        async fn update_one(
            &self,
            _table: &str,
            key: &RecordKey,
            fields: Record,
        ) -> std::result::Result<Record, StoreFailure> {
            self.calls.lock().unwrap().update += 1;
            self.check(&fields)?;
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .get_mut(&key.value)
                .ok_or_else(|| StoreFailure::new("PGRST116", "no rows"))?;
            row.extend(fields);
            Ok(row.clone())
        }

        async fn insert_one(
            &self,
            _table: &str,
            fields: Record,
        ) -> std::result::Result<Record, StoreFailure> {
            self.calls.lock().unwrap().insert += 1;
            self.check(&fields)?;
            let id = fields["id"].as_str().unwrap().to_string();
            self.rows.lock().unwrap().insert(id, fields.clone());
            Ok(fields)
        }
    }

    fn synchronizer(store: Arc<MockStore>) -> ProfileSynchronizer {
        ProfileSynchronizer::new(store, &ProfileConfig::default())
    }

    fn session() -> Session {
        Session::new("u1", "jane@example.com")
    }

    #[tokio::test]
    async fn test_update_path_uses_single_round_trip() {
        let store = Arc::new(MockStore::full_schema());
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let updates = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::Weight, 70.5);
        let outcome = sync.save(&session(), updates).await.unwrap();

        assert_eq!(outcome.operation, WriteOperation::Updated);
        assert_eq!(outcome.attempts, 1);
        assert!(outcome.dropped.is_empty());
        assert_eq!(outcome.profile.age, Some(41));
        assert_eq!(outcome.profile.full_name.as_deref(), Some("Seeded"));

        let calls = store.calls.lock().unwrap();
        assert_eq!((calls.fetch, calls.update, calls.insert), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_insert_path_when_record_absent() {
        let store = Arc::new(MockStore::full_schema());
        let sync = synchronizer(store.clone());

        let outcome = sync
            .save(&session(), FieldUpdateSet::new().with(ProfileField::Age, 29))
            .await
            .unwrap();

        assert_eq!(outcome.operation, WriteOperation::Inserted);
        assert_eq!(outcome.profile.id, "u1");
        assert_eq!(outcome.profile.full_name.as_deref(), Some("jane"));
        let calls = store.calls.lock().unwrap();
        assert_eq!((calls.fetch, calls.update, calls.insert), (1, 0, 1));
    }

    #[tokio::test]
    async fn test_caller_full_name_overrides_fallback() {
        let store = Arc::new(MockStore::full_schema());
        let sync = synchronizer(store.clone());
        let session = session().with_metadata("full_name", "Jane Doe");

        let outcome = sync
            .save(
                &session,
                FieldUpdateSet::new().with(ProfileField::FullName, "J. Doe"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.profile.full_name.as_deref(), Some("J. Doe"));
    }

    #[test]
    fn test_display_name_fallback_order() {
        let sync = synchronizer(Arc::new(MockStore::full_schema()));
        assert_eq!(
            sync.display_name_fallback(&session().with_metadata("full_name", "Jane Doe")),
            "Jane Doe"
        );
        assert_eq!(sync.display_name_fallback(&session()), "jane");
        assert_eq!(
            sync.display_name_fallback(&Session::new("u1", "@nowhere")),
            "User"
        );
    }

    #[tokio::test]
    async fn test_strips_unknown_column_and_retries() {
        let store = Arc::new(MockStore::with_columns(&["id", "full_name", "age"]));
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let updates = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::Allergies, vec!["peanuts"]);
        let outcome = sync.save(&session(), updates).await.unwrap();

        assert_eq!(outcome.profile.age, Some(41));
        assert_eq!(outcome.dropped, vec![ProfileField::Allergies]);
        assert_eq!(outcome.attempts, 2);
        assert!(!store.row("u1").unwrap().contains_key("allergies"));
        assert_eq!(
            sync.schema_support().support(ProfileField::Allergies),
            crate::profile::FieldSupport::Unsupported
        );
    }

    // Every field is rejected in turn: one write per field, so n writes and
    // n - 1 retries before the emptied set is reported.
    #[tokio::test]
    async fn test_all_unknown_fields_fail_after_one_write_per_field() {
        let store = Arc::new(MockStore::with_columns(&["id", "full_name"]));
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let updates = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::Bio, "hi")
            .with(ProfileField::Height, 170)
            .with(ProfileField::HealthConditions, vec!["none"]);
        let count = updates.len();

        let err = sync.save(&session(), updates).await.unwrap_err();
        let NutriError::NothingPersisted { removed } = err else {
            panic!("expected NothingPersisted, got {err:?}");
        };
        assert_eq!(removed.len(), count);
        assert_eq!(count, 4);
        assert_eq!(store.calls.lock().unwrap().update, 4);
    }

    #[tokio::test]
    async fn test_mistyped_values_never_reach_the_store() {
        let store = Arc::new(MockStore::full_schema());
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let input = json!({
            "age": "41",
            "weight": 70,
            "height": -5,
            "daily_calorie_goal": 2100.4,
        });
        let updates = FieldUpdateSet::from_record(input.as_object().unwrap());
        let outcome = sync.save(&session(), updates).await.unwrap();

        assert_eq!(outcome.profile.age, Some(41));
        assert_eq!(outcome.profile.weight, Some(70.0));
        assert_eq!(outcome.profile.daily_calorie_goal, Some(2100));
        assert_eq!(outcome.profile.height, None);

        let row = store.row("u1").unwrap();
        assert_eq!(row["age"], json!(41));
        assert!(!row.contains_key("height"));
    }

    #[tokio::test]
    async fn test_malformed_stored_columns_do_not_fail_save_or_load() {
        let store = Arc::new(MockStore::full_schema());
        store.seed("u1");
        // written by another client that does not check types
        store
            .rows
            .lock()
            .unwrap()
            .get_mut("u1")
            .unwrap()
            .extend([("age".to_string(), json!(-1)), ("bio".to_string(), json!(5))]);
        let sync = synchronizer(store.clone());

        let outcome = sync
            .save(&session(), FieldUpdateSet::new().with(ProfileField::Weight, 68.5))
            .await
            .unwrap();
        assert_eq!(outcome.operation, WriteOperation::Updated);
        assert_eq!(outcome.profile.weight, Some(68.5));
        assert_eq!(outcome.profile.age, None);
        assert!(outcome.profile.bio.is_none());

        let loaded = sync.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.weight, Some(68.5));
        assert_eq!(loaded.full_name.as_deref(), Some("Seeded"));
    }

    #[tokio::test]
    async fn test_non_drift_failure_is_not_retried() {
        let store = Arc::new(
            MockStore::full_schema().failing_with(StoreFailure::new("42501", "permission denied")),
        );
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let err = sync
            .save(&session(), FieldUpdateSet::new().with(ProfileField::Age, 41))
            .await
            .unwrap_err();
        assert!(matches!(err, NutriError::Store(ref f) if f.code == "42501"));
        assert_eq!(store.calls.lock().unwrap().update, 1);
    }

    #[tokio::test]
    async fn test_drift_without_extractable_field_escalates() {
        let store = Arc::new(
            MockStore::full_schema().failing_with(StoreFailure::new("42703", "undefined column")),
        );
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let err = sync
            .save(&session(), FieldUpdateSet::new().with(ProfileField::Age, 41))
            .await
            .unwrap_err();
        assert!(matches!(err, NutriError::SchemaDrift { field: None, .. }));
        assert_eq!(store.calls.lock().unwrap().update, 1);
    }

    #[tokio::test]
    async fn test_repeated_rejection_of_stripped_field_escalates() {
        // The store keeps blaming "bio" even after it has been removed
        let store = Arc::new(
            MockStore::full_schema()
                .failing_with(StoreFailure::unknown_column_named("bio", "profiles")),
        );
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let updates = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::Bio, "hi");
        let err = sync.save(&session(), updates).await.unwrap_err();

        assert!(matches!(err, NutriError::SchemaDrift { field: Some(ref f), .. } if f == "bio"));
        assert_eq!(store.calls.lock().unwrap().update, 2);
    }

    #[tokio::test]
    async fn test_save_is_idempotent() {
        let store = Arc::new(MockStore::full_schema());
        store.seed("u1");
        let sync = synchronizer(store.clone());
        let updates = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::DietaryPreferences, vec!["vegan"]);

        let first = sync.save(&session(), updates.clone()).await.unwrap();
        let second = sync.save(&session(), updates).await.unwrap();
        assert_eq!(first.profile, second.profile);
    }

    #[tokio::test]
    async fn test_empty_update_returns_existing_record() {
        let store = Arc::new(MockStore::full_schema());
        store.seed("u1");
        let sync = synchronizer(store.clone());

        let outcome = sync.save(&session(), FieldUpdateSet::new()).await.unwrap();
        assert_eq!(outcome.operation, WriteOperation::Unchanged);
        assert_eq!(store.calls.lock().unwrap().update, 0);
    }

    #[tokio::test]
    async fn test_load_returns_none_for_missing_record() {
        let store = Arc::new(MockStore::full_schema());
        let sync = synchronizer(store.clone());
        assert!(sync.load("nobody").await.unwrap().is_none());

        store.seed("u1");
        let profile = sync.load("u1").await.unwrap().unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Seeded"));
    }
}
