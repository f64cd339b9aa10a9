//! Profile domain model.
//!
//! Represents the user's persisted nutrition and demographic record.

use super::field::ProfileField;
use crate::error::Result;
use crate::store::Record;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Profile domain model.
///
/// Mirrors one row of the remote profile table. Every attribute except `id`
/// is optional because rows are created lazily and filled in over several
/// onboarding steps; columns the store does not have simply stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same identifier as the owning session's user
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    /// Kilograms
    #[serde(default)]
    pub weight: Option<f64>,
    /// Centimetres
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight_goal: Option<String>,
    #[serde(default)]
    pub activity_level: Option<String>,
    #[serde(default)]
    pub dietary_preferences: Option<Vec<String>>,
    /// Kilocalories per day
    #[serde(default)]
    pub daily_calorie_goal: Option<u32>,
    #[serde(default)]
    pub health_conditions: Option<Vec<String>>,
    #[serde(default)]
    pub allergies: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Decodes a store record. Columns this model does not know are ignored.
    ///
    /// Decoding is lenient per column: a value of the wrong shape (say a
    /// negative age written by another client) reads as absent instead of
    /// failing the whole record. Only a row without a usable `id` is an error.
    pub fn from_record(mut record: Record) -> Result<Self> {
        record.retain(|name, value| {
            let keep = match ProfileField::from_str(name) {
                Ok(field) => match field.normalize(value) {
                    Some(normalized) => {
                        *value = normalized;
                        true
                    }
                    None => false,
                },
                Err(_) if matches!(name.as_str(), "created_at" | "updated_at") => {
                    value.is_null()
                        || value
                            .as_str()
                            .is_some_and(|s| s.parse::<DateTime<FixedOffset>>().is_ok())
                }
                Err(_) => true,
            };
            if !keep {
                tracing::warn!(column = %name, %value, "Ignoring malformed profile column");
            }
            keep
        });
        Ok(serde_json::from_value(Value::Object(record))?)
    }

    /// Whether onboarding has produced enough data to show the dashboard.
    pub fn is_onboarded(&self) -> bool {
        self.age.is_some()
            && self.weight.is_some()
            && self.height.is_some()
            && self.daily_calorie_goal.is_some()
    }
}
