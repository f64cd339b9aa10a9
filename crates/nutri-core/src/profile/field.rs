//! Profile field names and update sets.

use crate::store::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// A column of the profile record this client knows how to write.
///
/// The enum is closed: a name outside the allowed and optional-extension
/// sets cannot be represented, so it can never be sent to the store.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    Age,
    Gender,
    Weight,
    Height,
    WeightGoal,
    ActivityLevel,
    DietaryPreferences,
    DailyCalorieGoal,
    FullName,
    AvatarUrl,
    Bio,
    HealthConditions,
    Allergies,
}

impl ProfileField {
    /// Column name as stored remotely.
    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    /// Fields that may not exist in the remote schema yet.
    pub fn is_optional_extension(&self) -> bool {
        matches!(self, Self::HealthConditions | Self::Allergies)
    }

    /// The allowed field set (the schema contract the store is expected to honour).
    pub fn allowed() -> impl Iterator<Item = ProfileField> {
        Self::iter().filter(|f| !f.is_optional_extension())
    }

    /// The optional-extension set.
    pub fn optional_extensions() -> impl Iterator<Item = ProfileField> {
        Self::iter().filter(|f| f.is_optional_extension())
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Age | Self::DailyCalorieGoal => FieldKind::Count,
            Self::Weight | Self::Height => FieldKind::Measure,
            Self::DietaryPreferences | Self::HealthConditions | Self::Allergies => {
                FieldKind::TextList
            }
            Self::Gender
            | Self::WeightGoal
            | Self::ActivityLevel
            | Self::FullName
            | Self::AvatarUrl
            | Self::Bio => FieldKind::Text,
        }
    }

    /// Coerces `value` into the shape this column holds, or `None` when it
    /// cannot be represented there.
    ///
    /// `null` clears the column and is always accepted. Numeric strings are
    /// parsed, counts are rounded to whole numbers, and negative numbers are
    /// rejected.
    pub fn normalize(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self.kind() {
            FieldKind::Count => {
                if let Some(n) = value.as_u64().filter(|n| *n <= u64::from(u32::MAX)) {
                    return Some(Value::from(n));
                }
                numeric(value)
                    .map(f64::round)
                    .filter(|n| (0.0..=f64::from(u32::MAX)).contains(n))
                    .map(|n| Value::from(n as u32))
            }
            FieldKind::Measure => match value {
                Value::Number(n) if n.as_f64().is_some_and(|n| n >= 0.0) => Some(value.clone()),
                _ => numeric(value).filter(|n| *n >= 0.0).map(Value::from),
            },
            FieldKind::Text => value.is_string().then(|| value.clone()),
            FieldKind::TextList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string))
                .then(|| value.clone()),
        }
    }
}

/// JSON shape of a profile column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Non-negative whole number
    Count,
    /// Non-negative real number
    Measure,
    Text,
    TextList,
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Field name to new value for a single save.
///
/// Treated as immutable: removal returns a new, smaller set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdateSet {
    fields: BTreeMap<ProfileField, Value>,
}

impl FieldUpdateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion. A value the column cannot hold is left out.
    pub fn with(mut self, field: ProfileField, value: impl Into<Value>) -> Self {
        self.insert(field, value.into());
        self
    }

    /// Builds a set from untyped caller input, dropping names this client
    /// does not know and values their column cannot hold.
    pub fn from_record(input: &Record) -> Self {
        let mut set = Self::new();
        for (name, value) in input {
            match ProfileField::from_str(name) {
                Ok(field) => set.insert(field, value.clone()),
                Err(_) => {
                    tracing::debug!(field = %name, "Dropping unknown profile field from update");
                }
            }
        }
        set
    }

    fn insert(&mut self, field: ProfileField, value: Value) {
        match field.normalize(&value) {
            Some(value) => {
                self.fields.insert(field, value);
            }
            None => {
                tracing::debug!(%field, %value, "Dropping profile value of the wrong type");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, field: ProfileField) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn get(&self, field: ProfileField) -> Option<&Value> {
        self.fields.get(&field)
    }

    pub fn fields(&self) -> impl Iterator<Item = ProfileField> + '_ {
        self.fields.keys().copied()
    }

    /// Returns a copy of this set with `field` removed.
    pub fn without(&self, field: ProfileField) -> Self {
        let mut fields = self.fields.clone();
        fields.remove(&field);
        Self { fields }
    }

    /// Returns a copy keeping only fields for which `keep` holds.
    pub fn retain(&self, mut keep: impl FnMut(ProfileField) -> bool) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|(field, _)| keep(**field))
                .map(|(field, value)| (*field, value.clone()))
                .collect(),
        }
    }

    /// Converts to the wire representation.
    pub fn to_record(&self) -> Record {
        self.fields
            .iter()
            .map(|(field, value)| (field.as_str().to_string(), value.clone()))
            .collect()
    }
}

impl FromIterator<(ProfileField, Value)> for FieldUpdateSet {
    fn from_iter<I: IntoIterator<Item = (ProfileField, Value)>>(iter: I) -> Self {
        let mut set = Self::new();
        for (field, value) in iter {
            set.insert(field, value);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_sets_partition_all_fields() {
        let allowed: Vec<_> = ProfileField::allowed().map(|f| f.to_string()).collect();
        assert_eq!(
            allowed,
            vec![
                "age",
                "gender",
                "weight",
                "height",
                "weight_goal",
                "activity_level",
                "dietary_preferences",
                "daily_calorie_goal",
                "full_name",
                "avatar_url",
                "bio",
            ]
        );
        let extensions: Vec<_> = ProfileField::optional_extensions()
            .map(|f| f.to_string())
            .collect();
        assert_eq!(extensions, vec!["health_conditions", "allergies"]);
    }

    #[test]
    fn test_from_record_drops_unknown_names() {
        let mut input = Record::new();
        input.insert("age".to_string(), json!(41));
        input.insert("unknown_field".to_string(), json!("x"));
        input.insert("allergies".to_string(), json!(["peanuts"]));

        let set = FieldUpdateSet::from_record(&input);
        assert_eq!(set.len(), 2);
        assert!(set.contains(ProfileField::Age));
        assert!(set.contains(ProfileField::Allergies));
        assert!(!set.to_record().contains_key("unknown_field"));
    }

    #[test]
    fn test_from_record_coerces_or_drops_mistyped_values() {
        let input = json!({
            "age": "41",
            "weight": 70,
            "height": "-180",
            "daily_calorie_goal": 2259.6,
            "bio": 12,
            "allergies": ["peanuts", 3],
            "gender": null,
        });
        let set = FieldUpdateSet::from_record(input.as_object().unwrap());

        assert_eq!(set.get(ProfileField::Age), Some(&json!(41)));
        assert_eq!(set.get(ProfileField::Weight), Some(&json!(70)));
        assert_eq!(set.get(ProfileField::DailyCalorieGoal), Some(&json!(2260)));
        assert_eq!(set.get(ProfileField::Gender), Some(&Value::Null));
        assert!(!set.contains(ProfileField::Height));
        assert!(!set.contains(ProfileField::Bio));
        assert!(!set.contains(ProfileField::Allergies));
    }

    #[test]
    fn test_with_rejects_values_the_column_cannot_hold() {
        let set = FieldUpdateSet::new()
            .with(ProfileField::Age, -1)
            .with(ProfileField::Weight, "heavy")
            .with(ProfileField::Height, "tall")
            .with(ProfileField::DietaryPreferences, "vegan")
            .with(ProfileField::Bio, "runner");
        assert_eq!(set.fields().collect::<Vec<_>>(), vec![ProfileField::Bio]);
    }

    #[test]
    fn test_normalize_count_bounds() {
        assert_eq!(ProfileField::Age.normalize(&json!(0)), Some(json!(0)));
        assert_eq!(ProfileField::Age.normalize(&json!(" 7 ")), Some(json!(7)));
        assert_eq!(ProfileField::Age.normalize(&json!(41.4)), Some(json!(41)));
        assert_eq!(ProfileField::Age.normalize(&json!(u64::MAX)), None);
        assert_eq!(ProfileField::Age.normalize(&json!(true)), None);
        assert_eq!(ProfileField::Weight.normalize(&json!(-2.5)), None);
    }

    #[test]
    fn test_without_leaves_original_untouched() {
        let set = FieldUpdateSet::new()
            .with(ProfileField::Age, 41)
            .with(ProfileField::Bio, "hi");
        let smaller = set.without(ProfileField::Bio);
        assert_eq!(smaller.len(), 1);
        assert_eq!(set.len(), 2);
        assert_eq!(smaller.get(ProfileField::Age), Some(&json!(41)));
    }
}
