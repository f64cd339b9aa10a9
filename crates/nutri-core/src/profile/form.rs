//! Onboarding form input.

use super::field::{FieldUpdateSet, ProfileField};
use crate::nutrition::{self, ActivityLevel, BodyMetrics, Sex, WeightGoal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Values collected by the onboarding and profile-edit screens.
///
/// Only fields the user actually filled in are turned into updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileForm {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub weight_goal: Option<String>,
    pub activity_level: Option<String>,
    pub dietary_preferences: Option<Vec<String>>,
    pub health_conditions: Option<Vec<String>>,
    pub allergies: Option<Vec<String>>,
}

impl ProfileForm {
    /// Suggested goal, when the form carries everything the estimate needs.
    ///
    /// Unknown activity levels count as sedentary and unknown goals as
    /// maintain.
    pub fn daily_calorie_goal(&self) -> Option<u32> {
        let sex = self
            .gender
            .as_deref()
            .map(|g| Sex::from_str(g).unwrap_or(Sex::Other))?;
        let metrics = BodyMetrics {
            age: self.age?,
            sex,
            weight_kg: self.weight?,
            height_cm: self.height?,
        };
        let activity = self
            .activity_level
            .as_deref()
            .and_then(|a| ActivityLevel::from_str(a).ok())
            .unwrap_or(ActivityLevel::Sedentary);
        let goal = self
            .weight_goal
            .as_deref()
            .and_then(|g| WeightGoal::from_str(g).ok())
            .unwrap_or(WeightGoal::Maintain);
        Some(nutrition::daily_calorie_goal(&metrics, activity, goal))
    }

    /// Builds the update set, including the computed calorie goal.
    pub fn to_update_set(&self) -> FieldUpdateSet {
        let text = |v: &Option<String>| v.clone().map(Value::from);
        let list = |v: &Option<Vec<String>>| v.clone().map(Value::from);

        let entries = [
            (ProfileField::FullName, text(&self.full_name)),
            (ProfileField::AvatarUrl, text(&self.avatar_url)),
            (ProfileField::Bio, text(&self.bio)),
            (ProfileField::Age, self.age.map(Value::from)),
            (ProfileField::Gender, text(&self.gender)),
            (ProfileField::Weight, self.weight.map(Value::from)),
            (ProfileField::Height, self.height.map(Value::from)),
            (ProfileField::WeightGoal, text(&self.weight_goal)),
            (ProfileField::ActivityLevel, text(&self.activity_level)),
            (ProfileField::DietaryPreferences, list(&self.dietary_preferences)),
            (
                ProfileField::DailyCalorieGoal,
                self.daily_calorie_goal().map(Value::from),
            ),
            (ProfileField::HealthConditions, list(&self.health_conditions)),
            (ProfileField::Allergies, list(&self.allergies)),
        ];

        entries
            .into_iter()
            .filter_map(|(field, value)| value.map(|v| (field, v)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_set_skips_empty_fields() {
        let form = ProfileForm {
            bio: Some("runner".to_string()),
            ..Default::default()
        };
        let set = form.to_update_set();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(ProfileField::Bio), Some(&json!("runner")));
    }

    #[test]
    fn test_update_set_includes_computed_goal() {
        let form = ProfileForm {
            age: Some(30),
            gender: Some("male".to_string()),
            weight: Some(80.0),
            height: Some(180.0),
            activity_level: Some("moderate".to_string()),
            weight_goal: Some("lose".to_string()),
            allergies: Some(vec!["peanuts".to_string()]),
            ..Default::default()
        };
        let set = form.to_update_set();
        assert_eq!(set.get(ProfileField::DailyCalorieGoal), Some(&json!(2259)));
        assert_eq!(set.get(ProfileField::Allergies), Some(&json!(["peanuts"])));
        assert!(!set.contains(ProfileField::HealthConditions));
    }

    #[test]
    fn test_goal_requires_body_metrics() {
        let form = ProfileForm {
            age: Some(30),
            gender: Some("female".to_string()),
            weight: Some(60.0),
            ..Default::default()
        };
        assert_eq!(form.daily_calorie_goal(), None);
    }
}
