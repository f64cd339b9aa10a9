//! Daily calorie goal calculation.
//!
//! Uses the Mifflin-St Jeor resting energy estimate scaled by an activity
//! multiplier, then shifted by the weight goal.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Lowest goal the client will ever suggest.
pub const MIN_DAILY_CALORIES: u32 = 1200;

/// Daily adjustment applied for a losing or gaining goal.
pub const GOAL_ADJUSTMENT_KCAL: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum WeightGoal {
    Lose,
    Maintain,
    Gain,
}

impl WeightGoal {
    pub fn adjustment(&self) -> f64 {
        match self {
            Self::Lose => -GOAL_ADJUSTMENT_KCAL,
            Self::Maintain => 0.0,
            Self::Gain => GOAL_ADJUSTMENT_KCAL,
        }
    }
}

/// Inputs to the resting energy estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyMetrics {
    pub age: u32,
    pub sex: Sex,
    pub weight_kg: f64,
    pub height_cm: f64,
}

impl BodyMetrics {
    /// Basal metabolic rate in kcal/day.
    pub fn basal_metabolic_rate(&self) -> f64 {
        let base = 10.0 * self.weight_kg + 6.25 * self.height_cm - 5.0 * f64::from(self.age);
        let offset = match self.sex {
            Sex::Male => 5.0,
            Sex::Female => -161.0,
            // midpoint of the two published offsets
            Sex::Other => -78.0,
        };
        base + offset
    }
}

/// Suggested daily calorie goal, rounded to the nearest kcal and never below
/// [`MIN_DAILY_CALORIES`].
pub fn daily_calorie_goal(metrics: &BodyMetrics, activity: ActivityLevel, goal: WeightGoal) -> u32 {
    let maintenance = metrics.basal_metabolic_rate() * activity.multiplier();
    let target = (maintenance + goal.adjustment()).round();
    if target.is_finite() && target > f64::from(MIN_DAILY_CALORIES) {
        target as u32
    } else {
        MIN_DAILY_CALORIES
    }
}
