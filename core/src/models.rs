use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

/// One logged food item. Entries are never edited in place: a correction is a
/// remove followed by an add.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodEntry {
    pub id: String,
    pub name: String,
    pub protein: f64,
    pub calories: f64,
    pub carbs: f64,
    pub fat: f64,
    pub serving_size: f64,
    pub meal_type: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewFoodEntry {
    pub name: String,
    pub protein: f64,
    #[serde(default)]
    pub calories: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default = "default_serving_size")]
    pub serving_size: f64,
    #[serde(default = "default_meal_type")]
    pub meal_type: String,
}

fn default_serving_size() -> f64 {
    100.0
}

fn default_meal_type() -> String {
    "snack".to_string()
}

impl NewFoodEntry {
    /// Check every field and return a copy with the meal type normalized.
    pub fn validated(&self) -> Result<Self> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("Food name must not be empty"));
        }
        validate_amount("protein", self.protein)?;
        validate_amount("calories", self.calories)?;
        validate_amount("carbs", self.carbs)?;
        validate_amount("fat", self.fat)?;
        if !self.serving_size.is_finite() || self.serving_size <= 0.0 {
            return Err(Error::validation("serving_size must be greater than 0"));
        }
        let meal_type = validate_meal_type(&self.meal_type)?;
        Ok(Self {
            name: self.name.trim().to_string(),
            meal_type,
            ..self.clone()
        })
    }
}

fn validate_amount(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::validation(format!("{field} must be a number")));
    }
    if value < 0.0 {
        return Err(Error::validation(format!("{field} must not be negative")));
    }
    Ok(())
}

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(Error::validation(format!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )))
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| Error::InvalidDate(date.to_string()))
}

/// Storage key for a calendar day.
#[must_use]
pub fn day_key(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Macro totals derived from one day's log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub protein: f64,
    pub calories: f64,
    pub carbs: f64,
    pub fat: f64,
    pub entry_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DaySummary {
    pub date: String,
    pub entries: Vec<FoodEntry>,
    pub totals: DailyTotals,
}

/// One row of the intake history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryDay {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: DailyTotals,
}

// --- Profile types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessGoal {
    WeightLoss,
    Maintenance,
    MuscleGain,
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            "other" => Ok(Self::Other),
            _ => Err(Error::validation(format!(
                "Invalid gender '{s}'. Must be one of: male, female, other"
            ))),
        }
    }
}

impl FromStr for ActivityLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sedentary" => Ok(Self::Sedentary),
            "light" => Ok(Self::Light),
            "moderate" => Ok(Self::Moderate),
            "active" => Ok(Self::Active),
            "very_active" => Ok(Self::VeryActive),
            _ => Err(Error::validation(format!(
                "Invalid activity level '{s}'. Must be one of: sedentary, light, moderate, active, very_active"
            ))),
        }
    }
}

impl FromStr for FitnessGoal {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "weight_loss" => Ok(Self::WeightLoss),
            "maintenance" => Ok(Self::Maintenance),
            "muscle_gain" => Ok(Self::MuscleGain),
            _ => Err(Error::validation(format!(
                "Invalid goal '{s}'. Must be one of: weight_loss, maintenance, muscle_gain"
            ))),
        }
    }
}

impl fmt::Display for FitnessGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::WeightLoss => "weight_loss",
            Self::Maintenance => "maintenance",
            Self::MuscleGain => "muscle_gain",
        };
        f.write_str(name)
    }
}

/// Profile record as held by the remote document store. Field names follow
/// the store's camelCase documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProfile {
    pub weight: f64,
    pub height: f64,
    pub age: u32,
    pub gender: Gender,
    pub activity_level: ActivityLevel,
    pub fitness_goal: FitnessGoal,
}

impl RemoteProfile {
    pub fn validate(&self) -> Result<()> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(Error::validation("weight must be greater than 0"));
        }
        if !self.height.is_finite() || self.height <= 0.0 {
            return Err(Error::validation("height must be greater than 0"));
        }
        if self.age == 0 {
            return Err(Error::validation("age must be greater than 0"));
        }
        Ok(())
    }

    /// Apply the fields present in `update` on top of this profile.
    #[must_use]
    pub fn merged(&self, update: &ProfileUpdate) -> Self {
        Self {
            weight: update.weight.unwrap_or(self.weight),
            height: update.height.unwrap_or(self.height),
            age: update.age.unwrap_or(self.age),
            gender: update.gender.unwrap_or(self.gender),
            activity_level: update.activity_level.unwrap_or(self.activity_level),
            fitness_goal: update.fitness_goal.unwrap_or(self.fitness_goal),
        }
    }
}

/// Partial profile sent to the remote store; absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<Gender>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fitness_goal: Option<FitnessGoal>,
}

impl From<&RemoteProfile> for ProfileUpdate {
    fn from(profile: &RemoteProfile) -> Self {
        Self {
            weight: Some(profile.weight),
            height: Some(profile.height),
            age: Some(profile.age),
            gender: Some(profile.gender),
            activity_level: Some(profile.activity_level),
            fitness_goal: Some(profile.fitness_goal),
        }
    }
}

/// The session's protein target alongside today's intake.
///
/// `current` belongs to the food log and `recommended` to profile sync; neither
/// writer touches the other's field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionRecommendation {
    pub recommended: f64,
    pub current: f64,
    #[serde(default)]
    pub profile: Option<RemoteProfile>,
    /// Day that `current` was derived from.
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl NutritionRecommendation {
    #[must_use]
    pub fn remaining(&self) -> f64 {
        (self.recommended - self.current).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Remote is authoritative; apply the profile to local state.
    ToLocal,
    /// Local edit; push the profile to the remote store.
    ToRemote,
}

impl FromStr for SyncDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "to_local" | "local" => Ok(Self::ToLocal),
            "to_remote" | "remote" => Ok(Self::ToRemote),
            _ => Err(Error::validation(format!(
                "Invalid sync direction '{s}'. Must be one of: to-local, to-remote"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_entry() -> NewFoodEntry {
        NewFoodEntry {
            name: "Chicken Breast".to_string(),
            protein: 31.0,
            calories: 165.0,
            carbs: 0.0,
            fat: 3.6,
            serving_size: 100.0,
            meal_type: "Lunch".to_string(),
        }
    }

    fn sample_profile() -> RemoteProfile {
        RemoteProfile {
            weight: 70.0,
            height: 178.0,
            age: 30,
            gender: Gender::Male,
            activity_level: ActivityLevel::Moderate,
            fitness_goal: FitnessGoal::MuscleGain,
        }
    }

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_type("SNACK").unwrap(), "snack");
        assert!(validate_meal_type("brunch").is_err());
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_validated_normalizes_meal_type() {
        let entry = sample_entry().validated().unwrap();
        assert_eq!(entry.meal_type, "lunch");
        assert_eq!(entry.name, "Chicken Breast");
    }

    #[test]
    fn test_validated_rejects_negative_protein() {
        let mut entry = sample_entry();
        entry.protein = -1.0;
        assert!(matches!(entry.validated(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_validated_rejects_non_numeric_protein() {
        let mut entry = sample_entry();
        entry.protein = f64::NAN;
        assert!(entry.validated().is_err());
        entry.protein = f64::INFINITY;
        assert!(entry.validated().is_err());
    }

    #[test]
    fn test_validated_rejects_empty_name_and_zero_serving() {
        let mut entry = sample_entry();
        entry.name = "   ".to_string();
        assert!(entry.validated().is_err());

        let mut entry = sample_entry();
        entry.serving_size = 0.0;
        assert!(entry.validated().is_err());
    }

    #[test]
    fn test_new_food_entry_defaults_from_json() {
        let entry: NewFoodEntry =
            serde_json::from_str(r#"{"name": "Egg", "protein": 6.3}"#).unwrap();
        assert!((entry.serving_size - 100.0).abs() < f64::EPSILON);
        assert_eq!(entry.meal_type, "snack");
        assert!(entry.calories.abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-06-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
        assert!(matches!(parse_date("15/06/2024"), Err(Error::InvalidDate(_))));
        assert_eq!(day_key(parse_date("2024-01-05").unwrap()), "2024-01-05");
    }

    #[test]
    fn test_profile_enums_from_str() {
        assert_eq!("Male".parse::<Gender>().unwrap(), Gender::Male);
        assert_eq!(
            "very-active".parse::<ActivityLevel>().unwrap(),
            ActivityLevel::VeryActive
        );
        assert_eq!(
            "muscle_gain".parse::<FitnessGoal>().unwrap(),
            FitnessGoal::MuscleGain
        );
        assert!("bulk".parse::<FitnessGoal>().is_err());
        assert_eq!(
            "to-remote".parse::<SyncDirection>().unwrap(),
            SyncDirection::ToRemote
        );
    }

    #[test]
    fn test_remote_profile_camel_case_wire_format() {
        let json = serde_json::to_value(sample_profile()).unwrap();
        assert_eq!(json["activityLevel"], "moderate");
        assert_eq!(json["fitnessGoal"], "muscle_gain");

        let update = ProfileUpdate {
            weight: Some(72.0),
            ..ProfileUpdate::default()
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "weight": 72.0 }));
    }

    #[test]
    fn test_profile_merge_keeps_absent_fields() {
        let update = ProfileUpdate {
            weight: Some(80.0),
            fitness_goal: Some(FitnessGoal::WeightLoss),
            ..ProfileUpdate::default()
        };
        let merged = sample_profile().merged(&update);
        assert!((merged.weight - 80.0).abs() < f64::EPSILON);
        assert_eq!(merged.fitness_goal, FitnessGoal::WeightLoss);
        assert_eq!(merged.age, 30);
        assert_eq!(merged.activity_level, ActivityLevel::Moderate);
    }

    #[test]
    fn test_profile_validate() {
        assert!(sample_profile().validate().is_ok());
        let mut bad = sample_profile();
        bad.weight = 0.0;
        assert!(bad.validate().is_err());
        let mut bad = sample_profile();
        bad.age = 0;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_recommendation_remaining_never_negative() {
        let rec = NutritionRecommendation {
            recommended: 100.0,
            current: 130.0,
            ..NutritionRecommendation::default()
        };
        assert!(rec.remaining().abs() < f64::EPSILON);
    }
}
