//! Core domain types for the coaching engines.
//!
//! This module defines the fundamental types used throughout the system:
//! - Body metrics enumerations (sex, activity level, goal)
//! - Adaptive targets input/output
//! - Measurement series and trend results
//! - Recomposition daily targets and check-in recommendations

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Profile Enumerations
// ============================================================================

/// Biological sex, used only for the BMR constant
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Male,
    Female,
}

/// Habitual activity level, mapped to a fixed TDEE multiplier
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    /// All levels, least to most active
    pub const ALL: [ActivityLevel; 5] = [
        ActivityLevel::Sedentary,
        ActivityLevel::Light,
        ActivityLevel::Moderate,
        ActivityLevel::Active,
        ActivityLevel::VeryActive,
    ];

    /// TDEE multiplier applied to BMR
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.20,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.90,
        }
    }
}

/// Body composition goal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    Cutting,
    Maintaining,
    Bulking,
    Recomposition,
}

impl GoalType {
    /// Fixed calorie offset added to TDEE (kcal/day)
    pub fn calorie_offset(self) -> f64 {
        match self {
            GoalType::Cutting => -500.0,
            GoalType::Maintaining => 0.0,
            GoalType::Bulking => 300.0,
            GoalType::Recomposition => 0.0,
        }
    }

    /// Protein target in grams per kg of bodyweight
    pub fn protein_per_kg(self) -> f64 {
        match self {
            GoalType::Cutting => 2.2,
            GoalType::Maintaining => 1.8,
            GoalType::Bulking => 2.0,
            GoalType::Recomposition => 2.0,
        }
    }
}

// ============================================================================
// Adaptive Targets Types
// ============================================================================

/// A single dated bodyweight sample
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeightEntry {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

impl WeightEntry {
    pub fn new(date: NaiveDate, weight_kg: f64) -> Self {
        Self { date, weight_kg }
    }
}

/// Everything the adaptive engine needs for one computation
///
/// Units are metric throughout; callers convert before building this.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdaptiveInput {
    pub weight_kg: f64,
    pub height_cm: f64,
    pub age_years: u32,
    pub sex: Sex,
    pub activity_level: ActivityLevel,
    pub goal_type: GoalType,
    /// Target rate of bodyweight change in kg/week (negative to lose)
    pub goal_rate_per_week: f64,
    /// Need not be sorted
    pub bodyweight_history: Vec<WeightEntry>,
    /// Informational only, 0-100
    #[serde(default)]
    pub training_load_score: f64,
}

impl AdaptiveInput {
    /// Range-check the body metrics.
    ///
    /// `compute_snapshot` itself does not validate; callers that don't sit
    /// behind a request schema (batch jobs, the CLI) call this first.
    pub fn validate(&self) -> Result<()> {
        if !self.weight_kg.is_finite() || self.weight_kg <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "weight_kg must be positive, got {}",
                self.weight_kg
            )));
        }
        if !self.height_cm.is_finite() || self.height_cm <= 0.0 {
            return Err(Error::InvalidInput(format!(
                "height_cm must be positive, got {}",
                self.height_cm
            )));
        }
        if self.age_years == 0 {
            return Err(Error::InvalidInput("age_years must be positive".into()));
        }
        if !self.goal_rate_per_week.is_finite() {
            return Err(Error::InvalidInput("goal_rate_per_week must be finite".into()));
        }
        if !(0.0..=100.0).contains(&self.training_load_score) {
            return Err(Error::InvalidInput(format!(
                "training_load_score must be within 0-100, got {}",
                self.training_load_score
            )));
        }
        if self.bodyweight_history.is_empty() {
            return Err(Error::EmptyHistory);
        }
        if let Some(bad) = self
            .bodyweight_history
            .iter()
            .find(|e| !e.weight_kg.is_finite() || e.weight_kg <= 0.0)
        {
            return Err(Error::InvalidInput(format!(
                "bodyweight entry on {} is not a positive weight: {}",
                bad.date, bad.weight_kg
            )));
        }
        Ok(())
    }
}

/// Daily targets produced by the adaptive engine
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdaptiveOutput {
    pub target_calories: f64,
    pub target_protein_g: f64,
    pub target_carbs_g: f64,
    pub target_fat_g: f64,
    pub ema_current: f64,
    pub adjustment_factor: f64,
    pub bmr: f64,
    pub tdee: f64,
}

// ============================================================================
// Recomposition Types
// ============================================================================

/// A dated girth or bodyweight measurement
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct MeasurementPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl MeasurementPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

impl From<WeightEntry> for MeasurementPoint {
    fn from(entry: WeightEntry) -> Self {
        MeasurementPoint::new(entry.date, entry.weight_kg)
    }
}

/// Body site for girth measurements
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MeasurementSite {
    Waist,
    Arm,
    Chest,
}

impl MeasurementSite {
    pub fn as_str(self) -> &'static str {
        match self {
            MeasurementSite::Waist => "waist",
            MeasurementSite::Arm => "arm",
            MeasurementSite::Chest => "chest",
        }
    }
}

impl std::str::FromStr for MeasurementSite {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "waist" => Ok(MeasurementSite::Waist),
            "arm" | "arms" => Ok(MeasurementSite::Arm),
            "chest" => Ok(MeasurementSite::Chest),
            other => Err(Error::InvalidInput(format!(
                "unknown measurement site '{}'",
                other
            ))),
        }
    }
}

/// Direction of a measurement trend
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Decreasing,
    Stable,
    Increasing,
}

/// Linear trend over a measurement series
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrendResult {
    /// Units per week (cm or kg)
    pub slope_per_week: f64,
    pub direction: TrendDirection,
    pub data_points: usize,
}

impl TrendResult {
    /// Flat trend used for degenerate series
    pub fn stable(data_points: usize) -> Self {
        Self {
            slope_per_week: 0.0,
            direction: TrendDirection::Stable,
            data_points,
        }
    }
}

/// Raw measurement series handed to the recomposition metrics
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RecompMetricsInput {
    pub waist: Vec<MeasurementPoint>,
    pub arm: Vec<MeasurementPoint>,
    pub chest: Vec<MeasurementPoint>,
    pub weight: Vec<MeasurementPoint>,
}

/// Aggregate fat-loss / muscle-gain indicators
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecompScore {
    pub fat_loss_indicator: Option<f64>,
    pub muscle_gain_indicator: Option<f64>,
    pub recomp_score: Option<f64>,
    pub has_sufficient_data: bool,
}

/// Trends plus the aggregate score
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct RecompMetricsOutput {
    pub waist_trend: Option<TrendResult>,
    pub arm_trend: Option<TrendResult>,
    pub chest_trend: Option<TrendResult>,
    pub weight_trend: Option<TrendResult>,
    pub fat_loss_indicator: Option<f64>,
    pub muscle_gain_indicator: Option<f64>,
    pub recomp_score: Option<f64>,
    pub has_sufficient_data: bool,
}

/// Training or rest day, for calorie cycling
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DayType {
    Training,
    Rest,
}

impl std::str::FromStr for DayType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "training" | "train" => Ok(DayType::Training),
            "rest" => Ok(DayType::Rest),
            other => Err(Error::InvalidInput(format!("unknown day type '{}'", other))),
        }
    }
}

/// Baseline macros a cycled day is derived from
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct BaselineMacros {
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

impl From<&AdaptiveOutput> for BaselineMacros {
    fn from(output: &AdaptiveOutput) -> Self {
        Self {
            protein_g: output.target_protein_g,
            carbs_g: output.target_carbs_g,
            fat_g: output.target_fat_g,
        }
    }
}

/// Calorie-cycled targets for one day
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecompDailyTargets {
    pub day_type: DayType,
    pub adjusted_calories: f64,
    pub adjusted_protein_g: f64,
    pub adjusted_carbs_g: f64,
    pub adjusted_fat_g: f64,
    /// Signed percentage applied to TDEE
    pub cycle_pct: f64,
}

/// Which check-in branch fired
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckinRecommendation {
    LogMoreData,
    DroppingTooFast,
    GainingTooFast,
    Recomping,
    WaistIncreasing,
    StayConsistent,
}

/// Suggested tweak to the calorie-cycling percentages
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct CycleAdjustment {
    pub day_type: DayType,
    /// Percentage points to add to that day's cycle (negative deepens a deficit)
    pub pct_change: f64,
}

/// Result of a weekly recomposition check-in
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RecompCheckin {
    pub recommendation: CheckinRecommendation,
    pub message: String,
    pub suggested_adjustment: Option<CycleAdjustment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_input() -> AdaptiveInput {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        AdaptiveInput {
            weight_kg: 80.0,
            height_cm: 178.0,
            age_years: 30,
            sex: Sex::Male,
            activity_level: ActivityLevel::Moderate,
            goal_type: GoalType::Cutting,
            goal_rate_per_week: -0.5,
            bodyweight_history: vec![WeightEntry::new(date, 80.0)],
            training_load_score: 0.0,
        }
    }

    #[test]
    fn test_validate_accepts_plausible_input() {
        assert!(create_test_input().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_metrics() {
        let mut input = create_test_input();
        input.height_cm = 0.0;
        assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));

        let mut input = create_test_input();
        input.training_load_score = 140.0;
        assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));

        let mut input = create_test_input();
        input.bodyweight_history[0].weight_kg = f64::NAN;
        assert!(matches!(input.validate(), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_empty_history() {
        let mut input = create_test_input();
        input.bodyweight_history.clear();
        assert!(matches!(input.validate(), Err(Error::EmptyHistory)));
    }

    #[test]
    fn test_goal_tables() {
        assert_eq!(GoalType::Cutting.calorie_offset(), -500.0);
        assert_eq!(GoalType::Bulking.calorie_offset(), 300.0);
        assert_eq!(GoalType::Cutting.protein_per_kg(), 2.2);
        assert_eq!(ActivityLevel::VeryActive.multiplier(), 1.90);
    }

    #[test]
    fn test_site_and_day_type_parsing() {
        assert_eq!("Waist".parse::<MeasurementSite>().unwrap(), MeasurementSite::Waist);
        assert_eq!(" arms ".parse::<MeasurementSite>().unwrap(), MeasurementSite::Arm);
        assert!("thigh".parse::<MeasurementSite>().is_err());

        assert_eq!("train".parse::<DayType>().unwrap(), DayType::Training);
        assert_eq!("REST".parse::<DayType>().unwrap(), DayType::Rest);
        assert!("deload".parse::<DayType>().is_err());
    }

    #[test]
    fn test_enums_serialize_snake_case() {
        let json = serde_json::to_string(&ActivityLevel::VeryActive).unwrap();
        assert_eq!(json, "\"very_active\"");
        let json = serde_json::to_string(&CheckinRecommendation::LogMoreData).unwrap();
        assert_eq!(json, "\"log_more_data\"");
    }
}
