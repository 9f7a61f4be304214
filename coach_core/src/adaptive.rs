//! Adaptive targets engine.
//!
//! Turns body metrics, a goal and recent bodyweight history into daily
//! calorie and macro targets:
//! 1. BMR (Mifflin-St Jeor)
//! 2. TDEE from the activity multiplier
//! 3. Outlier-filtered EMA weight trend, now and one week back
//! 4. Feedback adjustment toward the goal rate, clamped
//! 5. Macro split with calorie and carb floors
//!
//! Everything here is pure: no clock, no I/O, no shared state.

use crate::{
    ActivityLevel, AdaptiveConfig, AdaptiveInput, AdaptiveOutput, Error, GoalType, Result, Sex,
    WeightEntry,
};
use chrono::Duration;

/// Calorie correction per kg/week of trend error
pub const KCAL_PER_KG_RATE_ERROR: f64 = 500.0;

/// Share of calories assigned to fat
pub const FAT_CALORIE_SHARE: f64 = 0.25;

pub const MIN_TARGET_CALORIES: f64 = 1200.0;
pub const MIN_CARBS_G: f64 = 50.0;

pub const KCAL_PER_G_PROTEIN: f64 = 4.0;
pub const KCAL_PER_G_CARBS: f64 = 4.0;
pub const KCAL_PER_G_FAT: f64 = 9.0;

/// Final calorie and macro numbers, unrounded
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MacroTargets {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
}

/// Mifflin-St Jeor basal metabolic rate (kcal/day)
///
/// No clamping: implausible inputs give implausible output.
pub fn calculate_bmr(weight_kg: f64, height_cm: f64, age_years: u32, sex: Sex) -> f64 {
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age_years);
    match sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    }
}

/// Total daily energy expenditure
pub fn calculate_tdee(bmr: f64, activity_level: ActivityLevel) -> f64 {
    bmr * activity_level.multiplier()
}

/// Drop day-to-day jumps larger than `threshold_kg`.
///
/// Each candidate is compared to the last sample that survived, not to the
/// raw previous one, so a single bad day doesn't take the following good
/// days down with it. The first sample is always kept. Expects `sorted`
/// in ascending date order.
pub fn filter_fluctuations(sorted: &[WeightEntry], threshold_kg: f64) -> Vec<WeightEntry> {
    let mut kept: Vec<WeightEntry> = Vec::with_capacity(sorted.len());

    for entry in sorted {
        match kept.last() {
            None => kept.push(*entry),
            Some(last) if (entry.weight_kg - last.weight_kg).abs() <= threshold_kg => {
                kept.push(*entry)
            }
            Some(last) => {
                tracing::debug!(
                    "Dropping bodyweight {} on {} ({:+.2} kg from last kept)",
                    entry.weight_kg,
                    entry.date,
                    entry.weight_kg - last.weight_kg
                );
            }
        }
    }

    kept
}

/// Exponential moving average over oldest-first weights.
///
/// With fewer than `window` samples the plain mean is returned instead,
/// since an EMA seeded from one or two points swings too hard.
/// Returns `None` for an empty slice.
pub fn calculate_ema(weights: &[f64], window: usize) -> Option<f64> {
    let (first, rest) = weights.split_first()?;

    if weights.len() < window {
        return Some(weights.iter().sum::<f64>() / weights.len() as f64);
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let ema = rest
        .iter()
        .fold(*first, |ema, w| alpha * w + (1.0 - alpha) * ema);
    Some(ema)
}

/// History sorted oldest first
fn sorted_history(history: &[WeightEntry]) -> Vec<WeightEntry> {
    let mut sorted = history.to_vec();
    sorted.sort_by_key(|e| e.date);
    sorted
}

/// Smoothed weight over the whole (sorted, filtered) series
fn ema_now(filtered: &[WeightEntry], config: &AdaptiveConfig) -> Option<f64> {
    let weights: Vec<f64> = filtered.iter().map(|e| e.weight_kg).collect();
    calculate_ema(&weights, config.ema_window)
}

/// Smoothed weight as it stood `comparison_days` before the newest sample.
///
/// `sorted` is the raw sorted history (its last entry defines "newest"),
/// `filtered` the outlier-filtered version of it. `None` when there is
/// nothing to compare against yet.
fn ema_days_ago(
    sorted: &[WeightEntry],
    filtered: &[WeightEntry],
    config: &AdaptiveConfig,
) -> Option<f64> {
    if sorted.len() < 2 {
        return None;
    }

    let newest = sorted.last()?.date;
    let cutoff = newest - Duration::days(config.comparison_days);

    let weights: Vec<f64> = filtered
        .iter()
        .filter(|e| e.date <= cutoff)
        .map(|e| e.weight_kg)
        .collect();

    calculate_ema(&weights, config.ema_window)
}

/// Feedback correction toward the goal rate (kcal/day).
///
/// Zero when there is no prior EMA to compare against.
pub fn calculate_adjustment(
    goal_rate_per_week: f64,
    ema_current: f64,
    ema_previous: Option<f64>,
    max_adjustment_kcal: f64,
) -> f64 {
    let Some(previous) = ema_previous else {
        return 0.0;
    };

    let weekly_weight_change = ema_current - previous;
    let raw = (goal_rate_per_week - weekly_weight_change) * KCAL_PER_KG_RATE_ERROR;

    tracing::debug!(
        "Weekly trend change {:+.3} kg vs goal {:+.3} kg, raw adjustment {:+.1} kcal",
        weekly_weight_change,
        goal_rate_per_week,
        raw
    );

    // A negative bound means the same symmetric range; NaN disables feedback
    if max_adjustment_kcal.is_nan() {
        tracing::warn!("Adjustment bound is NaN, skipping feedback adjustment");
        return 0.0;
    }
    let bound = max_adjustment_kcal.abs();
    raw.clamp(-bound, bound)
}

/// Calories and macro split for the day.
///
/// Calories never drop below [`MIN_TARGET_CALORIES`]. Carbs never drop below
/// [`MIN_CARBS_G`]; when that floor binds the calorie total is raised to
/// the macro sum so the two always agree.
pub fn distribute_macros(
    tdee: f64,
    goal_type: GoalType,
    adjustment: f64,
    weight_kg: f64,
) -> MacroTargets {
    let mut calories = (tdee + goal_type.calorie_offset() + adjustment).max(MIN_TARGET_CALORIES);

    let protein_g = weight_kg * goal_type.protein_per_kg();
    let fat_g = calories * FAT_CALORIE_SHARE / KCAL_PER_G_FAT;
    let raw_carbs_g =
        (calories - protein_g * KCAL_PER_G_PROTEIN - fat_g * KCAL_PER_G_FAT) / KCAL_PER_G_CARBS;

    let carbs_g = raw_carbs_g.max(MIN_CARBS_G);
    if carbs_g > raw_carbs_g {
        let macro_sum = protein_g * KCAL_PER_G_PROTEIN
            + carbs_g * KCAL_PER_G_CARBS
            + fat_g * KCAL_PER_G_FAT;
        if macro_sum > calories {
            tracing::debug!(
                "Carb floor raised calories from {:.1} to {:.1}",
                calories,
                macro_sum
            );
            calories = macro_sum;
        }
    }

    MacroTargets {
        calories,
        protein_g,
        carbs_g,
        fat_g,
    }
}

/// Compute today's targets with the stock parameters
///
/// # Errors
///
/// Returns [`Error::EmptyHistory`] when `bodyweight_history` is empty.
pub fn compute_snapshot(input: &AdaptiveInput) -> Result<AdaptiveOutput> {
    compute_snapshot_with(input, &AdaptiveConfig::default())
}

/// Compute today's targets with explicit engine parameters
///
/// # Errors
///
/// Returns [`Error::EmptyHistory`] when `bodyweight_history` is empty.
pub fn compute_snapshot_with(
    input: &AdaptiveInput,
    config: &AdaptiveConfig,
) -> Result<AdaptiveOutput> {
    if input.bodyweight_history.is_empty() {
        return Err(Error::EmptyHistory);
    }

    let bmr = calculate_bmr(input.weight_kg, input.height_cm, input.age_years, input.sex);
    let tdee = calculate_tdee(bmr, input.activity_level);

    let sorted = sorted_history(&input.bodyweight_history);
    let filtered = filter_fluctuations(&sorted, config.outlier_threshold_kg);

    let ema_current = ema_now(&filtered, config).ok_or(Error::EmptyHistory)?;
    let ema_previous = ema_days_ago(&sorted, &filtered, config);

    let adjustment = calculate_adjustment(
        input.goal_rate_per_week,
        ema_current,
        ema_previous,
        config.max_adjustment_kcal,
    );

    let macros = distribute_macros(
        tdee,
        input.goal_type,
        adjustment,
        input.weight_kg,
    );

    tracing::debug!(
        "Snapshot: bmr={:.1} tdee={:.1} ema={:.3} prev_ema={:?} adjustment={:+.1} training_load={}",
        bmr,
        tdee,
        ema_current,
        ema_previous,
        adjustment,
        input.training_load_score
    );

    Ok(AdaptiveOutput {
        target_calories: round_to(macros.calories, 2),
        target_protein_g: round_to(macros.protein_g, 2),
        target_carbs_g: round_to(macros.carbs_g, 2),
        target_fat_g: round_to(macros.fat_g, 2),
        ema_current: round_to(ema_current, 4),
        adjustment_factor: round_to(adjustment, 2),
        bmr: round_to(bmr, 2),
        tdee: round_to(tdee, 2),
    })
}

/// Round half away from zero to `places` decimals
pub(crate) fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn flat_history(days: i64, weight: f64) -> Vec<WeightEntry> {
        (0..days).map(|d| WeightEntry::new(day(d), weight)).collect()
    }

    fn create_test_input() -> AdaptiveInput {
        AdaptiveInput {
            weight_kg: 80.0,
            height_cm: 178.0,
            age_years: 30,
            sex: Sex::Male,
            activity_level: ActivityLevel::Moderate,
            goal_type: GoalType::Cutting,
            goal_rate_per_week: -0.5,
            bodyweight_history: flat_history(14, 80.0),
            training_load_score: 50.0,
        }
    }

    #[test]
    fn test_bmr_mifflin_st_jeor() {
        assert_eq!(calculate_bmr(80.0, 178.0, 30, Sex::Male), 1767.5);
        assert_eq!(calculate_bmr(80.0, 178.0, 30, Sex::Female), 1601.5);
    }

    #[test]
    fn test_tdee_moderate() {
        assert_eq!(calculate_tdee(1767.5, ActivityLevel::Moderate), 2739.625);
    }

    #[test]
    fn test_filter_keeps_first_point() {
        let sorted = vec![
            WeightEntry::new(day(0), 90.0),
            WeightEntry::new(day(1), 80.0),
        ];
        let kept = filter_fluctuations(&sorted, 2.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].weight_kg, 90.0);
    }

    #[test]
    fn test_filter_compares_against_last_kept() {
        // The spike is dropped and the following days are judged against 80.0
        let sorted = vec![
            WeightEntry::new(day(0), 80.0),
            WeightEntry::new(day(1), 90.0),
            WeightEntry::new(day(2), 80.5),
            WeightEntry::new(day(3), 81.0),
        ];
        let kept = filter_fluctuations(&sorted, 2.0);
        let weights: Vec<f64> = kept.iter().map(|e| e.weight_kg).collect();
        assert_eq!(weights, vec![80.0, 80.5, 81.0]);
    }

    #[test]
    fn test_filter_accepts_exact_threshold() {
        let sorted = vec![
            WeightEntry::new(day(0), 80.0),
            WeightEntry::new(day(1), 82.0),
        ];
        assert_eq!(filter_fluctuations(&sorted, 2.0).len(), 2);
    }

    #[test]
    fn test_filter_accepts_gradual_drift() {
        // Every step is within the threshold, so the whole drift survives
        let sorted: Vec<WeightEntry> = (0..10)
            .map(|d| WeightEntry::new(day(d), 80.0 + 1.9 * d as f64))
            .collect();
        assert_eq!(filter_fluctuations(&sorted, 2.0).len(), 10);
    }

    #[test]
    fn test_ema_falls_back_to_mean() {
        let ema = calculate_ema(&[80.0, 81.0, 82.0], 7).unwrap();
        assert!((ema - 81.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_seeded_with_oldest() {
        let weights = [80.0, 80.0, 80.0, 80.0, 80.0, 80.0, 88.0];
        let ema = calculate_ema(&weights, 7).unwrap();
        // alpha = 0.25, single step from 80 toward 88
        assert!((ema - 82.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_empty() {
        assert!(calculate_ema(&[], 7).is_none());
    }

    #[test]
    fn test_adjustment_without_history_is_zero() {
        assert_eq!(calculate_adjustment(-0.5, 80.0, None, 300.0), 0.0);
    }

    #[test]
    fn test_adjustment_clamped() {
        // Gaining 2 kg/week while wanting to lose: pushes far below -300
        assert_eq!(calculate_adjustment(-0.5, 82.0, Some(80.0), 300.0), -300.0);
        assert_eq!(calculate_adjustment(0.5, 78.0, Some(80.0), 300.0), 300.0);
    }

    #[test]
    fn test_ema_days_ago_requires_old_points() {
        let config = AdaptiveConfig::default();
        let sorted = flat_history(5, 80.0);
        let filtered = filter_fluctuations(&sorted, config.outlier_threshold_kg);
        assert!(ema_days_ago(&sorted, &filtered, &config).is_none());

        let single = flat_history(1, 80.0);
        assert!(ema_days_ago(&single, &single, &config).is_none());
    }

    #[test]
    fn test_ema_days_ago_uses_cutoff() {
        let config = AdaptiveConfig::default();
        // Days 0..=7 at 80, day 7 is exactly one week before day 14
        let mut sorted = flat_history(8, 80.0);
        sorted.extend((8..15).map(|d| WeightEntry::new(day(d), 79.0)));
        let filtered = filter_fluctuations(&sorted, config.outlier_threshold_kg);
        let previous = ema_days_ago(&sorted, &filtered, &config).unwrap();
        assert_eq!(previous, 80.0);
    }

    #[test]
    fn test_worked_example() {
        crate::logging::init_test();

        let input = create_test_input();
        let output = compute_snapshot(&input).unwrap();

        assert_eq!(output.bmr, 1767.5);
        assert_eq!(output.tdee, 2739.63);
        assert_eq!(output.ema_current, 80.0);
        assert_eq!(output.adjustment_factor, -250.0);
        assert_eq!(output.target_protein_g, 176.0);
        assert_eq!(output.target_calories, 1989.63);
        assert!(output.target_calories >= MIN_TARGET_CALORIES);
    }

    #[test]
    fn test_unsorted_history_matches_sorted() {
        let input = create_test_input();
        let mut shuffled = input.clone();
        shuffled.bodyweight_history.reverse();
        shuffled.bodyweight_history.swap(2, 9);

        assert_eq!(
            compute_snapshot(&input).unwrap(),
            compute_snapshot(&shuffled).unwrap()
        );
    }

    #[test]
    fn test_first_computation_has_no_adjustment() {
        let mut input = create_test_input();
        input.bodyweight_history = flat_history(3, 80.0);

        let output = compute_snapshot(&input).unwrap();
        assert_eq!(output.adjustment_factor, 0.0);
        assert_eq!(output.ema_current, 80.0);
    }

    #[test]
    fn test_empty_history_is_error() {
        let mut input = create_test_input();
        input.bodyweight_history.clear();

        let result = compute_snapshot(&input);
        assert!(matches!(result, Err(Error::EmptyHistory)));
    }

    #[test]
    fn test_calorie_floor() {
        let mut input = create_test_input();
        input.weight_kg = 45.0;
        input.height_cm = 150.0;
        input.age_years = 70;
        input.sex = Sex::Female;
        input.activity_level = ActivityLevel::Sedentary;
        input.bodyweight_history = flat_history(14, 45.0);

        let output = compute_snapshot(&input).unwrap();
        assert_eq!(output.target_calories, MIN_TARGET_CALORIES);
        assert!(output.target_carbs_g >= 50.0);
    }

    #[test]
    fn test_carb_floor_raises_calories() {
        // Heavy person at the calorie floor: protein alone eats most calories
        let macros = distribute_macros(900.0, GoalType::Cutting, -300.0, 150.0);

        assert_eq!(macros.carbs_g, MIN_CARBS_G);
        let macro_sum = macros.protein_g * 4.0 + macros.carbs_g * 4.0 + macros.fat_g * 9.0;
        assert!(macros.calories > 1200.0);
        assert!((macros.calories - macro_sum).abs() < 1e-9);
    }

    #[test]
    fn test_custom_config_changes_clamp() {
        let mut input = create_test_input();
        input.goal_rate_per_week = -1.5;

        let config = AdaptiveConfig {
            max_adjustment_kcal: 100.0,
            ..AdaptiveConfig::default()
        };
        let output = compute_snapshot_with(&input, &config).unwrap();
        assert_eq!(output.adjustment_factor, -100.0);
    }

    #[test]
    fn test_negative_bound_clamps_symmetrically() {
        assert_eq!(calculate_adjustment(-1.5, 80.0, Some(80.0), -100.0), -100.0);
        assert_eq!(calculate_adjustment(1.5, 80.0, Some(80.0), -100.0), 100.0);

        let mut input = create_test_input();
        input.goal_rate_per_week = -1.5;
        let config = AdaptiveConfig {
            max_adjustment_kcal: -100.0,
            ..AdaptiveConfig::default()
        };
        let output = compute_snapshot_with(&input, &config).unwrap();
        assert_eq!(output.adjustment_factor, -100.0);
    }

    #[test]
    fn test_nan_bound_skips_adjustment() {
        assert_eq!(calculate_adjustment(-0.5, 82.0, Some(80.0), f64::NAN), 0.0);

        let config = AdaptiveConfig {
            max_adjustment_kcal: f64::NAN,
            ..AdaptiveConfig::default()
        };
        let output = compute_snapshot_with(&create_test_input(), &config).unwrap();
        assert_eq!(output.adjustment_factor, 0.0);
        assert!(output.target_calories.is_finite());
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(2739.625, 2), 2739.63);
        assert_eq!(round_to(80.123456, 4), 80.1235);
        assert_eq!(round_to(-250.0, 2), -250.0);
    }
}
