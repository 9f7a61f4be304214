//! Body recomposition engine.
//!
//! Tracks girth measurements instead of bodyweight alone:
//! - Least-squares trend per measurement series
//! - Aggregate fat-loss / muscle-gain score
//! - Calorie-cycled daily targets (training vs rest days)
//! - Weekly check-in recommendation
//!
//! Like the adaptive engine, every function here is pure.

use crate::adaptive::{
    round_to, KCAL_PER_G_CARBS, KCAL_PER_G_FAT, KCAL_PER_G_PROTEIN, MIN_CARBS_G,
    MIN_TARGET_CALORIES,
};
use crate::{
    BaselineMacros, CheckinRecommendation, CycleAdjustment, DayType, Error, MeasurementPoint,
    RecompCheckin, RecompConfig, RecompDailyTargets, RecompMetricsInput, RecompMetricsOutput,
    RecompScore, Result, TrendDirection, TrendResult,
};
use chrono::Duration;

/// Weekly slope magnitude below which a trend counts as stable
pub const STABLE_SLOPE_PER_WEEK: f64 = 0.05;

/// tanh scale for the fat-loss half of the score (cm/week)
const FAT_LOSS_SCALE: f64 = 0.5;
/// tanh scale for the muscle-gain half of the score (cm/week)
const MUSCLE_GAIN_SCALE: f64 = 0.3;

pub const RECOMP_PROTEIN_G_PER_KG: f64 = 2.0;
pub const MIN_FAT_G: f64 = 20.0;

/// Share of a calorie surplus/deficit taken from carbs; fat takes the rest
const CARB_SHARE_OF_DELTA: f64 = 0.6;

/// Weekly bodyweight change (kg) beyond which check-ins intervene
const MAX_WEEKLY_WEIGHT_CHANGE_KG: f64 = 0.5;
/// Percentage-point tweak suggested by check-ins
const CHECKIN_CYCLE_STEP_PCT: f64 = 2.0;

/// Least-squares slope of value against days since the earliest point.
///
/// Non-finite values are discarded first. Returns `None` with fewer than
/// two usable points. Same-day series and non-finite arithmetic come back
/// as a flat, stable trend.
pub fn compute_trend(points: &[MeasurementPoint]) -> Option<TrendResult> {
    let valid: Vec<&MeasurementPoint> = points.iter().filter(|p| p.value.is_finite()).collect();
    if valid.len() < 2 {
        return None;
    }

    let data_points = valid.len();
    let earliest = valid.iter().map(|p| p.date).min()?;

    let xs: Vec<f64> = valid
        .iter()
        .map(|p| (p.date - earliest).num_days() as f64)
        .collect();
    let ys: Vec<f64> = valid.iter().map(|p| p.value).collect();

    let n = data_points as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let (sxx, sxy) = xs
        .iter()
        .zip(&ys)
        .fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
            let dx = x - mean_x;
            (sxx + dx * dx, sxy + dx * (y - mean_y))
        });

    if sxx.abs() < f64::EPSILON {
        return Some(TrendResult::stable(data_points));
    }

    let slope_per_week = sxy / sxx * 7.0;
    if !slope_per_week.is_finite() {
        tracing::warn!("Non-finite trend slope over {} points, treating as stable", data_points);
        return Some(TrendResult::stable(data_points));
    }

    // Classify the reported value so the direction agrees with the printed slope
    let slope_per_week = round_to(slope_per_week, 4);
    Some(TrendResult {
        slope_per_week,
        direction: classify_slope(slope_per_week),
        data_points,
    })
}

fn classify_slope(slope_per_week: f64) -> TrendDirection {
    if slope_per_week < -STABLE_SLOPE_PER_WEEK {
        TrendDirection::Decreasing
    } else if slope_per_week > STABLE_SLOPE_PER_WEEK {
        TrendDirection::Increasing
    } else {
        TrendDirection::Stable
    }
}

/// Keep points within `lookback_days` of the series' own newest point
pub fn filter_lookback(points: &[MeasurementPoint], lookback_days: i64) -> Vec<MeasurementPoint> {
    let Some(newest) = points.iter().map(|p| p.date).max() else {
        return Vec::new();
    };
    let cutoff = newest - Duration::days(lookback_days);

    points.iter().filter(|p| p.date >= cutoff).copied().collect()
}

/// Aggregate fat-loss and muscle-gain indicators into one score.
///
/// A shrinking waist is the fat-loss signal; growing arms/chest the
/// muscle-gain signal. The score needs both and lands in [-100, 100].
pub fn compute_recomp_score(
    waist: Option<&TrendResult>,
    arm: Option<&TrendResult>,
    chest: Option<&TrendResult>,
) -> RecompScore {
    let fat_loss_indicator = waist.map(|t| -t.slope_per_week);

    let gains: Vec<f64> = [arm, chest]
        .into_iter()
        .flatten()
        .map(|t| t.slope_per_week)
        .collect();
    let muscle_gain_indicator = if gains.is_empty() {
        None
    } else {
        Some(gains.iter().sum::<f64>() / gains.len() as f64)
    };

    let recomp_score = match (fat_loss_indicator, muscle_gain_indicator) {
        (Some(fat_loss), Some(muscle_gain)) => {
            let score = 50.0 * (fat_loss / FAT_LOSS_SCALE).tanh()
                + 50.0 * (muscle_gain / MUSCLE_GAIN_SCALE).tanh();
            if score.is_finite() {
                Some(round_to(score.clamp(-100.0, 100.0), 2))
            } else {
                Some(0.0)
            }
        }
        _ => None,
    };

    RecompScore {
        fat_loss_indicator,
        muscle_gain_indicator,
        recomp_score,
        has_sufficient_data: fat_loss_indicator.is_some() && muscle_gain_indicator.is_some(),
    }
}

/// Trends for every series plus the aggregate score.
///
/// Each series is cut to its own lookback window before fitting.
pub fn compute_recomp_metrics(input: &RecompMetricsInput, lookback_days: i64) -> RecompMetricsOutput {
    let trend = |points: &[MeasurementPoint]| compute_trend(&filter_lookback(points, lookback_days));

    let waist_trend = trend(&input.waist);
    let arm_trend = trend(&input.arm);
    let chest_trend = trend(&input.chest);
    let weight_trend = trend(&input.weight);

    let score = compute_recomp_score(
        waist_trend.as_ref(),
        arm_trend.as_ref(),
        chest_trend.as_ref(),
    );

    tracing::debug!(
        "Recomp metrics: waist={:?} arm={:?} chest={:?} weight={:?} score={:?}",
        waist_trend.map(|t| t.slope_per_week),
        arm_trend.map(|t| t.slope_per_week),
        chest_trend.map(|t| t.slope_per_week),
        weight_trend.map(|t| t.slope_per_week),
        score.recomp_score
    );

    RecompMetricsOutput {
        waist_trend,
        arm_trend,
        chest_trend,
        weight_trend,
        fat_loss_indicator: score.fat_loss_indicator,
        muscle_gain_indicator: score.muscle_gain_indicator,
        recomp_score: score.recomp_score,
        has_sufficient_data: score.has_sufficient_data,
    }
}

/// Calorie-cycled targets for a single day.
///
/// Training days sit `training_day_pct` above TDEE, rest days
/// `rest_day_pct` below, never under [`MIN_TARGET_CALORIES`]. Protein is
/// at least 2.0 g/kg. The gap between the day's calories and the
/// baseline macros is split 60/40 between carbs and fat, with carbs held
/// at 50 g and fat at 20 g minimum; if a floor binds the calorie total
/// follows the macros up.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] for a non-positive TDEE or weight.
pub fn compute_recomp_daily_targets(
    tdee: f64,
    day_type: DayType,
    weight_kg: f64,
    baseline: &BaselineMacros,
    config: &RecompConfig,
) -> Result<RecompDailyTargets> {
    if !tdee.is_finite() || tdee <= 0.0 {
        return Err(Error::InvalidInput(format!("tdee must be positive, got {}", tdee)));
    }
    if !weight_kg.is_finite() || weight_kg <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "weight_kg must be positive, got {}",
            weight_kg
        )));
    }

    let cycle_pct = match day_type {
        DayType::Training => config.training_day_pct,
        DayType::Rest => -config.rest_day_pct,
    };
    let mut calories = (tdee * (1.0 + cycle_pct / 100.0)).max(MIN_TARGET_CALORIES);

    let protein_g = baseline.protein_g.max(RECOMP_PROTEIN_G_PER_KG * weight_kg);
    let baseline_kcal = protein_g * KCAL_PER_G_PROTEIN
        + baseline.carbs_g * KCAL_PER_G_CARBS
        + baseline.fat_g * KCAL_PER_G_FAT;

    // Positive on a surplus, negative on a deficit
    let delta_kcal = calories - baseline_kcal;
    let carb_kcal = delta_kcal * CARB_SHARE_OF_DELTA;
    let fat_kcal = delta_kcal - carb_kcal;

    let carbs_g = (baseline.carbs_g + carb_kcal / KCAL_PER_G_CARBS).max(MIN_CARBS_G);
    let fat_g = (baseline.fat_g + fat_kcal / KCAL_PER_G_FAT).max(MIN_FAT_G);

    let macro_kcal =
        protein_g * KCAL_PER_G_PROTEIN + carbs_g * KCAL_PER_G_CARBS + fat_g * KCAL_PER_G_FAT;
    if macro_kcal > calories {
        tracing::debug!(
            "Macro floors raised {:?} day calories from {:.1} to {:.1}",
            day_type,
            calories,
            macro_kcal
        );
        calories = macro_kcal;
    }

    Ok(RecompDailyTargets {
        day_type,
        adjusted_calories: round_to(calories, 2),
        adjusted_protein_g: round_to(protein_g, 2),
        adjusted_carbs_g: round_to(carbs_g, 2),
        adjusted_fat_g: round_to(fat_g, 2),
        cycle_pct,
    })
}

/// Weekly check-in recommendation.
///
/// Branches are checked in priority order and the first match wins:
/// 1. Not enough trend data
/// 2. Bodyweight dropping faster than 0.5 kg/week
/// 3. Bodyweight climbing faster than 0.5 kg/week
/// 4. Waist down while arm or chest is up
/// 5. Waist up
/// 6. Anything else
pub fn compute_recomp_checkin(
    metrics: &RecompMetricsOutput,
    weekly_weight_change_kg: Option<f64>,
) -> RecompCheckin {
    if !metrics.has_sufficient_data {
        return RecompCheckin {
            recommendation: CheckinRecommendation::LogMoreData,
            message: "Not enough measurement data yet. Log waist plus arm or chest \
                      measurements at least twice to unlock recomposition feedback."
                .into(),
            suggested_adjustment: None,
        };
    }

    if let Some(change) = weekly_weight_change_kg {
        if change < -MAX_WEEKLY_WEIGHT_CHANGE_KG {
            return RecompCheckin {
                recommendation: CheckinRecommendation::DroppingTooFast,
                message: format!(
                    "Bodyweight is dropping too fast ({:+.2} kg/week). \
                     Add {}% to training-day calories to protect muscle.",
                    change, CHECKIN_CYCLE_STEP_PCT
                ),
                suggested_adjustment: Some(CycleAdjustment {
                    day_type: DayType::Training,
                    pct_change: CHECKIN_CYCLE_STEP_PCT,
                }),
            };
        }

        if change > MAX_WEEKLY_WEIGHT_CHANGE_KG {
            return RecompCheckin {
                recommendation: CheckinRecommendation::GainingTooFast,
                message: format!(
                    "Bodyweight is climbing too fast ({:+.2} kg/week). \
                     Deepen the rest-day deficit by {}%.",
                    change, CHECKIN_CYCLE_STEP_PCT
                ),
                suggested_adjustment: Some(CycleAdjustment {
                    day_type: DayType::Rest,
                    pct_change: -CHECKIN_CYCLE_STEP_PCT,
                }),
            };
        }
    }

    let direction = |trend: Option<TrendResult>| trend.map(|t| t.direction);
    let waist = metrics.waist_trend;

    let growing_site = [("arm", metrics.arm_trend), ("chest", metrics.chest_trend)]
        .into_iter()
        .find_map(|(site, trend)| match trend {
            Some(t) if t.direction == TrendDirection::Increasing => Some((site, t)),
            _ => None,
        });

    if direction(waist) == Some(TrendDirection::Decreasing) {
        if let (Some(waist), Some((site, gain))) = (waist, growing_site) {
            return RecompCheckin {
                recommendation: CheckinRecommendation::Recomping,
                message: format!(
                    "Recomposition is working: waist {:+.2} cm/week while {} {:+.2} cm/week. \
                     Keep the current plan.",
                    waist.slope_per_week, site, gain.slope_per_week
                ),
                suggested_adjustment: None,
            };
        }
    }

    if let Some(waist) = waist.filter(|t| t.direction == TrendDirection::Increasing) {
        return RecompCheckin {
            recommendation: CheckinRecommendation::WaistIncreasing,
            message: format!(
                "Waist is trending up ({:+.2} cm/week). Deepen the rest-day deficit by {}%.",
                waist.slope_per_week, CHECKIN_CYCLE_STEP_PCT
            ),
            suggested_adjustment: Some(CycleAdjustment {
                day_type: DayType::Rest,
                pct_change: -CHECKIN_CYCLE_STEP_PCT,
            }),
        };
    }

    RecompCheckin {
        recommendation: CheckinRecommendation::StayConsistent,
        message: "Measurements are holding steady. Stay consistent with training and \
                  calorie cycling."
            .into(),
        suggested_adjustment: None,
    }
}
