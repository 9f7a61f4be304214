//! Bodyweight and girth measurement history stored as CSV.
//!
//! Files are append-only: `weights.csv` holds `date,weight_kg` rows and
//! `measurements.csv` holds `date,site,value` rows. Unparseable rows are
//! logged and skipped so one bad edit doesn't lose the whole history.

use crate::{
    Error, MeasurementPoint, MeasurementSite, RecompMetricsInput, Result, WeightEntry,
};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// CSV row format for bodyweight samples
#[derive(Debug, Serialize, Deserialize)]
struct WeightRow {
    date: NaiveDate,
    weight_kg: f64,
}

/// CSV row format for girth measurements
#[derive(Debug, Serialize, Deserialize)]
struct MeasurementRow {
    date: NaiveDate,
    site: MeasurementSite,
    value: f64,
}

/// A dated girth measurement at a specific site
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SiteMeasurement {
    pub site: MeasurementSite,
    pub point: MeasurementPoint,
}

/// Append rows to a CSV file, writing headers only for a fresh file
fn append_rows<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let needs_headers = file.metadata()?.len() == 0;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(&file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    drop(writer);

    file.sync_all()?;
    file.unlock()?;
    Ok(())
}

/// Read every parseable row of a CSV file
fn load_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        tracing::debug!("No history file at {:?}", path);
        return Ok(Vec::new());
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut rows = Vec::new();
    for (index, result) in reader.deserialize::<T>().enumerate() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                tracing::warn!("Skipping row {} of {:?}: {}", index + 1, path, e);
            }
        }
    }

    Ok(rows)
}

/// Append one bodyweight sample
pub fn append_weight(path: &Path, entry: WeightEntry) -> Result<()> {
    if !entry.weight_kg.is_finite() || entry.weight_kg <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "weight must be positive, got {}",
            entry.weight_kg
        )));
    }

    append_rows(
        path,
        &[WeightRow {
            date: entry.date,
            weight_kg: entry.weight_kg,
        }],
    )?;
    tracing::info!("Logged {} kg for {}", entry.weight_kg, entry.date);
    Ok(())
}

/// Load all bodyweight samples in file order
pub fn load_weights(path: &Path) -> Result<Vec<WeightEntry>> {
    let entries: Vec<WeightEntry> = load_rows::<WeightRow>(path)?
        .into_iter()
        .map(|row| WeightEntry::new(row.date, row.weight_kg))
        .collect();
    tracing::debug!("Loaded {} bodyweight samples", entries.len());
    Ok(entries)
}

/// Append one girth measurement
pub fn append_measurement(path: &Path, measurement: SiteMeasurement) -> Result<()> {
    if !measurement.point.value.is_finite() || measurement.point.value <= 0.0 {
        return Err(Error::InvalidInput(format!(
            "{} measurement must be positive, got {}",
            measurement.site.as_str(),
            measurement.point.value
        )));
    }

    append_rows(
        path,
        &[MeasurementRow {
            date: measurement.point.date,
            site: measurement.site,
            value: measurement.point.value,
        }],
    )?;
    tracing::info!(
        "Logged {} {} cm for {}",
        measurement.site.as_str(),
        measurement.point.value,
        measurement.point.date
    );
    Ok(())
}

/// Load all girth measurements in file order
pub fn load_measurements(path: &Path) -> Result<Vec<SiteMeasurement>> {
    let measurements: Vec<SiteMeasurement> = load_rows::<MeasurementRow>(path)?
        .into_iter()
        .map(|row| SiteMeasurement {
            site: row.site,
            point: MeasurementPoint::new(row.date, row.value),
        })
        .collect();
    tracing::debug!("Loaded {} girth measurements", measurements.len());
    Ok(measurements)
}

/// Split measurements per site and attach the bodyweight series
pub fn build_recomp_input(
    measurements: &[SiteMeasurement],
    weights: &[WeightEntry],
) -> RecompMetricsInput {
    let mut input = RecompMetricsInput {
        weight: weights.iter().copied().map(MeasurementPoint::from).collect(),
        ..RecompMetricsInput::default()
    };

    for m in measurements {
        match m.site {
            MeasurementSite::Waist => input.waist.push(m.point),
            MeasurementSite::Arm => input.arm.push(m.point),
            MeasurementSite::Chest => input.chest.push(m.point),
        }
    }

    input
}
