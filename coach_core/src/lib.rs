#![forbid(unsafe_code)]

//! Core domain model and engines for the nutrition coaching tools.
//!
//! This crate provides:
//! - Domain types (body metrics, targets, measurement trends)
//! - Adaptive targets engine (BMR, TDEE, EMA trend, feedback adjustment)
//! - Recomposition engine (trends, score, calorie cycling, check-ins)
//! - Persistence (profile, CSV history, snapshot log and rollup)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod schedule;
pub mod adaptive;
pub mod recomp;
pub mod state;
pub mod history;
pub mod wal;
pub mod csv_rollup;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{AdaptiveConfig, Config, RecompConfig};
pub use schedule::TrainingSchedule;
pub use adaptive::{compute_snapshot, compute_snapshot_with};
pub use recomp::{
    compute_recomp_checkin, compute_recomp_daily_targets, compute_recomp_metrics,
    compute_recomp_score, compute_trend,
};
pub use state::Profile;
pub use history::{load_measurements, load_weights, SiteMeasurement};
pub use wal::{JsonlSink, SnapshotRecord, SnapshotSink};
