//! Training/rest day classification for calorie cycling.

use crate::DayType;
use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Weekly training schedule
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TrainingSchedule {
    #[serde(default = "default_training_days")]
    pub training_days: Vec<Weekday>,
}

impl Default for TrainingSchedule {
    fn default() -> Self {
        Self {
            training_days: default_training_days(),
        }
    }
}

fn default_training_days() -> Vec<Weekday> {
    vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
}

impl TrainingSchedule {
    pub fn new(training_days: Vec<Weekday>) -> Self {
        Self { training_days }
    }

    /// Classify a caller-supplied date
    pub fn classify(&self, date: NaiveDate) -> DayType {
        if self.training_days.contains(&date.weekday()) {
            DayType::Training
        } else {
            DayType::Rest
        }
    }
}
