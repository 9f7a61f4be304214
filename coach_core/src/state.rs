//! Profile persistence with file locking.
//!
//! The profile holds the slow-moving body metrics and goal the adaptive
//! engine needs. It is saved atomically and read under a shared lock.

use crate::{
    ActivityLevel, AdaptiveInput, Error, GoalType, Result, Sex, WeightEntry,
};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// A user's stored body metrics and goal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub height_cm: f64,
    pub age_years: u32,
    pub sex: Sex,
    pub activity_level: ActivityLevel,
    pub goal_type: GoalType,
    pub goal_rate_per_week: f64,
    #[serde(default)]
    pub training_load_score: f64,
}

impl Profile {
    /// Build engine input from this profile and the logged bodyweights.
    ///
    /// The current weight is the newest logged sample.
    pub fn adaptive_input(&self, history: Vec<WeightEntry>) -> Result<AdaptiveInput> {
        let latest = history
            .iter()
            .max_by_key(|e| e.date)
            .ok_or(Error::EmptyHistory)?;

        Ok(AdaptiveInput {
            weight_kg: latest.weight_kg,
            height_cm: self.height_cm,
            age_years: self.age_years,
            sex: self.sex,
            activity_level: self.activity_level,
            goal_type: self.goal_type,
            goal_rate_per_week: self.goal_rate_per_week,
            bodyweight_history: history,
            training_load_score: self.training_load_score,
        })
    }

    /// Load a profile from a file with shared locking
    ///
    /// Returns `None` if the file doesn't exist.
    /// If the file is corrupted, logs a warning and returns `None`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::info!("No profile found at {:?}", path);
            return Ok(None);
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open profile {:?}: {}", path, e);
                return Ok(None);
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock profile {:?}: {}", path, e);
            return Ok(None);
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        if let Err(e) = reader.read_to_string(&mut contents) {
            let _ = file.unlock();
            tracing::warn!("Failed to read profile {:?}: {}", path, e);
            return Ok(None);
        }

        file.unlock()?;

        match serde_json::from_str::<Profile>(&contents) {
            Ok(profile) => {
                tracing::debug!("Loaded profile from {:?}", path);
                Ok(Some(profile))
            }
            Err(e) => {
                tracing::warn!("Failed to parse profile {:?}: {}. Ignoring it.", path, e);
                Ok(None)
            }
        }
    }

    /// Save the profile with exclusive locking
    ///
    /// Atomically writes by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::State(format!("profile path {:?} has no parent", path)))?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;

        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved profile to {:?}", path);
        Ok(())
    }

    /// Load the profile, modify it, and save it back atomically
    ///
    /// Fails with [`Error::State`] when no profile exists yet.
    pub fn update<F>(path: &Path, f: F) -> Result<Self>
    where
        F: FnOnce(&mut Profile) -> Result<()>,
    {
        let mut profile = Self::load(path)?
            .ok_or_else(|| Error::State("no profile to update".into()))?;
        f(&mut profile)?;
        profile.save(path)?;
        Ok(profile)
    }
}
