use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::archetype::ArchetypeConfig;
use crate::covariates::CovariateFilter;
use crate::data_loader::Surface;
use crate::error::{Error, Result};
use crate::extractor::Perspective;
use crate::smoothing::SmoothingPolicy;

// Everything a run can be tuned with. Start from default() and override what you need, or load a JSON file
// where every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisContext {
    pub file_pattern: String,       // Regex on the file name. Capture group 1, if any, is the year
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub year_start: u16,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub year_end: u16,
    pub surfaces: Vec<Surface>,     // Matches on any other surface are dropped while loading

    pub smoothing: SmoothingPolicy,
    pub perspective: Perspective,

    pub filter: CovariateFilter,
    pub archetype: ArchetypeConfig,

    pub streak_eps: f64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub calibration_buckets: usize,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub bootstrap_resamples: usize,
    pub bootstrap_confidence: f64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub seed: u64,
}

impl Default for AnalysisContext {
    fn default() -> Self {
        Self {
            file_pattern: r"^atp_matches_(\d{4})\.csv$".to_string(),
            year_start: 1991,
            year_end: 2024,
            surfaces: vec![Surface::Hard, Surface::Clay, Surface::Grass],

            smoothing: SmoothingPolicy::default(),
            perspective: Perspective::Both,

            filter: CovariateFilter::default(),
            archetype: ArchetypeConfig::default(),

            streak_eps: 1.0,
            calibration_buckets: 10,

            bootstrap_resamples: 2_000,
            bootstrap_confidence: 0.95,
            seed: 1,
        }
    }
}

impl AnalysisContext {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let ctx: AnalysisContext = serde_json::from_str(&data)?;
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn validate(&self) -> Result<()> {
        self.smoothing.validate().map_err(Error::InvalidConfig)?;

        if self.year_start > self.year_end {
            return Err(Error::InvalidConfig(format!(
                "year_start {} is after year_end {}",
                self.year_start, self.year_end
            )));
        }
        if self.surfaces.is_empty() {
            return Err(Error::InvalidConfig("no surfaces configured".to_string()));
        }
        if self.calibration_buckets == 0 {
            return Err(Error::InvalidConfig("calibration_buckets must be at least 1".to_string()));
        }
        if !(self.bootstrap_confidence > 0.0 && self.bootstrap_confidence < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "bootstrap_confidence must be within (0, 1), got {}",
                self.bootstrap_confidence
            )));
        }
        if self.archetype.recent_matches < self.archetype.min_matches {
            return Err(Error::InvalidConfig(format!(
                "archetype window of {} matches can never reach min_matches {}",
                self.archetype.recent_matches, self.archetype.min_matches
            )));
        }
        if self.streak_eps.is_nan() || self.streak_eps < 0.0 {
            return Err(Error::InvalidConfig(format!("streak_eps must be >= 0, got {}", self.streak_eps)));
        }

        Ok(())
    }

    pub fn year_in_range(&self, year: u16) -> bool {
        (self.year_start..=self.year_end).contains(&year)
    }
}
