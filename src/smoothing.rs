use serde::{Deserialize, Serialize};

use crate::rolling::WinLoss;

// Turns a (wins, losses) pair into a win probability. Every rate the extractor emits goes through here,
// so it has to be total over all counter pairs, (0, 0) included.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SmoothingPolicy {
    // Below min_samples matches the raw rate is considered noise and we return `neutral` instead.
    ThresholdDefault { min_samples: u32, neutral: f64 },
    // Laplace-style pseudo-counts. Approaches the raw rate as matches pile up, no cliff at the threshold.
    Additive { alpha: f64 },
}

impl Default for SmoothingPolicy {
    fn default() -> Self {
        SmoothingPolicy::Additive { alpha: 1.0 }
    }
}

impl SmoothingPolicy {
    pub const THRESHOLD_DEFAULT: SmoothingPolicy = SmoothingPolicy::ThresholdDefault { min_samples: 15, neutral: 0.5 };

    pub fn method(&self) -> SmoothingMethod {
        match self {
            SmoothingPolicy::ThresholdDefault { .. } => SmoothingMethod::Threshold,
            SmoothingPolicy::Additive { .. } => SmoothingMethod::Additive,
        }
    }

    pub fn rate(&self, record: WinLoss) -> f64 {
        let total = record.total();

        match *self {
            SmoothingPolicy::ThresholdDefault { min_samples, neutral } => {
                if total == 0 || total < min_samples {
                    return neutral;
                }
                record.wins as f64 / total as f64
            }
            SmoothingPolicy::Additive { alpha } => {
                (record.wins as f64 + alpha) / (total as f64 + 2.0 * alpha)
            }
        }
    }

    // The value an entity gets before it has played a single match in a category
    pub fn cold_start(&self) -> f64 {
        self.rate(WinLoss::default())
    }

    pub fn validate(&self) -> Result<(), String> {
        match *self {
            SmoothingPolicy::ThresholdDefault { neutral, .. } => {
                if !(0.0..=1.0).contains(&neutral) {
                    return Err(format!("neutral rate must be within [0, 1], got {neutral}"));
                }
            }
            SmoothingPolicy::Additive { alpha } => {
                if !(alpha > 0.0 && alpha.is_finite()) {
                    return Err(format!("additive smoothing needs a positive alpha, got {alpha}"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SmoothingMethod {
    Threshold,
    Additive,
}

// Individual settings given on top of a configured policy, e.g. from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SmoothingOverrides {
    pub method: Option<SmoothingMethod>,
    pub min_samples: Option<u32>,
    pub neutral: Option<f64>,
    pub alpha: Option<f64>,
}

impl SmoothingOverrides {
    // Naming the method already in use keeps its parameters. Switching method starts from that method's defaults.
    // Every parameter given must belong to the resulting method.
    pub fn apply(&self, current: SmoothingPolicy) -> Result<SmoothingPolicy, String> {
        let mut policy = match self.method {
            Some(method) if method == current.method() => current,
            Some(SmoothingMethod::Threshold) => SmoothingPolicy::THRESHOLD_DEFAULT,
            Some(SmoothingMethod::Additive) => SmoothingPolicy::default(),
            None => current,
        };

        match &mut policy {
            SmoothingPolicy::ThresholdDefault { min_samples, neutral } => {
                if self.alpha.is_some() {
                    return Err("alpha only applies to additive smoothing".to_string());
                }
                if let Some(value) = self.min_samples { *min_samples = value; }
                if let Some(value) = self.neutral { *neutral = value; }
            }
            SmoothingPolicy::Additive { alpha } => {
                if self.min_samples.is_some() || self.neutral.is_some() {
                    return Err("min_samples and neutral only apply to threshold smoothing".to_string());
                }
                if let Some(value) = self.alpha { *alpha = value; }
            }
        }

        policy.validate()?;
        Ok(policy)
    }
}
