use std::fmt;

use serde::{Deserialize, Serialize};

use crate::extractor::DerivedFeatureRow;

// (p1 - p2) / p1 from p1's side. Undefined when either side is missing or p1 has no points.
pub fn relative_ranking_points(p1: Option<f64>, p2: Option<f64>) -> Option<f64> {
    let (p1, p2) = (p1?, p2?);
    if p1 == 0.0 {
        return None;
    }
    Some((p1 - p2) / p1)
}

pub fn absolute_ranking_points(p1: Option<f64>, p2: Option<f64>) -> Option<f64> {
    Some(p1? - p2?)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Favor {
    HeavyUnderdog,
    ModerateUnderdog,
    SlightUnderdog,
    Even,
    SlightFavorite,
    ModerateFavorite,
    HeavyFavorite,
}

impl Favor {
    // Upper bound of each bin, right-closed. Anything above the last edge is a heavy favorite.
    const EDGES: [(f64, Favor); 6] = [
        (-0.5, Favor::HeavyUnderdog),
        (-0.2, Favor::ModerateUnderdog),
        (-0.05, Favor::SlightUnderdog),
        (0.05, Favor::Even),
        (0.2, Favor::SlightFavorite),
        (0.5, Favor::ModerateFavorite),
    ];

    pub fn from_relative(rel: f64) -> Option<Favor> {
        if rel.is_nan() {
            return None;
        }
        let favor = Self::EDGES
            .iter()
            .find(|(edge, _)| rel <= *edge)
            .map(|(_, favor)| *favor)
            .unwrap_or(Favor::HeavyFavorite);
        Some(favor)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Favor::HeavyUnderdog => "heavy_underdog",
            Favor::ModerateUnderdog => "moderate_underdog",
            Favor::SlightUnderdog => "slight_underdog",
            Favor::Even => "even",
            Favor::SlightFavorite => "slight_favorite",
            Favor::ModerateFavorite => "moderate_favorite",
            Favor::HeavyFavorite => "heavy_favorite",
        }
    }
}

impl fmt::Display for Favor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// Drops rows after extraction. Rolling counts are built from every match, filtering only decides what gets written out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CovariateFilter {
    pub require_ranks: bool,
    pub min_height: Option<f64>,
    pub age_range: Option<(f64, f64)>,
    pub max_rank_diff: Option<u32>,
}

impl CovariateFilter {
    pub fn is_noop(&self) -> bool {
        *self == CovariateFilter::default()
    }

    pub fn retain(&self, row: &DerivedFeatureRow) -> bool {
        let ranks = (row.player_rank, row.opponent_rank);

        if self.require_ranks && (ranks.0.is_none() || ranks.1.is_none()) {
            return false;
        }

        if let Some(min) = self.min_height {
            match (row.player_height, row.opponent_height) {
                (Some(a), Some(b)) if a >= min && b >= min => {}
                _ => return false,
            }
        }

        if let Some((low, high)) = self.age_range {
            let in_range = |age: Option<f64>| age.is_some_and(|a| a >= low && a <= high);
            if !in_range(row.player_age) || !in_range(row.opponent_age) {
                return false;
            }
        }

        if let Some(max_diff) = self.max_rank_diff {
            match ranks {
                (Some(a), Some(b)) if a.abs_diff(b) <= max_diff => {}
                _ => return false,
            }
        }

        true
    }
}
