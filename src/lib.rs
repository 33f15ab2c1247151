//! Causal per-player statistics for professional tennis match data.
//!
//! Matches are loaded from yearly CSV files, put on a single timeline and walked once. Every derived
//! number (surface win rate, win streak) is read before the match it belongs to is counted, so a row
//! never sees its own result.

pub mod analysis;
pub mod archetype;
pub mod analysis_context;
pub mod covariates;
pub mod data_loader;
pub mod error;
pub mod event_stream;
pub mod extractor;
pub mod report;
pub mod rolling;
pub mod smoothing;

pub use analysis_context::AnalysisContext;
pub use archetype::{assign_archetypes, Archetype, ArchetypeConfig, ArchetypeTracker};
pub use data_loader::{MatchEvent, MatchRecord, PlayerId, Surface};
pub use error::{Error, Result};
pub use event_stream::build_event_stream;
pub use extractor::{extract_features, CausalExtractor, DerivedFeatureRow, Perspective};
pub use rolling::{RollingStore, StreakTracker, WinLoss};
pub use smoothing::{SmoothingMethod, SmoothingOverrides, SmoothingPolicy};
