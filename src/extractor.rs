use chrono::NaiveDate;
use log::{debug, info};
use serde::{Deserialize, Serialize, Serializer};

use crate::analysis_context::AnalysisContext;
use crate::archetype::{Archetype, ArchetypeTracker};
use crate::covariates::{absolute_ranking_points, relative_ranking_points, Favor};
use crate::data_loader::{MatchEvent, PlayerEntry, PlayerId, Surface};
use crate::rolling::{RollingStore, StreakTracker};
use crate::smoothing::SmoothingPolicy;

// Which side(s) of a match become a row. Both gives the winner row (won = 1) followed by the loser row (won = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Perspective {
    Winner,
    Loser,
    Both,
}

impl Perspective {
    fn includes_winner(&self) -> bool {
        matches!(self, Perspective::Winner | Perspective::Both)
    }

    fn includes_loser(&self) -> bool {
        matches!(self, Perspective::Loser | Perspective::Both)
    }
}

/// One match seen from one player's side.
///
/// Every rate and streak here was read before the match it belongs to was counted,
/// so nothing in a row depends on that row's own result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFeatureRow {
    pub event_id: usize,
    pub event_date: NaiveDate,
    pub tourney_id: String,
    pub category: Surface,
    pub player_id: PlayerId,
    pub opponent_id: PlayerId,
    pub player_name: String,
    pub opponent_name: String,

    pub player_category_rate: f64,
    pub opponent_category_rate: f64,
    pub rate_diff: f64,
    pub player_streak: u32,
    pub opponent_streak: u32,

    pub player_rank: Option<u32>,
    pub opponent_rank: Option<u32>,
    pub rank_diff: Option<i64>,
    pub player_rank_points: Option<f64>,
    pub opponent_rank_points: Option<f64>,
    pub rel_ranking_points: Option<f64>,
    pub abs_ranking_points: Option<f64>,
    pub favor: Option<Favor>,

    pub player_age: Option<f64>,
    pub opponent_age: Option<f64>,
    pub player_height: Option<f64>,
    pub opponent_height: Option<f64>,
    pub player_hand: Option<String>,
    pub opponent_hand: Option<String>,
    pub player_archetype: Option<Archetype>,
    pub opponent_archetype: Option<Archetype>,

    #[serde(serialize_with = "bool_as_int")]
    pub won: bool,
}

fn bool_as_int<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u8(u8::from(*value))
}

// Pre-match numbers for one participant
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    rate: f64,
    streak: u32,
    archetype: Option<Archetype>,
}

impl DerivedFeatureRow {
    fn new(event: &MatchEvent, player: &PlayerEntry, opponent: &PlayerEntry, own: Snapshot, opp: Snapshot, won: bool) -> Self {
        let rel_ranking_points = relative_ranking_points(player.rank_points, opponent.rank_points);

        Self {
            event_id: event.event_id,
            event_date: event.date,
            tourney_id: event.tourney_id.clone(),
            category: event.surface,
            player_id: player.id,
            opponent_id: opponent.id,
            player_name: player.name.clone(),
            opponent_name: opponent.name.clone(),

            player_category_rate: own.rate,
            opponent_category_rate: opp.rate,
            rate_diff: own.rate - opp.rate,
            player_streak: own.streak,
            opponent_streak: opp.streak,

            player_rank: player.rank,
            opponent_rank: opponent.rank,
            rank_diff: player.rank.zip(opponent.rank).map(|(p, o)| o as i64 - p as i64),
            player_rank_points: player.rank_points,
            opponent_rank_points: opponent.rank_points,
            rel_ranking_points,
            abs_ranking_points: absolute_ranking_points(player.rank_points, opponent.rank_points),
            favor: rel_ranking_points.and_then(Favor::from_relative),

            player_age: player.age,
            opponent_age: opponent.age,
            player_height: player.height,
            opponent_height: opponent.height,
            player_hand: player.hand.clone(),
            opponent_hand: opponent.hand.clone(),
            player_archetype: own.archetype,
            opponent_archetype: opp.archetype,

            won,
        }
    }
}

/// Walks the timeline once, keeping per-player surface counters and win streaks.
///
/// For every match it reads both players' state, emits rows, and only then counts the match.
/// Feed it events in chronological order; it is the sole owner of its state.
#[derive(Debug, Clone)]
pub struct CausalExtractor {
    policy: SmoothingPolicy,
    perspective: Perspective,
    store: RollingStore<Surface>,
    streaks: StreakTracker,
    archetypes: Option<ArchetypeTracker>,
    last_key: Option<(NaiveDate, Option<u32>)>,
}

impl CausalExtractor {
    pub fn new(policy: SmoothingPolicy, perspective: Perspective) -> Self {
        Self {
            policy,
            perspective,
            store: RollingStore::new(),
            streaks: StreakTracker::new(),
            archetypes: None,
            last_key: None,
        }
    }

    // Also label each side with its length archetype. Without a tracker the archetype columns stay empty.
    pub fn with_archetypes(mut self, tracker: ArchetypeTracker) -> Self {
        self.archetypes = Some(tracker);
        self
    }

    /// Panics if `event` sorts before the previous one.
    pub fn process(&mut self, event: &MatchEvent, out: &mut Vec<DerivedFeatureRow>) {
        let key = (event.date, event.sequence_in_day);
        assert!(self.last_key.map_or(true, |last| last <= key), "events out of order at {}", event.event_id);
        self.last_key = Some(key);

        let (winner_id, loser_id) = (event.winner.id, event.loser.id);

        // Read everything first. Nothing below may touch the store before both snapshots exist.
        let winner = Snapshot {
            rate: self.policy.rate(self.store.get(winner_id, event.surface)),
            streak: self.streaks.get(winner_id),
            archetype: self.archetypes.as_ref().and_then(|a| a.label(winner_id)),
        };
        let loser = Snapshot {
            rate: self.policy.rate(self.store.get(loser_id, event.surface)),
            streak: self.streaks.get(loser_id),
            archetype: self.archetypes.as_ref().and_then(|a| a.label(loser_id)),
        };

        if self.perspective.includes_winner() {
            out.push(DerivedFeatureRow::new(event, &event.winner, &event.loser, winner, loser, true));
        }
        if self.perspective.includes_loser() {
            out.push(DerivedFeatureRow::new(event, &event.loser, &event.winner, loser, winner, false));
        }

        self.store.update(winner_id, event.surface, true);
        self.store.update(loser_id, event.surface, false);
        self.streaks.record(winner_id, loser_id);
        if let Some(archetypes) = &mut self.archetypes {
            archetypes.record(event);
        }
    }

    pub fn store(&self) -> &RollingStore<Surface> {
        &self.store
    }

    pub fn streaks(&self) -> &StreakTracker {
        &self.streaks
    }
}

// Runs the extractor over the whole timeline, then applies the context's covariate filter to the output.
pub fn extract_features(events: &[MatchEvent], ctx: &AnalysisContext) -> Vec<DerivedFeatureRow> {
    let mut extractor = CausalExtractor::new(ctx.smoothing, ctx.perspective)
        .with_archetypes(ArchetypeTracker::for_events(ctx.archetype, events));
    let mut rows = Vec::with_capacity(events.len() * 2);

    for event in events {
        extractor.process(event, &mut rows);
    }

    debug!(
        "{} players tracked, longest running streak {}",
        extractor.store().len(),
        extractor.streaks().longest()
    );

    if !ctx.filter.is_noop() {
        let before = rows.len();
        rows.retain(|row| ctx.filter.retain(row));
        info!("covariate filter kept {} of {} rows", rows.len(), before);
    }

    rows
}
