use std::collections::{BTreeMap, HashMap, VecDeque};

use chrono::Datelike;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::data_loader::{MatchEvent, PlayerId};
use crate::rolling::WinLoss;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthBin {
    Short,
    Medium,
    Long,
}

// A year's cut points: one sample standard deviation either side of the mean match length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LengthThresholds {
    pub short: f64,
    pub long: f64,
}

impl LengthThresholds {
    // None with fewer than two durations, where the spread is undefined
    pub fn from_minutes(minutes: &[f64]) -> Option<Self> {
        if minutes.len() < 2 {
            return None;
        }
        let n = minutes.len() as f64;
        let mean = minutes.iter().sum::<f64>() / n;
        let variance = minutes.iter().map(|m| (m - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = variance.sqrt();
        Some(Self { short: mean - std, long: mean + std })
    }

    // Both cut points themselves count as medium
    pub fn bin(&self, minutes: f64) -> LengthBin {
        if minutes < self.short {
            LengthBin::Short
        } else if minutes > self.long {
            LengthBin::Long
        } else {
            LengthBin::Medium
        }
    }
}

// Thresholds per calendar year of the tournament date, from every match with a known length
pub fn yearly_thresholds(events: &[MatchEvent]) -> BTreeMap<i32, LengthThresholds> {
    let mut minutes_by_year: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    for event in events {
        if let Some(minutes) = event.minutes {
            minutes_by_year.entry(event.date.year()).or_default().push(minutes);
        }
    }

    minutes_by_year
        .into_iter()
        .filter_map(|(year, minutes)| LengthThresholds::from_minutes(&minutes).map(|t| (year, t)))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Archetype {
    Sprinter,
    Endurance,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchetypeConfig {
    pub recent_matches: usize,  // Only a player's latest matches with a known length are looked at
    pub min_matches: usize,     // Fewer than this in the window and the player gets no label
    pub min_bin_matches: usize, // A bin needs this many matches before it can define the player
}

impl Default for ArchetypeConfig {
    fn default() -> Self {
        Self {
            recent_matches: 100,
            min_matches: 50,
            min_bin_matches: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinCounts {
    pub short: WinLoss,
    pub medium: WinLoss,
    pub long: WinLoss,
}

impl BinCounts {
    fn add(&mut self, bin: LengthBin, won: bool) {
        let counter = match bin {
            LengthBin::Short => &mut self.short,
            LengthBin::Medium => &mut self.medium,
            LengthBin::Long => &mut self.long,
        };
        if won { counter.wins += 1 } else { counter.losses += 1 }
    }

    pub fn total(&self) -> u32 {
        self.short.total() + self.medium.total() + self.long.total()
    }

    // Raw win rate, an empty bin reads as 0
    fn win_rate(record: WinLoss) -> f64 {
        if record.total() == 0 { 0.0 } else { record.wins as f64 / record.total() as f64 }
    }

    // Short wins ties, then long. Both need enough matches in their bin.
    pub fn classify(&self, min_bin_matches: usize) -> Archetype {
        let (short, medium, long) = (Self::win_rate(self.short), Self::win_rate(self.medium), Self::win_rate(self.long));

        if short >= medium && short >= long && self.short.total() as usize >= min_bin_matches {
            return Archetype::Sprinter;
        }
        if long >= medium && long >= short && self.long.total() as usize >= min_bin_matches {
            return Archetype::Endurance;
        }
        Archetype::Balanced
    }
}

/// Sliding window of each player's most recent timed matches, binned by length.
///
/// `label` only reflects what has been `record`ed so far, so reading it before recording a match
/// keeps that match's result out of its own label.
#[derive(Debug, Clone)]
pub struct ArchetypeTracker {
    config: ArchetypeConfig,
    thresholds: BTreeMap<i32, LengthThresholds>,
    windows: HashMap<PlayerId, VecDeque<(LengthBin, bool)>>,
}

impl ArchetypeTracker {
    pub fn new(config: ArchetypeConfig, thresholds: BTreeMap<i32, LengthThresholds>) -> Self {
        Self { config, thresholds, windows: HashMap::new() }
    }

    // Thresholds taken from the events themselves
    pub fn for_events(config: ArchetypeConfig, events: &[MatchEvent]) -> Self {
        let thresholds = yearly_thresholds(events);
        debug!("match length thresholds for {} years", thresholds.len());
        Self::new(config, thresholds)
    }

    // None for matches without a length. A year without thresholds bins everything as medium.
    pub fn bin(&self, event: &MatchEvent) -> Option<LengthBin> {
        let minutes = event.minutes?;
        Some(match self.thresholds.get(&event.date.year()) {
            Some(thresholds) => thresholds.bin(minutes),
            None => LengthBin::Medium,
        })
    }

    pub fn record(&mut self, event: &MatchEvent) {
        let Some(bin) = self.bin(event) else { return };
        let limit = self.config.recent_matches;

        for (player, won) in [(event.winner.id, true), (event.loser.id, false)] {
            let window = self.windows.entry(player).or_default();
            window.push_back((bin, won));
            while window.len() > limit {
                window.pop_front();
            }
        }
    }

    pub fn counts(&self, player: PlayerId) -> BinCounts {
        let mut counts = BinCounts::default();
        for &(bin, won) in self.windows.get(&player).into_iter().flatten() {
            counts.add(bin, won);
        }
        counts
    }

    pub fn label(&self, player: PlayerId) -> Option<Archetype> {
        let counts = self.counts(player);
        if (counts.total() as usize) < self.config.min_matches.max(1) {
            return None;
        }
        Some(counts.classify(self.config.min_bin_matches))
    }

    pub fn players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.windows.keys().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerArchetype {
    pub player_id: PlayerId,
    pub player_name: String,
    pub matches: u32,
    pub short_matches: u32,
    pub short_win_rate: f64,
    pub medium_matches: u32,
    pub medium_win_rate: f64,
    pub long_matches: u32,
    pub long_win_rate: f64,
    pub archetype: Archetype,
}

// One label per eligible player over the whole timeline, from their latest matches. Sorted by player id.
pub fn assign_archetypes(events: &[MatchEvent], config: ArchetypeConfig) -> Vec<PlayerArchetype> {
    let mut tracker = ArchetypeTracker::for_events(config, events);
    let mut names: HashMap<PlayerId, &str> = HashMap::new();
    for event in events {
        tracker.record(event);
        names.insert(event.winner.id, &event.winner.name);
        names.insert(event.loser.id, &event.loser.name);
    }

    let mut labelled: Vec<PlayerArchetype> = tracker
        .players()
        .filter_map(|player_id| {
            let archetype = tracker.label(player_id)?;
            let counts = tracker.counts(player_id);
            Some(PlayerArchetype {
                player_id,
                player_name: names.get(&player_id).map(|n| n.to_string()).unwrap_or_default(),
                matches: counts.total(),
                short_matches: counts.short.total(),
                short_win_rate: BinCounts::win_rate(counts.short),
                medium_matches: counts.medium.total(),
                medium_win_rate: BinCounts::win_rate(counts.medium),
                long_matches: counts.long.total(),
                long_win_rate: BinCounts::win_rate(counts.long),
                archetype,
            })
        })
        .collect();

    labelled.sort_by_key(|p| p.player_id);
    labelled
}
