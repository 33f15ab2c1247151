use std::collections::HashMap;
use std::hash::Hash;

use crate::data_loader::PlayerId;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WinLoss {
    pub wins: u32,
    pub losses: u32,
}

impl WinLoss {
    pub fn total(&self) -> u32 {
        self.wins + self.losses
    }
}

// Counters for a single player, one pair per category. A category we've never seen reads as (0, 0).
#[derive(Debug, Clone)]
pub struct EntityRollingState<C> {
    counters: HashMap<C, WinLoss>,
}

impl<C: Copy + Eq + Hash> EntityRollingState<C> {
    fn new() -> Self {
        Self { counters: HashMap::new() }
    }

    pub fn get(&self, category: C) -> WinLoss {
        self.counters.get(&category).copied().unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = (&C, &WinLoss)> {
        self.counters.iter()
    }
}

/// Per-player, per-category win/loss counters accumulated in match order.
///
/// `update` is not idempotent: calling it twice for the same match counts the match twice.
/// The extraction loop is the only writer and updates each participant exactly once per match.
#[derive(Debug, Clone)]
pub struct RollingStore<C> {
    entities: HashMap<PlayerId, EntityRollingState<C>>,
}

impl<C: Copy + Eq + Hash> Default for RollingStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Copy + Eq + Hash> RollingStore<C> {
    pub fn new() -> Self {
        Self { entities: HashMap::new() }
    }

    pub fn get(&self, entity_id: PlayerId, category: C) -> WinLoss {
        self.entities
            .get(&entity_id)
            .map(|state| state.get(category))
            .unwrap_or_default()
    }

    pub fn update(&mut self, entity_id: PlayerId, category: C, did_win: bool) {
        let counter = self
            .entities
            .entry(entity_id)
            .or_insert_with(EntityRollingState::new)
            .counters
            .entry(category)
            .or_default();

        if did_win {
            counter.wins += 1;
        } else {
            counter.losses += 1;
        }
    }

    pub fn entity(&self, entity_id: PlayerId) -> Option<&EntityRollingState<C>> {
        self.entities.get(&entity_id)
    }

    // Number of players that have appeared at least once
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// Consecutive wins going into a match. A loss resets the player to 0.
#[derive(Debug, Clone, Default)]
pub struct StreakTracker {
    streaks: HashMap<PlayerId, u32>,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_id: PlayerId) -> u32 {
        self.streaks.get(&entity_id).copied().unwrap_or(0)
    }

    pub fn record(&mut self, winner: PlayerId, loser: PlayerId) {
        *self.streaks.entry(winner).or_insert(0) += 1;
        self.streaks.insert(loser, 0);
    }

    pub fn longest(&self) -> u32 {
        self.streaks.values().copied().max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_entity_reads_zero() {
        let store: RollingStore<u8> = RollingStore::new();
        assert_eq!(store.get(42, 0), WinLoss { wins: 0, losses: 0 });
        assert!(store.is_empty());
    }

    #[test]
    fn update_touches_only_one_counter() {
        let mut store = RollingStore::new();
        store.update(1, 'h', true);
        store.update(1, 'h', false);
        store.update(1, 'c', true);

        assert_eq!(store.get(1, 'h'), WinLoss { wins: 1, losses: 1 });
        assert_eq!(store.get(1, 'c'), WinLoss { wins: 1, losses: 0 });
        assert_eq!(store.get(1, 'g'), WinLoss::default());
        assert_eq!(store.len(), 1);
        assert_eq!(store.entity(1).map(|e| e.categories().count()), Some(2));
    }

    #[test]
    fn double_update_double_counts() {
        let mut store = RollingStore::new();
        store.update(7, (), true);
        store.update(7, (), true);
        assert_eq!(store.get(7, ()).wins, 2);
    }

    #[test]
    fn streak_resets_on_loss() {
        let mut streaks = StreakTracker::new();
        streaks.record(1, 2);
        streaks.record(1, 3);
        assert_eq!(streaks.get(1), 2);
        assert_eq!(streaks.get(2), 0);

        streaks.record(2, 1);
        assert_eq!(streaks.get(1), 0);
        assert_eq!(streaks.get(2), 1);
        assert_eq!(streaks.get(99), 0);
        assert_eq!(streaks.longest(), 1);
    }
}
