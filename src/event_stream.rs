use crate::data_loader::{MatchEvent, MatchRecord};

// Puts matches on the timeline: ascending (date, match number), stable, so matches sharing a key keep the order
// they were loaded in. Files that only carry a tournament date rely on that for reproducible output.
// A missing match number sorts before any present one on the same date.
pub fn build_event_stream(mut records: Vec<MatchRecord>) -> Vec<MatchEvent> {
    records.sort_by_key(|r| (r.date, r.sequence_in_day));

    records
        .into_iter()
        .enumerate()
        .map(|(event_id, record)| record.into_event(event_id))
        .collect()
}
