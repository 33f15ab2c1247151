use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use log::info;
use serde::Serialize;

use crate::analysis::{Calibration, ConfidenceInterval, StreakBucket};
use crate::archetype::{Archetype, PlayerArchetype};
use crate::error::{Error, Result};
use crate::extractor::DerivedFeatureRow;

fn write_rows<W: Write, T: Serialize>(writer: W, rows: &[T]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush().map_err(|e| Error::io("<csv output>", e))?;
    Ok(())
}

fn create_output(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    File::create(path).map_err(|e| Error::io(path, e))
}

pub fn write_features<W: Write>(writer: W, rows: &[DerivedFeatureRow]) -> Result<()> {
    write_rows(writer, rows)
}

pub fn write_features_file(path: &Path, rows: &[DerivedFeatureRow]) -> Result<()> {
    write_features(create_output(path)?, rows)?;
    info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_archetypes_file(path: &Path, players: &[PlayerArchetype]) -> Result<()> {
    write_rows(create_output(path)?, players)?;
    info!("wrote {} player archetypes to {}", players.len(), path.display());
    Ok(())
}

pub fn output_archetype_summary(players: &[PlayerArchetype]) {
    for archetype in [Archetype::Sprinter, Archetype::Endurance, Archetype::Balanced] {
        let count = players.iter().filter(|p| p.archetype == archetype).count();
        println!("{0:10} | Players: {1:6}", format!("{archetype:?}"), count);
    }
}

// One line per streak length. Lengths seen fewer than min_matches times are left out.
pub fn format_streak_report(table: &[StreakBucket], intervals: &[Option<ConfidenceInterval>], min_matches: usize) -> Vec<String> {
    let mut lines = vec!["| Streak | Matches | Wins   | Losses | Win rate | CI                | W/L ratio".to_string()];

    for (i, bucket) in table.iter().enumerate() {
        if bucket.appearances < min_matches.max(1) { continue; }

        let ci = match intervals.get(i).copied().flatten() {
            Some(ci) => format!("[{0:5.3}, {1:5.3}]", ci.lower, ci.upper),
            None => "-".to_string(),
        };

        lines.push(format!("| {0:6} | {1:7} | {2:6} | {3:6} | {4:8.3} | {5:17} | {6:6.3}",
            bucket.streak,
            bucket.appearances,
            bucket.wins,
            bucket.losses,
            bucket.win_rate.unwrap_or(f64::NAN),
            ci,
            bucket.win_loss_ratio,
        ));
    }

    lines
}

pub fn output_streak_report(table: &[StreakBucket], intervals: &[Option<ConfidenceInterval>], min_matches: usize) {
    for line in format_streak_report(table, intervals, min_matches) {
        println!("{line}");
    }
}

pub fn output_calibration_report(calibration: &Calibration) {
    for b in &calibration.buckets {
        println!("Rate bucket {0:3.2}-{1:3.2} | Rows: {2:7} | Mean rate: {3:5.3} | Observed: {4:5.3}",
            b.lower,
            b.upper,
            b.count,
            b.mean_rate,
            b.observed,
        );
    }
    println!("Weighted calibration error: {0:6.4}", calibration.weighted_error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_loader::Surface;
    use chrono::NaiveDate;

    #[test]
    fn writes_header_and_int_outcome() {
        let row = DerivedFeatureRow {
            event_id: 3,
            event_date: NaiveDate::from_ymd_opt(2019, 1, 14).unwrap(),
            tourney_id: "2019-580".to_string(),
            category: Surface::Hard,
            player_id: 104925,
            opponent_id: 105223,
            player_name: "Novak Djokovic".to_string(),
            opponent_name: "Juan Martin del Potro".to_string(),
            player_category_rate: 0.75,
            opponent_category_rate: 0.5,
            rate_diff: 0.25,
            player_streak: 4,
            opponent_streak: 0,
            player_rank: Some(1),
            opponent_rank: None,
            rank_diff: None,
            player_rank_points: None,
            opponent_rank_points: None,
            rel_ranking_points: None,
            abs_ranking_points: None,
            favor: None,
            player_age: None,
            opponent_age: None,
            player_height: None,
            opponent_height: None,
            player_hand: Some("R".to_string()),
            opponent_hand: None,
            player_archetype: None,
            opponent_archetype: None,
            won: true,
        };

        let mut out = Vec::new();
        write_features(&mut out, &[row]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("event_id,event_date,tourney_id,category,player_id,opponent_id"));
        assert!(header.ends_with(",won"));

        let line = lines.next().unwrap();
        assert!(line.starts_with("3,2019-01-14,2019-580,Hard,104925,105223,Novak Djokovic"));
        assert!(line.ends_with(",R,,,,1"));
    }

    #[test]
    fn streak_report_skips_rarely_seen_lengths() {
        let bucket = |streak, appearances, wins| StreakBucket {
            streak,
            appearances,
            wins,
            losses: appearances - wins,
            win_rate: (appearances > 0).then(|| wins as f64 / appearances as f64),
            win_loss_ratio: wins as f64 / (1.0 + (appearances - wins) as f64),
        };
        let table = vec![bucket(0, 40, 20), bucket(1, 12, 7), bucket(2, 0, 0), bucket(3, 3, 2)];
        let intervals = vec![Some(ConfidenceInterval { mean: 0.5, lower: 0.35, upper: 0.65 }), None, None, None];

        let lines = format_streak_report(&table, &intervals, 10);
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("|      0 |      40 |"));
        assert!(lines[1].contains("[0.350, 0.650]"));
        assert!(lines[2].starts_with("|      1 |      12 |"));

        // Zero still hides lengths nobody went into a match with
        assert_eq!(format_streak_report(&table, &intervals, 0).len(), 4);
    }
}
