use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use log::{debug, info, warn};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::analysis_context::AnalysisContext;
use crate::error::{Error, Result};

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Surface {
    Hard,
    Clay,
    Grass,
    Carpet,
}

impl Surface {
    pub const ALL: [Surface; 4] = [Surface::Hard, Surface::Clay, Surface::Grass, Surface::Carpet];

    pub fn name(&self) -> &'static str {
        match self {
            Surface::Hard => "Hard",
            Surface::Clay => "Clay",
            Surface::Grass => "Grass",
            Surface::Carpet => "Carpet",
        }
    }
}

impl fmt::Display for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Surface {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        Surface::ALL
            .into_iter()
            .find(|surface| surface.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown surface '{trimmed}'"))
    }
}

// One row of a yearly match file, exactly as it sits on disk. Columns we don't use are ignored,
// and numbers that don't parse become None instead of failing the whole file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMatchRow {
    #[serde(default)]
    pub tourney_id: String,
    #[serde(default)]
    pub tourney_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub match_num: Option<u32>,
    #[serde(default)]
    pub surface: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub minutes: Option<f64>,

    #[serde(default, deserialize_with = "lenient_integer")]
    pub winner_id: Option<PlayerId>,
    #[serde(default)]
    pub winner_name: Option<String>,
    #[serde(default)]
    pub winner_hand: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub winner_ht: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub winner_age: Option<f64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub winner_rank: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub winner_rank_points: Option<f64>,

    #[serde(default, deserialize_with = "lenient_integer")]
    pub loser_id: Option<PlayerId>,
    #[serde(default)]
    pub loser_name: Option<String>,
    #[serde(default)]
    pub loser_hand: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub loser_ht: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub loser_age: Option<f64>,
    #[serde(default, deserialize_with = "lenient_integer")]
    pub loser_rank: Option<u32>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub loser_rank_points: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerEntry {
    pub id: PlayerId,
    pub name: String,
    pub hand: Option<String>,
    pub height: Option<f64>,
    pub age: Option<f64>,
    pub rank: Option<u32>,
    pub rank_points: Option<f64>,
}

// A validated match that hasn't been placed on the timeline yet
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub sequence_in_day: Option<u32>,
    pub tourney_id: String,
    pub surface: Surface,
    pub minutes: Option<f64>,
    pub winner: PlayerEntry,
    pub loser: PlayerEntry,
}

impl MatchRecord {
    pub fn from_raw(raw: RawMatchRow, surfaces: &[Surface]) -> std::result::Result<Self, RowRejection> {
        let date_str = raw
            .tourney_date
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowRejection::MissingDate)?;
        let date = parse_tourney_date(date_str).ok_or(RowRejection::InvalidDate)?;

        let (Some(winner_id), Some(loser_id)) = (raw.winner_id, raw.loser_id) else {
            return Err(RowRejection::MissingPlayerId);
        };
        if winner_id == loser_id {
            return Err(RowRejection::SelfMatch);
        }

        let surface_str = raw
            .surface
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(RowRejection::MissingSurface)?;
        let surface = surface_str
            .parse::<Surface>()
            .ok()
            .filter(|s| surfaces.contains(s))
            .ok_or(RowRejection::ExcludedSurface)?;

        Ok(MatchRecord {
            date,
            sequence_in_day: raw.match_num,
            tourney_id: raw.tourney_id,
            surface,
            minutes: raw.minutes.filter(|m| *m >= 0.0),
            winner: PlayerEntry {
                id: winner_id,
                name: raw.winner_name.unwrap_or_default(),
                hand: normalize_hand(raw.winner_hand),
                height: raw.winner_ht,
                age: raw.winner_age,
                rank: raw.winner_rank,
                rank_points: raw.winner_rank_points,
            },
            loser: PlayerEntry {
                id: loser_id,
                name: raw.loser_name.unwrap_or_default(),
                hand: normalize_hand(raw.loser_hand),
                height: raw.loser_ht,
                age: raw.loser_age,
                rank: raw.loser_rank,
                rank_points: raw.loser_rank_points,
            },
        })
    }

    pub fn into_event(self, event_id: usize) -> MatchEvent {
        MatchEvent {
            event_id,
            date: self.date,
            sequence_in_day: self.sequence_in_day,
            tourney_id: self.tourney_id,
            surface: self.surface,
            minutes: self.minutes,
            winner: self.winner,
            loser: self.loser,
        }
    }
}

// A match placed on the timeline. event_id is its position in chronological order.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvent {
    pub event_id: usize,
    pub date: NaiveDate,
    pub sequence_in_day: Option<u32>,
    pub tourney_id: String,
    pub surface: Surface,
    pub minutes: Option<f64>,
    pub winner: PlayerEntry,
    pub loser: PlayerEntry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RowRejection {
    Unreadable,
    MissingDate,
    InvalidDate,
    MissingPlayerId,
    SelfMatch,
    MissingSurface,
    ExcludedSurface,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RowRejection::Unreadable => "unreadable row",
            RowRejection::MissingDate => "missing tourney_date",
            RowRejection::InvalidDate => "unparseable tourney_date",
            RowRejection::MissingPlayerId => "missing winner/loser id",
            RowRejection::SelfMatch => "winner and loser are the same player",
            RowRejection::MissingSurface => "missing surface",
            RowRejection::ExcludedSurface => "surface not in the configured set",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    pub files: usize,
    pub rows_read: usize,
    pub accepted: usize,
    pub rejected: BTreeMap<RowRejection, usize>,
}

impl LoadSummary {
    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    fn reject(&mut self, reason: RowRejection) {
        *self.rejected.entry(reason).or_insert(0) += 1;
    }
}

// Dates come in as 8-digit YYYYMMDD. Some exports write them as floats ("19970106.0"), so we strip that.
pub fn parse_tourney_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let digits = s.strip_suffix(".0").unwrap_or(s);

    if digits.len() != 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    NaiveDate::parse_from_str(digits, "%Y%m%d").ok()
}

// Integer columns sometimes come out of spreadsheet exports as "12.0". Accept those, anything else unparseable is missing.
pub fn parse_integral(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(value) = s.parse::<u32>() {
        return Some(value);
    }

    let value: f64 = s.parse().ok()?;
    (value.fract() == 0.0 && value >= 0.0 && value <= u32::MAX as f64).then(|| value as u32)
}

fn lenient_integer<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_integral))
}

fn normalize_hand(hand: Option<String>) -> Option<String> {
    hand.map(|h| h.trim().to_ascii_uppercase()).filter(|h| !h.is_empty())
}

// Lists the match files in `dir` whose file name matches `ctx.file_pattern`.
// If the pattern has a capture group, the first group is read as the year and filtered on the context's year range.
// Sorted by path, so the load order (and thus tie-breaking later on) doesn't depend on the filesystem.
pub fn discover_match_files(dir: &Path, ctx: &AnalysisContext) -> Result<Vec<PathBuf>> {
    let pattern = Regex::new(&ctx.file_pattern)?;
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() { continue; }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else { continue; };
        let Some(caps) = pattern.captures(file_name) else { continue; };

        if let Some(year) = caps.get(1).and_then(|m| m.as_str().parse::<u16>().ok()) {
            if !ctx.year_in_range(year) {
                debug!("skipping {file_name}: {year} outside {}-{}", ctx.year_start, ctx.year_end);
                continue;
            }
        }

        paths.push(path);
    }

    if paths.is_empty() {
        return Err(Error::NoMatchingFiles {
            dir: dir.to_path_buf(),
            pattern: ctx.file_pattern.clone(),
        });
    }

    paths.sort();
    Ok(paths)
}

// Reads and validates one CSV source. Rejected rows are counted in `summary`, never returned.
pub fn read_match_records<R: Read>(
    reader: R,
    ctx: &AnalysisContext,
    summary: &mut LoadSummary,
) -> Result<Vec<MatchRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    for row in csv_reader.deserialize::<RawMatchRow>() {
        summary.rows_read += 1;

        let raw = match row {
            Ok(raw) => raw,
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                debug!("unreadable row: {e}");
                summary.reject(RowRejection::Unreadable);
                continue;
            }
        };

        match MatchRecord::from_raw(raw, &ctx.surfaces) {
            Ok(record) => {
                summary.accepted += 1;
                records.push(record);
            }
            Err(reason) => summary.reject(reason),
        }
    }

    Ok(records)
}

// Loads every file in order and concatenates the validated matches
pub fn load_match_records(paths: &[PathBuf], ctx: &AnalysisContext) -> Result<(Vec<MatchRecord>, LoadSummary)> {
    let mut summary = LoadSummary::default();
    let mut records = Vec::new();

    for path in paths {
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let before = summary.accepted;
        records.extend(read_match_records(file, ctx, &mut summary)?);
        summary.files += 1;
        debug!("{}: {} matches", path.display(), summary.accepted - before);
    }

    info!(
        "loaded {} matches from {} files ({} rows read, {} rejected)",
        summary.accepted,
        summary.files,
        summary.rows_read,
        summary.rejected_total()
    );
    for (reason, count) in &summary.rejected {
        warn!("dropped {count} rows: {reason}");
    }

    Ok((records, summary))
}
