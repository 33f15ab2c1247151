use std::fs;
use std::path::Path;

use tempfile::TempDir;

use tennis_stats::data_loader::{discover_match_files, load_match_records, RowRejection};
use tennis_stats::report::{write_archetypes_file, write_features_file};
use tennis_stats::{
    assign_archetypes, build_event_stream, extract_features, AnalysisContext, Archetype, ArchetypeConfig, Error, Perspective,
    SmoothingPolicy, Surface,
};

const HEADER: &str = "tourney_id,tourney_name,surface,draw_size,tourney_level,tourney_date,match_num,winner_id,winner_seed,winner_entry,winner_name,winner_hand,winner_ht,winner_ioc,winner_age,loser_id,loser_seed,loser_entry,loser_name,loser_hand,loser_ht,loser_ioc,loser_age,score,best_of,round,minutes,winner_rank,winner_rank_points,loser_rank,loser_rank_points";

fn match_line(tourney: &str, surface: &str, date: &str, num: u32, winner: u32, loser: u32) -> String {
    format!(
        "{tourney},Some Open,{surface},32,A,{date},{num},{winner},,,P{winner},R,185,SRB,25.0,{loser},,,P{loser},L,190,ESP,27.5,6-4 6-4,3,R32,90,{winner},1000,{loser},800"
    )
}

fn write_file(dir: &Path, name: &str, lines: &[String]) {
    let mut body = String::from(HEADER);
    for line in lines {
        body.push('\n');
        body.push_str(line);
    }
    body.push('\n');
    fs::write(dir.join(name), body).unwrap();
}

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();

    // 2020 is listed first on purpose: files load in name order, matches are then ordered by date
    write_file(dir.path(), "atp_matches_2020.csv", &[
        match_line("2020-1", "Hard", "20200106", 2, 2, 1),
        match_line("2020-1", "Hard", "20200106", 1, 1, 3),
        match_line("2020-2", "Carpet", "20200113", 1, 1, 2),
    ]);
    write_file(dir.path(), "atp_matches_2019.csv", &[
        match_line("2019-1", "Hard", "20190107", 1, 1, 2),
        match_line("2019-2", "Clay", "20190415", 1, 3, 1),
        match_line("2019-3", "Hard", "bad", 1, 3, 1),
    ]);
    write_file(dir.path(), "atp_matches_qual_chall_2019.csv", &[match_line("q", "Hard", "20190101", 1, 9, 8)]);
    write_file(dir.path(), "atp_matches_1985.csv", &[match_line("old", "Grass", "19850624", 1, 9, 8)]);
    fs::write(dir.path().join("notes.txt"), "not a match file").unwrap();

    dir
}

#[test]
fn discovers_only_matching_years() {
    let dir = fixture();
    let ctx = AnalysisContext::default();

    let paths = discover_match_files(dir.path(), &ctx).unwrap();
    let names: Vec<String> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();

    assert_eq!(names, vec!["atp_matches_2019.csv", "atp_matches_2020.csv"]);
}

#[test]
fn year_range_narrows_discovery() {
    let dir = fixture();
    let ctx = AnalysisContext { year_start: 2020, year_end: 2020, ..AnalysisContext::default() };

    let paths = discover_match_files(dir.path(), &ctx).unwrap();
    assert_eq!(paths.len(), 1);
}

#[test]
fn no_matching_files_is_an_error() {
    let dir = fixture();
    let ctx = AnalysisContext { file_pattern: r"^wta_matches_(\d{4})\.csv$".to_string(), ..AnalysisContext::default() };

    assert!(matches!(discover_match_files(dir.path(), &ctx), Err(Error::NoMatchingFiles { .. })));
}

#[test]
fn end_to_end_surface_rates() {
    let dir = fixture();
    let ctx = AnalysisContext {
        smoothing: SmoothingPolicy::ThresholdDefault { min_samples: 1, neutral: 0.5 },
        perspective: Perspective::Winner,
        ..AnalysisContext::default()
    };

    let paths = discover_match_files(dir.path(), &ctx).unwrap();
    let (records, summary) = load_match_records(&paths, &ctx).unwrap();
    assert_eq!(summary.files, 2);
    assert_eq!(summary.rows_read, 6);
    assert_eq!(summary.accepted, 4);
    assert_eq!(summary.rejected.get(&RowRejection::InvalidDate), Some(&1));
    assert_eq!(summary.rejected.get(&RowRejection::ExcludedSurface), Some(&1));

    let events = build_event_stream(records);
    let order: Vec<(u32, u32)> = events.iter().map(|e| (e.winner.id, e.loser.id)).collect();
    assert_eq!(order, vec![(1, 2), (3, 1), (1, 3), (2, 1)]);

    let rows = extract_features(&events, &ctx);
    assert_eq!(rows.len(), 4);

    // 2019-01-07: first hard match for both
    assert_eq!((rows[0].player_category_rate, rows[0].opponent_category_rate), (0.5, 0.5));
    // 2019-04-15 on clay: nobody has clay history
    assert_eq!(rows[1].category, Surface::Clay);
    assert_eq!((rows[1].player_category_rate, rows[1].opponent_category_rate), (0.5, 0.5));
    // 2020-01-06 match 1: player 1 is 1-0 on hard, player 3 has never played on hard
    assert_eq!((rows[2].player_category_rate, rows[2].opponent_category_rate), (1.0, 0.5));
    // 2020-01-06 match 2: player 2 is 0-1, player 1 is 2-0
    assert_eq!((rows[3].player_category_rate, rows[3].opponent_category_rate), (0.0, 1.0));
    assert_eq!((rows[3].player_streak, rows[3].opponent_streak), (0, 1));
}

#[test]
fn writes_dataset_csv() {
    let dir = fixture();
    let ctx = AnalysisContext::default();

    let paths = discover_match_files(dir.path(), &ctx).unwrap();
    let (records, _) = load_match_records(&paths, &ctx).unwrap();
    let rows = extract_features(&build_event_stream(records), &ctx);
    assert_eq!(rows.len(), 8);

    let out = dir.path().join("out").join("surface_winrate_dataset.csv");
    write_features_file(&out, &rows).unwrap();

    let mut reader = csv::Reader::from_path(&out).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.get(0), Some("event_id"));
    assert!(headers.iter().any(|h| h == "player_category_rate"));
    assert!(headers.iter().any(|h| h == "opponent_archetype"));

    let won_col = headers.iter().position(|h| h == "won").unwrap();
    let won: Vec<String> = reader
        .records()
        .map(|r| r.unwrap().get(won_col).unwrap().to_string())
        .collect();
    assert_eq!(won, vec!["1", "0", "1", "0", "1", "0", "1", "0"]);
}

#[test]
fn loads_config_from_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("analysis.json");
    fs::write(
        &path,
        r#"{"smoothing": {"method": "additive", "alpha": 2.0}, "surfaces": ["Hard", "Carpet"], "seed": "42"}"#,
    )
    .unwrap();

    let ctx = AnalysisContext::from_json_file(&path).unwrap();
    assert_eq!(ctx.smoothing, SmoothingPolicy::Additive { alpha: 2.0 });
    assert_eq!(ctx.surfaces, vec![Surface::Hard, Surface::Carpet]);
    assert_eq!(ctx.seed, 42);
}

#[test]
fn invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("analysis.json");
    fs::write(&path, r#"{"smoothing": {"method": "additive", "alpha": 0.0}}"#).unwrap();

    assert!(matches!(AnalysisContext::from_json_file(&path), Err(Error::InvalidConfig(_))));
}

#[test]
fn labels_archetypes_from_loaded_matches() {
    let dir = fixture();
    let ctx = AnalysisContext {
        archetype: ArchetypeConfig { recent_matches: 10, min_matches: 4, min_bin_matches: 1 },
        ..AnalysisContext::default()
    };

    let paths = discover_match_files(dir.path(), &ctx).unwrap();
    let (records, _) = load_match_records(&paths, &ctx).unwrap();
    let players = assign_archetypes(&build_event_stream(records), ctx.archetype);

    // Every fixture match lasts 90 minutes, so all of them are medium. Only player 1 has four.
    assert_eq!(players.len(), 1);
    assert_eq!(players[0].player_id, 1);
    assert_eq!(players[0].medium_matches, 4);
    assert_eq!(players[0].medium_win_rate, 0.5);
    assert_eq!(players[0].archetype, Archetype::Balanced);

    let out = dir.path().join("player_archetypes.csv");
    write_archetypes_file(&out, &players).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("player_id,player_name,matches,"));
    assert!(text.lines().nth(1).unwrap().ends_with(",Balanced"));
}
