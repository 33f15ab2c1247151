use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use tennis_stats::analysis::{bootstrap_mean_ci, rate_calibration, streak_outcomes, streak_win_rates};
use tennis_stats::data_loader::{discover_match_files, load_match_records};
use tennis_stats::report::{
    output_archetype_summary, output_calibration_report, output_streak_report, write_archetypes_file, write_features_file,
};
use tennis_stats::smoothing::{SmoothingMethod, SmoothingOverrides};
use tennis_stats::{assign_archetypes, build_event_stream, extract_features, AnalysisContext, DerivedFeatureRow, MatchEvent, Perspective};

#[derive(Parser, Debug)]
#[command(name = "tennis-stats")]
#[command(version)]
#[command(about = "Causal surface win rates and win streaks from yearly tennis match files", long_about = None)]
struct Cli {
    /// JSON file with analysis settings. Flags override it.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the per-match feature dataset and write it as CSV
    Features {
        #[command(flatten)]
        input: InputArgs,

        /// Output CSV path
        #[arg(short, long, default_value = "surface_winrate_dataset.csv")]
        out: PathBuf,

        /// Which side(s) of each match become a row
        #[arg(long, value_enum)]
        perspective: Option<Perspective>,
    },
    /// Win rate per pre-match win streak, with bootstrap intervals
    Streaks {
        #[command(flatten)]
        input: InputArgs,

        /// Only report streaks seen at least this many times
        #[arg(long, default_value = "10")]
        min_matches: usize,
    },
    /// How well the emitted surface rates line up with results
    Calibration {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Label players Sprinter, Endurance or Balanced by win rate per match-length bin
    Archetypes {
        #[command(flatten)]
        input: InputArgs,

        /// Output CSV path
        #[arg(short, long, default_value = "player_archetypes.csv")]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Directory holding the yearly match CSVs
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// First year to load (inclusive)
    #[arg(long)]
    from: Option<u16>,

    /// Last year to load (inclusive)
    #[arg(long)]
    to: Option<u16>,

    /// Smoothing applied to surface win/loss counts. Defaults to the configured policy.
    #[arg(long, value_enum)]
    smoothing: Option<SmoothingMethod>,

    /// Matches needed before the threshold policy trusts the raw rate [threshold default: 15]
    #[arg(long)]
    min_samples: Option<u32>,

    /// Rate returned by the threshold policy below min-samples [threshold default: 0.5]
    #[arg(long)]
    neutral: Option<f64>,

    /// Pseudo-count for additive smoothing [additive default: 1.0]
    #[arg(long)]
    alpha: Option<f64>,
}

impl InputArgs {
    // Flags win over whatever the context already holds
    fn apply(&self, ctx: &mut AnalysisContext) -> Result<()> {
        if let Some(from) = self.from { ctx.year_start = from; }
        if let Some(to) = self.to { ctx.year_end = to; }

        let overrides = SmoothingOverrides {
            method: self.smoothing,
            min_samples: self.min_samples,
            neutral: self.neutral,
            alpha: self.alpha,
        };
        ctx.smoothing = overrides.apply(ctx.smoothing).map_err(|e| anyhow!("invalid smoothing flags: {e}"))?;
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut ctx = match &cli.config {
        Some(path) => AnalysisContext::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AnalysisContext::default(),
    };

    match cli.command {
        Command::Features { input, out, perspective } => {
            input.apply(&mut ctx)?;
            if let Some(perspective) = perspective { ctx.perspective = perspective; }

            let rows = build_rows(&input.data_dir, &ctx)?;
            write_features_file(&out, &rows).with_context(|| format!("writing {}", out.display()))?;
            println!("data size: {}", rows.len());
        }
        Command::Streaks { input, min_matches } => {
            input.apply(&mut ctx)?;
            ctx.perspective = Perspective::Both;

            let rows = build_rows(&input.data_dir, &ctx)?;
            let table = streak_win_rates(&rows, ctx.streak_eps);

            let mut rng = StdRng::seed_from_u64(ctx.seed);
            let intervals: Vec<_> = table
                .iter()
                .map(|bucket| {
                    if bucket.appearances < min_matches { return None; }
                    let outcomes = streak_outcomes(&rows, bucket.streak);
                    bootstrap_mean_ci(&outcomes, ctx.bootstrap_resamples, ctx.bootstrap_confidence, &mut rng)
                })
                .collect();

            output_streak_report(&table, &intervals, min_matches);
        }
        Command::Calibration { input } => {
            input.apply(&mut ctx)?;
            ctx.perspective = Perspective::Both;

            let rows = build_rows(&input.data_dir, &ctx)?;
            output_calibration_report(&rate_calibration(&rows, ctx.calibration_buckets));
        }
        Command::Archetypes { input, out } => {
            input.apply(&mut ctx)?;

            let events = build_events(&input.data_dir, &ctx)?;
            let players = assign_archetypes(&events, ctx.archetype);
            write_archetypes_file(&out, &players).with_context(|| format!("writing {}", out.display()))?;
            output_archetype_summary(&players);
        }
    }

    Ok(())
}

// Discover, load and order. Shared by every subcommand.
fn build_events(data_dir: &Path, ctx: &AnalysisContext) -> Result<Vec<MatchEvent>> {
    ctx.validate().context("invalid analysis settings")?;

    let paths = discover_match_files(data_dir, ctx)?;
    let (records, _summary) = load_match_records(&paths, ctx)?;
    Ok(build_event_stream(records))
}

fn build_rows(data_dir: &Path, ctx: &AnalysisContext) -> Result<Vec<DerivedFeatureRow>> {
    let events = build_events(data_dir, ctx)?;
    info!("smoothing: {:?}, perspective: {:?}", ctx.smoothing, ctx.perspective);
    Ok(extract_features(&events, ctx))
}
