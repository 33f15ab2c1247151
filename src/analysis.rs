use rand::Rng;

use crate::extractor::DerivedFeatureRow;

#[derive(Debug, Clone, PartialEq)]
pub struct StreakBucket {
    pub streak: u32,
    pub appearances: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: Option<f64>,
    pub win_loss_ratio: f64,    // wins / (eps + losses), so a streak nobody ever lost at still gets a number
}

// Win rate per pre-match streak length, counted from each row's player side.
// Feed it rows from both perspectives, otherwise only winners (or only losers) get counted.
pub fn streak_win_rates(rows: &[DerivedFeatureRow], eps: f64) -> Vec<StreakBucket> {
    let Some(max_streak) = rows.iter().map(|r| r.player_streak).max() else {
        return Vec::new();
    };

    let mut wins = vec![0usize; max_streak as usize + 1];
    let mut losses = vec![0usize; max_streak as usize + 1];
    for row in rows {
        let idx = row.player_streak as usize;
        if row.won { wins[idx] += 1 } else { losses[idx] += 1 }
    }

    (0..=max_streak)
        .map(|streak| {
            let (w, l) = (wins[streak as usize], losses[streak as usize]);
            let appearances = w + l;
            StreakBucket {
                streak,
                appearances,
                wins: w,
                losses: l,
                win_rate: (appearances > 0).then(|| w as f64 / appearances as f64),
                win_loss_ratio: w as f64 / (eps + l as f64),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
    pub mean_rate: f64,
    pub observed: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub buckets: Vec<CalibrationBucket>,
    pub weighted_error: f64,
}

// How well the emitted surface rate predicts the result. Rates are bucketed into `bucket_count` equal slices of [0, 1];
// the error is |mean rate - observed win fraction| per bucket, weighted by bucket size. Empty buckets are left out.
pub fn rate_calibration(rows: &[DerivedFeatureRow], bucket_count: usize) -> Calibration {
    let bucket_count = bucket_count.max(1);
    let mut rate_sum = vec![0.0; bucket_count];
    let mut win_sum = vec![0.0; bucket_count];
    let mut counts = vec![0usize; bucket_count];

    for row in rows {
        let idx = ((row.player_category_rate * bucket_count as f64).floor() as usize).min(bucket_count - 1);
        rate_sum[idx] += row.player_category_rate;
        win_sum[idx] += if row.won { 1.0 } else { 0.0 };
        counts[idx] += 1;
    }

    let mut buckets = Vec::new();
    let mut error = 0.0;
    for i in 0..bucket_count {
        if counts[i] == 0 { continue; }

        let n = counts[i] as f64;
        let bucket = CalibrationBucket {
            lower: i as f64 / bucket_count as f64,
            upper: (i + 1) as f64 / bucket_count as f64,
            count: counts[i],
            mean_rate: rate_sum[i] / n,
            observed: win_sum[i] / n,
        };
        error += (bucket.mean_rate - bucket.observed).abs() * n;
        buckets.push(bucket);
    }

    let weighted_error = if rows.is_empty() { 0.0 } else { error / rows.len() as f64 };
    Calibration { buckets, weighted_error }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// Percentile bootstrap for the mean. Deterministic for a given rng state.
pub fn bootstrap_mean_ci<R: Rng>(values: &[f64], resamples: usize, confidence: f64, rng: &mut R) -> Option<ConfidenceInterval> {
    let point = mean(values)?;
    if resamples == 0 {
        return None;
    }

    let n = values.len();
    let mut means: Vec<f64> = (0..resamples)
        .map(|_| (0..n).map(|_| values[rng.random_range(0..n)]).sum::<f64>() / n as f64)
        .collect();
    means.sort_by(f64::total_cmp);

    let tail = (1.0 - confidence) / 2.0;
    let lower_idx = ((tail * resamples as f64).floor() as usize).min(resamples - 1);
    let upper_idx = (((1.0 - tail) * resamples as f64).ceil() as usize).saturating_sub(1).min(resamples - 1);

    Some(ConfidenceInterval {
        mean: point,
        lower: means[lower_idx],
        upper: means[upper_idx],
    })
}

// Win/loss outcomes of the rows in a streak bucket, as 0/1 values for the bootstrap
pub fn streak_outcomes(rows: &[DerivedFeatureRow], streak: u32) -> Vec<f64> {
    rows.iter()
        .filter(|r| r.player_streak == streak)
        .map(|r| if r.won { 1.0 } else { 0.0 })
        .collect()
}
