//! Follower-growth trend rule.
//!
//! A monotonic-streak-plus-threshold test over daily follower snapshots,
//! ordered most recent first.

use std::fmt;

use snsdb_core::{FollowerPoint, TrendSettings};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrendVerdict {
    Empty,
    /// Already past the high-follower threshold.
    HighFollowers { followers: i64 },
    InsufficientHistory { points: usize, needed: usize },
    /// At least one day in the window did not grow.
    Stalled { delta: i64 },
    DailyGrowth { delta: i64, pct: f64 },
    AverageGrowth { average: f64, pct: f64 },
    BelowThreshold { delta: i64, average: f64 },
}

impl TrendVerdict {
    #[must_use]
    pub fn is_trending(&self) -> bool {
        matches!(
            self,
            TrendVerdict::HighFollowers { .. }
                | TrendVerdict::DailyGrowth { .. }
                | TrendVerdict::AverageGrowth { .. }
        )
    }
}

impl fmt::Display for TrendVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendVerdict::Empty => f.write_str("no follower history"),
            TrendVerdict::HighFollowers { followers } => {
                write!(f, "trending: {followers} followers")
            }
            TrendVerdict::InsufficientHistory { points, needed } => {
                write!(f, "insufficient history: {points} of {needed} days")
            }
            TrendVerdict::Stalled { delta } => write!(f, "growth stalled (delta {delta})"),
            TrendVerdict::DailyGrowth { delta, pct } => {
                write!(f, "trending: +{delta} followers ({pct:.2}%) on the latest day")
            }
            TrendVerdict::AverageGrowth { average, pct } => {
                write!(f, "trending: +{average:.1} followers/day ({pct:.2}%) on average")
            }
            TrendVerdict::BelowThreshold { delta, average } => write!(
                f,
                "growing too slowly (latest +{delta}, average +{average:.1})"
            ),
        }
    }
}

/// Evaluate `series` (most recent first) and explain the outcome.
///
/// Only the first `window_days + 1` points are read. Percentages, for both
/// the latest and the average delta, are relative to the second point. A
/// zero-day window never reports growth.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn evaluate_trend(series: &[FollowerPoint], settings: &TrendSettings) -> TrendVerdict {
    let Some(latest) = series.first() else {
        return TrendVerdict::Empty;
    };

    if latest.followers >= settings.high_followers_threshold {
        return TrendVerdict::HighFollowers {
            followers: latest.followers,
        };
    }

    let window = settings.window_days;
    let needed = window + 1;
    if window == 0 || series.len() < needed {
        return TrendVerdict::InsufficientHistory {
            points: series.len(),
            needed,
        };
    }

    let deltas: Vec<i64> = series[..needed]
        .windows(2)
        .map(|pair| pair[0].followers - pair[1].followers)
        .collect();

    if let Some(&delta) = deltas.iter().find(|d| **d <= 0) {
        return TrendVerdict::Stalled { delta };
    }

    let prior = series[1].followers;
    let pct_of_prior = |value: f64| {
        if prior == 0 {
            0.0
        } else {
            value * 100.0 / prior as f64
        }
    };

    let delta = deltas[0];
    let pct = pct_of_prior(delta as f64);
    if delta >= settings.min_daily_growth_abs || pct >= settings.min_daily_growth_pct {
        return TrendVerdict::DailyGrowth { delta, pct };
    }

    let average = deltas.iter().sum::<i64>() as f64 / deltas.len() as f64;
    let avg_pct = pct_of_prior(average);
    if average >= settings.min_daily_growth_abs as f64 || avg_pct >= settings.min_daily_growth_pct
    {
        return TrendVerdict::AverageGrowth {
            average,
            pct: avg_pct,
        };
    }

    TrendVerdict::BelowThreshold { delta, average }
}

#[must_use]
pub fn is_trending(series: &[FollowerPoint], settings: &TrendSettings) -> bool {
    evaluate_trend(series, settings).is_trending()
}

#[cfg(test)]
#[path = "trend_test.rs"]
mod tests;
