//! Cheap checks that decide whether an external scrape is worth paying for.

use chrono::{DateTime, TimeDelta, Utc};

/// Whether a keyword's cached candidate pool needs a fresh discovery call.
///
/// True when fewer than `min_count` candidates are stored, or when none of
/// them was discovered within the last `stale_days`. One fresh candidate is
/// enough to call the pool fresh; an empty pool is always stale.
#[must_use]
pub fn needs_discovery(
    last_discovered: &[Option<DateTime<Utc>>],
    stale_days: i64,
    min_count: usize,
    now: DateTime<Utc>,
) -> bool {
    if last_discovered.len() < min_count {
        return true;
    }
    let cutoff = cutoff(now, TimeDelta::try_days(stale_days));
    !last_discovered.iter().flatten().any(|ts| *ts >= cutoff)
}

/// Whether an account's posts are due for another scrape.
#[must_use]
pub fn needs_posts_refresh(
    last_scraped_at: Option<DateTime<Utc>>,
    refresh_hours: i64,
    now: DateTime<Utc>,
) -> bool {
    match last_scraped_at {
        None => true,
        Some(ts) => ts < cutoff(now, TimeDelta::try_hours(refresh_hours)),
    }
}

fn cutoff(now: DateTime<Utc>, window: Option<TimeDelta>) -> DateTime<Utc> {
    window
        .and_then(|w| now.checked_sub_signed(w))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
