//! `trend <platform> <handle>`: evaluate a stored account's follower history.

use anyhow::Context;
use snsdb_core::{AppConfig, Platform};
use snsdb_signals::evaluate_trend;

use crate::ingest::build_store;

pub(crate) async fn run_trend(
    config: &AppConfig,
    platform: Platform,
    handle: &str,
) -> anyhow::Result<()> {
    let handle = handle.trim().trim_start_matches('@');
    let store = build_store(config).await?;
    let account = snsdb_db::find_account(&store, platform, handle, handle)
        .await?
        .with_context(|| format!("no stored {platform} account '{handle}'"))?;

    let settings = &config.trend;
    let series =
        snsdb_db::recent_follower_series(&store, account.id, settings.window_days + 1).await?;
    let verdict = evaluate_trend(&series, settings);

    println!("{platform} @{} (id {})", account.account_name, account.id);
    for point in &series {
        println!("  {}  {}", point.date, point.followers);
    }
    println!("{verdict}");
    Ok(())
}
