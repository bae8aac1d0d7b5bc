//! The `ingest` command: wire collaborators from config and run the
//! coordinator for each requested platform.

mod coordinator;
mod discovery;
mod persist;
mod search;

use coordinator::Coordinator;

use anyhow::Context;
use snsdb_core::{AppConfig, KeywordPoolsFile, Platform, StoreBackend, SystemClock};
use snsdb_db::{AnyImageStore, AnyStore, NoopImageStore, PgStore, RestStore, SupabaseStorage};
use snsdb_scraper::ApifyClient;
use snsdb_signals::{FileCycleState, KeywordRotation};

/// Open the configured store backend.
///
/// # Errors
///
/// Returns an error if required connection settings are missing or the
/// connection cannot be established.
pub(crate) async fn build_store(config: &AppConfig) -> anyhow::Result<AnyStore> {
    match config.store_backend {
        StoreBackend::Rest => {
            let (url, key) = supabase_credentials(config)?;
            Ok(AnyStore::Rest(RestStore::new(
                url,
                key,
                config.store_timeout_secs,
            )?))
        }
        StoreBackend::Postgres => {
            let pool = crate::db::connect(config).await?;
            Ok(AnyStore::Postgres(PgStore::new(pool)))
        }
    }
}

fn supabase_credentials(config: &AppConfig) -> anyhow::Result<(&str, &str)> {
    let url = config
        .supabase_url
        .as_deref()
        .context("SUPABASE_URL is required for the rest store backend")?;
    let key = config
        .supabase_service_role_key
        .as_deref()
        .context("SUPABASE_SERVICE_ROLE_KEY is required for the rest store backend")?;
    Ok((url, key))
}

/// Supabase storage when credentials are present, otherwise a store that
/// never copies (avatars fall back to the configured defaults).
pub(crate) fn build_image_store(config: &AppConfig) -> anyhow::Result<AnyImageStore> {
    match (&config.supabase_url, &config.supabase_service_role_key) {
        (Some(url), Some(key)) => Ok(AnyImageStore::Supabase(SupabaseStorage::new(
            url,
            key,
            &config.profile_image_bucket,
            config.image_timeout_secs,
        )?)),
        _ => {
            tracing::warn!("Supabase credentials not set; profile images will not be copied");
            Ok(AnyImageStore::Noop(NoopImageStore))
        }
    }
}

/// Platforms to run: the requested ones, or every platform with a pool.
fn select_platforms(pools: &KeywordPoolsFile, requested: &[Platform]) -> anyhow::Result<Vec<Platform>> {
    if requested.is_empty() {
        return Ok(pools.platforms());
    }
    let mut selected = Vec::with_capacity(requested.len());
    for platform in requested {
        if pools.pool(*platform).is_none() {
            anyhow::bail!("no keyword pool configured for {platform}");
        }
        if !selected.contains(platform) {
            selected.push(*platform);
        }
    }
    Ok(selected)
}

/// Run one ingest pass over `requested` platforms (all configured ones when
/// empty), sequentially.
///
/// # Errors
///
/// Returns an error when configuration is unusable, a keyword pool is empty,
/// or every keyword of every platform failed.
pub(crate) async fn run_ingest(config: &AppConfig, requested: &[Platform]) -> anyhow::Result<()> {
    let pools = snsdb_core::load_keyword_pools(&config.keywords_path)?;
    let platforms = select_platforms(&pools, requested)?;

    let store = build_store(config).await?;
    let images = build_image_store(config)?;
    let token = config.require_apify_token()?;
    let scraper = ApifyClient::new(token, config.scraper.clone())
        .context("failed to build Apify client")?;
    let columns = snsdb_db::TableColumns::discover(&store).await;
    let clock = SystemClock;

    let coordinator = Coordinator {
        store: &store,
        scraper: &scraper,
        images: &images,
        clock: &clock,
        columns: &columns,
        config,
    };

    let mut reports = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let Some(pool) = pools.pool(platform) else {
            continue;
        };
        let rotation = KeywordRotation::new(FileCycleState::for_platform(
            &config.cycle_state_dir,
            platform,
        ));
        let report = coordinator
            .run(platform, pool, &rotation)
            .await
            .with_context(|| format!("cannot start {platform} ingest"))?;
        println!("{report}");
        reports.push(report);
    }

    let attempted: usize = reports.iter().map(|r| r.keywords).sum();
    let failed: usize = reports.iter().map(|r| r.failed_keywords).sum();
    if attempted > 0 && failed == attempted {
        anyhow::bail!("all {failed} keywords failed");
    }
    Ok(())
}
