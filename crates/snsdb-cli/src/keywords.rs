//! `keywords status`: what each platform's pool holds and what the
//! rotation will pick from next.

use clap::Subcommand;
use snsdb_core::{AppConfig, Platform};
use snsdb_signals::{FileCycleState, KeywordRotation};

#[derive(Debug, Subcommand)]
pub(crate) enum KeywordsCommands {
    /// Print pool sizes and the keywords left in the current cycle
    Status {
        #[arg(long)]
        platform: Option<Platform>,
    },
}

pub(crate) fn run(config: &AppConfig, command: KeywordsCommands) -> anyhow::Result<()> {
    match command {
        KeywordsCommands::Status { platform } => status(config, platform),
    }
}

fn status(config: &AppConfig, only: Option<Platform>) -> anyhow::Result<()> {
    let pools = snsdb_core::load_keyword_pools(&config.keywords_path)?;
    let platforms = match only {
        Some(platform) => vec![platform],
        None => pools.platforms(),
    };

    for platform in platforms {
        let Some(pool) = pools.pool(platform) else {
            println!("{platform}: no keyword pool configured");
            continue;
        };
        let rotation = KeywordRotation::new(FileCycleState::for_platform(
            &config.cycle_state_dir,
            platform,
        ));
        let pending = rotation.pending(&pool.keywords);
        println!(
            "{platform}: {} keywords, {} per run, {} left in cycle",
            pool.keywords.len(),
            pool.per_run(config.keywords_per_run),
            pending.len()
        );
        if !pending.is_empty() {
            println!("  next: {}", pending.join(", "));
        }
    }
    Ok(())
}
