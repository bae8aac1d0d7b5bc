mod db;
mod ingest;
mod keywords;
mod scheduler;
mod trend;

use clap::{Parser, Subcommand};
use snsdb_core::Platform;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "snsdb")]
#[command(about = "Creator discovery and follower-trend ingest for Instagram, TikTok and X")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one ingest pass
    Ingest {
        /// Restrict the run to these platforms (default: every platform in the keyword file)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
    },
    /// Inspect keyword pools and rotation state
    Keywords {
        #[command(subcommand)]
        command: keywords::KeywordsCommands,
    },
    /// Show the trend verdict for one stored account
    Trend {
        platform: Platform,
        handle: String,
    },
    /// Postgres maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Run ingest for every platform on the configured cron schedule
    Schedule,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = snsdb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Ingest { platforms }) => ingest::run_ingest(&config, &platforms).await?,
        Some(Commands::Keywords { command }) => keywords::run(&config, command)?,
        Some(Commands::Trend { platform, handle }) => {
            trend::run_trend(&config, platform, &handle).await?;
        }
        Some(Commands::Db { command }) => match command {
            DbCommands::Ping => db::run_ping(&config).await?,
            DbCommands::Migrate => db::run_migrate(&config).await?,
        },
        Some(Commands::Schedule) => scheduler::run_schedule(config).await?,
        None => println!("snsdb: no command given; see --help"),
    }

    Ok(())
}
