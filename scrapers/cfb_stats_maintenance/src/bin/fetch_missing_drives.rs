use anyhow::{Context, Result};
use cfb_stats_maintenance::{
    config::MaintenanceConfig,
    confirm::{AssumeYes, Confirm, PromptConfirm},
    drives_fetcher::CfbDrivesFetcher,
    missing_drives::{log_report, MissingDrivesFinder},
    resync::{ResyncOrchestrator, ResyncOutcome, ResyncSettings},
};
use clap::Parser;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Find games without drives and re-sync their weeks", long_about = None)]
struct Args {
    /// Season to check
    #[arg(short, long, default_value_t = 2024)]
    season: i32,

    /// Seconds between API requests
    #[arg(long, default_value_t = 1.5)]
    delay_secs: f64,

    /// Re-sync without asking
    #[arg(short, long)]
    yes: bool,
}

async fn run(pool: &PgPool, config: &MaintenanceConfig, args: &Args) -> Result<()> {
    info!("Finding missing games...");

    let finder = MissingDrivesFinder::new(pool.clone());
    let missing = finder
        .find(args.season)
        .await
        .context("Failed to query games missing drives")?;
    log_report(&missing);

    if missing.is_empty() {
        info!("No missing games found! Your drives data appears complete.");
        return Ok(());
    }

    info!("Summary:");
    info!("Total games missing drives: {}", missing.len());
    info!("Examples of missing games:");
    for game in missing.iter().take(10) {
        info!("  {} @ {} (Week {})", game.away_team, game.home_team, game.week);
    }

    if config.api.api_key.is_none() {
        warn!("CFB_API_KEY is not set, re-synced weeks will fail");
    }
    let fetcher = CfbDrivesFetcher::new(&config.api, pool.clone())?;
    let settings = ResyncSettings {
        season: args.season,
        delay: Duration::try_from_secs_f64(args.delay_secs)
            .with_context(|| format!("Invalid delay: {}", args.delay_secs))?,
    };
    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(PromptConfirm::stdio())
    };

    let mut orchestrator = ResyncOrchestrator::new(fetcher, confirm, settings);
    match orchestrator.run(&missing).await? {
        ResyncOutcome::Completed { synced, failed } => {
            info!("Re-synced {} weeks, {} failed", synced.len(), failed.len());
            for key in failed {
                error!("  Week {} ({}) still needs attention", key.week, key.season_type);
            }
        }
        ResyncOutcome::Declined | ResyncOutcome::NothingMissing => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    cfb_stats_maintenance::init_tracing();

    let args = Args::parse();
    let config = MaintenanceConfig::from_env()?;

    let pool = config
        .database
        .connect()
        .await
        .context("Failed to connect to database")?;

    let result = run(&pool, &config, &args).await;
    if let Err(e) = &result {
        error!("Error: {:#}", e);
    }

    pool.close().await;
    result
}
