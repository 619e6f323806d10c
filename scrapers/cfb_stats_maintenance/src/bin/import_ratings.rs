use anyhow::{Context, Result};
use cfb_stats_maintenance::{
    config::MaintenanceConfig,
    ratings_importer::RatingsImporter,
};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Upsert season power ratings from a CSV file", long_about = None)]
struct Args {
    /// Ratings CSV with a header row: team, overall[, offense[, defense]]
    #[arg(short, long, default_value = "2024FinalRankings.csv")]
    file: PathBuf,

    /// Season the ratings belong to
    #[arg(short, long, default_value_t = 2024)]
    season: i32,

    /// Team to show across all seasons once the import finishes
    #[arg(long, default_value = "ohio state")]
    watch_team: String,
}

async fn log_season_counts(importer: &RatingsImporter, label: &str) -> Result<()> {
    let counts = importer.season_counts().await?;
    info!("{} data:", label);
    for row in counts {
        match row.season {
            Some(season) => info!("  Season {}: {} teams", season, row.teams),
            None => info!("  No season: {} teams", row.teams),
        }
    }
    Ok(())
}

async fn run(importer: &RatingsImporter, args: &Args) -> Result<()> {
    info!("Importing {} ratings from {:?}", args.season, args.file);
    info!("{}", "=".repeat(40));

    log_season_counts(importer, "Current").await?;

    let summary = importer
        .import_file(&args.file, args.season)
        .await
        .with_context(|| format!("Failed to import {:?}", args.file))?;

    info!(
        "Upserted {} of {} teams ({} lines skipped, {} failed)",
        summary.upserted,
        summary.attempted,
        summary.skipped_lines,
        summary.failed.len()
    );
    for (team, reason) in &summary.failed {
        warn!("  {}: {}", team, reason);
    }

    log_season_counts(importer, "Final").await?;

    info!("Top 10 teams from {}:", args.season);
    for team in importer.top_teams(args.season, 10).await? {
        info!(
            "  {}: {:?} (O: {:?}, D: {:?})",
            team.team_name, team.power_rating, team.offense_rating, team.defense_rating
        );
    }

    info!("{} data:", args.watch_team);
    for team in importer.teams_matching(&args.watch_team).await? {
        info!("  {:?}: {} {:?}", team.season, team.team_name, team.power_rating);
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
    let importer = RatingsImporter::new(pool.clone());

    let result = run(&importer, &args).await;
    if let Err(e) = &result {
        error!("Error: {:#}", e);
    }

    pool.close().await;
    result
}
