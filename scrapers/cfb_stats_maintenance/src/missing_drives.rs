use sqlx::PgPool;
use tracing::info;

use crate::types::{MissingGame, SeasonType};

/// Number of games listed individually by `log_report`.
pub const REPORT_LIMIT: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum FinderError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, sqlx::FromRow)]
struct MissingGameRow {
    game_id: i64,
    season: i32,
    week: i32,
    season_type: String,
    home_team: String,
    away_team: String,
    drive_count: i64,
}

impl From<MissingGameRow> for MissingGame {
    fn from(row: MissingGameRow) -> Self {
        MissingGame {
            game_id: row.game_id,
            season: row.season,
            week: row.week,
            season_type: SeasonType::from(row.season_type),
            home_team: row.home_team,
            away_team: row.away_team,
            drive_count: row.drive_count,
        }
    }
}

pub struct MissingDrivesFinder {
    pool: PgPool,
}

impl MissingDrivesFinder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Every game in `season` that no row in `drives` references, ordered by
    /// week then home team.
    pub async fn find(&self, season: i32) -> Result<Vec<MissingGame>, FinderError> {
        let rows = sqlx::query_as::<_, MissingGameRow>(
            r#"
            SELECT
                g.id::int8 AS game_id,
                g.season::int4 AS season,
                g.week::int4 AS week,
                g.season_type::text AS season_type,
                g.home_team::text AS home_team,
                g.away_team::text AS away_team,
                COUNT(d.id) AS drive_count
            FROM games g
            LEFT JOIN drives d ON g.id = d.game_id
            WHERE g.season = $1
            GROUP BY g.id, g.season, g.week, g.season_type, g.home_team, g.away_team
            HAVING COUNT(d.id) = 0
            ORDER BY g.week, g.home_team
            "#,
        )
        .bind(season)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(MissingGame::from).collect())
    }
}

pub fn log_report(games: &[MissingGame]) {
    info!("Found {} games missing drives data:", games.len());

    for game in games.iter().take(REPORT_LIMIT) {
        info!(
            "  Week {}: {} @ {} (Game ID: {})",
            game.week, game.away_team, game.home_team, game.game_id
        );
    }

    if games.len() > REPORT_LIMIT {
        info!("  ... and {} more games", games.len() - REPORT_LIMIT);
    }
}
