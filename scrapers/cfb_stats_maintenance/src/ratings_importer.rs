use indicatif::{ProgressBar, ProgressStyle};
use sqlx::{Acquire, PgConnection, PgPool, Postgres, Transaction};
use std::path::Path;
use tracing::{debug, error, info};

use crate::parse_csv::{parse_ratings_file, CsvParseError};
use crate::types::{RatedTeam, RatingRecord, SeasonCount};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("CSV parse error: {0}")]
    CsvParse(#[from] CsvParseError),
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportSummary {
    pub attempted: usize,
    pub upserted: usize,
    pub skipped_lines: usize,
    pub failed: Vec<(String, String)>,
}

const UPSERT_RATING: &str = r#"
    INSERT INTO team_power_ratings
        (team_name, power_rating, offense_rating, defense_rating, strength_of_schedule, season)
    VALUES ($1, $2, $3, $4, $5, $6)
    ON CONFLICT (team_name, season)
    DO UPDATE SET
        power_rating = EXCLUDED.power_rating,
        offense_rating = EXCLUDED.offense_rating,
        defense_rating = EXCLUDED.defense_rating,
        strength_of_schedule = EXCLUDED.strength_of_schedule
"#;

pub struct RatingsImporter {
    pool: PgPool,
}

impl RatingsImporter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Parses `path` and upserts every valid line for `season`.
    pub async fn import_file(&self, path: &Path, season: i32) -> Result<ImportSummary, ImportError> {
        let parsed = parse_ratings_file(path, season)?;
        info!(
            "Loaded {} teams from {:?} ({} lines skipped)",
            parsed.records.len(),
            path,
            parsed.skipped.len()
        );

        let mut summary = self.import(&parsed.records).await?;
        summary.skipped_lines = parsed.skipped.len();
        Ok(summary)
    }

    /// Upserts all records in a single transaction.
    ///
    /// A row that fails is rolled back to its own savepoint and recorded in
    /// `ImportSummary::failed`; the rest of the batch still commits. Any other
    /// database error rolls back everything.
    pub async fn import(&self, records: &[RatingRecord]) -> Result<ImportSummary, ImportError> {
        let mut tx = self.pool.begin().await?;

        match upsert_batch(&mut tx, records).await {
            Ok(summary) => {
                tx.commit().await?;
                info!(
                    "Successfully processed {} of {} teams ({} failed)",
                    summary.upserted,
                    summary.attempted,
                    summary.failed.len()
                );
                Ok(summary)
            }
            Err(e) => {
                error!("Import failed, rolling back: {}", e);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }

    pub async fn season_counts(&self) -> Result<Vec<SeasonCount>, ImportError> {
        let counts = sqlx::query_as::<_, SeasonCount>(
            r#"
            SELECT season::int4 AS season, COUNT(*) AS teams
            FROM team_power_ratings
            GROUP BY season
            ORDER BY season
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    pub async fn top_teams(&self, season: i32, limit: i64) -> Result<Vec<RatedTeam>, ImportError> {
        let teams = sqlx::query_as::<_, RatedTeam>(
            r#"
            SELECT team_name,
                   season::int4 AS season,
                   power_rating::float8 AS power_rating,
                   offense_rating::float8 AS offense_rating,
                   defense_rating::float8 AS defense_rating
            FROM team_power_ratings
            WHERE season = $1
            ORDER BY power_rating DESC NULLS LAST
            LIMIT $2
            "#,
        )
        .bind(season)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }

    /// Case-insensitive lookup where each gap between words matches anything,
    /// so "ohio state" finds "Ohio State" and "Ohio St. State".
    pub async fn teams_matching(&self, name: &str) -> Result<Vec<RatedTeam>, ImportError> {
        let teams = sqlx::query_as::<_, RatedTeam>(
            r#"
            SELECT team_name,
                   season::int4 AS season,
                   power_rating::float8 AS power_rating,
                   offense_rating::float8 AS offense_rating,
                   defense_rating::float8 AS defense_rating
            FROM team_power_ratings
            WHERE LOWER(team_name) LIKE $1
            ORDER BY season
            "#,
        )
        .bind(like_pattern(name))
        .fetch_all(&self.pool)
        .await?;

        Ok(teams)
    }
}

async fn upsert_batch(
    tx: &mut Transaction<'_, Postgres>,
    records: &[RatingRecord],
) -> Result<ImportSummary, ImportError> {
    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} teams ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut summary = ImportSummary {
        attempted: records.len(),
        ..Default::default()
    };

    for record in records {
        let mut savepoint = Acquire::begin(&mut *tx).await?;

        match upsert_rating(&mut savepoint, record).await {
            Ok(()) => {
                savepoint.commit().await?;
                summary.upserted += 1;
                debug!("Upserted {} ({})", record.team_name, record.season);
            }
            Err(e) => {
                savepoint.rollback().await?;
                error!("Error with {}: {}", record.team_name, e);
                summary.failed.push((record.team_name.clone(), e.to_string()));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(summary)
}

async fn upsert_rating(conn: &mut PgConnection, record: &RatingRecord) -> Result<(), sqlx::Error> {
    sqlx::query(UPSERT_RATING)
        .bind(&record.team_name)
        .bind(record.power_rating)
        .bind(record.offense_rating)
        .bind(record.defense_rating)
        .bind(record.strength_of_schedule)
        .bind(record.season)
        .execute(conn)
        .await?;

    Ok(())
}

fn like_pattern(name: &str) -> String {
    let words: Vec<String> = name
        .split_whitespace()
        .map(|word| word.to_lowercase())
        .collect();
    format!("%{}%", words.join("%"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern("Ohio State"), "%ohio%state%");
        assert_eq!(like_pattern("  texas  "), "%texas%");
        assert_eq!(like_pattern(""), "%%");
    }
}
