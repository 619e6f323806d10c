use anyhow::Context;
use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use serde::{Deserialize, Deserializer};
use sqlx::PgPool;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::config::ApiConfig;
use crate::types::SeasonType;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("CFB_API_KEY must be set to fetch drives")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API request failed with status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Everything one fetch-and-sync call needs, passed explicitly per call.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveSyncRequest {
    pub year: i32,
    pub season_types: Vec<SeasonType>,
    pub start_week: i32,
    pub end_week: i32,
    /// When true, drives for games that already have drive rows are left alone.
    pub skip_existing: bool,
    /// Minimum spacing between consecutive API requests.
    pub delay: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DriveSyncReport {
    pub requests: usize,
    pub fetched: usize,
    pub stored: usize,
    pub skipped: usize,
}

#[async_trait]
pub trait DriveSync {
    async fn sync_drives(&self, request: &DriveSyncRequest) -> anyhow::Result<DriveSyncReport>;
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDrive {
    #[serde(deserialize_with = "number_or_string")]
    pub id: i64,
    #[serde(deserialize_with = "number_or_string")]
    pub game_id: i64,
    pub offense: String,
    pub defense: String,
    pub drive_number: Option<i32>,
    pub scoring: Option<bool>,
    pub start_period: Option<i32>,
    pub start_yardline: Option<i32>,
    pub end_period: Option<i32>,
    pub end_yardline: Option<i32>,
    pub plays: Option<i32>,
    pub yards: Option<i32>,
    pub drive_result: Option<String>,
    pub is_home_offense: Option<bool>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

// The API has served drive ids both as JSON numbers and as strings.
fn number_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(n) => Ok(n),
        NumberOrString::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// The API key is checked per request, so a client can be built before the
/// operator has confirmed anything.
pub struct DrivesApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl DrivesApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    pub async fn fetch_drives(
        &self,
        year: i32,
        week: i32,
        season_type: &SeasonType,
    ) -> Result<Vec<ApiDrive>, FetchError> {
        let api_key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let url = format!("{}/drives", self.base_url);
        debug!("Fetching {} week {} drives for {} from {}", season_type, week, year, url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .query(&[
                ("year", year.to_string()),
                ("week", week.to_string()),
                ("seasonType", season_type.as_str().to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        Ok(response.json().await?)
    }
}

/// Fetches drives from the College Football Data API and upserts them into `drives`.
pub struct CfbDrivesFetcher {
    client: DrivesApiClient,
    pool: PgPool,
    pacer: Mutex<Option<(Duration, Arc<DirectRateLimiter>)>>,
}

impl CfbDrivesFetcher {
    pub fn new(config: &ApiConfig, pool: PgPool) -> Result<Self, FetchError> {
        Ok(Self {
            client: DrivesApiClient::new(config)?,
            pool,
            pacer: Mutex::new(None),
        })
    }

    /// The limiter outlives a single sync call so spacing holds across weeks.
    fn limiter_for(&self, delay: Duration) -> Option<Arc<DirectRateLimiter>> {
        let quota = Quota::with_period(delay)?;
        let mut pacer = self.pacer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        match pacer.as_ref() {
            Some((current, limiter)) if *current == delay => Some(limiter.clone()),
            _ => {
                let limiter = Arc::new(RateLimiter::direct(quota));
                *pacer = Some((delay, limiter.clone()));
                Some(limiter)
            }
        }
    }

    async fn games_with_drives(
        &self,
        year: i32,
        week: i32,
        season_type: &SeasonType,
    ) -> Result<HashSet<i64>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT d.game_id::int8
            FROM drives d
            JOIN games g ON g.id = d.game_id
            WHERE g.season = $1 AND g.week = $2 AND g.season_type::text = $3
            "#,
        )
        .bind(year)
        .bind(week)
        .bind(season_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    async fn store_drives(&self, drives: &[ApiDrive]) -> Result<usize, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for drive in drives {
            sqlx::query(
                r#"
                INSERT INTO drives (
                    id, game_id, offense, defense, drive_number, scoring,
                    start_period, start_yardline, end_period, end_yardline,
                    plays, yards, drive_result, is_home_offense
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (id) DO UPDATE SET
                    game_id = EXCLUDED.game_id,
                    offense = EXCLUDED.offense,
                    defense = EXCLUDED.defense,
                    drive_number = EXCLUDED.drive_number,
                    scoring = EXCLUDED.scoring,
                    start_period = EXCLUDED.start_period,
                    start_yardline = EXCLUDED.start_yardline,
                    end_period = EXCLUDED.end_period,
                    end_yardline = EXCLUDED.end_yardline,
                    plays = EXCLUDED.plays,
                    yards = EXCLUDED.yards,
                    drive_result = EXCLUDED.drive_result,
                    is_home_offense = EXCLUDED.is_home_offense
                "#,
            )
            .bind(drive.id)
            .bind(drive.game_id)
            .bind(&drive.offense)
            .bind(&drive.defense)
            .bind(drive.drive_number)
            .bind(drive.scoring)
            .bind(drive.start_period)
            .bind(drive.start_yardline)
            .bind(drive.end_period)
            .bind(drive.end_yardline)
            .bind(drive.plays)
            .bind(drive.yards)
            .bind(&drive.drive_result)
            .bind(drive.is_home_offense)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(drives.len())
    }
}

#[async_trait]
impl DriveSync for CfbDrivesFetcher {
    async fn sync_drives(&self, request: &DriveSyncRequest) -> anyhow::Result<DriveSyncReport> {
        let limiter = self.limiter_for(request.delay);
        let mut report = DriveSyncReport::default();

        for season_type in &request.season_types {
            for week in request.start_week..=request.end_week {
                if let Some(limiter) = &limiter {
                    limiter.until_ready().await;
                }

                let drives = self
                    .client
                    .fetch_drives(request.year, week, season_type)
                    .await
                    .with_context(|| format!("Failed to fetch {} week {} drives", season_type, week))?;
                report.requests += 1;
                report.fetched += drives.len();

                let existing = if request.skip_existing {
                    self.games_with_drives(request.year, week, season_type)
                        .await
                        .context("Failed to load games that already have drives")?
                } else {
                    HashSet::new()
                };

                let (to_store, already_synced): (Vec<ApiDrive>, Vec<ApiDrive>) = drives
                    .into_iter()
                    .partition(|drive| !existing.contains(&drive.game_id));
                report.skipped += already_synced.len();

                if to_store.is_empty() {
                    warn!("No drives to store for {} week {}", season_type, week);
                    continue;
                }

                let stored = self
                    .store_drives(&to_store)
                    .await
                    .with_context(|| format!("Failed to store {} week {} drives", season_type, week))?;
                report.stored += stored;
                info!(
                    "Stored {} drives for {} {} week {} ({} skipped)",
                    stored,
                    request.year,
                    season_type,
                    week,
                    already_synced.len()
                );
            }
        }

        Ok(report)
    }
}
