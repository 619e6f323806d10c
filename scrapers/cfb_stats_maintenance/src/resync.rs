use anyhow::Result;
use std::collections::BTreeSet;
use std::time::Duration;
use tracing::{error, info};

use crate::confirm::Confirm;
use crate::drives_fetcher::{DriveSync, DriveSyncRequest};
use crate::types::{MissingGame, WeekKey};

pub const DEFAULT_DELAY: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, PartialEq)]
pub struct ResyncSettings {
    pub season: i32,
    pub delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    NothingMissing,
    Declined,
    Completed {
        synced: Vec<WeekKey>,
        failed: Vec<WeekKey>,
    },
}

/// Distinct weeks that contain at least one missing game, ascending by week
/// and then by season type name.
pub fn pending_weeks(games: &[MissingGame]) -> Vec<WeekKey> {
    games
        .iter()
        .map(|game| WeekKey {
            week: game.week,
            season_type: game.season_type.clone(),
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub struct ResyncOrchestrator<S, C> {
    syncer: S,
    confirm: C,
    settings: ResyncSettings,
}

impl<S: DriveSync, C: Confirm> ResyncOrchestrator<S, C> {
    pub fn new(syncer: S, confirm: C, settings: ResyncSettings) -> Self {
        Self {
            syncer,
            confirm,
            settings,
        }
    }

    /// Re-fetches every week that has missing games, one week at a time, after
    /// the operator agrees. A failed week is logged and the next one still runs.
    pub async fn run(&mut self, games: &[MissingGame]) -> Result<ResyncOutcome> {
        if games.is_empty() {
            info!("No missing games found!");
            return Ok(ResyncOutcome::NothingMissing);
        }

        let weeks = pending_weeks(games);
        info!("Need to re-sync {} weeks with missing games:", weeks.len());
        for key in &weeks {
            info!("  Week {} ({})", key.week, key.season_type);
        }

        let prompt = format!("\nRe-sync these {} weeks? (y/n): ", weeks.len());
        if !self.confirm.confirm(&prompt)? {
            info!("Cancelled by user");
            return Ok(ResyncOutcome::Declined);
        }

        let mut synced = Vec::new();
        let mut failed = Vec::new();

        for key in weeks {
            info!("{}", "=".repeat(50));
            info!("Re-syncing {} week {}", key.season_type, key.week);
            info!("{}", "=".repeat(50));

            let request = self.request_for(&key);
            match self.syncer.sync_drives(&request).await {
                Ok(report) => {
                    info!(
                        "Week {} ({}): {} requests, {} drives fetched, {} stored",
                        key.week, key.season_type, report.requests, report.fetched, report.stored
                    );
                    synced.push(key);
                }
                Err(e) => {
                    error!("Error syncing week {}: {:#}", key.week, e);
                    failed.push(key);
                }
            }
        }

        Ok(ResyncOutcome::Completed { synced, failed })
    }

    fn request_for(&self, key: &WeekKey) -> DriveSyncRequest {
        DriveSyncRequest {
            year: self.settings.season,
            season_types: vec![key.season_type.clone()],
            start_week: key.week,
            end_week: key.week,
            skip_existing: false,
            delay: self.settings.delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use crate::drives_fetcher::{CfbDrivesFetcher, DriveSyncReport};
    use crate::types::SeasonType;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSync {
        calls: Arc<Mutex<Vec<DriveSyncRequest>>>,
        fail_weeks: Vec<i32>,
    }

    #[async_trait]
    impl DriveSync for RecordingSync {
        async fn sync_drives(&self, request: &DriveSyncRequest) -> Result<DriveSyncReport> {
            self.calls.lock().unwrap().push(request.clone());
            if self.fail_weeks.contains(&request.start_week) {
                anyhow::bail!("API request failed with status: 500");
            }
            Ok(DriveSyncReport {
                requests: 1,
                fetched: 20,
                stored: 20,
                skipped: 0,
            })
        }
    }

    struct ScriptedConfirm {
        answer: bool,
        prompts: Vec<String>,
    }

    impl ScriptedConfirm {
        fn answering(answer: bool) -> Self {
            Self {
                answer,
                prompts: Vec::new(),
            }
        }
    }

    impl Confirm for ScriptedConfirm {
        fn confirm(&mut self, prompt: &str) -> Result<bool> {
            self.prompts.push(prompt.to_string());
            Ok(self.answer)
        }
    }

    fn game(game_id: i64, week: i32, season_type: SeasonType, home: &str) -> MissingGame {
        MissingGame {
            game_id,
            season: 2024,
            week,
            season_type,
            home_team: home.to_string(),
            away_team: "Visitors".to_string(),
            drive_count: 0,
        }
    }

    fn missing_games() -> Vec<MissingGame> {
        vec![
            game(1, 3, SeasonType::Regular, "Miami"),
            game(2, 3, SeasonType::Regular, "Texas"),
            game(3, 3, SeasonType::Postseason, "Alabama"),
            game(4, 5, SeasonType::Regular, "Georgia"),
            game(5, 5, SeasonType::Postseason, "Oregon"),
            game(6, 5, SeasonType::Postseason, "Penn State"),
        ]
    }

    fn settings() -> ResyncSettings {
        ResyncSettings {
            season: 2024,
            delay: DEFAULT_DELAY,
        }
    }

    #[test]
    fn test_pending_weeks_are_distinct_and_sorted() {
        let mut games = missing_games();
        games.reverse();

        assert_eq!(
            pending_weeks(&games),
            vec![
                WeekKey { week: 3, season_type: SeasonType::Postseason },
                WeekKey { week: 3, season_type: SeasonType::Regular },
                WeekKey { week: 5, season_type: SeasonType::Postseason },
                WeekKey { week: 5, season_type: SeasonType::Regular },
            ]
        );
    }

    #[tokio::test]
    async fn test_declining_makes_no_sync_calls() {
        let syncer = RecordingSync::default();
        let calls = syncer.calls.clone();
        let mut orchestrator =
            ResyncOrchestrator::new(syncer, ScriptedConfirm::answering(false), settings());

        let outcome = orchestrator.run(&missing_games()).await.unwrap();

        assert_eq!(outcome, ResyncOutcome::Declined);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            orchestrator.confirm.prompts,
            vec!["\nRe-sync these 4 weeks? (y/n): ".to_string()]
        );
    }

    #[tokio::test]
    async fn test_confirming_syncs_each_week_once_in_order() {
        let syncer = RecordingSync::default();
        let calls = syncer.calls.clone();
        let mut orchestrator =
            ResyncOrchestrator::new(syncer, ScriptedConfirm::answering(true), settings());

        let outcome = orchestrator.run(&missing_games()).await.unwrap();

        let requests = calls.lock().unwrap().clone();
        let seen: Vec<(i32, Vec<SeasonType>)> = requests
            .iter()
            .map(|r| (r.start_week, r.season_types.clone()))
            .collect();
        assert_eq!(
            seen,
            vec![
                (3, vec![SeasonType::Postseason]),
                (3, vec![SeasonType::Regular]),
                (5, vec![SeasonType::Postseason]),
                (5, vec![SeasonType::Regular]),
            ]
        );
        for request in &requests {
            assert_eq!(request.year, 2024);
            assert_eq!(request.start_week, request.end_week);
            assert!(!request.skip_existing);
            assert_eq!(request.delay, Duration::from_millis(1500));
        }

        match outcome {
            ResyncOutcome::Completed { synced, failed } => {
                assert_eq!(synced.len(), 4);
                assert!(failed.is_empty());
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_week_does_not_stop_the_rest() {
        let syncer = RecordingSync {
            fail_weeks: vec![3],
            ..Default::default()
        };
        let calls = syncer.calls.clone();
        let mut orchestrator =
            ResyncOrchestrator::new(syncer, ScriptedConfirm::answering(true), settings());

        let outcome = orchestrator.run(&missing_games()).await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 4);
        assert_eq!(
            outcome,
            ResyncOutcome::Completed {
                synced: vec![
                    WeekKey { week: 5, season_type: SeasonType::Postseason },
                    WeekKey { week: 5, season_type: SeasonType::Regular },
                ],
                failed: vec![
                    WeekKey { week: 3, season_type: SeasonType::Postseason },
                    WeekKey { week: 3, season_type: SeasonType::Regular },
                ],
            }
        );
    }

    #[tokio::test]
    async fn test_no_missing_games_skips_the_prompt() {
        let syncer = RecordingSync::default();
        let calls = syncer.calls.clone();
        let mut orchestrator =
            ResyncOrchestrator::new(syncer, ScriptedConfirm::answering(true), settings());

        let outcome = orchestrator.run(&[]).await.unwrap();

        assert_eq!(outcome, ResyncOutcome::NothingMissing);
        assert!(orchestrator.confirm.prompts.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    fn fetcher_without_api_key() -> CfbDrivesFetcher {
        // Never connects: no test below reaches the database.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/cfb_stats_unused")
            .unwrap();
        CfbDrivesFetcher::new(&ApiConfig::default(), pool).unwrap()
    }

    #[tokio::test]
    async fn test_declining_without_api_key_is_a_clean_abort() {
        let mut orchestrator = ResyncOrchestrator::new(
            fetcher_without_api_key(),
            ScriptedConfirm::answering(false),
            settings(),
        );

        let outcome = orchestrator.run(&missing_games()).await.unwrap();

        assert_eq!(outcome, ResyncOutcome::Declined);
        assert_eq!(orchestrator.confirm.prompts.len(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_missing_api_key_fails_each_week_after_confirmation() {
        let mut orchestrator = ResyncOrchestrator::new(
            fetcher_without_api_key(),
            ScriptedConfirm::answering(true),
            ResyncSettings {
                season: 2024,
                delay: Duration::ZERO,
            },
        );

        let outcome = orchestrator.run(&missing_games()).await.unwrap();

        assert_eq!(
            outcome,
            ResyncOutcome::Completed {
                synced: Vec::new(),
                failed: pending_weeks(&missing_games()),
            }
        );
    }
}
