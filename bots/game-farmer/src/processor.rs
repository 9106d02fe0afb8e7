//! One round for one account: login, farming, tasks, rewards, mini-games.

use crate::api::GameApi;
use crate::client::ActionClient;
use crate::config::{FarmerConfig, StartFailurePolicy};
use crate::models::{FarmingState, Task, TaskStatus};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use core_logic::{Account, AccountProcessor, ConfigError, ExcludedTaskSet, RoundOutcome};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Stages of a round, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStage {
    Authenticating,
    ProfileFetching,
    BalanceEvaluating,
    FarmingDeciding,
    TaskSweeping,
    DailyClaiming,
    ReferralClaiming,
    MiniGameLooping,
    Done,
}

impl fmt::Display for RoundStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoundStage::Authenticating => "authenticating",
            RoundStage::ProfileFetching => "profile",
            RoundStage::BalanceEvaluating => "balance",
            RoundStage::FarmingDeciding => "farming",
            RoundStage::TaskSweeping => "tasks",
            RoundStage::DailyClaiming => "daily reward",
            RoundStage::ReferralClaiming => "referral",
            RoundStage::MiniGameLooping => "mini-game",
            RoundStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FarmingDecision {
    /// No session is running.
    Start,
    /// The session has ended and its reward is waiting.
    ClaimAndRestart,
    /// The session is still running.
    Wait { remaining_ms: i64 },
}

/// Picks the farming action from the balance snapshot. A session ends
/// strictly after `end_time`.
pub fn decide_farming(farming: Option<&FarmingState>, now_ms: i64) -> FarmingDecision {
    match farming {
        None => FarmingDecision::Start,
        Some(state) if now_ms > state.end_time => FarmingDecision::ClaimAndRestart,
        Some(state) => FarmingDecision::Wait {
            remaining_ms: state.end_time - now_ms,
        },
    }
}

/// Renders a millisecond span as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_remaining(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Renders an epoch-millisecond instant as `dd/MM/yyyy HH:mm:ss` in `tz`.
pub fn format_end_time(end_ms: i64, tz: &Tz) -> String {
    match Utc.timestamp_millis_opt(end_ms).single() {
        Some(at) => at.with_timezone(tz).format("%d/%m/%Y %H:%M:%S").to_string(),
        None => end_ms.to_string(),
    }
}

async fn wait_secs(secs: u64) {
    if secs > 0 {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

pub struct FarmingProcessor {
    api: Arc<dyn GameApi>,
    config: Arc<FarmerConfig>,
    excluded: Arc<ExcludedTaskSet>,
    tz: Tz,
}

impl FarmingProcessor {
    pub fn new(
        api: Arc<dyn GameApi>,
        config: Arc<FarmerConfig>,
        excluded: Arc<ExcludedTaskSet>,
    ) -> Result<Self, ConfigError> {
        let tz = config.timezone()?;
        Ok(Self {
            api,
            config,
            excluded,
            tz,
        })
    }

    fn enter(&self, stage: RoundStage) {
        debug!("Stage: {}", stage);
    }

    async fn farm(&self, client: &mut ActionClient, farming: Option<&FarmingState>) {
        if let Some(state) = farming {
            info!(
                "Farming end time: {}",
                format_end_time(state.end_time, &self.tz)
            );
        }

        match decide_farming(farming, Utc::now().timestamp_millis()) {
            FarmingDecision::Start => {
                if client.start_farming().await {
                    info!("Start farming Success");
                }
            }
            FarmingDecision::ClaimAndRestart => {
                if client.claim_farming().await {
                    info!("Claim farming Success");
                }
                if client.start_farming().await {
                    info!("Start farming Success");
                }
            }
            FarmingDecision::Wait { remaining_ms } => {
                info!("Time left for farming: {}", format_remaining(remaining_ms));
            }
        }
    }

    async fn sweep_tasks(&self, client: &mut ActionClient) {
        let tasks = client.list_tasks().await;
        if tasks.is_empty() {
            warn!("No tasks available");
            return;
        }

        let total = tasks.len();
        let eligible: Vec<Task> = tasks
            .into_iter()
            .filter(|task| !self.excluded.contains(&task.id))
            .collect();
        let not_started = eligible
            .iter()
            .filter(|task| task.status == TaskStatus::NotStarted)
            .count();
        info!(
            "Tasks: {} total, {} excluded, {} not started",
            total,
            total - eligible.len(),
            not_started
        );

        for task in &eligible {
            match task.status {
                TaskStatus::NotStarted => {
                    info!("Starting task: {}", task.title);
                    let started = client.start_task(&task.id).await;
                    if !started && self.config.tasks.on_start_failure == StartFailurePolicy::SkipClaim
                    {
                        warn!("Task {} was not started, skipping claim", task.title);
                        continue;
                    }
                    wait_secs(self.config.tasks.claim_wait_secs).await;
                    self.claim_task(client, task).await;
                }
                TaskStatus::ReadyForClaim => self.claim_task(client, task).await,
                _ => {}
            }
        }
    }

    async fn claim_task(&self, client: &mut ActionClient, task: &Task) {
        match client.claim_task(&task.id).await {
            Some(TaskStatus::Finished) => info!("Task {} claim Success", task.title),
            Some(status) => warn!("Task {} not finished after claim: {:?}", task.title, status),
            None => warn!("Unable to claim reward for task: {}", task.title),
        }
    }

    async fn claim_referral(&self, client: &mut ActionClient) {
        let Some(balance) = client.fetch_referral_balance().await else {
            return;
        };
        if !balance.claimable() {
            info!("No referral balance to claim");
            return;
        }
        if client.claim_referral_balance().await {
            info!(
                "Referral claim Success ({:.2})",
                balance.amount_for_claim
            );
        }
    }

    async fn play_games(&self, client: &mut ActionClient, passes: u32) {
        if passes == 0 {
            info!("No game passes available");
            return;
        }
        let cfg = &self.config.mini_game;
        let max_attempts = cfg.max_attempts.max(1);

        for game in 1..=passes {
            let mut attempt = 0;
            loop {
                attempt += 1;
                if client.play_game().await {
                    info!("Playing game {}/{}", game, passes);
                    wait_secs(cfg.game_duration_secs).await;
                    let points = cfg.reward.draw();
                    if client.claim_game(points).await {
                        info!("Game {} claim Success ({} points)", game, points);
                    }
                    break;
                }
                if attempt >= max_attempts {
                    error!(
                        "Game {} FAILED after {} attempts, moving on",
                        game, max_attempts
                    );
                    break;
                }
                warn!(
                    "Unable to play game {} (attempt {}/{}), retrying",
                    game, attempt, max_attempts
                );
                wait_secs(cfg.retry_wait_secs).await;
            }
        }
    }
}

#[async_trait]
impl AccountProcessor for FarmingProcessor {
    async fn process(&self, account: &Account) -> Result<RoundOutcome> {
        let mut client = ActionClient::new(
            self.api.clone(),
            account.clone(),
            self.config.action_delay,
            self.config.auth,
        );

        self.enter(RoundStage::Authenticating);
        if let Err(e) = client.authenticate().await {
            error!("Login FAILED: {}", e);
            return Ok(RoundOutcome::Skipped {
                reason: e.to_string(),
            });
        }

        self.enter(RoundStage::ProfileFetching);
        let profile = match client.fetch_profile().await {
            Ok(profile) => profile,
            Err(e) => {
                error!("Profile FAILED: {}", e);
                return Ok(RoundOutcome::Skipped {
                    reason: e.to_string(),
                });
            }
        };
        info!("Login Success | {}", profile.username);

        self.enter(RoundStage::BalanceEvaluating);
        let balance = client.fetch_balance().await;
        let farming = balance.as_ref().and_then(|b| b.farming);

        match &balance {
            Some(b) => {
                info!(
                    "Balance: {:.2} | Game passes: {}",
                    b.available_balance, b.play_passes
                );
                self.enter(RoundStage::FarmingDeciding);
                self.farm(&mut client, farming.as_ref()).await;
            }
            None => warn!("Balance unavailable, skipping farming and mini-games"),
        }

        if self.config.tasks.enabled {
            self.enter(RoundStage::TaskSweeping);
            self.sweep_tasks(&mut client).await;
        }

        if self.config.daily_reward.enabled {
            self.enter(RoundStage::DailyClaiming);
            if client.claim_daily_reward().await {
                info!("Daily reward Success");
            }
        }

        if self.config.referral.enabled {
            self.enter(RoundStage::ReferralClaiming);
            self.claim_referral(&mut client).await;
        }

        if let (true, Some(b)) = (self.config.mini_game.enabled, &balance) {
            self.enter(RoundStage::MiniGameLooping);
            self.play_games(&mut client, b.play_passes).await;
        }

        self.enter(RoundStage::Done);
        info!(
            "Round finished for {}",
            client.session().username.as_deref().unwrap_or_default()
        );

        Ok(RoundOutcome::Completed {
            farming_end: farming.and_then(|f| Utc.timestamp_millis_opt(f.end_time).single()),
        })
    }
}
