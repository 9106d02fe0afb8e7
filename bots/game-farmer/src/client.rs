use crate::api::{ActionOutcome, GameApi};
use crate::models::{flatten_sections, BalanceInfo, Profile, ReferralBalance, Task, TaskStatus};
use anyhow::anyhow;
use core_logic::{pause, with_retry, Account, AccountError, DelayRange, RetryPolicy};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, warn};

/// What a call does once an invalid-token answer has been followed by a
/// successful login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterRefresh {
    /// Send the same request again with the new token.
    Resend,
    /// Keep the new token for later calls but count this call as failed.
    Drop,
}

/// Per-account state for one round.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub token: String,
    pub username: Option<String>,
    /// Id returned by the last successful play, consumed by the claim.
    pub current_game_id: Option<String>,
}

/// Wraps a [`GameApi`] with pacing, session state and token refresh.
///
/// Every remote call is preceded by a random pause drawn from the pacing
/// window. A call answered with an invalid-token signal triggers one login.
/// Reads are then sent once more. Farming and mini-game actions are not
/// re-sent and count as failed.
pub struct ActionClient {
    api: Arc<dyn GameApi>,
    account: Account,
    pacing: DelayRange,
    auth_policy: RetryPolicy,
    session: Session,
}

impl ActionClient {
    pub fn new(
        api: Arc<dyn GameApi>,
        account: Account,
        pacing: DelayRange,
        auth_policy: RetryPolicy,
    ) -> Self {
        Self {
            api,
            account,
            pacing,
            auth_policy,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_authenticated(&self) -> bool {
        !self.session.token.is_empty()
    }

    /// Logs in, retrying up to the configured number of attempts.
    pub async fn authenticate(&mut self) -> Result<(), AccountError> {
        let api = self.api.clone();
        let credential = self.account.credential().to_string();
        let pacing = self.pacing;

        let token = with_retry(self.auth_policy, "authenticate", |attempt| {
            let api = api.clone();
            let credential = credential.clone();
            async move {
                pause(pacing).await;
                match api.authenticate(&credential).await {
                    ActionOutcome::Success(token) => Ok(token),
                    ActionOutcome::AuthInvalid => {
                        Err(anyhow!("credential rejected on attempt {}", attempt))
                    }
                    ActionOutcome::Failure(reason) => Err(anyhow!(reason)),
                }
            }
        })
        .await
        .map_err(|e| {
            debug!("{:#}", e);
            AccountError::AuthFailed {
                attempts: self.auth_policy.attempts.max(1),
            }
        })?;

        self.session.token = token;
        Ok(())
    }

    /// Profile lookup. Unlike the other actions a failure here ends the round.
    pub async fn fetch_profile(&mut self) -> Result<Profile, AccountError> {
        let mut refreshed = false;
        loop {
            pause(self.pacing).await;
            match self.api.fetch_profile(&self.session.token).await {
                ActionOutcome::Success(profile) => {
                    self.session.username = Some(profile.username.clone());
                    return Ok(profile);
                }
                ActionOutcome::AuthInvalid if !refreshed => {
                    warn!("Token is invalid, logging in again");
                    self.authenticate().await?;
                    refreshed = true;
                }
                ActionOutcome::AuthInvalid => return Err(AccountError::TokenRejected),
                ActionOutcome::Failure(reason) => {
                    return Err(AccountError::ProfileUnavailable { reason })
                }
            }
        }
    }

    /// Runs one best-effort action. Failures are logged and folded into `None`.
    async fn call<T, F>(&mut self, action: &str, after_refresh: AfterRefresh, op: F) -> Option<T>
    where
        F: Fn(Arc<dyn GameApi>, String) -> BoxFuture<'static, ActionOutcome<T>>,
    {
        pause(self.pacing).await;
        let mut outcome = op(self.api.clone(), self.session.token.clone()).await;

        if matches!(outcome, ActionOutcome::AuthInvalid) {
            warn!("{}: token is invalid, logging in again", action);
            if let Err(e) = self.authenticate().await {
                warn!("{} FAILED: {}", action, e);
                return None;
            }
            if after_refresh == AfterRefresh::Drop {
                warn!("{} FAILED: token was refreshed, request not re-sent", action);
                return None;
            }
            pause(self.pacing).await;
            outcome = op(self.api.clone(), self.session.token.clone()).await;
        }

        match outcome {
            ActionOutcome::Success(v) => Some(v),
            ActionOutcome::AuthInvalid => {
                warn!("{} FAILED: {}", action, AccountError::TokenRejected);
                None
            }
            ActionOutcome::Failure(reason) => {
                warn!("{} FAILED: {}", action, reason);
                None
            }
        }
    }

    pub async fn fetch_balance(&mut self) -> Option<BalanceInfo> {
        self.call("Fetch balance", AfterRefresh::Resend, |api, token| {
            async move { api.fetch_balance(&token).await }.boxed()
        })
        .await
    }

    pub async fn start_farming(&mut self) -> bool {
        self.call("Start farming", AfterRefresh::Drop, |api, token| {
            async move { api.start_farming(&token).await }.boxed()
        })
        .await
        .is_some()
    }

    pub async fn claim_farming(&mut self) -> bool {
        self.call("Claim farming", AfterRefresh::Drop, |api, token| {
            async move { api.claim_farming(&token).await }.boxed()
        })
        .await
        .is_some()
    }

    /// Flattened task list. Empty when the listing failed.
    pub async fn list_tasks(&mut self) -> Vec<Task> {
        self.call("List tasks", AfterRefresh::Resend, |api, token| {
            async move { api.list_tasks(&token).await }.boxed()
        })
        .await
        .map(flatten_sections)
        .unwrap_or_default()
    }

    pub async fn start_task(&mut self, task_id: &str) -> bool {
        let id = task_id.to_string();
        self.call("Start task", AfterRefresh::Resend, move |api, token| {
            let id = id.clone();
            async move { api.start_task(&token, &id).await }.boxed()
        })
        .await
        .is_some()
    }

    /// Status reported by the claim, `None` when the claim failed.
    pub async fn claim_task(&mut self, task_id: &str) -> Option<TaskStatus> {
        let id = task_id.to_string();
        self.call("Claim task", AfterRefresh::Resend, move |api, token| {
            let id = id.clone();
            async move { api.claim_task(&token, &id).await }.boxed()
        })
        .await
        .map(|update| update.status)
    }

    pub async fn play_game(&mut self) -> bool {
        let session = self
            .call("Play game", AfterRefresh::Drop, |api, token| {
                async move { api.play_game(&token).await }.boxed()
            })
            .await;
        match session {
            Some(game) => {
                self.session.current_game_id = Some(game.game_id);
                true
            }
            None => false,
        }
    }

    /// Claims the open game. The game id is consumed whatever the result.
    pub async fn claim_game(&mut self, points: u32) -> bool {
        let Some(game_id) = self.session.current_game_id.take() else {
            warn!("Claim game FAILED: no open game to claim");
            return false;
        };
        self.call("Claim game", AfterRefresh::Drop, move |api, token| {
            let game_id = game_id.clone();
            async move { api.claim_game(&token, &game_id, points).await }.boxed()
        })
        .await
        .is_some()
    }

    pub async fn claim_daily_reward(&mut self) -> bool {
        self.call("Daily reward", AfterRefresh::Resend, |api, token| {
            async move { api.claim_daily_reward(&token).await }.boxed()
        })
        .await
        .is_some()
    }

    pub async fn fetch_referral_balance(&mut self) -> Option<ReferralBalance> {
        self.call("Referral balance", AfterRefresh::Resend, |api, token| {
            async move { api.fetch_referral_balance(&token).await }.boxed()
        })
        .await
    }

    pub async fn claim_referral_balance(&mut self) -> bool {
        self.call("Referral claim", AfterRefresh::Resend, |api, token| {
            async move { api.claim_referral_balance(&token).await }.boxed()
        })
        .await
        .is_some()
    }
}
