//! Transport layer for the game service.
//!
//! [`GameApi`] is the seam between the bot and the remote service: one method
//! per remote action, each returning an [`ActionOutcome`]. Transport errors
//! never escape this module.

use crate::config::ApiConfig;
use crate::models::{
    AuthRequest, AuthResponse, BalanceInfo, ErrorPayload, GameClaim, GameSession, Profile,
    ReferralBalance, TaskSection, TaskUpdate,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_logic::{ConfigError, NetworkError};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN, REFERER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

const AUTH_PATH: &str = "/v1/auth/provider/PROVIDER_TELEGRAM_MINI_APP";
const PROFILE_PATH: &str = "/v1/user/me";
const REFERRAL_BALANCE_PATH: &str = "/v1/friends/balance";
const REFERRAL_CLAIM_PATH: &str = "/v1/friends/claim";
const BALANCE_PATH: &str = "/api/v1/user/balance";
const FARMING_START_PATH: &str = "/api/v1/farming/start";
const FARMING_CLAIM_PATH: &str = "/api/v1/farming/claim";
const TASKS_PATH: &str = "/api/v1/tasks";
const GAME_PLAY_PATH: &str = "/api/v1/game/play";
const GAME_CLAIM_PATH: &str = "/api/v1/game/claim";
const DAILY_REWARD_PATH: &str = "/api/v1/daily-reward";

/// Normalized result of one remote action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome<T> {
    Success(T),
    /// The service rejected the bearer token; a fresh login may help.
    AuthInvalid,
    Failure(String),
}

impl<T> ActionOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ActionOutcome<U> {
        self.and_then(|v| ActionOutcome::Success(f(v)))
    }

    pub fn and_then<U>(self, f: impl FnOnce(T) -> ActionOutcome<U>) -> ActionOutcome<U> {
        match self {
            ActionOutcome::Success(v) => f(v),
            ActionOutcome::AuthInvalid => ActionOutcome::AuthInvalid,
            ActionOutcome::Failure(reason) => ActionOutcome::Failure(reason),
        }
    }
}

#[async_trait]
pub trait GameApi: Send + Sync {
    /// Exchanges a credential for a bearer token.
    async fn authenticate(&self, credential: &str) -> ActionOutcome<String>;
    async fn fetch_profile(&self, token: &str) -> ActionOutcome<Profile>;
    async fn fetch_balance(&self, token: &str) -> ActionOutcome<BalanceInfo>;
    async fn start_farming(&self, token: &str) -> ActionOutcome<()>;
    async fn claim_farming(&self, token: &str) -> ActionOutcome<()>;
    async fn list_tasks(&self, token: &str) -> ActionOutcome<Vec<TaskSection>>;
    async fn start_task(&self, token: &str, task_id: &str) -> ActionOutcome<()>;
    async fn claim_task(&self, token: &str, task_id: &str) -> ActionOutcome<TaskUpdate>;
    async fn play_game(&self, token: &str) -> ActionOutcome<GameSession>;
    async fn claim_game(&self, token: &str, game_id: &str, points: u32) -> ActionOutcome<()>;
    async fn claim_daily_reward(&self, token: &str) -> ActionOutcome<()>;
    async fn fetch_referral_balance(&self, token: &str) -> ActionOutcome<ReferralBalance>;
    async fn claim_referral_balance(&self, token: &str) -> ActionOutcome<()>;
}

/// [`GameApi`] over HTTPS JSON with bearer authentication.
pub struct HttpGameApi {
    client: Client,
    gateway_url: String,
    game_url: String,
    daily_offset_minutes: i32,
}

impl HttpGameApi {
    pub fn new(api: &ApiConfig, daily_offset_minutes: i32) -> Result<Self> {
        let gateway_url = base_url("api.gateway_url", &api.gateway_url)?;
        let game_url = base_url("api.game_url", &api.game_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(origin) = &api.origin {
            let origin = origin.trim_end_matches('/');
            headers.insert(
                ORIGIN,
                HeaderValue::from_str(origin).context("Invalid origin header")?,
            );
            headers.insert(
                REFERER,
                HeaderValue::from_str(&format!("{}/", origin)).context("Invalid referer header")?,
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(&api.user_agent)
            .timeout(api.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            gateway_url,
            game_url,
            daily_offset_minutes,
        })
    }

    fn gateway(&self, path: &str) -> String {
        format!("{}{}", self.gateway_url, path)
    }

    fn game(&self, path: &str) -> String {
        format!("{}{}", self.game_url, path)
    }

    /// Sends the request and returns the raw body of a 2xx answer.
    async fn execute(&self, request: RequestBuilder, endpoint: &str) -> ActionOutcome<String> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return ActionOutcome::Failure(transport_error(endpoint, &e).to_string()),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => return ActionOutcome::Failure(transport_error(endpoint, &e).to_string()),
        };

        // The invalid-token payload is sometimes sent with a 2xx status
        let payload: ErrorPayload = serde_json::from_str(&body).unwrap_or_default();
        if payload.is_token_invalid() {
            return ActionOutcome::AuthInvalid;
        }

        if status.is_success() {
            return ActionOutcome::Success(body);
        }

        let error = if status == StatusCode::TOO_MANY_REQUESTS {
            NetworkError::RateLimited {
                endpoint: endpoint.to_string(),
            }
        } else {
            NetworkError::HttpError {
                status_code: status.as_u16(),
                endpoint: endpoint.to_string(),
                body: payload.message.unwrap_or(body),
            }
        };
        ActionOutcome::Failure(error.to_string())
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String, token: &str) -> ActionOutcome<T> {
        let outcome = self.execute(self.client.get(&url).bearer_auth(token), &url).await;
        decode(&url, outcome)
    }

    async fn post_empty(&self, url: String, token: &str) -> ActionOutcome<String> {
        self.execute(
            self.client.post(&url).bearer_auth(token).json(&serde_json::json!({})),
            &url,
        )
        .await
    }
}

fn base_url(field: &str, value: &str) -> Result<String, ConfigError> {
    Url::parse(value).map_err(|_| ConfigError::InvalidUrl {
        field: field.to_string(),
        url: value.to_string(),
    })?;
    Ok(value.trim_end_matches('/').to_string())
}

fn decode<T: DeserializeOwned>(endpoint: &str, outcome: ActionOutcome<String>) -> ActionOutcome<T> {
    outcome.and_then(|body| match serde_json::from_str(&body) {
        Ok(v) => ActionOutcome::Success(v),
        Err(e) => ActionOutcome::Failure(
            NetworkError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
            .to_string(),
        ),
    })
}

fn transport_error(endpoint: &str, e: &reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        NetworkError::ConnectionFailed {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl GameApi for HttpGameApi {
    async fn authenticate(&self, credential: &str) -> ActionOutcome<String> {
        let url = self.gateway(AUTH_PATH);
        let request = self
            .client
            .post(&url)
            .json(&AuthRequest { query: credential });
        let outcome = self.execute(request, &url).await;
        // The refresh token is the one the game endpoints accept as bearer
        decode::<AuthResponse>(&url, outcome).map(|auth| auth.token.refresh)
    }

    async fn fetch_profile(&self, token: &str) -> ActionOutcome<Profile> {
        self.get_json(self.gateway(PROFILE_PATH), token).await
    }

    async fn fetch_balance(&self, token: &str) -> ActionOutcome<BalanceInfo> {
        self.get_json(self.game(BALANCE_PATH), token).await
    }

    async fn start_farming(&self, token: &str) -> ActionOutcome<()> {
        self.post_empty(self.game(FARMING_START_PATH), token)
            .await
            .map(|_| ())
    }

    async fn claim_farming(&self, token: &str) -> ActionOutcome<()> {
        self.post_empty(self.game(FARMING_CLAIM_PATH), token)
            .await
            .map(|_| ())
    }

    async fn list_tasks(&self, token: &str) -> ActionOutcome<Vec<TaskSection>> {
        self.get_json(self.game(TASKS_PATH), token).await
    }

    async fn start_task(&self, token: &str, task_id: &str) -> ActionOutcome<()> {
        let url = self.game(&format!("{}/{}/start", TASKS_PATH, task_id));
        self.post_empty(url, token).await.map(|_| ())
    }

    async fn claim_task(&self, token: &str, task_id: &str) -> ActionOutcome<TaskUpdate> {
        let url = self.game(&format!("{}/{}/claim", TASKS_PATH, task_id));
        let outcome = self.post_empty(url.clone(), token).await;
        decode(&url, outcome)
    }

    async fn play_game(&self, token: &str) -> ActionOutcome<GameSession> {
        let url = self.game(GAME_PLAY_PATH);
        let outcome = self.post_empty(url.clone(), token).await;
        decode(&url, outcome)
    }

    async fn claim_game(&self, token: &str, game_id: &str, points: u32) -> ActionOutcome<()> {
        let url = self.game(GAME_CLAIM_PATH);
        let request = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&GameClaim { game_id, points });
        self.execute(request, &url).await.map(|_| ())
    }

    async fn claim_daily_reward(&self, token: &str) -> ActionOutcome<()> {
        let url = self.game(&format!(
            "{}?offset={}",
            DAILY_REWARD_PATH, self.daily_offset_minutes
        ));
        self.post_empty(url, token).await.map(|_| ())
    }

    async fn fetch_referral_balance(&self, token: &str) -> ActionOutcome<ReferralBalance> {
        self.get_json(self.gateway(REFERRAL_BALANCE_PATH), token)
            .await
    }

    async fn claim_referral_balance(&self, token: &str) -> ActionOutcome<()> {
        self.post_empty(self.gateway(REFERRAL_CLAIM_PATH), token)
            .await
            .map(|_| ())
    }
}
