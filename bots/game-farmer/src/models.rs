//! Wire models for the game service JSON payloads.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Message the service returns when a bearer token has expired.
pub const TOKEN_INVALID_MESSAGE: &str = "Token is invalid";

#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub token: TokenPair,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPair {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthRequest<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    pub username: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceInfo {
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub available_balance: f64,
    #[serde(default)]
    pub play_passes: u32,
    #[serde(default)]
    pub farming: Option<FarmingState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmingState {
    /// Epoch milliseconds.
    pub end_time: i64,
    #[serde(default)]
    pub start_time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    Started,
    ReadyForClaim,
    Finished,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSection {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub sub_sections: Vec<TaskSection>,
}

/// Flattens sections depth-first, keeping server order.
pub fn flatten_sections(sections: Vec<TaskSection>) -> Vec<Task> {
    let mut out = Vec::new();
    for section in sections {
        out.extend(section.tasks);
        out.extend(flatten_sections(section.sub_sections));
    }
    out
}

/// Body of a task start/claim answer. Only the resulting status matters.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskUpdate {
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub game_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameClaim<'a> {
    pub game_id: &'a str,
    pub points: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralBalance {
    #[serde(default, deserialize_with = "deserialize_amount")]
    pub amount_for_claim: f64,
    #[serde(default)]
    pub can_claim: Option<bool>,
}

impl ReferralBalance {
    pub fn claimable(&self) -> bool {
        self.amount_for_claim > 0.0 && self.can_claim != Some(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorPayload {
    pub fn is_token_invalid(&self) -> bool {
        self.message.as_deref() == Some(TOKEN_INVALID_MESSAGE)
    }
}

/// Balances arrive as decimal strings or plain numbers depending on the endpoint.
fn deserialize_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct AmountVisitor;

    impl<'de> serde::de::Visitor<'de> for AmountVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a decimal string or number")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            if value.trim().is_empty() {
                return Ok(0.0);
            }
            f64::from_str(value.trim()).map_err(|_| E::custom("invalid amount"))
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value as f64)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value as f64)
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(value)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(0.0)
        }
    }

    deserializer.deserialize_any(AmountVisitor)
}
