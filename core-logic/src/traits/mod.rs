use crate::utils::account_manager::Account;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Result of one processing round for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Every stage ran. `farming_end` is the end time observed when the
    /// balance was read, if a farming session was active.
    Completed {
        farming_end: Option<DateTime<Utc>>,
    },
    /// The round was abandoned before any action ran.
    Skipped { reason: String },
}

impl RoundOutcome {
    pub fn farming_end(&self) -> Option<DateTime<Utc>> {
        match self {
            RoundOutcome::Completed { farming_end } => *farming_end,
            RoundOutcome::Skipped { .. } => None,
        }
    }
}

#[async_trait]
pub trait AccountProcessor: Send + Sync {
    /// Runs one full round for `account`. An `Err` is reported by the
    /// scheduler as a failed unit and never stops sibling units.
    async fn process(&self, account: &Account) -> Result<RoundOutcome>;
}
