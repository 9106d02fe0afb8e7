use crate::error::{AccountError, ConfigError};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use zeroize::Zeroizing;

/// One account of the run: its position in the list and its opaque
/// authentication seed.
#[derive(Clone)]
pub struct Account {
    pub index: usize,
    credential: Zeroizing<String>,
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("index", &self.index)
            .field("credential", &"***REDACTED***")
            .finish()
    }
}

impl Account {
    pub fn new(index: usize, credential: impl Into<String>) -> Self {
        Self {
            index,
            credential: Zeroizing::new(credential.into()),
        }
    }

    pub fn credential(&self) -> &str {
        self.credential.as_str()
    }

    /// 1-based, zero padded id used in log spans.
    pub fn label(&self) -> String {
        format!("{:03}", self.index + 1)
    }
}

#[derive(Debug)]
pub struct AccountManager {
    accounts: Vec<Account>,
}

impl AccountManager {
    /// Loads credentials from a newline-delimited file. Blank lines are
    /// skipped, no other validation is done.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read account list {}", path.display()))?;

        let accounts = Self::parse(&content);
        if accounts.is_empty() {
            return Err(AccountError::EmptyAccountList {
                path: path.display().to_string(),
            }
            .into());
        }

        info!("Loaded {} accounts from {}", accounts.len(), path.display());
        Ok(Self { accounts })
    }

    pub fn parse(content: &str) -> Vec<Account> {
        content
            .lines()
            .map(|line| line.trim_end_matches('\r').trim())
            .filter(|line| !line.is_empty())
            .enumerate()
            .map(|(i, line)| Account::new(i, line))
            .collect()
    }

    pub fn count(&self) -> usize {
        self.accounts.len()
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn into_accounts(self) -> Vec<Account> {
        self.accounts
    }
}

/// Task ids that must never be started or claimed. Loaded once at startup
/// and shared read-only by every unit.
#[derive(Debug, Clone, Default)]
pub struct ExcludedTaskSet {
    ids: HashSet<String>,
}

impl ExcludedTaskSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Reads a JSON array of task ids. A missing file yields an empty set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "{} not found. Running without excluded tasks.",
                path.display()
            );
            return Ok(Self::empty());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            msg: e.to_string(),
        })?;
        let ids: Vec<String> =
            serde_json::from_str(&content).map_err(|e| ConfigError::MalformedJson {
                path: path.display().to_string(),
                msg: e.to_string(),
            })?;

        info!("Loaded {} excluded task ids from {}", ids.len(), path.display());
        Ok(Self::from_ids(ids))
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn extend<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids.extend(ids.into_iter().map(Into::into));
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.ids.contains(task_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_blank_lines_and_carriage_returns() {
        let accounts = AccountManager::parse("query_a\r\n\r\n  \nquery_b\n");
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].credential(), "query_a");
        assert_eq!(accounts[1].credential(), "query_b");
        assert_eq!(accounts[1].index, 1);
        assert_eq!(accounts[1].label(), "002");
    }

    #[test]
    fn test_account_debug_redacts_credential() {
        let account = Account::new(0, "user=secret");
        let rendered = format!("{:?}", account);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("REDACTED"));
    }
}
