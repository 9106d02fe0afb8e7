//! Configuration loader for game-farmer
//!
//! Settings come from a TOML file and can be overridden with `FARMER__`
//! prefixed environment variables, e.g. `FARMER__SCHEDULER__CONCURRENCY=5`.
//! Relative `accounts_file` and `excluded_tasks_file` paths are read from
//! the directory holding the config file.

use anyhow::Result;
use chrono_tz::Tz;
use config::{Config, Environment, File};
use core_logic::{ConfigError, DelayRange, LoggerConfig, RetryPolicy, SchedulerConfig};
use rand::Rng;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FarmerConfig {
    /// Newline-delimited credential list
    pub accounts_file: String,
    /// Optional JSON array of task ids to never touch
    pub excluded_tasks_file: Option<String>,
    /// Extra excluded ids merged with the file contents
    pub excluded_task_ids: Vec<String>,
    /// IANA zone used when printing farming end times
    pub display_timezone: String,
    /// Pacing delay drawn before every call to the service
    pub action_delay: DelayRange,
    pub auth: RetryPolicy,
    pub api: ApiConfig,
    pub tasks: TaskConfig,
    pub mini_game: MiniGameConfig,
    pub daily_reward: DailyRewardConfig,
    pub referral: ReferralConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LoggerConfig,
}

impl Default for FarmerConfig {
    fn default() -> Self {
        Self {
            accounts_file: "data.txt".to_string(),
            excluded_tasks_file: None,
            excluded_task_ids: Vec::new(),
            display_timezone: "UTC".to_string(),
            action_delay: DelayRange::default(),
            auth: RetryPolicy::default(),
            api: ApiConfig::default(),
            tasks: TaskConfig::default(),
            mini_game: MiniGameConfig::default(),
            daily_reward: DailyRewardConfig::default(),
            referral: ReferralConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LoggerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL for auth, profile and referral endpoints
    pub gateway_url: String,
    /// Base URL for balance, farming, task, game and daily endpoints
    pub game_url: String,
    pub origin: Option<String>,
    pub user_agent: String,
    /// Upper bound for a single HTTP request
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            gateway_url: String::new(),
            game_url: String::new(),
            origin: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// What to do with a task whose start call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFailurePolicy {
    /// Move on to the next task without claiming.
    #[default]
    SkipClaim,
    /// Attempt the claim regardless.
    ClaimAnyway,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub enabled: bool,
    /// Wait between starting a task and claiming it
    pub claim_wait_secs: u64,
    pub on_start_failure: StartFailurePolicy,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            claim_wait_secs: 3,
            on_start_failure: StartFailurePolicy::SkipClaim,
        }
    }
}

/// Points submitted when claiming a mini-game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RewardPolicy {
    Fixed { points: u32 },
    Range { min: u32, max: u32 },
}

impl Default for RewardPolicy {
    fn default() -> Self {
        RewardPolicy::Fixed { points: 2000 }
    }
}

impl RewardPolicy {
    pub fn draw(&self) -> u32 {
        match *self {
            RewardPolicy::Fixed { points } => points,
            RewardPolicy::Range { min, max } if min >= max => min,
            RewardPolicy::Range { min, max } => rand::thread_rng().gen_range(min..=max),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MiniGameConfig {
    pub enabled: bool,
    /// Play attempts per pass before the pass is abandoned
    pub max_attempts: u32,
    /// Wait between play and claim
    pub game_duration_secs: u64,
    /// Wait after a failed play before the next attempt
    pub retry_wait_secs: u64,
    pub reward: RewardPolicy,
}

impl Default for MiniGameConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 10,
            game_duration_secs: 30,
            retry_wait_secs: 5,
            reward: RewardPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DailyRewardConfig {
    pub enabled: bool,
    /// Timezone offset in minutes sent with the check-in
    pub offset_minutes: i32,
}

impl Default for DailyRewardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            offset_minutes: -420,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReferralConfig {
    pub enabled: bool,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl FarmerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("FARMER")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        let mut config: FarmerConfig =
            settings.try_deserialize().map_err(|e| anyhow::anyhow!(e))?;
        config.validate()?;
        if let Some(dir) = Path::new(path).parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        self.accounts_file = resolve_against(base, &self.accounts_file);
        if let Some(file) = &self.excluded_tasks_file {
            self.excluded_tasks_file = Some(resolve_against(base, file));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts_file.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "accounts_file".to_string(),
            });
        }
        if self.scheduler.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scheduler.concurrency".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        for (field, value) in [
            ("api.gateway_url", &self.api.gateway_url),
            ("api.game_url", &self.api.game_url),
        ] {
            if value.is_empty() {
                return Err(ConfigError::MissingField {
                    field: field.to_string(),
                });
            }
            if Url::parse(value).is_err() {
                return Err(ConfigError::InvalidUrl {
                    field: field.to_string(),
                    url: value.clone(),
                });
            }
        }
        if self.auth.attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "auth.attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.mini_game.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mini_game.max_attempts".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if let RewardPolicy::Range { min, max } = self.mini_game.reward {
            if min > max {
                return Err(ConfigError::InvalidValue {
                    field: "mini_game.reward".to_string(),
                    reason: format!("min {} is greater than max {}", min, max),
                });
            }
        }
        self.timezone()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.display_timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidValue {
                field: "display_timezone".to_string(),
                reason: format!("unknown timezone '{}'", self.display_timezone),
            })
    }
}

fn resolve_against(base: &Path, file: &str) -> String {
    let path = Path::new(file);
    if path.is_absolute() || base.as_os_str().is_empty() {
        return file.to_string();
    }
    base.join(path).to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> FarmerConfig {
        let mut config = FarmerConfig::default();
        config.api.gateway_url = "https://gateway.example.com".to_string();
        config.api.game_url = "https://game.example.com".to_string();
        config
    }

    #[test]
    fn test_defaults_mirror_documented_values() {
        let config = FarmerConfig::default();
        assert_eq!(config.action_delay, DelayRange::new(3000, 5000));
        assert_eq!(config.auth.attempts, 3);
        assert_eq!(config.mini_game.max_attempts, 10);
        assert_eq!(config.mini_game.game_duration_secs, 30);
        assert_eq!(config.mini_game.retry_wait_secs, 5);
        assert_eq!(config.api.request_timeout_secs, 30);
        assert_eq!(config.tasks.on_start_failure, StartFailurePolicy::SkipClaim);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_urls() {
        match FarmerConfig::default().validate() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "api.gateway_url"),
            other => panic!("Expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = valid();
        config.scheduler.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_timezone() {
        let mut config = valid();
        config.display_timezone = "Mars/Olympus".to_string();
        assert!(config.validate().is_err());
        config.display_timezone = "Asia/Jakarta".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_paths_against_config_dir() {
        let mut config = valid();
        config.excluded_tasks_file = Some("excluded_tasks.json".to_string());
        config.resolve_paths(Path::new("bots/game-farmer"));
        assert_eq!(
            Path::new(&config.accounts_file),
            Path::new("bots/game-farmer/data.txt")
        );
        assert_eq!(
            config.excluded_tasks_file.as_deref().map(Path::new),
            Some(Path::new("bots/game-farmer/excluded_tasks.json"))
        );
    }

    #[test]
    fn test_resolve_paths_keeps_absolute_and_bare_dir() {
        let mut config = valid();
        config.accounts_file = "/srv/farmer/data.txt".to_string();
        config.resolve_paths(Path::new("bots/game-farmer"));
        assert_eq!(config.accounts_file, "/srv/farmer/data.txt");

        let mut config = valid();
        config.resolve_paths(Path::new(""));
        assert_eq!(config.accounts_file, "data.txt");
    }

    #[test]
    fn test_reward_policy_draw() {
        assert_eq!(RewardPolicy::Fixed { points: 150 }.draw(), 150);
        let range = RewardPolicy::Range { min: 180, max: 220 };
        for _ in 0..50 {
            assert!((180..=220).contains(&range.draw()));
        }
    }
}
