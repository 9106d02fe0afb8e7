//! # Core Logic - Shared Runtime for Account Farming Bots
//!
//! This crate provides the pieces every bot in the workspace shares: account
//! loading, the batch scheduler, retry helpers, logging and the error taxonomy.
//!
//! ## Modules
//!
//! - [`config`] - Delay windows, retry policies and scheduler settings
//! - [`error`] - Typed error handling with thiserror
//! - [`traits`] - The per-account processor contract
//! - [`utils`] - Logger, retry, account loading and the batch runner

// Module declarations - internal modules marked pub(crate)
pub mod config;
pub mod error;
pub mod traits;
pub(crate) mod utils;

// Selective exports - only public API types
pub use config::{CyclePolicy, DelayRange, RetryPolicy, SchedulerConfig};
pub use error::{AccountError, ConfigError, NetworkError};
pub use traits::{AccountProcessor, RoundOutcome};

// Utils are pub(crate) - only export specific public utilities
pub use utils::account_manager::{Account, AccountManager, ExcludedTaskSet};
pub use utils::logger::{setup_logger, LoggerConfig, LoggerGuards};
pub use utils::runner::{partition, BatchScheduler, CycleSummary};

// Export retry utilities for testing
pub use utils::retry::{pause, with_retry};
