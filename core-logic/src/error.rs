//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! Library code returns these; application code wraps them in `anyhow`.

use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Invalid URL format for '{field}': '{url}'")]
    InvalidUrl { field: String, url: String },

    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },

    #[error("Malformed JSON in {path}: {msg}")]
    MalformedJson { path: String, msg: String },
}

/// Errors that end the current round for a single account
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Account list {path} contains no credentials")]
    EmptyAccountList { path: String },

    #[error("Authentication failed after {attempts} attempts")]
    AuthFailed { attempts: u32 },

    #[error("Token still invalid after re-authentication")]
    TokenRejected,

    #[error("Profile unavailable: {reason}")]
    ProfileUnavailable { reason: String },
}

/// Network and HTTP-related errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    #[error("Request timeout to {endpoint}")]
    Timeout { endpoint: String },

    #[error("Rate limited by {endpoint}")]
    RateLimited { endpoint: String },

    #[error("Connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("HTTP error {status_code} from {endpoint}: {body}")]
    HttpError {
        status_code: u16,
        endpoint: String,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}
