//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

// Internal modules - not part of public API
pub(crate) mod account_manager;
pub(crate) mod logger;
pub(crate) mod retry;
pub(crate) mod runner;
