//! Helpers for resolving configuration from caller overrides and image defaults.
pub mod merge;
