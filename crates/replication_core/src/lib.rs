//! Shared replication domain primitives.
//!
//! This crate owns the deterministic parts of a replication pass: resolved
//! configuration, the lookback window, the per-object eligibility policy and
//! the outcome/completion contracts. It intentionally excludes AWS SDK and
//! Lambda runtime concerns.

pub mod config;
pub mod contract;
pub mod policy;
pub mod window;
