//! AWS-oriented adapters and handlers for scheduled bucket replication.
//!
//! This crate owns runtime integration details (the Lambda handler, the S3
//! listing and copy adapters, and log setup). Window, filtering and outcome
//! rules live in `replication_core`.

pub mod adapters;
pub mod handlers;
pub mod telemetry;
