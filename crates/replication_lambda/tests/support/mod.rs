#![allow(dead_code)]

pub mod fakes;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use replication_core::config::ReplicationConfig;
use replication_core::contract::ObjectRecord;
use replication_core::window::ReplicationWindow;

pub fn invoked_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap()
}

pub fn one_hour_window() -> ReplicationWindow {
    ReplicationWindow::ending_at(invoked_at(), TimeDelta::hours(1))
}

pub fn object_aged(key: &str, age: TimeDelta) -> ObjectRecord {
    ObjectRecord::new(key, invoked_at() - age)
}

pub fn config(destination_prefix: &str, prefix_filter: &str) -> ReplicationConfig {
    let mut config = ReplicationConfig::new("source-bucket", "destination-bucket");
    config.destination_prefix = destination_prefix.to_string();
    config.prefix_filter = prefix_filter.to_string();
    config
}
