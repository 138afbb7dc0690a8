use crate::config::ReplicationConfig;
use crate::contract::{ObjectRecord, MAX_OBJECT_KEY_BYTES};
use crate::window::ReplicationWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    SkipPrefixMismatch,
    SkipOutsideWindow,
}

impl Eligibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::SkipPrefixMismatch => "prefix_mismatch",
            Self::SkipOutsideWindow => "outside_window",
        }
    }
}

/// Prefix first, then recency. An empty filter matches every key.
pub fn evaluate(
    object: &ObjectRecord,
    prefix_filter: &str,
    window: &ReplicationWindow,
) -> Eligibility {
    if !prefix_filter.is_empty() && !object.key.starts_with(prefix_filter) {
        return Eligibility::SkipPrefixMismatch;
    }
    if !window.contains(object.last_modified) {
        return Eligibility::SkipOutsideWindow;
    }
    Eligibility::Eligible
}

pub fn destination_key(destination_prefix: &str, source_key: &str) -> String {
    format!("{destination_prefix}{source_key}")
}

pub fn destination_key_for(config: &ReplicationConfig, object: &ObjectRecord) -> String {
    destination_key(&config.destination_prefix, &object.key)
}

pub fn validate_destination_key(key: &str) -> Result<(), String> {
    if key.is_empty() {
        return Err("destination key cannot be empty".to_string());
    }
    if key.len() > MAX_OBJECT_KEY_BYTES {
        return Err(format!(
            "destination key is {} bytes, exceeding the {MAX_OBJECT_KEY_BYTES}-byte limit",
            key.len()
        ));
    }
    Ok(())
}
