use chrono::TimeDelta;
use thiserror::Error;

pub const SOURCE_BUCKET_VAR: &str = "SOURCE_BUCKET";
pub const DESTINATION_BUCKET_VAR: &str = "DESTINATION_BUCKET";
pub const DESTINATION_REGION_VAR: &str = "DESTINATION_REGION";
pub const DESTINATION_PREFIX_VAR: &str = "DESTINATION_PREFIX";
pub const PREFIX_FILTER_VAR: &str = "PREFIX_FILTER";
pub const LOOKBACK_MINUTES_VAR: &str = "LOOKBACK_MINUTES";
pub const DRY_RUN_VAR: &str = "DRY_RUN";
pub const MULTIPART_THRESHOLD_VAR: &str = "MULTIPART_THRESHOLD_BYTES";
pub const MULTIPART_PART_SIZE_VAR: &str = "MULTIPART_PART_SIZE_BYTES";
pub const MULTIPART_CONCURRENCY_VAR: &str = "MULTIPART_MAX_CONCURRENCY";

pub const MIB: u64 = 1024 * 1024;
pub const GIB: u64 = 1024 * MIB;

pub const DEFAULT_LOOKBACK_MINUTES: i64 = 60;
pub const DEFAULT_MULTIPART_THRESHOLD_BYTES: u64 = 5 * GIB;
pub const DEFAULT_PART_SIZE_BYTES: u64 = 100 * MIB;
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;

/// Service limits for a single `UploadPartCopy` range.
pub const MIN_PART_SIZE_BYTES: u64 = 5 * MIB;
pub const MAX_PART_SIZE_BYTES: u64 = 5 * GIB;
/// Single-request copies are capped at 5 GiB by the service.
pub const MAX_SINGLE_COPY_BYTES: u64 = 5 * GIB;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferTuning {
    pub multipart_threshold_bytes: u64,
    pub part_size_bytes: u64,
    pub max_concurrency: usize,
}

impl Default for TransferTuning {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: DEFAULT_MULTIPART_THRESHOLD_BYTES,
            part_size_bytes: DEFAULT_PART_SIZE_BYTES,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl TransferTuning {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_PART_SIZE_BYTES..=MAX_PART_SIZE_BYTES).contains(&self.part_size_bytes) {
            return Err(ConfigError::Invalid {
                name: MULTIPART_PART_SIZE_VAR,
                reason: format!(
                    "must be between {MIN_PART_SIZE_BYTES} and {MAX_PART_SIZE_BYTES} bytes"
                ),
            });
        }
        if self.multipart_threshold_bytes == 0
            || self.multipart_threshold_bytes > MAX_SINGLE_COPY_BYTES
        {
            return Err(ConfigError::Invalid {
                name: MULTIPART_THRESHOLD_VAR,
                reason: format!("must be between 1 and {MAX_SINGLE_COPY_BYTES} bytes"),
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid {
                name: MULTIPART_CONCURRENCY_VAR,
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn uses_multipart(&self, size: u64) -> bool {
        size >= self.multipart_threshold_bytes
    }
}

/// Invocation-independent settings for a replication pass.
///
/// Resolved once per process. Nothing here is persisted between runs; the
/// only link between two runs is the wall-clock lookback window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub destination_region: Option<String>,
    pub destination_prefix: String,
    pub prefix_filter: String,
    pub lookback: TimeDelta,
    pub dry_run: bool,
    pub transfer: TransferTuning,
}

impl ReplicationConfig {
    pub fn new(source_bucket: impl Into<String>, destination_bucket: impl Into<String>) -> Self {
        Self {
            source_bucket: source_bucket.into(),
            destination_bucket: destination_bucket.into(),
            destination_region: None,
            destination_prefix: String::new(),
            prefix_filter: String::new(),
            lookback: TimeDelta::minutes(DEFAULT_LOOKBACK_MINUTES),
            dry_run: false,
            transfer: TransferTuning::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup. Required buckets are
    /// checked here so a misconfigured deployment fails before any listing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source_bucket = required(&lookup, SOURCE_BUCKET_VAR)?;
        let destination_bucket = required(&lookup, DESTINATION_BUCKET_VAR)?;

        let mut config = Self::new(source_bucket, destination_bucket);
        config.destination_region = lookup(DESTINATION_REGION_VAR)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        config.destination_prefix = lookup(DESTINATION_PREFIX_VAR).unwrap_or_default();
        config.prefix_filter = lookup(PREFIX_FILTER_VAR).unwrap_or_default();

        if let Some(minutes) = parse_optional::<i64>(&lookup, LOOKBACK_MINUTES_VAR)? {
            config = config.with_lookback_minutes(minutes)?;
        }
        if let Some(raw) = lookup(DRY_RUN_VAR) {
            config.dry_run = parse_flag(DRY_RUN_VAR, &raw)?;
        }

        let defaults = TransferTuning::default();
        config.transfer = TransferTuning {
            multipart_threshold_bytes: parse_optional(&lookup, MULTIPART_THRESHOLD_VAR)?
                .unwrap_or(defaults.multipart_threshold_bytes),
            part_size_bytes: parse_optional(&lookup, MULTIPART_PART_SIZE_VAR)?
                .unwrap_or(defaults.part_size_bytes),
            max_concurrency: parse_optional(&lookup, MULTIPART_CONCURRENCY_VAR)?
                .unwrap_or(defaults.max_concurrency),
        };
        config.transfer.validate()?;

        Ok(config)
    }

    pub fn with_lookback_minutes(mut self, minutes: i64) -> Result<Self, ConfigError> {
        let lookback = TimeDelta::try_minutes(minutes)
            .filter(|_| minutes > 0)
            .ok_or_else(|| ConfigError::Invalid {
                name: LOOKBACK_MINUTES_VAR,
                reason: format!("expected a positive number of minutes, got {minutes}"),
            })?;
        self.lookback = lookback;
        Ok(self)
    }
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<String, ConfigError> {
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_optional<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<T>()
        .map(Some)
        .map_err(|error| ConfigError::Invalid {
            name,
            reason: error.to_string(),
        })
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
