use std::time::Instant;

use replication_core::config::ReplicationConfig;
use replication_core::contract::{
    CompletionRecord, CopyFailure, CopyFailureKind, CopyOutcome, CopyResult, ObjectRecord,
    ReplicationSummary,
};
use replication_core::policy::{
    destination_key_for, evaluate, validate_destination_key, Eligibility,
};
use replication_core::window::ReplicationWindow;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::adapters::copier::{CopyRequest, ObjectCopier};
use crate::adapters::listing::{ListingError, PageIter, SourceListing};

/// Entry point for a scheduled trigger. The event payload carries no
/// parameters; the window is anchored at the moment of invocation.
pub fn handle_scheduled_event(
    _event: &Value,
    config: &ReplicationConfig,
    listing: &impl SourceListing,
    copier: &impl ObjectCopier,
) -> Result<CompletionRecord, ListingError> {
    let window = ReplicationWindow::ending_now(config.lookback);
    run_replication_pass(config, &window, listing, copier)
}

/// One linear pass over the source listing.
///
/// Pages are fetched lazily and objects are handled one at a time in listing
/// order. Per-object copy failures are folded into the summary and never
/// stop the pass; only a listing failure ends it early.
pub fn run_replication_pass(
    config: &ReplicationConfig,
    window: &ReplicationWindow,
    listing: &impl SourceListing,
    copier: &impl ObjectCopier,
) -> Result<CompletionRecord, ListingError> {
    let started_at = Instant::now();
    info!(
        event = "replication_started",
        source_bucket = listing.bucket(),
        destination_bucket = %config.destination_bucket,
        destination_region = config.destination_region.as_deref().unwrap_or("default"),
        destination_prefix = %config.destination_prefix,
        prefix_filter = %config.prefix_filter,
        invoked_at = %window.invoked_at().to_rfc3339(),
        cutoff = %window.cutoff().to_rfc3339(),
        dry_run = config.dry_run,
    );

    let mut summary = ReplicationSummary::default();
    for page in PageIter::new(listing) {
        let page = match page {
            Ok(page) => page,
            Err(listing_error) => {
                error!(
                    event = "listing_failed",
                    source_bucket = %listing_error.bucket,
                    pages_listed = summary.pages_listed,
                    error = %listing_error.message,
                );
                return Err(listing_error);
            }
        };
        summary.pages_listed += 1;
        summary.objects_listed += page.objects.len();

        for object in &page.objects {
            match evaluate(object, &config.prefix_filter, window) {
                Eligibility::Eligible => {
                    let outcome = replicate_object(config, listing.bucket(), object, copier);
                    summary.record_outcome(&outcome);
                }
                skip @ Eligibility::SkipPrefixMismatch => {
                    summary.skipped_prefix += 1;
                    log_skip(object, skip);
                }
                skip @ Eligibility::SkipOutsideWindow => {
                    summary.skipped_window += 1;
                    log_skip(object, skip);
                }
            }
        }
    }

    info!(
        event = "replication_completed",
        pages_listed = summary.pages_listed,
        objects_listed = summary.objects_listed,
        skipped_prefix = summary.skipped_prefix,
        skipped_window = summary.skipped_window,
        copied = summary.copied,
        planned = summary.planned,
        failed = summary.failed,
        dispatched = summary.dispatched(),
        duration_ms = elapsed_ms(started_at),
    );
    Ok(CompletionRecord::completed(summary))
}

fn elapsed_ms(started_at: Instant) -> u64 {
    u64::try_from(started_at.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn replicate_object(
    config: &ReplicationConfig,
    source_bucket: &str,
    object: &ObjectRecord,
    copier: &impl ObjectCopier,
) -> CopyOutcome {
    let destination_key = destination_key_for(config, object);
    let result = copy_with_validation(config, source_bucket, object, &destination_key, copier);
    let outcome = CopyOutcome {
        source_key: object.key.clone(),
        destination_key,
        result,
    };
    log_outcome(config, &outcome);
    outcome
}

fn copy_with_validation(
    config: &ReplicationConfig,
    source_bucket: &str,
    object: &ObjectRecord,
    destination_key: &str,
    copier: &impl ObjectCopier,
) -> CopyResult {
    if let Err(message) = validate_destination_key(destination_key) {
        return CopyResult::Failed(CopyFailure {
            kind: CopyFailureKind::Validation,
            message,
        });
    }

    if config.dry_run {
        return CopyResult::Planned;
    }

    info!(
        event = "object_copy_started",
        source_key = %object.key,
        destination_bucket = %config.destination_bucket,
        destination_key,
    );
    let request = CopyRequest {
        source_bucket,
        source: object,
        destination_bucket: &config.destination_bucket,
        destination_key,
    };
    match copier.copy_object(&request) {
        Ok(()) => CopyResult::Copied,
        Err(copy_error) => CopyResult::Failed(copy_error.into()),
    }
}

fn log_outcome(config: &ReplicationConfig, outcome: &CopyOutcome) {
    match &outcome.result {
        CopyResult::Copied => info!(
            event = "object_copied",
            source_key = %outcome.source_key,
            destination_bucket = %config.destination_bucket,
            destination_key = %outcome.destination_key,
        ),
        CopyResult::Planned => info!(
            event = "object_planned",
            source_key = %outcome.source_key,
            destination_bucket = %config.destination_bucket,
            destination_key = %outcome.destination_key,
        ),
        CopyResult::Failed(failure) => error!(
            event = "object_copy_failed",
            source_key = %outcome.source_key,
            destination_bucket = %config.destination_bucket,
            destination_key = %outcome.destination_key,
            error_kind = failure.kind.as_str(),
            error = %failure.message,
        ),
    }
}

fn log_skip(object: &ObjectRecord, reason: Eligibility) {
    debug!(
        event = "object_skipped",
        source_key = %object.key,
        last_modified = %object.last_modified.to_rfc3339(),
        reason = reason.as_str(),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::{TimeDelta, TimeZone, Utc};
    use replication_core::contract::ListingPage;
    use serde_json::json;

    use super::*;
    use crate::adapters::copier::CopyError;

    struct SinglePageListing {
        objects: Vec<ObjectRecord>,
    }

    impl SourceListing for SinglePageListing {
        fn bucket(&self) -> &str {
            "source"
        }

        fn list_page(&self, _token: Option<&str>) -> Result<ListingPage, ListingError> {
            Ok(ListingPage {
                objects: self.objects.clone(),
                next_continuation_token: None,
            })
        }
    }

    #[derive(Default)]
    struct CapturingCopier {
        requests: Mutex<Vec<(String, String, String, String)>>,
    }

    impl CapturingCopier {
        fn requests(&self) -> Vec<(String, String, String, String)> {
            self.requests.lock().expect("poisoned mutex").clone()
        }
    }

    impl ObjectCopier for CapturingCopier {
        fn copy_object(&self, request: &CopyRequest<'_>) -> Result<(), CopyError> {
            self.requests.lock().expect("poisoned mutex").push((
                request.source_bucket.to_string(),
                request.source.key.clone(),
                request.destination_bucket.to_string(),
                request.destination_key.to_string(),
            ));
            Ok(())
        }
    }

    #[test]
    fn copy_request_carries_both_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        let listing = SinglePageListing {
            objects: vec![ObjectRecord::new("a/1.txt", now - TimeDelta::minutes(1))],
        };
        let copier = CapturingCopier::default();
        let config = ReplicationConfig::new("source", "destination");
        let window = ReplicationWindow::ending_at(now, TimeDelta::hours(1));

        let record =
            run_replication_pass(&config, &window, &listing, &copier).expect("pass should finish");

        assert_eq!(record.summary.copied, 1);
        assert_eq!(
            copier.requests(),
            vec![(
                "source".to_string(),
                "a/1.txt".to_string(),
                "destination".to_string(),
                "a/1.txt".to_string(),
            )]
        );
    }

    #[test]
    fn scheduled_event_payload_is_ignored() {
        let listing = SinglePageListing {
            objects: vec![ObjectRecord::new("fresh.txt", Utc::now())],
        };
        let copier = CapturingCopier::default();
        let config = ReplicationConfig::new("source", "destination");

        let record = handle_scheduled_event(
            &json!({"source": "aws.events", "detail-type": "Scheduled Event", "detail": {}}),
            &config,
            &listing,
            &copier,
        )
        .expect("pass should finish");

        assert_eq!(record.status, "completed");
        assert_eq!(copier.requests().len(), 1);
    }

    #[test]
    fn elapsed_ms_saturates_instead_of_wrapping() {
        let started_at = Instant::now();
        assert!(elapsed_ms(started_at) < 60_000);

        let long_ago = Instant::now()
            .checked_sub(std::time::Duration::from_secs(3_600))
            .unwrap_or(started_at);
        assert!(elapsed_ms(long_ago) >= elapsed_ms(started_at));
    }

    #[test]
    fn dry_run_plans_without_copying() {
        let now = Utc.with_ymd_and_hms(2026, 2, 14, 12, 0, 0).unwrap();
        let listing = SinglePageListing {
            objects: vec![
                ObjectRecord::new("a/1.txt", now),
                ObjectRecord::new("a/2.txt", now - TimeDelta::days(1)),
            ],
        };
        let copier = CapturingCopier::default();
        let mut config = ReplicationConfig::new("source", "destination");
        config.dry_run = true;
        let window = ReplicationWindow::ending_at(now, TimeDelta::hours(1));

        let record =
            run_replication_pass(&config, &window, &listing, &copier).expect("pass should finish");

        assert!(copier.requests().is_empty());
        assert_eq!(record.summary.planned, 1);
        assert_eq!(record.summary.skipped_window, 1);
        assert_eq!(record.summary.copied, 0);
    }
}
