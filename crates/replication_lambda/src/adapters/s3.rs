use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::operation::head_object::HeadObjectOutput;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, MetadataDirective};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use replication_core::config::{ReplicationConfig, TransferTuning};
use replication_core::contract::{ListingPage, ObjectRecord};
use tracing::{debug, warn};

use crate::adapters::copier::{CopyError, CopyRequest, ObjectCopier};
use crate::adapters::listing::{ListingError, SourceListing};

/// Upper bound on parts in one multipart upload.
pub const MAX_UPLOAD_PARTS: u64 = 10_000;

/// Everything but unreserved characters and the path separator is escaped
/// in the `x-amz-copy-source` header.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Source and destination client handles, built once per process.
#[derive(Debug, Clone)]
pub struct S3Clients {
    pub source: aws_sdk_s3::Client,
    pub destination: aws_sdk_s3::Client,
}

impl S3Clients {
    pub async fn from_env(config: &ReplicationConfig) -> Self {
        let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let source = aws_sdk_s3::Client::new(&sdk_config);
        let destination = match config.destination_region.as_deref() {
            Some(region) => {
                let destination_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                    .region(aws_sdk_s3::config::Region::new(region.to_string()))
                    .build();
                aws_sdk_s3::Client::from_conf(destination_config)
            }
            None => source.clone(),
        };
        Self {
            source,
            destination,
        }
    }
}

pub struct S3SourceListing {
    bucket: String,
    prefix: String,
    client: aws_sdk_s3::Client,
}

impl S3SourceListing {
    /// `prefix` narrows the listing on the service side; callers still apply
    /// their own key filter to every returned object.
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>, prefix: &str) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.to_string(),
            client,
        }
    }

    async fn list_page_async(
        &self,
        continuation_token: Option<&str>,
    ) -> Result<ListingPage, ListingError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(Some(self.prefix.clone()).filter(|prefix| !prefix.is_empty()))
            .set_continuation_token(continuation_token.map(str::to_string))
            .send()
            .await
            .map_err(|error| ListingError {
                bucket: self.bucket.clone(),
                message: DisplayErrorContext(&error).to_string(),
            })?;

        let mut objects = Vec::with_capacity(output.contents().len());
        for object in output.contents() {
            let Some(key) = object.key() else {
                warn!(event = "listing_entry_without_key", bucket = %self.bucket);
                continue;
            };
            let Some(last_modified) = object.last_modified().and_then(to_chrono) else {
                warn!(
                    event = "listing_entry_without_timestamp",
                    bucket = %self.bucket,
                    key = key,
                );
                continue;
            };
            let mut record = ObjectRecord::new(key, last_modified);
            if let Some(size) = object.size().and_then(|size| u64::try_from(size).ok()) {
                record = record.with_size(size);
            }
            objects.push(record);
        }

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListingPage {
            objects,
            next_continuation_token,
        })
    }
}

impl SourceListing for S3SourceListing {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn list_page(&self, continuation_token: Option<&str>) -> Result<ListingPage, ListingError> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.list_page_async(continuation_token))
        })
    }
}

fn to_chrono(value: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(value.secs(), value.subsec_nanos())
}

/// Server-side copier. Objects below the multipart threshold go through a
/// single `CopyObject`; larger ones are split into `UploadPartCopy` ranges.
pub struct S3Copier {
    clients: S3Clients,
    tuning: TransferTuning,
}

impl S3Copier {
    pub fn new(clients: S3Clients, tuning: TransferTuning) -> Self {
        Self { clients, tuning }
    }

    async fn copy_async(&self, request: &CopyRequest<'_>) -> Result<(), CopyError> {
        if route_for_listed_size(&self.tuning, request.source.size) == CopyRoute::SingleRequest {
            return self.single_copy(request).await;
        }

        let head = self.head_source(request).await?;
        let size = head
            .content_length()
            .and_then(|length| u64::try_from(length).ok())
            .unwrap_or_default();
        if self.tuning.uses_multipart(size) {
            self.multipart_copy(request, &head, size).await
        } else {
            self.single_copy(request).await
        }
    }

    async fn head_source(&self, request: &CopyRequest<'_>) -> Result<HeadObjectOutput, CopyError> {
        self.clients
            .source
            .head_object()
            .bucket(request.source_bucket)
            .key(&request.source.key)
            .send()
            .await
            .map_err(|error| classify("head source object", error))
    }

    async fn single_copy(&self, request: &CopyRequest<'_>) -> Result<(), CopyError> {
        self.clients
            .destination
            .copy_object()
            .copy_source(copy_source(request))
            .bucket(request.destination_bucket)
            .key(request.destination_key)
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map(|_| ())
            .map_err(|error| classify("copy object", error))
    }

    async fn multipart_copy(
        &self,
        request: &CopyRequest<'_>,
        head: &HeadObjectOutput,
        size: u64,
    ) -> Result<(), CopyError> {
        let client = &self.clients.destination;
        let upload = client
            .create_multipart_upload()
            .bucket(request.destination_bucket)
            .key(request.destination_key)
            .set_content_type(head.content_type().map(str::to_string))
            .set_content_encoding(head.content_encoding().map(str::to_string))
            .set_content_disposition(head.content_disposition().map(str::to_string))
            .set_content_language(head.content_language().map(str::to_string))
            .set_cache_control(head.cache_control().map(str::to_string))
            .set_metadata(head.metadata().cloned())
            .send()
            .await
            .map_err(|error| classify("create multipart upload", error))?;
        let upload_id = upload
            .upload_id()
            .ok_or_else(|| CopyError::Service("multipart upload returned no upload id".to_string()))?
            .to_string();

        let ranges = plan_part_ranges(size, self.tuning.part_size_bytes);
        debug!(
            event = "multipart_copy_planned",
            source_key = %request.source.key,
            destination_key = request.destination_key,
            size,
            parts = ranges.len(),
        );

        let source = copy_source(request);
        let parts = stream::iter(ranges)
            .map(|range| {
                let source = source.clone();
                let upload_id = upload_id.clone();
                async move {
                    let output = client
                        .upload_part_copy()
                        .bucket(request.destination_bucket)
                        .key(request.destination_key)
                        .upload_id(upload_id)
                        .part_number(range.part_number)
                        .copy_source(source)
                        .copy_source_range(range.header_value())
                        .send()
                        .await
                        .map_err(|error| classify("copy part", error))?;
                    Ok::<_, CopyError>(
                        CompletedPart::builder()
                            .part_number(range.part_number)
                            .set_e_tag(
                                output
                                    .copy_part_result()
                                    .and_then(|result| result.e_tag())
                                    .map(str::to_string),
                            )
                            .build(),
                    )
                }
            })
            .buffer_unordered(self.tuning.max_concurrency)
            .try_collect::<Vec<_>>()
            .await;

        let mut parts = match parts {
            Ok(parts) => parts,
            Err(error) => {
                self.abort_upload(request, &upload_id).await;
                return Err(error);
            }
        };
        parts.sort_by_key(|part| part.part_number());

        let completed = client
            .complete_multipart_upload()
            .bucket(request.destination_bucket)
            .key(request.destination_key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await;
        if let Err(error) = completed {
            self.abort_upload(request, &upload_id).await;
            return Err(classify("complete multipart upload", error));
        }
        Ok(())
    }

    async fn abort_upload(&self, request: &CopyRequest<'_>, upload_id: &str) {
        let aborted = self
            .clients
            .destination
            .abort_multipart_upload()
            .bucket(request.destination_bucket)
            .key(request.destination_key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(error) = aborted {
            warn!(
                event = "multipart_abort_failed",
                destination_key = request.destination_key,
                upload_id,
                error = %DisplayErrorContext(&error),
            );
        }
    }
}

impl ObjectCopier for S3Copier {
    fn copy_object(&self, request: &CopyRequest<'_>) -> Result<(), CopyError> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(self.copy_async(request))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyRoute {
    /// Listed size is known to be below the threshold: one `CopyObject`.
    SingleRequest,
    /// Size unknown or large: HEAD the source for its size and metadata first.
    InspectSource,
}

pub fn route_for_listed_size(tuning: &TransferTuning, listed_size: Option<u64>) -> CopyRoute {
    match listed_size {
        Some(size) if !tuning.uses_multipart(size) => CopyRoute::SingleRequest,
        _ => CopyRoute::InspectSource,
    }
}

fn copy_source(request: &CopyRequest<'_>) -> String {
    encode_copy_source(request.source_bucket, &request.source.key)
}

pub fn encode_copy_source(bucket: &str, key: &str) -> String {
    format!("{bucket}/{}", utf8_percent_encode(key, COPY_SOURCE_KEY))
}

/// Requests the SDK could not even build are parameter problems; anything
/// that reached the wire is a service-side failure.
fn classify<E, R>(action: &str, error: SdkError<E, R>) -> CopyError
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let detail = format!("{action}: {}", DisplayErrorContext(&error));
    match error {
        SdkError::ConstructionFailure(_) => CopyError::Validation(detail),
        _ => CopyError::Service(detail),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub part_number: i32,
    pub start: u64,
    pub end_inclusive: u64,
}

impl PartRange {
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end_inclusive)
    }
}

/// Splits `size` bytes into contiguous ranges of `part_size`, growing the
/// part size when needed to stay within the upload part limit.
pub fn plan_part_ranges(size: u64, part_size: u64) -> Vec<PartRange> {
    if size == 0 {
        return Vec::new();
    }
    let part_size = part_size.max(size.div_ceil(MAX_UPLOAD_PARTS)).max(1);

    let mut ranges = Vec::with_capacity(size.div_ceil(part_size) as usize);
    let mut start = 0u64;
    let mut part_number = 1i32;
    while start < size {
        let end_inclusive = (start + part_size).min(size) - 1;
        ranges.push(PartRange {
            part_number,
            start,
            end_inclusive,
        });
        start = end_inclusive + 1;
        part_number += 1;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use replication_core::config::{TransferTuning, GIB, MIB};

    use super::*;

    #[test]
    fn part_ranges_cover_object_without_gaps() {
        let size = 5 * GIB + 123;
        let ranges = plan_part_ranges(size, 100 * MIB);

        assert_eq!(ranges.first().map(|range| range.start), Some(0));
        assert_eq!(ranges.last().map(|range| range.end_inclusive), Some(size - 1));
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end_inclusive + 1, pair[1].start);
            assert_eq!(pair[0].part_number + 1, pair[1].part_number);
        }
        assert_eq!(ranges.len(), 52);
        assert_eq!(ranges[0].part_number, 1);
    }

    #[test]
    fn part_size_grows_to_respect_part_limit() {
        let size = 2_000 * GIB;
        let ranges = plan_part_ranges(size, 100 * MIB);
        assert!(ranges.len() as u64 <= MAX_UPLOAD_PARTS);
        assert_eq!(ranges.last().map(|range| range.end_inclusive), Some(size - 1));
    }

    #[test]
    fn copy_source_escapes_key_but_keeps_separators() {
        assert_eq!(encode_copy_source("src", "a/1.txt"), "src/a/1.txt");
        assert_eq!(
            encode_copy_source("src", "reports/q1 2026+final.csv"),
            "src/reports/q1%202026%2Bfinal.csv"
        );
        assert_eq!(encode_copy_source("src", "ключ"), "src/%D0%BA%D0%BB%D1%8E%D1%87");
    }

    #[test]
    fn listed_size_below_threshold_skips_head() {
        let tuning = TransferTuning::default();
        let threshold = tuning.multipart_threshold_bytes;

        assert_eq!(
            route_for_listed_size(&tuning, Some(threshold - 1)),
            CopyRoute::SingleRequest
        );
        assert_eq!(route_for_listed_size(&tuning, Some(0)), CopyRoute::SingleRequest);
        assert_eq!(
            route_for_listed_size(&tuning, Some(threshold)),
            CopyRoute::InspectSource
        );
        assert_eq!(route_for_listed_size(&tuning, None), CopyRoute::InspectSource);
    }

    #[test]
    fn construction_failure_is_a_validation_error() {
        let error = SdkError::<std::io::Error, ()>::construction_failure("bucket name is empty");

        let classified = classify("copy object", error);
        assert!(matches!(classified, CopyError::Validation(_)));
        assert!(classified.to_string().contains("copy object"));
    }

    #[test]
    fn wire_failures_are_service_errors() {
        let timeout = SdkError::<std::io::Error, ()>::timeout_error("operation timed out");
        assert!(matches!(
            classify("copy part", timeout),
            CopyError::Service(message) if message.starts_with("copy part")
        ));

        let response = SdkError::<std::io::Error, ()>::response_error("truncated body", ());
        assert!(matches!(
            classify("head source object", response),
            CopyError::Service(_)
        ));
    }

    #[test]
    fn empty_object_has_no_parts() {
        assert!(plan_part_ranges(0, 100 * MIB).is_empty());
    }

    #[test]
    fn range_header_is_inclusive() {
        let ranges = plan_part_ranges(10, 4);
        let headers: Vec<String> = ranges.iter().map(PartRange::header_value).collect();
        assert_eq!(headers, vec!["bytes=0-3", "bytes=4-7", "bytes=8-9"]);
    }
}
