use clap::Parser;
use lambda_runtime::Error;
use replication_core::config::{
    ConfigError, ReplicationConfig, DESTINATION_BUCKET_VAR, DESTINATION_PREFIX_VAR,
    DESTINATION_REGION_VAR, DRY_RUN_VAR, LOOKBACK_MINUTES_VAR, MULTIPART_CONCURRENCY_VAR,
    MULTIPART_PART_SIZE_VAR, MULTIPART_THRESHOLD_VAR, PREFIX_FILTER_VAR, SOURCE_BUCKET_VAR,
};
use replication_core::window::ReplicationWindow;
use replication_lambda::adapters::s3::{S3Clients, S3Copier, S3SourceListing};
use replication_lambda::handlers::replicate::run_replication_pass;
use replication_lambda::telemetry::init_tracing;

/// Flags override the environment variables the Lambda reads; anything not
/// given on the command line falls back to the environment.
#[derive(Parser, Debug, Default)]
#[command(
    name = "replicate_once",
    about = "Run a single replication pass from a shell, outside the Lambda runtime"
)]
struct Cli {
    /// Bucket to list and copy from [env: SOURCE_BUCKET]
    #[arg(long)]
    source_bucket: Option<String>,
    /// Bucket to copy into [env: DESTINATION_BUCKET]
    #[arg(long)]
    destination_bucket: Option<String>,
    /// Region of the destination bucket [env: DESTINATION_REGION]
    #[arg(long)]
    destination_region: Option<String>,
    /// Prepended to every replicated key [env: DESTINATION_PREFIX]
    #[arg(long)]
    destination_prefix: Option<String>,
    /// Only keys starting with this are considered [env: PREFIX_FILTER]
    #[arg(long)]
    prefix_filter: Option<String>,
    /// Length of the replication window [env: LOOKBACK_MINUTES]
    #[arg(long)]
    lookback_minutes: Option<String>,
    /// List and filter only; issue no copies [env: DRY_RUN]
    #[arg(long)]
    dry_run: bool,
    /// [env: MULTIPART_THRESHOLD_BYTES]
    #[arg(long)]
    multipart_threshold_bytes: Option<String>,
    /// [env: MULTIPART_PART_SIZE_BYTES]
    #[arg(long)]
    part_size_bytes: Option<String>,
    /// [env: MULTIPART_MAX_CONCURRENCY]
    #[arg(long)]
    max_concurrency: Option<String>,
}

impl Cli {
    fn flag_value(&self, name: &str) -> Option<String> {
        let value = match name {
            SOURCE_BUCKET_VAR => &self.source_bucket,
            DESTINATION_BUCKET_VAR => &self.destination_bucket,
            DESTINATION_REGION_VAR => &self.destination_region,
            DESTINATION_PREFIX_VAR => &self.destination_prefix,
            PREFIX_FILTER_VAR => &self.prefix_filter,
            LOOKBACK_MINUTES_VAR => &self.lookback_minutes,
            MULTIPART_THRESHOLD_VAR => &self.multipart_threshold_bytes,
            MULTIPART_PART_SIZE_VAR => &self.part_size_bytes,
            MULTIPART_CONCURRENCY_VAR => &self.max_concurrency,
            DRY_RUN_VAR if self.dry_run => return Some("true".to_string()),
            _ => return None,
        };
        value.clone()
    }

    fn resolve_config(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ReplicationConfig, ConfigError> {
        ReplicationConfig::from_lookup(|name| self.flag_value(name).or_else(|| env(name)))
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let config = Cli::parse().resolve_config(|name| std::env::var(name).ok())?;

    let clients = S3Clients::from_env(&config).await;
    let listing = S3SourceListing::new(
        clients.source.clone(),
        config.source_bucket.clone(),
        &config.prefix_filter,
    );
    let copier = S3Copier::new(clients, config.transfer);

    let window = ReplicationWindow::ending_now(config.lookback);
    let record = run_replication_pass(&config, &window, &listing, &copier)?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
