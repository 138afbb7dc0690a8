use lambda_runtime::{service_fn, Error, LambdaEvent};
use replication_core::config::ReplicationConfig;
use replication_core::contract::CompletionRecord;
use replication_lambda::adapters::s3::{S3Clients, S3Copier, S3SourceListing};
use replication_lambda::handlers::replicate::handle_scheduled_event;
use replication_lambda::telemetry::init_tracing;
use serde_json::Value;
use tracing::error;

struct RuntimeDependencies {
    config: ReplicationConfig,
    listing: S3SourceListing,
    copier: S3Copier,
}

impl RuntimeDependencies {
    async fn load() -> Result<Self, Error> {
        let config = ReplicationConfig::from_env().map_err(|config_error| {
            error!(event = "configuration_invalid", error = %config_error);
            Error::from(config_error)
        })?;
        let clients = S3Clients::from_env(&config).await;
        Ok(Self {
            listing: S3SourceListing::new(
                clients.source.clone(),
                config.source_bucket.clone(),
                &config.prefix_filter,
            ),
            copier: S3Copier::new(clients, config.transfer),
            config,
        })
    }
}

async fn handle_request(
    event: LambdaEvent<Value>,
    deps: &RuntimeDependencies,
) -> Result<CompletionRecord, Error> {
    handle_scheduled_event(&event.payload, &deps.config, &deps.listing, &deps.copier)
        .map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();
    let deps = RuntimeDependencies::load().await?;
    let deps = &deps;
    lambda_runtime::run(service_fn(move |event| async move {
        handle_request(event, deps).await
    }))
    .await
}
