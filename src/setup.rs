//! Process start-up wiring: AWS configuration, client construction and
//! table registration.
//!
//! Nothing here is global. Build the client once, pass it (or a clone) to
//! [`register`] for every record type, and keep the returned mappers.

use aws_config::{BehaviorVersion, SdkConfig, defaults};
use aws_sdk_dynamodb::Client;
use aws_types::sdk_config::{RetryConfig, TimeoutConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::Error;
use crate::mapper::{Mapper, Record};
use crate::marshal::Marshaler;
use crate::schema::TableSchema;
use crate::store::Store;

const LOCALSTACK_ENDPOINT: &str = "http://127.0.0.1:4566";

/// Load AWS configuration with the defaults used by this crate
///
/// - Adaptive retry mode with 3 max attempts
/// - Exponential backoff starting at 1 second
/// - Connect timeout: 3 seconds
/// - Read timeout: 20 seconds
/// - Operation timeout: 60 seconds
/// - LocalStack endpoint when `AWS_PROFILE=localstack`
pub async fn sdk_config() -> SdkConfig {
    let timeout_config = TimeoutConfig::builder()
        .connect_timeout(Duration::from_secs(3))
        .read_timeout(Duration::from_secs(20))
        .operation_timeout(Duration::from_secs(60))
        .build();

    let mut loader = defaults(BehaviorVersion::latest())
        .retry_config(
            RetryConfig::adaptive()
                .with_max_attempts(3)
                .with_initial_backoff(Duration::from_secs(1)),
        )
        .timeout_config(timeout_config);

    if std::env::var("AWS_PROFILE").unwrap_or_default() == "localstack" {
        debug!(endpoint = LOCALSTACK_ENDPOINT, "Using LocalStack");
        loader = loader.endpoint_url(LOCALSTACK_ENDPOINT);
    }

    loader.load().await
}

/// DynamoDB client for `config`
///
/// # Example
///
/// ```rust,no_run
/// # async fn example() {
/// let config = dynamo_mapper::defaults(dynamo_mapper::BehaviorVersion::latest())
///     .region(dynamo_mapper::Region::new("us-west-2"))
///     .load()
///     .await;
/// let client = dynamo_mapper::setup::client(&config);
/// # let _ = client;
/// # }
/// ```
pub fn client(config: &SdkConfig) -> Client {
    Client::new(config)
}

/// Make sure the table for `T` exists and return its mapper
pub async fn register<T, S>(store: S, schema: TableSchema) -> Result<Mapper<T, S>, Error>
where
    T: Record,
    S: Store,
{
    register_with(store, schema, Arc::new(Marshaler::default())).await
}

/// [`register`] with a shared marshaler
pub async fn register_with<T, S>(
    store: S,
    schema: TableSchema,
    marshaler: Arc<Marshaler>,
) -> Result<Mapper<T, S>, Error>
where
    T: Record,
    S: Store,
{
    let mapper = Mapper::new(store, schema).with_marshaler(marshaler);
    let status = mapper.ensure_table().await?;
    debug!(table = mapper.schema().name(), ?status, "Registered table");
    Ok(mapper)
}
