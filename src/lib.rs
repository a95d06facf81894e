//! # DynamoDB Object Mapper
//!
//! Maps plain `serde` types onto DynamoDB hash/range tables:
//! - Declarative table schemas with local and global secondary indexes
//! - Marshaling between domain objects and sparse items, with pluggable
//!   per-type codecs
//! - Key condition queries on tables and indexes, with fixed placeholder
//!   tokens so attribute names and values never reach the expression text
//! - A persistence facade with boolean (`save`, `find`) and raising
//!   (`save_or_fail`, `find_or_fail`) entry points
//!
//! Stores are passed explicitly. [`aws_sdk_dynamodb::Client`] is one;
//! [`MemoryStore`] keeps tables in process for tests and local development.
//!
//! ## Quick Start
//!
//! ```rust
//! use dynamo_mapper::{AttributeType, Error, MemoryStore, Record, SchemaBuilder, RangeCondition};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize)]
//! struct Order {
//!     customer_id: String,
//!     placed_at: u64,
//!     total: Option<u32>,
//! }
//!
//! impl Record for Order {
//!     type Hash = String;
//!     type Range = u64;
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Error> {
//!     let schema = SchemaBuilder::new("orders")
//!         .hash_key("customer_id", AttributeType::String)
//!         .range_key("placed_at", AttributeType::Numeric)
//!         .numeric("total")
//!         .build()?;
//!     let orders = dynamo_mapper::setup::register::<Order, _>(MemoryStore::new(), schema).await?;
//!
//!     let order = Order { customer_id: "c1".into(), placed_at: 1_700_000_000, total: Some(25) };
//!     orders.save_or_fail(&order, &Default::default()).await?;
//!
//!     let found = orders.find(&"c1".to_string(), Some(&1_700_000_000)).await?;
//!     assert!(found.is_some());
//!
//!     let recent = orders
//!         .query(&"c1".to_string(), Some(RangeCondition::from_values(">=", &[1_600_000_000u64])?))
//!         .await?;
//!     assert_eq!(recent.len(), 1);
//!     Ok(())
//! }
//! ```
#![deny(
    warnings,
    bad_style,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_debug_implementations,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_results,
    deprecated,
    unknown_lints,
    unreachable_code,
    unused_mut
)]

mod error;
pub use error::Error;

/// Object marshaling
pub mod marshal;

/// Persistence facade
pub mod mapper;

/// Key condition queries
pub mod query;

/// Table schema declarations
pub mod schema;

/// Start-up wiring
pub mod setup;

/// Store client seam and implementations
pub mod store;

/// Table gateway
pub mod table;

// Re-export main types for convenience
pub use mapper::{Mapper, Record};
pub use marshal::{AttributeCodec, IdentityCodec, Marshaler, NumericStringCodec};
pub use query::{RangeCondition, RangeOperator};
pub use schema::{AttributeType, IndexDefinition, SchemaBuilder, TableSchema};
pub use store::{GetOptions, Item, MemoryStore, PutOptions, QueryOptions, Store};
pub use table::TableGateway;

// Re-export aws-config types for configuration
pub use aws_config::{
    BehaviorVersion, Region, SdkConfig, defaults,
    meta::region::{ProvideRegion, RegionProviderChain},
    retry::{RetryConfig, RetryMode},
    timeout::TimeoutConfig,
};

// Re-export aws-types for advanced configuration
pub use aws_types::sdk_config::Builder as SdkConfigBuilder;
