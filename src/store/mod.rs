//! The key/value store client seam.
//!
//! [`Store`] is the small operation set the mapper needs from a store client.
//! [`aws_sdk_dynamodb::Client`] implements it in [`dynamodb`]; [`MemoryStore`]
//! keeps tables in process.

use aws_sdk_dynamodb::types::{AttributeValue, TableStatus};
use std::collections::HashMap;
use std::future::Future;

use crate::error::Error;
use crate::query::QueryRequest;
use crate::schema::TableSchema;

/// DynamoDB implementation
pub mod dynamodb;
/// In-process implementation
pub mod memory;

pub use memory::MemoryStore;

/// One stored row: attribute name to typed value
pub type Item = HashMap<String, AttributeValue>;

/// Options for [`Store::get_item`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Strongly consistent read
    pub consistent_read: Option<bool>,
}

/// Options for [`Store::put_item`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutOptions {
    /// Ask the store to report consumed capacity
    pub return_consumed_capacity: bool,
}

/// Options for [`Store::query`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Strongly consistent read (base table and local indexes only)
    pub consistent_read: Option<bool>,
    /// `Some(false)` returns items in descending range key order
    pub scan_index_forward: Option<bool>,
}

/// Store client operations consumed by the mapper
///
/// Every operation is one request/response; retries, throttling and
/// pagination are the implementation's concern.
pub trait Store: Send + Sync {
    /// Fetch one item by its full primary key
    fn get_item(
        &self,
        table_name: &str,
        key: Item,
        options: &GetOptions,
    ) -> impl Future<Output = Result<Option<Item>, Error>> + Send;

    /// Create or replace one item
    fn put_item(
        &self,
        table_name: &str,
        item: Item,
        options: &PutOptions,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Run a key condition query and return every matching item in store order
    fn query(&self, request: QueryRequest)
    -> impl Future<Output = Result<Vec<Item>, Error>> + Send;

    /// Current table status; [`Error::ResourceNotFound`] when the table is absent
    fn describe_table(
        &self,
        table_name: &str,
    ) -> impl Future<Output = Result<TableStatus, Error>> + Send;

    /// Create a table; [`Error::ResourceInUse`] when it already exists
    fn create_table(&self, schema: &TableSchema)
    -> impl Future<Output = Result<(), Error>> + Send;
}
