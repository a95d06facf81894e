//! Persistence facade.
//!
//! A [`Mapper`] ties one [`Record`] type to a [`TableGateway`] and a
//! [`Marshaler`]. Each data outcome has two entry points: `save` / `find`
//! report through their return value, `save_or_fail` / `find_or_fail` raise
//! [`Error::RecordNotSaved`] / [`Error::RecordNotFound`]. Structural errors
//! (schema, operator, index) are raised by both.

use aws_sdk_dynamodb::types::{AttributeValue, TableStatus};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_dynamo::to_attribute_value;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Error;
use crate::marshal::Marshaler;
use crate::query::{QueryBuilder, QueryRequest, RangeCondition};
use crate::schema::TableSchema;
use crate::store::{GetOptions, Item, PutOptions, QueryOptions, Store};
use crate::table::TableGateway;

/// A domain type stored as one item per instance
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// Type of the hash key value
    type Hash: Serialize + fmt::Debug + Send + Sync;

    /// Type of the range key value; any type for hash-only tables
    type Range: Serialize + fmt::Debug + Send + Sync;

    /// Whether the record may be written
    fn is_valid(&self) -> bool {
        true
    }
}

/// Persistence operations for records of type `T` in one table
pub struct Mapper<T, S> {
    gateway: TableGateway<S>,
    marshaler: Arc<Marshaler>,
    record: PhantomData<fn() -> T>,
}

impl<T, S: fmt::Debug> fmt::Debug for Mapper<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("gateway", &self.gateway)
            .field("marshaler", &self.marshaler)
            .finish()
    }
}

impl<T: Record, S: Store> Mapper<T, S> {
    /// Mapper with the default marshaler
    pub fn new(store: S, schema: TableSchema) -> Self {
        Self {
            gateway: TableGateway::new(store, schema),
            marshaler: Arc::new(Marshaler::default()),
            record: PhantomData,
        }
    }

    /// Use `marshaler` instead of the default one
    #[must_use]
    pub fn with_marshaler(mut self, marshaler: Arc<Marshaler>) -> Self {
        self.marshaler = marshaler;
        self
    }

    /// Table schema
    pub fn schema(&self) -> &TableSchema {
        self.gateway.schema()
    }

    /// Underlying table gateway
    pub fn gateway(&self) -> &TableGateway<S> {
        &self.gateway
    }

    /// Marshaler in use
    pub fn marshaler(&self) -> &Marshaler {
        &self.marshaler
    }

    /// Create the table if it does not exist yet
    pub async fn ensure_table(&self) -> Result<TableStatus, Error> {
        self.gateway.ensure_exists().await
    }

    /// Validate and write `record`
    ///
    /// Returns `false` if the record is invalid, in which case nothing is
    /// written, or if marshaling or the write fails.
    pub async fn save(&self, record: &T, options: &PutOptions) -> bool {
        match self.save_or_fail(record, options).await {
            Ok(()) => true,
            Err(e) => {
                warn!(table = self.gateway.name(), error = %e, "Record not saved");
                false
            }
        }
    }

    /// Validate and write `record`, raising [`Error::RecordNotSaved`] on failure
    pub async fn save_or_fail(&self, record: &T, options: &PutOptions) -> Result<(), Error> {
        if !record.is_valid() {
            return Err(Error::RecordNotSaved {
                message: format!(
                    "Record failed validations for table {}",
                    self.gateway.name()
                ),
                source: None,
            });
        }

        let item = self
            .marshaler
            .object_to_item(self.schema(), record)
            .map_err(|e| not_saved(self.gateway.name(), e))?;

        self.gateway
            .put_item(item, options)
            .await
            .map_err(|e| not_saved(self.gateway.name(), e))
    }

    /// Fetch the record stored under `hash` / `range`
    pub async fn find(
        &self,
        hash: &T::Hash,
        range: Option<&T::Range>,
    ) -> Result<Option<T>, Error> {
        self.find_with(hash, range, &GetOptions::default()).await
    }

    /// [`Mapper::find`] with read options
    pub async fn find_with(
        &self,
        hash: &T::Hash,
        range: Option<&T::Range>,
        options: &GetOptions,
    ) -> Result<Option<T>, Error> {
        let key = self.key(hash, range)?;

        match self.gateway.get_item(key, options).await? {
            Some(item) => Ok(Some(self.marshaler.item_to_object(self.schema(), item)?)),
            None => Ok(None),
        }
    }

    /// Fetch the record stored under `hash` / `range`, raising
    /// [`Error::RecordNotFound`] when there is none
    pub async fn find_or_fail(
        &self,
        hash: &T::Hash,
        range: Option<&T::Range>,
    ) -> Result<T, Error> {
        self.find_or_fail_with(hash, range, &GetOptions::default())
            .await
    }

    /// [`Mapper::find_or_fail`] with read options
    pub async fn find_or_fail_with(
        &self,
        hash: &T::Hash,
        range: Option<&T::Range>,
        options: &GetOptions,
    ) -> Result<T, Error> {
        self.find_with(hash, range, options).await?.ok_or_else(|| {
            Error::RecordNotFound(format!(
                "No record with hash_key: {:?} and range_key: {:?} in table {}",
                hash,
                range,
                self.gateway.name()
            ))
        })
    }

    /// Every record with hash key `hash`, in range key order
    pub async fn find_all(&self, hash: &T::Hash) -> Result<Vec<T>, Error> {
        self.query(hash, None).await
    }

    /// Records with hash key `hash` whose range key satisfies `range`
    pub async fn query(
        &self,
        hash: &T::Hash,
        range: Option<RangeCondition>,
    ) -> Result<Vec<T>, Error> {
        self.query_with(hash, range, QueryOptions::default()).await
    }

    /// [`Mapper::query`] with query options
    pub async fn query_with(
        &self,
        hash: &T::Hash,
        range: Option<RangeCondition>,
        options: QueryOptions,
    ) -> Result<Vec<T>, Error> {
        let builder = QueryBuilder::for_table(self.schema());
        let request = builder.build(&self.marshaler, key_value(hash)?, range, options)?;
        self.run(request).await
    }

    /// Query the local or global index `index_name`
    ///
    /// `hash` is the index's hash key value, which for a global index need
    /// not be of type `T::Hash`.
    pub async fn query_index<H: Serialize + ?Sized>(
        &self,
        index_name: &str,
        hash: &H,
        range: Option<RangeCondition>,
    ) -> Result<Vec<T>, Error> {
        self.query_index_with(index_name, hash, range, QueryOptions::default())
            .await
    }

    /// [`Mapper::query_index`] with query options
    pub async fn query_index_with<H: Serialize + ?Sized>(
        &self,
        index_name: &str,
        hash: &H,
        range: Option<RangeCondition>,
        options: QueryOptions,
    ) -> Result<Vec<T>, Error> {
        let builder = QueryBuilder::for_index(self.schema(), index_name)?;
        let request = builder.build(&self.marshaler, key_value(hash)?, range, options)?;
        self.run(request).await
    }

    async fn run(&self, request: QueryRequest) -> Result<Vec<T>, Error> {
        let items = self.gateway.query(request).await?;
        debug!(table = self.gateway.name(), count = items.len(), "Query returned");

        items
            .into_iter()
            .map(|item| self.marshaler.item_to_object(self.schema(), item))
            .collect()
    }

    fn key(&self, hash: &T::Hash, range: Option<&T::Range>) -> Result<Item, Error> {
        let schema = self.schema();
        let hash_key = self.gateway.hash_key()?;
        let hash = self
            .marshaler
            .encode_key(schema, &hash_key.attribute_name, key_value(hash)?)?;

        let range = match (range, self.gateway.range_key()) {
            (Some(value), Some(range_key)) => Some(self.marshaler.encode_key(
                schema,
                &range_key.attribute_name,
                key_value(value)?,
            )?),
            // Left for build_key to reject.
            (Some(value), None) => Some(key_value(value)?),
            (None, _) => None,
        };

        self.gateway.build_key(hash, range)
    }
}

fn key_value<V: Serialize + ?Sized>(value: &V) -> Result<AttributeValue, Error> {
    Ok(to_attribute_value(value)?)
}

fn not_saved(table: &str, source: Error) -> Error {
    Error::RecordNotSaved {
        message: format!("write to table {} failed", table),
        source: Some(Box::new(source)),
    }
}
