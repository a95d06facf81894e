/// Common test fixtures and data structures
///
/// Defines reusable record types with their table schemas, and a store
/// wrapper for observing what the mapper sends to the store.
use super::{
    AttributeType, Deserialize, Error, GetOptions, IndexDefinition, Item, MemoryStore,
    PutOptions, Record, SchemaBuilder, Serialize, Store, TableSchema,
};
use aws_sdk_dynamodb::types::TableStatus;
use dynamo_mapper::query::QueryRequest;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Forum message keyed by thread and post time
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Message {
    pub thread_id: String,
    pub posted_at: u64,
    pub author: Option<String>,
    pub body: Option<String>,
    pub score: Option<i64>,
}

impl Record for Message {
    type Hash = String;
    type Range = u64;

    fn is_valid(&self) -> bool {
        self.body.as_deref().is_some_and(|body| !body.is_empty())
    }
}

/// Messages table with a local index on score and a global index on author
pub fn message_schema(table: &str) -> TableSchema {
    SchemaBuilder::new(table)
        .hash_key("thread_id", AttributeType::String)
        .range_key("posted_at", AttributeType::Numeric)
        .string("author")
        .string("body")
        .numeric("score")
        .local_index(IndexDefinition::local("by_score").range_key("score"))
        .global_index(
            IndexDefinition::global("by_author")
                .hash_key("author")
                .range_key("posted_at"),
        )
        .build()
        .unwrap()
}

/// Account keyed by a numeric account number held as a string
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct Account {
    pub account_no: String,
    pub owner: String,
    pub balance: String,
}

impl Record for Account {
    type Hash = String;
    type Range = ();
}

/// Hash-only accounts table with numeric key and balance
pub fn account_schema(table: &str) -> TableSchema {
    SchemaBuilder::new(table)
        .hash_key("account_no", AttributeType::Numeric)
        .string("owner")
        .numeric("balance")
        .build()
        .unwrap()
}

/// [`MemoryStore`] wrapper counting calls, with switches to inject failures
#[derive(Clone, Debug, Default)]
pub struct CountingStore {
    inner: MemoryStore,
    describes: Arc<AtomicUsize>,
    creates: Arc<AtomicUsize>,
    puts: Arc<AtomicUsize>,
    gets: Arc<AtomicUsize>,
    queries: Arc<AtomicUsize>,
    fail_puts: Arc<AtomicBool>,
    lose_create_race: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn describes(&self) -> usize {
        self.describes.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Make every put fail with a validation error
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make create_table behave as if another process created the table first
    pub fn lose_create_race(&self, lose: bool) {
        self.lose_create_race.store(lose, Ordering::SeqCst);
    }
}

impl Store for CountingStore {
    async fn get_item(
        &self,
        table_name: &str,
        key: Item,
        options: &GetOptions,
    ) -> Result<Option<Item>, Error> {
        let _ = self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get_item(table_name, key, options).await
    }

    async fn put_item(
        &self,
        table_name: &str,
        item: Item,
        options: &PutOptions,
    ) -> Result<(), Error> {
        let _ = self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Error::Validation("throughput exceeded".into()));
        }
        self.inner.put_item(table_name, item, options).await
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        let _ = self.queries.fetch_add(1, Ordering::SeqCst);
        self.inner.query(request).await
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, Error> {
        let _ = self.describes.fetch_add(1, Ordering::SeqCst);
        self.inner.describe_table(table_name).await
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), Error> {
        let _ = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.lose_create_race.load(Ordering::SeqCst) {
            self.inner.create_table(schema).await?;
            return Err(Error::ResourceInUse(schema.name().to_string()));
        }
        self.inner.create_table(schema).await
    }
}
