/// Test helpers and fixtures for mapper integration tests
///
/// Shared record types, schemas, and a store wrapper that counts and
/// perturbs store calls.
pub mod fixtures;

pub use dynamo_mapper::{
    AttributeType, Error, GetOptions, IndexDefinition, Item, Mapper, MemoryStore, PutOptions,
    QueryOptions, RangeCondition, Record, SchemaBuilder, Store, TableSchema, setup,
};
pub use serde::{Deserialize, Serialize};

// Re-export common fixtures
pub use fixtures::{CountingStore, Message, message_schema};

#[allow(unused_imports)]
pub use fixtures::{Account, account_schema};

use rusty_ulid::generate_ulid_string;

/// Generate a unique table name for isolation
///
/// Tests against a shared endpoint never see each other's tables.
#[allow(dead_code)]
pub fn unique_table(name: &str) -> String {
    format!("{}_{}", name, generate_ulid_string().to_lowercase())
}

/// Message mapper over a fresh in-memory table
#[allow(dead_code)]
pub async fn memory_messages() -> Mapper<Message, MemoryStore> {
    setup::register(MemoryStore::new(), message_schema("messages"))
        .await
        .unwrap()
}

/// Build a message with a body and an author
#[allow(dead_code)]
pub fn message(thread_id: &str, posted_at: u64, author: &str) -> Message {
    Message {
        thread_id: thread_id.into(),
        posted_at,
        author: Some(author.into()),
        body: Some(format!("{} at {}", author, posted_at)),
        score: None,
    }
}
