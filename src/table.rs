//! Table gateway: one schema bound to one store.

use aws_sdk_dynamodb::types::{AttributeValue, TableStatus};
use std::sync::Arc;
use tracing::debug;

use crate::error::Error;
use crate::query::QueryRequest;
use crate::schema::{IndexDefinition, KeySchemaElement, TableSchema, hash_key_of, range_key_of};
use crate::store::{GetOptions, Item, PutOptions, Store};

/// A [`TableSchema`] paired with the store that holds the table
///
/// The schema is shared read-only; cloning a gateway clones the store handle.
#[derive(Clone, Debug)]
pub struct TableGateway<S> {
    schema: Arc<TableSchema>,
    store: S,
}

impl<S: Store> TableGateway<S> {
    /// Bind `schema` to `store`
    pub fn new(store: S, schema: TableSchema) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
        }
    }

    /// Table name
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Table schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Store handle
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Make sure the table exists, creating it from the schema if it does not
    ///
    /// Safe to call repeatedly and concurrently: a create that loses to another
    /// creator counts as success. Returns the table status seen last.
    pub async fn ensure_exists(&self) -> Result<TableStatus, Error> {
        let name = self.schema.name();

        match self.store.describe_table(name).await {
            Ok(status) => {
                debug!(table = name, ?status, "Table exists");
                Ok(status)
            }
            Err(e) if e.is_resource_not_found() => {
                debug!(table = name, "Table not found, creating it");
                match self.store.create_table(&self.schema).await {
                    Ok(()) => {}
                    Err(e) if e.is_resource_in_use() => {
                        debug!(table = name, "Table was created concurrently");
                    }
                    Err(e) => return Err(e),
                }
                self.store.describe_table(name).await
            }
            Err(e) => Err(e),
        }
    }

    /// Hash key of the primary key schema
    pub fn hash_key(&self) -> Result<&KeySchemaElement, Error> {
        self.hash_key_in(self.schema.key_schema())
    }

    /// Hash key of `key_schema`, e.g. an index's
    pub fn hash_key_in<'k>(
        &self,
        key_schema: &'k [KeySchemaElement],
    ) -> Result<&'k KeySchemaElement, Error> {
        hash_key_of(key_schema).ok_or_else(|| {
            Error::schema(format!("no hash key declared for table {}", self.name()))
        })
    }

    /// Range key of the primary key schema, if any
    pub fn range_key(&self) -> Option<&KeySchemaElement> {
        self.schema.range_key()
    }

    /// Range key of `key_schema`, if any
    pub fn range_key_in<'k>(
        &self,
        key_schema: &'k [KeySchemaElement],
    ) -> Option<&'k KeySchemaElement> {
        range_key_of(key_schema)
    }

    /// Local secondary index by name
    pub fn local_index(&self, name: &str) -> Option<&IndexDefinition> {
        self.schema.local_indexes().iter().find(|index| index.name == name)
    }

    /// Global secondary index by name
    pub fn global_index(&self, name: &str) -> Option<&IndexDefinition> {
        self.schema.global_indexes().iter().find(|index| index.name == name)
    }

    /// Build the primary key item for a get
    ///
    /// A range value for a table without a range key is rejected rather than
    /// dropped, as is a missing range value for a table that has one.
    pub fn build_key(
        &self,
        hash_value: AttributeValue,
        range_value: Option<AttributeValue>,
    ) -> Result<Item, Error> {
        let hash = self.hash_key()?;
        let mut key = Item::from([(hash.attribute_name.clone(), hash_value)]);

        match (self.range_key(), range_value) {
            (Some(range), Some(value)) => {
                let _ = key.insert(range.attribute_name.clone(), value);
            }
            (None, None) => {}
            (None, Some(_)) => {
                return Err(Error::schema(format!(
                    "table {} has no range key but a range value was given",
                    self.name()
                )));
            }
            (Some(range), None) => {
                return Err(Error::schema(format!(
                    "table {} needs a value for range key {}",
                    self.name(),
                    range.attribute_name
                )));
            }
        }

        Ok(key)
    }

    /// Fetch one item by key
    pub async fn get_item(&self, key: Item, options: &GetOptions) -> Result<Option<Item>, Error> {
        self.store.get_item(self.name(), key, options).await
    }

    /// Write one item
    pub async fn put_item(&self, item: Item, options: &PutOptions) -> Result<(), Error> {
        self.store.put_item(self.name(), item, options).await
    }

    /// Run a query built for this table
    pub async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        debug!(
            table = self.name(),
            index = request.index_name(),
            condition = %request.expression.condition_text,
            "Querying"
        );
        self.store.query(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeType, IndexDefinition, SchemaBuilder};
    use crate::store::MemoryStore;

    fn posts() -> TableSchema {
        SchemaBuilder::new("Posts")
            .hash_key("forum", AttributeType::String)
            .range_key("posted_at", AttributeType::Numeric)
            .string("author")
            .local_index(IndexDefinition::local("by_author").range_key("author"))
            .global_index(IndexDefinition::global("author_posts").hash_key("author"))
            .build()
            .unwrap()
    }

    fn users() -> TableSchema {
        SchemaBuilder::new("Users")
            .hash_key("id", AttributeType::String)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_key_hash_only() {
        let gateway = TableGateway::new(MemoryStore::new(), users());

        let key = gateway
            .build_key(AttributeValue::S("u1".into()), None)
            .unwrap();
        assert_eq!(
            key,
            Item::from([("id".to_string(), AttributeValue::S("u1".into()))])
        );
    }

    #[test]
    fn test_build_key_rejects_range_on_hash_only_table() {
        let gateway = TableGateway::new(MemoryStore::new(), users());

        let err = gateway
            .build_key(
                AttributeValue::S("u1".into()),
                Some(AttributeValue::N("1".into())),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_build_key_with_range() {
        let gateway = TableGateway::new(MemoryStore::new(), posts());

        let key = gateway
            .build_key(
                AttributeValue::S("rust".into()),
                Some(AttributeValue::N("5".into())),
            )
            .unwrap();
        assert_eq!(key.len(), 2);
        assert_eq!(key["posted_at"], AttributeValue::N("5".into()));

        let err = gateway
            .build_key(AttributeValue::S("rust".into()), None)
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_key_and_index_lookup() {
        let gateway = TableGateway::new(MemoryStore::new(), posts());

        assert_eq!(gateway.hash_key().unwrap().attribute_name, "forum");
        assert_eq!(gateway.range_key().unwrap().attribute_name, "posted_at");
        let hash_only = users();
        assert!(gateway.range_key_in(hash_only.key_schema()).is_none());

        let local = gateway.local_index("by_author").unwrap();
        assert_eq!(gateway.hash_key_in(&local.key_schema).unwrap().attribute_name, "forum");
        assert!(gateway.global_index("by_author").is_none());
        assert!(gateway.global_index("author_posts").is_some());
        assert!(gateway.local_index("missing").is_none());
    }

    #[tokio::test]
    async fn test_ensure_exists_creates_once() {
        let store = MemoryStore::new();
        let gateway = TableGateway::new(store.clone(), posts());

        assert_eq!(gateway.ensure_exists().await.unwrap(), TableStatus::Active);
        assert_eq!(gateway.ensure_exists().await.unwrap(), TableStatus::Active);
        assert_eq!(store.table_names().await, vec!["Posts".to_string()]);
    }
}
