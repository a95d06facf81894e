//! Declarative table definitions.
//!
//! A [`SchemaBuilder`] collects typed attribute declarations, the primary key,
//! secondary indexes and provisioning settings, and [`SchemaBuilder::build`]
//! turns them into an immutable [`TableSchema`].
//!
//! ```
//! use dynamo_mapper::schema::{AttributeType, IndexDefinition, SchemaBuilder};
//!
//! let schema = SchemaBuilder::new("Messages")
//!     .hash_key("thread_id", AttributeType::String)
//!     .range_key("posted_at", AttributeType::Numeric)
//!     .string("author")
//!     .binary("body")
//!     .local_index(IndexDefinition::local("by_author").range_key("author"))
//!     .provisioned_throughput(1, 1)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(schema.hash_key().unwrap().attribute_name, "thread_id");
//! ```

use aws_sdk_dynamodb::types::{AttributeValue, ScalarAttributeType, StreamViewType};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::Error;

/// Scalar type of a declared attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    /// `S`
    String,
    /// `N`
    Numeric,
    /// `B`
    Binary,
}

impl AttributeType {
    /// The DynamoDB scalar type code
    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeType::String => "S",
            AttributeType::Numeric => "N",
            AttributeType::Binary => "B",
        }
    }

    /// Whether `value` is a scalar of this type
    pub(crate) fn holds(&self, value: &AttributeValue) -> bool {
        matches!(
            (self, value),
            (AttributeType::String, AttributeValue::S(_))
                | (AttributeType::Numeric, AttributeValue::N(_))
                | (AttributeType::Binary, AttributeValue::B(_))
        )
    }
}

impl From<AttributeType> for ScalarAttributeType {
    fn from(ty: AttributeType) -> Self {
        match ty {
            AttributeType::String => ScalarAttributeType::S,
            AttributeType::Numeric => ScalarAttributeType::N,
            AttributeType::Binary => ScalarAttributeType::B,
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of an attribute in a key schema
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Partition key
    Hash,
    /// Sort key
    Range,
}

/// A declared attribute and its scalar type
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDefinition {
    /// Attribute name as stored
    pub name: String,
    /// Declared scalar type
    pub attribute_type: AttributeType,
}

/// One element of a key schema
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySchemaElement {
    /// Attribute the key is built from
    pub attribute_name: String,
    /// Hash or range
    pub key_type: KeyType,
}

impl KeySchemaElement {
    fn new(attribute_name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            attribute_name: attribute_name.into(),
            key_type,
        }
    }
}

/// First element with the hash role
pub(crate) fn hash_key_of(key_schema: &[KeySchemaElement]) -> Option<&KeySchemaElement> {
    key_schema.iter().find(|key| key.key_type == KeyType::Hash)
}

/// First element with the range role
pub(crate) fn range_key_of(key_schema: &[KeySchemaElement]) -> Option<&KeySchemaElement> {
    key_schema.iter().find(|key| key.key_type == KeyType::Range)
}

/// Read/write capacity units
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Throughput {
    /// Read capacity units
    pub read_capacity_units: i64,
    /// Write capacity units
    pub write_capacity_units: i64,
}

/// Local or global secondary index
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// Shares the table hash key, different range key
    Local,
    /// Independent hash and range keys
    Global,
}

/// A secondary index and its key schema
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name
    pub name: String,
    /// Local or global
    pub kind: IndexKind,
    /// Ordered key schema, hash first
    pub key_schema: Vec<KeySchemaElement>,
    /// Capacity for global indexes on provisioned tables
    pub throughput: Option<Throughput>,
}

impl IndexDefinition {
    /// Start a local secondary index definition
    ///
    /// The table hash key is filled in at build time unless one is given.
    pub fn local(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Local)
    }

    /// Start a global secondary index definition
    pub fn global(name: impl Into<String>) -> Self {
        Self::new(name, IndexKind::Global)
    }

    fn new(name: impl Into<String>, kind: IndexKind) -> Self {
        Self {
            name: name.into(),
            kind,
            key_schema: Vec::new(),
            throughput: None,
        }
    }

    /// Set the index hash key attribute
    pub fn hash_key(mut self, attribute_name: impl Into<String>) -> Self {
        self.key_schema.retain(|key| key.key_type != KeyType::Hash);
        self.key_schema
            .insert(0, KeySchemaElement::new(attribute_name, KeyType::Hash));
        self
    }

    /// Set the index range key attribute
    pub fn range_key(mut self, attribute_name: impl Into<String>) -> Self {
        self.key_schema.retain(|key| key.key_type != KeyType::Range);
        self.key_schema
            .push(KeySchemaElement::new(attribute_name, KeyType::Range));
        self
    }

    /// Set the index capacity (global indexes only)
    pub fn throughput(mut self, read_capacity_units: i64, write_capacity_units: i64) -> Self {
        self.throughput = Some(Throughput {
            read_capacity_units,
            write_capacity_units,
        });
        self
    }

    /// Index hash key element
    pub fn hash_key_element(&self) -> Option<&KeySchemaElement> {
        hash_key_of(&self.key_schema)
    }

    /// Index range key element
    pub fn range_key_element(&self) -> Option<&KeySchemaElement> {
        range_key_of(&self.key_schema)
    }
}

/// Normalized, immutable description of one table
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    attributes: Vec<AttributeDefinition>,
    key_schema: Vec<KeySchemaElement>,
    local_indexes: Vec<IndexDefinition>,
    global_indexes: Vec<IndexDefinition>,
    throughput: Option<Throughput>,
    stream_view_type: Option<StreamViewType>,
    attribute_types: BTreeMap<String, AttributeType>,
}

impl TableSchema {
    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Every declared attribute, in declaration order
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Primary key schema, hash first
    pub fn key_schema(&self) -> &[KeySchemaElement] {
        &self.key_schema
    }

    /// Local secondary indexes
    pub fn local_indexes(&self) -> &[IndexDefinition] {
        &self.local_indexes
    }

    /// Global secondary indexes
    pub fn global_indexes(&self) -> &[IndexDefinition] {
        &self.global_indexes
    }

    /// Provisioned capacity, if declared
    pub fn throughput(&self) -> Option<Throughput> {
        self.throughput
    }

    /// Stream view type, if a stream was declared
    pub fn stream_view_type(&self) -> Option<&StreamViewType> {
        self.stream_view_type.as_ref()
    }

    /// Attribute name to declared type
    pub fn attribute_types(&self) -> &BTreeMap<String, AttributeType> {
        &self.attribute_types
    }

    /// Declared type of one attribute
    pub fn attribute_type(&self, name: &str) -> Option<AttributeType> {
        self.attribute_types.get(name).copied()
    }

    /// Primary hash key element
    pub fn hash_key(&self) -> Option<&KeySchemaElement> {
        hash_key_of(&self.key_schema)
    }

    /// Primary range key element
    pub fn range_key(&self) -> Option<&KeySchemaElement> {
        range_key_of(&self.key_schema)
    }

    /// Definitions of the attributes used by the table or any index key schema
    ///
    /// DynamoDB only accepts key attributes in `CreateTable`.
    pub fn key_attribute_definitions(&self) -> Vec<&AttributeDefinition> {
        let indexes = self.local_indexes.iter().chain(&self.global_indexes);
        let key_names: HashSet<&str> = self
            .key_schema
            .iter()
            .chain(indexes.flat_map(|index| index.key_schema.iter()))
            .map(|key| key.attribute_name.as_str())
            .collect();

        self.attributes
            .iter()
            .filter(|attribute| key_names.contains(attribute.name.as_str()))
            .collect()
    }
}

#[derive(Clone, Debug)]
enum Declaration {
    Attribute(String, AttributeType),
    HashKey(String, AttributeType),
    RangeKey(String, AttributeType),
}

/// Builder for a [`TableSchema`]
///
/// Declarations are recorded in order and checked in [`SchemaBuilder::build`].
#[must_use = "a schema builder does nothing until build() is called"]
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    table_name: String,
    declarations: Vec<Declaration>,
    local_indexes: Vec<IndexDefinition>,
    global_indexes: Vec<IndexDefinition>,
    throughput: Option<Throughput>,
    stream_view_type: Option<StreamViewType>,
}

impl SchemaBuilder {
    /// Start a definition for `table_name`
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            declarations: Vec::new(),
            local_indexes: Vec::new(),
            global_indexes: Vec::new(),
            throughput: None,
            stream_view_type: None,
        }
    }

    /// Declare the hash key attribute
    pub fn hash_key(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.declarations.push(Declaration::HashKey(name.into(), ty));
        self
    }

    /// Declare the range key attribute
    pub fn range_key(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.declarations.push(Declaration::RangeKey(name.into(), ty));
        self
    }

    /// Declare a non-key attribute
    pub fn attribute(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.declarations.push(Declaration::Attribute(name.into(), ty));
        self
    }

    /// Declare a string attribute
    pub fn string(self, name: impl Into<String>) -> Self {
        self.attribute(name, AttributeType::String)
    }

    /// Declare a numeric attribute
    pub fn numeric(self, name: impl Into<String>) -> Self {
        self.attribute(name, AttributeType::Numeric)
    }

    /// Declare a binary attribute
    pub fn binary(self, name: impl Into<String>) -> Self {
        self.attribute(name, AttributeType::Binary)
    }

    /// Provision read/write capacity
    ///
    /// Tables without throughput are created on demand.
    pub fn provisioned_throughput(
        mut self,
        read_capacity_units: i64,
        write_capacity_units: i64,
    ) -> Self {
        self.throughput = Some(Throughput {
            read_capacity_units,
            write_capacity_units,
        });
        self
    }

    /// Enable a change stream with the given view type
    pub fn stream(mut self, view_type: StreamViewType) -> Self {
        self.stream_view_type = Some(view_type);
        self
    }

    /// Add a local secondary index
    pub fn local_index(mut self, index: IndexDefinition) -> Self {
        self.local_indexes.push(IndexDefinition {
            kind: IndexKind::Local,
            ..index
        });
        self
    }

    /// Add a global secondary index
    pub fn global_index(mut self, index: IndexDefinition) -> Self {
        self.global_indexes.push(IndexDefinition {
            kind: IndexKind::Global,
            ..index
        });
        self
    }

    /// Validate the declarations and produce the schema
    pub fn build(self) -> Result<TableSchema, Error> {
        let mut attributes = Vec::with_capacity(self.declarations.len());
        let mut attribute_types = BTreeMap::new();
        let mut key_schema = Vec::with_capacity(2);

        for declaration in self.declarations {
            let (name, ty) = match declaration {
                Declaration::Attribute(name, ty) => (name, ty),
                Declaration::HashKey(name, ty) => {
                    if hash_key_of(&key_schema).is_some() {
                        return Err(Error::schema(format!(
                            "table {} declares more than one hash key",
                            self.table_name
                        )));
                    }
                    key_schema.insert(0, KeySchemaElement::new(name.clone(), KeyType::Hash));
                    (name, ty)
                }
                Declaration::RangeKey(name, ty) => {
                    if range_key_of(&key_schema).is_some() {
                        return Err(Error::schema(format!(
                            "table {} declares more than one range key",
                            self.table_name
                        )));
                    }
                    key_schema.push(KeySchemaElement::new(name.clone(), KeyType::Range));
                    (name, ty)
                }
            };

            if attribute_types.insert(name.clone(), ty).is_some() {
                return Err(Error::schema(format!(
                    "attribute {} is declared more than once in table {}",
                    name, self.table_name
                )));
            }
            attributes.push(AttributeDefinition {
                name,
                attribute_type: ty,
            });
        }

        let Some(table_hash) = hash_key_of(&key_schema).cloned() else {
            return Err(Error::schema(format!(
                "table {} declares no hash key",
                self.table_name
            )));
        };

        let local_indexes = self
            .local_indexes
            .into_iter()
            .map(|index| match index.hash_key_element() {
                Some(_) => index,
                None => index.hash_key(table_hash.attribute_name.clone()),
            })
            .collect::<Vec<_>>();

        for index in &local_indexes {
            let hash = hash_key_of(&index.key_schema).map(|key| key.attribute_name.as_str());
            if hash != Some(table_hash.attribute_name.as_str()) {
                return Err(Error::schema(format!(
                    "local index {} must use the table hash key {}",
                    index.name, table_hash.attribute_name
                )));
            }
        }

        for indexes in [&local_indexes, &self.global_indexes] {
            let mut names = HashSet::new();
            for index in indexes {
                if !names.insert(index.name.as_str()) {
                    return Err(Error::schema(format!(
                        "index {} is declared more than once",
                        index.name
                    )));
                }
                if index.hash_key_element().is_none() {
                    return Err(Error::schema(format!("index {} has no hash key", index.name)));
                }
                for key in &index.key_schema {
                    if !attribute_types.contains_key(&key.attribute_name) {
                        return Err(Error::schema(format!(
                            "index {} references undeclared attribute {}",
                            index.name, key.attribute_name
                        )));
                    }
                }
            }
        }

        if self.throughput.is_none() {
            let provisioned = local_indexes
                .iter()
                .chain(&self.global_indexes)
                .find(|index| index.throughput.is_some());
            if let Some(index) = provisioned {
                return Err(Error::schema(format!(
                    "index {} sets throughput but table {} is billed per request",
                    index.name, self.table_name
                )));
            }
        }

        Ok(TableSchema {
            name: self.table_name,
            attributes,
            key_schema,
            local_indexes,
            global_indexes: self.global_indexes,
            throughput: self.throughput,
            stream_view_type: self.stream_view_type,
            attribute_types,
        })
    }
}
