use aws_sdk_dynamodb::types::{AttributeValue, TableStatus};
use bigdecimal::BigDecimal;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{GetOptions, Item, PutOptions, Store};
use crate::error::Error;
use crate::marshal::parse_number;
use crate::query::{QueryRequest, RangeCondition, RangeOperator};
use crate::schema::TableSchema;

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    items: Vec<Item>,
}

impl MemoryTable {
    fn key_of(&self, item: &Item) -> Result<Vec<AttributeValue>, Error> {
        self.schema
            .key_schema()
            .iter()
            .map(|key| {
                item.get(&key.attribute_name).cloned().ok_or_else(|| {
                    Error::Validation(format!(
                        "missing key attribute {} for table {}",
                        key.attribute_name,
                        self.schema.name()
                    ))
                })
            })
            .collect()
    }

    /// Reject key values whose type differs from the declared attribute type
    ///
    /// Covers the table key and every index key present in `item`.
    fn check_key_types(&self, item: &Item) -> Result<(), Error> {
        let index_keys = self
            .schema
            .local_indexes()
            .iter()
            .chain(self.schema.global_indexes())
            .flat_map(|index| index.key_schema.iter());

        for key in self.schema.key_schema().iter().chain(index_keys) {
            let name = key.attribute_name.as_str();
            let (Some(value), Some(ty)) = (item.get(name), self.schema.attribute_type(name)) else {
                continue;
            };
            let valid = match value {
                AttributeValue::N(number) => ty.holds(value) && parse_number(number).is_some(),
                _ => ty.holds(value),
            };
            if !valid {
                return Err(Error::Validation(format!(
                    "key attribute {} of table {} must be of type {}, got {:?}",
                    name,
                    self.schema.name(),
                    ty,
                    value
                )));
            }
        }
        Ok(())
    }

    fn position(&self, key: &[AttributeValue]) -> Option<usize> {
        self.items.iter().position(|item| {
            self.schema
                .key_schema()
                .iter()
                .zip(key)
                .all(|(element, value)| {
                    item.get(&element.attribute_name)
                        .is_some_and(|stored| same_value(stored, value))
                })
        })
    }
}

/// In-process [`Store`] backed by hash maps
///
/// Tables live behind `Arc<RwLock<_>>`, so clones share data. Nothing is
/// persisted; data is lost when the last clone is dropped.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

impl MemoryStore {
    /// Creates a new store with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tables created so far
    pub async fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().await;
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of items stored in `table_name`
    pub async fn item_count(&self, table_name: &str) -> Result<usize, Error> {
        let tables = self.tables.read().await;
        tables
            .get(table_name)
            .map(|table| table.items.len())
            .ok_or_else(|| Error::ResourceNotFound(table_name.to_string()))
    }
}

impl Store for MemoryStore {
    async fn get_item(
        &self,
        table_name: &str,
        key: Item,
        _options: &GetOptions,
    ) -> Result<Option<Item>, Error> {
        let tables = self.tables.read().await;
        let table = tables
            .get(table_name)
            .ok_or_else(|| Error::ResourceNotFound(table_name.to_string()))?;

        if key.len() != table.schema.key_schema().len() {
            return Err(Error::Validation(format!(
                "key for table {} must have exactly {} attribute(s)",
                table_name,
                table.schema.key_schema().len()
            )));
        }

        table.check_key_types(&key)?;
        let key = table.key_of(&key)?;
        Ok(table.position(&key).map(|index| table.items[index].clone()))
    }

    async fn put_item(
        &self,
        table_name: &str,
        item: Item,
        _options: &PutOptions,
    ) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| Error::ResourceNotFound(table_name.to_string()))?;

        table.check_key_types(&item)?;
        let key = table.key_of(&item)?;
        match table.position(&key) {
            Some(index) => table.items[index] = item,
            None => table.items.push(item),
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| Error::ResourceNotFound(request.table_name.clone()))?;

        let condition = &request.key_condition;
        let range_attribute = match (request.index_name(), &condition.range) {
            (_, Some(range)) => Some(range.attribute.as_str()),
            (None, None) => table
                .schema
                .range_key()
                .map(|key| key.attribute_name.as_str()),
            (Some(index_name), None) => table
                .schema
                .local_indexes()
                .iter()
                .chain(table.schema.global_indexes())
                .find(|index| index.name == index_name)
                .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?
                .range_key_element()
                .map(|key| key.attribute_name.as_str()),
        };

        let mut items: Vec<&Item> = table
            .items
            .iter()
            .filter(|item| {
                item.get(&condition.hash_attribute)
                    .is_some_and(|value| same_value(value, &condition.hash_value))
            })
            .filter(|item| match range_attribute {
                // Index queries only see items that carry the index range key.
                Some(attribute) => item.contains_key(attribute),
                None => true,
            })
            .filter(|item| match &condition.range {
                Some(range) => item
                    .get(&range.attribute)
                    .is_some_and(|value| matches_range(value, &range.condition)),
                None => true,
            })
            .collect();

        if let Some(attribute) = range_attribute {
            items.sort_by(|a, b| {
                compare(&a[attribute], &b[attribute]).unwrap_or(Ordering::Equal)
            });
        }
        if request.options.scan_index_forward == Some(false) {
            items.reverse();
        }

        Ok(items.into_iter().cloned().collect())
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, Error> {
        let tables = self.tables.read().await;
        if tables.contains_key(table_name) {
            Ok(TableStatus::Active)
        } else {
            Err(Error::ResourceNotFound(table_name.to_string()))
        }
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), Error> {
        let mut tables = self.tables.write().await;
        if tables.contains_key(schema.name()) {
            return Err(Error::ResourceInUse(schema.name().to_string()));
        }

        let _ = tables.insert(
            schema.name().to_string(),
            MemoryTable {
                schema: schema.clone(),
                items: Vec::new(),
            },
        );
        Ok(())
    }
}

/// Order two scalars the way DynamoDB orders range keys
fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a = BigDecimal::from_str(a).ok()?;
            let b = BigDecimal::from_str(b).ok()?;
            Some(a.cmp(&b))
        }
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        _ => None,
    }
}

/// Key equality, with numbers compared by value (`1.0` and `1` are one key)
fn same_value(a: &AttributeValue, b: &AttributeValue) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn matches_range(value: &AttributeValue, condition: &RangeCondition) -> bool {
    let operands = condition.operands();
    let Some(first) = operands.first() else {
        return false;
    };

    match condition.operator() {
        RangeOperator::Equal => compare(value, first) == Some(Ordering::Equal),
        RangeOperator::LessThan => compare(value, first) == Some(Ordering::Less),
        RangeOperator::LessOrEqual => {
            matches!(compare(value, first), Some(Ordering::Less | Ordering::Equal))
        }
        RangeOperator::GreaterThan => compare(value, first) == Some(Ordering::Greater),
        RangeOperator::GreaterOrEqual => matches!(
            compare(value, first),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        RangeOperator::Between => match operands.get(1) {
            Some(last) => {
                matches!(compare(value, first), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(compare(value, last), Some(Ordering::Less | Ordering::Equal))
            }
            None => false,
        },
        RangeOperator::BeginsWith => match (value, first) {
            (AttributeValue::S(value), AttributeValue::S(prefix)) => value.starts_with(prefix.as_str()),
            (AttributeValue::B(value), AttributeValue::B(prefix)) => {
                value.as_ref().starts_with(prefix.as_ref())
            }
            _ => false,
        },
    }
}
