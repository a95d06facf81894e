//! Key condition queries.
//!
//! Attribute names and values never reach the expression text: the condition
//! always reads `#H = :hashKey`, optionally followed by a range fragment over
//! `#R`, `:rangeVal` and `:rangeVal2`, and the real names and values travel in
//! the substitution maps.

use aws_sdk_dynamodb::types::AttributeValue;
use serde::Serialize;
use serde_dynamo::to_attribute_value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::marshal::Marshaler;
use crate::schema::{KeySchemaElement, TableSchema, hash_key_of, range_key_of};
use crate::store::QueryOptions;

/// Placeholder for the hash key attribute name
pub const HASH_ATTR_NAME: &str = "#H";
/// Placeholder for the range key attribute name
pub const RANGE_ATTR_NAME: &str = "#R";
/// Placeholder for the hash key value
pub const HASH_VAL: &str = ":hashKey";
/// Placeholder for the first range operand
pub const RANGE_VAL1: &str = ":rangeVal";
/// Placeholder for the second range operand
pub const RANGE_VAL2: &str = ":rangeVal2";

/// Operators accepted on the range key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RangeOperator {
    /// `=`
    Equal,
    /// `<`
    LessThan,
    /// `<=`
    LessOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterOrEqual,
    /// `BETWEEN a and b`, inclusive
    Between,
    /// `begins_with(attr, prefix)`
    BeginsWith,
}

impl RangeOperator {
    /// Token used in expressions and accepted by [`FromStr`]
    pub fn token(&self) -> &'static str {
        match self {
            RangeOperator::Equal => "=",
            RangeOperator::LessThan => "<",
            RangeOperator::LessOrEqual => "<=",
            RangeOperator::GreaterThan => ">",
            RangeOperator::GreaterOrEqual => ">=",
            RangeOperator::Between => "between",
            RangeOperator::BeginsWith => "begins_with",
        }
    }

    /// Number of operands the operator takes
    pub fn operand_count(&self) -> usize {
        match self {
            RangeOperator::Between => 2,
            _ => 1,
        }
    }

    fn fragment(&self) -> String {
        match self {
            RangeOperator::Between => {
                format!("{RANGE_ATTR_NAME} BETWEEN {RANGE_VAL1} and {RANGE_VAL2}")
            }
            RangeOperator::BeginsWith => format!("begins_with({RANGE_ATTR_NAME}, {RANGE_VAL1})"),
            comparison => format!("{RANGE_ATTR_NAME} {} {RANGE_VAL1}", comparison.token()),
        }
    }
}

impl FromStr for RangeOperator {
    type Err = Error;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token.trim().to_lowercase().as_str() {
            "=" => Ok(RangeOperator::Equal),
            "<" => Ok(RangeOperator::LessThan),
            "<=" => Ok(RangeOperator::LessOrEqual),
            ">" => Ok(RangeOperator::GreaterThan),
            ">=" => Ok(RangeOperator::GreaterOrEqual),
            "between" => Ok(RangeOperator::Between),
            "begins_with" => Ok(RangeOperator::BeginsWith),
            _ => Err(Error::InvalidQueryOperator(token.to_string())),
        }
    }
}

impl fmt::Display for RangeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Operator and operands applied to the range key
///
/// Operand count is checked by the parsing constructors and again when the
/// condition is rendered, before any request is sent.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeCondition {
    operator: RangeOperator,
    operands: Vec<AttributeValue>,
}

impl RangeCondition {
    /// Condition from an operator token such as `"between"` or `">="`
    pub fn new(operator: &str, operands: Vec<AttributeValue>) -> Result<Self, Error> {
        let condition = Self::with_operator(operator.parse()?, operands);
        condition.check_operands()?;
        Ok(condition)
    }

    /// Condition from an operator token and serializable operands
    ///
    /// ```
    /// use dynamo_mapper::query::RangeCondition;
    ///
    /// let condition = RangeCondition::from_values("between", &[1, 5]).unwrap();
    /// assert_eq!(condition.operands().len(), 2);
    /// ```
    pub fn from_values<V: Serialize>(operator: &str, operands: &[V]) -> Result<Self, Error> {
        let operator = operator.parse()?;
        let operands = operands
            .iter()
            .map(|value| to_attribute_value::<_, AttributeValue>(value))
            .collect::<Result<Vec<_>, _>>()?;
        let condition = Self::with_operator(operator, operands);
        condition.check_operands()?;
        Ok(condition)
    }

    /// Condition from an already parsed operator
    pub fn with_operator(operator: RangeOperator, operands: Vec<AttributeValue>) -> Self {
        Self { operator, operands }
    }

    /// `lower <= range <= upper`
    pub fn between(lower: AttributeValue, upper: AttributeValue) -> Self {
        Self::with_operator(RangeOperator::Between, vec![lower, upper])
    }

    /// Range key starts with `prefix`
    pub fn begins_with(prefix: impl Into<String>) -> Self {
        Self::with_operator(
            RangeOperator::BeginsWith,
            vec![AttributeValue::S(prefix.into())],
        )
    }

    /// Single operand comparison
    pub fn compare(operator: RangeOperator, value: AttributeValue) -> Self {
        Self::with_operator(operator, vec![value])
    }

    /// The operator
    pub fn operator(&self) -> RangeOperator {
        self.operator
    }

    /// The operands, in order
    pub fn operands(&self) -> &[AttributeValue] {
        &self.operands
    }

    fn check_operands(&self) -> Result<(), Error> {
        let expected = self.operator.operand_count();
        if self.operands.len() != expected {
            return Err(Error::InvalidOperandCount {
                operator: self.operator,
                expected,
                found: self.operands.len(),
            });
        }
        Ok(())
    }
}

/// Range part of a [`KeyCondition`]
#[derive(Clone, Debug, PartialEq)]
pub struct RangeKeyCondition {
    /// Range key attribute name
    pub attribute: String,
    /// Operator and operands
    pub condition: RangeCondition,
}

/// Structured key condition: hash equality plus an optional range condition
#[derive(Clone, Debug, PartialEq)]
pub struct KeyCondition {
    /// Hash key attribute name
    pub hash_attribute: String,
    /// Hash key value
    pub hash_value: AttributeValue,
    /// Range key condition, if any
    pub range: Option<RangeKeyCondition>,
}

impl KeyCondition {
    /// Render the parameterized expression and its substitution maps
    pub fn to_expression(&self, index_name: Option<String>) -> Result<QueryExpression, Error> {
        let mut builder = KeyConditionBuilder::new()
            .with_hash_key(&self.hash_attribute, self.hash_value.clone());

        if let Some(range) = &self.range {
            builder = builder.with_range_key(&range.attribute, &range.condition)?;
        }

        Ok(builder.build(index_name))
    }
}

/// Parameterized key condition expression, ready for the store
#[derive(Clone, Debug, PartialEq)]
pub struct QueryExpression {
    /// `KeyConditionExpression` text
    pub condition_text: String,
    /// Placeholder to real attribute name
    pub attribute_names: HashMap<String, String>,
    /// Placeholder to value
    pub attribute_values: HashMap<String, AttributeValue>,
    /// Index to query instead of the base table
    pub index_name: Option<String>,
}

struct KeyConditionBuilder {
    expression: String,
    names: HashMap<String, String>,
    values: HashMap<String, AttributeValue>,
}

impl KeyConditionBuilder {
    fn new() -> Self {
        Self {
            expression: String::new(),
            names: HashMap::new(),
            values: HashMap::new(),
        }
    }

    fn with_hash_key(mut self, field: &str, value: AttributeValue) -> Self {
        self.expression = format!("{HASH_ATTR_NAME} = {HASH_VAL}");
        let _ = self
            .names
            .insert(HASH_ATTR_NAME.to_string(), field.to_string());
        let _ = self.values.insert(HASH_VAL.to_string(), value);
        self
    }

    fn with_range_key(mut self, field: &str, condition: &RangeCondition) -> Result<Self, Error> {
        condition.check_operands()?;

        self.expression.push_str(" AND ");
        self.expression.push_str(&condition.operator.fragment());
        let _ = self
            .names
            .insert(RANGE_ATTR_NAME.to_string(), field.to_string());

        for (placeholder, value) in [RANGE_VAL1, RANGE_VAL2].iter().zip(&condition.operands) {
            let _ = self.values.insert(placeholder.to_string(), value.clone());
        }
        Ok(self)
    }

    fn build(self, index_name: Option<String>) -> QueryExpression {
        QueryExpression {
            condition_text: self.expression,
            attribute_names: self.names,
            attribute_values: self.values,
            index_name,
        }
    }
}

/// A complete query, as handed to [`Store::query`](crate::store::Store::query)
#[derive(Clone, Debug, PartialEq)]
pub struct QueryRequest {
    /// Table to query
    pub table_name: String,
    /// Rendered expression and substitutions
    pub expression: QueryExpression,
    /// The condition the expression was rendered from
    pub key_condition: KeyCondition,
    /// Read options
    pub options: QueryOptions,
}

impl QueryRequest {
    /// Index being queried, if any
    pub fn index_name(&self) -> Option<&str> {
        self.expression.index_name.as_deref()
    }
}

/// Resolves the key schema of a table or one of its indexes and builds requests
#[derive(Clone, Debug)]
pub struct QueryBuilder<'a> {
    schema: &'a TableSchema,
    index_name: Option<String>,
    key_schema: &'a [KeySchemaElement],
}

impl<'a> QueryBuilder<'a> {
    /// Builder for base table queries
    pub fn for_table(schema: &'a TableSchema) -> Self {
        Self {
            schema,
            index_name: None,
            key_schema: schema.key_schema(),
        }
    }

    /// Builder for index queries; local indexes are searched before global ones
    pub fn for_index(schema: &'a TableSchema, index_name: &str) -> Result<Self, Error> {
        let index = schema
            .local_indexes()
            .iter()
            .chain(schema.global_indexes())
            .find(|index| index.name == index_name)
            .ok_or_else(|| Error::IndexNotFound(index_name.to_string()))?;

        Ok(Self {
            schema,
            index_name: Some(index.name.clone()),
            key_schema: &index.key_schema,
        })
    }

    /// The resolved key schema
    pub fn key_schema(&self) -> &'a [KeySchemaElement] {
        self.key_schema
    }

    /// Build the request, encoding key values with `marshaler`
    pub fn build(
        &self,
        marshaler: &Marshaler,
        hash_value: AttributeValue,
        range: Option<RangeCondition>,
        options: QueryOptions,
    ) -> Result<QueryRequest, Error> {
        let hash = hash_key_of(self.key_schema).ok_or_else(|| {
            Error::schema(format!("{} has no hash key", self.target_name()))
        })?;
        let hash_value = marshaler.encode_key(self.schema, &hash.attribute_name, hash_value)?;

        let range = match range {
            None => None,
            Some(condition) => {
                let key = range_key_of(self.key_schema).ok_or_else(|| {
                    Error::schema(format!(
                        "{} has no range key to apply {} to",
                        self.target_name(),
                        condition.operator
                    ))
                })?;
                let operands = condition
                    .operands
                    .into_iter()
                    .map(|value| marshaler.encode_key(self.schema, &key.attribute_name, value))
                    .collect::<Result<Vec<_>, Error>>()?;
                Some(RangeKeyCondition {
                    attribute: key.attribute_name.clone(),
                    condition: RangeCondition::with_operator(condition.operator, operands),
                })
            }
        };

        let key_condition = KeyCondition {
            hash_attribute: hash.attribute_name.clone(),
            hash_value,
            range,
        };
        let expression = key_condition.to_expression(self.index_name.clone())?;

        Ok(QueryRequest {
            table_name: self.schema.name().to_string(),
            expression,
            key_condition,
            options,
        })
    }

    fn target_name(&self) -> String {
        match &self.index_name {
            Some(index) => format!("index {} of table {}", index, self.schema.name()),
            None => format!("table {}", self.schema.name()),
        }
    }
}
