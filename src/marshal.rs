//! Conversion between domain objects and stored items.
//!
//! Objects are serialized with `serde_dynamo`, then narrowed to the attributes
//! the table declares. Each declared value passes through the
//! [`AttributeCodec`] registered for its [`AttributeType`]; the default codec
//! leaves values untouched.

use aws_sdk_dynamodb::types::AttributeValue;
use bigdecimal::BigDecimal;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_dynamo::{from_item, to_item};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::error::Error;
use crate::schema::{AttributeType, TableSchema};
use crate::store::Item;

/// Per-type encode/decode strategy
pub trait AttributeCodec: Send + Sync + fmt::Debug {
    /// Domain value to stored value
    fn encode(&self, attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error>;

    /// Stored value to domain value
    fn decode(&self, attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error>;
}

/// Passes values through unchanged
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityCodec;

impl AttributeCodec for IdentityCodec {
    fn encode(&self, _attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error> {
        Ok(value)
    }

    fn decode(&self, _attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error> {
        Ok(value)
    }
}

/// Most significant digits a stored number may carry
const MAX_PRECISION: u64 = 38;
/// Decimal exponent range of non-zero stored numbers
const EXPONENT_RANGE: std::ops::RangeInclusive<i64> = -130..=125;

/// Parse `text` as a number DynamoDB can store
///
/// Rejects `NaN` and infinities, more than 38 significant digits, and
/// magnitudes outside `1E-130..=9.99..9E+125`.
pub(crate) fn parse_number(text: &str) -> Option<BigDecimal> {
    let number = BigDecimal::from_str(text).ok()?.normalized();
    let digits = number.digits();
    let (_, scale) = number.as_bigint_and_exponent();
    let exponent = i64::try_from(digits).ok()? - 1 - scale;
    (digits <= MAX_PRECISION && EXPONENT_RANGE.contains(&exponent)).then_some(number)
}

/// Stores numerals held in string fields as DynamoDB numbers
///
/// Encoding turns `S("42")` into `N("42")` and rejects strings that are not
/// numbers DynamoDB can store; decoding turns `N` back into `S` so the field
/// deserializes as a string again.
#[derive(Clone, Copy, Debug, Default)]
pub struct NumericStringCodec;

impl AttributeCodec for NumericStringCodec {
    fn encode(&self, attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error> {
        match value {
            AttributeValue::S(text) => {
                if parse_number(text.trim()).is_none() {
                    return Err(Error::Codec(format!(
                        "{attribute} is declared numeric but holds {text:?}"
                    )));
                }
                Ok(AttributeValue::N(text.trim().to_string()))
            }
            other => Ok(other),
        }
    }

    fn decode(&self, _attribute: &str, value: AttributeValue) -> Result<AttributeValue, Error> {
        match value {
            AttributeValue::N(number) => Ok(AttributeValue::S(number)),
            other => Ok(other),
        }
    }
}

/// Converts domain objects to items and back, using a table's attribute types
#[derive(Clone, Debug, Default)]
pub struct Marshaler {
    codecs: HashMap<AttributeType, Arc<dyn AttributeCodec>>,
    fallback: IdentityCodec,
}

impl Marshaler {
    /// Marshaler with the identity codec for every type
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the codec used for attributes declared with `attribute_type`
    #[must_use]
    pub fn with_codec(
        mut self,
        attribute_type: AttributeType,
        codec: impl AttributeCodec + 'static,
    ) -> Self {
        let _ = self.codecs.insert(attribute_type, Arc::new(codec));
        self
    }

    fn codec(&self, attribute_type: AttributeType) -> &dyn AttributeCodec {
        match self.codecs.get(&attribute_type) {
            Some(codec) => codec.as_ref(),
            None => &self.fallback,
        }
    }

    /// Marshal an object into an item
    ///
    /// Only declared attributes are written; attributes whose value is null
    /// or empty are left out of the item.
    pub fn object_to_item<T: Serialize>(
        &self,
        schema: &TableSchema,
        object: &T,
    ) -> Result<Item, Error> {
        let mut fields: Item = to_item(object)?;
        debug!(table = schema.name(), ?fields, "Marshaling object into item");

        let mut item = Item::with_capacity(schema.attribute_types().len());
        for (name, attribute_type) in schema.attribute_types() {
            let Some(value) = fields.remove(name) else {
                continue;
            };
            if is_empty(&value) {
                continue;
            }
            let value = self.codec(*attribute_type).encode(name, value)?;
            let _ = item.insert(name.clone(), value);
        }

        debug!(table = schema.name(), ?item, "Marshaled item");
        Ok(item)
    }

    /// Unmarshal an item into a new `T`
    ///
    /// Declared attributes missing from the item are left unset, so `T` must
    /// tolerate missing fields (`Option` or `#[serde(default)]`).
    pub fn item_to_object<T: DeserializeOwned>(
        &self,
        schema: &TableSchema,
        mut item: Item,
    ) -> Result<T, Error> {
        debug!(table = schema.name(), ?item, "Unmarshaling item");

        let mut fields = Item::with_capacity(schema.attribute_types().len());
        for (name, attribute_type) in schema.attribute_types() {
            let Some(value) = item.remove(name) else {
                continue;
            };
            if is_empty(&value) {
                continue;
            }
            let value = self.codec(*attribute_type).decode(name, value)?;
            let _ = fields.insert(name.clone(), value);
        }

        Ok(from_item(fields)?)
    }

    /// Encode a key value with the codec of the attribute's declared type
    pub fn encode_key(
        &self,
        schema: &TableSchema,
        attribute: &str,
        value: AttributeValue,
    ) -> Result<AttributeValue, Error> {
        let attribute_type = schema.attribute_type(attribute).ok_or_else(|| {
            Error::schema(format!(
                "key attribute {} is not declared in table {}",
                attribute,
                schema.name()
            ))
        })?;
        self.codec(attribute_type).encode(attribute, value)
    }
}

/// Values the store treats as "no value"
fn is_empty(value: &AttributeValue) -> bool {
    match value {
        AttributeValue::Null(_) => true,
        AttributeValue::S(text) => text.is_empty(),
        AttributeValue::B(bytes) => bytes.as_ref().is_empty(),
        AttributeValue::Ss(set) | AttributeValue::Ns(set) => set.is_empty(),
        AttributeValue::Bs(set) => set.is_empty(),
        _ => false,
    }
}
