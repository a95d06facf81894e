use aws_sdk_dynamodb::error::BuildError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::operation::get_item::GetItemError;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::query::QueryError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use serde_dynamo::Error as SerdeDynamoError;
use std::error::Error as StdError;
use std::fmt;

use crate::query::RangeOperator;

type DynamoPutError = SdkError<PutItemError, Response>;
type DynamoGetError = SdkError<GetItemError, Response>;
type DynamoQueryError = SdkError<QueryError, Response>;
type DynamoDescribeTableError = SdkError<DescribeTableError, Response>;
type DynamoCreateTableError = SdkError<CreateTableError, Response>;

/// Object mapping error
#[derive(Debug)]
pub enum Error {
    /// Serde DynamoDB serialization/deserialization error
    SerdeDynamo(SerdeDynamoError),
    /// DynamoDB request builder error
    BuildError(BuildError),
    /// DynamoDB PutItem operation error
    DynamoPutError(DynamoPutError),
    /// DynamoDB GetItem operation error
    DynamoGetError(DynamoGetError),
    /// DynamoDB Query operation error
    DynamoQueryError(DynamoQueryError),
    /// DynamoDB DescribeTable operation error
    DynamoDescribeTableError(DynamoDescribeTableError),
    /// DynamoDB CreateTable operation error
    DynamoCreateTableError(DynamoCreateTableError),
    /// Malformed or inconsistent table declaration, or a key that does not fit the schema
    Schema(String),
    /// Named index is absent from both the local and the global index lists
    IndexNotFound(String),
    /// Range condition operator token is not one of the supported operators
    InvalidQueryOperator(String),
    /// Range condition carries the wrong number of operands for its operator
    InvalidOperandCount {
        /// Operator of the rejected condition
        operator: RangeOperator,
        /// Operands the operator takes
        expected: usize,
        /// Operands supplied
        found: usize,
    },
    /// Record failed validation or the store rejected the write
    RecordNotSaved {
        /// Human readable reason
        message: String,
        /// Underlying store or marshaling error, if any
        source: Option<Box<Error>>,
    },
    /// No record exists for the requested key
    RecordNotFound(String),
    /// The store has no table with this name
    ResourceNotFound(String),
    /// The store already has a table with this name
    ResourceInUse(String),
    /// The store rejected a malformed request
    Validation(String),
    /// A value does not fit the declared type of its attribute
    Codec(String),
}

impl Error {
    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    /// Check if the error reports a missing table
    ///
    /// `ensure_exists` uses this to decide whether the table has to be created.
    pub fn is_resource_not_found(&self) -> bool {
        matches!(self, Error::ResourceNotFound(_))
    }

    /// Check if the error reports a table that already exists
    pub fn is_resource_in_use(&self) -> bool {
        matches!(self, Error::ResourceInUse(_))
    }

    /// Check if the error is a serialization/deserialization error
    ///
    /// Returns `true` for DynamoDB serialization errors.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, Error::SerdeDynamo(_))
    }

    /// Check if the error is a DynamoDB-related error
    ///
    /// Returns `true` for any DynamoDB SDK operation or request builder error.
    pub fn is_dynamodb_error(&self) -> bool {
        matches!(
            self,
            Error::BuildError(_)
                | Error::DynamoPutError(_)
                | Error::DynamoGetError(_)
                | Error::DynamoQueryError(_)
                | Error::DynamoDescribeTableError(_)
                | Error::DynamoCreateTableError(_)
        )
    }

    /// Check if the error is a [`Error::RecordNotFound`]
    pub fn is_record_not_found(&self) -> bool {
        matches!(self, Error::RecordNotFound(_))
    }

    /// Check if the error is a [`Error::RecordNotSaved`]
    pub fn is_record_not_saved(&self) -> bool {
        matches!(self, Error::RecordNotSaved { .. })
    }
}

macro_rules! impl_from_error {
    ($name:ident, $variant:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$variant(e)
            }
        }
    };
    ($name:ident) => {
        impl From<$name> for Error {
            fn from(e: $name) -> Self {
                Error::$name(e)
            }
        }
    };
}

impl_from_error!(SerdeDynamoError, SerdeDynamo);
impl_from_error!(BuildError);
impl_from_error!(DynamoPutError);
impl_from_error!(DynamoGetError);
impl_from_error!(DynamoQueryError);
impl_from_error!(DynamoDescribeTableError);
impl_from_error!(DynamoCreateTableError);

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::SerdeDynamo(e) => write!(f, "DynamoDB serialization error: {}", e),
            Error::BuildError(e) => write!(f, "DynamoDB request builder error: {}", e),
            Error::DynamoPutError(e) => {
                write!(f, "DynamoDB PutItem operation failed: {}", e)
            }
            Error::DynamoGetError(e) => {
                write!(f, "DynamoDB GetItem operation failed: {}", e)
            }
            Error::DynamoQueryError(e) => {
                write!(f, "DynamoDB Query operation failed: {}", e)
            }
            Error::DynamoDescribeTableError(e) => {
                write!(f, "DynamoDB DescribeTable operation failed: {}", e)
            }
            Error::DynamoCreateTableError(e) => {
                write!(f, "DynamoDB CreateTable operation failed: {}", e)
            }
            Error::Schema(message) => write!(f, "Invalid table schema: {}", message),
            Error::IndexNotFound(name) => write!(f, "No secondary index named {:?}", name),
            Error::InvalidQueryOperator(token) => {
                write!(f, "Invalid query operator {:?}", token)
            }
            Error::InvalidOperandCount {
                operator,
                expected,
                found,
            } => write!(
                f,
                "Operator {} takes {} value(s), {} supplied",
                operator, expected, found
            ),
            Error::RecordNotSaved { message, source } => match source {
                Some(source) => write!(f, "Record not saved: {}: {}", message, source),
                None => write!(f, "Record not saved: {}", message),
            },
            Error::RecordNotFound(message) => f.write_str(message),
            Error::ResourceNotFound(table) => write!(f, "Table {} does not exist", table),
            Error::ResourceInUse(table) => write!(f, "Table {} already exists", table),
            Error::Validation(message) => write!(f, "Request rejected: {}", message),
            Error::Codec(message) => write!(f, "Cannot marshal attribute: {}", message),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::SerdeDynamo(e) => Some(e),
            Error::BuildError(e) => Some(e),
            Error::DynamoPutError(e) => Some(e),
            Error::DynamoGetError(e) => Some(e),
            Error::DynamoQueryError(e) => Some(e),
            Error::DynamoDescribeTableError(e) => Some(e),
            Error::DynamoCreateTableError(e) => Some(e),
            Error::RecordNotSaved {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}
