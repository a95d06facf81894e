use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
    LocalSecondaryIndex, Projection, ProjectionType, ProvisionedThroughput,
    ReturnConsumedCapacity, ReturnValue, StreamSpecification, TableStatus,
};
use aws_smithy_types_convert::stream::PaginationStreamExt;
use futures_util::TryStreamExt;
use tracing::debug;

use super::{GetOptions, Item, PutOptions, QueryOptions, Store};
use crate::error::Error;
use crate::query::QueryRequest;
use crate::schema::{self, TableSchema, Throughput};

impl Store for Client {
    async fn get_item(
        &self,
        table_name: &str,
        key: Item,
        options: &GetOptions,
    ) -> Result<Option<Item>, Error> {
        let output = self
            .get_item()
            .table_name(table_name)
            .set_key(Some(key))
            .set_consistent_read(options.consistent_read)
            .send()
            .await?;

        Ok(output.item)
    }

    async fn put_item(
        &self,
        table_name: &str,
        item: Item,
        options: &PutOptions,
    ) -> Result<(), Error> {
        let return_consumed_capacity = if options.return_consumed_capacity {
            ReturnConsumedCapacity::Total
        } else {
            ReturnConsumedCapacity::None
        };

        let output = self
            .put_item()
            .table_name(table_name)
            .return_values(ReturnValue::None)
            .return_consumed_capacity(return_consumed_capacity)
            .set_item(Some(item))
            .send()
            .await?;

        if let Some(capacity) = output.consumed_capacity {
            debug!(table = table_name, ?capacity, "PutItem consumed capacity");
        }
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<Vec<Item>, Error> {
        let QueryOptions {
            consistent_read,
            scan_index_forward,
        } = request.options;
        let expression = request.expression;

        // DynamoDB pages at 1MB; drain every page so callers see the full partition.
        self.query()
            .table_name(request.table_name)
            .set_index_name(expression.index_name)
            .key_condition_expression(expression.condition_text)
            .set_expression_attribute_names(Some(expression.attribute_names))
            .set_expression_attribute_values(Some(expression.attribute_values))
            .set_consistent_read(consistent_read)
            .set_scan_index_forward(scan_index_forward)
            .into_paginator()
            .items()
            .send()
            .into_stream_03x()
            .map_err(Error::from)
            .try_collect()
            .await
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableStatus, Error> {
        match self.describe_table().table_name(table_name).send().await {
            Ok(output) => Ok(output
                .table
                .and_then(|table| table.table_status)
                .unwrap_or_else(|| TableStatus::from("UNKNOWN"))),
            Err(e) => {
                if matches!(
                    e.as_service_error(),
                    Some(DescribeTableError::ResourceNotFoundException(_))
                ) {
                    return Err(Error::ResourceNotFound(table_name.to_string()));
                }
                Err(e.into())
            }
        }
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), Error> {
        let mut builder = self
            .create_table()
            .table_name(schema.name())
            .set_key_schema(Some(key_schema(schema.key_schema())?));

        for attribute in schema.key_attribute_definitions() {
            builder = builder.attribute_definitions(
                AttributeDefinition::builder()
                    .attribute_name(&attribute.name)
                    .attribute_type(attribute.attribute_type.into())
                    .build()?,
            );
        }

        builder = match schema.throughput() {
            Some(throughput) => builder.provisioned_throughput(provisioned(throughput)?),
            None => builder.billing_mode(BillingMode::PayPerRequest),
        };

        for index in schema.local_indexes() {
            builder = builder.local_secondary_indexes(
                LocalSecondaryIndex::builder()
                    .index_name(&index.name)
                    .set_key_schema(Some(key_schema(&index.key_schema)?))
                    .projection(projection_all())
                    .build()?,
            );
        }

        for index in schema.global_indexes() {
            // Provisioned tables need capacity on every global index.
            let throughput = index
                .throughput
                .or(schema.throughput())
                .map(provisioned)
                .transpose()?;

            builder = builder.global_secondary_indexes(
                GlobalSecondaryIndex::builder()
                    .index_name(&index.name)
                    .set_key_schema(Some(key_schema(&index.key_schema)?))
                    .projection(projection_all())
                    .set_provisioned_throughput(throughput)
                    .build()?,
            );
        }

        if let Some(view_type) = schema.stream_view_type() {
            builder = builder.stream_specification(
                StreamSpecification::builder()
                    .stream_enabled(true)
                    .stream_view_type(view_type.clone())
                    .build()?,
            );
        }

        debug!(table = schema.name(), "Creating table");

        match builder.send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                if matches!(
                    e.as_service_error(),
                    Some(CreateTableError::ResourceInUseException(_))
                ) {
                    return Err(Error::ResourceInUse(schema.name().to_string()));
                }
                Err(e.into())
            }
        }
    }
}

fn key_schema(elements: &[schema::KeySchemaElement]) -> Result<Vec<KeySchemaElement>, Error> {
    elements
        .iter()
        .map(|element| {
            let key_type = match element.key_type {
                schema::KeyType::Hash => KeyType::Hash,
                schema::KeyType::Range => KeyType::Range,
            };
            KeySchemaElement::builder()
                .attribute_name(&element.attribute_name)
                .key_type(key_type)
                .build()
                .map_err(Error::from)
        })
        .collect()
}

fn provisioned(throughput: Throughput) -> Result<ProvisionedThroughput, Error> {
    Ok(ProvisionedThroughput::builder()
        .read_capacity_units(throughput.read_capacity_units)
        .write_capacity_units(throughput.write_capacity_units)
        .build()?)
}

fn projection_all() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::All)
        .build()
}
