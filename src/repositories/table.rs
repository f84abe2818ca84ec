//! Table service capability
//!
//! The event repository needs three calls from the managed table service:
//! describe, create and put. [`TableClient`] narrows DynamoDB down to those so
//! the in-memory client can stand in for it.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, KeySchemaElement, KeyType, ProvisionedThroughput, ScalarAttributeType,
    TableStatus as DynamoTableStatus,
};
use thiserror::Error;
use tracing::debug;

pub use aws_sdk_dynamodb::types::AttributeValue;

/// One stored record, keyed by attribute name
pub type Item = HashMap<String, AttributeValue>;

/// Lifecycle state reported by describe-table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    /// Creating or updating; not yet writable
    Pending,
}

/// Scalar type of a key attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Number,
    String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub kind: AttributeKind,
}

/// Key schema and capacity used when a table has to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table_name: String,
    pub hash_key: KeyAttribute,
    pub range_key: KeyAttribute,
    pub read_capacity_units: i64,
    pub write_capacity_units: i64,
}

/// Table service failures, with "not found" split out from everything else
#[derive(Debug, Clone, Error)]
pub enum TableError {
    #[error("table {table} not found")]
    NotFound { table: String },
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait TableClient: Send + Sync {
    async fn describe_table(&self, table: &str) -> Result<TableStatus, TableError>;

    async fn create_table(&self, schema: &TableSchema) -> Result<(), TableError>;

    async fn put_item(&self, table: &str, item: Item) -> Result<(), TableError>;
}

/// [`TableClient`] backed by the AWS DynamoDB SDK
#[derive(Debug, Clone)]
pub struct DynamoTableClient {
    client: Client,
}

impl DynamoTableClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn scalar_type(kind: AttributeKind) -> ScalarAttributeType {
    match kind {
        AttributeKind::Number => ScalarAttributeType::N,
        AttributeKind::String => ScalarAttributeType::S,
    }
}

fn attribute_definition(key: &KeyAttribute) -> Result<AttributeDefinition, TableError> {
    AttributeDefinition::builder()
        .attribute_name(&key.name)
        .attribute_type(scalar_type(key.kind))
        .build()
        .map_err(|e| TableError::Other(e.to_string()))
}

fn key_schema_element(key: &KeyAttribute, key_type: KeyType) -> Result<KeySchemaElement, TableError> {
    KeySchemaElement::builder()
        .attribute_name(&key.name)
        .key_type(key_type)
        .build()
        .map_err(|e| TableError::Other(e.to_string()))
}

#[async_trait]
impl TableClient for DynamoTableClient {
    async fn describe_table(&self, table: &str) -> Result<TableStatus, TableError> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception())
                {
                    TableError::NotFound {
                        table: table.to_string(),
                    }
                } else {
                    TableError::Other(DisplayErrorContext(&err).to_string())
                }
            })?;

        let status = output.table().and_then(|t| t.table_status());
        debug!(table = %table, status = ?status, "Described DynamoDB table");

        Ok(match status {
            Some(DynamoTableStatus::Active) => TableStatus::Active,
            _ => TableStatus::Pending,
        })
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), TableError> {
        let throughput = ProvisionedThroughput::builder()
            .read_capacity_units(schema.read_capacity_units)
            .write_capacity_units(schema.write_capacity_units)
            .build()
            .map_err(|e| TableError::Other(e.to_string()))?;

        self.client
            .create_table()
            .table_name(&schema.table_name)
            .attribute_definitions(attribute_definition(&schema.hash_key)?)
            .attribute_definitions(attribute_definition(&schema.range_key)?)
            .key_schema(key_schema_element(&schema.hash_key, KeyType::Hash)?)
            .key_schema(key_schema_element(&schema.range_key, KeyType::Range)?)
            .provisioned_throughput(throughput)
            .send()
            .await
            .map_err(|err| TableError::Other(DisplayErrorContext(&err).to_string()))?;

        Ok(())
    }

    async fn put_item(&self, table: &str, item: Item) -> Result<(), TableError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(item))
            .send()
            .await
            .map_err(|err| {
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_resource_not_found_exception())
                {
                    TableError::NotFound {
                        table: table.to_string(),
                    }
                } else {
                    TableError::Other(DisplayErrorContext(&err).to_string())
                }
            })?;

        Ok(())
    }
}
