//! High-level table and bucket operations built on [`PrismApi`].
//!
//! This module strings single API calls into the operations a user actually
//! asks for: resolve a table by name, create a table from a schema file, merge
//! fields into an existing table, and run a bucket through its lifecycle:
//!
//!   1. create the bucket against a table with a load operation,
//!   2. upload each file, one request at a time,
//!   3. complete the bucket.
//!
//! # Responsibilities
//! - Local validation first: schema operation-key checks and file extension
//!   checks fail before any request is sent.
//! - Fail fast: the first error is returned as-is. Nothing is cleaned up or
//!   retried, and a bucket whose upload failed is never completed.
//! - Every step is logged through `tracing`.
//!
//! # Navigation
//! - One-shot load: [`load_table`]
//! - Bucket steps: [`create_bucket`], [`upload_files`], [`complete_bucket`]
//! - Tables: [`resolve_table`], [`copy_table_schema`], [`create_table`],
//!   [`update_table`], [`truncate_table`]

use std::path::PathBuf;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};
use uuid::Uuid;

use crate::contract::PrismApi;
use crate::error::{PrismError, Result};
use crate::model::{
    Bucket, BucketQuery, LoadOperation, NewBucket, Reference, Table, TableQuery, UploadFile,
};
use crate::schema::{BucketSchema, Schema};
use crate::upload::validate_files;

/// Outcome of a create → upload → complete run.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub bucket: Bucket,
    /// Names the files were uploaded under, in upload order.
    pub files: Vec<String>,
    pub completion: Value,
}

/// A fresh bucket name, `cli_` followed by a UUID in hex.
pub fn generate_bucket_name() -> String {
    format!("cli_{}", Uuid::new_v4().simple())
}

/// Find a table by id or by exact API name and return its full description.
pub async fn resolve_table<A>(api: &A, key: &str, by_name: bool) -> Result<Table>
where
    A: PrismApi + ?Sized,
{
    if !by_name {
        return api.describe_table(key).await;
    }
    let listing = api.list_tables(&TableQuery::by_name(key)).await?;
    let found = listing
        .data
        .into_iter()
        .next()
        .ok_or_else(|| PrismError::NotFound {
            kind: "table",
            name: key.to_string(),
        })?;
    info!(table = key, table_id = %found.id, "Resolved table by name");
    api.describe_table(&found.id).await
}

/// Find a bucket by id or by exact name.
pub async fn resolve_bucket<A>(api: &A, key: &str, by_name: bool) -> Result<Bucket>
where
    A: PrismApi + ?Sized,
{
    if !by_name {
        return api.describe_bucket(key).await;
    }
    let query = BucketQuery {
        name: Some(key.to_string()),
        ..BucketQuery::default()
    };
    api.list_buckets(&query)
        .await?
        .data
        .into_iter()
        .next()
        .ok_or_else(|| PrismError::NotFound {
            kind: "bucket",
            name: key.to_string(),
        })
}

/// The fields of an existing table, ready to seed a new table or an update.
///
/// Table attributes (id, name, display name) are left unset.
pub async fn copy_table_schema<A>(api: &A, key: &str, by_name: bool) -> Result<Schema>
where
    A: PrismApi + ?Sized,
{
    let source = resolve_table(api, key, by_name).await?;
    let schema = Schema::from_fields(source.fields)?;
    info!(source = %source.name, fields = schema.fields.len(), "Copied table schema");
    Ok(schema)
}

/// Create a table from a normalized schema. `name` overrides the schema's own name.
pub async fn create_table<A>(api: &A, schema: &Schema, name: Option<&str>) -> Result<Table>
where
    A: PrismApi + ?Sized,
{
    let body = schema.to_new_table(name)?;
    api.create_table(&body).await
}

/// Merge `updates` into the table's current fields by name and store the result.
pub async fn update_table<A>(api: &A, table_id: &str, updates: Schema) -> Result<Table>
where
    A: PrismApi + ?Sized,
{
    let current = api.describe_table(table_id).await?;
    let mut schema = current.to_schema()?;
    schema.merge_fields(updates.fields)?;
    info!(table_id, fields = schema.fields.len(), "Merged field updates");
    api.update_table(table_id, &schema.to_definition(&current)).await
}

/// Create a bucket loading into `table`.
///
/// The bucket schema comes from `schema` when given, otherwise from the
/// table's own fields, which must then already be described. The
/// operation-key check runs before the create call.
pub async fn create_bucket<A>(
    api: &A,
    table: &Table,
    operation: LoadOperation,
    name: Option<String>,
    schema: Option<&Schema>,
) -> Result<Bucket>
where
    A: PrismApi + ?Sized,
{
    let bucket_schema = match schema {
        Some(schema) => {
            schema.check_operation(operation)?;
            BucketSchema::from_schema(schema, table.extra.get("parseOptions").cloned())
        }
        None => {
            table.to_schema()?.check_operation(operation)?;
            BucketSchema::from_table(table)?
        }
    };
    let body = NewBucket {
        name: name.unwrap_or_else(generate_bucket_name),
        operation: operation.reference(),
        target_dataset: Reference::id(table.id.clone()),
        schema: bucket_schema,
    };
    api.create_bucket(&body).await
}

/// Upload every file in order. Stops at the first failure.
pub async fn upload_files<A>(api: &A, bucket_id: &str, paths: &[PathBuf]) -> Result<Vec<String>>
where
    A: PrismApi + ?Sized,
{
    validate_files(paths)?;
    let mut uploaded = Vec::with_capacity(paths.len());
    for path in paths {
        let file = UploadFile::from_path(path)?;
        if let Err(e) = api.upload_file(bucket_id, &file).await {
            error!(bucket_id, file = %file.file_name, error = %e, "Upload failed");
            return Err(e);
        }
        uploaded.push(file.file_name);
    }
    info!(bucket_id, files = uploaded.len(), "Uploaded all files");
    Ok(uploaded)
}

pub async fn complete_bucket<A>(api: &A, bucket_id: &str) -> Result<Value>
where
    A: PrismApi + ?Sized,
{
    let response = api.complete_bucket(bucket_id).await?;
    info!(bucket_id, "Bucket completed");
    Ok(response)
}

/// Create a bucket, upload `paths` and complete it.
///
/// Files are checked before the bucket exists; the bucket is only completed
/// when every upload succeeded.
pub async fn load_table<A>(
    api: &A,
    table: &Table,
    operation: LoadOperation,
    paths: &[PathBuf],
    bucket_name: Option<String>,
    schema: Option<&Schema>,
) -> Result<LoadReport>
where
    A: PrismApi + ?Sized,
{
    validate_files(paths)?;
    let bucket = create_bucket(api, table, operation, bucket_name, schema).await?;
    info!(bucket_id = %bucket.id, table = %table.name, %operation, "Loading table");
    let files = upload_files(api, &bucket.id, paths).await?;
    let completion = complete_bucket(api, &bucket.id).await?;
    Ok(LoadReport {
        bucket,
        files,
        completion,
    })
}

/// Remove every row from `table` by loading one empty file with TruncateAndInsert.
pub async fn truncate_table<A>(api: &A, table: &Table) -> Result<LoadReport>
where
    A: PrismApi + ?Sized,
{
    let bucket = create_bucket(api, table, LoadOperation::TruncateAndInsert, None, None).await?;
    let file = UploadFile::empty()?;
    api.upload_file(&bucket.id, &file).await?;
    let completion = complete_bucket(api, &bucket.id).await?;
    info!(table = %table.name, bucket_id = %bucket.id, "Table truncated");
    Ok(LoadReport {
        bucket,
        files: vec![file.file_name],
        completion,
    })
}
