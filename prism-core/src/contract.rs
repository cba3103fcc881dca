//! # contract: the Prism REST surface as a trait
//!
//! [`PrismApi`] lists every table and bucket endpoint this crate calls. The
//! HTTP implementation lives in [`crate::client::PrismClient`]; the workflow in
//! [`crate::workflow`] is written against the trait so it can be driven by the
//! `mockall`-generated `MockPrismApi` in tests.
//!
//! Implementations must map every non-2xx response to
//! [`PrismError::Api`](crate::error::PrismError::Api) and must not retry.

use async_trait::async_trait;
use serde_json::Value;

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::error::Result;
use crate::model::{
    Bucket, BucketList, BucketQuery, NewBucket, NewTable, Table, TableDefinition, TableList,
    TableQuery, UploadFile,
};

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PrismApi: Send + Sync {
    /// List tables matching `query`. Direct id lookups return a one-element listing.
    async fn list_tables(&self, query: &TableQuery) -> Result<TableList>;

    /// Full definition of one table, fields included.
    async fn describe_table(&self, id: &str) -> Result<Table>;

    async fn create_table(&self, table: &NewTable) -> Result<Table>;

    /// Replace a table's definition.
    async fn update_table(&self, id: &str, definition: &TableDefinition) -> Result<Table>;

    async fn list_buckets(&self, query: &BucketQuery) -> Result<BucketList>;

    async fn describe_bucket(&self, id: &str) -> Result<Bucket>;

    async fn create_bucket(&self, bucket: &NewBucket) -> Result<Bucket>;

    /// Upload one gzip file into a bucket. One HTTP request per call.
    async fn upload_file(&self, bucket_id: &str, file: &UploadFile) -> Result<Value>;

    /// Ask the server to ingest everything uploaded to the bucket. Terminal for the bucket.
    async fn complete_bucket(&self, bucket_id: &str) -> Result<Value>;

    /// Rows that failed to load, as the CSV text the server produces.
    async fn error_file(&self, bucket_id: &str) -> Result<String>;
}
