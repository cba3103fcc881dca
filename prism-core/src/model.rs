//! Wire types for tables, buckets and list queries.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::PrismError;
use crate::schema::{BucketSchema, FieldDef};

/// A `{id, descriptor}` reference to another Workday object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<String>,
}

impl Reference {
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            descriptor: None,
        }
    }
}

/// A Prism table as returned by the list and describe endpoints.
///
/// Server metadata this client does not interpret is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDef>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A page (or the concatenation of all pages) of a list call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing<T> {
    #[serde(default)]
    pub total: usize,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            total: 0,
            data: Vec::new(),
        }
    }
}

impl<T> Listing<T> {
    pub fn from_items(data: Vec<T>) -> Self {
        Self {
            total: data.len(),
            data,
        }
    }
}

pub type TableList = Listing<Table>;
pub type BucketList = Listing<Bucket>;

/// A bucket: staging area for one batch load into a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_dataset: Option<Reference>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// How uploaded rows affect the existing table data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadOperation {
    #[default]
    TruncateAndInsert,
    Insert,
    Update,
    Upsert,
    Delete,
}

impl LoadOperation {
    pub const ALL: [LoadOperation; 5] = [
        LoadOperation::TruncateAndInsert,
        LoadOperation::Insert,
        LoadOperation::Update,
        LoadOperation::Upsert,
        LoadOperation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LoadOperation::TruncateAndInsert => "TruncateAndInsert",
            LoadOperation::Insert => "Insert",
            LoadOperation::Update => "Update",
            LoadOperation::Upsert => "Upsert",
            LoadOperation::Delete => "Delete",
        }
    }

    /// Update, Upsert and Delete match rows on an external-id field.
    pub fn requires_operation_key(self) -> bool {
        matches!(
            self,
            LoadOperation::Update | LoadOperation::Upsert | LoadOperation::Delete
        )
    }

    pub fn reference(self) -> Reference {
        Reference::id(format!("Operation_Type={}", self.as_str()))
    }
}

impl fmt::Display for LoadOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadOperation {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_start_matches("Operation_Type=");
        LoadOperation::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                PrismError::config(format!(
                    "unknown load operation `{s}` (expected one of Insert, TruncateAndInsert, Update, Upsert, Delete)"
                ))
            })
    }
}

/// Level of detail requested from list/describe endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detail {
    #[default]
    Summary,
    Full,
    Permissions,
}

impl Detail {
    pub fn as_str(self) -> &'static str {
        match self {
            Detail::Summary => "summary",
            Detail::Full => "full",
            Detail::Permissions => "permissions",
        }
    }
}

impl FromStr for Detail {
    type Err = PrismError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summary" => Ok(Detail::Summary),
            "full" => Ok(Detail::Full),
            "permissions" => Ok(Detail::Permissions),
            other => Err(PrismError::config(format!("unknown detail level `{other}`"))),
        }
    }
}

/// Filters for listing tables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableQuery {
    /// Exact API name, or a substring when `search` is set.
    pub name: Option<String>,
    /// Direct lookup by id; overrides every other filter.
    pub id: Option<String>,
    /// Page size; `None` fetches every page. Zero is rejected.
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub detail: Detail,
    pub search: bool,
}

impl TableQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Filters for listing buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketQuery {
    pub id: Option<String>,
    pub name: Option<String>,
    /// Only buckets loading into this table (exact, or substring when `search` is set).
    pub table_name: Option<String>,
    /// Page size; every page is fetched when `None` or when filtering by name or table.
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub detail: Detail,
    pub search: bool,
}

/// Body of the create-table call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTable {
    pub name: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_for_analysis: Option<bool>,
    pub fields: Vec<FieldDef>,
}

/// Body of the update-table (PUT) call: the complete new definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub fields: Vec<FieldDef>,
}

/// Body of the create-bucket call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBucket {
    pub name: String,
    pub operation: Reference,
    pub target_dataset: Reference,
    pub schema: BucketSchema,
}

/// A gzip-compressed CSV ready to be sent to a bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub file_name: String,
    pub content: Vec<u8>,
}
