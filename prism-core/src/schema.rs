//! Schema input, normalization and bucket-schema conversion.
//!
//! A schema arrives either as a full table definition (`{name, displayName,
//! fields}`) or as a bare list of field entries, and each entry is either the
//! full object form or the compact `"name[:type[:flag,flag]]"` string. Both
//! shapes are modelled as untagged enums and normalized right here into
//! [`Schema`] / [`FieldDef`]; nothing past this module sees the raw input.
//!
//! Normalization drops Prism-managed `WPA_` audit fields and renumbers
//! ordinals from 1 in input order.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{PrismError, Result};
use crate::model::{LoadOperation, NewTable, Reference, Table, TableDefinition};

/// Prefix of the audit fields Prism adds to every table.
pub const MANAGED_FIELD_PREFIX: &str = "WPA_";

const FIELD_TYPE_PREFIX: &str = "Schema_Field_Type=";

/// Data type of a table field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TypeRef", into = "TypeRef")]
pub enum FieldType {
    Text,
    Date,
    Numeric,
    Integer,
    Long,
    Boolean,
    Currency,
    Instance,
    MultiInstance,
}

impl FieldType {
    const ALL: [FieldType; 9] = [
        FieldType::Text,
        FieldType::Date,
        FieldType::Numeric,
        FieldType::Integer,
        FieldType::Long,
        FieldType::Boolean,
        FieldType::Currency,
        FieldType::Instance,
        FieldType::MultiInstance,
    ];

    pub fn descriptor(self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Date => "Date",
            FieldType::Numeric => "Numeric",
            FieldType::Integer => "Integer",
            FieldType::Long => "Long",
            FieldType::Boolean => "Boolean",
            FieldType::Currency => "Currency",
            FieldType::Instance => "Instance",
            FieldType::MultiInstance => "Multi_Instance",
        }
    }

    /// Parse a type name such as `integer`, `Multi-Instance` or
    /// `Schema_Field_Type=Text`. Returns `None` for anything unrecognized.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().trim_start_matches(FIELD_TYPE_PREFIX);
        let key: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "string" => return Some(FieldType::Text),
            "int" => return Some(FieldType::Integer),
            "bool" => return Some(FieldType::Boolean),
            "decimal" | "double" | "float" => return Some(FieldType::Numeric),
            _ => {}
        }
        FieldType::ALL.into_iter().find(|t| {
            t.descriptor()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .collect::<String>()
                .eq_ignore_ascii_case(&key)
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor())
    }
}

/// Any of the ways a field type is written on the wire or in schema files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeRef {
    Name(String),
    Object {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        descriptor: Option<String>,
    },
}

impl TypeRef {
    fn resolve(&self) -> Option<FieldType> {
        match self {
            TypeRef::Name(name) => FieldType::from_name(name),
            TypeRef::Object { id, descriptor } => descriptor
                .as_deref()
                .and_then(FieldType::from_name)
                .or_else(|| id.as_deref().and_then(FieldType::from_name)),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Name(name) => f.write_str(name),
            TypeRef::Object { id, descriptor } => write!(
                f,
                "{}",
                descriptor.as_deref().or(id.as_deref()).unwrap_or("<empty>")
            ),
        }
    }
}

impl TryFrom<TypeRef> for FieldType {
    type Error = String;

    fn try_from(value: TypeRef) -> std::result::Result<Self, Self::Error> {
        value
            .resolve()
            .ok_or_else(|| format!("unrecognized field type `{value}`"))
    }
}

impl From<FieldType> for TypeRef {
    fn from(t: FieldType) -> Self {
        TypeRef::Object {
            id: Some(format!("{FIELD_TYPE_PREFIX}{}", t.descriptor())),
            descriptor: Some(t.descriptor().to_string()),
        }
    }
}

/// Canonical field definition, as sent to and returned by the table endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    #[serde(default)]
    pub ordinal: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub external_id: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_object: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            ordinal: 0,
            display_name: Some(name.clone()),
            name,
            field_type,
            required: false,
            external_id: false,
            precision: None,
            scale: None,
            parse_format: None,
            business_object: None,
            description: None,
        }
    }

    pub fn external_id(mut self) -> Self {
        self.external_id = true;
        self
    }

    pub fn is_managed(&self) -> bool {
        self.name.starts_with(MANAGED_FIELD_PREFIX)
    }
}

/// The full object form of a field entry. Every attribute is optional here so
/// that normalization, not deserialization, decides what is missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullFieldEntry {
    pub name: Option<String>,
    pub display_name: Option<String>,
    #[serde(rename = "type")]
    pub field_type: Option<TypeRef>,
    pub required: Option<bool>,
    pub external_id: Option<bool>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub parse_format: Option<String>,
    pub business_object: Option<Reference>,
    pub description: Option<String>,
}

/// One field entry as written by a user: compact string or full object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldEntry {
    Compact(String),
    Full(FullFieldEntry),
}

impl FieldEntry {
    /// Normalize into a [`FieldDef`]. `position` is 1-based and only used in errors.
    pub fn normalize(self, position: usize) -> Result<FieldDef> {
        match self {
            FieldEntry::Compact(spec) => parse_compact(&spec, position),
            FieldEntry::Full(entry) => normalize_full(entry, position),
        }
    }
}

fn normalize_full(entry: FullFieldEntry, position: usize) -> Result<FieldDef> {
    let name = entry
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let field_type = match &entry.field_type {
        Some(type_ref) => Some(type_ref.resolve().ok_or_else(|| {
            PrismError::schema(format!(
                "field #{position}: unrecognized type `{type_ref}`"
            ))
        })?),
        None => None,
    };

    let name = match (name, field_type) {
        (None, None) => {
            return Err(PrismError::schema(format!(
                "field #{position} has neither a name nor a type"
            )))
        }
        (None, Some(_)) => {
            return Err(PrismError::schema(format!("field #{position} has no name")))
        }
        (Some(name), _) => name,
    };

    let mut field = FieldDef::new(name, field_type.unwrap_or(FieldType::Text));
    if let Some(display_name) = entry.display_name.filter(|d| !d.is_empty()) {
        field.display_name = Some(display_name);
    }
    field.required = entry.required.unwrap_or(false);
    field.external_id = entry.external_id.unwrap_or(false);
    field.precision = entry.precision;
    field.scale = entry.scale;
    field.parse_format = entry.parse_format.filter(|p| !p.is_empty());
    field.business_object = entry.business_object;
    field.description = entry.description;
    Ok(field)
}

fn parse_compact(spec: &str, position: usize) -> Result<FieldDef> {
    let mut parts = spec.splitn(3, ':');
    let name = parts.next().unwrap_or_default().trim();
    let type_name = parts.next().map(str::trim).unwrap_or_default();
    let flags = parts.next().unwrap_or_default();

    if name.is_empty() {
        return Err(PrismError::schema(format!(
            "field #{position}: compact entry `{spec}` has no name"
        )));
    }
    let field_type = if type_name.is_empty() {
        FieldType::Text
    } else {
        FieldType::from_name(type_name).ok_or_else(|| {
            PrismError::schema(format!(
                "field #{position}: unrecognized type `{type_name}` in `{spec}`"
            ))
        })?
    };

    let mut field = FieldDef::new(name, field_type);
    for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
        match flag.to_ascii_lowercase().as_str() {
            "externalid" | "key" => field.external_id = true,
            "required" => field.required = true,
            other => {
                return Err(PrismError::schema(format!(
                    "field #{position}: unknown flag `{other}` in `{spec}`"
                )))
            }
        }
    }
    Ok(field)
}

/// Table-level wrapper around a field list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSchemaInput {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub enable_for_analysis: Option<bool>,
    pub fields: Vec<FieldEntry>,
}

/// A schema exactly as supplied by a user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SchemaInput {
    Fields(Vec<FieldEntry>),
    Table(TableSchemaInput),
}

/// A normalized schema: canonical fields plus optional table attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    pub id: Option<String>,
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub enable_for_analysis: Option<bool>,
    pub fields: Vec<FieldDef>,
}

impl Schema {
    /// Parse and normalize a schema document.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| PrismError::schema(format!("invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let input: SchemaInput = serde_json::from_value(value).map_err(|_| {
            PrismError::schema(
                "expected a list of fields or an object with a `fields` list (fields are objects or `name:type` strings)",
            )
        })?;
        Self::normalize(input)
    }

    pub fn normalize(input: SchemaInput) -> Result<Self> {
        let (mut schema, entries) = match input {
            SchemaInput::Fields(entries) => (Schema::default(), entries),
            SchemaInput::Table(table) => (
                Schema {
                    id: table.id,
                    name: table.name,
                    display_name: table.display_name,
                    description: table.description,
                    enable_for_analysis: table.enable_for_analysis,
                    fields: Vec::new(),
                },
                table.fields,
            ),
        };

        schema.fields = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| entry.normalize(i + 1))
            .collect::<Result<Vec<_>>>()?;
        schema.fixup()?;
        debug!(fields = schema.fields.len(), "Normalized schema");
        Ok(schema)
    }

    /// Build a schema directly from canonical fields.
    pub fn from_fields(fields: Vec<FieldDef>) -> Result<Self> {
        let mut schema = Schema {
            fields,
            ..Schema::default()
        };
        schema.fixup()?;
        Ok(schema)
    }

    /// Drop managed fields, reject duplicates and renumber ordinals.
    fn fixup(&mut self) -> Result<()> {
        self.fields.retain(|f| !f.is_managed());
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(PrismError::schema(format!(
                    "duplicate field name `{}`",
                    field.name
                )));
            }
        }
        for (i, field) in self.fields.iter_mut().enumerate() {
            field.ordinal = (i + 1) as u32;
        }
        Ok(())
    }

    pub fn external_id_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.external_id)
    }

    /// Fail unless `operation` can run against this schema.
    pub fn check_operation(&self, operation: LoadOperation) -> Result<()> {
        if operation.requires_operation_key() && self.external_id_fields().next().is_none() {
            return Err(PrismError::schema(format!(
                "operation {operation} requires a field marked externalId"
            )));
        }
        Ok(())
    }

    /// Replace same-named fields and append new ones, keeping existing order.
    pub fn merge_fields(&mut self, updates: Vec<FieldDef>) -> Result<()> {
        for update in updates {
            match self.fields.iter_mut().find(|f| f.name == update.name) {
                Some(existing) => *existing = update,
                None => self.fields.push(update),
            }
        }
        self.fixup()
    }

    /// Body for the create-table call. An explicit `name` wins over the schema's own.
    pub fn to_new_table(&self, name: Option<&str>) -> Result<NewTable> {
        let name = name
            .or(self.name.as_deref())
            .map(|n| n.trim().replace(' ', "_"))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PrismError::schema("a table name is required"))?;
        if self.fields.is_empty() {
            return Err(PrismError::schema("a table needs at least one field"));
        }
        Ok(NewTable {
            display_name: self.display_name.clone().unwrap_or_else(|| name.clone()),
            name,
            description: self.description.clone(),
            enable_for_analysis: self.enable_for_analysis,
            fields: self.fields.clone(),
        })
    }

    /// Body for the update-table call against `table`.
    pub fn to_definition(&self, table: &Table) -> TableDefinition {
        TableDefinition {
            id: table.id.clone(),
            name: table.name.clone(),
            display_name: table.display_name.clone(),
            fields: self.fields.clone(),
        }
    }
}

impl Table {
    /// The table's own schema, with managed fields removed.
    pub fn to_schema(&self) -> Result<Schema> {
        let mut schema = Schema::from_fields(self.fields.clone())?;
        schema.id = Some(self.id.clone());
        schema.name = Some(self.name.clone());
        schema.display_name = self.display_name.clone();
        Ok(schema)
    }
}

/// Load and normalize a schema from a `.json` or `.csv` file.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    let schema = match extension.as_deref() {
        Some("json") => Schema::from_json(&std::fs::read_to_string(path)?)?,
        Some("csv") => Schema::from_csv(std::fs::File::open(path)?)?,
        _ => {
            return Err(PrismError::schema(format!(
                "schema file {} must have a .json or .csv extension",
                path.display()
            )))
        }
    };
    info!(path = %path.display(), fields = schema.fields.len(), "Loaded schema file");
    Ok(schema)
}

/// Header of a CSV schema file, one field per row below it.
pub const CSV_COLUMNS: [&str; 10] = [
    "name",
    "displayName",
    "ordinal",
    "type",
    "businessObject",
    "precision",
    "scale",
    "parseFormat",
    "required",
    "externalId",
];

/// One row of a CSV schema file. Every column is optional; `ordinal` is
/// written out but ignored on read since rows are numbered in file order.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CsvFieldRow {
    name: Option<String>,
    display_name: Option<String>,
    ordinal: Option<u32>,
    #[serde(rename = "type")]
    field_type: Option<String>,
    business_object: Option<String>,
    precision: Option<String>,
    scale: Option<String>,
    parse_format: Option<String>,
    required: Option<String>,
    external_id: Option<String>,
}

impl CsvFieldRow {
    fn into_entry(self, position: usize) -> Result<FieldEntry> {
        let number = |column: &str, value: Option<String>| -> Result<Option<u32>> {
            match non_empty(value) {
                None => Ok(None),
                Some(v) => v.parse().map(Some).map_err(|_| {
                    PrismError::schema(format!("field #{position}: {column} `{v}` is not a number"))
                }),
            }
        };
        let flag = |column: &str, value: Option<String>| -> Result<Option<bool>> {
            match non_empty(value).map(|v| v.to_ascii_lowercase()) {
                None => Ok(None),
                Some(v) if v == "true" => Ok(Some(true)),
                Some(v) if v == "false" => Ok(Some(false)),
                Some(v) => Err(PrismError::schema(format!(
                    "field #{position}: {column} `{v}` is not true or false"
                ))),
            }
        };
        Ok(FieldEntry::Full(FullFieldEntry {
            precision: number("precision", self.precision)?,
            scale: number("scale", self.scale)?,
            required: flag("required", self.required)?,
            external_id: flag("externalId", self.external_id)?,
            name: non_empty(self.name),
            display_name: non_empty(self.display_name),
            field_type: non_empty(self.field_type).map(TypeRef::Name),
            business_object: non_empty(self.business_object).map(Reference::id),
            parse_format: non_empty(self.parse_format),
            description: None,
        }))
    }
}

impl From<&FieldDef> for CsvFieldRow {
    fn from(f: &FieldDef) -> Self {
        Self {
            name: Some(f.name.clone()),
            display_name: f.display_name.clone(),
            ordinal: Some(f.ordinal),
            field_type: Some(f.field_type.descriptor().to_string()),
            business_object: f.business_object.as_ref().map(|r| r.id.clone()),
            precision: f.precision.map(|p| p.to_string()),
            scale: f.scale.map(|s| s.to_string()),
            parse_format: f.parse_format.clone(),
            required: Some(f.required.to_string()),
            external_id: Some(f.external_id.to_string()),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Schema {
    /// Parse a CSV schema: a header row naming any of [`CSV_COLUMNS`], then one field per row.
    pub fn from_csv<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = Vec::new();
        for (i, row) in reader.deserialize::<CsvFieldRow>().enumerate() {
            let row = row.map_err(|e| PrismError::schema(format!("invalid CSV schema: {e}")))?;
            entries.push(row.into_entry(i + 1)?);
        }
        Self::normalize(SchemaInput::Fields(entries))
    }

    /// Write the fields as a CSV schema that [`Schema::from_csv`] reads back.
    pub fn write_csv<W: std::io::Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(out);
        writer
            .write_record(CSV_COLUMNS)
            .map_err(std::io::Error::from)?;
        for field in &self.fields {
            writer
                .serialize(CsvFieldRow::from(field))
                .map_err(std::io::Error::from)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// A field as the bucket-create call expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketField {
    pub ordinal: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub use_as_operation_key: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_object: Option<Reference>,
}

impl From<&FieldDef> for BucketField {
    fn from(f: &FieldDef) -> Self {
        Self {
            ordinal: f.ordinal,
            name: f.name.clone(),
            field_type: f.field_type,
            use_as_operation_key: f.external_id,
            precision: f.precision,
            scale: f.scale,
            parse_format: f.parse_format.clone(),
            business_object: f.business_object.clone(),
        }
    }
}

/// Schema section of the bucket-create call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketSchema {
    pub schema_version: Reference,
    pub parse_options: Value,
    pub fields: Vec<BucketField>,
}

impl BucketSchema {
    /// Comma-delimited, double-quote enclosed UTF-8 with one header line.
    pub fn default_parse_options() -> Value {
        json!({
            "fieldsDelimitedBy": ",",
            "fieldsEnclosedBy": "\"",
            "headerLinesToIgnore": 1,
            "charset": {"id": "Encoding=UTF-8"},
            "type": {"id": "Schema_File_Type=Delimited"},
        })
    }

    pub fn from_schema(schema: &Schema, parse_options: Option<Value>) -> Self {
        Self {
            schema_version: Reference::id("Schema_Version=1.0"),
            parse_options: parse_options.unwrap_or_else(Self::default_parse_options),
            fields: schema
                .fields
                .iter()
                .filter(|f| !f.is_managed())
                .map(BucketField::from)
                .collect(),
        }
    }

    /// Convert a describe-table response, keeping the table's parse options if it has any.
    pub fn from_table(table: &Table) -> Result<Self> {
        let schema = table.to_schema()?;
        Ok(Self::from_schema(
            &schema,
            table.extra.get("parseOptions").cloned(),
        ))
    }

    pub fn has_operation_key(&self) -> bool {
        self.fields.iter().any(|f| f.use_as_operation_key)
    }
}
