//! Command-line interface for `prism`.
//!
//! This module handles argument parsing, configuration loading and output.
//! Everything that talks to Prism lives in the `prism-core` crate; this
//! module only maps subcommands onto [`prism_core::workflow`] and
//! [`prism_core::PrismApi`] calls and prints the results.
//!
//! ## Commands
//! - `prism tables {list|get|create|update|upload|truncate}`
//! - `prism buckets {list|get|create|upload|complete|errors|generate}`
//!
//! Global options (`--base_url`, `--config_file`, ...) may appear anywhere on
//! the line. Results are printed to stdout as pretty JSON unless a command
//! says otherwise.
//!
//! ## Programmatic use
//! [`run`] performs a whole invocation. [`execute`] runs one already-parsed
//! command against any [`PrismApi`], which is how the tests drive it.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use prism_core::config::{ConfigKey, EnvSource};
use prism_core::model::{BucketQuery, Detail, LoadOperation, Table, TableQuery};
use prism_core::schema::{load_schema, Schema};
use prism_core::upload::validate_files;
use prism_core::workflow;
use prism_core::{PrismApi, PrismClient};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::load_config::build_resolver;
use crate::logging;

/// Long options that are also accepted with a single leading dash.
const SINGLE_DASH_LONGS: [&str; 2] = ["operation", "isName"];

/// Load data into Workday Prism Analytics tables.
#[derive(Parser, Debug)]
#[command(name = "prism", version, about = "Manage Workday Prism Analytics tables and load data through buckets")]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection and logging options. Each one overrides the environment and the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// INI file holding connection profiles [default: prism.ini]
    #[arg(long = "config_file", global = true)]
    pub config_file: Option<PathBuf>,

    /// Section of the config file to use [default: default]
    #[arg(long = "config_name", global = true)]
    pub config_name: Option<String>,

    #[arg(long = "base_url", global = true)]
    pub base_url: Option<String>,

    #[arg(long = "tenant_name", global = true)]
    pub tenant_name: Option<String>,

    #[arg(long = "client_id", global = true)]
    pub client_id: Option<String>,

    #[arg(long = "client_secret", global = true)]
    pub client_secret: Option<String>,

    #[arg(long = "refresh_token", global = true)]
    pub refresh_token: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long = "log_file", global = true)]
    pub log_file: Option<PathBuf>,

    /// debug, info, warn (default) or error
    #[arg(long = "log_level", global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List, describe, create, update and load tables
    #[command(subcommand)]
    Tables(TableCommand),
    /// Work with buckets step by step
    #[command(subcommand)]
    Buckets(BucketCommand),
}

impl Commands {
    /// Whether the command has to authenticate against the tenant.
    pub fn needs_connection(&self) -> bool {
        !matches!(self, Commands::Buckets(BucketCommand::Generate))
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    /// One line per table: display name, rows, size, last refresh
    Summary,
    /// Field definitions, reusable as a JSON schema file
    Schema,
    /// Field definitions of the first table, reusable as a CSV schema file
    Csv,
}

impl OutputFormat {
    fn needs_fields(self) -> bool {
        matches!(self, OutputFormat::Schema | OutputFormat::Csv)
    }
}

#[derive(Subcommand, Debug)]
pub enum TableCommand {
    /// List tables
    List {
        /// Exact table name, or a substring with --search
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Page size; all pages are fetched when omitted
        #[arg(long, value_parser = page_size)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        /// summary, full or permissions
        #[arg(long, visible_alias = "type", default_value = "summary")]
        detail: Detail,
        /// Match NAME as a substring of the name or display name
        #[arg(long)]
        search: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
    /// Describe one table, fields included
    Get {
        table: String,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
    },
    /// Create a table from a schema file or by copying another table's fields
    #[command(group(
        ArgGroup::new("schema_source")
            .required(true)
            .args(["file", "source_name", "source_wid"])
    ))]
    Create {
        /// Table name; defaults to the name inside the schema file
        name: Option<String>,
        /// JSON or CSV schema file
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
        /// Copy the fields of the table with this API name
        #[arg(long = "sourceName")]
        source_name: Option<String>,
        /// Copy the fields of the table with this id
        #[arg(long = "sourceWID")]
        source_wid: Option<String>,
        #[arg(long = "display_name", visible_alias = "displayName")]
        display_name: Option<String>,
        #[arg(short = 'e', long = "enabledForAnalysis")]
        enabled_for_analysis: bool,
    },
    /// Add or replace fields of an existing table
    #[command(group(
        ArgGroup::new("schema_source")
            .required(true)
            .args(["file", "source_name", "source_wid"])
    ))]
    Update {
        table: String,
        /// JSON or CSV schema file with the fields to add or replace
        file: Option<PathBuf>,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
        /// Take the fields from the table with this API name
        #[arg(long = "sourceName")]
        source_name: Option<String>,
        /// Take the fields from the table with this id
        #[arg(long = "sourceWID")]
        source_wid: Option<String>,
    },
    /// Load files into a table: create a bucket, upload, complete
    Upload {
        table: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short = 'o', long = "operation", default_value_t = LoadOperation::TruncateAndInsert)]
        operation: LoadOperation,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
        /// Bucket schema to use instead of the table's own fields
        #[arg(short = 's', long = "schema_file")]
        schema_file: Option<PathBuf>,
    },
    /// Remove every row from a table
    Truncate {
        table: String,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum BucketCommand {
    /// List buckets
    List {
        /// Exact bucket name, or a substring with --search
        name: Option<String>,
        #[arg(long)]
        id: Option<String>,
        /// Only buckets loading into this table
        #[arg(long = "table_name")]
        table_name: Option<String>,
        /// Page size; all pages are fetched when omitted or when filtering
        #[arg(long, value_parser = page_size)]
        limit: Option<usize>,
        #[arg(long)]
        offset: Option<usize>,
        #[arg(long)]
        search: bool,
        /// summary or full
        #[arg(long, visible_alias = "type", default_value = "summary")]
        detail: Detail,
    },
    /// Describe one bucket
    Get {
        bucket: String,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
    },
    /// Create a bucket for a table
    Create {
        table: String,
        #[arg(short = 'o', long = "operation", default_value_t = LoadOperation::TruncateAndInsert)]
        operation: LoadOperation,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
        /// Bucket name; a cli_<hex> name is generated when omitted
        #[arg(long = "name")]
        bucket_name: Option<String>,
        /// Bucket schema to use instead of the table's own fields
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,
    },
    /// Upload files into an existing bucket
    Upload {
        bucket: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
        /// Complete the bucket after a successful upload
        #[arg(long)]
        complete: bool,
    },
    /// Start loading a bucket's files into its table
    Complete {
        bucket: String,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
    },
    /// Print the rows a bucket failed to load
    Errors {
        bucket: String,
        #[arg(short = 'n', long = "isName")]
        is_name: bool,
    },
    /// Print a fresh bucket name
    Generate,
}

fn page_size(value: &str) -> std::result::Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

/// Rewrite `-operation` and `-isName` (with or without `=value`) to their
/// double-dash form so clap does not read them as bundled short flags.
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter().map(|arg| normalize_arg(arg.into())).collect()
}

fn normalize_arg(arg: OsString) -> OsString {
    let rewritten = arg.to_str().and_then(|text| {
        SINGLE_DASH_LONGS
            .iter()
            .find(|long| {
                text.strip_prefix('-')
                    .and_then(|rest| rest.strip_prefix(**long))
                    .is_some_and(|tail| tail.is_empty() || tail.starts_with('='))
            })
            .map(|_| format!("-{text}"))
    });
    rewritten.map(OsString::from).unwrap_or(arg)
}

/// Run one full invocation: configuration, logging, authentication, command.
pub async fn run(cli: Cli) -> Result<()> {
    let mut stdout = std::io::stdout();
    if !cli.command.needs_connection() {
        return execute_offline(cli.command, &mut stdout);
    }

    let resolver = build_resolver(&cli.global, EnvSource::from_process())?;
    logging::init(
        resolver.resolve(ConfigKey::LogLevel).as_deref(),
        resolver.resolve(ConfigKey::LogFile).as_deref().map(Path::new),
    )?;
    resolver.trace_loaded();
    let settings = resolver.settings()?;
    settings.trace_loaded();

    preflight(&cli.command)?;
    let client = PrismClient::connect(settings).await?;
    execute(&client, cli.command, &mut stdout).await
}

fn execute_offline(command: Commands, out: &mut dyn Write) -> Result<()> {
    match command {
        Commands::Buckets(BucketCommand::Generate) => {
            writeln!(out, "{}", workflow::generate_bucket_name())?;
            Ok(())
        }
        other => anyhow::bail!("command {other:?} needs a connection"),
    }
}

/// Checks that need no connection: files to upload and schema files named
/// on the command line, including the operation-key check of a bucket schema.
pub fn preflight(command: &Commands) -> Result<()> {
    match command {
        Commands::Tables(TableCommand::Upload {
            files,
            operation,
            schema_file,
            ..
        }) => {
            validate_files(files)?;
            if let Some(path) = schema_file {
                load_schema(path)?.check_operation(*operation)?;
            }
        }
        Commands::Buckets(BucketCommand::Upload { files, .. }) => validate_files(files)?,
        Commands::Buckets(BucketCommand::Create {
            operation,
            file: Some(path),
            ..
        }) => load_schema(path)?.check_operation(*operation)?,
        Commands::Tables(TableCommand::Create { file: Some(path), .. })
        | Commands::Tables(TableCommand::Update { file: Some(path), .. }) => {
            load_schema(path)?;
        }
        _ => {}
    }
    Ok(())
}

/// Run a parsed command against `api`, writing results to `out`.
///
/// [`preflight`] runs first, so local mistakes never reach `api`.
pub async fn execute<A>(api: &A, command: Commands, out: &mut dyn Write) -> Result<()>
where
    A: PrismApi + ?Sized,
{
    preflight(&command)?;
    match command {
        Commands::Tables(cmd) => tables(api, cmd, out).await,
        Commands::Buckets(cmd) => buckets(api, cmd, out).await,
    }
}

async fn tables<A>(api: &A, command: TableCommand, out: &mut dyn Write) -> Result<()>
where
    A: PrismApi + ?Sized,
{
    match command {
        TableCommand::List {
            name,
            id,
            limit,
            offset,
            detail,
            search,
            format,
        } => {
            let detail = if format.needs_fields() {
                Detail::Full
            } else {
                detail
            };
            let query = TableQuery {
                name,
                id,
                limit,
                offset,
                detail,
                search,
            };
            let listing = api.list_tables(&query).await?;
            info!(total = listing.total, "tables list");
            match format {
                OutputFormat::Json => write_json(out, &listing),
                OutputFormat::Summary => {
                    for table in &listing.data {
                        writeln!(out, "{}", summary_line(table))?;
                    }
                    Ok(())
                }
                OutputFormat::Schema => {
                    let mut documents = listing
                        .data
                        .iter()
                        .map(schema_document)
                        .collect::<Result<Vec<_>>>()?;
                    if documents.len() == 1 {
                        write_json(out, &documents.remove(0))
                    } else {
                        write_json(out, &documents)
                    }
                }
                OutputFormat::Csv => match listing.data.first() {
                    Some(table) => Ok(table.to_schema()?.write_csv(&mut *out)?),
                    None => Ok(()),
                },
            }
        }
        TableCommand::Get { table, is_name } => {
            let table = workflow::resolve_table(api, &table, is_name).await?;
            write_json(out, &table)
        }
        TableCommand::Create {
            name,
            file,
            source_name,
            source_wid,
            display_name,
            enabled_for_analysis,
        } => {
            let mut schema = schema_source(api, file, source_name, source_wid).await?;
            if display_name.is_some() {
                schema.display_name = display_name;
            }
            if enabled_for_analysis {
                schema.enable_for_analysis = Some(true);
            }
            let created = workflow::create_table(api, &schema, name.as_deref()).await?;
            write_json(out, &created)
        }
        TableCommand::Update {
            table,
            file,
            is_name,
            source_name,
            source_wid,
        } => {
            let updates = schema_source(api, file, source_name, source_wid).await?;
            let table = workflow::resolve_table(api, &table, is_name).await?;
            let updated = workflow::update_table(api, &table.id, updates).await?;
            write_json(out, &updated)
        }
        TableCommand::Upload {
            table,
            files,
            operation,
            is_name,
            schema_file,
        } => {
            let schema = schema_file.as_deref().map(load_schema).transpose()?;
            let table = workflow::resolve_table(api, &table, is_name).await?;
            let report = workflow::load_table(api, &table, operation, &files, None, schema.as_ref())
                .await
                .with_context(|| format!("loading table {} failed", table.name))?;
            write_json(out, &report)
        }
        TableCommand::Truncate { table, is_name } => {
            let table = workflow::resolve_table(api, &table, is_name).await?;
            let report = workflow::truncate_table(api, &table).await?;
            write_json(out, &report)
        }
    }
}

/// The schema a create or update starts from: a file, or a copy of another table.
async fn schema_source<A>(
    api: &A,
    file: Option<PathBuf>,
    source_name: Option<String>,
    source_wid: Option<String>,
) -> Result<Schema>
where
    A: PrismApi + ?Sized,
{
    let schema = match (file, source_wid, source_name) {
        (Some(file), _, _) => load_schema(&file)?,
        (None, Some(wid), _) => workflow::copy_table_schema(api, &wid, false).await?,
        (None, None, Some(name)) => workflow::copy_table_schema(api, &name, true).await?,
        (None, None, None) => anyhow::bail!("a schema file, --sourceName or --sourceWID is required"),
    };
    Ok(schema)
}

async fn buckets<A>(api: &A, command: BucketCommand, out: &mut dyn Write) -> Result<()>
where
    A: PrismApi + ?Sized,
{
    match command {
        BucketCommand::List {
            name,
            id,
            table_name,
            limit,
            offset,
            search,
            detail,
        } => {
            let query = BucketQuery {
                id,
                name,
                table_name,
                limit,
                offset,
                detail,
                search,
            };
            write_json(out, &api.list_buckets(&query).await?)
        }
        BucketCommand::Get { bucket, is_name } => {
            let bucket = workflow::resolve_bucket(api, &bucket, is_name).await?;
            write_json(out, &bucket)
        }
        BucketCommand::Create {
            table,
            operation,
            is_name,
            bucket_name,
            file,
        } => {
            let schema = file.as_deref().map(load_schema).transpose()?;
            let table = workflow::resolve_table(api, &table, is_name).await?;
            let bucket =
                workflow::create_bucket(api, &table, operation, bucket_name, schema.as_ref()).await?;
            write_json(out, &bucket)
        }
        BucketCommand::Upload {
            bucket,
            files,
            is_name,
            complete,
        } => {
            let bucket_id = bucket_id(api, &bucket, is_name).await?;
            let uploaded = workflow::upload_files(api, &bucket_id, &files).await?;
            let completion = if complete {
                Some(workflow::complete_bucket(api, &bucket_id).await?)
            } else {
                None
            };
            write_json(
                out,
                &json!({"bucket": bucket_id, "files": uploaded, "completion": completion}),
            )
        }
        BucketCommand::Complete { bucket, is_name } => {
            let bucket_id = bucket_id(api, &bucket, is_name).await?;
            write_json(out, &workflow::complete_bucket(api, &bucket_id).await?)
        }
        BucketCommand::Errors { bucket, is_name } => {
            let bucket_id = bucket_id(api, &bucket, is_name).await?;
            let text = api.error_file(&bucket_id).await?;
            write!(out, "{text}")?;
            if !text.ends_with('\n') {
                writeln!(out)?;
            }
            Ok(())
        }
        BucketCommand::Generate => execute_offline(Commands::Buckets(BucketCommand::Generate), out),
    }
}

/// The id to use for a bucket argument, looking it up only when given a name.
async fn bucket_id<A>(api: &A, key: &str, is_name: bool) -> Result<String>
where
    A: PrismApi + ?Sized,
{
    if !is_name {
        return Ok(key.to_string());
    }
    Ok(workflow::resolve_bucket(api, key, true).await?.id)
}

/// `Display Name, Rows: n, Size: n, Refreshed: date`, with `-` for anything the server left out.
fn summary_line(table: &Table) -> String {
    let stats = table.extra.get("stats");
    let stat = |value: Option<&Value>| match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => "-".to_string(),
        Some(other) => other.to_string(),
    };
    format!(
        "{}, Rows: {}, Size: {}, Refreshed: {}",
        table.display_name.as_deref().unwrap_or(&table.name),
        stat(stats.and_then(|s| s.get("rows"))),
        stat(stats.and_then(|s| s.get("size"))),
        stat(table.extra.get("dateRefreshed")),
    )
}

/// A table's definition in the shape `tables create --file` accepts.
fn schema_document(table: &Table) -> Result<Value> {
    let schema = table.to_schema()?;
    Ok(json!({
        "name": table.name,
        "displayName": table.display_name.as_deref().unwrap_or(&table.name),
        "fields": schema.fields,
    }))
}

fn write_json<T: Serialize + ?Sized>(out: &mut dyn Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn single_dash_long_flags_are_rewritten() {
        let args = normalize_args([
            "prism", "tables", "upload", "orders", "a.csv", "-operation", "Upsert", "-isName",
        ]);
        assert_eq!(
            args,
            vec!["prism", "tables", "upload", "orders", "a.csv", "--operation", "Upsert", "--isName"]
                .into_iter()
                .map(OsString::from)
                .collect::<Vec<_>>()
        );
        assert_eq!(normalize_args(["-operation=Insert"]), vec![OsString::from("--operation=Insert")]);
        assert_eq!(normalize_args(["-o", "-n", "-operational"]), vec![
            OsString::from("-o"),
            OsString::from("-n"),
            OsString::from("-operational"),
        ]);
    }

    #[test]
    fn upload_parses_every_flag_spelling() {
        for (op_flag, name_flag) in [("-operation", "-isName"), ("--operation", "--isName"), ("-o", "-n")] {
            let cli = Cli::try_parse_from(normalize_args([
                "prism", "tables", "upload", "orders", "a.csv.gz", op_flag, "upsert", name_flag,
            ]))
            .unwrap();
            match cli.command {
                Commands::Tables(TableCommand::Upload {
                    table,
                    files,
                    operation,
                    is_name,
                    ..
                }) => {
                    assert_eq!(table, "orders");
                    assert_eq!(files, vec![PathBuf::from("a.csv.gz")]);
                    assert_eq!(operation, LoadOperation::Upsert);
                    assert!(is_name);
                }
                other => panic!("unexpected command {other:?}"),
            }
        }
    }

    #[test]
    fn upload_defaults_to_truncate_and_insert() {
        let cli = Cli::try_parse_from(["prism", "tables", "upload", "t1", "a.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Tables(TableCommand::Upload {
                operation: LoadOperation::TruncateAndInsert,
                is_name: false,
                ..
            })
        ));
    }

    #[test]
    fn global_options_are_accepted_after_the_subcommand() {
        let cli = Cli::try_parse_from([
            "prism", "buckets", "list", "--base_url", "https://wd.example.com", "--config_name", "prod",
        ])
        .unwrap();
        assert_eq!(cli.global.base_url.as_deref(), Some("https://wd.example.com"));
        assert_eq!(cli.global.config_name.as_deref(), Some("prod"));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        assert!(Cli::try_parse_from(["prism", "tables", "upload", "t", "a.csv", "-o", "merge"]).is_err());
    }

    #[test]
    fn generate_does_not_need_a_connection() {
        let cli = Cli::try_parse_from(["prism", "buckets", "generate"]).unwrap();
        assert!(!cli.command.needs_connection());
        let mut out = Vec::new();
        execute_offline(cli.command, &mut out).unwrap();
        let name = String::from_utf8(out).unwrap();
        assert!(name.trim().starts_with("cli_"));
    }

    #[test]
    fn zero_page_size_is_a_usage_error() {
        assert!(Cli::try_parse_from(["prism", "tables", "list", "x", "--search", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["prism", "buckets", "list", "--limit", "0"]).is_err());
        assert!(Cli::try_parse_from(["prism", "buckets", "list", "--limit", "5", "--type", "full"]).is_ok());
    }

    #[test]
    fn create_needs_exactly_one_schema_source() {
        assert!(Cli::try_parse_from(["prism", "tables", "create", "orders"]).is_err());
        assert!(Cli::try_parse_from([
            "prism", "tables", "create", "orders", "-f", "s.json", "--sourceName", "src",
        ])
        .is_err());

        let cli = Cli::try_parse_from([
            "prism", "tables", "create", "orders", "--sourceWID", "abc", "-e", "--displayName", "Orders",
        ])
        .unwrap();
        match cli.command {
            Commands::Tables(TableCommand::Create {
                name,
                file,
                source_wid,
                display_name,
                enabled_for_analysis,
                ..
            }) => {
                assert_eq!(name.as_deref(), Some("orders"));
                assert!(file.is_none());
                assert_eq!(source_wid.as_deref(), Some("abc"));
                assert_eq!(display_name.as_deref(), Some("Orders"));
                assert!(enabled_for_analysis);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn preflight_checks_bucket_schema_files() {
        let dir = tempfile::tempdir().unwrap();
        let unkeyed = dir.path().join("unkeyed.json");
        std::fs::write(&unkeyed, r#"["sku", "qty:integer"]"#).unwrap();
        let unkeyed = unkeyed.to_str().unwrap().to_string();

        let upsert = Cli::try_parse_from([
            "prism", "buckets", "create", "orders", "-o", "upsert", "-f", unkeyed.as_str(),
        ])
        .unwrap();
        let err = preflight(&upsert.command).unwrap_err();
        assert!(err.to_string().contains("externalId"), "{err}");

        let insert = Cli::try_parse_from([
            "prism", "buckets", "create", "orders", "-o", "insert", "-f", unkeyed.as_str(),
        ])
        .unwrap();
        assert!(preflight(&insert.command).is_ok());
    }
}
