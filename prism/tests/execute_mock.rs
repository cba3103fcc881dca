use std::path::Path;
use std::sync::{Arc, Mutex};

use clap::Parser;
use prism::cli::{execute, normalize_args, Cli};
use prism_core::contract::MockPrismApi;
use prism_core::model::{Bucket, Listing, Table};
use prism_core::schema::{FieldDef, FieldType};
use prism_core::PrismError;
use serde_json::{json, Value};
use tempfile::tempdir;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{layer::Context, Layer, Registry};

/// Custom Layer to collect emitted event messages.
struct EventCollector {
    events: Arc<Mutex<Vec<String>>>,
}

impl<S> Layer<S> for EventCollector
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        self.events.lock().unwrap().push(format!("{event:?}"));
    }
}

fn parse(args: &[&str]) -> Cli {
    let mut full = vec!["prism"];
    full.extend_from_slice(args);
    Cli::try_parse_from(normalize_args(full)).unwrap()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_str().unwrap().to_string()
}

fn created_bucket(id: &str) -> Bucket {
    serde_json::from_value(json!({"id": id, "name": "cli_x"})).unwrap()
}

fn orders() -> Table {
    let mut id = FieldDef::new("id", FieldType::Integer).external_id();
    id.ordinal = 1;
    Table {
        id: "t1".into(),
        name: "orders".into(),
        display_name: Some("Orders".into()),
        fields: vec![id],
        extra: Default::default(),
    }
}

async fn run_with(api: &MockPrismApi, args: &[&str]) -> anyhow::Result<String> {
    let mut out = Vec::new();
    execute(api, parse(args).command, &mut out).await?;
    Ok(String::from_utf8(out).unwrap())
}

#[tokio::test]
async fn summary_format_prints_one_line_per_table() {
    let mut api = MockPrismApi::new();
    api.expect_list_tables().returning(|_| {
        let mut stated = orders();
        stated.extra.insert("stats".into(), json!({"rows": 10, "size": 2048}));
        stated.extra.insert("dateRefreshed".into(), json!("2024-05-01T10:00:00Z"));
        let mut bare = orders();
        bare.display_name = None;
        Ok(Listing::from_items(vec![stated, bare]))
    });

    let out = run_with(&api, &["tables", "list", "--format", "summary"]).await.unwrap();
    assert_eq!(
        out,
        "Orders, Rows: 10, Size: 2048, Refreshed: 2024-05-01T10:00:00Z\n\
         orders, Rows: -, Size: -, Refreshed: -\n"
    );
}

#[tokio::test]
async fn csv_format_prints_the_first_table_fields() {
    let mut api = MockPrismApi::new();
    api.expect_list_tables()
        .withf(|q| q.detail == prism_core::model::Detail::Full)
        .returning(|_| Ok(Listing::from_items(vec![orders()])));

    let out = run_with(&api, &["tables", "list", "orders", "--format", "csv"]).await.unwrap();
    assert_eq!(
        out,
        "name,displayName,ordinal,type,businessObject,precision,scale,parseFormat,required,externalId\n\
         id,id,1,Integer,,,,,false,true\n"
    );
}

#[tokio::test]
async fn schema_format_requests_full_detail() {
    let mut api = MockPrismApi::new();
    api.expect_list_tables()
        .withf(|q| q.detail == prism_core::model::Detail::Full)
        .returning(|_| Ok(Listing::from_items(vec![orders()])));

    let out = run_with(&api, &["tables", "list", "orders", "--format", "schema"]).await.unwrap();
    let doc: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(doc["name"], "orders");
    assert_eq!(doc["fields"][0]["name"], "id");
    assert_eq!(doc["fields"][0]["externalId"], true);
}

#[tokio::test]
async fn upload_by_name_with_single_dash_flags() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("orders.csv");
    std::fs::write(&file, "id\n1\n").unwrap();
    let file_arg = file.to_str().unwrap().to_string();

    let mut api = MockPrismApi::new();
    api.expect_list_tables()
        .withf(|q| q.name.as_deref() == Some("orders"))
        .returning(|_| Ok(Listing::from_items(vec![orders()])));
    api.expect_describe_table().returning(|_| Ok(orders()));
    api.expect_create_bucket()
        .withf(|b| b.operation.id == "Operation_Type=Upsert")
        .times(1)
        .returning(|_| Ok(serde_json::from_value::<Bucket>(json!({"id": "b1", "name": "cli_x"})).unwrap()));
    api.expect_upload_file()
        .withf(|id, f| id == "b1" && f.file_name == "orders.csv.gz")
        .times(1)
        .returning(|_, _| Ok(Value::Null));
    api.expect_complete_bucket().times(1).returning(|_| Ok(json!({})));

    let out = run_with(
        &api,
        &["tables", "upload", "orders", file_arg.as_str(), "-operation", "upsert", "-isName"],
    )
    .await
    .unwrap();
    let report: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["bucket"]["id"], "b1");
    assert_eq!(report["files"][0], "orders.csv.gz");
}

#[tokio::test]
async fn upload_with_bad_extension_makes_no_calls() {
    let dir = tempdir().unwrap();
    let file = dir.path().join("orders.xlsx");
    std::fs::write(&file, "x").unwrap();
    let file_arg = file.to_str().unwrap().to_string();

    let mut api = MockPrismApi::new();
    api.expect_describe_table().never();
    api.expect_create_bucket().never();

    let err = run_with(&api, &["tables", "upload", "t1", file_arg.as_str()]).await.unwrap_err();
    assert!(err.to_string().contains("orders.xlsx"));
}

#[tokio::test]
async fn bucket_complete_by_id_skips_lookup() {
    let mut api = MockPrismApi::new();
    api.expect_describe_bucket().never();
    api.expect_list_buckets().never();
    api.expect_complete_bucket()
        .withf(|id| id == "b42")
        .times(1)
        .returning(|_| Ok(json!({"id": "b42"})));

    let out = run_with(&api, &["buckets", "complete", "b42"]).await.unwrap();
    assert!(out.contains("b42"));
}

#[tokio::test]
async fn errors_prints_the_error_file() {
    let mut api = MockPrismApi::new();
    api.expect_error_file()
        .returning(|_| Ok("id,error\n3,not a number".to_string()));

    let out = run_with(&api, &["buckets", "errors", "b1"]).await.unwrap();
    assert_eq!(out, "id,error\n3,not a number\n");
}

#[tokio::test]
async fn listing_emits_a_trace_event() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = EventCollector {
        events: events.clone(),
    };
    let subscriber = Registry::default().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let mut api = MockPrismApi::new();
    api.expect_list_tables().returning(|_| Ok(Listing::default()));
    run_with(&api, &["tables", "list"]).await.unwrap();

    let event_msgs = events.lock().unwrap();
    assert!(
        event_msgs.iter().any(|msg| msg.contains("tables list")),
        "Expected a 'tables list' trace event, got: {:?}",
        event_msgs
    );
}

#[tokio::test]
async fn create_table_from_file_with_analysis_enabled() {
    let dir = tempdir().unwrap();
    let schema = write_file(dir.path(), "orders.csv", "name,type,externalId\nid,integer,true\n");

    let mut api = MockPrismApi::new();
    api.expect_create_table()
        .withf(|t| {
            t.name == "daily_orders"
                && t.display_name == "Daily Orders"
                && t.enable_for_analysis == Some(true)
                && t.fields.len() == 1
        })
        .times(1)
        .returning(|_| Ok(orders()));

    let out = run_with(
        &api,
        &["tables", "create", "daily orders", "-f", schema.as_str(), "--display_name", "Daily Orders", "-e"],
    )
    .await
    .unwrap();
    let created: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(created["id"], "t1");
}

#[tokio::test]
async fn create_table_copies_fields_from_a_source_table() {
    let mut api = MockPrismApi::new();
    let mut seq = mockall::Sequence::new();
    api.expect_list_tables()
        .withf(|q| q.name.as_deref() == Some("orders"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Listing::from_items(vec![orders()])));
    api.expect_describe_table()
        .withf(|id| id == "t1")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(orders()));
    api.expect_create_table()
        .withf(|t| t.name == "orders_copy" && t.fields[0].name == "id" && t.fields[0].external_id)
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(orders()));

    run_with(&api, &["tables", "create", "orders_copy", "--sourceName", "orders"])
        .await
        .unwrap();
}

#[tokio::test]
async fn update_table_merges_the_file_into_the_resolved_table() {
    let dir = tempdir().unwrap();
    let schema = write_file(dir.path(), "more.json", r#"["amount:numeric"]"#);

    let mut api = MockPrismApi::new();
    api.expect_describe_table()
        .withf(|id| id == "t1")
        .times(2)
        .returning(|_| Ok(orders()));
    api.expect_update_table()
        .withf(|id, def| {
            let names: Vec<_> = def.fields.iter().map(|f| f.name.as_str()).collect();
            id == "t1" && names == ["id", "amount"]
        })
        .times(1)
        .returning(|_, def| {
            let mut table = orders();
            table.fields = def.fields.clone();
            Ok(table)
        });

    let out = run_with(&api, &["tables", "update", "t1", schema.as_str()]).await.unwrap();
    let updated: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(updated["fields"][1]["name"], "amount");
}

#[tokio::test]
async fn truncate_runs_the_bucket_lifecycle_with_an_empty_file() {
    let mut api = MockPrismApi::new();
    let mut seq = mockall::Sequence::new();
    api.expect_describe_table()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(orders()));
    api.expect_create_bucket()
        .withf(|b| b.operation.id == "Operation_Type=TruncateAndInsert")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(created_bucket("b3")));
    api.expect_upload_file()
        .withf(|id, f| id == "b3" && f.file_name == "empty.csv.gz")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Value::Null));
    api.expect_complete_bucket()
        .withf(|id| id == "b3")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(json!({"state": "Processing"})));

    let out = run_with(&api, &["tables", "truncate", "t1"]).await.unwrap();
    let report: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(report["bucket"]["id"], "b3");
    assert_eq!(report["files"], json!(["empty.csv.gz"]));
    assert_eq!(report["completion"]["state"], "Processing");
}

#[tokio::test]
async fn bucket_create_uses_the_table_schema_by_default() {
    let mut api = MockPrismApi::new();
    let mut seq = mockall::Sequence::new();
    api.expect_describe_table()
        .withf(|id| id == "t1")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(orders()));
    api.expect_create_bucket()
        .withf(|b| {
            b.name == "nightly"
                && b.operation.id == "Operation_Type=Delete"
                && b.schema.fields.len() == 1
                && b.schema.has_operation_key()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(created_bucket("b4")));

    let out = run_with(&api, &["buckets", "create", "t1", "-o", "Delete", "--name", "nightly"])
        .await
        .unwrap();
    let bucket: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(bucket["id"], "b4");
}

#[tokio::test]
async fn bucket_create_with_unkeyed_schema_file_makes_no_calls() {
    let dir = tempdir().unwrap();
    let schema = write_file(dir.path(), "bucket.json", r#"["sku", "qty:integer"]"#);

    let mut api = MockPrismApi::new();
    api.expect_list_tables().never();
    api.expect_describe_table().never();
    api.expect_create_bucket().never();

    let err = run_with(
        &api,
        &["buckets", "create", "orders", "-n", "-operation", "Upsert", "-f", schema.as_str()],
    )
    .await
    .unwrap_err();
    assert!(matches!(err.downcast_ref::<PrismError>(), Some(PrismError::Schema(_))), "{err:?}");
}

#[tokio::test]
async fn bucket_upload_without_complete_leaves_the_bucket_open() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.csv", "id\n1\n");
    let b = write_file(dir.path(), "b.csv", "id\n2\n");

    let mut api = MockPrismApi::new();
    let mut seq = mockall::Sequence::new();
    for name in ["a.csv.gz", "b.csv.gz"] {
        api.expect_upload_file()
            .withf(move |id, f| id == "b5" && f.file_name == name)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Value::Null));
    }
    api.expect_complete_bucket().never();

    let out = run_with(&api, &["buckets", "upload", "b5", a.as_str(), b.as_str()])
        .await
        .unwrap();
    let result: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        result,
        json!({"bucket": "b5", "files": ["a.csv.gz", "b.csv.gz"], "completion": null})
    );
}

#[tokio::test]
async fn bucket_upload_with_complete_completes_after_the_uploads() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.csv.gz", "");

    let mut api = MockPrismApi::new();
    let mut seq = mockall::Sequence::new();
    api.expect_list_buckets()
        .withf(|q| q.name.as_deref() == Some("nightly"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(Listing::from_items(vec![created_bucket("b6")])));
    api.expect_upload_file()
        .withf(|id, f| id == "b6" && f.file_name == "a.csv.gz")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(Value::Null));
    api.expect_complete_bucket()
        .withf(|id| id == "b6")
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(json!({"id": "b6"})));

    let out = run_with(&api, &["buckets", "upload", "nightly", a.as_str(), "-isName", "--complete"])
        .await
        .unwrap();
    let result: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(result["bucket"], "b6");
    assert_eq!(result["completion"]["id"], "b6");
}

#[tokio::test]
async fn bucket_list_passes_paging_options() {
    let mut api = MockPrismApi::new();
    api.expect_list_buckets()
        .withf(|q| q.limit == Some(5) && q.offset == Some(10) && q.detail == prism_core::model::Detail::Full)
        .times(1)
        .returning(|_| Ok(Listing::default()));

    let out = run_with(&api, &["buckets", "list", "--limit", "5", "--offset", "10", "--type", "full"])
        .await
        .unwrap();
    let listing: Value = serde_json::from_str(&out).unwrap();
    assert_eq!(listing["total"], 0);
}
