//! Integration tests for sizetree
//!
//! These drive the worker end to end over every transport, and the CLI binary.

use std::process::Command;
use std::sync::Arc;

use serde_json::Value;
use sizetree_core::{parse_options, FormattedNode, Meta, SymbolTypes, TreeBuilder, DEFAULT_DEPTH};
use sizetree_fetch::{DataFetcher, FileTransport, HttpTransport, MemoryTransport, ReadMode, Transport};
use sizetree_worker::{Action, Worker, WorkerConfig, WorkerHandle};
use tempfile::TempDir;

const REPORT: &str = concat!(
    "{\"components\":[\"base\",\"ui\"],\"total\":1000,\"diff_mode\":false}\n",
    "{\"p\":\"base/a.cc\",\"c\":0,\"s\":[{\"n\":\"f1\",\"b\":120,\"t\":\"t\"},{\"n\":\"s1\",\"b\":30,\"t\":\"r\"}]}\n",
    "{\"p\":\"base/sub/b.cc\",\"c\":0,\"s\":[{\"n\":\"f2\",\"b\":300,\"t\":\"t\"}]}\n",
    "{\"p\":\"ui/view.cc\",\"c\":1,\"s\":[{\"n\":\"d1\",\"b\":50,\"t\":\"d\"},{\"n\":\"b1\",\"b\":400,\"t\":\"b\"}]}\n",
    "{\"p\":\"\",\"c\":5,\"s\":[{\"n\":\"orphan\",\"b\":10,\"t\":\"t\",\"u\":2}]}\n",
);

fn spawn(transport: Arc<dyn Transport>, url: &str) -> WorkerHandle {
    let fetcher = DataFetcher::new(transport, url, ReadMode::Streaming);
    Worker::spawn(WorkerConfig::default(), fetcher)
}

fn write_report(dir: &TempDir, body: &str) -> String {
    let path = dir.path().join("report.ndjson");
    std::fs::write(&path, body).unwrap();
    path.to_string_lossy().into_owned()
}

/// The tree a load with `query` should produce, built without the worker.
fn build_directly(report: &str, query: &str) -> TreeBuilder {
    let mut lines = report.lines().filter(|line| !line.trim().is_empty());
    let meta: Meta = serde_json::from_str(lines.next().unwrap()).unwrap();
    let options = parse_options(query, &SymbolTypes::default());
    let mut builder = TreeBuilder::new(options.group_by.path_fn(&meta), options.filter.into_filter_fn())
        .with_separator(options.group_by.separator());
    for line in lines {
        builder.add_file_entry(&serde_json::from_str(line).unwrap());
    }
    builder
}

/// Open every node reachable from the root, checking each against the direct build.
async fn assert_open_matches_find(worker: &mut WorkerHandle, direct: &TreeBuilder) -> usize {
    let root = direct.node(direct.build()).unwrap().id_path.clone();
    let mut pending = vec![root];
    let mut opened = 0;
    while let Some(id_path) = pending.pop() {
        let exchange = worker.call(Action::Open, id_path.clone()).await.unwrap();
        let node: FormattedNode = exchange.result().unwrap().unwrap().clone();
        assert_eq!(Some(&node), direct.format_path(&id_path, DEFAULT_DEPTH).as_ref(), "{}", id_path);
        pending.extend(node.loaded_children().iter().map(|child| child.id_path.clone()));
        opened += 1;
    }
    opened
}

#[tokio::test]
async fn test_file_transport_end_to_end() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("report.ndjson"), REPORT).unwrap();
    let mut worker = spawn(Arc::new(FileTransport::with_root(dir.path())), "report.ndjson");

    let exchange = worker.call(Action::Load, "").await.unwrap();
    let last = exchange.final_progress().unwrap();
    assert_eq!(last.percent, 1.0);
    // `.bss` symbols are hidden by default.
    assert_eq!(last.root.as_ref().unwrap().size, 510.0);

    let direct = build_directly(REPORT, "");
    let opened = assert_open_matches_find(&mut worker, &direct).await;
    assert!(opened >= 8, "only {} nodes opened", opened);
}

#[tokio::test]
async fn test_component_grouping_round_trip() {
    let transport = MemoryTransport::new().route("report", REPORT, 13);
    let mut worker = spawn(Arc::new(transport), "report");
    let query = "group_by=component&type=tdrb";

    let exchange = worker.call(Action::Load, query).await.unwrap();
    let root = exchange.result().unwrap().unwrap();
    assert_eq!(root.id_path, ">");
    assert_eq!(root.size, 910.0);

    let exchange = worker.call(Action::Open, "(No path)>(No path)").await.unwrap();
    let unnamed = exchange.result().unwrap().unwrap();
    assert_eq!(unnamed.child_stats.get('t').unwrap().count, 2);

    assert_open_matches_find(&mut worker, &build_directly(REPORT, query)).await;
}

#[tokio::test]
async fn test_diff_mode_report() {
    let report = concat!(
        "{\"components\":[],\"total\":70,\"diff_mode\":true}\n",
        "{\"p\":\"x/removed.cc\",\"s\":[{\"n\":\"gone\",\"b\":-50,\"t\":\"t\",\"u\":-1}]}\n",
        "{\"p\":\"x/added.cc\",\"s\":[{\"n\":\"new\",\"b\":20,\"t\":\"t\"}]}\n",
    );
    let mut worker = spawn(Arc::new(MemoryTransport::new().route("diff", report, 32)), "diff");

    let exchange = worker.call(Action::Load, "").await.unwrap();
    assert!(exchange.progress.iter().all(|progress| progress.diff_mode));
    assert_eq!(exchange.result().unwrap().unwrap().size, -30.0);

    let exchange = worker.call(Action::Open, "x").await.unwrap();
    let children: Vec<f64> = exchange.result().unwrap().unwrap().loaded_children().iter().map(|c| c.size).collect();
    assert_eq!(children, vec![-50.0, 20.0]);
}

async fn serve_report(body: &'static str) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = axum::Router::new().route("/report.ndjson", axum::routing::get(move || async move { body }));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", address)
}

#[tokio::test]
async fn test_http_transport_end_to_end() {
    let base = serve_report(REPORT).await;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new());

    let mut worker = spawn(Arc::clone(&transport), &format!("{}/report.ndjson", base));
    let exchange = worker.call(Action::Load, "min_size=100").await.unwrap();
    assert_eq!(exchange.result().unwrap().unwrap().size, 420.0);

    let mut missing = spawn(transport, &format!("{}/missing.ndjson", base));
    let exchange = missing.call(Action::Load, "").await.unwrap();
    let error = exchange.result().unwrap_err();
    assert!(error.contains("404"), "{}", error);
    assert_eq!(exchange.final_progress().unwrap().error.as_deref(), Some(error));
}

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_sizetree"))
        .args(args)
        .output()
        .expect("Failed to execute sizetree")
}

#[test]
fn test_cli_load() {
    let dir = TempDir::new().unwrap();
    let path = write_report(&dir, REPORT);

    for args in [vec!["load", path.as_str()], vec!["load", path.as_str(), "--buffered"]] {
        let output = run_cli(&args);
        assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

        let progress: Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(progress["id"], 0);
        assert_eq!(progress["percent"].as_f64(), Some(1.0));
        assert_eq!(progress["diffMode"], false);
        assert_eq!(progress["root"]["size"].as_f64(), Some(510.0));
        assert!(progress.get("error").is_none());
    }
}

#[test]
fn test_cli_open() {
    let dir = TempDir::new().unwrap();
    let path = write_report(&dir, REPORT);

    let output = run_cli(&["open", &path, "base"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let node: Value = serde_json::from_slice(&output.stdout).unwrap();
    let children: Vec<&str> = node["children"]
        .as_array()
        .unwrap()
        .iter()
        .map(|child| child["idPath"].as_str().unwrap())
        .collect();
    assert_eq!(children, vec!["base/sub", "base/a.cc"]);

    let output = run_cli(&["open", &path, "base/nothing.cc"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_reports_malformed_input() {
    let dir = TempDir::new().unwrap();
    let path = write_report(&dir, "{\"total\":1}\n{broken\n");

    let output = run_cli(&["load", &path]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 2"));
}
