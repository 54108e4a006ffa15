//! HTTP contract tests against a real server on a free local port.

mod common;

use common::*;
use docrag::server::{serve, AppState};
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::{json, Value};

const LIMIT: usize = 64 * 1024;

// ─── Helpers ────────────────────────────────────────────────────────

async fn start(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        serve(listener, state, LIMIT).await.unwrap();
    });
    wait_for_server(port).await;
    format!("http://127.0.0.1:{}", port)
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    panic!("Server did not become ready within 5 seconds");
}

fn files_form(names: &[&str]) -> Form {
    names.iter().fold(Form::new(), |form, name| {
        form.part(
            "files",
            Part::bytes(format!("contents of {}", name).into_bytes()).file_name(name.to_string()),
        )
    })
}

async fn post_files(base: &str, names: &[&str]) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}/ingest", base))
        .multipart(files_form(names))
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

async fn post_json(base: &str, path: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{}{}", base, path))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.json().await.unwrap())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_version() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn query_without_query_field_is_400() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let (status, body) = post_json(&base, "/query", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Query parameter is missing" }));

    for blank in ["", "  \n\t "] {
        let (status, body) = post_json(&base, "/query", json!({ "query": blank })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Query parameter is missing");
    }
    assert!(h.generator.last_prompt().is_none());
}

#[tokio::test]
async fn malformed_json_is_400() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let resp = reqwest::Client::new()
        .post(format!("{}/query", base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn ingest_without_files_is_400() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/ingest", base))
        .multipart(Form::new().text("note", "no files here"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "error": "No files uploaded" }));

    let resp = client
        .post(format!("{}/ingest", base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "No files uploaded");
}

#[tokio::test]
async fn blank_upload_is_200_and_keeps_snapshot() {
    let extractor = sample_extractor()
        .with("blank.pdf", &[("", docrag::models::ChunkKind::FullText)]);
    let h = Harness::new(extractor);
    let base = start(h.state.clone()).await;

    let (status, _) = post_files(&base, &["report.pdf"]).await;
    assert_eq!(status, StatusCode::OK);
    let before = h.snapshot_bytes();
    let modified_before = std::fs::metadata(&h.index_path).unwrap().modified().unwrap();

    let (status, body) = post_files(&base, &["blank.pdf"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "No valid files found for processing" })
    );
    assert_eq!(h.snapshot_bytes(), before);
    let modified_after = std::fs::metadata(&h.index_path).unwrap().modified().unwrap();
    assert_eq!(modified_before, modified_after);
}

#[tokio::test]
async fn ingest_query_compare_round_trip() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let (status, body) = post_files(&base, &["report.pdf", "scan.png"]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Files processed successfully" }));

    let (status, body) = post_json(&base, "/query", json!({ "query": "revenue" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "response": "answered with 500 tokens max" }));
    assert!(h
        .generator
        .last_prompt()
        .unwrap()
        .contains("quarterly revenue grew"));

    let (status, body) = post_json(
        &base,
        "/compare",
        json!({ "fields": ["Revenue", "Risk"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let table = body["comparison"].as_str().unwrap();
    assert!(table.starts_with("### Comparison Results:\n\n| Field"));
    let rows: Vec<&str> = table.lines().skip(4).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].starts_with("| Revenue | quarterly revenue grew... | "));
    assert!(rows[1].starts_with("| Risk | risk factors include currency... | "));
}

#[tokio::test]
async fn compare_without_fields_is_400() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    for body in [json!({}), json!({ "fields": [] })] {
        let (status, body) = post_json(&base, "/compare", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Fields parameter is missing" }));
    }
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let form = Form::new().part(
        "files",
        Part::bytes(vec![b'x'; LIMIT + 1]).file_name("report.pdf"),
    );
    let resp = reqwest::Client::new()
        .post(format!("{}/ingest", base))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(!h.store().exists());
}

#[tokio::test]
async fn corrupt_snapshot_is_500() {
    let h = Harness::new(sample_extractor());
    let base = start(h.state.clone()).await;

    let (status, _) = post_files(&base, &["report.pdf"]).await;
    assert_eq!(status, StatusCode::OK);
    std::fs::write(&h.index_path, b"garbage").unwrap();

    let (status, body) = post_json(&base, "/query", json!({ "query": "revenue" })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().unwrap().contains("corrupt snapshot"));
}
