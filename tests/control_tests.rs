//! Control server endpoints over a real socket
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use listing_harvester::application::crawl_use_cases::CrawlUseCases;
use listing_harvester::control::{self, AppState};
use listing_harvester::infrastructure::config::{AppConfig, PathsConfig};

struct TestServer {
    base: String,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn config(dir: &Path) -> AppConfig {
    AppConfig {
        paths: PathsConfig {
            url_list: dir.join("all_urls.json"),
            output_dir: dir.join("out"),
            error_log: dir.join("error_log.json"),
            rerun_file: dir.join("rerun_urls.json"),
            ..PathsConfig::default()
        },
        ..AppConfig::default()
    }
}

async fn start(dir: &Path) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let state = AppState::new(Arc::new(CrawlUseCases::new(config(dir))), dir.join("scraper.log"));
    let handle = tokio::spawn(control::serve_on(listener, state));
    TestServer { base, handle }
}

async fn get_json(url: &str) -> (u16, Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    let body = response.text().await.unwrap();
    (status, serde_json::from_str(&body).unwrap())
}

fn write_shard(dir: &Path, index: u64, urls: &[&str]) {
    std::fs::create_dir_all(dir.join("out")).unwrap();
    let records: Vec<Value> = urls
        .iter()
        .map(|url| json!({"url": url, "CompanyName": "Acme", "Website": "https://acme.example"}))
        .collect();
    std::fs::write(
        dir.join("out").join(format!("saas_data_{index}.json")),
        serde_json::to_vec(&records).unwrap(),
    )
    .unwrap();
}

#[tokio::test]
async fn status_starts_idle() {
    let dir = TempDir::new().unwrap();
    let server = start(dir.path()).await;

    let (status, body) = get_json(&format!("{}/status", server.base)).await;

    assert_eq!(status, 200);
    assert_eq!(body, json!({"running": false, "lastRun": null}));
}

#[tokio::test]
async fn log_viewer_escapes_messages_newest_first() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("scraper.log"),
        concat!(
            r#"{"timestamp":"t1","level":"INFO","fields":{"message":"first"}}"#,
            "\n",
            r#"{"timestamp":"t2","level":"ERROR","fields":{"message":"<b>second</b>"}}"#,
            "\n",
        ),
    )
    .unwrap();
    let server = start(dir.path()).await;

    let page = reqwest::get(&server.base).await.unwrap().text().await.unwrap();

    assert!(page.contains("&lt;b&gt;second&lt;/b&gt;"));
    assert!(!page.contains("<b>second</b>"));
    let second = page.find("second").unwrap();
    let first = page.find("first").unwrap();
    assert!(second < first);
}

#[tokio::test]
async fn reconcile_reports_and_writes_the_rerun_file() {
    let dir = TempDir::new().unwrap();
    let urls = ["https://x.test/a", "https://x.test/b", "https://x.test/c"];
    std::fs::write(dir.path().join("all_urls.json"), serde_json::to_vec(&urls).unwrap()).unwrap();
    std::fs::write(
        dir.path().join("error_log.json"),
        r#"[{"url":"https://x.test/c","error":"HTTP error! status: 404"}]"#,
    )
    .unwrap();
    write_shard(dir.path(), 0, &["https://x.test/a"]);
    let server = start(dir.path()).await;

    let (status, body) = get_json(&format!("{}/reconcile", server.base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["downloadedCount"], 1);
    assert_eq!(body["missingCount"], 2);
    assert_eq!(body["rerunSet"], json!(["https://x.test/b"]));
    let rerun: Vec<String> =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("rerun_urls.json")).unwrap()).unwrap();
    assert_eq!(rerun, vec!["https://x.test/b"]);
}

#[tokio::test]
async fn reconcile_without_a_url_list_is_a_server_error() {
    let dir = TempDir::new().unwrap();
    let server = start(dir.path()).await;

    let (status, body) = get_json(&format!("{}/reconcile", server.base)).await;

    assert_eq!(status, 500);
    assert_eq!(body["message"], "Reconciliation failed");
}

#[tokio::test]
async fn download_streams_the_consolidated_archive() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 0, &["https://x.test/a", "https://x.test/b"]);
    write_shard(dir.path(), 1, &["https://x.test/c"]);
    let server = start(dir.path()).await;

    let response = reqwest::get(format!("{}/download", server.base)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()["content-type"], "application/zip");
    let bytes = response.bytes().await.unwrap();

    let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes.to_vec())).unwrap();
    let mut names: Vec<&str> = archive.file_names().collect();
    names.sort_unstable();
    assert_eq!(names, vec!["all.csv", "all_two_columns.csv"]);
    assert!(dir.path().join("out").join("json_result.zip").exists());
}

#[tokio::test]
async fn background_run_failure_is_reported_in_status() {
    let dir = TempDir::new().unwrap();
    let server = start(dir.path()).await;

    let (status, body) = get_json(&format!("{}/run", server.base)).await;
    assert_eq!(status, 202);
    assert_eq!(body["message"], "Scraper started");

    // the URL list does not exist, so the run ends almost immediately
    let mut last_run = Value::Null;
    for _ in 0..50 {
        let (_, body) = get_json(&format!("{}/status", server.base)).await;
        if body["running"] == false && !body["lastRun"].is_null() {
            last_run = body["lastRun"].clone();
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(last_run["error"].as_str().unwrap().contains("Crawl run failed"));
    assert!(last_run.get("stats").is_none());
}
