//! Reconciliation of the URL list against shards and the error log
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

use listing_harvester::crawling::reconciler::{reconcile, write_rerun_file};
use listing_harvester::domain::{CanonicalUrl, ErrorEntry};

const PREFIX: &str = "saas_data";

fn url(slug: &str) -> CanonicalUrl {
    CanonicalUrl::new(format!("https://x.test/{slug}"))
}

fn write_shard(dir: &Path, index: u64, slugs: &[&str]) {
    let records: Vec<_> = slugs
        .iter()
        .map(|slug| json!({"url": url(slug).as_str(), "CompanyName": slug}))
        .collect();
    std::fs::write(
        dir.join(format!("{PREFIX}_{index}.json")),
        serde_json::to_vec_pretty(&records).unwrap(),
    )
    .unwrap();
}

fn entry(slug: &str, error: &str) -> ErrorEntry {
    ErrorEntry::new(url(slug), error)
}

#[test]
fn not_found_urls_are_excluded_from_the_rerun_set() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 0, &["a", "b"]);
    let canonical = vec![url("a"), url("b"), url("c"), url("d")];
    let ledger = vec![
        entry("c", "HTTP error! status: 404"),
        entry("d", "No response received from the server"),
    ];

    let report = reconcile(&canonical, dir.path(), PREFIX, &ledger).unwrap();

    assert_eq!(report.total_count, 4);
    assert_eq!(report.downloaded_count, 2);
    assert_eq!(report.missing_count, 2);
    assert_eq!(report.downloaded_percentage, 50.0);
    assert_eq!(report.missing_percentage, 50.0);
    assert_eq!(report.permanent_failures, 1);
    assert_eq!(report.transient_failures, 1);
    assert_eq!(report.rerun_set, vec![url("d")]);
}

#[test]
fn latest_ledger_entry_decides_the_class() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 0, &["a"]);
    let canonical = vec![url("a"), url("b"), url("c")];
    let ledger = vec![
        entry("b", "Request timed out after 30s"),
        entry("b", "HTTP error! status: 404"),
        entry("c", "HTTP error! status: 404"),
        entry("c", "HTTP error! status: 503"),
    ];

    let report = reconcile(&canonical, dir.path(), PREFIX, &ledger).unwrap();

    assert_eq!(report.permanent_failures, 1);
    assert_eq!(report.transient_failures, 1);
    assert_eq!(report.rerun_set, vec![url("c")]);
}

#[test]
fn transient_failures_outside_the_list_are_rerun_after_it() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 0, &["a"]);
    write_shard(dir.path(), 1, &["b"]);
    let canonical = vec![url("a"), url("b"), url("c")];
    let ledger = vec![
        entry("retired", "Sanity check failed: Website URL is missing"),
        entry("b", "No response received from the server"),
        entry("gone", "HTTP error! status: 404"),
    ];

    let report = reconcile(&canonical, dir.path(), PREFIX, &ledger).unwrap();

    assert_eq!(report.downloaded_count, 2);
    assert_eq!(report.rerun_set, vec![url("b"), url("c"), url("retired")]);
}

#[test]
fn empty_inputs_report_zero_percentages() {
    let dir = TempDir::new().unwrap();
    let report = reconcile(&[], &dir.path().join("missing"), PREFIX, &[]).unwrap();

    assert_eq!(report.total_count, 0);
    assert_eq!(report.downloaded_percentage, 0.0);
    assert_eq!(report.missing_percentage, 0.0);
    assert!(report.rerun_set.is_empty());
}

#[test]
fn percentages_are_rounded_to_two_decimals() {
    let dir = TempDir::new().unwrap();
    write_shard(dir.path(), 0, &["a"]);
    let canonical = vec![url("a"), url("b"), url("c")];

    let report = reconcile(&canonical, dir.path(), PREFIX, &[]).unwrap();

    assert_eq!(report.downloaded_percentage, 33.33);
    assert_eq!(report.missing_percentage, 66.67);
}

#[test]
fn rerun_file_is_a_json_array_of_urls() {
    let dir = TempDir::new().unwrap();
    let canonical = vec![url("a"), url("b")];
    let report = reconcile(&canonical, dir.path(), PREFIX, &[]).unwrap();
    let path = dir.path().join("rerun").join("urls_to_rerun.json");

    write_rerun_file(&path, &report).unwrap();

    let written: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written, vec!["https://x.test/a", "https://x.test/b"]);
}
