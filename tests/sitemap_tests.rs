//! Sitemap harvesting against a mock site
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_harvester::infrastructure::config::SitemapConfig;
use listing_harvester::infrastructure::sitemap::{SitemapError, SitemapHarvester};

fn gzipped_urlset(locs: &[String]) -> Vec<u8> {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for loc in locs {
        xml.push_str(&format!("  <url><loc>{loc}</loc></url>\n"));
    }
    xml.push_str("</urlset>\n");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

fn config_for(server: &MockServer) -> SitemapConfig {
    SitemapConfig {
        base_url: server.uri(),
        max_indices: 10,
        ..SitemapConfig::default()
    }
}

fn harvester(server: &MockServer, dir: &TempDir) -> SitemapHarvester {
    let client = reqwest::Client::new();
    SitemapHarvester::new(client, config_for(server), &dir.path().join("sitemap_data"))
}

#[tokio::test]
async fn harvests_until_the_first_missing_sitemap() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/sitemaps/sitemap1.xml.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzipped_urlset(&[
            format!("{base}/notion"),
            format!("{base}/notion-alternatives"),
            format!("{base}/slack-status"),
            base.clone(),
            format!("{base}/status-pages"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemaps/sitemap2.xml.gz"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(gzipped_urlset(&[
            format!("{base}/best-crm-software"),
            format!("{base}/sitemap/3"),
            format!("{base}/linear"),
            format!("{base}/notion"),
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemaps/sitemap3.xml.gz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("all_urls.json");
    let summary = harvester(&server, &dir).harvest(&output).await.unwrap();

    assert_eq!(summary.sitemaps, 2);
    assert_eq!(summary.raw_urls, 9);
    assert_eq!(summary.unique_urls, 3);

    let urls: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(
        urls,
        vec![
            format!("{base}/notion"),
            format!("{base}/slack"),
            format!("{base}/linear"),
        ]
    );
    assert!(dir.path().join("sitemap_data/xml/sitemap1.xml").exists());
    assert!(dir.path().join("sitemap_data/urls/urls2.json").exists());
}

#[tokio::test]
async fn cached_sitemaps_are_not_downloaded_again() {
    let server = MockServer::start().await;
    let base = server.uri();
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("all_urls.json");

    {
        let _first = Mock::given(method("GET"))
            .and(path("/sitemaps/sitemap1.xml.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(gzipped_urlset(&[format!("{base}/notion")])))
            .expect(1)
            .mount_as_scoped(&server)
            .await;
        harvester(&server, &dir).harvest(&output).await.unwrap();
    }

    // sitemap1 now only exists in the cache
    let summary = harvester(&server, &dir).harvest(&output).await.unwrap();
    assert_eq!(summary.sitemaps, 1);
    assert_eq!(summary.unique_urls, 1);
}

#[tokio::test]
async fn missing_first_sitemap_is_an_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let result = harvester(&server, &dir).harvest(&dir.path().join("all_urls.json")).await;

    assert!(matches!(result, Err(SitemapError::NothingHarvested(_))));
    assert!(!dir.path().join("all_urls.json").exists());
}
