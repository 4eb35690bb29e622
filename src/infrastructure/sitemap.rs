//! Sitemap harvester
//!
//! One-shot pipeline producing the crawl's input list:
//! 1. Download `sitemap{N}.xml.gz` for N = 1.. until a 404, a transport error
//!    or `max_indices`. Decompressed XML is cached under `<dir>/xml/` and cached
//!    files are never downloaded again.
//! 2. Extract every `<loc>` into `<dir>/urls/urls{N}.json`.
//! 3. Merge all URL files in index order, normalize, dedupe and write the URL list.

#![allow(clippy::uninlined_format_args)]

use flate2::read::GzDecoder;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::CanonicalUrl;
use crate::infrastructure::config::SitemapConfig;
use crate::infrastructure::shard_store::write_atomic;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("Sitemap I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed sitemap XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Sitemap JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Sitemap request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("No sitemap could be downloaded from {0}")]
    NothingHarvested(String),
}

/// What a harvest produced
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestSummary {
    pub sitemaps: u32,
    pub raw_urls: usize,
    pub unique_urls: usize,
    pub output: PathBuf,
}

/// Decompress a gzip body; bodies already decoded by the HTTP layer pass through
pub fn decompress(body: &[u8]) -> io::Result<Vec<u8>> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(body.to_vec());
    }
    let mut xml = Vec::new();
    GzDecoder::new(body).read_to_end(&mut xml)?;
    Ok(xml)
}

/// Every `<loc>` value in document order
pub fn parse_locs(xml: &[u8]) -> Result<Vec<String>, SitemapError> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_loc = false;
    let mut locs = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref().ends_with(b"loc") => in_loc = true,
            Event::End(e) if e.name().as_ref().ends_with(b"loc") => in_loc = false,
            Event::Text(text) if in_loc => locs.push(text.unescape()?.trim().to_string()),
            Event::CData(data) if in_loc => {
                locs.push(String::from_utf8_lossy(&data.into_inner()).trim().to_string());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(locs)
}

/// `urls{N}.json` files in index order
fn url_files(dir: &Path) -> io::Result<Vec<(u32, PathBuf)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let index = name
            .to_str()
            .and_then(|name| name.strip_prefix("urls"))
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|digits| digits.parse::<u32>().ok());
        if let Some(index) = index {
            files.push((index, entry.path()));
        }
    }
    files.sort_by_key(|(index, _)| *index);
    Ok(files)
}

pub struct SitemapHarvester {
    client: Client,
    config: SitemapConfig,
    xml_dir: PathBuf,
    urls_dir: PathBuf,
}

impl SitemapHarvester {
    pub fn new(client: Client, config: SitemapConfig, sitemap_dir: &Path) -> Self {
        Self {
            client,
            config,
            xml_dir: sitemap_dir.join("xml"),
            urls_dir: sitemap_dir.join("urls"),
        }
    }

    /// Download, extract and merge; writes the canonical URL list to `url_list`
    pub async fn harvest(&self, url_list: &Path) -> Result<HarvestSummary, SitemapError> {
        std::fs::create_dir_all(&self.xml_dir)?;
        std::fs::create_dir_all(&self.urls_dir)?;

        let mut sitemaps = 0;
        for index in 1..=self.config.max_indices {
            let Some(xml) = self.sitemap_xml(index).await else {
                break;
            };
            let locs = parse_locs(&xml)?;
            let json_path = self.urls_dir.join(format!("urls{}.json", index));
            write_atomic(&json_path, &serde_json::to_vec_pretty(&locs)?)?;
            info!("✅ Sitemap {}: {} URLs saved to {}", index, locs.len(), json_path.display());
            sitemaps += 1;
        }

        if sitemaps == 0 {
            return Err(SitemapError::NothingHarvested(self.config.index_url(1)));
        }
        info!("📊 No more sitemaps after sitemap{}", sitemaps);
        self.merge(url_list, sitemaps)
    }

    /// Cached XML or a fresh download; `None` ends the index walk
    async fn sitemap_xml(&self, index: u32) -> Option<Vec<u8>> {
        let cache = self.xml_dir.join(format!("sitemap{}.xml", index));
        if let Ok(xml) = std::fs::read(&cache) {
            info!("📁 {} already exists, skipping download", cache.display());
            return Some(xml);
        }

        let url = self.config.index_url(index);
        info!("🔄 Downloading {}", url);
        match self.download(&url).await {
            Ok(Some(xml)) => {
                if let Err(error) = write_atomic(&cache, &xml) {
                    warn!("⚠️ Could not cache {}: {}", cache.display(), error);
                }
                Some(xml)
            }
            Ok(None) => None,
            Err(error) => {
                warn!("❌ Stopping at {}: {}", url, error);
                None
            }
        }
    }

    async fn download(&self, url: &str) -> Result<Option<Vec<u8>>, SitemapError> {
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response.error_for_status()?.bytes().await?;
        Ok(Some(decompress(&body)?))
    }

    fn merge(&self, url_list: &Path, sitemaps: u32) -> Result<HarvestSummary, SitemapError> {
        let mut raw = Vec::new();
        for (index, path) in url_files(&self.urls_dir)? {
            if index > sitemaps {
                continue;
            }
            let urls: Vec<String> = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
            raw.extend(urls);
        }

        let canonical: Vec<CanonicalUrl> = self.config.normalizer().normalize_all(raw.iter());
        if let Some(parent) = url_list.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_atomic(url_list, &serde_json::to_vec_pretty(&canonical)?)?;
        info!(
            "✅ Total unique URLs after processing: {} (from {} raw)",
            canonical.len(),
            raw.len()
        );

        Ok(HarvestSummary {
            sitemaps,
            raw_urls: raw.len(),
            unique_urls: canonical.len(),
            output: url_list.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const URLSET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://www.saashub.com/notion</loc></url>
  <url><loc> https://www.saashub.com/notion-alternatives </loc></url>
  <url><loc><![CDATA[https://www.saashub.com/slack]]></loc><lastmod>2024-01-01</lastmod></url>
</urlset>"#;

    #[test]
    fn extracts_locs_in_order() {
        let locs = parse_locs(URLSET.as_bytes()).unwrap();
        assert_eq!(
            locs,
            vec![
                "https://www.saashub.com/notion",
                "https://www.saashub.com/notion-alternatives",
                "https://www.saashub.com/slack",
            ]
        );
    }

    #[test]
    fn decompresses_gzip_and_passes_plain_xml_through() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(URLSET.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        assert_eq!(decompress(&gz).unwrap(), URLSET.as_bytes());
        assert_eq!(decompress(URLSET.as_bytes()).unwrap(), URLSET.as_bytes());
    }

    #[test]
    fn url_files_sort_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["urls10.json", "urls2.json", "urls1.json", "all_urls.json"] {
            std::fs::write(dir.path().join(name), "[]").unwrap();
        }
        let indices: Vec<u32> = url_files(dir.path()).unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2, 10]);
    }
}
