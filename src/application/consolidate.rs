//! Consolidation of shards into single deliverables
//!
//! - `all.csv`: every record under the declared schema
//! - `all_two_columns.csv`: `saashub_url`, `Website`
//! - `all.zip`: both CSV files
//! - `json_result.zip`: the raw JSON shards

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::domain::{RecordSchema, record::URL_FIELD};
use crate::infrastructure::archive::{ArchiveEntry, write_archive};
use crate::infrastructure::config::PathsConfig;
use crate::infrastructure::shard_store::{list_shards, read_shards};
use crate::infrastructure::tabular::TableWriter;

pub const ALL_CSV: &str = "all.csv";
pub const TWO_COLUMNS_CSV: &str = "all_two_columns.csv";
pub const ALL_ZIP: &str = "all.zip";
pub const JSON_ZIP: &str = "json_result.zip";

const TWO_COLUMNS: [(&str, &str); 2] = [("saashub_url", URL_FIELD), ("Website", "Website")];
const PROGRESS_EVERY: usize = 1000;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationSummary {
    pub shards: usize,
    pub records: usize,
    pub csv: PathBuf,
    pub two_columns_csv: PathBuf,
    pub archive: PathBuf,
}

/// Merge every shard in index order into the CSV files and `all.zip`
pub fn consolidate(paths: &PathsConfig, schema: &RecordSchema) -> Result<ConsolidationSummary> {
    let dir = paths.output_dir.as_path();
    let shards = read_shards(dir, &paths.shard_prefix)
        .with_context(|| format!("Failed to read shards from {:?}", dir))?;
    if shards.is_empty() {
        bail!("No shards found in {:?}", dir);
    }

    let csv_path = dir.join(ALL_CSV);
    let two_columns_path = dir.join(TWO_COLUMNS_CSV);
    let mut all = TableWriter::for_schema(BufWriter::new(create(&csv_path)?), schema)?;
    let mut two_columns = TableWriter::projection(BufWriter::new(create(&two_columns_path)?), &TWO_COLUMNS)?;

    for record in shards.iter().flat_map(|shard| shard.records.iter()) {
        all.write(record)?;
        two_columns.write(record)?;
        if all.rows() % PROGRESS_EVERY == 0 {
            info!("📊 Processed {} items", all.rows());
        }
    }
    let records = all.finish()?;
    two_columns.finish()?;
    info!("✅ {} records from {} shards written to {:?}", records, shards.len(), csv_path);

    let archive = dir.join(ALL_ZIP);
    write_archive(
        &archive,
        &[ArchiveEntry::from_path(&csv_path), ArchiveEntry::from_path(&two_columns_path)],
    )?;

    Ok(ConsolidationSummary {
        shards: shards.len(),
        records,
        csv: csv_path,
        two_columns_csv: two_columns_path,
        archive,
    })
}

/// Bundle the JSON shards into `json_result.zip`
pub fn archive_json_shards(paths: &PathsConfig) -> Result<PathBuf> {
    let dir = paths.output_dir.as_path();
    let entries: Vec<ArchiveEntry> = list_shards(dir, &paths.shard_prefix)
        .with_context(|| format!("Failed to list shards in {:?}", dir))?
        .into_iter()
        .map(|(_, path)| ArchiveEntry::from_path(path))
        .collect();
    if entries.is_empty() {
        warn!("⚠️ No JSON shards to archive in {:?}", dir);
        bail!("No shards found in {:?}", dir);
    }

    let archive = dir.join(JSON_ZIP);
    write_archive(&archive, &entries)?;
    Ok(archive)
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("Failed to create {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalUrl, FieldKind, Record};
    use crate::infrastructure::shard_store::ShardWriter;

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("url", FieldKind::Url)
            .field("CompanyName", FieldKind::Text)
            .field("Website", FieldKind::Url)
    }

    fn paths(dir: &Path) -> PathsConfig {
        PathsConfig {
            output_dir: dir.to_path_buf(),
            ..PathsConfig::default()
        }
    }

    #[test]
    fn merges_shards_in_index_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ShardWriter::open(dir.path(), dir.path(), "saas_data", 2, schema()).unwrap();
        for i in 0..3 {
            let mut record = Record::for_url(&CanonicalUrl::new(format!("https://x.test/{i}")));
            record.set_text("Website", Some(format!("https://site{i}.example")));
            writer.append(record);
            writer.flush_if_full().unwrap();
        }
        writer.flush_remainder().unwrap();

        let summary = consolidate(&paths(dir.path()), &schema()).unwrap();
        assert_eq!(summary.shards, 2);
        assert_eq!(summary.records, 3);

        let two_columns = std::fs::read_to_string(&summary.two_columns_csv).unwrap();
        assert_eq!(
            two_columns,
            "saashub_url,Website\n\
             https://x.test/0,https://site0.example\n\
             https://x.test/1,https://site1.example\n\
             https://x.test/2,https://site2.example\n"
        );
        assert!(summary.archive.exists());

        let json_zip = archive_json_shards(&paths(dir.path())).unwrap();
        let archive = zip::ZipArchive::new(File::open(json_zip).unwrap()).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn no_shards_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(consolidate(&paths(dir.path()), &schema()).is_err());
        assert!(archive_json_shards(&paths(dir.path())).is_err());
    }
}
