//! Sharded record persistence
//!
//! Each shard `i` is a pair of files named `<prefix>_<i>.json` (array of records)
//! and `<prefix>_<i>.csv` (schema columns). The writer alone assigns shard
//! indices, advancing only when a shard is closed, so every shard but the
//! highest holds exactly `capacity` records.

#![allow(clippy::uninlined_format_args)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Record, RecordSchema};
use crate::infrastructure::tabular::{self, ExportError};

#[derive(Error, Debug)]
pub enum ShardError {
    #[error("Shard I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Shard encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shard table export failed: {0}")]
    Export(#[from] ExportError),

    #[error("Shard capacity must be at least 1")]
    ZeroCapacity,
}

/// A shard read back from disk
#[derive(Debug, Clone)]
pub struct Shard {
    pub index: u64,
    pub path: PathBuf,
    pub records: Vec<Record>,
}

/// Write `bytes` to a sibling temp file, then rename over `path`
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(temp_path, path)
}

/// Shard index of `<prefix>_<digits>.json`, `None` for any other name
pub fn shard_index(file_name: &str, prefix: &str) -> Option<u64> {
    let digits = file_name
        .strip_prefix(prefix)?
        .strip_prefix('_')?
        .strip_suffix(".json")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Shard JSON files in `dir`, sorted by index. A missing directory has no shards.
pub fn list_shards(dir: &Path, prefix: &str) -> io::Result<Vec<(u64, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => return Err(error),
    };

    let mut shards = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(|name| shard_index(name, prefix)) {
            shards.push((index, entry.path()));
        }
    }
    shards.sort_by_key(|(index, _)| *index);
    Ok(shards)
}

fn load_shard(path: &Path) -> Result<Vec<Record>, ShardError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Every readable shard in index order; unreadable files are skipped with a warning
pub fn read_shards(dir: &Path, prefix: &str) -> io::Result<Vec<Shard>> {
    let mut shards = Vec::new();
    for (index, path) in list_shards(dir, prefix)? {
        match load_shard(&path) {
            Ok(records) => shards.push(Shard { index, path, records }),
            Err(error) => warn!("⚠️ Skipping unreadable shard {}: {}", path.display(), error),
        }
    }
    Ok(shards)
}

/// Buffers accepted records and closes full shards
#[derive(Debug)]
pub struct ShardWriter {
    json_dir: PathBuf,
    csv_dir: PathBuf,
    prefix: String,
    capacity: usize,
    schema: RecordSchema,
    index: u64,
    buffer: Vec<Record>,
    closed: u64,
}

impl ShardWriter {
    /// Open a writer, re-opening the highest existing shard while it has room
    pub fn open(
        json_dir: impl Into<PathBuf>,
        csv_dir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        capacity: usize,
        schema: RecordSchema,
    ) -> Result<Self, ShardError> {
        if capacity == 0 {
            return Err(ShardError::ZeroCapacity);
        }
        let json_dir = json_dir.into();
        let csv_dir = csv_dir.into();
        let prefix = prefix.into();
        fs::create_dir_all(&json_dir)?;
        fs::create_dir_all(&csv_dir)?;

        let (index, buffer) = match list_shards(&json_dir, &prefix)?.pop() {
            None => (0, Vec::new()),
            Some((last, path)) => match load_shard(&path) {
                Ok(records) if records.len() < capacity => {
                    info!("📂 Re-opening shard {} with {} records", last, records.len());
                    (last, records)
                }
                Ok(_) => (last + 1, Vec::new()),
                Err(error) => {
                    warn!("⚠️ Shard {} is unreadable ({}), starting shard {}", path.display(), error, last + 1);
                    (last + 1, Vec::new())
                }
            },
        };

        Ok(Self {
            json_dir,
            csv_dir,
            prefix,
            capacity,
            schema,
            index,
            buffer,
            closed: 0,
        })
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index of the shard currently open for appends
    pub const fn current_index(&self) -> u64 {
        self.index
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Shards closed by this writer
    pub const fn shards_written(&self) -> u64 {
        self.closed
    }

    pub fn json_path(&self, index: u64) -> PathBuf {
        self.json_dir.join(format!("{}_{}.json", self.prefix, index))
    }

    pub fn csv_path(&self, index: u64) -> PathBuf {
        self.csv_dir.join(format!("{}_{}.csv", self.prefix, index))
    }

    pub fn append(&mut self, record: Record) {
        self.buffer.push(record);
    }

    /// Close the open shard when it reached capacity
    pub fn flush_if_full(&mut self) -> Result<bool, ShardError> {
        if self.buffer.len() < self.capacity {
            return Ok(false);
        }
        self.close_current()?;
        Ok(true)
    }

    /// Persist the open, partial shard without closing it
    pub fn sync(&mut self) -> Result<(), ShardError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        self.write_current()?;
        debug!("Synced shard {} ({} records)", self.index, self.buffer.len());
        Ok(())
    }

    /// Close the final, possibly under-capacity shard
    pub fn flush_remainder(&mut self) -> Result<Option<u64>, ShardError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let index = self.index;
        self.close_current()?;
        Ok(Some(index))
    }

    fn close_current(&mut self) -> Result<(), ShardError> {
        self.write_current()?;
        info!("💾 Saved shard {} with {} records", self.index, self.buffer.len());
        self.buffer.clear();
        self.index += 1;
        self.closed += 1;
        Ok(())
    }

    fn write_current(&self) -> Result<(), ShardError> {
        let json = serde_json::to_vec_pretty(&self.buffer)?;
        write_atomic(&self.json_path(self.index), &json)?;

        let mut table = Vec::new();
        tabular::write_records(&mut table, &self.schema, &self.buffer)?;
        write_atomic(&self.csv_path(self.index), &table)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalUrl, FieldKind};
    use tempfile::TempDir;

    fn schema() -> RecordSchema {
        RecordSchema::new()
            .field("url", FieldKind::Url)
            .field("CompanyName", FieldKind::Text)
    }

    fn record(i: usize) -> Record {
        let mut record = Record::for_url(&CanonicalUrl::new(format!("https://x.test/{i}")));
        record.set_text("CompanyName", Some(format!("Company {i}")));
        record
    }

    fn writer(dir: &TempDir, capacity: usize) -> ShardWriter {
        ShardWriter::open(dir.path(), dir.path(), "saas_data", capacity, schema()).unwrap()
    }

    #[test]
    fn recognises_only_numbered_json_shards() {
        assert_eq!(shard_index("saas_data_0.json", "saas_data"), Some(0));
        assert_eq!(shard_index("saas_data_17.json", "saas_data"), Some(17));
        assert_eq!(shard_index("saas_data_17.csv", "saas_data"), None);
        assert_eq!(shard_index("saas_data_.json", "saas_data"), None);
        assert_eq!(shard_index("saas_data_x1.json", "saas_data"), None);
        assert_eq!(shard_index("last_processed_info.json", "saas_data"), None);
    }

    #[test]
    fn full_shards_close_and_advance() {
        let dir = TempDir::new().unwrap();
        let mut shards = writer(&dir, 2);
        for i in 0..5 {
            shards.append(record(i));
            shards.flush_if_full().unwrap();
        }
        assert_eq!(shards.shards_written(), 2);
        assert_eq!(shards.flush_remainder().unwrap(), Some(2));

        let read = read_shards(dir.path(), "saas_data").unwrap();
        let sizes: Vec<usize> = read.iter().map(|s| s.records.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(dir.path().join("saas_data_1.csv").exists());
    }

    #[test]
    fn partial_shard_is_reopened() {
        let dir = TempDir::new().unwrap();
        let mut first = writer(&dir, 3);
        first.append(record(0));
        first.append(record(1));
        first.flush_remainder().unwrap();

        let mut second = writer(&dir, 3);
        assert_eq!(second.current_index(), 0);
        assert_eq!(second.buffered(), 2);
        second.append(record(2));
        assert!(second.flush_if_full().unwrap());

        let read = read_shards(dir.path(), "saas_data").unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].records.len(), 3);
    }

    #[test]
    fn sync_persists_without_closing() {
        let dir = TempDir::new().unwrap();
        let mut shards = writer(&dir, 10);
        shards.append(record(0));
        shards.sync().unwrap();
        assert_eq!(shards.current_index(), 0);
        assert_eq!(shards.shards_written(), 0);
        assert_eq!(read_shards(dir.path(), "saas_data").unwrap()[0].records.len(), 1);
    }

    #[test]
    fn unreadable_shards_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("saas_data_0.json"), "not json").unwrap();
        fs::write(dir.path().join("saas_data_1.json"), "[]").unwrap();
        let read = read_shards(dir.path(), "saas_data").unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].index, 1);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = ShardWriter::open(dir.path(), dir.path(), "saas_data", 0, schema());
        assert!(matches!(result, Err(ShardError::ZeroCapacity)));
    }
}
