//! ZIP bundling of output files

use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::infrastructure::tabular::ExportError;

/// One archive member: the file on disk and its name inside the archive
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub source: PathBuf,
    pub name: String,
}

impl ArchiveEntry {
    /// Member named after the source file
    pub fn from_path(source: impl Into<PathBuf>) -> Self {
        let source = source.into();
        let name = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { source, name }
    }
}

/// Write a deflate-compressed archive, returning the member count
pub fn write_archive(destination: &Path, entries: &[ArchiveEntry]) -> Result<usize, ExportError> {
    if entries.is_empty() {
        return Err(ExportError::Empty(destination.display().to_string()));
    }

    let mut zip = ZipWriter::new(File::create(destination)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        let mut reader = BufReader::new(File::open(&entry.source)?);
        io::copy(&mut reader, &mut zip)?;
    }
    zip.finish()?;

    info!("📦 Archived {} files into {}", entries.len(), destination.display());
    Ok(entries.len())
}
