use super::{RecordProvider, SourceError, TargetDirectory};
use crate::optimizer::{HistoricalRecord, Target};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk shape of one target's export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordFile {
    pub name: String,
    #[serde(default)]
    pub records: Vec<HistoricalRecord>,
}

/// Reads targets from a directory holding one JSON export per target, named by [`JsonRecordSource::file_for`].
pub struct JsonRecordSource {
    dir: PathBuf,
}

impl JsonRecordSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the export file for `target`.
    ///
    /// Ids map to `<id>.json`, names to `name-<percent-encoded name>.json`, so
    /// distinct targets never share a file.
    pub fn file_for(&self, target: &Target) -> PathBuf {
        let file_name = match target {
            Target::Id(id) => format!("{}.json", id),
            Target::Name(name) => format!("name-{}.json", urlencoding::encode(name)),
        };
        self.dir.join(file_name)
    }

    fn read(&self, target: &Target) -> Result<RecordFile, SourceError> {
        let path = self.file_for(target);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::TargetNotFound(target.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        let file: RecordFile = serde_json::from_str(&content)?;
        debug!(
            "Read {} records for target {} from {:?}",
            file.records.len(),
            target,
            path
        );
        Ok(file)
    }

    /// Write an export for `target`, replacing any previous one.
    pub fn write(&self, target: &Target, file: &RecordFile) -> Result<PathBuf, SourceError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_for(target);
        std::fs::write(&path, serde_json::to_vec_pretty(file)?)?;
        Ok(path)
    }
}

impl TargetDirectory for JsonRecordSource {
    fn display_name(&self, target: &Target) -> Result<String, SourceError> {
        Ok(self.read(target)?.name)
    }
}

impl RecordProvider for JsonRecordSource {
    fn records(&self, target: &Target) -> Result<Vec<HistoricalRecord>, SourceError> {
        Ok(self.read(target)?.records)
    }
}
