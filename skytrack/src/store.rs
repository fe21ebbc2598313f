use crate::category::Category;
use crate::{Error, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One stored field map plus its write timestamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Record {
    pub data: serde_json::Map<String, serde_json::Value>,
    pub last_updated: String,
}

/// On-disk shape: satellite name -> category key -> record.
type Document = BTreeMap<String, BTreeMap<String, Record>>;

/// Owns the backing JSON file. All reads and writes of satellite records go
/// through this type; writes replace the whole record for a (name, category)
/// pair and persist the full document atomically before returning.
///
/// No internal locking: callers are expected to serialize access (the CLI is
/// single-writer).
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    doc: Document,
}

impl RecordStore {
    /// A missing or unparsable backing file is treated as an empty store.
    /// Any other read failure propagates, so an unreadable file is never
    /// silently replaced by the next write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let doc = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(doc) => doc,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "store file is corrupt, starting empty");
                    Document::new()
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Document::new(),
            Err(source) => return Err(Error::StoreRead { path, source }),
        };

        Ok(Self { path, doc })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, satellite_name: &str, category: Category) -> Option<&Record> {
        self.doc.get(satellite_name)?.get(category.key())
    }

    /// Upserts the record for (name, category) with a fresh timestamp and
    /// persists synchronously.
    pub fn append(
        &mut self,
        satellite_name: &str,
        category: Category,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Result<()> {
        let record = Record {
            data,
            last_updated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        self.doc
            .entry(satellite_name.to_string())
            .or_default()
            .insert(category.key().to_string(), record);

        self.persist()
    }

    /// Every distinct satellite name with at least one stored category.
    pub fn list_satellites(&self) -> BTreeSet<String> {
        self.doc
            .iter()
            .filter(|(_, categories)| !categories.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Removes every category for the name. Idempotent.
    pub fn delete(&mut self, satellite_name: &str) -> Result<()> {
        if self.doc.remove(satellite_name).is_none() {
            return Ok(());
        }
        self.persist()
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.doc)?)
    }

    /// Write-temp-then-rename so the file is never observed half-written.
    fn persist(&self) -> Result<()> {
        let tmp = self.path.with_extension("json.tmp");

        let bytes = serde_json::to_vec_pretty(&self.doc)?;

        fs::write(&tmp, &bytes).map_err(|source| Error::StoreWrite {
            path: tmp.clone(),
            source,
        })?;

        fs::rename(&tmp, &self.path).map_err(|source| Error::StoreWrite {
            path: self.path.clone(),
            source,
        })?;

        Ok(())
    }
}
