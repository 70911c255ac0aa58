//! Sync metadata persistence and change detection
//!
//! One [`SyncRecord`] exists per relative path iff that path has been
//! successfully embedded and upserted at least once. The whole record set is
//! persisted as a single JSON snapshot: read fully at pass start, rewritten
//! fully at pass end through a temp file + rename so a crash never leaves a
//! partially written snapshot behind.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Metadata for one successfully synced file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRecord {
    /// Last-known content revision of the file
    pub revision_token: String,

    /// Revision of the whole repository at the time of the sync (audit only)
    pub repo_revision: String,

    /// Collection the file's chunks were written to
    pub collection: String,

    /// Vector-store point ids written for this file
    pub point_ids: Vec<Uuid>,

    /// When the record was written
    pub last_synced: DateTime<Utc>,
}

/// Decide whether a file needs to be re-embedded.
///
/// True when the path has never been synced or its stored token differs from
/// the freshly computed one. Pure comparison; never touches the store.
pub fn should_sync(record: Option<&SyncRecord>, current_token: &str) -> bool {
    match record {
        None => true,
        Some(r) => r.revision_token != current_token,
    }
}

/// Ordered mapping from relative path to [`SyncRecord`], persisted as a
/// whole-file snapshot. Exclusively owned by one sync pass at a time.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    records: BTreeMap<String, SyncRecord>,
}

impl MetadataStore {
    /// Load the snapshot at `path`; a missing file is an empty store
    pub fn load(path: &Path) -> Result<Self> {
        let records = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            debug!("No sync state at {:?}, starting empty", path);
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    /// Write the full snapshot atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            Error::Validation(format!(
                "sync state path {} has no parent directory",
                self.path.display()
            ))
        })?;
        std::fs::create_dir_all(parent)?;

        let tmp = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} sync records to {:?}", self.records.len(), self.path);
        Ok(())
    }

    pub fn get(&self, rel_path: &str) -> Option<&SyncRecord> {
        self.records.get(rel_path)
    }

    /// Insert or overwrite the record for a path. Only called after a file's
    /// chunks have all been embedded and upserted.
    pub fn insert(&mut self, rel_path: String, record: SyncRecord) {
        self.records.insert(rel_path, record);
    }

    /// Drop all records (used when a collection is rebuilt from scratch)
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SyncRecord)> {
        self.records.iter()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
