use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use rollcall_core::{AttendanceRecord, IdentityProfile};
use serde::{Deserialize, Serialize};

use crate::{AttendanceStore, IdentityStore, StoreError};

/// File-backed key-value blob store.
///
/// The whole document lives in memory behind a mutex and is rewritten on
/// every mutation — write to a sibling temp file, then rename, so readers
/// never observe a half-written document. Suited to the single-daemon,
/// handful-of-identities deployments this serves; it is not a database.
pub struct JsonStore {
    path: PathBuf,
    inner: Mutex<Document>,
}

#[derive(Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    profiles: HashMap<String, IdentityProfile>,
    #[serde(default)]
    records: Vec<AttendanceRecord>,
}

impl JsonStore {
    /// Open the store at `path`, creating an empty document if the file
    /// does not exist yet. A file that exists but fails to parse is a
    /// [`StoreError::Corrupt`] — never silently truncated.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let doc = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "store file absent, starting empty");
                Document::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, inner: Mutex::new(doc) })
    }

    fn lock(&self) -> MutexGuard<'_, Document> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl IdentityStore for JsonStore {
    fn get(&self, identity: &str) -> Result<Option<IdentityProfile>, StoreError> {
        Ok(self.lock().profiles.get(identity).cloned())
    }

    fn put(&self, profile: IdentityProfile) -> Result<(), StoreError> {
        let mut doc = self.lock();
        doc.profiles.insert(profile.identity.clone(), profile);
        self.persist(&doc)
    }

    fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        let mut doc = self.lock();
        let removed = doc.profiles.remove(identity).is_some();
        if removed {
            self.persist(&doc)?;
        }
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.lock().profiles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl AttendanceStore for JsonStore {
    fn insert_if_absent(&self, record: AttendanceRecord) -> Result<bool, StoreError> {
        let mut doc = self.lock();
        let date = record.timestamp.date_naive();
        let duplicate = doc
            .records
            .iter()
            .any(|r| r.identity == record.identity && r.timestamp.date_naive() == date);
        if duplicate {
            return Ok(false);
        }
        doc.records.push(record);
        self.persist(&doc)?;
        Ok(true)
    }

    fn records_for(&self, identity: &str) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| r.identity == identity)
            .cloned()
            .collect())
    }

    fn records_on(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self
            .lock()
            .records
            .iter()
            .filter(|r| r.timestamp.date_naive() == date)
            .cloned()
            .collect())
    }

    fn all_records(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        Ok(self.lock().records.clone())
    }

    fn clear_records(&self) -> Result<(), StoreError> {
        let mut doc = self.lock();
        doc.records.clear();
        self.persist(&doc)
    }
}
