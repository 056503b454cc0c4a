use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use rollcall_core::{AttendanceRecord, IdentityProfile};

use crate::{AttendanceStore, IdentityStore, StoreError};

/// In-memory store for tests and ephemeral runs. Clones share state.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    profiles: HashMap<String, IdentityProfile>,
    records: Vec<AttendanceRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl IdentityStore for MemoryStore {
    fn get(&self, identity: &str) -> Result<Option<IdentityProfile>, StoreError> {
        Ok(self.lock().profiles.get(identity).cloned())
    }

    fn put(&self, profile: IdentityProfile) -> Result<(), StoreError> {
        self.lock().profiles.insert(profile.identity.clone(), profile);
        Ok(())
    }

    fn remove(&self, identity: &str) -> Result<bool, StoreError> {
        Ok(self.lock().profiles.remove(identity).is_some())
    }

    fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self.lock().profiles.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl AttendanceStore for MemoryStore {
    fn insert_if_absent(&self, record: AttendanceRecord) -> Result<bool, StoreError> {
        let mut inner = self.lock();
        let date = record.timestamp.date_naive();
        let duplicate = inner
            .records
            .iter()
            .any(|r| r.identity == record.identity && r.timestamp.date_naive() == date);
        if duplicate {
            return Ok(false);
        }
        inner.records.push(record);
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
        self.lock().records.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rollcall_core::FeatureRecord;

    fn profile(identity: &str) -> IdentityProfile {
        IdentityProfile {
            identity: identity.into(),
            record: FeatureRecord {
                aspect_ratio: 0.8,
                features: None,
                landmarks: vec![],
                probability: 0.95,
            },
            image: vec![0xde, 0xad],
            enrolled_at: Utc::now(),
        }
    }

    #[test]
    fn test_profile_crud() {
        let store = MemoryStore::new();
        assert!(store.get("alice").unwrap().is_none());

        store.put(profile("alice")).unwrap();
        store.put(profile("bob")).unwrap();
        assert_eq!(store.get("alice").unwrap().unwrap().identity, "alice");
        assert_eq!(store.list().unwrap(), vec!["alice", "bob"]);

        assert!(store.remove("alice").unwrap());
        assert!(!store.remove("alice").unwrap());
        assert!(store.get("alice").unwrap().is_none());
    }

    #[test]
    fn test_reenroll_replaces_profile() {
        let store = MemoryStore::new();
        store.put(profile("alice")).unwrap();

        let mut updated = profile("alice");
        updated.record.probability = 0.5;
        store.put(updated).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        let got = store.get("alice").unwrap().unwrap();
        assert!((got.record.probability - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_insert_if_absent_guards_same_day() {
        let store = MemoryStore::new();

        assert!(store.insert_if_absent(AttendanceRecord::present("alice", 0.9)).unwrap());
        // Second attempt the same day is refused
        assert!(!store.insert_if_absent(AttendanceRecord::present("alice", 0.95)).unwrap());
        // A different identity is unaffected
        assert!(store.insert_if_absent(AttendanceRecord::present("bob", 0.8)).unwrap());

        assert_eq!(store.records_for("alice").unwrap().len(), 1);
        assert_eq!(store.all_records().unwrap().len(), 2);
    }

    #[test]
    fn test_insert_if_absent_allows_next_day() {
        let store = MemoryStore::new();

        let mut yesterday = AttendanceRecord::present("alice", 0.9);
        yesterday.timestamp -= Duration::days(1);
        assert!(store.insert_if_absent(yesterday).unwrap());

        assert!(store.insert_if_absent(AttendanceRecord::present("alice", 0.9)).unwrap());
        assert_eq!(store.records_for("alice").unwrap().len(), 2);
    }

    #[test]
    fn test_records_on_filters_by_date() {
        let store = MemoryStore::new();

        let mut old = AttendanceRecord::present("alice", 0.9);
        old.timestamp -= Duration::days(3);
        store.insert_if_absent(old).unwrap();
        store.insert_if_absent(AttendanceRecord::present("bob", 0.8)).unwrap();

        let today = Utc::now().date_naive();
        let todays = store.records_on(today).unwrap();
        assert_eq!(todays.len(), 1);
        assert_eq!(todays[0].identity, "bob");
    }

    #[test]
    fn test_clear_records_keeps_profiles() {
        let store = MemoryStore::new();
        store.put(profile("alice")).unwrap();
        store.insert_if_absent(AttendanceRecord::present("alice", 0.9)).unwrap();

        store.clear_records().unwrap();
        assert!(store.all_records().unwrap().is_empty());
        assert!(store.get("alice").unwrap().is_some());
    }
}
