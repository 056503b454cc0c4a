//! rollcall-store — identity-profile and attendance-record persistence.
//!
//! Storage is a key-value blob: one JSON document holding every enrolled
//! profile and attendance record, rewritten on each mutation. The decision
//! engine never touches these traits directly — the service layer reads
//! profiles and today's records, and appends new records on acceptance.

mod json_store;
mod memory;

pub use json_store::JsonStore;
pub use memory::MemoryStore;

use chrono::NaiveDate;
use rollcall_core::{AttendanceRecord, IdentityProfile};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt store document: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Read/write access to enrolled identity profiles.
///
/// One profile per identity; re-enrolling replaces the previous capture.
pub trait IdentityStore: Send + Sync {
    fn get(&self, identity: &str) -> Result<Option<IdentityProfile>, StoreError>;
    fn put(&self, profile: IdentityProfile) -> Result<(), StoreError>;
    fn remove(&self, identity: &str) -> Result<bool, StoreError>;
    fn list(&self) -> Result<Vec<String>, StoreError>;
}

/// Append-only attendance log with an atomic once-per-day guard.
pub trait AttendanceStore: Send + Sync {
    /// Insert `record` unless one already exists for the same identity on
    /// the same calendar date, and report whether the insert happened.
    ///
    /// This is the authoritative duplicate guard; the decision engine's
    /// pre-check against already-read records is advisory only.
    fn insert_if_absent(&self, record: AttendanceRecord) -> Result<bool, StoreError>;
    fn records_for(&self, identity: &str) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn records_on(&self, date: NaiveDate) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn all_records(&self) -> Result<Vec<AttendanceRecord>, StoreError>;
    fn clear_records(&self) -> Result<(), StoreError>;
}
