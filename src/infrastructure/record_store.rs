//! Record store adapters
//!
//! `InMemoryRecordStore` keeps records per subject in memory and backs both
//! tests and the file store. `JsonFileRecordStore` loads a JSON document that
//! maps subject ids to arrays of call records.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, info, instrument};

use crate::application::ports::{RecordBatch, RecordStore};
use crate::domain::{CallRecord, DateRange, RecordStoreError, SubjectId};

#[derive(Debug, Default)]
pub struct InMemoryRecordStore {
    subjects: RwLock<HashMap<SubjectId, Vec<CallRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(subjects: HashMap<SubjectId, Vec<CallRecord>>) -> Self {
        Self {
            subjects: RwLock::new(subjects),
        }
    }

    /// Register `subject` without any calls
    pub fn add_subject(&self, subject: SubjectId) {
        self.subjects.write().entry(subject).or_default();
    }

    pub fn insert(&self, subject: SubjectId, record: CallRecord) {
        self.subjects.write().entry(subject).or_default().push(record);
    }

    pub fn extend(&self, subject: SubjectId, records: impl IntoIterator<Item = CallRecord>) {
        self.subjects
            .write()
            .entry(subject)
            .or_default()
            .extend(records);
    }

    fn in_range(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<Vec<CallRecord>, RecordStoreError> {
        let subjects = self.subjects.read();
        let records = subjects
            .get(subject)
            .ok_or_else(|| RecordStoreError::NotFound(subject.clone()))?;
        Ok(records
            .iter()
            .filter(|record| range.contains(record.occurred_at))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn fetch_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<RecordBatch, RecordStoreError> {
        let records = self.in_range(subject, range)?;
        debug!(subject = %subject, count = records.len(), "records fetched");
        Ok(RecordBatch::new(records))
    }

    async fn count_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<usize, RecordStoreError> {
        let subjects = self.subjects.read();
        let records = subjects
            .get(subject)
            .ok_or_else(|| RecordStoreError::NotFound(subject.clone()))?;
        Ok(records
            .iter()
            .filter(|record| range.contains(record.occurred_at))
            .count())
    }
}

/// Read-only store loaded from a JSON file
#[derive(Debug)]
pub struct JsonFileRecordStore {
    inner: InMemoryRecordStore,
}

impl JsonFileRecordStore {
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> crate::Result<Self> {
        let raw = tokio::fs::read(path.as_ref()).await?;
        let subjects: HashMap<SubjectId, Vec<CallRecord>> = serde_json::from_slice(&raw)?;
        info!(subjects = subjects.len(), "record file loaded");
        Ok(Self {
            inner: InMemoryRecordStore::from_map(subjects),
        })
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn fetch_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<RecordBatch, RecordStoreError> {
        self.inner.fetch_records(subject, range).await
    }

    async fn count_records(
        &self,
        subject: &SubjectId,
        range: &DateRange,
    ) -> Result<usize, RecordStoreError> {
        self.inner.count_records(subject, range).await
    }
}
