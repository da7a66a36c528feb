//! In-memory transcript store
//!
//! The default store used in tests and single-node deployments. Records are
//! kept per (clinician, appointment) with the segment list in append order
//! plus the last recording activity time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;

use super::SessionKey;
use super::store::{StoreError, TranscriptSegment, TranscriptStore};

#[derive(Default)]
struct AppointmentRecord {
    transcriptions: Vec<Arc<TranscriptSegment>>,
    recorded_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryTranscriptStore {
    records: DashMap<SessionKey, AppointmentRecord>,
}

impl MemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recording activity for an appointment, if any audio produced a
    /// finalized segment.
    pub fn recorded_at(&self, key: &SessionKey) -> Option<DateTime<Utc>> {
        self.records.get(key).and_then(|r| r.recorded_at)
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscriptStore {
    async fn append(
        &self,
        key: &SessionKey,
        segment: Arc<TranscriptSegment>,
    ) -> Result<(), StoreError> {
        let mut record = self.records.entry(key.clone()).or_default();
        record.transcriptions.push(segment);
        record.recorded_at = Some(Utc::now());
        Ok(())
    }

    async fn list_all(&self, key: &SessionKey) -> Result<Vec<Arc<TranscriptSegment>>, StoreError> {
        Ok(self
            .records
            .get(key)
            .map(|r| r.transcriptions.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(text: &str) -> Arc<TranscriptSegment> {
        Arc::new(TranscriptSegment::from_recognized(text).unwrap())
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = MemoryTranscriptStore::new();
        let key = SessionKey::new("u1", "a1");

        store.append(&key, segment("first")).await.unwrap();
        store.append(&key, segment("second")).await.unwrap();
        store.append(&key, segment("third")).await.unwrap();

        let all = store.list_all(&key).await.unwrap();
        let texts: Vec<&str> = all.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_list_all_unknown_key_is_empty() {
        let store = MemoryTranscriptStore::new();
        let key = SessionKey::new("u1", "missing");

        assert!(store.list_all(&key).await.unwrap().is_empty());
        assert!(store.recorded_at(&key).is_none());
    }

    #[tokio::test]
    async fn test_append_stamps_recorded_at() {
        let store = MemoryTranscriptStore::new();
        let key = SessionKey::new("u1", "a1");

        assert!(store.recorded_at(&key).is_none());
        store.append(&key, segment("hello")).await.unwrap();
        assert!(store.recorded_at(&key).is_some());
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let store = MemoryTranscriptStore::new();
        let a = SessionKey::new("u1", "a1");
        let b = SessionKey::new("u2", "a1");

        store.append(&a, segment("for a")).await.unwrap();

        assert_eq!(store.list_all(&a).await.unwrap().len(), 1);
        assert!(store.list_all(&b).await.unwrap().is_empty());
    }
}
