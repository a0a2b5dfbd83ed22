//! Deployment history
//!
//! A bounded, newest-first list of successful deployments, persisted as a
//! JSON array under a single key of a [`KvStore`].

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backends::KvStore;
use crate::repo::RepositoryIdentity;

/// Storage key for the serialized history
pub const HISTORY_KEY: &str = "deployment_history_v2";

/// Maximum number of records kept
pub const HISTORY_LIMIT: usize = 50;

/// One successful deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// Creation time in epoch milliseconds
    pub id: i64,
    pub site_url: String,
    pub files_count: usize,
    pub repo_url: String,
    pub repo_owner: String,
    pub repo_name: String,
    pub deployed_at: DateTime<Utc>,
    /// Same instant as `deployed_at`, in epoch milliseconds
    pub timestamp: i64,
}

impl DeploymentRecord {
    pub fn new(
        site_url: impl Into<String>,
        files_count: usize,
        identity: &RepositoryIdentity,
        deployed_at: DateTime<Utc>,
    ) -> Self {
        let millis = deployed_at.timestamp_millis();
        Self {
            id: millis,
            site_url: site_url.into(),
            files_count,
            repo_url: identity.original_url.clone(),
            repo_owner: identity.owner.clone(),
            repo_name: identity.name.clone(),
            deployed_at,
            timestamp: millis,
        }
    }
}

/// In-memory newest-first list capped at `limit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentHistory {
    records: Vec<DeploymentRecord>,
    limit: usize,
}

impl Default for DeploymentHistory {
    fn default() -> Self {
        Self::with_limit(HISTORY_LIMIT)
    }
}

impl DeploymentHistory {
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    /// Build from stored records, trimming anything past the cap
    pub fn from_records(mut records: Vec<DeploymentRecord>, limit: usize) -> Self {
        records.truncate(limit);
        Self { records, limit }
    }

    /// Prepend a record, evicting the oldest past the cap
    pub fn push(&mut self, record: DeploymentRecord) {
        self.records.insert(0, record);
        self.records.truncate(self.limit);
    }

    pub fn records(&self) -> &[DeploymentRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

/// Reads and writes the history through a key/value store
#[derive(Clone)]
pub struct HistoryStore {
    kv: Arc<dyn KvStore>,
    limit: usize,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            limit: HISTORY_LIMIT,
        }
    }

    /// Store keeping at most `limit` records
    pub fn with_limit(kv: Arc<dyn KvStore>, limit: usize) -> Self {
        Self { kv, limit }
    }

    /// Load stored history; a missing key yields an empty history
    pub async fn load(&self) -> Result<DeploymentHistory> {
        let Some(raw) = self.kv.get(HISTORY_KEY).await? else {
            return Ok(DeploymentHistory::with_limit(self.limit));
        };
        let records: Vec<DeploymentRecord> =
            serde_json::from_str(&raw).context("Stored deployment history is not valid JSON")?;
        Ok(DeploymentHistory::from_records(records, self.limit))
    }

    /// Load, falling back to an empty history on any error
    pub async fn load_or_default(&self) -> DeploymentHistory {
        match self.load().await {
            Ok(history) => history,
            Err(e) => {
                tracing::error!("Error loading deployment history: {:#}", e);
                DeploymentHistory::with_limit(self.limit)
            }
        }
    }

    pub async fn save(&self, history: &DeploymentHistory) -> Result<()> {
        let raw = serde_json::to_string(history.records())?;
        self.kv.set(HISTORY_KEY, &raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        self.kv.delete(HISTORY_KEY).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryKv {
        data: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl KvStore for MemoryKv {
        async fn get(&self, key: &str) -> Result<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &str) -> Result<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.data.lock().unwrap().remove(key);
            Ok(())
        }
    }

    fn record(n: i64) -> DeploymentRecord {
        let identity = RepositoryIdentity::parse("https://github.com/octo/site").unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000 + n).unwrap();
        DeploymentRecord::new(format!("https://s{n}.site.localhost"), 3, &identity, at)
    }

    #[test]
    fn test_record_fields() {
        let r = record(5);
        assert_eq!(r.id, 1_700_000_000_005);
        assert_eq!(r.timestamp, r.id);
        assert_eq!(r.repo_owner, "octo");
        assert_eq!(r.repo_name, "site");
        assert_eq!(r.repo_url, "https://github.com/octo/site");
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(record(1)).unwrap();
        assert!(json.get("siteUrl").is_some());
        assert!(json.get("filesCount").is_some());
        assert!(json.get("deployedAt").is_some());
        assert!(json.get("repoOwner").is_some());
    }

    #[test]
    fn test_newest_first_and_capped() {
        let mut history = DeploymentHistory::default();
        for n in 0..51 {
            history.push(record(n));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.records()[0].id, record(50).id);
        // record 0 was the oldest and got evicted by the 51st insert
        assert_eq!(history.records().last().unwrap().id, record(1).id);
        assert!(history.records().iter().all(|r| r.id != record(0).id));
    }

    #[tokio::test]
    async fn test_store_round_trip_and_clear() {
        let store = HistoryStore::new(Arc::new(MemoryKv::default()));
        assert!(store.load().await.unwrap().is_empty());

        let mut history = store.load().await.unwrap();
        history.push(record(1));
        history.push(record(2));
        store.save(&history).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, history);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_history_falls_back_to_empty() {
        let kv = Arc::new(MemoryKv::default());
        kv.set(HISTORY_KEY, "{not json").await.unwrap();
        let store = HistoryStore::new(kv);

        assert!(store.load().await.is_err());
        assert!(store.load_or_default().await.is_empty());
    }
}
