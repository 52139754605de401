//! Durable set of acknowledged notification ids.
//!
//! The set is stored as a JSON-encoded string array under one namespaced
//! key of the durable key/value store. It only grows: `mark_all_read` is a
//! union, and there is no eviction. Ids of deleted tasks stay in the set
//! harmlessly.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::storage::KvStore;

/// Read-marker persistence seam.
pub trait ReadMarkerStore: Send + Sync {
    /// The whole set, used for the per-tick overlay.
    fn load(&self) -> Result<BTreeSet<String>>;

    fn is_read(&self, id: &str) -> Result<bool> {
        Ok(self.load()?.contains(id))
    }

    fn mark_read(&self, id: &str) -> Result<()>;

    /// Add every id; never removes existing ones.
    fn mark_all_read(&self, ids: &[String]) -> Result<()>;
}

/// Read markers in the durable key/value store.
#[derive(Debug, Clone)]
pub struct KvReadMarkerStore {
    kv: KvStore,
    key: String,
}

impl KvReadMarkerStore {
    pub fn new(kv: KvStore, key: impl Into<String>) -> Self {
        Self { kv, key: key.into() }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    fn decode(&self, raw: Option<&str>) -> Result<BTreeSet<String>> {
        match raw {
            None => Ok(BTreeSet::new()),
            Some(raw) => {
                let ids: Vec<String> = serde_json::from_str(raw).map_err(|err| {
                    Error::OperationFailed(format!("corrupt read markers under '{}': {err}", self.key))
                })?;
                Ok(ids.into_iter().collect())
            }
        }
    }

    fn union(&self, ids: &[String]) -> Result<usize> {
        self.kv.update(&self.key, |current| {
            let mut set = self.decode(current)?;
            let before = set.len();
            set.extend(ids.iter().cloned());
            let added = set.len() - before;
            let encoded = serde_json::to_string(&set.into_iter().collect::<Vec<_>>())?;
            Ok((encoded, added))
        })
    }
}

impl ReadMarkerStore for KvReadMarkerStore {
    fn load(&self) -> Result<BTreeSet<String>> {
        let raw = self.kv.get(&self.key)?;
        self.decode(raw.as_deref())
    }

    fn mark_read(&self, id: &str) -> Result<()> {
        let added = self.union(&[id.to_string()])?;
        tracing::debug!(notification_id = id, added, "marked notification read");
        Ok(())
    }

    fn mark_all_read(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let added = self.union(ids)?;
        tracing::debug!(count = ids.len(), added, "marked notifications read");
        Ok(())
    }
}
