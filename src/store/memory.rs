// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-process document store backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::error::StoreError;

use super::{DocumentStore, Query};

/// A collection keeps documents in insertion order.
type Collection = Vec<(String, Value)>;

/// Document store held entirely in memory.
///
/// Availability can be toggled to exercise degraded-mode behaviour: while
/// unavailable every operation fails with [`StoreError::Unavailable`].
///
/// # Examples
///
/// ```
/// use curtain_engine::store::{DocumentStore, MemoryStore};
/// use serde_json::json;
///
/// # async fn example() -> Result<(), curtain_engine::error::StoreError> {
/// let store = MemoryStore::new();
/// store.upsert("pir_settings", "global", json!({"enabled": true})).await?;
/// let doc = store.find_one("pir_settings", "global").await?;
/// assert_eq!(doc, Some(json!({"enabled": true})));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Marks the store reachable or unreachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Returns the number of documents in `collection`.
    #[must_use]
    pub fn count(&self, collection: &str) -> usize {
        self.collections.read().get(collection).map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(StoreError::Unavailable)
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        let collections = self.collections.read();
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|(k, _)| k == key))
            .map(|(_, doc)| doc.clone()))
    }

    async fn upsert(&self, collection: &str, key: &str, document: Value) -> Result<(), StoreError> {
        self.check_available()?;
        let mut collections = self.collections.write();
        let docs = collections.entry(collection.to_string()).or_default();
        if let Some(slot) = docs.iter_mut().find(|(k, _)| k == key) {
            slot.1 = document;
        } else {
            docs.push((key.to_string(), document));
        }
        Ok(())
    }

    async fn insert(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        self.check_available()?;
        let key = Uuid::new_v4().to_string();
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push((key.clone(), document));
        Ok(key)
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        self.check_available()?;
        let collections = self.collections.read();
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Value> = docs.iter().map(|(_, doc)| doc).collect();

        if let Some(field) = query.time_field() {
            let mut timed: Vec<(DateTime<Utc>, &Value)> = matched
                .into_iter()
                .filter_map(|doc| timestamp(doc, field).map(|at| (at, doc)))
                .filter(|(at, _)| query.since_value().is_none_or(|cutoff| *at >= cutoff))
                .collect();
            // Stable sort keeps insertion order between equal timestamps.
            timed.sort_by(|a, b| b.0.cmp(&a.0));
            matched = timed.into_iter().map(|(_, doc)| doc).collect();
        }

        let limit = query.limit_value().unwrap_or(usize::MAX);
        Ok(matched.into_iter().take(limit).cloned().collect())
    }
}

fn timestamp(doc: &Value, field: &str) -> Option<DateTime<Utc>> {
    let raw = doc.get(field)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

/// Fallback store used when the real backend cannot be reached.
///
/// Every operation reports [`StoreError::Unavailable`]; the engine turns
/// failed reads into defaults and logs failed writes.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineStore;

impl DocumentStore for OfflineStore {
    async fn find_one(&self, _collection: &str, _key: &str) -> Result<Option<Value>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn upsert(
        &self,
        _collection: &str,
        _key: &str,
        _document: Value,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn insert(&self, _collection: &str, _document: Value) -> Result<String, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn find(&self, _collection: &str, _query: &Query) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_replaces_existing_document() {
        let store = MemoryStore::new();
        store.upsert("c", "k", json!({"v": 1})).await.unwrap();
        store.upsert("c", "k", json!({"v": 2})).await.unwrap();
        assert_eq!(store.count("c"), 1);
        assert_eq!(store.find_one("c", "k").await.unwrap(), Some(json!({"v": 2})));
    }

    #[tokio::test]
    async fn insert_generates_distinct_keys() {
        let store = MemoryStore::new();
        let a = store.insert("c", json!({})).await.unwrap();
        let b = store.insert("c", json!({})).await.unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count("c"), 2);
    }

    #[tokio::test]
    async fn find_missing_collection_is_empty() {
        let store = MemoryStore::new();
        assert!(store.find("nothing", &Query::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_orders_newest_first_and_filters() {
        let store = MemoryStore::new();
        let base = Utc::now();
        for offset in [0, 10, 20, 30] {
            let at = base + TimeDelta::seconds(offset);
            store
                .insert("h", json!({"n": offset, "at": at.to_rfc3339()}))
                .await
                .unwrap();
        }

        let docs = store
            .find(
                "h",
                &Query::newest_first("at")
                    .since(base + TimeDelta::seconds(10))
                    .limit(2),
            )
            .await
            .unwrap();

        let ns: Vec<i64> = docs.iter().map(|d| d["n"].as_i64().unwrap()).collect();
        assert_eq!(ns, vec![30, 20]);
    }

    #[tokio::test]
    async fn unavailable_store_fails_every_operation() {
        let store = MemoryStore::new();
        store.set_available(false);
        assert!(matches!(
            store.find_one("c", "k").await,
            Err(StoreError::Unavailable)
        ));
        assert!(matches!(
            store.insert("c", json!({})).await,
            Err(StoreError::Unavailable)
        ));

        store.set_available(true);
        assert!(store.find_one("c", "k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn offline_store_is_always_unavailable() {
        let store = OfflineStore;
        assert!(matches!(
            store.upsert("c", "k", json!({})).await,
            Err(StoreError::Unavailable)
        ));
    }
}
