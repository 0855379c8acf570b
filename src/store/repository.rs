// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed, timeout-bounded access to a [`DocumentStore`].

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

use super::{DocumentStore, Query};

/// Typed wrapper around a document store.
///
/// Every round trip is bounded by the configured timeout so no engine
/// operation can block indefinitely on the backend.
#[derive(Debug)]
pub struct Repository<S> {
    store: S,
    timeout: Duration,
}

impl<S: DocumentStore> Repository<S> {
    /// Wraps `store` with a per-operation `timeout`.
    #[must_use]
    pub fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads and decodes a singleton document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store fails, times out, or the stored
    /// document does not decode into `T`.
    pub async fn load<T: DeserializeOwned>(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, StoreError> {
        let doc = self.bounded(self.store.find_one(collection, key)).await?;
        doc.map(serde_json::from_value).transpose().map_err(Into::into)
    }

    /// Encodes and writes a singleton document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if encoding or the write fails.
    pub async fn save<T: Serialize + Sync>(
        &self,
        collection: &str,
        key: &str,
        document: &T,
    ) -> Result<(), StoreError> {
        let value = serde_json::to_value(document)?;
        self.bounded(self.store.upsert(collection, key, value)).await
    }

    /// Encodes and appends a document, returning its generated key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if encoding or the insert fails.
    pub async fn append<T: Serialize + Sync>(
        &self,
        collection: &str,
        document: &T,
    ) -> Result<String, StoreError> {
        let value = serde_json::to_value(document)?;
        self.bounded(self.store.insert(collection, value)).await
    }

    /// Runs `query` and decodes every match.
    ///
    /// Documents that fail to decode are skipped with a warning so one bad
    /// row cannot hide the rest of a listing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the query itself fails.
    pub async fn query<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &Query,
    ) -> Result<Vec<T>, StoreError> {
        let docs = self.bounded(self.store.find(collection, query)).await?;
        Ok(docs
            .into_iter()
            .filter_map(|doc| match serde_json::from_value(doc) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    tracing::warn!(collection = %collection, error = %e, "Skipping undecodable document");
                    None
                }
            })
            .collect())
    }

    async fn bounded<T>(
        &self,
        op: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        // Safe: configured timeouts are far below u64::MAX milliseconds
        #[allow(clippy::cast_possible_truncation)]
        let timeout_ms = self.timeout.as_millis() as u64;

        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(timeout_ms))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde::Deserialize;
    use serde_json::Value;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        enabled: bool,
    }

    fn repo() -> Repository<MemoryStore> {
        Repository::new(MemoryStore::new(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn save_then_load() {
        let repo = repo();
        repo.save("c", "k", &Doc { enabled: true }).await.unwrap();
        let loaded: Option<Doc> = repo.load("c", "k").await.unwrap();
        assert_eq!(loaded, Some(Doc { enabled: true }));
    }

    #[tokio::test]
    async fn load_wrong_shape_is_serialization_error() {
        let repo = repo();
        repo.save("c", "k", &serde_json::json!({"enabled": "yes"}))
            .await
            .unwrap();
        let result: Result<Option<Doc>, _> = repo.load("c", "k").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn query_skips_bad_rows() {
        let repo = repo();
        repo.append("c", &Doc { enabled: true }).await.unwrap();
        repo.append("c", &serde_json::json!({"other": 1})).await.unwrap();
        let docs: Vec<Doc> = repo.query("c", &Query::all()).await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    struct SlowStore;

    impl DocumentStore for SlowStore {
        async fn find_one(&self, _c: &str, _k: &str) -> Result<Option<Value>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(None)
        }

        async fn upsert(&self, _c: &str, _k: &str, _d: Value) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert(&self, _c: &str, _d: Value) -> Result<String, StoreError> {
            Ok(String::new())
        }

        async fn find(&self, _c: &str, _q: &Query) -> Result<Vec<Value>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out() {
        let repo = Repository::new(SlowStore, Duration::from_millis(100));
        let result: Result<Option<Doc>, _> = repo.load("c", "k").await;
        assert!(matches!(result, Err(StoreError::Timeout(100))));
    }
}
