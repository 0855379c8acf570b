// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Document store abstraction.
//!
//! The engine persists everything as JSON documents in named collections.
//! Singleton records live under a fixed key (see [`keys`]); append-only
//! records (history, notifications, control logs) are inserted with a
//! generated key.
//!
//! - [`DocumentStore`]: the backend trait (`find_one`/`upsert`/`insert`/`find`)
//! - [`MemoryStore`]: in-process backend
//! - [`OfflineStore`]: degraded backend used when the real store is unreachable
//! - [`Repository`]: typed, timeout-bounded access used by the engine

mod memory;
mod repository;

pub use memory::{MemoryStore, OfflineStore};
pub use repository::Repository;

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::StoreError;

/// Collection names.
pub mod collections {
    /// Live device state and the history throttle marker.
    pub const CURTAIN_DATA: &str = "curtain_data";
    /// Throttled history samples.
    pub const CURTAIN_HISTORY: &str = "curtain_history";
    /// Automation rules.
    pub const AUTO_MODE_RULES: &str = "auto_mode_rules";
    /// Sleep-mode state.
    pub const SLEEP_MODE: &str = "sleep_mode_settings";
    /// PIR settings.
    pub const PIR_SETTINGS: &str = "pir_settings";
    /// User-facing notifications.
    pub const NOTIFICATIONS: &str = "notifications";
    /// Command audit trail.
    pub const CONTROL_LOGS: &str = "control_logs";
}

/// Well-known singleton keys.
pub mod keys {
    /// The live device state.
    pub const CURRENT: &str = "current";
    /// The history throttle marker.
    pub const HISTORY_TRACKER: &str = "history_tracker";
    /// Rules, sleep mode and PIR settings.
    pub const GLOBAL: &str = "global";
}

/// Filter, order and limit for [`DocumentStore::find`].
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use curtain_engine::store::Query;
///
/// let query = Query::newest_first("captured_at")
///     .since(Utc::now())
///     .limit(100);
/// assert_eq!(query.limit_value(), Some(100));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    time_field: Option<&'static str>,
    since: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

impl Query {
    /// Matches every document in insertion order.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Orders by the timestamp stored in `field`, newest first.
    #[must_use]
    pub fn newest_first(field: &'static str) -> Self {
        Self {
            time_field: Some(field),
            ..Self::default()
        }
    }

    /// Keeps only documents whose time field is at or after `cutoff`.
    #[must_use]
    pub fn since(mut self, cutoff: DateTime<Utc>) -> Self {
        self.since = Some(cutoff);
        self
    }

    /// Caps the number of returned documents.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The time field used for ordering and filtering.
    #[must_use]
    pub fn time_field(&self) -> Option<&'static str> {
        self.time_field
    }

    /// The lower bound on the time field.
    #[must_use]
    pub fn since_value(&self) -> Option<DateTime<Utc>> {
        self.since
    }

    /// The row limit.
    #[must_use]
    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }
}

/// A document store with named collections.
///
/// Every operation returns a `Result`, so an unreachable backend is an
/// observable [`StoreError::Unavailable`] rather than silently empty data.
pub trait DocumentStore: Send + Sync + 'static {
    /// Fetches the document stored under `key`.
    fn find_one(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send;

    /// Replaces (or creates) the document stored under `key`.
    fn upsert(
        &self,
        collection: &str,
        key: &str,
        document: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Appends a document under a generated key and returns the key.
    fn insert(
        &self,
        collection: &str,
        document: Value,
    ) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Returns the documents matching `query`.
    fn find(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send;
}

impl<T: DocumentStore> DocumentStore for Arc<T> {
    fn find_one(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = Result<Option<Value>, StoreError>> + Send {
        (**self).find_one(collection, key)
    }

    fn upsert(
        &self,
        collection: &str,
        key: &str,
        document: Value,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        (**self).upsert(collection, key, document)
    }

    fn insert(
        &self,
        collection: &str,
        document: Value,
    ) -> impl Future<Output = Result<String, StoreError>> + Send {
        (**self).insert(collection, document)
    }

    fn find(
        &self,
        collection: &str,
        query: &Query,
    ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send {
        (**self).find(collection, query)
    }
}
