// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only OR LicenseRef-Element-Commercial
// Please see LICENSE files in the repository root for full details.

//! Storage for large event payloads
//!
//! Payloads are kept out of the relational store, in a key-value "node store".
//! Their keys are derived from the project and event IDs, so that a payload
//! can be found again from the event row alone.

#![deny(missing_docs)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

/// An error returned by a [`NodeStore`]
#[derive(Debug, thiserror::Error)]
pub enum NodeStoreError {
    /// The backend could not be reached or refused the operation
    #[error("node store backend failed while handling {key:?}")]
    Backend {
        /// The key being accessed
        key: String,

        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

impl NodeStoreError {
    /// Wrap a backend error for the given key
    pub fn backend<E>(key: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            key: key.into(),
            source: Box::new(source),
        }
    }
}

/// A key-value store for event payloads
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Fetch a payload, returning `None` if the key is not set
    ///
    /// # Errors
    ///
    /// Returns a [`NodeStoreError`] if the backend fails
    async fn get(&self, key: &str) -> Result<Option<Bytes>, NodeStoreError>;

    /// Store a payload, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns a [`NodeStoreError`] if the backend fails
    async fn set(&self, key: &str, value: Bytes) -> Result<(), NodeStoreError>;

    /// Delete a payload. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns a [`NodeStoreError`] if the backend fails
    async fn delete(&self, key: &str) -> Result<(), NodeStoreError>;

    /// Delete several payloads, stopping at the first failure
    ///
    /// # Errors
    ///
    /// Returns a [`NodeStoreError`] if the backend fails
    async fn delete_many(&self, keys: &[String]) -> Result<(), NodeStoreError> {
        for key in keys {
            self.delete(key).await?;
        }
        Ok(())
    }
}

/// A type-erased [`NodeStore`]
pub type BoxNodeStore = Arc<dyn NodeStore + 'static>;

#[derive(Debug, thiserror::Error)]
#[error("deletions are disabled on this store")]
struct DeletionsDisabled;

/// A [`NodeStore`] keeping everything in memory
///
/// Used by the tests and by the CLI when no external store is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeStore {
    nodes: Arc<RwLock<HashMap<String, Bytes>>>,
    fail_deletes: Arc<AtomicBool>,
}

impl MemoryNodeStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent deletion fail, or succeed again
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Whether a payload is stored under `key`
    pub async fn contains(&self, key: &str) -> bool {
        self.nodes.read().await.contains_key(key)
    }

    /// The number of stored payloads
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }
}

#[async_trait]
impl NodeStore for MemoryNodeStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, NodeStoreError> {
        Ok(self.nodes.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), NodeStoreError> {
        self.nodes.write().await.insert(key.to_owned(), value);
        Ok(())
    }

    #[tracing::instrument(name = "nodestore.delete", skip(self), err)]
    async fn delete(&self, key: &str) -> Result<(), NodeStoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(NodeStoreError::backend(key, DeletionsDisabled));
        }

        self.nodes.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_node_store() {
        let store = MemoryNodeStore::new();
        assert!(store.get("a").await.unwrap().is_none());

        store.set("a", Bytes::from_static(b"payload")).await.unwrap();
        store.set("b", Bytes::from_static(b"other")).await.unwrap();
        assert_eq!(
            store.get("a").await.unwrap(),
            Some(Bytes::from_static(b"payload"))
        );
        assert_eq!(store.len().await, 2);

        store.delete("a").await.unwrap();
        assert!(!store.contains("a").await);

        // Deleting a missing key is not an error
        store.delete("a").await.unwrap();

        store.set_fail_deletes(true);
        assert!(store.delete("b").await.is_err());
        assert!(store.contains("b").await);

        store.set_fail_deletes(false);
        store
            .delete_many(&["b".to_owned(), "c".to_owned()])
            .await
            .unwrap();
        assert!(store.is_empty().await);
    }
}
