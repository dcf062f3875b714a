//! Index sets over the sample store.
//!
//! `samsto:sample:index` enumerates every sample key and
//! `samsto:aspsubmap:<aspect>` records which subjects currently hold a
//! sample for an aspect. Subject and aspect mirror keys are enumerated by
//! their own index sets. Every update here is idempotent.

use crate::backend::StoreBackend;
use crate::keys;
use samsto_core::{ObjectType, SamstoResult};
use std::sync::Arc;

/// Membership sets kept alongside the record hashes.
#[derive(Debug)]
pub struct IndexSets<B> {
    backend: Arc<B>,
}

impl<B> Clone for IndexSets<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: StoreBackend> IndexSets<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// Record a sample in the global index and its aspect's subscriber set.
    ///
    /// Returns `true` if the sample key was not indexed before.
    pub async fn add_sample(&self, subject_path: &str, aspect_name: &str) -> SamstoResult<bool> {
        let sample_key = keys::sample_key(subject_path, aspect_name);
        let added = self
            .backend
            .set_add(keys::sample_index_key(), &sample_key)
            .await?;
        self.backend
            .set_add(
                &keys::aspsubmap_key(aspect_name),
                &subject_path.to_lowercase(),
            )
            .await?;
        Ok(added)
    }

    /// Drop a sample from the global index and its aspect's subscriber set.
    pub async fn remove_sample(&self, subject_path: &str, aspect_name: &str) -> SamstoResult<bool> {
        let sample_key = keys::sample_key(subject_path, aspect_name);
        let removed = self
            .backend
            .set_remove(keys::sample_index_key(), &sample_key)
            .await?;
        self.backend
            .set_remove(
                &keys::aspsubmap_key(aspect_name),
                &subject_path.to_lowercase(),
            )
            .await?;
        Ok(removed)
    }

    pub async fn contains_sample(&self, sample_key: &str) -> SamstoResult<bool> {
        self.backend
            .set_contains(keys::sample_index_key(), sample_key)
            .await
    }

    /// Every indexed sample key.
    pub async fn sample_keys(&self) -> SamstoResult<Vec<String>> {
        self.backend.set_members(keys::sample_index_key()).await
    }

    pub async fn sample_count(&self) -> SamstoResult<u64> {
        self.backend.set_len(keys::sample_index_key()).await
    }

    /// Lowercased paths of the subjects holding a sample for `aspect_name`.
    pub async fn subscribers(&self, aspect_name: &str) -> SamstoResult<Vec<String>> {
        self.backend
            .set_members(&keys::aspsubmap_key(aspect_name))
            .await
    }

    /// Delete the subscriber set of an aspect.
    pub async fn drop_subscribers(&self, aspect_name: &str) -> SamstoResult<()> {
        self.backend
            .delete(&[keys::aspsubmap_key(aspect_name)])
            .await?;
        Ok(())
    }

    /// Add a mirror key to its type's index set.
    pub async fn index_object(&self, object_type: ObjectType, name: &str) -> SamstoResult<bool> {
        self.backend
            .set_add(keys::index_key(object_type), &keys::to_key(object_type, name))
            .await
    }

    pub async fn unindex_object(&self, object_type: ObjectType, name: &str) -> SamstoResult<bool> {
        self.backend
            .set_remove(keys::index_key(object_type), &keys::to_key(object_type, name))
            .await
    }

    /// Every mirror key of one object type.
    pub async fn object_keys(&self, object_type: ObjectType) -> SamstoResult<Vec<String>> {
        self.backend.set_members(keys::index_key(object_type)).await
    }
}
