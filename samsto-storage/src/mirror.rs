//! Write-through mirror of relational Subjects and Aspects.
//!
//! The mirror holds one hash per object plus the subject/aspect index sets.
//! Unpublishing or removing an object purges the samples that hang off it,
//! so the sample indexes never reference an object readers cannot see.

use crate::backend::StoreBackend;
use crate::index::IndexSets;
use crate::keys;
use crate::record::HashRecord;
use samsto_core::{Aspect, MirroredObject, ObjectType, SamstoResult, Subject};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug)]
pub struct ObjectMirror<B> {
    backend: Arc<B>,
    index: IndexSets<B>,
}

impl<B> Clone for ObjectMirror<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            index: self.index.clone(),
        }
    }
}

impl<B: StoreBackend> ObjectMirror<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let index = IndexSets::new(Arc::clone(&backend));
        Self { backend, index }
    }

    pub fn index(&self) -> &IndexSets<B> {
        &self.index
    }

    /// Look up a mirrored object by its natural name.
    ///
    /// `None` means absent; an unpublished object is still returned.
    /// Samples are not mirror objects and always yield `None`.
    pub async fn get(
        &self,
        object_type: ObjectType,
        name: &str,
    ) -> SamstoResult<Option<MirroredObject>> {
        let key = keys::to_key(object_type, name);
        let object = match object_type {
            ObjectType::Sample => return Ok(None),
            ObjectType::Subject => self
                .read::<Subject>(&key)
                .await?
                .map(MirroredObject::Subject),
            ObjectType::Aspect => self
                .read::<Aspect>(&key)
                .await?
                .map(MirroredObject::Aspect),
        };
        Ok(object)
    }

    pub async fn subject(&self, absolute_path: &str) -> SamstoResult<Option<Subject>> {
        self.read(&keys::to_key(ObjectType::Subject, absolute_path))
            .await
    }

    pub async fn aspect(&self, name: &str) -> SamstoResult<Option<Aspect>> {
        self.read(&keys::to_key(ObjectType::Aspect, name)).await
    }

    async fn read<T: HashRecord>(&self, key: &str) -> SamstoResult<Option<T>> {
        match self.backend.hash_get(key).await? {
            Some(fields) => T::from_fields(key, &fields).map(Some),
            None => Ok(None),
        }
    }

    /// Write an object and index it.
    ///
    /// An unpublished object also has its samples purged.
    pub async fn put(&self, object: &MirroredObject) -> SamstoResult<()> {
        let object_type = object.object_type();
        let name = object.natural_name();
        let key = keys::to_key(object_type, name);
        let fields = match object {
            MirroredObject::Subject(subject) => subject.to_fields()?,
            MirroredObject::Aspect(aspect) => aspect.to_fields()?,
        };
        self.backend.hash_replace(&key, &fields).await?;
        self.index.index_object(object_type, name).await?;
        debug!(key = %key, published = object.is_published(), "Mirrored object");

        if !object.is_published() {
            self.purge_samples(object_type, name).await?;
        }
        Ok(())
    }

    /// Delete an object, its index entry and every sample hanging off it.
    ///
    /// Returns `true` if the object hash existed.
    pub async fn remove(&self, object_type: ObjectType, name: &str) -> SamstoResult<bool> {
        if object_type == ObjectType::Sample {
            return Ok(false);
        }
        // The object goes first so a sample indexed after the purge fails its
        // own published check
        let key = keys::to_key(object_type, name);
        let existed = self.backend.delete(&[key.clone()]).await? > 0;
        self.index.unindex_object(object_type, name).await?;
        self.purge_samples(object_type, name).await?;
        debug!(key = %key, existed = existed, "Removed mirrored object");
        Ok(existed)
    }

    async fn purge_samples(&self, object_type: ObjectType, name: &str) -> SamstoResult<u64> {
        match object_type {
            ObjectType::Subject => self.purge_subject_samples(name).await,
            ObjectType::Aspect => self.purge_aspect_samples(name).await,
            ObjectType::Sample => Ok(0),
        }
    }

    /// Delete every sample of a subject. Returns the number purged.
    pub async fn purge_subject_samples(&self, absolute_path: &str) -> SamstoResult<u64> {
        let prefix = keys::sample_key_prefix_for_subject(absolute_path);
        let mut purged = 0;
        for sample_key in self.index.sample_keys().await? {
            if !sample_key.starts_with(&prefix) {
                continue;
            }
            let Some((subject_path, aspect_name)) = keys::split_sample_key(&sample_key) else {
                continue;
            };
            self.backend.delete(&[sample_key.clone()]).await?;
            self.index.remove_sample(&subject_path, &aspect_name).await?;
            purged += 1;
        }
        if purged > 0 {
            info!(subject = absolute_path, purged = purged, "Purged subject samples");
        }
        Ok(purged)
    }

    /// Delete every sample of an aspect and its subscriber set.
    pub async fn purge_aspect_samples(&self, aspect_name: &str) -> SamstoResult<u64> {
        let mut purged = 0;
        for subject_path in self.index.subscribers(aspect_name).await? {
            let sample_key = keys::sample_key(&subject_path, aspect_name);
            self.backend.delete(&[sample_key]).await?;
            self.index.remove_sample(&subject_path, aspect_name).await?;
            purged += 1;
        }
        self.index.drop_subscribers(aspect_name).await?;
        if purged > 0 {
            info!(aspect = aspect_name, purged = purged, "Purged aspect samples");
        }
        Ok(purged)
    }
}
