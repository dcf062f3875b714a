//! Sample upsert resolver and the rest of the engine surface.

use crate::config::EngineConfig;
use crate::locks::KeyedLocks;
use crate::request::UpsertRequest;
use chrono::Utc;
use samsto_core::{
    merge_related_links, transition, Aspect, MirroredObject, NotFoundError, ObjectType, Sample,
    SampleName, SamstoResult, Subject, UserSummary, ValidationError,
};
use samsto_events::{BrokerClient, ChangeNotifier, NotifierStats};
use samsto_storage::{
    keys, HashRecord, InitReport, LifecycleController, ObjectMirror, RelationalSource,
    StoreBackend,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The sample store engine.
///
/// Shared by every request task. `eradicate` and `init` must not run while
/// upserts are in flight.
pub struct SampleEngine<B, R> {
    backend: Arc<B>,
    source: Arc<R>,
    mirror: ObjectMirror<B>,
    lifecycle: LifecycleController<B, R>,
    locks: Option<KeyedLocks>,
    notifier: Option<ChangeNotifier>,
}

impl<B: StoreBackend, R: RelationalSource> SampleEngine<B, R> {
    /// An engine without a notifier, serializing same-key upserts.
    pub fn new(backend: Arc<B>, source: Arc<R>) -> Self {
        Self {
            mirror: ObjectMirror::new(Arc::clone(&backend)),
            lifecycle: LifecycleController::new(Arc::clone(&backend), Arc::clone(&source)),
            backend,
            source,
            locks: Some(KeyedLocks::new()),
            notifier: None,
        }
    }

    /// Build an engine from configuration, spawning its notifier on the
    /// current runtime.
    pub fn from_config<K>(
        backend: Arc<B>,
        source: Arc<R>,
        broker: Arc<K>,
        config: &EngineConfig,
    ) -> Self
    where
        K: BrokerClient + ?Sized + 'static,
    {
        Self::new(backend, source)
            .with_serialize_same_key(config.serialize_same_key)
            .with_notifier(ChangeNotifier::spawn(broker, config.notifier.clone()))
    }

    pub fn with_notifier(mut self, notifier: ChangeNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_serialize_same_key(mut self, enabled: bool) -> Self {
        self.locks = enabled.then(KeyedLocks::new);
        self
    }

    pub fn mirror(&self) -> &ObjectMirror<B> {
        &self.mirror
    }

    pub fn notifier_stats(&self) -> Option<NotifierStats> {
        self.notifier.as_ref().map(ChangeNotifier::stats)
    }

    // ========================================================================
    // SAMPLES
    // ========================================================================

    /// Create or update a sample and return it as stored.
    ///
    /// The subject and aspect must both be mirrored and published; the
    /// subject is checked first. The stored name takes its casing from the
    /// mirrored objects, not from the request.
    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn upsert(&self, request: UpsertRequest) -> SamstoResult<Sample> {
        let name = request.validate()?;
        let (subject, aspect) = self
            .published_objects(name.subject_path(), name.aspect_name())
            .await?;

        let user = match request.provider {
            Some(id) => Some(self.resolve_user(id).await?),
            None => None,
        };

        let key = keys::sample_key(&subject.absolute_path, &aspect.name);
        let guard = match &self.locks {
            Some(locks) => Some(locks.lock(&key).await),
            None => None,
        };

        let existing = self.read_key(&key).await?;
        let sample = build_sample(&subject, &aspect, request, user, existing.as_ref());

        self.backend.hash_replace(&key, &sample.to_fields()?).await?;
        // Idempotent, so also repairs an index entry lost by an interrupted write
        self.mirror
            .index()
            .add_sample(&subject.absolute_path, &aspect.name)
            .await?;

        // Unpublish and removal purge through the index. Once the sample is
        // indexed, whichever of the two runs last sees the other.
        if let Err(err) = self
            .published_objects(&subject.absolute_path, &aspect.name)
            .await
        {
            self.backend.delete(&[key.clone()]).await?;
            self.mirror
                .index()
                .remove_sample(&subject.absolute_path, &aspect.name)
                .await?;
            debug!(key = %key, "Discarded sample of an object unpublished mid-upsert");
            return Err(err);
        }

        debug!(
            key = %key,
            status = %sample.status,
            previous_status = %sample.previous_status,
            created = existing.is_none(),
            "Upserted sample"
        );

        // Enqueued under the key lock so same-key messages leave in write order
        if let Some(notifier) = &self.notifier {
            notifier.notify(&sample);
        }
        drop(guard);
        Ok(sample)
    }

    /// The mirrored subject and aspect, both published. Subject first.
    async fn published_objects(
        &self,
        subject_path: &str,
        aspect_name: &str,
    ) -> SamstoResult<(Subject, Aspect)> {
        let subject = self
            .mirror
            .subject(subject_path)
            .await?
            .filter(|s| s.is_published)
            .ok_or(NotFoundError::Subject)?;
        let aspect = self
            .mirror
            .aspect(aspect_name)
            .await?
            .filter(|a| a.is_published)
            .ok_or(NotFoundError::Aspect)?;
        Ok((subject, aspect))
    }

    async fn resolve_user(&self, id: samsto_core::EntityId) -> SamstoResult<UserSummary> {
        self.source.find_user(id).await?.ok_or_else(|| {
            ValidationError::InvalidValue {
                field: "provider".to_string(),
                reason: format!("unknown user {}", id),
            }
            .into()
        })
    }

    async fn read_key(&self, key: &str) -> SamstoResult<Option<Sample>> {
        match self.backend.hash_get(key).await? {
            Some(fields) => Sample::from_fields(key, &fields).map(Some),
            None => Ok(None),
        }
    }

    /// Read one sample by composite name, any casing.
    pub async fn read(&self, name: &str) -> SamstoResult<Sample> {
        let parsed = SampleName::parse(name)?;
        let key = keys::sample_key(parsed.subject_path(), parsed.aspect_name());
        self.read_key(&key).await?.ok_or_else(|| {
            NotFoundError::Sample {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Delete one sample and its index entries. Returns the deleted sample.
    #[instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> SamstoResult<Sample> {
        let parsed = SampleName::parse(name)?;
        let key = keys::sample_key(parsed.subject_path(), parsed.aspect_name());
        let _guard = match &self.locks {
            Some(locks) => Some(locks.lock(&key).await),
            None => None,
        };

        let sample = self.read_key(&key).await?.ok_or_else(|| NotFoundError::Sample {
            name: name.to_string(),
        })?;
        self.backend.delete(&[key.clone()]).await?;
        self.mirror
            .index()
            .remove_sample(parsed.subject_path(), parsed.aspect_name())
            .await?;
        debug!(key = %key, "Deleted sample");
        Ok(sample)
    }

    /// Lowercased paths of the subjects holding a sample for `aspect_name`.
    pub async fn subjects_for_aspect(&self, aspect_name: &str) -> SamstoResult<Vec<String>> {
        self.mirror.index().subscribers(aspect_name).await
    }

    /// Number of samples in the store.
    pub async fn sample_count(&self) -> SamstoResult<u64> {
        self.mirror.index().sample_count().await
    }

    // ========================================================================
    // MIRROR REPLICATION
    // ========================================================================

    /// Mirror a created or updated subject. Unpublishing purges its samples.
    pub async fn replicate_subject(&self, subject: Subject) -> SamstoResult<()> {
        self.mirror.put(&MirroredObject::Subject(subject)).await
    }

    /// Mirror a created or updated aspect. Unpublishing purges its samples.
    pub async fn replicate_aspect(&self, aspect: Aspect) -> SamstoResult<()> {
        self.mirror.put(&MirroredObject::Aspect(aspect)).await
    }

    /// Re-read one subject from the relational source and mirror it, or drop
    /// it from the mirror if the source no longer has it.
    ///
    /// Returns `true` if the subject is still in the source.
    #[instrument(skip(self))]
    pub async fn refresh_subject(&self, absolute_path: &str) -> SamstoResult<bool> {
        match self.source.find_subject_by_absolute_path(absolute_path).await? {
            Some(subject) => {
                self.replicate_subject(subject).await?;
                Ok(true)
            }
            None => {
                self.remove_subject(absolute_path).await?;
                Ok(false)
            }
        }
    }

    /// Re-read one aspect from the relational source and mirror it, or drop
    /// it from the mirror if the source no longer has it.
    #[instrument(skip(self))]
    pub async fn refresh_aspect(&self, name: &str) -> SamstoResult<bool> {
        match self.source.find_aspect_by_name(name).await? {
            Some(aspect) => {
                self.replicate_aspect(aspect).await?;
                Ok(true)
            }
            None => {
                self.remove_aspect(name).await?;
                Ok(false)
            }
        }
    }

    /// Drop a deleted subject and its samples from the mirror.
    pub async fn remove_subject(&self, absolute_path: &str) -> SamstoResult<bool> {
        self.mirror.remove(ObjectType::Subject, absolute_path).await
    }

    /// Drop a deleted aspect and its samples from the mirror.
    pub async fn remove_aspect(&self, name: &str) -> SamstoResult<bool> {
        self.mirror.remove(ObjectType::Aspect, name).await
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    pub async fn eradicate(&self) -> SamstoResult<u64> {
        self.lifecycle.eradicate().await
    }

    pub async fn init(&self) -> SamstoResult<InitReport> {
        self.lifecycle.init().await
    }

    /// Check the store is reachable.
    pub async fn ping(&self) -> SamstoResult<()> {
        self.backend.ping().await
    }

    /// Drain and stop the notifier.
    pub async fn shutdown(&self) {
        if let Some(notifier) = &self.notifier {
            notifier.shutdown().await;
        }
    }
}

fn build_sample(
    subject: &Subject,
    aspect: &Aspect,
    request: UpsertRequest,
    user: Option<UserSummary>,
    existing: Option<&Sample>,
) -> Sample {
    let now = Utc::now();
    let step = transition(
        &request.value,
        &aspect.thresholds,
        existing.map(|s| s.status),
    );

    let stored_links = existing.map(|s| s.related_links.as_slice()).unwrap_or(&[]);
    let related_links = match &request.related_links {
        Some(incoming) => merge_related_links(stored_links, incoming),
        None => stored_links.to_vec(),
    };

    let status_changed_at = match existing {
        Some(s) if !step.changed => s.status_changed_at,
        _ => now,
    };

    Sample {
        name: SampleName::compose(&subject.absolute_path, &aspect.name),
        value: request.value,
        status: step.status,
        previous_status: step.previous_status,
        status_changed_at,
        subject_id: subject.id,
        aspect_id: aspect.id,
        related_links,
        provider: request.provider.or_else(|| existing.and_then(|s| s.provider)),
        user: user.or_else(|| existing.and_then(|s| s.user.clone())),
        created_at: existing.map(|s| s.created_at).unwrap_or(now),
        updated_at: now,
    }
}
