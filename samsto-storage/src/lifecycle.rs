//! Full rebuild and teardown of the sample store.
//!
//! Neither operation may run concurrently with sample upserts.

use crate::backend::StoreBackend;
use crate::keys;
use crate::mirror::ObjectMirror;
use crate::source::RelationalSource;
use samsto_core::{MirroredObject, SamstoResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const DELETE_BATCH: usize = 256;

/// Objects written by a successful [`LifecycleController::init`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitReport {
    pub subjects: usize,
    pub aspects: usize,
}

pub struct LifecycleController<B, R> {
    backend: Arc<B>,
    source: Arc<R>,
    mirror: ObjectMirror<B>,
}

impl<B: StoreBackend, R: RelationalSource> LifecycleController<B, R> {
    pub fn new(backend: Arc<B>, source: Arc<R>) -> Self {
        let mirror = ObjectMirror::new(Arc::clone(&backend));
        Self {
            backend,
            source,
            mirror,
        }
    }

    /// Delete every key in the sample store namespace.
    ///
    /// Returns the number of keys deleted. Running it on an empty store is
    /// a no-op.
    #[instrument(skip(self))]
    pub async fn eradicate(&self) -> SamstoResult<u64> {
        let found = self.backend.scan_prefix(&keys::namespace_prefix()).await?;
        let mut deleted = 0;
        for batch in found.chunks(DELETE_BATCH) {
            deleted += self.backend.delete(batch).await?;
        }
        info!(deleted = deleted, "Eradicated sample store");
        Ok(deleted)
    }

    /// Rebuild the object mirror and its index sets from the relational store.
    ///
    /// Every row is read before anything is written, so a read failure leaves
    /// the cache untouched. A write failure wipes the namespace before the
    /// error is returned. Samples and subscriber sets are not rebuilt.
    #[instrument(skip(self))]
    pub async fn init(&self) -> SamstoResult<InitReport> {
        let subjects = self.source.list_subjects().await?;
        let aspects = self.source.list_aspects().await?;

        let report = InitReport {
            subjects: subjects.len(),
            aspects: aspects.len(),
        };
        let objects = subjects
            .into_iter()
            .map(MirroredObject::Subject)
            .chain(aspects.into_iter().map(MirroredObject::Aspect));

        for object in objects {
            if let Err(e) = self.mirror.put(&object).await {
                warn!(
                    error = %e,
                    object = object.natural_name(),
                    "Sample store init failed, eradicating partial mirror"
                );
                if let Err(cleanup) = self.eradicate().await {
                    warn!(error = %cleanup, "Eradicate after failed init also failed");
                }
                return Err(e);
            }
        }

        info!(
            subjects = report.subjects,
            aspects = report.aspects,
            "Initialized sample store"
        );
        Ok(report)
    }
}
