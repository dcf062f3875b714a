#![allow(dead_code)]

use samsto_core::SamstoResult;
use samsto_engine::SampleEngine;
use samsto_storage::{InMemoryBackend, InMemoryRelationalStore};
use samsto_test_utils::fixtures;
use std::sync::Arc;

pub type TestEngine = SampleEngine<InMemoryBackend, InMemoryRelationalStore>;

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub source: Arc<InMemoryRelationalStore>,
    pub engine: TestEngine,
}

/// Engine over `NA`, `NA.US` and `Temp`, with the mirror already initialized.
pub async fn north_america() -> SamstoResult<Harness> {
    harness(fixtures::north_america_source()?).await
}

pub async fn harness(source: InMemoryRelationalStore) -> SamstoResult<Harness> {
    let backend = Arc::new(InMemoryBackend::new());
    let source = Arc::new(source);
    let engine = SampleEngine::new(Arc::clone(&backend), Arc::clone(&source));
    engine.init().await?;
    Ok(Harness {
        backend,
        source,
        engine,
    })
}
