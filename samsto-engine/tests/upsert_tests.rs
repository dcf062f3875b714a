//! Integration tests for the sample upsert resolver
//!
//! Exercises `SampleEngine` end to end against the in-memory store: key
//! casing, not-found precedence, publish filtering, related link merging,
//! status transitions and same-key concurrency.

use async_trait::async_trait;
use samsto_core::{NotFoundError, RelatedLink, SamstoResult, Status, Subject};
use samsto_engine::{SampleEngine, UpsertRequest};
use samsto_storage::{keys, FieldMap, HashRecord, InMemoryBackend, StoreBackend};
use samsto_test_utils::assertions::{assert_not_found, assert_validation_error};
use samsto_test_utils::fixtures;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[path = "support/engine.rs"]
mod test_engine_support;
use test_engine_support::{harness, north_america};

// ============================================================================
// END TO END
// ============================================================================

#[tokio::test]
async fn test_temperature_walkthrough() -> SamstoResult<()> {
    let h = north_america().await?;

    let first = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "25")).await?;
    assert_eq!(first.name, "NA.US|Temp");
    assert_eq!(first.status, Status::Ok);
    assert_eq!(first.previous_status, Status::Invalid);
    assert_eq!(h.engine.sample_count().await?, 1);

    let second = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "99")).await?;
    assert_eq!(second.status, Status::Critical);
    assert_eq!(second.previous_status, Status::Ok);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.status_changed_at >= first.status_changed_at);
    assert_eq!(h.engine.sample_count().await?, 1);

    assert_eq!(h.engine.subjects_for_aspect("Temp").await?, vec!["na.us"]);
    Ok(())
}

#[tokio::test]
async fn test_critical_then_ok() -> SamstoResult<()> {
    let h = north_america().await?;
    h.engine.upsert(UpsertRequest::new("NA.US|Temp", "95")).await?;

    let sample = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "10")).await?;
    assert_eq!(sample.status, Status::Ok);
    assert_eq!(sample.previous_status, Status::Critical);
    Ok(())
}

#[tokio::test]
async fn test_non_numeric_value_is_invalid() -> SamstoResult<()> {
    let h = north_america().await?;
    let sample = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "warm")).await?;
    assert_eq!(sample.status, Status::Invalid);
    assert_eq!(sample.value, "warm");
    Ok(())
}

#[tokio::test]
async fn test_banded_aspect_classification() -> SamstoResult<()> {
    let source = fixtures::north_america_source()?;
    source.upsert_aspect(fixtures::banded_aspect("Health"))?;
    let h = harness(source).await?;

    let sample = h.engine.upsert(UpsertRequest::new("NA|Health", "2")).await?;
    assert_eq!(sample.status, Status::Warning);

    let sample = h.engine.upsert(UpsertRequest::new("NA|Health", "7")).await?;
    assert_eq!(sample.status, Status::Invalid);
    assert_eq!(sample.previous_status, Status::Warning);
    Ok(())
}

// ============================================================================
// NAMING AND LOOKUP
// ============================================================================

#[tokio::test]
async fn test_casing_resolves_to_one_sample() -> SamstoResult<()> {
    let h = north_america().await?;

    let lower = h.engine.upsert(UpsertRequest::new("na.us|temp", "1")).await?;
    let upper = h.engine.upsert(UpsertRequest::new("NA.US|TEMP", "2")).await?;

    assert_eq!(lower.name, "NA.US|Temp");
    assert_eq!(upper.name, "NA.US|Temp");
    assert_eq!(h.engine.sample_count().await?, 1);

    let stored = h.backend.hash_get(&keys::sample_key("NA.US", "Temp")).await?;
    assert_eq!(
        stored.and_then(|fields| fields.get("value").cloned()),
        Some("2".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn test_subject_checked_before_aspect() -> SamstoResult<()> {
    let h = north_america().await?;

    let result = h.engine.upsert(UpsertRequest::new("EU.FR|Humidity", "1")).await;
    assert_not_found(&result, NotFoundError::Subject);

    let result = h.engine.upsert(UpsertRequest::new("NA.US|Humidity", "1")).await;
    assert_not_found(&result, NotFoundError::Aspect);

    assert_eq!(h.engine.sample_count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_not_found_messages() -> SamstoResult<()> {
    let h = north_america().await?;
    let err = h
        .engine
        .upsert(UpsertRequest::new("EU|Temp", "1"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "subject for this sample was not found or has isPublished=false"
    );
    Ok(())
}

#[tokio::test]
async fn test_unpublished_objects_are_absent() -> SamstoResult<()> {
    let source = fixtures::north_america_source()?;
    source.upsert_subject(fixtures::unpublished_subject("EU"))?;
    source.upsert_aspect(fixtures::banded_aspect("Draft").with_published(false))?;
    let h = harness(source).await?;

    let result = h.engine.upsert(UpsertRequest::new("EU|Temp", "1")).await;
    assert_not_found(&result, NotFoundError::Subject);

    let result = h.engine.upsert(UpsertRequest::new("NA|Draft", "1")).await;
    assert_not_found(&result, NotFoundError::Aspect);
    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_rejected() -> SamstoResult<()> {
    let h = north_america().await?;

    for name in ["", "NA.US", "NA.US|", "|Temp", "NA|US|Temp"] {
        let result = h.engine.upsert(UpsertRequest::new(name, "1")).await;
        assert_validation_error(&result);
    }

    let result = h
        .engine
        .upsert(
            UpsertRequest::new("NA.US|Temp", "1")
                .with_related_links(vec![RelatedLink::new("", "https://x")]),
        )
        .await;
    assert_validation_error(&result);

    assert_eq!(h.engine.sample_count().await?, 0);
    Ok(())
}

// ============================================================================
// RELATED LINKS AND PROVIDER
// ============================================================================

#[tokio::test]
async fn test_related_links_merge_by_name() -> SamstoResult<()> {
    let h = north_america().await?;

    h.engine
        .upsert(UpsertRequest::new("NA.US|Temp", "1").with_related_links(vec![
            RelatedLink::new("runbook", "https://runbook/v1"),
            RelatedLink::new("dashboard", "https://dash"),
        ]))
        .await?;

    let merged = h
        .engine
        .upsert(UpsertRequest::new("NA.US|Temp", "2").with_related_links(vec![
            RelatedLink::new("runbook", "https://runbook/v2"),
            RelatedLink::new("owner", "https://team"),
        ]))
        .await?;
    assert_eq!(
        merged.related_links,
        vec![
            RelatedLink::new("runbook", "https://runbook/v2"),
            RelatedLink::new("dashboard", "https://dash"),
            RelatedLink::new("owner", "https://team"),
        ]
    );

    let kept = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "3")).await?;
    assert_eq!(kept.related_links, merged.related_links);
    Ok(())
}

#[tokio::test]
async fn test_provider_denormalizes_user() -> SamstoResult<()> {
    let h = north_america().await?;
    let user = fixtures::test_user();
    h.source.insert_user(user.clone())?;

    let sample = h
        .engine
        .upsert(UpsertRequest::new("NA.US|Temp", "1").with_provider(user.id))
        .await?;
    assert_eq!(sample.provider, Some(user.id));
    assert_eq!(sample.user.as_ref(), Some(&user));

    let next = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "2")).await?;
    assert_eq!(next.provider, Some(user.id));
    assert_eq!(next.user, Some(user));
    Ok(())
}

#[tokio::test]
async fn test_unknown_provider_rejected() -> SamstoResult<()> {
    let h = north_america().await?;
    let result = h
        .engine
        .upsert(UpsertRequest::new("NA.US|Temp", "1").with_provider(samsto_core::new_entity_id()))
        .await;
    assert_validation_error(&result);
    assert_eq!(h.engine.sample_count().await?, 0);
    Ok(())
}

// ============================================================================
// READ AND DELETE
// ============================================================================

#[tokio::test]
async fn test_read_and_delete() -> SamstoResult<()> {
    let h = north_america().await?;
    let stored = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "40")).await?;

    assert_eq!(h.engine.read("na.us|temp").await?, stored);

    let deleted = h.engine.delete("NA.US|TEMP").await?;
    assert_eq!(deleted, stored);
    assert_eq!(h.engine.sample_count().await?, 0);
    assert!(h.engine.subjects_for_aspect("Temp").await?.is_empty());

    let result = h.engine.read("NA.US|Temp").await;
    assert_not_found(
        &result,
        NotFoundError::Sample {
            name: "NA.US|Temp".to_string(),
        },
    );
    assert!(h.engine.delete("NA.US|Temp").await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_recreate_after_delete_starts_fresh() -> SamstoResult<()> {
    let h = north_america().await?;
    h.engine.upsert(UpsertRequest::new("NA.US|Temp", "99")).await?;
    h.engine.delete("NA.US|Temp").await?;

    let sample = h.engine.upsert(UpsertRequest::new("NA.US|Temp", "10")).await?;
    assert_eq!(sample.previous_status, Status::Invalid);
    assert_eq!(h.engine.sample_count().await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_hash_without_timestamps_upserts_and_deletes() -> SamstoResult<()> {
    let source = fixtures::north_america_source()?;
    source.upsert_aspect(fixtures::banded_aspect("Health"))?;
    let h = harness(source).await?;

    let subject = h.engine.mirror().subject("NA.US").await?.expect("NA.US is mirrored");
    let aspect = h.engine.mirror().aspect("Health").await?.expect("Health is mirrored");
    let key = keys::sample_key("NA.US", "Health");
    let fields: FieldMap = [
        ("name", "NA.US|Health".to_string()),
        ("value", "1".to_string()),
        ("aspectId", aspect.id.to_string()),
        ("subjectId", subject.id.to_string()),
        ("previousStatus", "Invalid".to_string()),
        ("status", "Invalid".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();
    h.backend.hash_replace(&key, &fields).await?;
    h.engine.mirror().index().add_sample("NA.US", "Health").await?;

    let sample = h.engine.upsert(UpsertRequest::new("na.us|health", "2")).await?;
    assert_eq!(sample.name, "NA.US|Health");
    assert_eq!(sample.status, Status::Warning);
    assert_eq!(sample.previous_status, Status::Invalid);
    assert_eq!(h.engine.sample_count().await?, 1);

    h.backend.hash_replace(&key, &fields).await?;
    let deleted = h.engine.delete("NA.US|Health").await?;
    assert_eq!(deleted.value, "1");
    assert_eq!(h.engine.sample_count().await?, 0);
    Ok(())
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_never_duplicate() -> SamstoResult<()> {
    let h = north_america().await?;
    let engine = Arc::new(h.engine);

    // Values cycle through Ok, Warning and Critical, so a lost update shows up
    // as a break in the previous-status chain
    let bands = ["10", "50", "95"];
    let mut handles = Vec::new();
    for i in 0..32 {
        let engine = Arc::clone(&engine);
        let name = if i % 2 == 0 { "NA.US|Temp" } else { "na.us|TEMP" };
        let value = format!("{}.{}", bands[i % 3], i);
        handles.push(tokio::spawn(async move {
            engine.upsert(UpsertRequest::new(name, value)).await
        }));
    }
    let mut samples = Vec::new();
    for handle in handles {
        let sample = handle.await.expect("upsert task panicked")?;
        assert_eq!(sample.name, "NA.US|Temp");
        samples.push(sample);
    }
    let values: HashSet<_> = samples.iter().map(|s| s.value.clone()).collect();
    assert_eq!(values.len(), 32);

    samples.sort_by_key(|s| s.updated_at);
    assert_eq!(samples[0].previous_status, Status::Invalid);
    for pair in samples.windows(2) {
        assert_eq!(pair[1].previous_status, pair[0].status);
        assert_eq!(pair[1].created_at, pair[0].created_at);
    }
    let first_writes = samples
        .iter()
        .filter(|s| s.previous_status == Status::Invalid)
        .count();
    assert_eq!(first_writes, 1);

    assert_eq!(engine.sample_count().await?, 1);
    assert_eq!(engine.subjects_for_aspect("temp").await?, vec!["na.us"]);
    let stored = engine.read("NA.US|Temp").await?;
    assert_eq!(Some(&stored), samples.last());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_upserts_to_different_subjects() -> SamstoResult<()> {
    let source = fixtures::north_america_source()?;
    for i in 0..8 {
        source.upsert_subject(fixtures::published_subject(&format!("NA.US.S{}", i)))?;
    }
    let h = harness(source).await?;
    let engine = Arc::new(h.engine);

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .upsert(UpsertRequest::new(format!("NA.US.S{}|Temp", i), "50"))
                .await
        }));
    }
    for handle in handles {
        let sample = handle.await.expect("upsert task panicked")?;
        assert_eq!(sample.status, Status::Warning);
    }

    assert_eq!(engine.sample_count().await?, 8);
    assert_eq!(engine.subjects_for_aspect("Temp").await?.len(), 8);
    Ok(())
}

#[tokio::test]
async fn test_sequential_upserts_without_key_locks() -> SamstoResult<()> {
    let h = north_america().await?;
    let engine = h.engine.with_serialize_same_key(false);

    for value in ["1", "50", "99", "1"] {
        engine.upsert(UpsertRequest::new("NA.US|Temp", value)).await?;
    }
    let sample = engine.read("NA.US|Temp").await?;
    assert_eq!(sample.status, Status::Ok);
    assert_eq!(sample.previous_status, Status::Critical);
    assert_eq!(engine.sample_count().await?, 1);
    Ok(())
}

// ============================================================================
// REPLICATION DURING UPSERT
// ============================================================================

/// Unpublishes a subject right after the first write of one sample key,
/// as a replication event landing mid-upsert would.
struct UnpublishOnSampleWrite {
    inner: InMemoryBackend,
    sample_key: String,
    subject: Subject,
    fired: AtomicBool,
}

#[async_trait]
impl StoreBackend for UnpublishOnSampleWrite {
    async fn hash_get(&self, key: &str) -> SamstoResult<Option<FieldMap>> {
        self.inner.hash_get(key).await
    }

    async fn hash_replace(&self, key: &str, fields: &FieldMap) -> SamstoResult<()> {
        self.inner.hash_replace(key, fields).await?;
        if key == self.sample_key && !self.fired.swap(true, Ordering::SeqCst) {
            let mut subject = self.subject.clone();
            subject.is_published = false;
            self.inner
                .hash_replace(&subject.key(), &subject.to_fields()?)
                .await?;
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.inner.set_add(key, member).await
    }

    async fn set_remove(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.inner.set_remove(key, member).await
    }

    async fn set_members(&self, key: &str) -> SamstoResult<Vec<String>> {
        self.inner.set_members(key).await
    }

    async fn set_contains(&self, key: &str, member: &str) -> SamstoResult<bool> {
        self.inner.set_contains(key, member).await
    }

    async fn set_len(&self, key: &str) -> SamstoResult<u64> {
        self.inner.set_len(key).await
    }

    async fn delete(&self, keys: &[String]) -> SamstoResult<u64> {
        self.inner.delete(keys).await
    }

    async fn scan_prefix(&self, prefix: &str) -> SamstoResult<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }

    async fn ping(&self) -> SamstoResult<()> {
        self.inner.ping().await
    }
}

#[tokio::test]
async fn test_subject_unpublished_mid_upsert_leaves_no_sample() -> SamstoResult<()> {
    let backend = Arc::new(UnpublishOnSampleWrite {
        inner: InMemoryBackend::new(),
        sample_key: keys::sample_key("NA.US", "Temp"),
        subject: fixtures::published_subject("NA.US"),
        fired: AtomicBool::new(false),
    });
    let engine = SampleEngine::new(
        Arc::clone(&backend),
        Arc::new(fixtures::north_america_source()?),
    );
    engine.init().await?;
    engine.upsert(UpsertRequest::new("NA|Temp", "1")).await?;

    let result = engine.upsert(UpsertRequest::new("NA.US|Temp", "1")).await;
    assert_not_found(&result, NotFoundError::Subject);

    assert!(backend
        .hash_get(&keys::sample_key("NA.US", "Temp"))
        .await?
        .is_none());
    assert_eq!(engine.sample_count().await?, 1);
    assert_eq!(engine.subjects_for_aspect("Temp").await?, vec!["na"]);
    Ok(())
}
