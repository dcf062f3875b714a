//! Authoritative relational store, as seen by the cache engine.

use async_trait::async_trait;
use samsto_core::{Aspect, EntityId, SamstoError, SamstoResult, SourceError, Subject, UserSummary};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// Read access to the relational Subject, Aspect and User tables.
///
/// Listings include unpublished rows. Lookups by natural name are
/// case-insensitive.
#[async_trait]
pub trait RelationalSource: Send + Sync {
    async fn list_subjects(&self) -> SamstoResult<Vec<Subject>>;

    async fn list_aspects(&self) -> SamstoResult<Vec<Aspect>>;

    async fn find_subject_by_absolute_path(&self, path: &str) -> SamstoResult<Option<Subject>>;

    async fn find_aspect_by_name(&self, name: &str) -> SamstoResult<Option<Aspect>>;

    async fn find_user(&self, id: EntityId) -> SamstoResult<Option<UserSummary>>;
}

/// In-memory relational store for tests and embedded use.
///
/// Rows are keyed by lowercased natural name, so listings come back in a
/// stable order.
#[derive(Debug, Default)]
pub struct InMemoryRelationalStore {
    subjects: Arc<RwLock<BTreeMap<String, Subject>>>,
    aspects: Arc<RwLock<BTreeMap<String, Aspect>>>,
    users: Arc<RwLock<HashMap<EntityId, UserSummary>>>,
}

fn poisoned() -> SamstoError {
    SourceError::Unavailable {
        reason: "relational store lock poisoned".to_string(),
    }
    .into()
}

impl InMemoryRelationalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a subject row.
    pub fn upsert_subject(&self, subject: Subject) -> SamstoResult<()> {
        let mut subjects = self.subjects.write().map_err(|_| poisoned())?;
        subjects.insert(subject.absolute_path.to_lowercase(), subject);
        Ok(())
    }

    /// Insert or replace an aspect row.
    pub fn upsert_aspect(&self, aspect: Aspect) -> SamstoResult<()> {
        let mut aspects = self.aspects.write().map_err(|_| poisoned())?;
        aspects.insert(aspect.name.to_lowercase(), aspect);
        Ok(())
    }

    pub fn insert_user(&self, user: UserSummary) -> SamstoResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        users.insert(user.id, user);
        Ok(())
    }

    pub fn remove_subject(&self, path: &str) -> SamstoResult<Option<Subject>> {
        let mut subjects = self.subjects.write().map_err(|_| poisoned())?;
        Ok(subjects.remove(&path.to_lowercase()))
    }

    pub fn remove_aspect(&self, name: &str) -> SamstoResult<Option<Aspect>> {
        let mut aspects = self.aspects.write().map_err(|_| poisoned())?;
        Ok(aspects.remove(&name.to_lowercase()))
    }

    /// Clear all rows.
    pub fn clear(&self) -> SamstoResult<()> {
        self.subjects.write().map_err(|_| poisoned())?.clear();
        self.aspects.write().map_err(|_| poisoned())?.clear();
        self.users.write().map_err(|_| poisoned())?.clear();
        Ok(())
    }

    pub fn subject_count(&self) -> usize {
        self.subjects.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn aspect_count(&self) -> usize {
        self.aspects.read().map(|a| a.len()).unwrap_or(0)
    }
}

#[async_trait]
impl RelationalSource for InMemoryRelationalStore {
    async fn list_subjects(&self) -> SamstoResult<Vec<Subject>> {
        let subjects = self.subjects.read().map_err(|_| poisoned())?;
        Ok(subjects.values().cloned().collect())
    }

    async fn list_aspects(&self) -> SamstoResult<Vec<Aspect>> {
        let aspects = self.aspects.read().map_err(|_| poisoned())?;
        Ok(aspects.values().cloned().collect())
    }

    async fn find_subject_by_absolute_path(&self, path: &str) -> SamstoResult<Option<Subject>> {
        let subjects = self.subjects.read().map_err(|_| poisoned())?;
        Ok(subjects.get(&path.to_lowercase()).cloned())
    }

    async fn find_aspect_by_name(&self, name: &str) -> SamstoResult<Option<Aspect>> {
        let aspects = self.aspects.read().map_err(|_| poisoned())?;
        Ok(aspects.get(&name.to_lowercase()).cloned())
    }

    async fn find_user(&self, id: EntityId) -> SamstoResult<Option<UserSummary>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(&id).cloned())
    }
}
