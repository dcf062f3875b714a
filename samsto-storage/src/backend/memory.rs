//! In-process backend with Redis-compatible semantics for hashes and sets.

use super::{FieldMap, StoreBackend};
use async_trait::async_trait;
use samsto_core::{SamstoError, SamstoResult, StoreError};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone)]
enum Entry {
    Hash(FieldMap),
    Set(BTreeSet<String>),
}

/// In-memory store used by tests and single-process deployments.
///
/// Mirrors Redis behaviour where it matters to callers: empty sets and
/// hashes cease to exist, and using a key as the wrong type is an error.
#[derive(Debug)]
pub struct InMemoryBackend {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    available: AtomicBool,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store going away (`false`) or coming back (`true`).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of keys currently held.
    pub fn key_count(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    fn check_available(&self) -> SamstoResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            }
            .into())
        }
    }

    fn read(&self) -> SamstoResult<std::sync::RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.check_available()?;
        self.entries
            .read()
            .map_err(|_| SamstoError::Store(StoreError::LockPoisoned))
    }

    fn write(&self) -> SamstoResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.check_available()?;
        self.entries
            .write()
            .map_err(|_| SamstoError::Store(StoreError::LockPoisoned))
    }
}

fn wrong_type(key: &str, expected: &str) -> SamstoError {
    StoreError::Decode {
        key: key.to_string(),
        reason: format!("WRONGTYPE key does not hold a {}", expected),
    }
    .into()
}

#[async_trait]
impl StoreBackend for InMemoryBackend {
    async fn hash_get(&self, key: &str) -> SamstoResult<Option<FieldMap>> {
        match self.read()?.get(key) {
            None => Ok(None),
            Some(Entry::Hash(fields)) => Ok(Some(fields.clone())),
            Some(Entry::Set(_)) => Err(wrong_type(key, "hash")),
        }
    }

    async fn hash_replace(&self, key: &str, fields: &FieldMap) -> SamstoResult<()> {
        let mut entries = self.write()?;
        if fields.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_string(), Entry::Hash(fields.clone()));
        }
        Ok(())
    }

    async fn set_add(&self, key: &str, member: &str) -> SamstoResult<bool> {
        let mut entries = self.write()?;
        match entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(members) => Ok(members.insert(member.to_string())),
            Entry::Hash(_) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> SamstoResult<bool> {
        let mut entries = self.write()?;
        let (removed, now_empty) = match entries.get_mut(key) {
            None => return Ok(false),
            Some(Entry::Set(members)) => (members.remove(member), members.is_empty()),
            Some(Entry::Hash(_)) => return Err(wrong_type(key, "set")),
        };
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> SamstoResult<Vec<String>> {
        match self.read()?.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> SamstoResult<bool> {
        match self.read()?.get(key) {
            None => Ok(false),
            Some(Entry::Set(members)) => Ok(members.contains(member)),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "set")),
        }
    }

    async fn set_len(&self, key: &str) -> SamstoResult<u64> {
        match self.read()?.get(key) {
            None => Ok(0),
            Some(Entry::Set(members)) => Ok(members.len() as u64),
            Some(Entry::Hash(_)) => Err(wrong_type(key, "set")),
        }
    }

    async fn delete(&self, keys: &[String]) -> SamstoResult<u64> {
        let mut entries = self.write()?;
        Ok(keys.iter().filter(|k| entries.remove(k.as_str()).is_some()).count() as u64)
    }

    async fn scan_prefix(&self, prefix: &str) -> SamstoResult<Vec<String>> {
        let entries = self.read()?;
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn ping(&self) -> SamstoResult<()> {
        self.check_available()
    }
}
