//! Process-wide query cache shared by all views.
//!
//! The cache maps a [`QueryKey`] to the last value fetched for it, tracks
//! which entries are mid-fetch, and supports two operations beyond plain
//! get/store: family-wide invalidation (mark every entry of a family stale
//! so the next read refetches) and optimistic rewrites with rollback (apply
//! a local edit to cached entries before the server confirms it, restoring
//! the prior bytes if it does not).
//!
//! Values are stored as `serde_json::Value` so entries of different types
//! can live in one registry; a lookup that fails to decode is treated as a
//! miss rather than an error.

use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use super::key::{Family, QueryKey};

/// Proof of ownership of one in-flight fetch.
///
/// A fetch first claims its key with [`QueryCache::begin_fetch`] and gets a
/// ticket back. Writing the result requires the same ticket; if the fetch
/// was superseded or cancelled in the meantime the write is rejected, which
/// is what keeps late responses from clobbering newer data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone)]
struct Stored {
  json: serde_json::Value,
  fetched_at: Instant,
}

#[derive(Debug, Default)]
struct Entry {
  value: Option<Stored>,
  last_error: Option<String>,
  invalidated: bool,
  ticket: Option<FetchTicket>,
  version: u64,
}

struct Inner {
  entries: HashMap<QueryKey, Entry>,
  next_version: u64,
  next_ticket: u64,
}

/// A decoded cache hit.
#[derive(Debug, Clone)]
pub struct Snapshot<T> {
  pub data: T,
  pub version: u64,
  pub age: Duration,
  pub invalidated: bool,
}

/// Entry bookkeeping without the (possibly large) value.
#[derive(Debug, Clone)]
pub struct EntryMeta {
  pub version: u64,
  pub has_value: bool,
  pub age: Option<Duration>,
  pub invalidated: bool,
  pub in_flight: bool,
  pub last_error: Option<String>,
}

/// Rollback handle for one optimistic rewrite.
///
/// Holds the prior stored bytes of every entry the rewrite touched. Pass it
/// back to [`QueryCache::rollback`] if the mutation fails; drop it on
/// success.
#[derive(Debug)]
pub struct MutationContext {
  snapshots: Vec<(QueryKey, Stored)>,
}

impl MutationContext {
  pub fn is_empty(&self) -> bool {
    self.snapshots.is_empty()
  }

  pub fn len(&self) -> usize {
    self.snapshots.len()
  }
}

/// Shared cache registry. Cheap to clone; all clones see the same entries.
pub struct QueryCache {
  inner: Arc<Mutex<Inner>>,
  default_stale: Duration,
}

impl QueryCache {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        next_version: 0,
        next_ticket: 0,
      })),
      default_stale: Duration::from_secs(300),
    }
  }

  /// Set how long stored values count as fresh for queries that don't
  /// override it.
  pub fn with_stale_time(mut self, stale_time: Duration) -> Self {
    self.default_stale = stale_time;
    self
  }

  pub fn default_stale(&self) -> Duration {
    self.default_stale
  }

  fn with_inner<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> Result<R> {
    let mut inner = self
      .inner
      .lock()
      .map_err(|e| eyre!("Cache lock poisoned: {}", e))?;
    Ok(f(&mut inner))
  }

  /// Claim a key for fetching. Returns `None` if another fetch already
  /// holds it, in which case the caller should wait and adopt that result.
  pub fn begin_fetch(&self, key: &QueryKey) -> Result<Option<FetchTicket>> {
    self.with_inner(|inner| {
      let occupied = inner.entries.get(key).is_some_and(|e| e.ticket.is_some());
      if occupied {
        return None;
      }
      let ticket = FetchTicket(inner.next_ticket);
      inner.next_ticket += 1;
      inner.entries.entry(key.clone()).or_default().ticket = Some(ticket);
      Some(ticket)
    })
  }

  /// Claim a key for fetching, taking over from any fetch already in
  /// flight. The superseded fetch's ticket stops matching, so its late
  /// result is rejected at write time.
  pub fn begin_refetch(&self, key: &QueryKey) -> Result<FetchTicket> {
    self.with_inner(|inner| {
      let ticket = FetchTicket(inner.next_ticket);
      inner.next_ticket += 1;
      let entry = inner.entries.entry(key.clone()).or_default();
      entry.ticket = Some(ticket);
      ticket
    })
  }

  /// Release a claimed fetch without writing a result. Wakes any handle
  /// waiting on this key so it can issue its own fetch.
  pub fn cancel(&self, key: &QueryKey, ticket: FetchTicket) -> Result<()> {
    self.with_inner(|inner| {
      let held = inner.entries.get(key).is_some_and(|e| e.ticket == Some(ticket));
      if !held {
        return;
      }
      let version = inner.bump();
      if let Some(entry) = inner.entries.get_mut(key) {
        entry.ticket = None;
        entry.version = version;
      }
    })
  }

  /// Store a fetched value. Returns the new entry version, or `None` if the
  /// ticket no longer matches (the fetch was superseded or cancelled) and
  /// the value was discarded.
  pub fn store<T: Serialize>(
    &self,
    key: &QueryKey,
    ticket: FetchTicket,
    value: &T,
  ) -> Result<Option<u64>> {
    let json = serde_json::to_value(value)
      .map_err(|e| eyre!("Failed to serialize cache entry for {}: {}", key, e))?;
    self.with_inner(|inner| {
      let version = inner.bump();
      let entry = inner.entries.entry(key.clone()).or_default();
      if entry.ticket != Some(ticket) {
        debug!("discarding superseded result for {}", key);
        return None;
      }
      entry.value = Some(Stored {
        json,
        fetched_at: Instant::now(),
      });
      entry.last_error = None;
      entry.invalidated = false;
      entry.ticket = None;
      entry.version = version;
      Some(version)
    })
  }

  /// Record a failed fetch. The previous value, if any, is kept so callers
  /// can go on showing it.
  pub fn store_error(
    &self,
    key: &QueryKey,
    ticket: FetchTicket,
    error: &str,
  ) -> Result<Option<u64>> {
    self.with_inner(|inner| {
      let version = inner.bump();
      let entry = inner.entries.entry(key.clone()).or_default();
      if entry.ticket != Some(ticket) {
        return None;
      }
      entry.last_error = Some(error.to_string());
      entry.ticket = None;
      entry.version = version;
      Some(version)
    })
  }

  /// Look up and decode the value for a key. Decode failures count as a
  /// miss: the entry was written by a different type and is useless here.
  pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Result<Option<Snapshot<T>>> {
    self.with_inner(|inner| {
      let entry = inner.entries.get(key)?;
      let stored = entry.value.as_ref()?;
      match serde_json::from_value::<T>(stored.json.clone()) {
        Ok(data) => Some(Snapshot {
          data,
          version: entry.version,
          age: stored.fetched_at.elapsed(),
          invalidated: entry.invalidated,
        }),
        Err(e) => {
          debug!("cache entry for {} did not decode: {}", key, e);
          None
        }
      }
    })
  }

  /// Entry bookkeeping for a key without decoding the value.
  pub fn meta(&self, key: &QueryKey) -> Result<Option<EntryMeta>> {
    self.with_inner(|inner| {
      inner.entries.get(key).map(|entry| EntryMeta {
        version: entry.version,
        has_value: entry.value.is_some(),
        age: entry.value.as_ref().map(|s| s.fetched_at.elapsed()),
        invalidated: entry.invalidated,
        in_flight: entry.ticket.is_some(),
        last_error: entry.last_error.clone(),
      })
    })
  }

  /// Mark every entry of a family stale. The values stay readable, but the
  /// next read through a query refetches them.
  pub fn invalidate(&self, family: Family) -> Result<usize> {
    let count = self.with_inner(|inner| {
      let mut count = 0;
      for (key, entry) in inner.entries.iter_mut() {
        if key.family() == family {
          entry.invalidated = true;
          entry.last_error = None;
          count += 1;
        }
      }
      count
    })?;
    debug!("invalidated {} cache entries for {}", count, family);
    Ok(count)
  }

  /// Apply an optimistic rewrite to every decodable entry of a family.
  ///
  /// The closure receives each entry's current value and returns the
  /// rewritten one, or `None` to leave that entry alone. Touched entries
  /// have their prior bytes captured in the returned [`MutationContext`].
  pub fn begin_optimistic<T, F>(&self, family: Family, mut rewrite: F) -> Result<MutationContext>
  where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> Option<T>,
  {
    self.with_inner(|inner| {
      let mut snapshots = Vec::new();
      let version = inner.bump();
      for (key, entry) in inner.entries.iter_mut() {
        if key.family() != family {
          continue;
        }
        let Some(stored) = entry.value.as_ref() else {
          continue;
        };
        let Ok(decoded) = serde_json::from_value::<T>(stored.json.clone()) else {
          continue;
        };
        let Some(rewritten) = rewrite(decoded) else {
          continue;
        };
        let Ok(json) = serde_json::to_value(&rewritten) else {
          continue;
        };
        snapshots.push((key.clone(), stored.clone()));
        // The staleness clock is left untouched: this is a local guess,
        // not a server read.
        let fetched_at = stored.fetched_at;
        entry.value = Some(Stored { json, fetched_at });
        entry.version = version;
      }
      MutationContext { snapshots }
    })
  }

  /// Restore the entries captured by an optimistic rewrite to their prior
  /// bytes.
  pub fn rollback(&self, ctx: MutationContext) -> Result<()> {
    self.with_inner(|inner| {
      let version = inner.bump();
      for (key, stored) in ctx.snapshots {
        if let Some(entry) = inner.entries.get_mut(&key) {
          entry.value = Some(stored);
          entry.version = version;
        }
      }
    })
  }
}

impl Inner {
  fn bump(&mut self) -> u64 {
    self.next_version += 1;
    self.next_version
  }
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for QueryCache {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      default_stale: self.default_stale,
    }
  }
}

impl std::fmt::Debug for QueryCache {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("QueryCache")
      .field("default_stale", &self.default_stale)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn seed<T: Serialize>(cache: &QueryCache, key: &QueryKey, value: &T) -> u64 {
    let ticket = cache.begin_fetch(key).unwrap().unwrap();
    cache.store(key, ticket, value).unwrap().unwrap()
  }

  #[test]
  fn test_store_and_get() {
    let cache = QueryCache::new();
    let key = QueryKey::list(Family::Categories);

    seed(&cache, &key, &vec!["law".to_string(), "tax".to_string()]);

    let snap = cache.get::<Vec<String>>(&key).unwrap().unwrap();
    assert_eq!(snap.data, vec!["law".to_string(), "tax".to_string()]);
    assert!(!snap.invalidated);
  }

  #[test]
  fn test_decode_mismatch_is_a_miss() {
    let cache = QueryCache::new();
    let key = QueryKey::list(Family::Categories);
    seed(&cache, &key, &vec![1u32, 2, 3]);

    // Same key read as an incompatible type: miss, not error.
    assert!(cache.get::<Vec<HashMap<String, u64>>>(&key).unwrap().is_none());
    assert!(cache.meta(&key).unwrap().unwrap().has_value);
  }

  #[test]
  fn test_superseded_store_is_rejected() {
    let cache = QueryCache::new();
    let key = QueryKey::page(Family::Products, 3);

    let old = cache.begin_fetch(&key).unwrap().unwrap();
    // A refetch takes over the key before the first fetch lands.
    let new = cache.begin_refetch(&key).unwrap();

    assert_eq!(cache.store(&key, old, &"stale".to_string()).unwrap(), None);
    assert!(cache
      .store(&key, new, &"current".to_string())
      .unwrap()
      .is_some());

    let snap = cache.get::<String>(&key).unwrap().unwrap();
    assert_eq!(snap.data, "current");
  }

  #[test]
  fn test_cancelled_fetch_never_writes() {
    let cache = QueryCache::new();
    let key = QueryKey::list(Family::Blogs);

    let ticket = cache.begin_fetch(&key).unwrap().unwrap();
    cache.cancel(&key, ticket).unwrap();

    assert_eq!(cache.store(&key, ticket, &42u64).unwrap(), None);
    assert!(!cache.meta(&key).unwrap().unwrap().has_value);
    assert!(!cache.meta(&key).unwrap().unwrap().in_flight);
  }

  #[test]
  fn test_invalidate_marks_whole_family() {
    let cache = QueryCache::new();
    let p1 = QueryKey::page(Family::Products, 1);
    let p2 = QueryKey::page(Family::Products, 2);
    let other = QueryKey::list(Family::Categories);
    seed(&cache, &p1, &1u64);
    seed(&cache, &p2, &2u64);
    seed(&cache, &other, &3u64);

    let count = cache.invalidate(Family::Products).unwrap();

    assert_eq!(count, 2);
    assert!(cache.meta(&p1).unwrap().unwrap().invalidated);
    assert!(cache.meta(&p2).unwrap().unwrap().invalidated);
    assert!(!cache.meta(&other).unwrap().unwrap().invalidated);
    // Invalidated values remain readable until replaced.
    assert_eq!(cache.get::<u64>(&p1).unwrap().unwrap().data, 1);
  }

  #[test]
  fn test_optimistic_rewrite_and_rollback() {
    let cache = QueryCache::new();
    let key = QueryKey::list(Family::PromoCodes);
    seed(&cache, &key, &vec!["a".to_string(), "b".to_string()]);

    let before = serde_json::to_vec(&cache.get::<Vec<String>>(&key).unwrap().unwrap().data)
      .unwrap();

    let ctx = cache
      .begin_optimistic::<Vec<String>, _>(Family::PromoCodes, |mut items| {
        items.retain(|i| i != "b");
        Some(items)
      })
      .unwrap();
    assert_eq!(ctx.len(), 1);
    assert_eq!(
      cache.get::<Vec<String>>(&key).unwrap().unwrap().data,
      vec!["a".to_string()]
    );

    cache.rollback(ctx).unwrap();

    let after = serde_json::to_vec(&cache.get::<Vec<String>>(&key).unwrap().unwrap().data)
      .unwrap();
    assert_eq!(before, after);
  }

  #[test]
  fn test_optimistic_skips_untouched_and_undecodable_entries() {
    let cache = QueryCache::new();
    let strings = QueryKey::list(Family::Products);
    let numbers = QueryKey::page(Family::Products, 1);
    seed(&cache, &strings, &vec!["x".to_string()]);
    seed(&cache, &numbers, &vec![7u64]);

    let ctx = cache
      .begin_optimistic::<Vec<String>, _>(Family::Products, |items| {
        if items.contains(&"x".to_string()) {
          Some(Vec::new())
        } else {
          None
        }
      })
      .unwrap();

    // Only the decodable, rewritten entry was captured.
    assert_eq!(ctx.len(), 1);
    assert_eq!(cache.get::<Vec<u64>>(&numbers).unwrap().unwrap().data, vec![7]);
  }

  #[test]
  fn test_versions_increase_on_every_write() {
    let cache = QueryCache::new();
    let key = QueryKey::list(Family::Sales);

    let v1 = seed(&cache, &key, &1u64);
    let v2 = seed(&cache, &key, &2u64);
    assert!(v2 > v1);
  }
}
