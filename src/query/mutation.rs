//! Write operations with optimistic cache updates.
//!
//! A [`Mutation`] runs one async operation against the API and drives the
//! begin/settle protocol around it: on begin it may rewrite the family's
//! cached entries so the UI reflects the change immediately, on a failed
//! settle it restores the prior bytes, and on every settle it invalidates
//! the family so the next read reconciles with the server.
//!
//! # Example
//!
//! ```ignore
//! let api = client.clone();
//! let id = row.id.clone();
//! mutation.start_optimistic::<Paged<Category>, _, _>(
//!     Family::Categories,
//!     move |mut page| {
//!         let before = page.items.len();
//!         page.items.retain(|c| c.id != id);
//!         (page.items.len() != before).then(|| {
//!             page.total -= 1;
//!             page
//!         })
//!     },
//!     async move { api.delete(Family::Categories, &id2).await.map_err(|e| e.to_string()) },
//! );
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tracing::warn;

use super::cache::{MutationContext, QueryCache};
use super::key::Family;

/// The state of a mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState {
  /// No mutation started yet
  Idle,
  /// Operation sent, waiting for the server
  Pending,
  /// Last operation succeeded
  Success,
  /// Last operation failed
  Error(String),
}

/// One write operation against the API, tied to the shared cache.
///
/// While a mutation is pending, further `start` calls are ignored; callers
/// use [`Mutation::is_pending`] to disable the controls that would submit
/// twice.
pub struct Mutation {
  cache: QueryCache,
  state: MutationState,
  receiver: Option<mpsc::UnboundedReceiver<Result<(), String>>>,
  rollback: Option<MutationContext>,
  family: Option<Family>,
}

impl Mutation {
  pub fn new(cache: QueryCache) -> Self {
    Self {
      cache,
      state: MutationState::Idle,
      receiver: None,
      rollback: None,
      family: None,
    }
  }

  pub fn state(&self) -> &MutationState {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  /// Start a mutation without touching the cache up front. The family is
  /// still invalidated on settlement.
  pub fn start<Fut>(&mut self, family: Family, op: Fut)
  where
    Fut: Future<Output = Result<(), String>> + Send + 'static,
  {
    self.launch(family, None, op);
  }

  /// Start a mutation with an optimistic rewrite.
  ///
  /// `rewrite` is applied to every cached entry of `family` before the
  /// operation runs (see [`QueryCache::begin_optimistic`]); if the
  /// operation fails, the touched entries are restored exactly.
  pub fn start_optimistic<T, F, Fut>(&mut self, family: Family, rewrite: F, op: Fut)
  where
    T: Serialize + DeserializeOwned,
    F: FnMut(T) -> Option<T>,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
  {
    if self.is_pending() {
      return;
    }
    let ctx = match self.cache.begin_optimistic(family, rewrite) {
      Ok(ctx) => Some(ctx),
      Err(e) => {
        warn!("optimistic update skipped for {}: {}", family, e);
        None
      }
    };
    self.launch(family, ctx, op);
  }

  fn launch<Fut>(&mut self, family: Family, ctx: Option<MutationContext>, op: Fut)
  where
    Fut: Future<Output = Result<(), String>> + Send + 'static,
  {
    if self.is_pending() {
      return;
    }
    self.rollback = ctx;
    self.family = Some(family);
    self.state = MutationState::Pending;

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    tokio::spawn(async move {
      let _ = tx.send(op.await);
    });
  }

  /// Poll for settlement. Returns the outcome exactly once when the
  /// operation finishes; rollback and family invalidation have already
  /// happened by the time the caller sees it.
  pub fn poll(&mut self) -> Option<Result<(), String>> {
    let rx = self.receiver.as_mut()?;
    let outcome = match rx.try_recv() {
      Ok(result) => result,
      Err(mpsc::error::TryRecvError::Empty) => return None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        Err("Operation was cancelled".to_string())
      }
    };
    self.receiver = None;

    match &outcome {
      Ok(()) => {
        self.rollback = None;
        self.state = MutationState::Success;
      }
      Err(error) => {
        if let Some(ctx) = self.rollback.take() {
          if let Err(e) = self.cache.rollback(ctx) {
            warn!("rollback failed: {}", e);
          }
        }
        self.state = MutationState::Error(error.clone());
      }
    }

    // Settled either way: the server is the source of truth from here, so
    // every cached page of the family goes stale.
    if let Some(family) = self.family.take() {
      if let Err(e) = self.cache.invalidate(family) {
        warn!("invalidation failed for {}: {}", family, e);
      }
    }

    Some(outcome)
  }
}

impl std::fmt::Debug for Mutation {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Mutation")
      .field("state", &self.state)
      .field("family", &self.family)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::query::key::QueryKey;
  use serde::{Deserialize, Serialize};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
  struct Page {
    items: Vec<String>,
    total: usize,
  }

  fn seed(cache: &QueryCache, key: &QueryKey, page: &Page) {
    let ticket = cache.begin_fetch(key).unwrap().unwrap();
    cache.store(key, ticket, page).unwrap().unwrap();
  }

  async fn settle(mutation: &mut Mutation) -> Result<(), String> {
    for _ in 0..50 {
      if let Some(outcome) = mutation.poll() {
        return outcome;
      }
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("mutation never settled");
  }

  #[tokio::test]
  async fn test_success_invalidates_family() {
    let cache = QueryCache::new();
    let key = QueryKey::page(Family::Categories, 1);
    seed(
      &cache,
      &key,
      &Page {
        items: vec!["a".into()],
        total: 1,
      },
    );

    let mut mutation = Mutation::new(cache.clone());
    mutation.start(Family::Categories, async { Ok(()) });
    assert!(mutation.is_pending());

    assert_eq!(settle(&mut mutation).await, Ok(()));
    assert_eq!(*mutation.state(), MutationState::Success);
    assert!(cache.meta(&key).unwrap().unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_optimistic_delete_shows_immediately() {
    let cache = QueryCache::new();
    let key = QueryKey::page(Family::Products, 1);
    seed(
      &cache,
      &key,
      &Page {
        items: vec!["keep".into(), "gone".into()],
        total: 2,
      },
    );

    let mut mutation = Mutation::new(cache.clone());
    mutation.start_optimistic::<Page, _, _>(
      Family::Products,
      |mut page| {
        page.items.retain(|i| i != "gone");
        page.total -= 1;
        Some(page)
      },
      async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
      },
    );

    // Rewrite is visible before the server answers.
    let snap = cache.get::<Page>(&key).unwrap().unwrap();
    assert_eq!(snap.data.items, vec!["keep".to_string()]);
    assert_eq!(snap.data.total, 1);

    assert_eq!(settle(&mut mutation).await, Ok(()));
    assert!(cache.meta(&key).unwrap().unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_failure_restores_prior_bytes() {
    let cache = QueryCache::new();
    let key = QueryKey::page(Family::Products, 1);
    let original = Page {
      items: vec!["keep".into(), "gone".into()],
      total: 2,
    };
    seed(&cache, &key, &original);
    let before = serde_json::to_vec(&cache.get::<Page>(&key).unwrap().unwrap().data).unwrap();

    let mut mutation = Mutation::new(cache.clone());
    mutation.start_optimistic::<Page, _, _>(
      Family::Products,
      |mut page| {
        page.items.retain(|i| i != "gone");
        page.total -= 1;
        Some(page)
      },
      async { Err("403 forbidden".to_string()) },
    );

    let outcome = settle(&mut mutation).await;
    assert_eq!(outcome, Err("403 forbidden".to_string()));
    assert_eq!(*mutation.state(), MutationState::Error("403 forbidden".into()));

    // The cached page is byte-identical to what it was before the attempt.
    let after = serde_json::to_vec(&cache.get::<Page>(&key).unwrap().unwrap().data).unwrap();
    assert_eq!(before, after);
    // And still marked stale so the next read reconciles with the server.
    assert!(cache.meta(&key).unwrap().unwrap().invalidated);
  }

  #[tokio::test]
  async fn test_start_while_pending_is_ignored() {
    let cache = QueryCache::new();
    let mut mutation = Mutation::new(cache);

    mutation.start(Family::Blogs, async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok(())
    });
    // A second submission while pending is dropped.
    mutation.start(Family::Blogs, async { Err("should not run".to_string()) });

    assert_eq!(settle(&mut mutation).await, Ok(()));
  }

  #[tokio::test]
  async fn test_poll_reports_outcome_once() {
    let cache = QueryCache::new();
    let mut mutation = Mutation::new(cache);
    mutation.start(Family::Blogs, async { Ok(()) });

    assert_eq!(settle(&mut mutation).await, Ok(()));
    assert_eq!(mutation.poll(), None);
  }
}
