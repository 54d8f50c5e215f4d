//! Async query handles for data fetching through the shared cache.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! encapsulates async data fetching, loading states, error handling, and
//! cache adoption. Every query is bound to a [`QueryKey`] in a shared
//! [`QueryCache`]; two handles with the same key share results, and an
//! in-flight fetch is never duplicated.
//!
//! # Example
//!
//! ```ignore
//! let api = client.clone();
//! let mut query = Query::new(cache, QueryKey::list(Family::Categories), move || {
//!     let api = api.clone();
//!     async move { api.list(Family::Categories).await.map_err(|e| e.to_string()) }
//! });
//!
//! // Start fetching (served straight from cache when fresh)
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

mod cache;
mod key;
mod mutation;

pub use cache::{EntryMeta, FetchTicket, MutationContext, QueryCache, Snapshot};
pub use key::{Family, QueryKey};
pub use mutation::{Mutation, MutationState};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching and has nothing to show yet
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Result of one finished fetch, tagged with the cache version it produced.
struct FetchDone<T> {
  version: u64,
  result: Result<T, String>,
}

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Loading/success/error states
/// - Adoption of values stored under the same key by other handles
/// - Stale-while-revalidate: a stale cache hit renders immediately while a
///   background refresh runs
/// - An enabled flag that gates fetching entirely (for screens whose
///   preconditions aren't met yet)
///
/// Dropping a query cancels its in-flight fetch: the late response is
/// rejected at the cache and never reaches the UI.
pub struct Query<T> {
  cache: QueryCache,
  key: QueryKey,
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<FetchDone<T>>>,
  ticket: Option<FetchTicket>,
  seen_version: u64,
  stale_time: Duration,
  enabled: bool,
  error_notice: Option<String>,
}

impl<T: Serialize + DeserializeOwned + Send + 'static> Query<T> {
  /// Create a new query for `key` with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It is called whenever
  /// the query actually needs the network; cache hits never invoke it.
  pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    let stale_time = cache.default_stale();
    Self {
      cache,
      key,
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      ticket: None,
      seen_version: 0,
      stale_time,
      enabled: true,
      error_notice: None,
    }
  }

  /// Override how long a cached value counts as fresh for this query.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Set whether this query may fetch at all. A disabled query stays Idle
  /// and `fetch()`/`refetch()` are no-ops until it is enabled again.
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn key(&self) -> &QueryKey {
    &self.key
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the query is currently loading with nothing to show.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Take the pending failure notice, if any. A failed fetch produces
  /// exactly one notice, even when stale data is still being shown.
  pub fn take_error_notice(&mut self) -> Option<String> {
    self.error_notice.take()
  }

  /// Read through the cache, fetching only when needed.
  ///
  /// - Fresh cached value: adopt it and return, no network.
  /// - Stale cached value: adopt it, then refresh in the background.
  /// - Someone else already fetching this key: wait and adopt their result.
  /// - Otherwise: claim the key and fetch.
  ///
  /// No-op while disabled or while this handle already has a fetch running.
  pub fn fetch(&mut self) {
    if !self.enabled || self.receiver.is_some() {
      return;
    }

    let meta = self.cache.meta(&self.key).ok().flatten();
    if let Some(meta) = &meta {
      if meta.has_value && meta.version > self.seen_version {
        self.adopt_cached();
      }
      let fresh = meta.has_value
        && !meta.invalidated
        && meta.age.is_some_and(|age| age <= self.stale_time);
      if fresh && self.state.is_success() {
        return;
      }
      if meta.in_flight {
        if !self.state.is_success() {
          self.state = QueryState::Loading;
        }
        return;
      }
    }

    match self.cache.begin_fetch(&self.key) {
      Ok(Some(ticket)) => self.start_fetch(ticket),
      Ok(None) => {
        // Raced with another handle; adopt its result in poll().
        if !self.state.is_success() {
          self.state = QueryState::Loading;
        }
      }
      Err(e) => self.state = QueryState::Error(format!("cache unavailable: {}", e)),
    }
  }

  /// Force a refetch, superseding any fetch already in flight for this key.
  /// The superseded response is rejected at the cache when it lands.
  pub fn refetch(&mut self) {
    if !self.enabled {
      return;
    }
    self.receiver = None;
    self.ticket = None;
    match self.cache.begin_refetch(&self.key) {
      Ok(ticket) => self.start_fetch(ticket),
      Err(e) => self.state = QueryState::Error(format!("cache unavailable: {}", e)),
    }
  }

  /// Poll for results. Returns `true` if the state changed.
  ///
  /// Picks up, in order: this handle's own finished fetch, values stored
  /// under the same key by other handles or optimistic rewrites, and
  /// family invalidations (which start a background refresh).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = self.drain_channel();

    let Ok(Some(meta)) = self.cache.meta(&self.key) else {
      return changed;
    };

    if meta.version > self.seen_version {
      self.seen_version = meta.version;
      if meta.has_value {
        if let Ok(Some(snap)) = self.cache.get::<T>(&self.key) {
          self.state = QueryState::Success(snap.data);
          changed = true;
        }
      } else if let Some(error) = meta.last_error.clone() {
        if !self.state.is_success() {
          self.state = QueryState::Error(error.clone());
        }
        self.error_notice = Some(error);
        changed = true;
      } else if self.receiver.is_none() && self.state.is_loading() {
        // The fetch this handle was waiting on went away without a
        // result; issue our own.
        self.fetch();
        changed = true;
      }
    }

    // A mutation invalidated this entry: revalidate in the background.
    // Skipped after a failed attempt so a broken endpoint isn't hammered;
    // manual refresh or the next invalidation re-arms it.
    if self.enabled
      && self.receiver.is_none()
      && meta.invalidated
      && !meta.in_flight
      && meta.last_error.is_none()
      && self.state.is_success()
    {
      if let Ok(Some(ticket)) = self.cache.begin_fetch(&self.key) {
        self.start_fetch(ticket);
      }
    }

    changed
  }

  fn adopt_cached(&mut self) -> bool {
    match self.cache.get::<T>(&self.key) {
      Ok(Some(snap)) => {
        self.seen_version = self.seen_version.max(snap.version);
        self.state = QueryState::Success(snap.data);
        true
      }
      _ => false,
    }
  }

  fn drain_channel(&mut self) -> bool {
    let Some(rx) = &mut self.receiver else {
      return false;
    };
    match rx.try_recv() {
      Ok(done) => {
        self.receiver = None;
        self.ticket = None;
        // A version below what we've already adopted means something newer
        // was stored while this result was in transit.
        let current = done.version == 0 || done.version >= self.seen_version;
        self.seen_version = self.seen_version.max(done.version);
        match done.result {
          Ok(data) if current => self.state = QueryState::Success(data),
          Ok(_) => {}
          Err(error) => {
            if current {
              if !self.state.is_success() {
                self.state = QueryState::Error(error.clone());
              }
              self.error_notice = Some(error);
            }
          }
        }
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as cancellation
        self.receiver = None;
        self.ticket = None;
        if !self.state.is_success() {
          self.state = QueryState::Error("Request was cancelled".to_string());
        }
        true
      }
    }
  }

  /// Internal: start the fetch operation under a claimed ticket.
  fn start_fetch(&mut self, ticket: FetchTicket) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.ticket = Some(ticket);
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let future = (self.fetcher)();
    let cache = self.cache.clone();
    let key = self.key.clone();
    tokio::spawn(async move {
      let done = match future.await {
        Ok(data) => match cache.store(&key, ticket, &data) {
          Ok(Some(version)) => FetchDone {
            version,
            result: Ok(data),
          },
          // Superseded or cancelled while in flight; a newer fetch owns
          // this key now.
          Ok(None) => return,
          Err(e) => {
            warn!("failed to cache result for {}: {}", key, e);
            FetchDone {
              version: 0,
              result: Ok(data),
            }
          }
        },
        Err(error) => match cache.store_error(&key, ticket, &error) {
          Ok(Some(version)) => FetchDone {
            version,
            result: Err(error),
          },
          Ok(None) => return,
          Err(_) => FetchDone {
            version: 0,
            result: Err(error),
          },
        },
      };
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(done);
    });
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    // Release the claim so the late response is rejected at the cache and
    // waiting handles get to fetch for themselves.
    if let Some(ticket) = self.ticket.take() {
      let _ = self.cache.cancel(&self.key, ticket);
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key)
      .field("state", &self.state)
      .field("stale_time", &self.stale_time)
      .field("enabled", &self.enabled)
      .finish_non_exhaustive()
  }
}
