//! Typed, per-view handle over a cache subscription.
//!
//! A `Query<T>` owns one subscription to the resource cache and mirrors the
//! entry's state as idle/loading/success/error for rendering. Views call
//! `poll()` from their tick handler; it picks up both fetch completions and
//! refetches triggered by tag invalidation elsewhere in the app.
//!
//! # Example
//!
//! ```ignore
//! let api = api_client.clone();
//! let mut query = Query::new(
//!     &cache,
//!     QueryKey::bare("objectives"),
//!     &[Tag::Objective],
//!     move || {
//!         let api = api.clone();
//!         async move { api.list_objectives().await }
//!     },
//! );
//! query.fetch();
//!
//! // In the event loop tick
//! if query.poll() {
//!     // State changed, re-render
//! }
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;

use crate::api::{ApiError, ApiResult};
use crate::cache::{EntryStatus, QueryKey, ResourceCache, Subscription, Tag};

/// The state of a query, as a view sees it.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started yet.
  Idle,
  /// A request is in flight.
  Loading,
  /// Last fetch succeeded.
  Success(T),
  /// Last fetch failed.
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

/// A cache-backed query with typed results.
pub struct Query<T> {
  cache: ResourceCache,
  sub: Subscription,
  state: QueryState<T>,
  /// (version, status) of the last snapshot applied to `state`.
  seen: Option<(u64, EntryStatus)>,
}

impl<T: DeserializeOwned> Query<T> {
  /// Register the query in the cache and subscribe to it.
  ///
  /// The fetcher produces typed values; they are stored in the cache as JSON
  /// so other subscribers of the same key can share them.
  pub fn new<F, Fut, R>(cache: &ResourceCache, key: QueryKey, tags: &[Tag], fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<R>> + Send + 'static,
    R: Serialize,
  {
    let sub = cache.register(key, tags, move || {
      let fut = fetcher();
      async move {
        let data = fut.await?;
        serde_json::to_value(data)
          .map_err(|e| ApiError::Network(format!("invalid response body: {}", e)))
      }
    });

    Self {
      cache: cache.clone(),
      sub,
      state: QueryState::Idle,
      seen: None,
    }
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching unless the cached value is fresh or a request is already
  /// in flight. A fresh cached value is picked up without any network call.
  pub fn fetch(&mut self) {
    self.cache.ensure_fetched(self.sub.key());
    self.poll();
  }

  /// Force a reload regardless of freshness.
  pub fn refetch(&mut self) {
    self.cache.refetch(self.sub.key());
    self.poll();
  }

  /// Sync local state with the cache entry.
  ///
  /// Returns `true` if the state changed (data arrived, an error occurred,
  /// or an invalidation-triggered refetch started). Call this on every tick.
  pub fn poll(&mut self) -> bool {
    let Some(snap) = self.cache.snapshot(self.sub.key()) else {
      return false;
    };

    if self.seen == Some((snap.version, snap.status)) {
      return false;
    }

    self.state = match snap.status {
      EntryStatus::Uninitialized => QueryState::Idle,
      EntryStatus::Pending => QueryState::Loading,
      EntryStatus::Fulfilled => match snap.value {
        Some(value) => match serde_json::from_value::<T>((*value).clone()) {
          Ok(data) => QueryState::Success(data),
          Err(e) => QueryState::Error(format!("invalid cached value: {}", e)),
        },
        None => QueryState::Idle,
      },
      EntryStatus::Rejected => QueryState::Error(
        snap
          .error
          .map(|e| e.to_string())
          .unwrap_or_else(|| "request failed".to_string()),
      ),
    };
    self.seen = Some((snap.version, snap.status));
    true
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.sub.key().to_string())
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

/// Write-side counterpart of [`Query`]: runs one mutation at a time on a
/// spawned task and hands the result back to the view on poll.
///
/// Tag invalidation goes through [`ResourceCache::mutate`], so it happens
/// only on success and subscribed queries refetch automatically.
pub struct Mutation<T = ()> {
  rx: Option<tokio::sync::mpsc::UnboundedReceiver<ApiResult<T>>>,
}

impl<T> Default for Mutation<T> {
  fn default() -> Self {
    Self { rx: None }
  }
}

impl<T: Send + 'static> Mutation<T> {
  pub fn idle() -> Self {
    Self::default()
  }

  /// True while a mutation is running.
  pub fn in_flight(&self) -> bool {
    self.rx.is_some()
  }

  /// Start a mutation. A no-op if one is already in flight; views decide
  /// whether to queue or drop repeated submissions.
  pub fn run<Fut>(&mut self, cache: &ResourceCache, invalidates: &[Tag], fut: Fut)
  where
    Fut: std::future::Future<Output = ApiResult<T>> + Send + 'static,
  {
    if self.rx.is_some() {
      return;
    }

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    self.rx = Some(rx);

    let cache = cache.clone();
    let tags = invalidates.to_vec();
    tokio::spawn(async move {
      let result = cache.mutate(&tags, fut).await;
      // Ignore send errors - the view may have been popped.
      let _ = tx.send(result);
    });
  }

  /// Pick up the result of a finished mutation, if any. Each result is
  /// delivered exactly once.
  pub fn poll(&mut self) -> Option<ApiResult<T>> {
    let rx = self.rx.as_mut()?;
    match rx.try_recv() {
      Ok(result) => {
        self.rx = None;
        Some(result)
      }
      Err(tokio::sync::mpsc::error::TryRecvError::Empty) => None,
      Err(tokio::sync::mpsc::error::TryRecvError::Disconnected) => {
        self.rx = None;
        Some(Err(ApiError::Network("mutation was cancelled".to_string())))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  #[tokio::test]
  async fn test_query_success() {
    let cache = ResourceCache::new();
    let mut query: Query<Vec<u32>> = Query::new(
      &cache,
      QueryKey::bare("objectives"),
      &[Tag::Objective],
      || async { Ok(vec![1u32, 2, 3]) },
    );

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    settle().await;
    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let cache = ResourceCache::new();
    let mut query: Query<Vec<u32>> =
      Query::new(&cache, QueryKey::bare("users"), &[Tag::User], || async {
        Err::<Vec<u32>, _>(ApiError::Server {
          status: 500,
          message: "something went wrong".into(),
        })
      });

    query.fetch();
    settle().await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(
      query.error(),
      Some("server error (500): something went wrong")
    );
  }

  #[tokio::test]
  async fn test_two_queries_same_key_share_one_call() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let make = |cache: &ResourceCache| {
      let calls = calls.clone();
      Query::<Vec<u32>>::new(
        cache,
        QueryKey::bare("objectives"),
        &[Tag::Objective],
        move || {
          let calls = calls.clone();
          async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![7u32])
          }
        },
      )
    };

    let mut a = make(&cache);
    let mut b = make(&cache);

    a.fetch();
    b.fetch();
    settle().await;
    a.poll();
    b.poll();

    assert_eq!(a.data(), Some(&vec![7]));
    assert_eq!(b.data(), Some(&vec![7]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_poll_picks_up_invalidation() {
    let cache = ResourceCache::new();
    let value = Arc::new(AtomicUsize::new(1));

    let source = value.clone();
    let mut query: Query<usize> = Query::new(
      &cache,
      QueryKey::bare("notifications/unread-count"),
      &[Tag::Notification],
      move || {
        let source = source.clone();
        async move { Ok(source.load(Ordering::SeqCst)) }
      },
    );

    query.fetch();
    settle().await;
    query.poll();
    assert_eq!(query.data(), Some(&1));

    // A mutation elsewhere in the app invalidates the tag; the subscribed
    // query refetches and poll() sees the new value.
    value.store(0, Ordering::SeqCst);
    let result: ApiResult<()> = cache.mutate(&[Tag::Notification], async { Ok(()) }).await;
    result.unwrap();
    settle().await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&0));
  }

  #[tokio::test]
  async fn test_mutation_delivers_result_once() {
    let cache = ResourceCache::new();
    let mut mutation: Mutation<u32> = Mutation::idle();

    mutation.run(&cache, &[Tag::Objective], async { Ok(5u32) });
    assert!(mutation.in_flight());

    settle().await;
    assert_eq!(mutation.poll(), Some(Ok(5)));
    assert!(!mutation.in_flight());
    assert_eq!(mutation.poll(), None);
  }

  #[tokio::test]
  async fn test_failed_mutation_reports_error_without_invalidating() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = calls.clone();
    let mut query: Query<u32> = Query::new(
      &cache,
      QueryKey::bare("objectives"),
      &[Tag::Objective],
      move || {
        let counter = counter.clone();
        async move {
          counter.fetch_add(1, Ordering::SeqCst);
          Ok(1u32)
        }
      },
    );
    query.fetch();
    settle().await;
    query.poll();

    let mut mutation: Mutation<()> = Mutation::idle();
    mutation.run(&cache, &[Tag::Objective], async {
      Err(ApiError::Server {
        status: 403,
        message: "forbidden".into(),
      })
    });
    settle().await;

    let result = mutation.poll().expect("result delivered");
    assert!(result.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no refetch on failure");
  }
}
