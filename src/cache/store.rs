//! The resource cache: keyed query results, shared in-flight requests, and
//! tag-based invalidation.
//!
//! Every view reads server data through this store. Reads of the same
//! [`QueryKey`] share one cached value and at most one network call at a
//! time; mutations declare which [`Tag`]s they invalidate and the store
//! propagates that to every intersecting entry without the caller knowing
//! which keys are stale.
//!
//! All bookkeeping happens inside one mutex so a mutation's cache writes and
//! invalidations land in a single atomic turn. Responses are applied in
//! completion order; there is no sequence-number guard, so a slow early
//! response can overwrite a later one until the next refetch converges.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::api::{ApiError, ApiResult};

use super::key::QueryKey;
use super::tags::Tag;

/// Cached response values are shared, not copied, between subscribers.
pub type SharedValue = Arc<Value>;

type FetchFn = Arc<dyn Fn() -> BoxFuture<'static, ApiResult<SharedValue>> + Send + Sync>;
type InFlight = Shared<BoxFuture<'static, ApiResult<SharedValue>>>;

/// Lifecycle of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
  /// Registered but never fetched.
  Uninitialized,
  /// A request is in flight.
  Pending,
  /// Last fetch succeeded; `value` holds the response.
  Fulfilled,
  /// Last fetch failed; `error` holds the failure.
  Rejected,
}

struct CacheEntry {
  status: EntryStatus,
  value: Option<SharedValue>,
  error: Option<ApiError>,
  tags: Vec<Tag>,
  /// Set by invalidation and optimistic writes; a stale entry is served only
  /// until the next read triggers a refetch.
  stale: bool,
  /// Bumped per invalidation or optimistic write. A fetch that started before
  /// the bump carries pre-invalidation data and must not mark the entry fresh.
  stale_epoch: u64,
  subscribers: usize,
  /// When the last subscriber left; drives retention-based eviction.
  released_at: Option<Instant>,
  inflight: Option<InFlight>,
  /// Bumped per fetch start, so a superseded fetch does not clear the
  /// in-flight slot of its replacement.
  generation: u64,
  /// Bumped per applied result or optimistic write; views poll this.
  version: u64,
  fetcher: FetchFn,
}

/// Read-only view of an entry, handed to the typed query layer.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
  pub status: EntryStatus,
  pub value: Option<SharedValue>,
  pub error: Option<ApiError>,
  pub stale: bool,
  pub version: u64,
}

/// Process-wide cache. Cheap to clone; all clones share the same entries.
#[derive(Clone)]
pub struct ResourceCache {
  inner: Arc<Mutex<HashMap<QueryKey, CacheEntry>>>,
  retention: Duration,
}

impl Default for ResourceCache {
  fn default() -> Self {
    Self::new()
  }
}

impl ResourceCache {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(Mutex::new(HashMap::new())),
      retention: Duration::from_secs(60),
    }
  }

  /// How long zero-subscriber entries are kept for quick back-navigation.
  pub fn with_retention(mut self, retention: Duration) -> Self {
    self.retention = retention;
    self
  }

  /// Register a query and subscribe to it.
  ///
  /// The first registration of a key installs its fetcher and tags; later
  /// registrations of the same key just add a subscriber. The returned
  /// [`Subscription`] unsubscribes on drop.
  pub fn register<F, Fut>(&self, key: QueryKey, tags: &[Tag], fetcher: F) -> Subscription
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<Value>> + Send + 'static,
  {
    debug_assert!(!tags.is_empty(), "every query must declare at least one tag");

    let mut map = self.lock();
    let entry = map.entry(key.clone()).or_insert_with(|| CacheEntry {
      status: EntryStatus::Uninitialized,
      value: None,
      error: None,
      tags: tags.to_vec(),
      stale: false,
      stale_epoch: 0,
      subscribers: 0,
      released_at: None,
      inflight: None,
      generation: 0,
      version: 0,
      fetcher: Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(Arc::new) }.boxed()
      }),
    });
    entry.subscribers += 1;
    entry.released_at = None;

    Subscription {
      cache: self.clone(),
      key,
    }
  }

  /// Read a key's value, fetching if needed.
  ///
  /// Fulfilled and fresh: the cached value, no network call. Pending: joins
  /// the in-flight request instead of issuing a duplicate. Otherwise the
  /// registered fetcher runs.
  pub async fn read(&self, key: &QueryKey) -> ApiResult<SharedValue> {
    let fut = {
      let mut map = self.lock();
      let Some(entry) = map.get_mut(key) else {
        return Err(ApiError::Network(format!("no query registered for {}", key)));
      };

      if entry.status == EntryStatus::Fulfilled && !entry.stale {
        if let Some(value) = &entry.value {
          return Ok(value.clone());
        }
      }

      if let Some(inflight) = entry.inflight.clone() {
        inflight
      } else {
        match self.spawn_fetch(&mut map, key) {
          Some(fut) => fut,
          None => {
            return Err(ApiError::Network(format!("no query registered for {}", key)));
          }
        }
      }
    };

    fut.await
  }

  /// Start a fetch for a key unless it is fresh or already in flight.
  /// Fire-and-forget; the result lands in the cache.
  pub fn ensure_fetched(&self, key: &QueryKey) {
    let mut map = self.lock();
    {
      let Some(entry) = map.get_mut(key) else { return };
      if entry.status == EntryStatus::Fulfilled && !entry.stale {
        return;
      }
      if entry.inflight.is_some() {
        return;
      }
    }
    self.spawn_fetch(&mut map, key);
  }

  /// Force a refetch regardless of freshness (a view's explicit reload).
  pub fn refetch(&self, key: &QueryKey) {
    let mut map = self.lock();
    {
      let Some(entry) = map.get_mut(key) else { return };
      entry.stale = true;
    }
    self.spawn_fetch(&mut map, key);
  }

  /// Optimistic update: install a locally synthesized value.
  ///
  /// The entry is left stale so the next authoritative read reconciles it.
  pub fn write(&self, key: &QueryKey, value: Value) {
    let mut map = self.lock();
    if let Some(entry) = map.get_mut(key) {
      entry.value = Some(Arc::new(value));
      entry.status = EntryStatus::Fulfilled;
      entry.error = None;
      entry.stale = true;
      entry.stale_epoch += 1;
      entry.version += 1;
    }
  }

  /// Mark every entry whose tag set intersects `tags` stale. Subscribed
  /// entries refetch immediately; unsubscribed ones refetch lazily on the
  /// next read. Runs in one lock scope.
  pub fn invalidate(&self, tags: &[Tag]) {
    if tags.is_empty() {
      return;
    }

    let mut map = self.lock();
    let affected: Vec<QueryKey> = map
      .iter()
      .filter(|(_, entry)| entry.tags.iter().any(|t| tags.contains(t)))
      .map(|(key, _)| key.clone())
      .collect();

    for key in affected {
      let subscribed = {
        let Some(entry) = map.get_mut(&key) else { continue };
        entry.stale = true;
        entry.stale_epoch += 1;
        entry.subscribers > 0
      };
      debug!("invalidated {} (refetch: {})", key, subscribed);
      if subscribed {
        self.spawn_fetch(&mut map, &key);
      }
    }
  }

  /// Run a mutation and invalidate its declared tags on success. A failed
  /// mutation invalidates nothing.
  pub async fn mutate<T, Fut>(&self, invalidates: &[Tag], fut: Fut) -> ApiResult<T>
  where
    Fut: Future<Output = ApiResult<T>>,
  {
    let result = fut.await;
    if result.is_ok() {
      self.invalidate(invalidates);
    }
    result
  }

  /// Current state of a key, if the entry exists.
  pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
    let map = self.lock();
    map.get(key).map(|entry| EntrySnapshot {
      status: entry.status,
      value: entry.value.clone(),
      error: entry.error.clone(),
      stale: entry.stale,
      version: entry.version,
    })
  }

  /// Drop zero-subscriber entries whose retention window has elapsed.
  /// Called from the app tick.
  pub fn sweep(&self) {
    let retention = self.retention;
    let mut map = self.lock();
    map.retain(|_, entry| {
      entry.subscribers > 0
        || entry
          .released_at
          .map(|released| released.elapsed() < retention)
          .unwrap_or(true)
    });
  }

  fn spawn_fetch(
    &self,
    map: &mut HashMap<QueryKey, CacheEntry>,
    key: &QueryKey,
  ) -> Option<InFlight> {
    let entry = map.get_mut(key)?;
    entry.generation += 1;
    entry.status = EntryStatus::Pending;
    let generation = entry.generation;
    let stale_epoch = entry.stale_epoch;

    let fetcher = entry.fetcher.clone();
    let cache = self.clone();
    let key_owned = key.clone();
    let fut: InFlight = async move {
      let result = fetcher().await;
      cache.apply(&key_owned, generation, stale_epoch, result.clone());
      result
    }
    .boxed()
    .shared();

    entry.inflight = Some(fut.clone());

    // Driver task: the response is applied even if every subscriber has
    // navigated away by the time it arrives.
    tokio::spawn(fut.clone().map(|_| ()));

    Some(fut)
  }

  /// Apply a completed fetch. Values land unconditionally, in completion
  /// order; freshness is granted only if no invalidation happened after the
  /// fetch started.
  fn apply(&self, key: &QueryKey, generation: u64, stale_epoch: u64, result: ApiResult<SharedValue>) {
    let mut map = self.lock();
    let Some(entry) = map.get_mut(key) else { return };

    entry.version += 1;
    match result {
      Ok(value) => {
        entry.status = EntryStatus::Fulfilled;
        entry.value = Some(value);
        entry.error = None;
        if entry.stale_epoch == stale_epoch {
          entry.stale = false;
        }
      }
      Err(error) => {
        entry.status = EntryStatus::Rejected;
        entry.error = Some(error);
      }
    }

    // Only the newest fetch owns the in-flight slot.
    if entry.generation == generation {
      entry.inflight = None;
    }
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
    self.inner.lock().unwrap_or_else(|e| e.into_inner())
  }
}

/// RAII subscription handle. Dropping it decrements the entry's subscriber
/// count; the entry itself survives for the retention window.
pub struct Subscription {
  cache: ResourceCache,
  key: QueryKey,
}

impl Subscription {
  pub fn key(&self) -> &QueryKey {
    &self.key
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let mut map = self.cache.lock();
    if let Some(entry) = map.get_mut(&self.key) {
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        entry.released_at = Some(Instant::now());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn counting_fetcher(
    calls: Arc<AtomicUsize>,
    value: Value,
  ) -> impl Fn() -> BoxFuture<'static, ApiResult<Value>> + Send + Sync + 'static {
    move || {
      let calls = calls.clone();
      let value = value.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        Ok(value)
      }
      .boxed()
    }
  }

  async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
  }

  #[tokio::test]
  async fn test_concurrent_reads_share_one_call() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("objectives");

    let _sub_a = cache.register(
      key.clone(),
      &[Tag::Objective],
      counting_fetcher(calls.clone(), serde_json::json!([1, 2, 3])),
    );
    let _sub_b = cache.register(
      key.clone(),
      &[Tag::Objective],
      counting_fetcher(calls.clone(), serde_json::json!([1, 2, 3])),
    );

    let (a, b) = tokio::join!(cache.read(&key), cache.read(&key));
    assert_eq!(*a.unwrap(), serde_json::json!([1, 2, 3]));
    assert_eq!(*b.unwrap(), serde_json::json!([1, 2, 3]));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_fresh_reread_hits_cache() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("departments");

    let _sub = cache.register(
      key.clone(),
      &[Tag::Department],
      counting_fetcher(calls.clone(), serde_json::json!(["eng"])),
    );

    cache.read(&key).await.unwrap();
    cache.read(&key).await.unwrap();
    cache.read(&key).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let snap = cache.snapshot(&key).unwrap();
    assert_eq!(snap.status, EntryStatus::Fulfilled);
    assert!(!snap.stale);
  }

  #[tokio::test]
  async fn test_invalidation_refetches_subscribed_matching_entries_only() {
    let cache = ResourceCache::new();
    let obj_calls = Arc::new(AtomicUsize::new(0));
    let user_calls = Arc::new(AtomicUsize::new(0));
    let obj_key = QueryKey::bare("objectives");
    let user_key = QueryKey::bare("users");

    let _obj_sub = cache.register(
      obj_key.clone(),
      &[Tag::Objective],
      counting_fetcher(obj_calls.clone(), serde_json::json!([])),
    );
    let _user_sub = cache.register(
      user_key.clone(),
      &[Tag::User],
      counting_fetcher(user_calls.clone(), serde_json::json!([])),
    );

    cache.read(&obj_key).await.unwrap();
    cache.read(&user_key).await.unwrap();

    let result: ApiResult<()> = cache.mutate(&[Tag::Objective], async { Ok(()) }).await;
    result.unwrap();
    settle().await;

    assert_eq!(obj_calls.load(Ordering::SeqCst), 2);
    // Users are not tagged Objective and stay untouched.
    assert_eq!(user_calls.load(Ordering::SeqCst), 1);
    assert!(!cache.snapshot(&user_key).unwrap().stale);
  }

  #[tokio::test]
  async fn test_failed_mutation_invalidates_nothing() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("objectives");

    let _sub = cache.register(
      key.clone(),
      &[Tag::Objective],
      counting_fetcher(calls.clone(), serde_json::json!([])),
    );
    cache.read(&key).await.unwrap();

    let result: ApiResult<()> = cache
      .mutate(&[Tag::Objective], async {
        Err(ApiError::Server {
          status: 500,
          message: "boom".into(),
        })
      })
      .await;
    assert!(result.is_err());
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.snapshot(&key).unwrap().stale);
  }

  #[tokio::test]
  async fn test_unsubscribed_entry_goes_stale_and_refetches_lazily() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("notifications");

    let sub = cache.register(
      key.clone(),
      &[Tag::Notification],
      counting_fetcher(calls.clone(), serde_json::json!([])),
    );
    cache.read(&key).await.unwrap();
    drop(sub);

    cache.invalidate(&[Tag::Notification]);
    settle().await;

    // No subscriber, so no eager refetch; just marked stale.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.snapshot(&key).unwrap().stale);

    // Next read within the retention window refetches.
    cache.read(&key).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.snapshot(&key).unwrap().stale);
  }

  #[tokio::test]
  async fn test_invalidation_during_inflight_fetch_keeps_entry_stale() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("objectives");

    let sub = cache.register(
      key.clone(),
      &[Tag::Objective],
      counting_fetcher(calls.clone(), serde_json::json!([1])),
    );
    cache.ensure_fetched(&key);
    drop(sub);

    // Invalidated while the fetch is in flight and nobody subscribes: no
    // eager refetch, and the in-flight response predates the invalidation.
    cache.invalidate(&[Tag::Objective]);
    settle().await;

    let snap = cache.snapshot(&key).unwrap();
    assert_eq!(snap.status, EntryStatus::Fulfilled);
    assert!(snap.stale, "pre-invalidation response must not look fresh");

    // The next read still refetches lazily.
    cache.read(&key).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!cache.snapshot(&key).unwrap().stale);
  }

  #[tokio::test]
  async fn test_retention_sweep_evicts_released_entries() {
    let cache = ResourceCache::new().with_retention(Duration::ZERO);
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("ratings");

    let sub = cache.register(
      key.clone(),
      &[Tag::Rating],
      counting_fetcher(calls.clone(), serde_json::json!({"average": 4.0})),
    );
    cache.read(&key).await.unwrap();

    cache.sweep();
    assert!(cache.snapshot(&key).is_some(), "subscribed entries survive");

    drop(sub);
    cache.sweep();
    assert!(cache.snapshot(&key).is_none());
  }

  #[tokio::test]
  async fn test_optimistic_write_is_reconciled_by_next_read() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("objectives");

    let _sub = cache.register(
      key.clone(),
      &[Tag::Objective],
      counting_fetcher(calls.clone(), serde_json::json!(["server truth"])),
    );
    cache.read(&key).await.unwrap();

    cache.write(&key, serde_json::json!(["local guess"]));
    let snap = cache.snapshot(&key).unwrap();
    assert_eq!(*snap.value.unwrap(), serde_json::json!(["local guess"]));
    assert!(snap.stale);

    // The next read goes back to the network and overwrites the guess.
    let value = cache.read(&key).await.unwrap();
    assert_eq!(*value, serde_json::json!(["server truth"]));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_delete_objective_scenario() {
    // Two views subscribe to the objectives list; a third deletes id 42.
    let cache = ResourceCache::new();
    let objectives = Arc::new(Mutex::new(vec![41u64, 42, 43]));
    let key = QueryKey::bare("objectives");

    let source = objectives.clone();
    let fetcher = move || {
      let source = source.clone();
      async move {
        let ids = source.lock().unwrap().clone();
        Ok(serde_json::json!(ids))
      }
      .boxed()
    };

    let _view_a = cache.register(key.clone(), &[Tag::Objective], fetcher.clone());
    let _view_b = cache.register(key.clone(), &[Tag::Objective], fetcher);

    let before = cache.read(&key).await.unwrap();
    assert_eq!(*before, serde_json::json!([41, 42, 43]));

    let store = objectives.clone();
    let result: ApiResult<()> = cache
      .mutate(&[Tag::Objective], async move {
        store.lock().unwrap().retain(|id| *id != 42);
        Ok(())
      })
      .await;
    result.unwrap();
    settle().await;

    let after = cache.read(&key).await.unwrap();
    assert_eq!(*after, serde_json::json!([41, 43]));
  }

  #[tokio::test]
  async fn test_mark_all_read_refetches_both_notification_entries() {
    let cache = ResourceCache::new();
    let unread = Arc::new(AtomicUsize::new(3));
    let list_key = QueryKey::bare("notifications");
    let count_key = QueryKey::bare("notifications/unread-count");

    let source = unread.clone();
    let _list_sub = cache.register(list_key.clone(), &[Tag::Notification], move || {
      let source = source.clone();
      async move { Ok(serde_json::json!({ "unread": source.load(Ordering::SeqCst) })) }.boxed()
    });
    let source = unread.clone();
    let _count_sub = cache.register(count_key.clone(), &[Tag::Notification], move || {
      let source = source.clone();
      async move { Ok(serde_json::json!({ "count": source.load(Ordering::SeqCst) })) }.boxed()
    });

    cache.read(&list_key).await.unwrap();
    let count = cache.read(&count_key).await.unwrap();
    assert_eq!(count["count"], 3);

    let store = unread.clone();
    let result: ApiResult<()> = cache
      .mutate(&[Tag::Notification], async move {
        store.store(0, Ordering::SeqCst);
        Ok(())
      })
      .await;
    result.unwrap();
    settle().await;

    let count = cache.read(&count_key).await.unwrap();
    assert_eq!(count["count"], 0);
    let list = cache.read(&list_key).await.unwrap();
    assert_eq!(list["unread"], 0);
  }

  #[tokio::test]
  async fn test_rejected_fetch_surfaces_error_and_retries_on_next_read() {
    let cache = ResourceCache::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let key = QueryKey::bare("users");

    let counter = calls.clone();
    let _sub = cache.register(key.clone(), &[Tag::User], move || {
      let n = counter.fetch_add(1, Ordering::SeqCst);
      async move {
        if n == 0 {
          Err(ApiError::Network("connection refused".into()))
        } else {
          Ok(serde_json::json!([]))
        }
      }
      .boxed()
    });

    let err = cache.read(&key).await.unwrap_err();
    assert_eq!(err, ApiError::Network("connection refused".into()));
    assert_eq!(cache.snapshot(&key).unwrap().status, EntryStatus::Rejected);

    // A rejected entry is not cached as a value; the next read retries.
    cache.read(&key).await.unwrap();
    assert_eq!(cache.snapshot(&key).unwrap().status, EntryStatus::Fulfilled);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
