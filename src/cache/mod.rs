//! Client-side resource cache with tag-based invalidation.
//!
//! Query results are keyed by (endpoint, serialized argument), tagged with
//! the entity types they contain, and shared across every view that asks for
//! the same key. Mutations declare which tags they invalidate; the store
//! refetches subscribed entries and lazily refreshes the rest.

mod key;
mod store;
mod tags;

pub use key::QueryKey;
pub use store::{EntrySnapshot, EntryStatus, ResourceCache, SharedValue, Subscription};
pub use tags::Tag;
