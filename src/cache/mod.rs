//! Query cache shared by every machine on the page.
//!
//! Mutations never patch cached values in place. They either
//! [`invalidate`](QueryCache::invalidate) a key prefix, which marks entries
//! stale and refetches the ones somebody is watching, or
//! [`set`](QueryCache::set) a value the server just returned.
//!
//! Fetches are coalesced per key and only the most recently started fetch is
//! allowed to write its result.

mod key;
mod store;

pub use key::{keys, CacheKey, KeySegment, Resource};
pub use store::{CachedEntry, QueryCache, QueryError, QueryFn, QueryState, QuerySubscription};
