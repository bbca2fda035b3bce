//! The upload listing cache: a single-flight, per-`(endpoint, path)`
//! cache of remote directory listings, per spec.md §4.7 step 1 and §5's
//! "shared-resource policy" ("at most one worker owns the fetch role;
//! others subscribe as waiters").

use std::sync::{Condvar, Mutex};

use dashmap::DashMap;
use diskpool::EntryKind;

/// The kind of remote entry a cached listing records, mirroring
/// [`diskpool::EntryKind`] so collision resolution (spec.md §4.7 step 2)
/// does not need to distinguish local from remote entry kinds.
pub type CachedEntryKind = EntryKind;

/// One entry in a cached remote directory listing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CachedEntry {
    /// The entry's name, relative to the listed directory.
    pub name: String,
    /// Whether the entry is a file, directory, or link.
    pub kind: CachedEntryKind,
}

/// The key a listing is cached under: the control connection's endpoint
/// address plus the normalized target path. Two workers against the same
/// server and path share one cache entry even if their `Endpoint` values
/// differ in user/password (the directory structure does not).
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct CacheKey {
    /// The server address, as a string (so the key stays `Hash`/`Eq`
    /// without pulling in `SocketAddr` formatting concerns here).
    pub endpoint: String,
    /// The normalized remote path being listed.
    pub path: String,
}

impl CacheKey {
    /// Builds a cache key from a server address and a remote path.
    #[must_use]
    pub fn new(endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), path: path.into() }
    }
}

/// A cache entry's state, per spec.md §4.7 step 1's `TgtDirState` lookup:
/// `Unknown` (not in `queue::TgtDirState` terms — this is the cache's own
/// state, consulted when an item's `TgtDirState` is `Unknown`).
#[derive(Clone, Debug)]
enum Slot {
    /// A worker has claimed the fetch role; listing is in flight.
    Listing,
    /// The listing completed and is available to readers.
    Ready(Vec<CachedEntry>),
    /// The listing failed (e.g. `LIST` returned a permanent error); the
    /// path could not be listed.
    Inaccessible,
}

/// Single-flight cache of remote directory listings, keyed by
/// `(endpoint, path)`. At most one worker "owns" a key's fetch at a time
/// (spec.md §8's "for every key `k`, at most one worker has
/// `k.owner = self`"); others block in [`UploadListingCache::wait_for`]
/// until the owner calls [`UploadListingCache::publish`] or
/// [`UploadListingCache::mark_inaccessible`].
#[derive(Default)]
pub struct UploadListingCache {
    slots: DashMap<CacheKey, Slot>,
    /// Guards nothing but the condvar's wait/notify protocol; `DashMap`
    /// itself has no blocking-wait primitive, so waiters park here and
    /// are woken whenever any key's slot changes, re-checking their own
    /// key after waking.
    notify: Mutex<()>,
    condvar: Condvar,
}

/// What a worker should do next after consulting the cache for a key,
/// per spec.md §4.7 step 1.
#[derive(Clone, Debug)]
pub enum LookupOutcome {
    /// No entry exists yet; the caller now owns the fetch role and must
    /// eventually call [`UploadListingCache::publish`] or
    /// [`UploadListingCache::mark_inaccessible`].
    ClaimedByCaller,
    /// Another worker owns the fetch role; the caller should park until
    /// woken, then look up the key again.
    OwnedByOther,
    /// The listing is ready; collision resolution can proceed.
    Ready(Vec<CachedEntry>),
    /// The path could not be listed; the item fails with
    /// `UploadCannotListTgtPath`.
    Inaccessible,
}

impl UploadListingCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up `key`. If no entry exists, the caller claims ownership of
    /// the fetch role and must follow up with [`Self::publish`] or
    /// [`Self::mark_inaccessible`].
    pub fn lookup_or_claim(&self, key: &CacheKey) -> LookupOutcome {
        match self.slots.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                vacant.insert(Slot::Listing);
                LookupOutcome::ClaimedByCaller
            }
            dashmap::mapref::entry::Entry::Occupied(occupied) => match occupied.get() {
                Slot::Listing => LookupOutcome::OwnedByOther,
                Slot::Ready(entries) => LookupOutcome::Ready(entries.clone()),
                Slot::Inaccessible => LookupOutcome::Inaccessible,
            },
        }
    }

    /// Parks the calling thread until `key`'s slot changes, bounded by
    /// `timeout`. Returns promptly (without actually sleeping the full
    /// timeout) as soon as any key is published, so the caller should
    /// re-run [`Self::lookup_or_claim`] and loop if its own key is still
    /// `Listing`.
    pub fn wait_for(&self, timeout: std::time::Duration) {
        let guard = self.notify.lock().expect("listing cache notify mutex poisoned");
        let _ = self.condvar.wait_timeout(guard, timeout).expect("listing cache notify mutex poisoned");
    }

    /// Publishes a completed listing for `key`, waking every parked
    /// waiter (spec.md §4.7 step 1's `TgtPathListingFinished`).
    pub fn publish(&self, key: &CacheKey, entries: Vec<CachedEntry>) {
        self.slots.insert(key.clone(), Slot::Ready(entries));
        self.notify_all();
    }

    /// Marks `key` inaccessible (the `LIST` failed) and wakes waiters,
    /// who will each see [`LookupOutcome::Inaccessible`].
    pub fn mark_inaccessible(&self, key: &CacheKey) {
        self.slots.insert(key.clone(), Slot::Inaccessible);
        self.notify_all();
    }

    /// Adds a single freshly created directory entry to an already-`Ready`
    /// listing, without a full relist (spec.md §4.7 step 3: "the listing
    /// cache is updated to add the new directory (no full relisting)").
    /// A no-op if `key` is not currently `Ready`.
    pub fn add_entry(&self, key: &CacheKey, entry: CachedEntry) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            if let Slot::Ready(entries) = &mut *slot {
                entries.push(entry);
            }
        }
    }

    /// Invalidates `key`, forcing the next lookup to re-fetch. Used when
    /// an operation's cache should not outlive a single run (each
    /// `Operation` owns its own [`UploadListingCache`] instance, so this
    /// is mostly useful for tests).
    pub fn invalidate(&self, key: &CacheKey) {
        self.slots.remove(key);
        self.notify_all();
    }

    fn notify_all(&self) {
        let _guard = self.notify.lock().expect("listing cache notify mutex poisoned");
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lookup_claims_the_fetch_role() {
        let cache = UploadListingCache::new();
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        assert!(matches!(cache.lookup_or_claim(&key), LookupOutcome::ClaimedByCaller));
    }

    #[test]
    fn second_lookup_sees_owned_by_other_while_listing() {
        let cache = UploadListingCache::new();
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        let _ = cache.lookup_or_claim(&key);
        assert!(matches!(cache.lookup_or_claim(&key), LookupOutcome::OwnedByOther));
    }

    #[test]
    fn publish_makes_the_listing_ready_for_all_readers() {
        let cache = UploadListingCache::new();
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        let _ = cache.lookup_or_claim(&key);
        cache.publish(&key, vec![CachedEntry { name: "a".into(), kind: CachedEntryKind::File }]);

        match cache.lookup_or_claim(&key) {
            LookupOutcome::Ready(entries) => assert_eq!(entries.len(), 1),
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn mark_inaccessible_is_observed_by_waiters() {
        let cache = UploadListingCache::new();
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        let _ = cache.lookup_or_claim(&key);
        cache.mark_inaccessible(&key);
        assert!(matches!(cache.lookup_or_claim(&key), LookupOutcome::Inaccessible));
    }

    #[test]
    fn add_entry_appends_without_a_relist() {
        let cache = UploadListingCache::new();
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        cache.publish(&key, vec![]);
        cache.add_entry(&key, CachedEntry { name: "newdir".into(), kind: CachedEntryKind::Dir });

        match cache.lookup_or_claim(&key) {
            LookupOutcome::Ready(entries) => {
                assert_eq!(entries.len(), 1);
                assert_eq!(entries[0].name, "newdir");
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    #[test]
    fn wait_for_returns_once_the_key_is_published() {
        use std::sync::Arc;
        use std::time::Duration;

        let cache = Arc::new(UploadListingCache::new());
        let key = CacheKey::new("127.0.0.1:21", "/incoming");
        let _ = cache.lookup_or_claim(&key);

        let waiter_cache = Arc::clone(&cache);
        let handle = std::thread::spawn(move || {
            waiter_cache.wait_for(Duration::from_secs(2));
        });

        std::thread::sleep(Duration::from_millis(20));
        cache.publish(&key, vec![]);
        handle.join().expect("waiter thread");
    }
}
