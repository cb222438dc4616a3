use tracing::{debug, info, warn};

use crate::error::{HighlightError, HighlightResult};
use crate::models::CacheEntry;
use crate::storage::KeyValueStore;

/// Last-visit timestamps per (viewer, thread), keyed by derived cache key.
///
/// Owns every write to the namespace; other keys in the same store are
/// never read or touched.
pub struct VisitCache<S> {
    store: S,
    prefix: String,
}

impl<S: KeyValueStore> VisitCache<S> {
    pub fn new(store: S, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The entry for `key`, or `None` when it is absent or not a number.
    /// Malformed values are left in place.
    pub fn get(&self, key: &str) -> HighlightResult<Option<CacheEntry>> {
        let Some(value) = self.store.get(key)? else {
            return Ok(None);
        };
        match parse_entry(key, &value) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("{e}, treating as not found");
                Ok(None)
            }
        }
    }

    /// Every parseable entry under this cache's prefix, in no particular order.
    pub fn list_all(&self) -> HighlightResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        for key in self.store.keys()? {
            if !key.starts_with(&self.prefix) {
                continue;
            }
            let Some(value) = self.store.get(&key)? else {
                continue;
            };
            match parse_entry(&key, &value) {
                Ok(entry) => entries.push(entry),
                Err(e) => debug!("Skipping {e}"),
            }
        }
        Ok(entries)
    }

    /// Deletes entries strictly older than `threshold_unix`. An entry exactly
    /// at the threshold is kept. Returns the number removed.
    pub fn purge_expired(&self, threshold_unix: i64) -> HighlightResult<usize> {
        let mut purged = 0;
        for entry in self.list_all()? {
            if entry.last_visit_unix < threshold_unix {
                self.store.remove(&entry.key)?;
                purged += 1;
            }
        }
        if purged > 0 {
            info!(purged, threshold_unix, "Removed expired last-visit entries");
        }
        Ok(purged)
    }

    /// Overwrites the entry for `key`. Last write wins, no max-of merge.
    pub fn record_visit(&self, key: &str, now_unix: i64) -> HighlightResult<()> {
        info!(now_unix, "Recording last visit for the current thread");
        self.store.set(key, &now_unix.to_string())
    }
}

fn parse_entry(key: &str, value: &str) -> HighlightResult<CacheEntry> {
    value
        .trim()
        .parse::<i64>()
        .map(|last_visit_unix| CacheEntry {
            key: key.to_string(),
            last_visit_unix,
        })
        .map_err(|_| HighlightError::MalformedCacheValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn cache() -> VisitCache<MemoryStore> {
        VisitCache::new(MemoryStore::new(), "µRCH")
    }

    #[test]
    fn record_then_get_round_trips() {
        let cache = cache();
        cache.record_visit("µRCH.aa", 1_700_000_000_000).unwrap();
        let entry = cache.get("µRCH.aa").unwrap().unwrap();
        assert_eq!(entry.last_visit_unix, 1_700_000_000_000);
    }

    #[test]
    fn record_overwrites_even_with_older_time() {
        let cache = cache();
        cache.record_visit("µRCH.aa", 2000).unwrap();
        cache.record_visit("µRCH.aa", 1000).unwrap();
        assert_eq!(cache.get("µRCH.aa").unwrap().unwrap().last_visit_unix, 1000);
    }

    #[test]
    fn malformed_value_is_a_miss_and_is_kept() {
        let cache = cache();
        cache.store().set("µRCH.bad", "not-a-number").unwrap();
        assert_eq!(cache.get("µRCH.bad").unwrap(), None);
        assert_eq!(cache.store().get("µRCH.bad").unwrap().as_deref(), Some("not-a-number"));
        assert!(cache.list_all().unwrap().is_empty());
    }

    #[test]
    fn list_all_ignores_foreign_keys() {
        let cache = cache();
        cache.record_visit("µRCH.one", 10).unwrap();
        cache.record_visit("µRCH.two", 20).unwrap();
        cache.store().set("someone-else", "30").unwrap();

        let mut found: Vec<i64> = cache.list_all().unwrap().iter().map(|e| e.last_visit_unix).collect();
        found.sort();
        assert_eq!(found, vec![10, 20]);
    }

    #[test]
    fn purge_is_strictly_older_than_threshold() {
        let cache = cache();
        cache.record_visit("µRCH.old", 999).unwrap();
        cache.record_visit("µRCH.edge", 1000).unwrap();
        cache.record_visit("µRCH.new", 1001).unwrap();
        cache.store().set("unrelated", "1").unwrap();

        assert_eq!(cache.purge_expired(1000).unwrap(), 1);
        assert_eq!(cache.get("µRCH.old").unwrap(), None);
        assert!(cache.get("µRCH.edge").unwrap().is_some());
        assert!(cache.get("µRCH.new").unwrap().is_some());
        assert_eq!(cache.store().get("unrelated").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn purge_with_nothing_expired_removes_nothing() {
        let cache = cache();
        cache.record_visit("µRCH.a", 5000).unwrap();
        assert_eq!(cache.purge_expired(100).unwrap(), 0);
        assert_eq!(cache.list_all().unwrap().len(), 1);
    }

    #[test]
    fn works_over_sqlite() {
        let dir = tempfile::tempdir().unwrap();
        let cache = VisitCache::new(SqliteStore::open(dir.path().join("v.db")).unwrap(), "µRCH");
        cache.record_visit("µRCH.k", 42).unwrap();
        cache.record_visit("µRCH.old", 1).unwrap();
        cache.purge_expired(10).unwrap();
        assert_eq!(cache.get("µRCH.k").unwrap().unwrap().last_visit_unix, 42);
        assert_eq!(cache.get("µRCH.old").unwrap(), None);
    }
}
