use tracing::{info, warn};

use crate::cache_key::{Hash32, KeyDeriver};
use crate::error::{HighlightError, HighlightResult};
use crate::models::{CacheEntry, DatedItem, Identity};
use crate::storage::KeyValueStore;
use crate::timestamp::{format_local, parse_unix};
use crate::visit_cache::VisitCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initialized,
    Reconciled,
}

/// Outcome of one reconciliation. `decisions[i]` belongs to the i-th item
/// passed in; items have no identity beyond their position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub highlight_date: i64,
    pub highlighted_count: usize,
    pub decisions: Vec<bool>,
}

impl Reconciliation {
    pub fn is_new(&self, index: usize) -> bool {
        self.decisions.get(index).copied().unwrap_or(false)
    }
}

/// Per-page-view highlight state: the stored last visit and the optional
/// manual override.
#[derive(Debug, Clone)]
pub struct HighlightSession {
    last_visit_unix: Option<i64>,
    custom_date_unix: Option<i64>,
    phase: Phase,
}

impl HighlightSession {
    /// First visit policy: with no stored entry the last visit is "now", so
    /// nothing on a brand-new thread is highlighted.
    pub fn initialize(stored: Option<&CacheEntry>, now_unix: i64) -> Self {
        Self {
            last_visit_unix: Some(stored.map_or(now_unix, |entry| entry.last_visit_unix)),
            custom_date_unix: None,
            phase: Phase::Initialized,
        }
    }

    pub fn last_visit_unix(&self) -> Option<i64> {
        self.last_visit_unix
    }

    pub fn custom_date_unix(&self) -> Option<i64> {
        self.custom_date_unix
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Override, then stored last visit, then `now_unix`. Computed per call.
    pub fn highlight_date(&self, now_unix: i64) -> i64 {
        self.custom_date_unix.or(self.last_visit_unix).unwrap_or(now_unix)
    }

    /// Parses `input` and, if valid, makes it the threshold. Rejected input
    /// leaves the session untouched.
    pub fn set_manual_override<T: DatedItem>(
        &mut self,
        input: &str,
        items: &[T],
        now_unix: i64,
    ) -> HighlightResult<Reconciliation> {
        let unix = parse_unix(input).ok_or_else(|| HighlightError::UnparseableOverride(input.to_string()))?;
        if unix > now_unix {
            return Err(HighlightError::OverrideInFuture(unix));
        }
        info!(custom_date_unix = unix, "Custom date selected");
        self.custom_date_unix = Some(unix);
        Ok(self.reconcile(items, now_unix))
    }

    /// Sets the override to "now" rather than dropping it, so nothing that
    /// is already on the page stays highlighted.
    pub fn clear_manual_override<T: DatedItem>(&mut self, items: &[T], now_unix: i64) -> Reconciliation {
        self.custom_date_unix = Some(now_unix);
        self.reconcile(items, now_unix)
    }

    /// Marks every item strictly newer than the threshold. Items whose
    /// timestamp doesn't parse are never new.
    pub fn reconcile<T: DatedItem>(&mut self, items: &[T], now_unix: i64) -> Reconciliation {
        let highlight_date = self.highlight_date(now_unix);
        info!("Highlighting comments since {}", format_local(highlight_date));

        let decisions: Vec<bool> = items
            .iter()
            .map(|item| parse_unix(item.timestamp()).is_some_and(|date| date > highlight_date))
            .collect();
        let highlighted_count = decisions.iter().filter(|is_new| **is_new).count();

        self.phase = Phase::Reconciled;
        Reconciliation {
            highlight_date,
            highlighted_count,
            decisions,
        }
    }
}

/// Runs the activation sequence for one page view: sweep expired entries,
/// read this thread's entry, record "now" for next time, and start a
/// session from what was read.
pub fn activate<S: KeyValueStore, H: Hash32>(
    identity: &Identity,
    deriver: &KeyDeriver<H>,
    cache: &VisitCache<S>,
    expiration_window_ms: i64,
    now_unix: i64,
) -> HighlightResult<HighlightSession> {
    if !identity.is_active() {
        warn!("Comment thread id could not be found, aborting");
        return Err(HighlightError::MissingIdentity);
    }

    let key = deriver.derive_key(identity);

    // Sweep first so an expired entry for this thread reads as a first visit
    cache.purge_expired(now_unix.saturating_sub(expiration_window_ms))?;

    let stored = cache.get(&key)?;
    info!(
        user = %identity.viewer_name,
        subreddit = identity.subreddit.as_deref().unwrap_or(""),
        thread = identity.thread_id.as_deref().unwrap_or(""),
        last_visit = ?stored.as_ref().map(|e| e.last_visit_unix),
        "Looked in cache"
    );

    let session = HighlightSession::initialize(stored.as_ref(), now_unix);
    cache.record_visit(&key, now_unix)?;
    Ok(session)
}
