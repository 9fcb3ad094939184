//! Root quote log. Every mutation event in a pipeline starts here.

use tracing::{debug, error, warn};

use crate::cache::Cache;
use crate::error::HubError;
use crate::event::{MutationEvent, MutationKind};
use crate::{Series, Timestamp};

/// Consecutive identical resubmissions tolerated before the source faults.
pub const OVERFLOW_THRESHOLD: u32 = 100;

#[derive(Debug, Clone)]
pub struct SourceCache<T> {
    cache: Cache<T>,
    max_cache_size: Option<usize>,
    // Points kept ahead of the visible window once pruning starts, so
    // mutations at its front still see a full lookback.
    history: usize,
    pruned: usize,
    last_submitted: Option<T>,
    repeats: u32,
    faulted: bool,
}

impl<T> Default for SourceCache<T> {
    fn default() -> Self {
        Self {
            cache: Cache::default(),
            max_cache_size: None,
            history: 0,
            pruned: 0,
            last_submitted: None,
            repeats: 0,
            faulted: false,
        }
    }
}

impl<T: Series + Clone + PartialEq> SourceCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_cache_size(max_cache_size: Option<usize>) -> Self {
        Self {
            max_cache_size,
            ..Self::default()
        }
    }

    #[inline]
    pub fn cache(&self) -> &Cache<T> {
        &self.cache
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        self.cache.as_slice()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn max_cache_size(&self) -> Option<usize> {
        self.max_cache_size
    }

    /// Grows the hidden history kept in front of the visible window.
    pub fn reserve_history(&mut self, history: usize) {
        self.history = self.history.max(history);
    }

    pub fn history(&self) -> usize {
        self.history
    }

    /// Points evicted by the size cap since the last `clear`.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Leading cached points that are history only: not visible, not
    /// mutable, but still read by transforms looking back.
    pub fn hidden_len(&self) -> usize {
        let Some(cap) = self.max_cache_size else {
            return 0;
        };
        if self.pruned > 0 {
            self.history.min(self.cache.len())
        } else {
            self.cache.len().saturating_sub(cap)
        }
    }

    /// The retained window: at most `max_cache_size` newest points.
    pub fn visible(&self) -> &[T] {
        &self.cache.as_slice()[self.hidden_len()..]
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    /// Clears the fault and the duplicate counter.
    pub fn reset_fault(&mut self) {
        self.faulted = false;
        self.forget_last();
    }

    /// Consecutive resubmissions of the last submitted point.
    pub fn repeat_count(&self) -> u32 {
        self.repeats
    }

    /// Timeline-aware add.
    ///
    /// Newer than the tail appends, an existing timestamp with a new payload
    /// updates in place, an older timestamp is a late arrival. Identical
    /// resubmissions are suppressed and return `None`, as are points older
    /// than the retained window.
    pub fn add(&mut self, item: T) -> Result<Option<MutationEvent>, HubError> {
        if self.guard(&item)? {
            return Ok(None);
        }
        let ts = item.timestamp();
        let index = self.cache.insertion_point(ts);
        if self.is_stale(index, ts) {
            return Ok(None);
        }
        if index == self.cache.len() {
            self.cache.push(item);
            return Ok(Some(MutationEvent::append(index, ts)));
        }
        Ok(self.place(index, item))
    }

    /// Places a point by timestamp order without the append fast path.
    pub fn insert(&mut self, item: T) -> Result<Option<MutationEvent>, HubError> {
        if self.guard(&item)? {
            return Ok(None);
        }
        let ts = item.timestamp();
        let index = self.cache.insertion_point(ts);
        if self.is_stale(index, ts) {
            return Ok(None);
        }
        Ok(self.place(index, item))
    }

    pub fn remove(&mut self, timestamp: Timestamp) -> Result<MutationEvent, HubError> {
        self.ensure_live()?;
        let index = self
            .cache
            .index_of(timestamp)
            .filter(|&i| i >= self.hidden_len())
            .ok_or(HubError::NotFound(timestamp))?;
        self.cache.remove(index);
        self.forget_last();
        Ok(MutationEvent::new(MutationKind::Remove, index, timestamp))
    }

    /// `index` counts from the first visible point.
    pub fn remove_at(&mut self, index: usize) -> Result<MutationEvent, HubError> {
        self.ensure_live()?;
        let hidden = self.hidden_len();
        let len = self.cache.len() - hidden;
        if index >= len {
            return Err(HubError::IndexOutOfRange { index, len });
        }
        let removed = self.cache.remove(hidden + index);
        self.forget_last();
        Ok(MutationEvent::new(
            MutationKind::Remove,
            hidden + index,
            removed.timestamp(),
        ))
    }

    /// Drops every point at or after `from`; `None` when nothing matched.
    pub fn remove_range(&mut self, from: Timestamp) -> Result<Option<MutationEvent>, HubError> {
        self.ensure_live()?;
        let hidden = self.hidden_len();
        let Some(index) = self.cache.index_gte(from).map(|i| i.max(hidden)) else {
            return Ok(None);
        };
        if index == self.cache.len() {
            return Ok(None);
        }
        let dropped = self.cache.len() - index;
        self.cache.truncate(index);
        self.forget_last();
        debug!(from, index, dropped, "source range removed");
        Ok(Some(MutationEvent::new(MutationKind::Remove, index, from)))
    }

    pub fn clear(&mut self) -> MutationEvent {
        self.cache.clear();
        self.pruned = 0;
        self.forget_last();
        MutationEvent::rebuild(0, Timestamp::MIN)
    }

    /// Evicts the oldest points beyond the size cap plus reserved history.
    pub fn prune_excess(&mut self) -> Option<MutationEvent> {
        let limit = self.max_cache_size? + self.history;
        let len = self.cache.len();
        if len <= limit {
            return None;
        }
        let count = len - limit;
        self.cache.prune_front(count);
        self.pruned += count;
        let ts = self.cache.get(0).map(Series::timestamp).unwrap_or(Timestamp::MIN);
        Some(MutationEvent::new(MutationKind::Prune, count, ts))
    }

    fn place(&mut self, index: usize, item: T) -> Option<MutationEvent> {
        let ts = item.timestamp();
        let same_payload = self
            .cache
            .get(index)
            .filter(|existing| existing.timestamp() == ts)
            .map(|existing| *existing == item);
        match same_payload {
            Some(true) => {
                debug!(timestamp = ts, "point already cached");
                None
            }
            Some(false) => {
                self.cache.replace(index, item);
                Some(MutationEvent::new(MutationKind::Update, index, ts))
            }
            None => {
                self.cache.insert(index, item);
                Some(MutationEvent::new(MutationKind::Insert, index, ts))
            }
        }
    }

    // Hidden points are frozen: anything landing among them is dropped
    // before an event exists.
    fn is_stale(&self, index: usize, timestamp: Timestamp) -> bool {
        let hidden = self.hidden_len();
        if index >= hidden {
            return false;
        }
        warn!(timestamp, hidden, "point older than the retained window ignored");
        true
    }

    // A removal breaks any run of resubmissions.
    fn forget_last(&mut self) {
        self.last_submitted = None;
        self.repeats = 0;
    }

    fn ensure_live(&self) -> Result<(), HubError> {
        if self.faulted {
            return Err(HubError::inconsistent(
                "source is faulted; reset_fault before sending more data",
            ));
        }
        Ok(())
    }

    /// Duplicate tracking. `Ok(true)` means suppress the item.
    fn guard(&mut self, item: &T) -> Result<bool, HubError> {
        self.ensure_live()?;
        let repeat = self
            .last_submitted
            .as_ref()
            .is_some_and(|last| last.timestamp() == item.timestamp() && last == item);
        if !repeat {
            self.repeats = 0;
            self.last_submitted = Some(item.clone());
            return Ok(false);
        }

        self.repeats += 1;
        if self.repeats > OVERFLOW_THRESHOLD {
            self.faulted = true;
            error!(
                timestamp = item.timestamp(),
                count = self.repeats,
                "repeated stream update exceeded threshold, source terminated"
            );
            return Err(HubError::DuplicateOverflow {
                timestamp: item.timestamp(),
                count: self.repeats,
            });
        }
        warn!(
            timestamp = item.timestamp(),
            count = self.repeats,
            "duplicate point suppressed"
        );
        Ok(true)
    }
}
