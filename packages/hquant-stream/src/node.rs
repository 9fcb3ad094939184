//! Incremental maintenance of one transform's output over a mutable provider.
//!
//! Invariant: after any event, `cache[i] == transform.batch(provider)[i]` for
//! every retained `i`. Appends cost one `compute`; anything that rewrites
//! history rolls state back to just before the mutation index and
//! recomputes forward from there.

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;

use tracing::{debug, trace, warn};

use crate::cache::{index_of, Cache};
use crate::error::HubError;
use crate::event::{MutationEvent, MutationKind};
use crate::transform::{Recovery, Transform};
use crate::{Series, Timestamp};

pub struct ComputeNode<I: Series, T: Transform<I>> {
    transform: T,
    name: String,
    recovery: Recovery,
    cache: Cache<T::Output>,
    // State after each cached index; kept for `Recovery::Checkpoint`, or for
    // any transform built `with_checkpoints`.
    checkpoints: Vec<T::State>,
    snapshots: bool,
    // Entries dropped from the front since the last rebuild.
    pruned: usize,
    state: T::State,
    _input: PhantomData<fn(&I)>,
}

impl<I: Series, T: Transform<I>> fmt::Debug for ComputeNode<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputeNode")
            .field("name", &self.name)
            .field("recovery", &self.recovery)
            .field("len", &self.cache.len())
            .field("checkpoints", &self.checkpoints.len())
            .field("pruned", &self.pruned)
            .finish()
    }
}

impl<I: Series, T: Transform<I>> ComputeNode<I, T> {
    /// Validates the transform eagerly; no data is touched.
    pub fn new(transform: T) -> Result<Self, HubError> {
        transform.validate()?;
        let name = transform.name();
        let recovery = transform.recovery();
        let state = transform.init_state();
        Ok(Self {
            transform,
            name,
            recovery,
            cache: Cache::new(),
            checkpoints: Vec::new(),
            snapshots: recovery == Recovery::Checkpoint,
            pruned: 0,
            state,
            _input: PhantomData,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transform(&self) -> &T {
        &self.transform
    }

    pub fn cache(&self) -> &Cache<T::Output> {
        &self.cache
    }

    pub fn results(&self) -> &[T::Output] {
        self.cache.as_slice()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Entries dropped by `Prune` events since the last rebuild.
    pub fn pruned(&self) -> usize {
        self.pruned
    }

    /// Snapshot state after every index whatever the recovery mode.
    ///
    /// A pruned opt-out transform cannot rebuild from scratch without
    /// changing retained values, so capped pipelines turn this on and the
    /// node restores checkpoints instead once it has pruned.
    pub fn with_checkpoints(mut self) -> Self {
        self.snapshots = true;
        self.reset();
        self
    }

    /// Snapshot of the state right after `index` was computed.
    pub fn checkpoint_at(&self, index: usize) -> Option<T::State> {
        if self.snapshots {
            self.checkpoints.get(index).cloned()
        } else {
            None
        }
    }

    pub fn restore_from(&mut self, checkpoint: T::State) {
        self.state = checkpoint;
    }

    /// Dispatches a producer event; returns the event to publish downstream.
    pub fn on_event(
        &mut self,
        provider: &[I],
        event: &MutationEvent,
    ) -> Result<MutationEvent, HubError> {
        trace!(node = %self.name, ?event, "event");
        match event.kind {
            MutationKind::Append => self.on_append(provider, event.timestamp, Some(event.index)),
            MutationKind::Insert => self.on_insert(provider, event.index),
            MutationKind::Remove => self.on_remove(provider, event.index, event.timestamp),
            MutationKind::Update => self.on_update(provider, event.index),
            MutationKind::Rebuild => {
                let start = self.recompute_from(provider, event.index);
                Ok(MutationEvent::rebuild(
                    start,
                    timestamp_at(provider, start, event.timestamp),
                ))
            }
            MutationKind::Prune => Ok(self.prune(event.index, event.timestamp)),
        }
    }

    /// New point at the provider's tail.
    ///
    /// `index_hint` skips the timestamp search when it points at `timestamp`.
    pub fn on_append(
        &mut self,
        provider: &[I],
        timestamp: Timestamp,
        index_hint: Option<usize>,
    ) -> Result<MutationEvent, HubError> {
        let index = locate(provider, timestamp, index_hint).ok_or(HubError::NotFound(timestamp))?;
        if index == self.cache.len() && index + 1 == provider.len() {
            self.step(provider, index);
            return Ok(MutationEvent::append(index, timestamp));
        }
        let reason = format!(
            "append at {index} but holding {} of {}",
            self.cache.len(),
            provider.len()
        );
        Ok(self.fallback_rebuild(provider, &reason))
    }

    /// Late arrival at `index`; entries from `index` on are stale.
    pub fn on_insert(&mut self, provider: &[I], index: usize) -> Result<MutationEvent, HubError> {
        let timestamp = provider
            .get(index)
            .map(Series::timestamp)
            .ok_or(HubError::IndexOutOfRange {
                index,
                len: provider.len(),
            })?;
        let start = self.recompute_from(provider, index);
        Ok(self.republish(MutationKind::Insert, index, start, timestamp, provider))
    }

    /// The point at `index` (stamped `timestamp`) left the provider.
    pub fn on_remove(
        &mut self,
        provider: &[I],
        index: usize,
        timestamp: Timestamp,
    ) -> Result<MutationEvent, HubError> {
        if index > provider.len() {
            return Err(HubError::IndexOutOfRange {
                index,
                len: provider.len(),
            });
        }
        let start = self.recompute_from(provider, index);
        Ok(self.republish(MutationKind::Remove, index, start, timestamp, provider))
    }

    /// Remove + insert at the same position.
    pub fn on_update(&mut self, provider: &[I], index: usize) -> Result<MutationEvent, HubError> {
        let timestamp = provider
            .get(index)
            .map(Series::timestamp)
            .ok_or(HubError::IndexOutOfRange {
                index,
                len: provider.len(),
            })?;
        let start = self.recompute_from(provider, index);
        Ok(self.republish(MutationKind::Update, index, start, timestamp, provider))
    }

    /// Full recomputation from scratch.
    pub fn rebuild(&mut self, provider: &[I]) -> MutationEvent {
        self.reset();
        self.extend(provider, 0);
        debug!(node = %self.name, len = self.cache.len(), "rebuilt");
        MutationEvent::rebuild(0, timestamp_at(provider, 0, Timestamp::MIN))
    }

    /// Mirrors a provider prune: drops the `count` oldest entries.
    pub fn prune(&mut self, count: usize, timestamp: Timestamp) -> MutationEvent {
        self.cache.prune_front(count);
        let drop = count.min(self.checkpoints.len());
        self.checkpoints.drain(..drop);
        self.pruned += count;
        MutationEvent::new(MutationKind::Prune, count, timestamp)
    }

    fn republish(
        &self,
        kind: MutationKind,
        index: usize,
        start: usize,
        timestamp: Timestamp,
        provider: &[I],
    ) -> MutationEvent {
        if start == index {
            MutationEvent::new(kind, index, timestamp)
        } else {
            // Rolled back further than asked (rebuild fallback or short cache).
            MutationEvent::rebuild(start, timestamp_at(provider, start, timestamp))
        }
    }

    /// Rolls state back to just before `index` and recomputes to the end of
    /// the provider. Returns the index recomputation actually started from.
    ///
    /// Once pruned, the provider no longer starts at the first input, so
    /// opt-out transforms restore checkpoints like `Recovery::Checkpoint`.
    fn recompute_from(&mut self, provider: &[I], index: usize) -> usize {
        let index = index.min(self.cache.len());
        if index == 0 {
            if self.pruned > 0 {
                warn!(node = %self.name, pruned = self.pruned, "rebuilding over a pruned provider");
            }
            self.rebuild(provider);
            return 0;
        }

        let recovery = match self.recovery {
            Recovery::Rebuild if self.pruned > 0 => Recovery::Checkpoint,
            other => other,
        };
        match recovery {
            Recovery::Checkpoint => match self.checkpoint_at(index - 1) {
                Some(checkpoint) => self.restore_from(checkpoint),
                None => {
                    self.fallback_rebuild(provider, &format!("no checkpoint before {index}"));
                    return 0;
                }
            },
            Recovery::Replay { lookback } => {
                self.state = self.replay(provider, index, lookback);
            }
            Recovery::Rebuild => {
                self.rebuild(provider);
                return 0;
            }
        }

        self.cache.truncate(index);
        self.checkpoints.truncate(index);
        self.extend(provider, index);
        index
    }

    /// Fresh state fed with the `lookback` inputs preceding `index`.
    fn replay(&self, provider: &[I], index: usize, lookback: usize) -> T::State {
        let mut state = self.transform.init_state();
        for j in index.saturating_sub(lookback)..index {
            let _ = self.transform.compute(provider, j, &mut state);
        }
        state
    }

    fn fallback_rebuild(&mut self, provider: &[I], reason: &str) -> MutationEvent {
        warn!(node = %self.name, %reason, "inconsistent state, rebuilding");
        self.rebuild(provider)
    }

    fn reset(&mut self) {
        self.cache.clear();
        self.checkpoints.clear();
        self.pruned = 0;
        self.state = self.transform.init_state();
    }

    fn extend(&mut self, provider: &[I], from: usize) {
        for i in from..provider.len() {
            self.step(provider, i);
        }
    }

    #[inline]
    fn step(&mut self, provider: &[I], index: usize) {
        let out = self.transform.compute(provider, index, &mut self.state);
        if self.snapshots {
            self.checkpoints.push(self.state.clone());
        }
        self.cache.push(out);
    }
}

/// Resolves a provider position, trusting the hint only if it matches.
pub(crate) fn locate<I: Series>(
    provider: &[I],
    timestamp: Timestamp,
    index_hint: Option<usize>,
) -> Option<usize> {
    if let Some(i) = index_hint {
        if provider.get(i).map(Series::timestamp) == Some(timestamp) {
            return Some(i);
        }
    }
    index_of(provider, timestamp)
}

fn timestamp_at<I: Series>(provider: &[I], index: usize, fallback: Timestamp) -> Timestamp {
    provider.get(index).map(Series::timestamp).unwrap_or(fallback)
}

/// Type-erased node as stored in a [`crate::Pipeline`].
pub(crate) trait Subscriber {
    fn node_name(&self) -> &str;
    fn output_any(&self) -> &dyn Any;
    fn handle(&mut self, provider: &dyn Any, event: &MutationEvent) -> Result<MutationEvent, HubError>;
    fn rebuild_any(&mut self, provider: &dyn Any) -> Result<MutationEvent, HubError>;
}

impl<I, T> Subscriber for ComputeNode<I, T>
where
    I: Series + 'static,
    T: Transform<I> + 'static,
    T::Output: 'static,
{
    fn node_name(&self) -> &str {
        &self.name
    }

    fn output_any(&self) -> &dyn Any {
        &self.cache
    }

    fn handle(&mut self, provider: &dyn Any, event: &MutationEvent) -> Result<MutationEvent, HubError> {
        let provider = downcast_cache::<I>(provider, &self.name)?;
        self.on_event(provider.as_slice(), event)
    }

    fn rebuild_any(&mut self, provider: &dyn Any) -> Result<MutationEvent, HubError> {
        let provider = downcast_cache::<I>(provider, &self.name)?;
        Ok(self.rebuild(provider.as_slice()))
    }
}

pub(crate) fn downcast_cache<'a, I: Series + 'static>(
    provider: &'a dyn Any,
    node: &str,
) -> Result<&'a Cache<I>, HubError> {
    provider.downcast_ref::<Cache<I>>().ok_or_else(|| {
        HubError::inconsistent(format!(
            "{node}: provider cache does not hold {}",
            core::any::type_name::<I>()
        ))
    })
}
