//! Source + node arena with synchronous, depth-first event propagation.
//!
//! Nodes are only ever created after their producer, so a node id is
//! always greater than its producer's id and insertion order is a valid
//! topological order.

use core::any::Any;
use core::fmt;
use core::marker::PhantomData;

use tracing::{debug, error, trace};

use crate::cache::Cache;
use crate::config::HubConfig;
use crate::error::HubError;
use crate::event::MutationEvent;
use crate::node::{ComputeNode, Subscriber};
use crate::source::SourceCache;
use crate::transform::{Recovery, Transform};
use crate::{Series, Timestamp};

/// Who feeds a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerId {
    Source,
    Node(usize),
}

/// Typed reference to a producer whose cache holds `T`.
pub struct NodeHandle<T> {
    id: ProducerId,
    _out: PhantomData<fn() -> T>,
}

impl<T> NodeHandle<T> {
    fn new(id: ProducerId) -> Self {
        Self {
            id,
            _out: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> ProducerId {
        self.id
    }
}

impl<T> Clone for NodeHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodeHandle<T> {}

impl<T> PartialEq for NodeHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for NodeHandle<T> {}

impl<T> fmt::Debug for NodeHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeHandle").field(&self.id).finish()
    }
}

struct Slot {
    node: Box<dyn Subscriber>,
    producer: ProducerId,
    subscribers: Vec<usize>,
    subscribed: bool,
}

pub struct Pipeline<S> {
    config: HubConfig,
    source: SourceCache<S>,
    source_subscribers: Vec<usize>,
    nodes: Vec<Slot>,
}

impl<S> fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("nodes", &self.nodes.len())
            .field("source_subscribers", &self.source_subscribers.len())
            .finish_non_exhaustive()
    }
}

impl<S: Series + Clone + PartialEq + 'static> Default for Pipeline<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Series + Clone + PartialEq + 'static> Pipeline<S> {
    pub fn new() -> Self {
        Self {
            config: HubConfig::default(),
            source: SourceCache::new(),
            source_subscribers: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn with_config(config: HubConfig) -> Result<Self, HubError> {
        config.validate()?;
        Ok(Self {
            source: SourceCache::with_max_cache_size(config.max_cache_size),
            config,
            source_subscribers: Vec::new(),
            nodes: Vec::new(),
        })
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn source(&self) -> NodeHandle<S> {
        NodeHandle::new(ProducerId::Source)
    }

    pub fn source_cache(&self) -> &SourceCache<S> {
        &self.source
    }

    /// The retained source window.
    pub fn quotes(&self) -> &[S] {
        self.source.visible()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_faulted(&self) -> bool {
        self.source.is_faulted()
    }

    /// Accepts data again. Subscriptions ended by the fault stay ended
    /// until [`Pipeline::resubscribe`].
    pub fn reset_fault(&mut self) {
        self.source.reset_fault();
    }

    // ----- subscription surface -----

    /// Attaches `transform` to `producer` and fills it from the producer's
    /// current cache.
    ///
    /// With a size cap, the source keeps enough hidden history in front of
    /// the retained window for this transform to recompute any retained
    /// index. A node added after pruning starts from what is retained.
    pub fn subscribe<I, T>(
        &mut self,
        producer: NodeHandle<I>,
        transform: T,
    ) -> Result<NodeHandle<T::Output>, HubError>
    where
        I: Series + 'static,
        T: Transform<I> + 'static,
        T::Output: 'static,
    {
        let recovery = transform.recovery();
        let reach = match recovery {
            Recovery::Replay { lookback } => lookback.max(transform.warmup_length()),
            _ => transform.warmup_length(),
        };
        let mut node = ComputeNode::<I, T>::new(transform)?;
        if self.config.max_cache_size.is_some() {
            self.source.reserve_history(reach + 1);
            if recovery == Recovery::Rebuild {
                node = node.with_checkpoints();
            }
        }
        let mut node: Box<dyn Subscriber> = Box::new(node);
        node.rebuild_any(self.output_of(producer.id)?)?;

        let id = self.nodes.len();
        self.subscribers_mut(producer.id)?.push(id);
        debug!(node = node.node_name(), id, producer = ?producer.id, "subscribed");
        self.nodes.push(Slot {
            node,
            producer: producer.id,
            subscribers: Vec::new(),
            subscribed: true,
        });
        Ok(NodeHandle::new(ProducerId::Node(id)))
    }

    /// Detaches a node from its producer. Its cache is kept as is.
    pub fn unsubscribe<T>(&mut self, handle: NodeHandle<T>) -> Result<(), HubError> {
        let id = self.node_id(handle.id)?;
        if !self.nodes[id].subscribed {
            return Ok(());
        }
        let producer = self.nodes[id].producer;
        self.subscribers_mut(producer)?.retain(|&s| s != id);
        self.nodes[id].subscribed = false;
        debug!(node = self.nodes[id].node.node_name(), id, "unsubscribed");
        Ok(())
    }

    /// Tells every subscriber of `producer` that no more data is coming.
    /// Completion cascades down the chain.
    pub fn end_transmission<T>(&mut self, producer: NodeHandle<T>) -> Result<(), HubError> {
        self.end_from(producer.id)
    }

    /// Re-attaches a node to its producer and rebuilds it from scratch.
    pub fn resubscribe<T>(&mut self, handle: NodeHandle<T>) -> Result<(), HubError> {
        let id = self.node_id(handle.id)?;
        let producer = self.nodes[id].producer;
        if !self.nodes[id].subscribed {
            let subs = self.subscribers_mut(producer)?;
            // Keep delivery in creation order.
            let at = subs.partition_point(|&s| s < id);
            subs.insert(at, id);
            self.nodes[id].subscribed = true;
        }
        debug!(node = self.nodes[id].node.node_name(), id, "resubscribed");
        self.rebuild_node(id)
    }

    /// Recomputes `handle` from scratch and republishes downstream.
    ///
    /// Once the source has pruned, "scratch" is the first retained index:
    /// the hidden history in front of it is never recomputed.
    pub fn rebuild<T>(&mut self, handle: NodeHandle<T>) -> Result<(), HubError> {
        match handle.id {
            ProducerId::Node(_) if self.source.pruned() == 0 => {
                let id = self.node_id(handle.id)?;
                self.rebuild_node(id)
            }
            _ => self.rebuild_from(handle, Timestamp::MIN),
        }
    }

    /// Recomputes `handle` from the first point at or after `from` and
    /// republishes a `Rebuild` from that index. Entries before it are kept.
    pub fn rebuild_from<T>(&mut self, handle: NodeHandle<T>, from: Timestamp) -> Result<(), HubError> {
        let floor = if self.source.pruned() > 0 {
            self.source.hidden_len()
        } else {
            0
        };
        let Some(index) = self.source.cache().index_gte(from).map(|i| i.max(floor)) else {
            return Ok(());
        };
        let event = MutationEvent::rebuild(index, self.timestamp_at(index));
        debug!(producer = ?handle.id, index, "rebuilding from index");
        match handle.id {
            ProducerId::Source => self.propagate(ProducerId::Source, event),
            ProducerId::Node(_) => {
                let id = self.node_id(handle.id)?;
                let next = self.with_provider(id, |node, provider| node.handle(provider, &event))?;
                self.propagate(ProducerId::Node(id), next)
            }
        }
    }

    pub fn subscriber_count<T>(&self, handle: NodeHandle<T>) -> Result<usize, HubError> {
        Ok(self.subscribers(handle.id)?.len())
    }

    /// Whether a node still receives its producer's events. The source has
    /// no producer; asking about it is an error, see [`Pipeline::is_faulted`].
    pub fn is_subscribed<T>(&self, handle: NodeHandle<T>) -> Result<bool, HubError> {
        let id = self.node_id(handle.id)?;
        Ok(self.nodes[id].subscribed)
    }

    pub fn name<T>(&self, handle: NodeHandle<T>) -> Result<&str, HubError> {
        match handle.id {
            ProducerId::Source => Ok("SOURCE"),
            ProducerId::Node(_) => Ok(self.nodes[self.node_id(handle.id)?].node.node_name()),
        }
    }

    /// Output over the retained window.
    pub fn results<T: Series + 'static>(&self, handle: NodeHandle<T>) -> Result<&[T], HubError> {
        let output = self.output_of(handle.id)?;
        let all = output
            .downcast_ref::<Cache<T>>()
            .map(Cache::as_slice)
            .ok_or_else(|| HubError::inconsistent("handle type does not match node output"))?;
        if self.source.hidden_len() == 0 {
            return Ok(all);
        }
        let visible = self.source.visible().len();
        Ok(&all[all.len().saturating_sub(visible)..])
    }

    // ----- ingestion surface -----

    pub fn add(&mut self, item: S) -> Result<(), HubError> {
        let event = self.source_op(|source| source.add(item))?;
        if let Some(event) = event {
            self.propagate(ProducerId::Source, event)?;
        }
        self.enforce_cap()
    }

    /// Sorted by timestamp first, then added one by one.
    pub fn add_batch(&mut self, mut items: Vec<S>) -> Result<(), HubError> {
        items.sort_by_key(Series::timestamp);
        for item in items {
            self.add(item)?;
        }
        Ok(())
    }

    /// Places `item` by timestamp, as an insertion even at the tail.
    pub fn insert(&mut self, item: S) -> Result<(), HubError> {
        let event = self.source_op(|source| source.insert(item))?;
        if let Some(event) = event {
            self.propagate(ProducerId::Source, event)?;
        }
        self.enforce_cap()
    }

    pub fn remove(&mut self, timestamp: Timestamp) -> Result<(), HubError> {
        let event = self.source.remove(timestamp)?;
        self.propagate(ProducerId::Source, event)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<(), HubError> {
        let event = self.source.remove_at(index)?;
        self.propagate(ProducerId::Source, event)
    }

    /// Drops every point at or after `from`.
    pub fn remove_range(&mut self, from: Timestamp) -> Result<(), HubError> {
        match self.source.remove_range(from)? {
            Some(event) => self.propagate(ProducerId::Source, event),
            None => Ok(()),
        }
    }

    pub fn clear(&mut self) -> Result<(), HubError> {
        let event = self.source.clear();
        self.propagate(ProducerId::Source, event)
    }

    // ----- internals -----

    fn source_op<R>(
        &mut self,
        op: impl FnOnce(&mut SourceCache<S>) -> Result<R, HubError>,
    ) -> Result<R, HubError> {
        match op(&mut self.source) {
            Err(err @ HubError::DuplicateOverflow { .. }) => {
                error!(%err, "ending all subscriptions");
                self.end_from(ProducerId::Source)?;
                Err(err)
            }
            other => other,
        }
    }

    fn enforce_cap(&mut self) -> Result<(), HubError> {
        match self.source.prune_excess() {
            Some(event) => {
                trace!(count = event.index, "pruned");
                self.propagate(ProducerId::Source, event)
            }
            None => Ok(()),
        }
    }

    fn rebuild_node(&mut self, id: usize) -> Result<(), HubError> {
        let event = self.with_provider(id, |node, provider| node.rebuild_any(provider))?;
        self.propagate(ProducerId::Node(id), event)
    }

    fn end_from(&mut self, producer: ProducerId) -> Result<(), HubError> {
        let subs = core::mem::take(self.subscribers_mut(producer)?);
        for id in subs {
            self.nodes[id].subscribed = false;
            debug!(node = self.nodes[id].node.node_name(), id, "transmission ended");
            self.end_from(ProducerId::Node(id))?;
        }
        Ok(())
    }

    /// Depth-first: each consumer and its whole subtree catch up before the
    /// next sibling sees the event.
    fn propagate(&mut self, from: ProducerId, event: MutationEvent) -> Result<(), HubError> {
        let fanout = self.subscribers(from)?.len();
        for k in 0..fanout {
            let id = self.subscribers(from)?[k];
            let next = self.with_provider(id, |node, provider| node.handle(provider, &event))?;
            self.propagate(ProducerId::Node(id), next)?;
        }
        Ok(())
    }

    /// Runs `f` on node `id` with its producer's cache as the provider.
    fn with_provider<R>(
        &mut self,
        id: usize,
        f: impl FnOnce(&mut dyn Subscriber, &dyn Any) -> Result<R, HubError>,
    ) -> Result<R, HubError> {
        match self.nodes[id].producer {
            ProducerId::Source => {
                let provider: &dyn Any = self.source.cache();
                f(self.nodes[id].node.as_mut(), provider)
            }
            ProducerId::Node(p) => {
                if p >= id {
                    return Err(HubError::inconsistent(format!(
                        "producer {p} does not precede consumer {id}"
                    )));
                }
                let (head, tail) = self.nodes.split_at_mut(id);
                f(tail[0].node.as_mut(), head[p].node.output_any())
            }
        }
    }

    fn output_of(&self, id: ProducerId) -> Result<&dyn Any, HubError> {
        match id {
            ProducerId::Source => Ok(self.source.cache()),
            ProducerId::Node(n) => self
                .nodes
                .get(n)
                .map(|slot| slot.node.output_any())
                .ok_or(HubError::UnknownNode(n)),
        }
    }

    fn subscribers(&self, id: ProducerId) -> Result<&[usize], HubError> {
        match id {
            ProducerId::Source => Ok(&self.source_subscribers),
            ProducerId::Node(n) => self
                .nodes
                .get(n)
                .map(|slot| slot.subscribers.as_slice())
                .ok_or(HubError::UnknownNode(n)),
        }
    }

    fn subscribers_mut(&mut self, id: ProducerId) -> Result<&mut Vec<usize>, HubError> {
        match id {
            ProducerId::Source => Ok(&mut self.source_subscribers),
            ProducerId::Node(n) => self
                .nodes
                .get_mut(n)
                .map(|slot| &mut slot.subscribers)
                .ok_or(HubError::UnknownNode(n)),
        }
    }

    fn node_id(&self, id: ProducerId) -> Result<usize, HubError> {
        match id {
            ProducerId::Node(n) if n < self.nodes.len() => Ok(n),
            ProducerId::Node(n) => Err(HubError::UnknownNode(n)),
            ProducerId::Source => Err(HubError::inconsistent(
                "the source has no producer to subscribe to",
            )),
        }
    }

    fn timestamp_at(&self, index: usize) -> Timestamp {
        self.source
            .as_slice()
            .get(index)
            .map(Series::timestamp)
            .unwrap_or(Timestamp::MIN)
    }
}
