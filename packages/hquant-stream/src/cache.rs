use crate::{Series, Timestamp};

/// Time-ordered, index-addressable results owned by exactly one producer.
///
/// Readers only ever get `&[T]`; all mutation is crate-private so the
/// owning node stays the single writer.
#[derive(Debug, Clone)]
pub struct Cache<T> {
    items: Vec<T>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Series> Cache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize) -> Option<&T> {
        self.items.get(i)
    }

    #[inline]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    #[inline]
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.items.last().map(Series::timestamp)
    }

    /// Exact timestamp lookup.
    pub fn index_of(&self, timestamp: Timestamp) -> Option<usize> {
        index_of(&self.items, timestamp)
    }

    /// First index whose timestamp is `>= timestamp`.
    pub fn index_gte(&self, timestamp: Timestamp) -> Option<usize> {
        let i = self.items.partition_point(|x| x.timestamp() < timestamp);
        (i < self.items.len()).then_some(i)
    }

    /// Where a new timestamp would slot in to keep the order.
    pub(crate) fn insertion_point(&self, timestamp: Timestamp) -> usize {
        self.items.partition_point(|x| x.timestamp() < timestamp)
    }

    pub(crate) fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub(crate) fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item);
    }

    pub(crate) fn replace(&mut self, index: usize, item: T) -> T {
        std::mem::replace(&mut self.items[index], item)
    }

    pub(crate) fn remove(&mut self, index: usize) -> T {
        self.items.remove(index)
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Drops the `count` oldest entries.
    pub(crate) fn prune_front(&mut self, count: usize) {
        let count = count.min(self.items.len());
        self.items.drain(..count);
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

/// Binary search for an exact timestamp in a time-ordered slice.
pub fn index_of<T: Series>(items: &[T], timestamp: Timestamp) -> Option<usize> {
    items.binary_search_by_key(&timestamp, Series::timestamp).ok()
}
