use serde::{Deserialize, Serialize};

use crate::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    /// New point at the end.
    Append,
    /// Late arrival placed at `index`.
    Insert,
    /// Point at `index` was deleted.
    Remove,
    /// Point at `index` got a new payload.
    Update,
    /// Everything from `index` on was recomputed.
    Rebuild,
    /// The `index` oldest points were evicted by the size cap.
    Prune,
}

/// What changed in a producer's cache. Consumers re-issue the same event
/// after catching up, so one root mutation walks the whole chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub kind: MutationKind,
    pub index: usize,
    pub timestamp: Timestamp,
}

impl MutationEvent {
    pub fn new(kind: MutationKind, index: usize, timestamp: Timestamp) -> Self {
        Self {
            kind,
            index,
            timestamp,
        }
    }

    pub fn append(index: usize, timestamp: Timestamp) -> Self {
        Self::new(MutationKind::Append, index, timestamp)
    }

    pub fn rebuild(index: usize, timestamp: Timestamp) -> Self {
        Self::new(MutationKind::Rebuild, index, timestamp)
    }

    /// True for events that invalidate entries at and after `index`.
    #[inline]
    pub fn invalidates(&self) -> bool {
        matches!(
            self.kind,
            MutationKind::Insert | MutationKind::Remove | MutationKind::Update | MutationKind::Rebuild
        )
    }
}
