use core::fmt::Debug;

use crate::error::HubError;
use crate::Series;

/// How a node gets a transform's state back after history changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// The node snapshots state after every index and restores the one
    /// anchored just before the mutation.
    Checkpoint,
    /// State is a pure function of the `lookback` inputs preceding an index;
    /// the node replays them into a fresh state.
    Replay { lookback: usize },
    /// No incremental rollback; every mutation rebuilds the node.
    Rebuild,
}

/// One indicator formula, consumed by [`crate::ComputeNode`].
///
/// `compute` must be deterministic in `(provider[..=index], state)`: the
/// engine relies on that to make streamed output equal batch output.
pub trait Transform<I: Series> {
    type Output: Series + Clone + PartialEq + Debug;
    type State: Clone + Debug;

    fn name(&self) -> String;

    /// Parameter checks. Called once, before any data flows.
    fn validate(&self) -> Result<(), HubError>;

    /// Leading indices that always produce the "not yet computable" output.
    fn warmup_length(&self) -> usize;

    fn recovery(&self) -> Recovery;

    fn init_state(&self) -> Self::State;

    /// Output at `index`, advancing `state` past it. Never fails for short
    /// history; returns the warmup sentinel instead.
    fn compute(&self, provider: &[I], index: usize, state: &mut Self::State) -> Self::Output;

    /// One-shot series over a full input slice.
    fn batch(&self, provider: &[I]) -> Vec<Self::Output> {
        let mut state = self.init_state();
        (0..provider.len())
            .map(|i| self.compute(provider, i, &mut state))
            .collect()
    }
}
