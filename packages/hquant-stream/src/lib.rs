//! Incremental indicator engine.
//!
//! Three ways to run the same formula: batch over a slice (`*_series`),
//! event-driven through a [`Pipeline`] that tolerates late arrivals,
//! removals and updates, and append-only through a [`BufferNode`].

mod types;
pub use types::*;

pub mod buffer;
pub mod cache;
pub mod circular;
pub mod config;
pub mod error;
pub mod event;
pub mod extremum;
pub mod indicators;
pub mod node;
pub mod pipeline;
pub mod source;
pub mod transform;

pub use buffer::{BufferNode, MeanAggregate, WeightedMeanAggregate, WindowAggregate};
pub use cache::Cache;
pub use circular::CircularColumn;
pub use config::HubConfig;
pub use error::HubError;
pub use event::{MutationEvent, MutationKind};
pub use extremum::{RollingExtremum, RollingMax, RollingMin};
pub use node::ComputeNode;
pub use pipeline::{NodeHandle, Pipeline, ProducerId};
pub use source::{SourceCache, OVERFLOW_THRESHOLD};
pub use transform::{Recovery, Transform};
