//! Append-only fixed-window indicators.
//!
//! A [`BufferNode`] keeps the last `period` raw inputs in a
//! [`CircularColumn`] and updates a running aggregate from the value that
//! entered and the one that fell out. No mutation or rebuild support; use a
//! [`crate::Pipeline`] when history can change.

use std::collections::VecDeque;

use tracing::trace;

use crate::circular::CircularColumn;
use crate::error::{require_positive, HubError};
use crate::{Reusable, TimeValue, Timestamp};

/// Running aggregate over a full window.
///
/// `push` is only called while every value in the window is finite;
/// otherwise the node calls `resync` once the window is clean again.
pub trait WindowAggregate {
    fn label(&self) -> &'static str;

    /// `len` is the window length after the push.
    fn push(&mut self, incoming: f64, evicted: Option<f64>, len: usize, period: usize);

    /// Recomputes from the window contents, oldest first.
    fn resync(&mut self, window: &CircularColumn<f64>);

    fn value(&self, period: usize) -> f64;

    fn clear(&mut self);
}

#[derive(Debug, Clone, Default)]
pub struct MeanAggregate {
    sum: f64,
}

impl WindowAggregate for MeanAggregate {
    fn label(&self) -> &'static str {
        "SMA"
    }

    #[inline]
    fn push(&mut self, incoming: f64, evicted: Option<f64>, _len: usize, _period: usize) {
        self.sum += incoming - evicted.unwrap_or(0.0);
    }

    fn resync(&mut self, window: &CircularColumn<f64>) {
        self.sum = window.iter().sum();
    }

    #[inline]
    fn value(&self, period: usize) -> f64 {
        self.sum / period as f64
    }

    fn clear(&mut self) {
        self.sum = 0.0;
    }
}

/// Linear weights `1..=period`, newest heaviest.
#[derive(Debug, Clone, Default)]
pub struct WeightedMeanAggregate {
    weighted: f64,
    sum: f64,
}

impl WindowAggregate for WeightedMeanAggregate {
    fn label(&self) -> &'static str {
        "WMA"
    }

    #[inline]
    fn push(&mut self, incoming: f64, evicted: Option<f64>, len: usize, period: usize) {
        match evicted {
            // Every retained value loses one weight step.
            Some(old) => {
                self.weighted += period as f64 * incoming - self.sum;
                self.sum += incoming - old;
            }
            None => {
                self.weighted += len as f64 * incoming;
                self.sum += incoming;
            }
        }
    }

    fn resync(&mut self, window: &CircularColumn<f64>) {
        self.weighted = 0.0;
        self.sum = 0.0;
        for (i, v) in window.iter().enumerate() {
            self.weighted += (i + 1) as f64 * v;
            self.sum += v;
        }
    }

    #[inline]
    fn value(&self, period: usize) -> f64 {
        let p = period as f64;
        self.weighted / (p * (p + 1.0) / 2.0)
    }

    fn clear(&mut self) {
        self.weighted = 0.0;
        self.sum = 0.0;
    }
}

#[derive(Debug, Clone)]
pub struct BufferNode<A: WindowAggregate> {
    name: String,
    period: usize,
    window: CircularColumn<f64>,
    aggregate: A,
    results: VecDeque<TimeValue>,
    max_list_size: Option<usize>,
    last_timestamp: Option<Timestamp>,
    // Non-finite inputs currently inside the window.
    non_finite: usize,
    stale: bool,
}

impl BufferNode<MeanAggregate> {
    pub fn sma(period: usize) -> Result<Self, HubError> {
        Self::new(period, MeanAggregate::default())
    }
}

impl BufferNode<WeightedMeanAggregate> {
    pub fn wma(period: usize) -> Result<Self, HubError> {
        Self::new(period, WeightedMeanAggregate::default())
    }
}

impl<A: WindowAggregate> BufferNode<A> {
    pub fn new(period: usize, aggregate: A) -> Result<Self, HubError> {
        require_positive("period", period)?;
        Ok(Self {
            name: format!("{}({period})", aggregate.label()),
            period,
            window: CircularColumn::new(period),
            aggregate,
            results: VecDeque::new(),
            max_list_size: None,
            last_timestamp: None,
            non_finite: 0,
            stale: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> usize {
        self.period
    }

    pub fn results(&self) -> &VecDeque<TimeValue> {
        &self.results
    }

    pub fn last(&self) -> Option<&TimeValue> {
        self.results.back()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn max_list_size(&self) -> Option<usize> {
        self.max_list_size
    }

    /// Caps retained outputs; the oldest go first. Retained values never change.
    pub fn set_max_list_size(&mut self, max_list_size: usize) -> Result<(), HubError> {
        require_positive("max_list_size", max_list_size)?;
        self.max_list_size = Some(max_list_size);
        self.trim();
        Ok(())
    }

    pub fn add(&mut self, timestamp: Timestamp, value: f64) -> Result<&TimeValue, HubError> {
        if let Some(last) = self.last_timestamp {
            if timestamp <= last {
                return Err(HubError::OutOfOrder { timestamp, last });
            }
        }
        self.last_timestamp = Some(timestamp);

        let evicted = self.window.push(value);
        if !value.is_finite() {
            self.non_finite += 1;
        }
        if evicted.is_some_and(|v| !v.is_finite()) {
            self.non_finite -= 1;
        }

        let out = if self.non_finite > 0 {
            self.stale = true;
            TimeValue::empty(timestamp)
        } else {
            if self.stale {
                self.aggregate.resync(&self.window);
                self.stale = false;
            } else {
                self.aggregate
                    .push(value, evicted, self.window.len(), self.period);
            }
            if self.window.is_full() {
                TimeValue::from_f64(timestamp, self.aggregate.value(self.period))
            } else {
                TimeValue::empty(timestamp)
            }
        };
        trace!(node = %self.name, timestamp, value = ?out.value, "buffer add");

        self.results.push_back(out);
        self.trim();
        // `trim` never empties the list: the cap is at least one.
        Ok(&self.results[self.results.len() - 1])
    }

    pub fn add_reusable<R: Reusable>(&mut self, item: &R) -> Result<&TimeValue, HubError> {
        self.add(item.timestamp(), item.value())
    }

    pub fn add_batch<R: Reusable>(&mut self, items: &[R]) -> Result<(), HubError> {
        for item in items {
            self.add_reusable(item)?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.window.clear();
        self.aggregate.clear();
        self.results.clear();
        self.last_timestamp = None;
        self.non_finite = 0;
        self.stale = false;
    }

    fn trim(&mut self) {
        if let Some(cap) = self.max_list_size {
            while self.results.len() > cap {
                self.results.pop_front();
            }
        }
    }
}
