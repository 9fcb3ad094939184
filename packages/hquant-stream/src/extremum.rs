//! Sliding-window max/min in O(1) amortized per value.
//!
//! Monotonic deque of `(sequence, value)` candidates. There is no positional
//! undo: a node that needs to roll back clears the tracker and replays the
//! surviving window.

use core::fmt;
use core::marker::PhantomData;
use std::collections::VecDeque;

use crate::error::{require_positive, HubError};

/// Which side of the window a tracker keeps.
pub trait ExtremumPolicy {
    /// True when `incoming` makes the queued `candidate` irrelevant.
    fn dominates(incoming: f64, candidate: f64) -> bool;
}

#[derive(Debug, Clone, Copy)]
pub struct Highest;

#[derive(Debug, Clone, Copy)]
pub struct Lowest;

impl ExtremumPolicy for Highest {
    #[inline]
    fn dominates(incoming: f64, candidate: f64) -> bool {
        candidate <= incoming
    }
}

impl ExtremumPolicy for Lowest {
    #[inline]
    fn dominates(incoming: f64, candidate: f64) -> bool {
        candidate >= incoming
    }
}

pub struct RollingExtremum<P: ExtremumPolicy> {
    window: usize,
    seq: u64,
    candidates: VecDeque<(u64, f64)>,
    _policy: PhantomData<P>,
}

pub type RollingMax = RollingExtremum<Highest>;
pub type RollingMin = RollingExtremum<Lowest>;

impl<P: ExtremumPolicy> Clone for RollingExtremum<P> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            seq: self.seq,
            candidates: self.candidates.clone(),
            _policy: PhantomData,
        }
    }
}

impl<P: ExtremumPolicy> fmt::Debug for RollingExtremum<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingExtremum")
            .field("window", &self.window)
            .field("seq", &self.seq)
            .field("candidates", &self.candidates.len())
            .finish()
    }
}

impl<P: ExtremumPolicy> RollingExtremum<P> {
    pub fn new(window: usize) -> Result<Self, HubError> {
        require_positive("window", window)?;
        Ok(Self::with_window(window))
    }

    /// For windows validated elsewhere; zero is treated as one.
    pub(crate) fn with_window(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            seq: 0,
            candidates: VecDeque::with_capacity(window),
            _policy: PhantomData,
        }
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Values added since construction or the last `clear`.
    #[inline]
    pub fn count(&self) -> u64 {
        self.seq
    }

    /// NaN ages the window but never becomes a candidate.
    pub fn add(&mut self, value: f64) {
        let seq = self.seq;
        self.seq += 1;

        if !value.is_nan() {
            while let Some(&(_, back)) = self.candidates.back() {
                if P::dominates(value, back) {
                    self.candidates.pop_back();
                } else {
                    break;
                }
            }
            self.candidates.push_back((seq, value));
        }

        let window = self.window as u64;
        while let Some(&(s, _)) = self.candidates.front() {
            if s + window <= seq {
                self.candidates.pop_front();
            } else {
                break;
            }
        }
    }

    /// Extremum of the last `window` values, `None` when none are candidates.
    #[inline]
    pub fn value(&self) -> Option<f64> {
        self.candidates.front().map(|&(_, v)| v)
    }

    pub fn clear(&mut self) {
        self.seq = 0;
        self.candidates.clear();
    }
}

impl RollingExtremum<Highest> {
    #[inline]
    pub fn max(&self) -> Option<f64> {
        self.value()
    }
}

impl RollingExtremum<Lowest> {
    #[inline]
    pub fn min(&self) -> Option<f64> {
        self.value()
    }
}
