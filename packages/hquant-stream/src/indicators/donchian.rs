use serde::{Deserialize, Serialize};

use crate::error::{require_positive, HubError};
use crate::extremum::{RollingMax, RollingMin};
use crate::transform::{Recovery, Transform};
use crate::{Quote, Series, Timestamp};

/// Donchian channel over the last `period` bars, current bar included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Donchian {
    period: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DonchianResult {
    pub timestamp: Timestamp,
    pub upper: Option<f64>,
    pub center: Option<f64>,
    pub lower: Option<f64>,
    /// `(upper - lower) / center`; empty when the center is zero.
    pub width: Option<f64>,
}

impl DonchianResult {
    pub fn empty(timestamp: Timestamp) -> Self {
        Self {
            timestamp,
            upper: None,
            center: None,
            lower: None,
            width: None,
        }
    }

    fn from_bounds(timestamp: Timestamp, upper: f64, lower: f64) -> Self {
        let center = (upper + lower) / 2.0;
        let width = if center == 0.0 {
            None
        } else {
            Some((upper - lower) / center)
        };
        Self {
            timestamp,
            upper: Some(upper),
            center: Some(center),
            lower: Some(lower),
            width,
        }
    }
}

impl Series for DonchianResult {
    #[inline]
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

#[derive(Debug, Clone)]
pub struct DonchianState {
    highs: RollingMax,
    lows: RollingMin,
}

impl Donchian {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl Transform<Quote> for Donchian {
    type Output = DonchianResult;
    type State = DonchianState;

    fn name(&self) -> String {
        format!("DONCHIAN({})", self.period)
    }

    fn validate(&self) -> Result<(), HubError> {
        require_positive("period", self.period)
    }

    fn warmup_length(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn recovery(&self) -> Recovery {
        Recovery::Replay {
            lookback: self.period,
        }
    }

    fn init_state(&self) -> DonchianState {
        DonchianState {
            highs: RollingMax::with_window(self.period),
            lows: RollingMin::with_window(self.period),
        }
    }

    fn compute(&self, provider: &[Quote], index: usize, state: &mut DonchianState) -> DonchianResult {
        let q = &provider[index];
        state.highs.add(q.high);
        state.lows.add(q.low);
        if index + 1 < self.period {
            return DonchianResult::empty(q.timestamp);
        }
        match (state.highs.max(), state.lows.min()) {
            (Some(upper), Some(lower)) => DonchianResult::from_bounds(q.timestamp, upper, lower),
            _ => DonchianResult::empty(q.timestamp),
        }
    }
}

/// Batch Donchian channel with a plain scan of each window.
pub fn donchian_series(quotes: &[Quote], period: usize) -> Result<Vec<DonchianResult>, HubError> {
    require_positive("period", period)?;
    let out = quotes
        .iter()
        .enumerate()
        .map(|(i, q)| {
            if i + 1 < period {
                return DonchianResult::empty(q.timestamp);
            }
            let window = &quotes[i + 1 - period..=i];
            let upper = window
                .iter()
                .map(|x| x.high)
                .filter(|v| !v.is_nan())
                .reduce(f64::max);
            let lower = window
                .iter()
                .map(|x| x.low)
                .filter(|v| !v.is_nan())
                .reduce(f64::min);
            match (upper, lower) {
                (Some(u), Some(l)) => DonchianResult::from_bounds(q.timestamp, u, l),
                _ => DonchianResult::empty(q.timestamp),
            }
        })
        .collect();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars() -> Vec<Quote> {
        [(3.0, 1.0), (5.0, 2.0), (4.0, 3.0), (2.0, 0.5), (6.0, 4.0)]
            .iter()
            .enumerate()
            .map(|(i, &(h, l))| Quote::new(i as i64, l, h, l, h, 0.0))
            .collect()
    }

    #[test]
    fn channel_includes_current_bar() {
        let out = donchian_series(&bars(), 3).unwrap();
        assert_eq!(out[1], DonchianResult::empty(1));
        assert_eq!(out[2].upper, Some(5.0));
        assert_eq!(out[2].lower, Some(1.0));
        assert_eq!(out[2].center, Some(3.0));
        assert_eq!(out[3].lower, Some(0.5));
        assert_eq!(out[4].upper, Some(6.0));
        assert_eq!(Donchian::new(3).batch(&bars()), out);
    }

    #[test]
    fn zero_center_has_no_width() {
        let q = [Quote::new(0, 0.0, 1.0, -1.0, 0.0, 0.0)];
        let out = donchian_series(&q, 1).unwrap();
        assert_eq!(out[0].center, Some(0.0));
        assert_eq!(out[0].width, None);
    }
}
