use super::window_mean;
use crate::error::{require_positive, HubError};
use crate::transform::{Recovery, Transform};
use crate::{Reusable, TimeValue};

/// Simple moving average. A pure function of its window, so it carries no
/// state and never needs a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sma {
    period: usize,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

impl<I: Reusable> Transform<I> for Sma {
    type Output = TimeValue;
    type State = ();

    fn name(&self) -> String {
        format!("SMA({})", self.period)
    }

    fn validate(&self) -> Result<(), HubError> {
        require_positive("period", self.period)
    }

    fn warmup_length(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn recovery(&self) -> Recovery {
        Recovery::Replay { lookback: 0 }
    }

    fn init_state(&self) {}

    fn compute(&self, provider: &[I], index: usize, _state: &mut ()) -> TimeValue {
        let ts = provider[index].timestamp();
        if index + 1 < self.period {
            return TimeValue::empty(ts);
        }
        TimeValue::from_f64(ts, window_mean(provider, index, self.period))
    }
}

/// Batch SMA.
pub fn sma_series<I: Reusable>(items: &[I], period: usize) -> Result<Vec<TimeValue>, HubError> {
    require_positive("period", period)?;
    let mut out = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if i + 1 < period {
            out.push(TimeValue::empty(item.timestamp()));
            continue;
        }
        let mut sum = 0.0;
        for x in &items[i + 1 - period..=i] {
            sum += x.value();
        }
        out.push(TimeValue::from_f64(item.timestamp(), sum / period as f64));
    }
    Ok(out)
}
