use super::window_mean;
use crate::error::{require_positive, HubError};
use crate::transform::{Recovery, Transform};
use crate::{Reusable, TimeValue};

/// Exponential moving average.
///
/// Warmup: the first `period - 1` points are empty, the first full window
/// seeds with its simple mean, then `ema += k * (value - ema)`. Whenever the
/// previous output is empty (e.g. upstream still warming up) the seed is
/// taken again from the current window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    period: usize,
    k: f64,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            k: 2.0 / (period as f64 + 1.0),
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    #[inline]
    fn increment(k: f64, prev: f64, value: f64) -> f64 {
        prev + k * (value - prev)
    }
}

impl<I: Reusable> Transform<I> for Ema {
    type Output = TimeValue;
    /// Last emitted EMA.
    type State = Option<f64>;

    fn name(&self) -> String {
        format!("EMA({})", self.period)
    }

    fn validate(&self) -> Result<(), HubError> {
        require_positive("period", self.period)
    }

    fn warmup_length(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn recovery(&self) -> Recovery {
        Recovery::Checkpoint
    }

    fn init_state(&self) -> Option<f64> {
        None
    }

    fn compute(&self, provider: &[I], index: usize, state: &mut Option<f64>) -> TimeValue {
        let item = &provider[index];
        if index + 1 < self.period {
            *state = None;
            return TimeValue::empty(item.timestamp());
        }
        let ema = match *state {
            Some(prev) => Self::increment(self.k, prev, item.value()),
            None => window_mean(provider, index, self.period),
        };
        let out = TimeValue::from_f64(item.timestamp(), ema);
        *state = out.value;
        out
    }
}

/// Batch EMA.
pub fn ema_series<I: Reusable>(items: &[I], period: usize) -> Result<Vec<TimeValue>, HubError> {
    require_positive("period", period)?;
    let k = 2.0 / (period as f64 + 1.0);
    let mut out: Vec<TimeValue> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if i + 1 < period {
            out.push(TimeValue::empty(item.timestamp()));
            continue;
        }
        let prev = if i == 0 { None } else { out[i - 1].value };
        let ema = match prev {
            Some(p) => Ema::increment(k, p, item.value()),
            None => {
                let mut sum = 0.0;
                for x in &items[i + 1 - period..=i] {
                    sum += x.value();
                }
                sum / period as f64
            }
        };
        out.push(TimeValue::from_f64(item.timestamp(), ema));
    }
    Ok(out)
}
