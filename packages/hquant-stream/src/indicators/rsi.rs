use crate::error::{require_positive, HubError};
use crate::transform::{Recovery, Transform};
use crate::{Reusable, TimeValue};

/// Wilder RSI.
///
/// `period` price changes are needed, so index `period` is the first value.
/// The averages seed as plain means of the first `period` gains/losses and
/// then use Wilder smoothing. A NaN change empties the output and forces a
/// fresh seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rsi {
    period: usize,
}

/// Average gain and loss after the last computed index.
pub type RsiState = Option<(f64, f64)>;

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_gain == 0.0 && avg_loss == 0.0 {
            return 50.0;
        }
        if avg_loss == 0.0 {
            return 100.0;
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

#[inline]
fn gain_loss(prev: f64, cur: f64) -> Option<(f64, f64)> {
    let change = cur - prev;
    if change.is_nan() {
        return None;
    }
    Some((change.max(0.0), (-change).max(0.0)))
}

fn seed<I: Reusable>(items: &[I], index: usize, period: usize) -> Option<(f64, f64)> {
    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    for j in index + 1 - period..=index {
        let (g, l) = gain_loss(items[j - 1].value(), items[j].value())?;
        sum_gain += g;
        sum_loss += l;
    }
    Some((sum_gain / period as f64, sum_loss / period as f64))
}

#[inline]
fn smooth(prev: (f64, f64), step: (f64, f64), period: f64) -> (f64, f64) {
    (
        (prev.0 * (period - 1.0) + step.0) / period,
        (prev.1 * (period - 1.0) + step.1) / period,
    )
}

impl<I: Reusable> Transform<I> for Rsi {
    type Output = TimeValue;
    type State = RsiState;

    fn name(&self) -> String {
        format!("RSI({})", self.period)
    }

    fn validate(&self) -> Result<(), HubError> {
        require_positive("period", self.period)
    }

    fn warmup_length(&self) -> usize {
        self.period
    }

    fn recovery(&self) -> Recovery {
        Recovery::Checkpoint
    }

    fn init_state(&self) -> RsiState {
        None
    }

    fn compute(&self, provider: &[I], index: usize, state: &mut RsiState) -> TimeValue {
        let ts = provider[index].timestamp();
        if index < self.period {
            *state = None;
            return TimeValue::empty(ts);
        }
        let avgs = match *state {
            Some(prev) => gain_loss(provider[index - 1].value(), provider[index].value())
                .map(|step| smooth(prev, step, self.period as f64)),
            None => seed(provider, index, self.period),
        };
        *state = avgs;
        match avgs {
            Some((g, l)) => TimeValue::from_f64(ts, Rsi::rsi_from(g, l)),
            None => TimeValue::empty(ts),
        }
    }
}

/// Batch RSI.
pub fn rsi_series<I: Reusable>(items: &[I], period: usize) -> Result<Vec<TimeValue>, HubError> {
    require_positive("period", period)?;
    let p = period as f64;
    let mut out = Vec::with_capacity(items.len());
    let mut avgs: Option<(f64, f64)> = None;
    for (i, item) in items.iter().enumerate() {
        if i < period {
            out.push(TimeValue::empty(item.timestamp()));
            continue;
        }
        avgs = match avgs {
            Some(prev) => {
                gain_loss(items[i - 1].value(), item.value()).map(|step| smooth(prev, step, p))
            }
            None => seed(items, i, period),
        };
        out.push(match avgs {
            Some((g, l)) => TimeValue::from_f64(item.timestamp(), Rsi::rsi_from(g, l)),
            None => TimeValue::empty(item.timestamp()),
        });
    }
    Ok(out)
}
