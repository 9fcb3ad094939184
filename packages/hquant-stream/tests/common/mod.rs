#![allow(dead_code)]

use hquant_stream::Quote;
use proptest::prelude::*;

pub const STEP_MS: i64 = 60_000;

/// Bar with a little spread around `close` so Donchian bands differ.
pub fn bar(ts: i64, close: f64) -> Quote {
    Quote::new(ts, close, close + 0.5, close - 0.25, close, 1.0)
}

/// Deterministic wavy series, one bar per minute.
pub fn sample_quotes(n: usize) -> Vec<Quote> {
    (0..n)
        .map(|i| bar(i as i64 * STEP_MS, 100.0 + (i as f64 * 0.37).sin() * 4.0 + i as f64 * 0.05))
        .collect()
}

/// One root mutation.
#[derive(Debug, Clone, Copy)]
pub enum Op {
    Add { slot: i64, price: f64 },
    Insert { slot: i64, price: f64 },
    Remove { pick: usize },
    Update { pick: usize, price: f64 },
}

fn price() -> impl Strategy<Value = f64> {
    (1u32..800).prop_map(|x| 50.0 + x as f64 / 8.0)
}

pub fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0i64..80, price()).prop_map(|(slot, price)| Op::Add { slot, price }),
        2 => (0i64..80, price()).prop_map(|(slot, price)| Op::Insert { slot, price }),
        1 => any::<usize>().prop_map(|pick| Op::Remove { pick }),
        1 => (any::<usize>(), price()).prop_map(|(pick, price)| Op::Update { pick, price }),
    ]
}

pub fn ops(max: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 1..max)
}

/// Sorted-vector reference for the source contents.
#[derive(Debug, Default)]
pub struct Model {
    pub quotes: Vec<Quote>,
}

impl Model {
    pub fn upsert(&mut self, q: Quote) {
        match self.quotes.binary_search_by_key(&q.timestamp, |x| x.timestamp) {
            Ok(i) => self.quotes[i] = q,
            Err(i) => self.quotes.insert(i, q),
        }
    }

    pub fn pick(&self, pick: usize) -> Option<Quote> {
        (!self.quotes.is_empty()).then(|| self.quotes[pick % self.quotes.len()])
    }

    pub fn remove(&mut self, ts: i64) {
        self.quotes.retain(|q| q.timestamp != ts);
    }
}
