use hquant_stream::indicators::{ema_series, rsi_series, Donchian, DonchianResult, Ema, QuotePart, Rsi, Sma};
use hquant_stream::{BufferNode, Field, HubConfig, NodeHandle, Pipeline, Quote, TimeValue, Transform};
use proptest::prelude::*;

mod common;
use common::{bar, ops, sample_quotes, Op, STEP_MS};

struct Nodes {
    ema: NodeHandle<TimeValue>,
    ema_sma: NodeHandle<TimeValue>,
    ema_rsi: NodeHandle<TimeValue>,
    rsi: NodeHandle<TimeValue>,
    donchian: NodeHandle<DonchianResult>,
    hl2_ema: NodeHandle<TimeValue>,
}

fn nodes(p: &mut Pipeline<Quote>) -> Nodes {
    let src = p.source();
    let ema = p.subscribe(src, Ema::new(3)).unwrap();
    let hl2 = p.subscribe(src, QuotePart::new(Field::Hl2)).unwrap();
    Nodes {
        ema,
        ema_sma: p.subscribe(ema, Sma::new(2)).unwrap(),
        ema_rsi: p.subscribe(ema, Rsi::new(3)).unwrap(),
        rsi: p.subscribe(src, Rsi::new(4)).unwrap(),
        donchian: p.subscribe(src, Donchian::new(3)).unwrap(),
        hl2_ema: p.subscribe(hl2, Ema::new(2)).unwrap(),
    }
}

fn tail<T>(xs: &[T], n: usize) -> &[T] {
    &xs[xs.len() - n..]
}

/// The capped pipeline's retained window against the same positions of an
/// unbounded run.
fn assert_matches_tail(capped: &Pipeline<Quote>, c: &Nodes, full: &Pipeline<Quote>, f: &Nodes) {
    let n = capped.quotes().len();
    assert_eq!(capped.quotes(), tail(full.quotes(), n));
    assert_eq!(capped.results(c.ema).unwrap(), tail(full.results(f.ema).unwrap(), n));
    assert_eq!(capped.results(c.ema_sma).unwrap(), tail(full.results(f.ema_sma).unwrap(), n));
    assert_eq!(capped.results(c.ema_rsi).unwrap(), tail(full.results(f.ema_rsi).unwrap(), n));
    assert_eq!(capped.results(c.rsi).unwrap(), tail(full.results(f.rsi).unwrap(), n));
    assert_eq!(
        capped.results(c.donchian).unwrap(),
        tail(full.results(f.donchian).unwrap(), n)
    );
    assert_eq!(capped.results(c.hl2_ema).unwrap(), tail(full.results(f.hl2_ema).unwrap(), n));
}

// Timestamps at or before the newest hidden point never enter a capped source.
fn lands_in_window(p: &Pipeline<Quote>, ts: i64) -> bool {
    let source = p.source_cache();
    source.as_slice()[..source.hidden_len()]
        .last()
        .map_or(true, |q| ts > q.timestamp)
}

fn pick(quotes: &[Quote], pick: usize) -> Option<Quote> {
    (!quotes.is_empty()).then(|| quotes[pick % quotes.len()])
}

fn apply_both(capped: &mut Pipeline<Quote>, full: &mut Pipeline<Quote>, op: Op) {
    match op {
        Op::Add { slot, price } => {
            let q = bar(slot * STEP_MS, price);
            if lands_in_window(capped, q.timestamp) {
                capped.add(q).unwrap();
                full.add(q).unwrap();
            }
        }
        Op::Insert { slot, price } => {
            let q = bar(slot * STEP_MS, price);
            if lands_in_window(capped, q.timestamp) {
                capped.insert(q).unwrap();
                full.insert(q).unwrap();
            }
        }
        Op::Remove { pick: k } => {
            if let Some(q) = pick(capped.quotes(), k) {
                capped.remove(q.timestamp).unwrap();
                full.remove(q.timestamp).unwrap();
            }
        }
        Op::Update { pick: k, price } => {
            if let Some(q) = pick(capped.quotes(), k) {
                let q = bar(q.timestamp, price);
                capped.add(q).unwrap();
                full.add(q).unwrap();
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_capped_interleaving_matches_unbounded_tail(cap in 2usize..12, ops in ops(80)) {
        let mut capped = Pipeline::with_config(HubConfig::with_max_cache_size(cap)).unwrap();
        let c = nodes(&mut capped);
        let mut full = Pipeline::new();
        let f = nodes(&mut full);
        for op in ops {
            apply_both(&mut capped, &mut full, op);
            prop_assert!(capped.quotes().len() <= cap);
            assert_matches_tail(&capped, &c, &full, &f);
        }
    }
}

#[test]
fn late_arrivals_after_pruning_match_unbounded_tail() {
    let quotes = sample_quotes(60);
    let mut capped = Pipeline::with_config(HubConfig::with_max_cache_size(15)).unwrap();
    let c = nodes(&mut capped);
    let mut full = Pipeline::new();
    let f = nodes(&mut full);

    // Every third bar is held back and delivered late.
    for (i, q) in quotes.iter().enumerate() {
        if i % 3 != 1 {
            capped.add(*q).unwrap();
            full.add(*q).unwrap();
        }
    }
    for q in quotes.iter().skip(1).step_by(3) {
        if lands_in_window(&capped, q.timestamp) {
            capped.add(*q).unwrap();
            full.add(*q).unwrap();
        } else {
            let before = capped.results(c.ema).unwrap().to_vec();
            capped.add(*q).unwrap();
            assert_eq!(capped.results(c.ema).unwrap(), before.as_slice());
        }
        assert_matches_tail(&capped, &c, &full, &f);
    }
}

#[test]
fn buffer_list_keeps_last_k_of_unbounded_run() {
    let quotes = sample_quotes(200);
    let mut unbounded = BufferNode::wma(7).unwrap();
    let mut capped = BufferNode::wma(7).unwrap();
    capped.set_max_list_size(25).unwrap();

    for q in &quotes {
        unbounded.add_reusable(q).unwrap();
        capped.add_reusable(q).unwrap();
        assert!(capped.len() <= 25);
    }
    assert_eq!(capped.len(), 25);
    let tail: Vec<_> = unbounded.results().iter().skip(200 - 25).copied().collect();
    let kept: Vec<_> = capped.results().iter().copied().collect();
    assert_eq!(kept, tail);
}

#[test]
fn pipeline_cap_keeps_last_k_of_unbounded_run() {
    let quotes = sample_quotes(150);
    let cap = 40;

    let mut p = Pipeline::with_config(HubConfig::with_max_cache_size(cap)).unwrap();
    let ema = p.subscribe(p.source(), Ema::new(10)).unwrap();
    let rsi = p.subscribe(ema, Rsi::new(5)).unwrap();
    let don = p.subscribe(p.source(), Donchian::new(12)).unwrap();
    for q in &quotes {
        p.add(*q).unwrap();
        assert!(p.quotes().len() <= cap);
    }

    let full_ema = ema_series(&quotes, 10).unwrap();
    let full_rsi = rsi_series(&full_ema, 5).unwrap();
    let full_don = Donchian::new(12).batch(&quotes);
    let from = quotes.len() - cap;
    assert_eq!(p.quotes(), &quotes[from..]);
    assert_eq!(p.results(ema).unwrap(), &full_ema[from..]);
    assert_eq!(p.results(rsi).unwrap(), &full_rsi[from..]);
    assert_eq!(p.results(don).unwrap(), &full_don[from..]);
}

#[test]
fn cap_from_json_config() {
    let config = HubConfig::from_json(r#"{ "max_cache_size": 3 }"#).unwrap();
    let mut p = Pipeline::with_config(config).unwrap();
    p.add_batch(sample_quotes(10)).unwrap();
    assert_eq!(p.quotes().len(), 3);
}
