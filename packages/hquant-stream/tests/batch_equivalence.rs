use hquant_stream::indicators::{
    donchian_series, ema_series, rsi_series, sma_series, Donchian, DonchianResult, Ema, QuotePart,
    Rsi, Sma,
};
use hquant_stream::{Field, NodeHandle, Pipeline, Quote, TimeValue, Transform};
use proptest::prelude::*;

mod common;
use common::{bar, ops, sample_quotes, Model, Op, STEP_MS};

struct Graph {
    ema: NodeHandle<TimeValue>,
    ema_sma: NodeHandle<TimeValue>,
    ema_rsi: NodeHandle<TimeValue>,
    rsi: NodeHandle<TimeValue>,
    donchian: NodeHandle<DonchianResult>,
    hl2: NodeHandle<TimeValue>,
    hl2_ema: NodeHandle<TimeValue>,
}

fn graph(p: &mut Pipeline<Quote>) -> Graph {
    let src = p.source();
    let ema = p.subscribe(src, Ema::new(3)).unwrap();
    let ema_sma = p.subscribe(ema, Sma::new(2)).unwrap();
    let ema_rsi = p.subscribe(ema, Rsi::new(3)).unwrap();
    let rsi = p.subscribe(src, Rsi::new(4)).unwrap();
    let donchian = p.subscribe(src, Donchian::new(3)).unwrap();
    let hl2 = p.subscribe(src, QuotePart::new(Field::Hl2)).unwrap();
    let hl2_ema = p.subscribe(hl2, Ema::new(2)).unwrap();
    Graph {
        ema,
        ema_sma,
        ema_rsi,
        rsi,
        donchian,
        hl2,
        hl2_ema,
    }
}

/// Every node against a from-scratch batch run over the source contents.
fn assert_matches_batch(p: &Pipeline<Quote>, g: &Graph, quotes: &[Quote]) {
    assert_eq!(p.quotes(), quotes);

    let ema = ema_series(quotes, 3).unwrap();
    assert_eq!(p.results(g.ema).unwrap(), ema.as_slice());
    assert_eq!(p.results(g.ema_sma).unwrap(), sma_series(&ema, 2).unwrap().as_slice());
    assert_eq!(p.results(g.ema_rsi).unwrap(), rsi_series(&ema, 3).unwrap().as_slice());
    assert_eq!(p.results(g.rsi).unwrap(), rsi_series(quotes, 4).unwrap().as_slice());
    assert_eq!(
        p.results(g.donchian).unwrap(),
        donchian_series(quotes, 3).unwrap().as_slice()
    );
    let hl2 = QuotePart::new(Field::Hl2).batch(quotes);
    assert_eq!(p.results(g.hl2).unwrap(), hl2.as_slice());
    assert_eq!(p.results(g.hl2_ema).unwrap(), ema_series(&hl2, 2).unwrap().as_slice());
}

fn apply(p: &mut Pipeline<Quote>, model: &mut Model, op: Op) {
    match op {
        Op::Add { slot, price } => {
            let q = bar(slot * STEP_MS, price);
            p.add(q).unwrap();
            model.upsert(q);
        }
        Op::Insert { slot, price } => {
            let q = bar(slot * STEP_MS, price);
            p.insert(q).unwrap();
            model.upsert(q);
        }
        Op::Remove { pick } => {
            if let Some(q) = model.pick(pick) {
                p.remove(q.timestamp).unwrap();
                model.remove(q.timestamp);
            }
        }
        Op::Update { pick, price } => {
            if let Some(q) = model.pick(pick) {
                let q = bar(q.timestamp, price);
                p.add(q).unwrap();
                model.upsert(q);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_interleaving_matches_batch(ops in ops(60)) {
        let mut p = Pipeline::new();
        let g = graph(&mut p);
        let mut model = Model::default();
        for op in ops {
            apply(&mut p, &mut model, op);
        }
        assert_matches_batch(&p, &g, &model.quotes);
    }

    #[test]
    fn prop_every_step_matches_batch(ops in ops(25)) {
        let mut p = Pipeline::new();
        let g = graph(&mut p);
        let mut model = Model::default();
        for op in ops {
            apply(&mut p, &mut model, op);
            assert_matches_batch(&p, &g, &model.quotes);
        }
    }
}

#[test]
fn append_remove_append_is_idempotent() {
    let quotes = sample_quotes(30);

    let mut straight = Pipeline::new();
    let gs = graph(&mut straight);
    straight.add_batch(quotes.clone()).unwrap();

    for victim in [29usize, 12, 0] {
        let mut p = Pipeline::new();
        let g = graph(&mut p);
        p.add_batch(quotes.clone()).unwrap();
        p.remove(quotes[victim].timestamp).unwrap();
        p.add(quotes[victim]).unwrap();

        assert_eq!(p.results(g.ema).unwrap(), straight.results(gs.ema).unwrap());
        assert_eq!(p.results(g.ema_sma).unwrap(), straight.results(gs.ema_sma).unwrap());
        assert_eq!(p.results(g.rsi).unwrap(), straight.results(gs.rsi).unwrap());
        assert_eq!(p.results(g.donchian).unwrap(), straight.results(gs.donchian).unwrap());
        assert_matches_batch(&p, &g, &quotes);
    }
}

#[test]
fn late_arrival_only_touches_the_tail() {
    let quotes = sample_quotes(40);
    let late = 25;

    let mut p = Pipeline::new();
    let g = graph(&mut p);
    for (i, q) in quotes.iter().enumerate() {
        if i != late {
            p.add(*q).unwrap();
        }
    }
    let ema_before = p.results(g.ema).unwrap().to_vec();
    let chain_before = p.results(g.ema_rsi).unwrap().to_vec();
    let don_before = p.results(g.donchian).unwrap().to_vec();

    p.add(quotes[late]).unwrap();

    assert_eq!(&p.results(g.ema).unwrap()[..late], &ema_before[..late]);
    assert_eq!(&p.results(g.ema_rsi).unwrap()[..late], &chain_before[..late]);
    assert_eq!(&p.results(g.donchian).unwrap()[..late], &don_before[..late]);
    assert_ne!(&p.results(g.ema).unwrap()[late..], &ema_before[late..]);
    assert_matches_batch(&p, &g, &quotes);
}

fn first_valid(xs: &[TimeValue]) -> Option<usize> {
    xs.iter().position(|x| x.value.is_some())
}

#[test]
fn warmup_parity_after_mutations_inside_warmup() {
    let mut quotes = sample_quotes(14);
    let mut p = Pipeline::new();
    let ema = p.subscribe(p.source(), Ema::new(5)).unwrap();
    let rsi = p.subscribe(p.source(), Rsi::new(5)).unwrap();
    p.add_batch(quotes.clone()).unwrap();

    assert_eq!(first_valid(p.results(ema).unwrap()), Some(4));
    assert_eq!(first_valid(p.results(rsi).unwrap()), Some(5));

    let check = |p: &Pipeline<Quote>, quotes: &[Quote]| {
        let want_ema = ema_series(quotes, 5).unwrap();
        let want_rsi = rsi_series(quotes, 5).unwrap();
        assert_eq!(p.results(ema).unwrap(), want_ema.as_slice());
        assert_eq!(p.results(rsi).unwrap(), want_rsi.as_slice());
        assert_eq!(first_valid(p.results(ema).unwrap()), first_valid(&want_ema));
        assert_eq!(first_valid(p.results(rsi).unwrap()), first_valid(&want_rsi));
    };

    // Removal inside the warmup window shifts the first valid index's input.
    let removed = quotes.remove(2);
    p.remove(removed.timestamp).unwrap();
    check(&p, &quotes);

    quotes.insert(2, removed);
    p.insert(removed).unwrap();
    check(&p, &quotes);

    quotes[0] = bar(quotes[0].timestamp, 1.0);
    p.add(quotes[0]).unwrap();
    check(&p, &quotes);

    p.remove_at(0).unwrap();
    quotes.remove(0);
    check(&p, &quotes);
}

#[test]
fn late_subscriber_on_chain_matches_batch() {
    let quotes = sample_quotes(25);
    let mut p = Pipeline::new();
    let ema = p.subscribe(p.source(), Ema::new(4)).unwrap();
    p.add_batch(quotes.clone()).unwrap();
    let sma = p.subscribe(ema, Sma::new(3)).unwrap();
    p.remove(quotes[10].timestamp).unwrap();

    let mut rest = quotes.clone();
    rest.remove(10);
    let want = sma_series(&ema_series(&rest, 4).unwrap(), 3).unwrap();
    assert_eq!(p.results(sma).unwrap(), want.as_slice());

    p.rebuild(p.source()).unwrap();
    assert_eq!(p.results(sma).unwrap(), want.as_slice());
}
