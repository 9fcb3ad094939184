use hquant_stream::indicators::{Donchian, Ema, Rsi};
use hquant_stream::{BufferNode, HubConfig, Pipeline, Quote};

// A late bar lands in the middle of the history; every node in the chain
// recomputes from that index only.

fn main() {
    let mut hub = Pipeline::with_config(HubConfig::with_max_cache_size(1024)).unwrap();
    let src = hub.source();
    let ema = hub.subscribe(src, Ema::new(20)).unwrap();
    let rsi_of_ema = hub.subscribe(ema, Rsi::new(14)).unwrap();
    let channel = hub.subscribe(src, Donchian::new(20)).unwrap();

    let bars: Vec<Quote> = (0..200)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.1).sin() * 3.0;
            Quote::new(i * 60_000, close, close + 0.5, close - 0.5, close, 1000.0)
        })
        .collect();

    for (i, bar) in bars.iter().enumerate() {
        if i != 150 {
            hub.add(*bar).unwrap();
        }
    }
    println!("before late bar: rsi_last={:?}", hub.results(rsi_of_ema).unwrap().last());

    hub.add(bars[150]).unwrap();
    println!("after late bar:  rsi_last={:?}", hub.results(rsi_of_ema).unwrap().last());
    println!("channel_last={:?}", hub.results(channel).unwrap().last());

    let mut wma = BufferNode::wma(20).unwrap();
    wma.add_batch(&bars).unwrap();
    println!("wma_last={:?}", wma.last());
}
