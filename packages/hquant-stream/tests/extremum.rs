use hquant_stream::{RollingMax, RollingMin};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn naive_max(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().filter(|v| !v.is_nan()).reduce(f64::max)
}

fn naive_min(xs: &[f64]) -> Option<f64> {
    xs.iter().copied().filter(|v| !v.is_nan()).reduce(f64::min)
}

#[test]
fn random_values_match_naive_window_scan() {
    let mut rng = StdRng::seed_from_u64(7);
    for window in [1usize, 2, 5, 17, 64] {
        let values: Vec<f64> = (0..1_000).map(|_| rng.gen_range(-100.0..100.0)).collect();
        let mut hi = RollingMax::new(window).unwrap();
        let mut lo = RollingMin::new(window).unwrap();
        for (i, &v) in values.iter().enumerate() {
            hi.add(v);
            lo.add(v);
            let start = (i + 1).saturating_sub(window);
            assert_eq!(hi.max(), naive_max(&values[start..=i]), "window {window} at {i}");
            assert_eq!(lo.min(), naive_min(&values[start..=i]), "window {window} at {i}");
        }
    }
}

#[test]
fn plateaus_and_gaps() {
    let mut rng = StdRng::seed_from_u64(11);
    let window = 8;
    // Small integer range forces many ties; ~10% gaps.
    let values: Vec<f64> = (0..1_000)
        .map(|_| {
            if rng.gen_bool(0.1) {
                f64::NAN
            } else {
                rng.gen_range(0..5) as f64
            }
        })
        .collect();
    let mut hi = RollingMax::new(window).unwrap();
    for (i, &v) in values.iter().enumerate() {
        hi.add(v);
        let start = (i + 1).saturating_sub(window);
        assert_eq!(hi.max(), naive_max(&values[start..=i]));
    }
    assert_eq!(hi.count(), 1_000);
}
