//! Reference transforms.
//!
//! Each one ships a streaming [`crate::Transform`] impl and a standalone
//! `*_series` function that computes the same thing over a full slice.

mod donchian;
mod ema;
mod quote_part;
mod rsi;
mod sma;

pub use donchian::{donchian_series, Donchian, DonchianResult, DonchianState};
pub use ema::{ema_series, Ema};
pub use quote_part::QuotePart;
pub use rsi::{rsi_series, Rsi, RsiState};
pub use sma::{sma_series, Sma};

use crate::Reusable;

/// Mean of `items[end + 1 - len..=end]`, summed oldest first.
#[inline]
pub(crate) fn window_mean<I: Reusable>(items: &[I], end: usize, len: usize) -> f64 {
    let mut sum = 0.0;
    for item in &items[end + 1 - len..=end] {
        sum += item.value();
    }
    sum / len as f64
}
