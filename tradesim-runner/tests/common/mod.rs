//! Shared fixtures for runner integration tests.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use tradesim_core::{Bar, PriceSeries};

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 1, 2)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + Duration::days(i as i64)
}

/// Bars whose open equals the close, with a one-point range.
pub fn from_closes(closes: &[f64]) -> PriceSeries {
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(ts(i), c, c + 1.0, c - 1.0, c).with_volume(1_000.0))
        .collect();
    PriceSeries::from_bars(bars).unwrap()
}

/// Steady uptrend: 100, 101, 102, ...
pub fn rising(n: usize) -> PriceSeries {
    from_closes(&(0..n).map(|i| 100.0 + i as f64).collect::<Vec<_>>())
}

/// Constant price; moving averages never cross.
pub fn flat(n: usize) -> PriceSeries {
    from_closes(&vec![100.0; n])
}

/// Oscillating price that produces regular moving-average crossovers.
pub fn wave(n: usize) -> PriceSeries {
    from_closes(
        &(0..n)
            .map(|i| 100.0 + 10.0 * (i as f64 * 0.1).sin() + 0.02 * i as f64)
            .collect::<Vec<_>>(),
    )
}

/// The same series as CSV text.
pub fn to_csv(series: &PriceSeries) -> String {
    let view = series.full();
    let mut out = String::from("date,open,high,low,close,volume\n");
    for i in 0..view.len() {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            view.timestamps()[i].format("%Y-%m-%d"),
            view.open()[i],
            view.high()[i],
            view.low()[i],
            view.close()[i],
            view.volume()[i],
        ));
    }
    out
}
