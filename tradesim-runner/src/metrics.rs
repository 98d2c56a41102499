//! Performance statistics: pure functions over an equity curve and trade list.
//!
//! Ratios that would divide by zero produce `NaN` inside the individual
//! functions; [`Stats::compute`] normalizes every `NaN` to 0 before reporting.
//! Percentages are scaled by 100, fractions are not.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tradesim_core::{PriceSeries, RunResult, Trade};

/// Summary statistics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub bars: usize,
    pub exposure_time_pct: f64,
    pub equity_final: f64,
    pub equity_peak: f64,
    pub return_pct: f64,
    pub buy_and_hold_return_pct: f64,
    /// Deepest drawdown, reported as a negative percentage.
    pub max_drawdown_pct: f64,
    pub avg_drawdown_pct: f64,
    pub max_drawdown_duration: f64,
    pub avg_drawdown_duration: f64,
    pub trades: usize,
    pub win_rate_pct: f64,
    pub best_trade_pct: f64,
    pub worst_trade_pct: f64,
    /// Geometric mean of per-trade returns.
    pub avg_trade_pct: f64,
    pub max_trade_duration: f64,
    pub avg_trade_duration: f64,
    pub profit_factor: f64,
    pub expectancy_pct: f64,
    pub sqn: f64,
    pub kelly_criterion: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub ambiguous_fills: usize,
}

impl Stats {
    /// Compute all statistics for `run` over `data`.
    ///
    /// Trades still open at the end (when trades are not finalized) count
    /// toward exposure but not toward the trade statistics.
    pub fn compute(data: &PriceSeries, run: &RunResult) -> Self {
        let view = data.full();
        let equity = &run.equity_curve;
        let closes = view.close();
        let n = equity.len();

        let dd = drawdown_series(equity);
        let max_dd = dd.iter().copied().fold(0.0_f64, f64::max);
        let episodes = drawdown_episodes(&dd);
        let durations: Vec<f64> = episodes.iter().map(|e| e.duration as f64).collect();
        let peaks: Vec<f64> = episodes.iter().map(|e| e.depth).collect();

        let returns: Vec<f64> = run.trades.iter().map(|t| t.pl_pct(0.0)).collect();
        let pls: Vec<f64> = run.trades.iter().map(|t| t.pl(0.0)).collect();
        let trade_durations: Vec<f64> = run
            .trades
            .iter()
            .map(|t| t.exit_bar().unwrap_or(t.entry_bar()).saturating_sub(t.entry_bar()) as f64)
            .collect();

        let raw = Self {
            start: view.timestamps().first().copied(),
            end: view.timestamps().last().copied(),
            bars: n,
            exposure_time_pct: exposure_time(&run.trades, &run.open_trades, n) * 100.0,
            equity_final: equity.last().copied().unwrap_or(f64::NAN),
            equity_peak: equity.iter().copied().fold(f64::NAN, f64::max),
            return_pct: total_return(equity) * 100.0,
            buy_and_hold_return_pct: total_return(closes) * 100.0,
            max_drawdown_pct: -max_dd * 100.0,
            avg_drawdown_pct: -mean(&peaks) * 100.0,
            max_drawdown_duration: durations.iter().copied().fold(f64::NAN, f64::max),
            avg_drawdown_duration: mean(&durations),
            trades: run.trades.len(),
            win_rate_pct: win_rate(&pls) * 100.0,
            best_trade_pct: returns.iter().copied().fold(f64::NAN, f64::max) * 100.0,
            worst_trade_pct: returns.iter().copied().fold(f64::NAN, f64::min) * 100.0,
            avg_trade_pct: geometric_mean(&returns) * 100.0,
            max_trade_duration: trade_durations.iter().copied().fold(f64::NAN, f64::max),
            avg_trade_duration: mean(&trade_durations),
            profit_factor: profit_factor(&returns),
            expectancy_pct: mean(&returns) * 100.0,
            sqn: sqn(&pls),
            kelly_criterion: kelly(&pls),
            sharpe: sharpe_ratio(&returns),
            sortino: sortino_ratio(&returns),
            calmar: calmar_ratio(&returns, max_dd),
            ambiguous_fills: run.ambiguous_fills,
        };
        raw.nan_to_zero()
    }

    fn nan_to_zero(mut self) -> Self {
        for v in [
            &mut self.exposure_time_pct,
            &mut self.equity_final,
            &mut self.equity_peak,
            &mut self.return_pct,
            &mut self.buy_and_hold_return_pct,
            &mut self.max_drawdown_pct,
            &mut self.avg_drawdown_pct,
            &mut self.max_drawdown_duration,
            &mut self.avg_drawdown_duration,
            &mut self.win_rate_pct,
            &mut self.best_trade_pct,
            &mut self.worst_trade_pct,
            &mut self.avg_trade_pct,
            &mut self.max_trade_duration,
            &mut self.avg_trade_duration,
            &mut self.profit_factor,
            &mut self.expectancy_pct,
            &mut self.sqn,
            &mut self.kelly_criterion,
            &mut self.sharpe,
            &mut self.sortino,
            &mut self.calmar,
        ] {
            if v.is_nan() {
                *v = 0.0;
            }
        }
        self
    }

    /// Label/value rows in display order, for printing.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let ts = |t: Option<NaiveDateTime>| t.map(|t| t.to_string()).unwrap_or_default();
        vec![
            ("Start", ts(self.start)),
            ("End", ts(self.end)),
            ("Bars", self.bars.to_string()),
            ("Exposure Time [%]", format!("{:.2}", self.exposure_time_pct)),
            ("Equity Final [$]", format!("{:.2}", self.equity_final)),
            ("Equity Peak [$]", format!("{:.2}", self.equity_peak)),
            ("Return [%]", format!("{:.2}", self.return_pct)),
            ("Buy & Hold Return [%]", format!("{:.2}", self.buy_and_hold_return_pct)),
            ("Max. Drawdown [%]", format!("{:.2}", self.max_drawdown_pct)),
            ("Avg. Drawdown [%]", format!("{:.2}", self.avg_drawdown_pct)),
            ("Max. Drawdown Duration [bars]", format!("{:.0}", self.max_drawdown_duration)),
            ("Avg. Drawdown Duration [bars]", format!("{:.1}", self.avg_drawdown_duration)),
            ("# Trades", self.trades.to_string()),
            ("Win Rate [%]", format!("{:.2}", self.win_rate_pct)),
            ("Best Trade [%]", format!("{:.2}", self.best_trade_pct)),
            ("Worst Trade [%]", format!("{:.2}", self.worst_trade_pct)),
            ("Avg. Trade [%]", format!("{:.2}", self.avg_trade_pct)),
            ("Max. Trade Duration [bars]", format!("{:.0}", self.max_trade_duration)),
            ("Avg. Trade Duration [bars]", format!("{:.1}", self.avg_trade_duration)),
            ("Profit Factor", format!("{:.3}", self.profit_factor)),
            ("Expectancy [%]", format!("{:.2}", self.expectancy_pct)),
            ("SQN", format!("{:.3}", self.sqn)),
            ("Kelly Criterion", format!("{:.4}", self.kelly_criterion)),
            ("Sharpe Ratio", format!("{:.3}", self.sharpe)),
            ("Sortino Ratio", format!("{:.3}", self.sortino)),
            ("Calmar Ratio", format!("{:.3}", self.calmar)),
            ("Ambiguous Fills", self.ambiguous_fills.to_string()),
        ]
    }
}

// ─── Equity metrics ─────────────────────────────────────────────────

/// Fractional change from first to last value; `NaN` if undefined.
pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first,
        _ => f64::NAN,
    }
}

/// Drawdown at each bar: `1 - equity / running_max(equity)`, in [0, 1].
pub fn drawdown_series(equity: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&eq| {
            peak = peak.max(eq);
            if peak > 0.0 {
                1.0 - eq / peak
            } else {
                0.0
            }
        })
        .collect()
}

/// One stretch of bars spent below a previous equity peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawdownEpisode {
    /// Bar of the peak the episode started from.
    pub start: usize,
    /// Bar where equity recovered to the peak, or the last bar.
    pub end: usize,
    pub duration: usize,
    /// Deepest drawdown within the episode, as a fraction.
    pub depth: f64,
}

/// Drawdown episodes bounded by bars at zero drawdown (or the last bar).
pub fn drawdown_episodes(dd: &[f64]) -> Vec<DrawdownEpisode> {
    let Some(last) = dd.len().checked_sub(1) else {
        return Vec::new();
    };
    let mut bounds: Vec<usize> = dd
        .iter()
        .enumerate()
        .filter(|(_, &v)| v == 0.0)
        .map(|(i, _)| i)
        .collect();
    if bounds.last() != Some(&last) {
        bounds.push(last);
    }

    bounds
        .windows(2)
        .filter_map(|w| {
            let depth = dd[w[0]..=w[1]].iter().copied().fold(0.0, f64::max);
            (depth > 0.0).then_some(DrawdownEpisode {
                start: w[0],
                end: w[1],
                duration: w[1] - w[0],
                depth,
            })
        })
        .collect()
}

/// Fraction of bars with at least one open trade, entry and exit bars included.
pub fn exposure_time(closed: &[Trade], open: &[Trade], bars: usize) -> f64 {
    if bars == 0 {
        return f64::NAN;
    }
    let mut in_market = vec![false; bars];
    let last = bars - 1;
    let spans = closed
        .iter()
        .map(|t| (t.entry_bar(), t.exit_bar().unwrap_or(last)))
        .chain(open.iter().map(|t| (t.entry_bar(), last)));
    for (entry, exit) in spans {
        let exit = exit.min(last);
        if entry <= exit {
            in_market[entry..=exit].fill(true);
        }
    }
    in_market.iter().filter(|&&b| b).count() as f64 / bars as f64
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Fraction of trades with positive P&L.
pub fn win_rate(pls: &[f64]) -> f64 {
    if pls.is_empty() {
        return f64::NAN;
    }
    pls.iter().filter(|&&p| p > 0.0).count() as f64 / pls.len() as f64
}

/// Geometric mean return; 0 if any trade lost 100% or more.
pub fn geometric_mean(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    if returns.iter().any(|r| 1.0 + r <= 0.0) {
        return 0.0;
    }
    let log_sum: f64 = returns.iter().map(|r| (1.0 + r).ln()).sum();
    (log_sum / returns.len() as f64).exp() - 1.0
}

/// Sum of positive returns over the absolute sum of negative returns.
pub fn profit_factor(returns: &[f64]) -> f64 {
    let gains: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
    let losses: f64 = returns.iter().filter(|&&r| r < 0.0).sum::<f64>().abs();
    divide(gains, losses)
}

/// System Quality Number: `sqrt(n) * mean(pl) / std(pl)`.
pub fn sqn(pls: &[f64]) -> f64 {
    if pls.is_empty() {
        return f64::NAN;
    }
    (pls.len() as f64).sqrt() * divide(mean(pls), std_dev(pls))
}

/// Kelly criterion: `W - (1 - W) / (avg win / avg loss)`.
pub fn kelly(pls: &[f64]) -> f64 {
    let wins: Vec<f64> = pls.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pls.iter().copied().filter(|&p| p < 0.0).collect();
    let w = win_rate(pls);
    let payoff = divide(mean(&wins), mean(&losses).abs());
    w - (1.0 - w) / payoff
}

/// Mean per-trade return over its sample standard deviation.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    divide(mean(returns), std_dev(returns))
}

/// Mean per-trade return over downside deviation.
pub fn sortino_ratio(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return f64::NAN;
    }
    let downside =
        (returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / returns.len() as f64).sqrt();
    divide(mean(returns), downside)
}

/// Mean per-trade return over the maximum drawdown fraction.
pub fn calmar_ratio(returns: &[f64], max_drawdown: f64) -> f64 {
    divide(mean(returns), max_drawdown)
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (`ddof = 1`).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn divide(num: f64, den: f64) -> f64 {
    if den == 0.0 || den.is_nan() {
        f64::NAN
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "expected {b}, got {a}");
    }

    // ── Equity ──

    #[test]
    fn total_return_basic() {
        approx(total_return(&[100.0, 90.0, 110.0]), 0.1);
        assert!(total_return(&[]).is_nan());
        assert!(total_return(&[0.0, 1.0]).is_nan());
    }

    #[test]
    fn drawdown_series_against_running_max() {
        let dd = drawdown_series(&[100.0, 120.0, 90.0, 120.0, 60.0]);
        approx(dd[0], 0.0);
        approx(dd[1], 0.0);
        approx(dd[2], 0.25);
        approx(dd[3], 0.0);
        approx(dd[4], 0.5);
    }

    #[test]
    fn episodes_bounded_by_recoveries_and_last_bar() {
        let dd = drawdown_series(&[100.0, 90.0, 80.0, 100.0, 100.0, 95.0, 97.0]);
        let episodes = drawdown_episodes(&dd);

        assert_eq!(episodes.len(), 2);
        assert_eq!((episodes[0].start, episodes[0].end, episodes[0].duration), (0, 3, 3));
        approx(episodes[0].depth, 0.2);
        assert_eq!((episodes[1].start, episodes[1].end, episodes[1].duration), (4, 6, 2));
        approx(episodes[1].depth, 0.05);
    }

    #[test]
    fn no_episodes_for_rising_equity() {
        let dd = drawdown_series(&[1.0, 2.0, 3.0]);
        assert!(drawdown_episodes(&dd).is_empty());
        assert!(drawdown_episodes(&[]).is_empty());
    }

    #[test]
    fn drawdown_on_the_last_bar_only_is_an_episode() {
        let dd = drawdown_series(&[100.0, 110.0, 99.0]);
        let episodes = drawdown_episodes(&dd);
        assert_eq!(episodes.len(), 1);
        assert_eq!((episodes[0].start, episodes[0].end, episodes[0].duration), (1, 2, 1));
        approx(episodes[0].depth, 0.1);
    }

    // ── Trades ──

    #[test]
    fn win_rate_counts_strict_gains() {
        approx(win_rate(&[1.0, -1.0, 0.0, 2.0]), 0.5);
        assert!(win_rate(&[]).is_nan());
    }

    #[test]
    fn geometric_mean_of_returns() {
        approx(geometric_mean(&[0.1, -0.1]), (1.1_f64 * 0.9).sqrt() - 1.0);
        assert_eq!(geometric_mean(&[0.5, -1.0]), 0.0);
        assert!(geometric_mean(&[]).is_nan());
    }

    #[test]
    fn profit_factor_on_returns() {
        approx(profit_factor(&[0.2, 0.1, -0.1]), 3.0);
        assert!(profit_factor(&[0.2, 0.1]).is_nan());
    }

    #[test]
    fn sqn_matches_definition() {
        let pls = [10.0, -5.0, 15.0, 0.0];
        let m = 5.0;
        let sd = ((25.0 + 100.0 + 100.0 + 25.0) / 3.0_f64).sqrt();
        approx(sqn(&pls), 2.0 * m / sd);
    }

    #[test]
    fn sqn_without_trades_is_nan() {
        assert!(sqn(&[]).is_nan());
        assert!(sqn(&[5.0]).is_nan());
    }

    #[test]
    fn kelly_from_payoff_ratio() {
        // W = 0.5, avg win 20, avg loss 10 → 0.5 - 0.5 / 2
        approx(kelly(&[20.0, -10.0]), 0.25);
        assert!(kelly(&[5.0, 5.0]).is_nan());
    }

    #[test]
    fn per_trade_ratios() {
        let r = [0.1, -0.05, 0.05];
        let m = 0.1 / 3.0;
        approx(sharpe_ratio(&r), m / std_dev(&r));
        approx(sortino_ratio(&r), m / (0.0025_f64 / 3.0).sqrt());
        approx(calmar_ratio(&r, 0.2), m / 0.2);
        assert!(calmar_ratio(&r, 0.0).is_nan());
        assert!(sortino_ratio(&[0.1, 0.2]).is_nan());
    }
}
