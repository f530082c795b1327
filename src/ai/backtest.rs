//! Backtest driver, walking candles from index 50 and re-running the full
//! consensus analysis on each prefix. Built on a tick loop and Sharpe
//! computation, simplified to a single long/flat position model
//! (10%-notional long on BUY when flat, closed on SELL when long).

use serde::Serialize;

use super::{analyze, Decision};
use crate::indicators::Candle;
use crate::risk::{RiskManager, RiskParams};

const WARMUP: usize = 50;
const NOTIONAL_FRACTION: f64 = 0.10;

#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    pub total_return_pct: f64,
    pub win_rate_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe: f64,
    pub trades: usize,
}

struct OpenTrade {
    entry_price: f64,
    notional: f64,
}

/// Run a backtest over `candles` starting from a capital base of `initial_capital`.
pub fn run(candles: &[Candle], initial_capital: f64) -> BacktestResult {
    if candles.len() <= WARMUP {
        return BacktestResult {
            total_return_pct: 0.0,
            win_rate_pct: 0.0,
            max_drawdown_pct: 0.0,
            sharpe: 0.0,
            trades: 0,
        };
    }

    let risk = RiskManager::new(RiskParams::default());
    let mut cash = initial_capital;
    let mut open: Option<OpenTrade> = None;
    let mut equity_curve: Vec<f64> = vec![initial_capital];
    let mut wins = 0usize;
    let mut trades = 0usize;

    for i in WARMUP..candles.len() {
        let prefix = &candles[..=i];
        let price = prefix.last().unwrap().close;

        let equity_now = cash + open.as_ref().map_or(0.0, |t| t.notional / t.entry_price * price);
        let result = analyze(prefix, &risk, "backtest", price, equity_now);

        match (result.decision, &open) {
            (Decision::Buy, None) => {
                let notional = cash * NOTIONAL_FRACTION;
                cash -= notional;
                open = Some(OpenTrade {
                    entry_price: price,
                    notional,
                });
            }
            (Decision::Sell, Some(trade)) => {
                let proceeds = trade.notional / trade.entry_price * price;
                cash += proceeds;
                trades += 1;
                if proceeds > trade.notional {
                    wins += 1;
                }
                open = None;
            }
            _ => {}
        }

        let mark_to_market =
            cash + open.as_ref().map_or(0.0, |t| t.notional / t.entry_price * price);
        equity_curve.push(mark_to_market);
    }

    // Liquidate any open position at the last close for the final accounting.
    if let Some(trade) = open {
        let last_price = candles.last().unwrap().close;
        cash += trade.notional / trade.entry_price * last_price;
    }

    let total_return_pct = (cash - initial_capital) / initial_capital * 100.0;
    let win_rate_pct = if trades > 0 {
        wins as f64 / trades as f64 * 100.0
    } else {
        0.0
    };

    let mut peak = initial_capital;
    let mut max_drawdown = 0.0;
    for &v in &equity_curve {
        if v > peak {
            peak = v;
        }
        let dd = if peak > 0.0 { (peak - v) / peak } else { 0.0 };
        if dd > max_drawdown {
            max_drawdown = dd;
        }
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();
    let sharpe = sharpe_ratio(&returns);

    BacktestResult {
        total_return_pct,
        win_rate_pct,
        max_drawdown_pct: max_drawdown * 100.0,
        sharpe,
        trades,
    }
}

fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let sd = var.sqrt();
    if sd > 0.0 {
        mean / sd * 252.0_f64.sqrt()
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending_candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 100.0 + i as f64 * 0.5;
                Candle::new(i as i64, p, p * 1.002, p * 0.998, p, 1000.0, i as i64)
            })
            .collect()
    }

    #[test]
    fn short_series_is_a_noop() {
        let candles = trending_candles(10);
        let result = run(&candles, 10_000.0);
        assert_eq!(result.trades, 0);
        assert_eq!(result.total_return_pct, 0.0);
    }

    #[test]
    fn uptrend_backtest_produces_a_finite_result() {
        let candles = trending_candles(150);
        let result = run(&candles, 10_000.0);
        assert!(result.total_return_pct.is_finite());
        assert!(result.max_drawdown_pct >= 0.0);
    }
}
