//! Trading AI: weighted-vote consensus over the six strategies, gated by
//! the risk manager, plus a backtest driver. The scoring shape is a
//! weighted sum normalized by total weight with a threshold-based
//! decision; the backtest loop replays candles through a tick loop with
//! Sharpe/drawdown computation.

pub mod backtest;

use serde::Serialize;

use crate::indicators::Candle;
use crate::risk::{RiskAssessment, RiskManager};
use crate::strategies::{self, StrategySignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Decision {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "HOLD")]
    Hold,
    #[serde(rename = "SELL")]
    Sell,
}

impl Decision {
    pub fn signal(self) -> i8 {
        match self {
            Decision::Buy => 1,
            Decision::Hold => 0,
            Decision::Sell => -1,
        }
    }

    /// 3-trit glyph: BUY=△, HOLD=○, SELL=▽.
    pub fn trit(self) -> char {
        match self {
            Decision::Buy => '△',
            Decision::Hold => '○',
            Decision::Sell => '▽',
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsensusResult {
    pub score: f64,
    pub avg_confidence: f64,
    pub decision: Decision,
    pub strategies: Vec<StrategySignal>,
    pub risk: RiskAssessment,
}

/// Run the full consensus pipeline: strategies -> weighted vote -> risk gate.
pub fn analyze(
    candles: &[Candle],
    risk: &RiskManager,
    risk_key: &str,
    price: f64,
    balance: f64,
) -> ConsensusResult {
    let signals = strategies::run_all(candles);
    let contributors: Vec<&StrategySignal> =
        signals.iter().filter(|s| s.confidence > 0.0).collect();

    let weighted_sum: f64 = contributors
        .iter()
        .map(|s| s.signal as f64 * s.weight * s.confidence)
        .sum();
    let total_weight: f64 = contributors.iter().map(|s| s.weight * s.confidence).sum();

    let score = if total_weight > 0.0 {
        weighted_sum / total_weight
    } else {
        0.0
    };
    let avg_confidence = if contributors.is_empty() {
        0.0
    } else {
        contributors.iter().map(|s| s.confidence).sum::<f64>() / contributors.len() as f64
    };

    let mut decision = if score > 0.3 {
        Decision::Buy
    } else if score < -0.3 {
        Decision::Sell
    } else {
        Decision::Hold
    };

    let risk_assessment = risk.evaluate(risk_key, price, balance);

    if !risk_assessment.allowed && decision != Decision::Hold {
        decision = Decision::Hold;
    }
    let forced_exit = risk_assessment
        .risks
        .iter()
        .any(|r| matches!(r, crate::risk::RiskFlag::StopLoss | crate::risk::RiskFlag::TakeProfit));
    if forced_exit {
        decision = Decision::Sell;
    }

    ConsensusResult {
        score,
        avg_confidence,
        decision,
        strategies: signals,
        risk: risk_assessment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskParams;

    fn make_signals(vals: &[(i8, f64)]) -> Vec<StrategySignal> {
        vals.iter()
            .enumerate()
            .map(|(i, &(signal, confidence))| StrategySignal {
                name: Box::leak(format!("s{i}").into_boxed_str()),
                weight: 1.0,
                signal,
                confidence,
                reason: String::new(),
            })
            .collect()
    }

    fn score_of(signals: &[StrategySignal]) -> f64 {
        let weighted_sum: f64 = signals.iter().map(|s| s.signal as f64 * s.weight * s.confidence).sum();
        let total_weight: f64 = signals.iter().map(|s| s.weight * s.confidence).sum();
        if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            0.0
        }
    }

    #[test]
    fn unanimous_buy_scores_plus_one() {
        let signals = make_signals(&[(1, 1.0); 6]);
        assert!((score_of(&signals) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unanimous_sell_scores_minus_one() {
        let signals = make_signals(&[(-1, 1.0); 6]);
        assert!((score_of(&signals) + 1.0).abs() < 1e-9);
    }

    #[test]
    fn balanced_votes_hold() {
        let signals = make_signals(&[(1, 1.0), (1, 1.0), (1, 1.0), (-1, 1.0), (-1, 1.0), (-1, 1.0)]);
        assert!(score_of(&signals).abs() < 0.3);
    }

    #[test]
    fn risk_block_forces_hold() {
        let rm = RiskManager::new(RiskParams {
            max_daily_trades: 0,
            ..Default::default()
        });
        // Craft candles that would otherwise trend bullish.
        let prices: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 2.0).collect();
        let candles: Vec<Candle> = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle::new(i as i64, p, p, p, p, 1000.0, i as i64))
            .collect();
        let result = analyze(&candles, &rm, "acct:BTCUSDT", *prices.last().unwrap(), 1000.0);
        assert_eq!(result.decision, Decision::Hold);
    }
}
