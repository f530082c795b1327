//! Per-analysis risk gate: a circuit-breaker shape with rolling peak/
//! drawdown tracking and `RwLock<Inner>` per-key state, narrowed to three
//! gates: daily trade cap, rolling-peak drawdown, and advisory stop/take
//! triggers. The executor's separate safety gate (daily cap +
//! consecutive-loss cap + position-size cap against `AutoTradeConfig`)
//! lives in `executor.rs`.

use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionSide {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy)]
pub struct OpenPosition {
    pub side: PositionSide,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RiskFlag {
    DailyCapReached,
    DrawdownExceeded,
    StopLoss,
    TakeProfit,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RiskAssessment {
    pub allowed: bool,
    pub risks: Vec<RiskFlag>,
    pub max_size: f64,
    pub drawdown: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct RiskParams {
    pub max_daily_trades: u32,
    pub max_drawdown_pct: f64,
    pub max_position_size_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            max_daily_trades: 10,
            max_drawdown_pct: 0.15,
            max_position_size_pct: 0.10,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.06,
        }
    }
}

#[derive(Default)]
struct Tracker {
    peak_balance: f64,
    daily_trade_count: u32,
    open_position: Option<OpenPosition>,
}

/// Tracks rolling peak balance, daily trade counts, and open positions keyed
/// by an arbitrary caller-chosen key (typically `(principal_id, symbol)`).
pub struct RiskManager {
    params: RiskParams,
    state: RwLock<HashMap<String, Tracker>>,
}

impl RiskManager {
    pub fn new(params: RiskParams) -> Self {
        Self {
            params,
            state: RwLock::new(HashMap::new()),
        }
    }

    pub fn open_position(&self, key: &str, side: PositionSide, entry_price: f64) {
        let mut state = self.state.write().unwrap();
        let tracker = state.entry(key.to_string()).or_default();
        tracker.open_position = Some(OpenPosition { side, entry_price });
    }

    pub fn close_position(&self, key: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(tracker) = state.get_mut(key) {
            tracker.open_position = None;
        }
    }

    pub fn record_trade(&self, key: &str) {
        let mut state = self.state.write().unwrap();
        state.entry(key.to_string()).or_default().daily_trade_count += 1;
    }

    pub fn reset_daily(&self, key: &str) {
        let mut state = self.state.write().unwrap();
        if let Some(tracker) = state.get_mut(key) {
            tracker.daily_trade_count = 0;
        }
    }

    pub fn reset_all_daily(&self) {
        let mut state = self.state.write().unwrap();
        for tracker in state.values_mut() {
            tracker.daily_trade_count = 0;
        }
    }

    /// Evaluate the gate for `key` given the current market `price` and
    /// account `balance`.
    pub fn evaluate(&self, key: &str, price: f64, balance: f64) -> RiskAssessment {
        let mut state = self.state.write().unwrap();
        let tracker = state.entry(key.to_string()).or_default();

        if tracker.peak_balance <= 0.0 || balance > tracker.peak_balance {
            tracker.peak_balance = balance;
        }

        let drawdown = if tracker.peak_balance > 0.0 {
            (tracker.peak_balance - balance) / tracker.peak_balance
        } else {
            0.0
        };

        let mut risks = Vec::new();
        let mut allowed = true;

        if tracker.daily_trade_count >= self.params.max_daily_trades {
            risks.push(RiskFlag::DailyCapReached);
            allowed = false;
        }

        if drawdown > self.params.max_drawdown_pct {
            risks.push(RiskFlag::DrawdownExceeded);
            allowed = false;
        }

        if let Some(position) = tracker.open_position {
            let pnl_pct = match position.side {
                PositionSide::Long => (price - position.entry_price) / position.entry_price,
                PositionSide::Short => (position.entry_price - price) / position.entry_price,
            };
            if pnl_pct < -self.params.stop_loss_pct {
                risks.push(RiskFlag::StopLoss);
            }
            if pnl_pct > self.params.take_profit_pct {
                risks.push(RiskFlag::TakeProfit);
            }
        }

        let max_size = balance * self.params.max_position_size_pct;

        RiskAssessment {
            allowed,
            risks,
            max_size,
            drawdown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_daily_cap() {
        let rm = RiskManager::new(RiskParams {
            max_daily_trades: 2,
            ..Default::default()
        });
        for _ in 0..2 {
            rm.record_trade("acct:BTCUSDT");
        }
        let assessment = rm.evaluate("acct:BTCUSDT", 100.0, 1000.0);
        assert!(!assessment.allowed);
        assert!(assessment.risks.contains(&RiskFlag::DailyCapReached));
    }

    #[test]
    fn drawdown_blocks_past_threshold() {
        let rm = RiskManager::new(RiskParams::default());
        rm.evaluate("acct:BTCUSDT", 100.0, 1000.0);
        let assessment = rm.evaluate("acct:BTCUSDT", 100.0, 800.0);
        assert!(!assessment.allowed);
        assert!(assessment.risks.contains(&RiskFlag::DrawdownExceeded));
        assert!((assessment.drawdown - 0.2).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_flag_is_advisory_not_blocking() {
        let rm = RiskManager::new(RiskParams::default());
        rm.evaluate("acct:BTCUSDT", 100.0, 1000.0);
        rm.open_position("acct:BTCUSDT", PositionSide::Long, 100.0);
        let assessment = rm.evaluate("acct:BTCUSDT", 90.0, 1000.0);
        assert!(assessment.allowed);
        assert!(assessment.risks.contains(&RiskFlag::StopLoss));
    }

    #[test]
    fn max_size_scales_with_balance() {
        let rm = RiskManager::new(RiskParams::default());
        let assessment = rm.evaluate("acct:BTCUSDT", 100.0, 5000.0);
        assert!((assessment.max_size - 500.0).abs() < 1e-9);
    }
}
