//! Six stateless strategy analyzers, built on a weight/confidence/
//! direction signal shape but each implemented as its own pure function
//! of a candle series rather than a single generic scorer.

use crate::indicators::{self, Candle};

/// `signal` is one of the 3-trit values {-1, 0, +1}.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StrategySignal {
    pub name: &'static str,
    pub weight: f64,
    pub signal: i8,
    pub confidence: f64,
    pub reason: String,
}

fn hold(name: &'static str, weight: f64, reason: impl Into<String>) -> StrategySignal {
    StrategySignal {
        name,
        weight,
        signal: 0,
        confidence: 0.0,
        reason: reason.into(),
    }
}

/// RSI strategy (weight 1.5): oversold/overbought crossings.
pub fn rsi_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "rsi";
    const WEIGHT: f64 = 1.5;
    let closes = indicators::closes(candles);
    let series = indicators::rsi(&closes, 14);

    let (Some(Some(last)), Some(Some(prev))) = (series.last(), series.iter().rev().nth(1)) else {
        return hold(NAME, WEIGHT, "insufficient data for RSI(14)");
    };

    if *prev <= 30.0 && *last > 30.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: ((30.0 - prev.min(30.0)) / 30.0).clamp(0.4, 0.9),
            reason: format!("RSI crossed up out of oversold ({prev:.1} -> {last:.1})"),
        }
    } else if *prev >= 70.0 && *last < 70.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: ((prev.max(70.0) - 70.0) / 30.0).clamp(0.4, 0.9),
            reason: format!("RSI crossed down out of overbought ({prev:.1} -> {last:.1})"),
        }
    } else if *last < 30.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: ((30.0 - last) / 30.0).clamp(0.2, 0.6),
            reason: format!("RSI oversold at {last:.1}"),
        }
    } else if *last > 70.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: ((last - 70.0) / 30.0).clamp(0.2, 0.6),
            reason: format!("RSI overbought at {last:.1}"),
        }
    } else {
        hold(NAME, WEIGHT, format!("RSI neutral at {last:.1}"))
    }
}

/// MACD strategy (weight 1.3): golden/dead cross of MACD vs signal line.
pub fn macd_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "macd";
    const WEIGHT: f64 = 1.3;
    let closes = indicators::closes(candles);
    let m = indicators::macd(&closes);

    let n = m.macd.len();
    if n < 2 {
        return hold(NAME, WEIGHT, "insufficient data for MACD");
    }
    let (Some(macd_now), Some(sig_now)) = (m.macd[n - 1], m.signal[n - 1]) else {
        return hold(NAME, WEIGHT, "MACD not yet available");
    };
    let (Some(macd_prev), Some(sig_prev)) = (m.macd[n - 2], m.signal[n - 2]) else {
        return hold(NAME, WEIGHT, "MACD not yet available");
    };

    let diff_now = macd_now - sig_now;
    let diff_prev = macd_prev - sig_prev;
    let magnitude = (diff_now.abs() / macd_now.abs().max(1e-9)).clamp(0.0, 1.0);

    if diff_prev <= 0.0 && diff_now > 0.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: magnitude.max(0.5),
            reason: "MACD golden cross (MACD crossed above signal)".into(),
        }
    } else if diff_prev >= 0.0 && diff_now < 0.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: magnitude.max(0.5),
            reason: "MACD dead cross (MACD crossed below signal)".into(),
        }
    } else {
        hold(NAME, WEIGHT, "no MACD crossover")
    }
}

/// Bollinger band strategy (weight 1.2): price touching/piercing a band.
pub fn bollinger_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "bollinger";
    const WEIGHT: f64 = 1.2;
    let closes = indicators::closes(candles);
    let bands = indicators::bollinger(&closes, 20, 2.0);
    let last = closes.len() - 1;

    let (Some(upper), Some(lower), Some(middle)) =
        (bands.upper[last], bands.lower[last], bands.middle[last])
    else {
        return hold(NAME, WEIGHT, "insufficient data for Bollinger(20)");
    };
    let price = closes[last];
    let half_width = (upper - middle).max(1e-9);

    if price <= lower {
        let depth = ((lower - price) / half_width).clamp(0.0, 1.0);
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: (0.5 + depth * 0.5).min(0.95),
            reason: format!("price {price:.4} at/below lower band {lower:.4}"),
        }
    } else if price >= upper {
        let depth = ((price - upper) / half_width).clamp(0.0, 1.0);
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: (0.5 + depth * 0.5).min(0.95),
            reason: format!("price {price:.4} at/above upper band {upper:.4}"),
        }
    } else {
        let proximity_low = (price - lower) / half_width;
        let proximity_high = (upper - price) / half_width;
        if proximity_low < 0.1 {
            StrategySignal {
                name: NAME,
                weight: WEIGHT,
                signal: 1,
                confidence: 0.3,
                reason: "price near lower band".into(),
            }
        } else if proximity_high < 0.1 {
            StrategySignal {
                name: NAME,
                weight: WEIGHT,
                signal: -1,
                confidence: 0.3,
                reason: "price near upper band".into(),
            }
        } else {
            hold(NAME, WEIGHT, "price within bands")
        }
    }
}

/// Volume strategy (weight 0.8): current volume vs its 20-bar mean.
pub fn volume_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "volume";
    const WEIGHT: f64 = 0.8;
    if candles.len() < 21 {
        return hold(NAME, WEIGHT, "insufficient data for 20-bar volume mean");
    }
    let window = &candles[candles.len() - 21..candles.len() - 1];
    let mean_volume = window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64;
    if mean_volume <= 0.0 {
        return hold(NAME, WEIGHT, "zero historical volume");
    }

    let last = candles.last().unwrap();
    let ratio = last.volume / mean_volume;
    let price_up = last.close >= last.open;

    if ratio >= 2.0 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: if price_up { 1 } else { -1 },
            confidence: ((ratio - 1.0) / 3.0).clamp(0.3, 0.9),
            reason: format!("volume spike {ratio:.2}x the 20-bar mean"),
        }
    } else {
        hold(NAME, WEIGHT, format!("volume {ratio:.2}x mean, not a spike"))
    }
}

/// Trend/EMA-stack strategy (weight 1.0): ordering of EMA9/21/55.
pub fn trend_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "trend";
    const WEIGHT: f64 = 1.0;
    let closes = indicators::closes(candles);
    let e9 = indicators::ema(&closes, 9);
    let e21 = indicators::ema(&closes, 21);
    let e55 = indicators::ema(&closes, 55);
    let last = closes.len() - 1;

    let (Some(e9), Some(e21), Some(e55)) = (e9[last], e21[last], e55[last]) else {
        return hold(NAME, WEIGHT, "insufficient data for EMA(9/21/55) stack");
    };

    let spread = (e9 - e55).abs() / e55.abs().max(1e-9);
    if e9 > e21 && e21 > e55 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: spread.clamp(0.2, 0.85),
            reason: "bullish EMA stack (9 > 21 > 55)".into(),
        }
    } else if e9 < e21 && e21 < e55 {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: spread.clamp(0.2, 0.85),
            reason: "bearish EMA stack (9 < 21 < 55)".into(),
        }
    } else {
        hold(NAME, WEIGHT, "EMA stack not aligned")
    }
}

/// Stochastic strategy (weight 0.7): %K/%D crossing 20/80 thresholds.
pub fn stochastic_strategy(candles: &[Candle]) -> StrategySignal {
    const NAME: &str = "stochastic";
    const WEIGHT: f64 = 0.7;
    let stoch = indicators::stochastic(candles, 14);
    let last = candles.len() - 1;

    let (Some(k), Some(d)) = (stoch.k[last], stoch.d[last]) else {
        return hold(NAME, WEIGHT, "insufficient data for Stochastic(14,3)");
    };

    if k < 20.0 && k > d {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: 1,
            confidence: ((20.0 - k) / 20.0).clamp(0.2, 0.7),
            reason: format!("%K {k:.1} oversold and crossing above %D {d:.1}"),
        }
    } else if k > 80.0 && k < d {
        StrategySignal {
            name: NAME,
            weight: WEIGHT,
            signal: -1,
            confidence: ((k - 80.0) / 20.0).clamp(0.2, 0.7),
            reason: format!("%K {k:.1} overbought and crossing below %D {d:.1}"),
        }
    } else {
        hold(NAME, WEIGHT, format!("%K {k:.1} / %D {d:.1} no signal"))
    }
}

/// Run every strategy over the given candle series.
pub fn run_all(candles: &[Candle]) -> Vec<StrategySignal> {
    vec![
        rsi_strategy(candles),
        macd_strategy(candles),
        bollinger_strategy(candles),
        volume_strategy(candles),
        trend_strategy(candles),
        stochastic_strategy(candles),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prices: &[f64]) -> Vec<Candle> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle::new(i as i64, p, p * 1.001, p * 0.999, p, 100.0, i as i64))
            .collect()
    }

    #[test]
    fn strategies_hold_on_insufficient_data() {
        let candles = series(&[100.0, 101.0, 99.0]);
        for s in run_all(&candles) {
            assert_eq!(s.signal, 0);
            assert_eq!(s.confidence, 0.0);
        }
    }

    #[test]
    fn trend_strategy_detects_bullish_stack() {
        let prices: Vec<f64> = (0..80).map(|i| 100.0 + i as f64 * 2.0).collect();
        let candles = series(&prices);
        let s = trend_strategy(&candles);
        assert_eq!(s.signal, 1);
        assert!(s.confidence > 0.0);
    }

    #[test]
    fn trend_strategy_detects_bearish_stack() {
        let prices: Vec<f64> = (0..80).map(|i| 300.0 - i as f64 * 2.0).collect();
        let candles = series(&prices);
        let s = trend_strategy(&candles);
        assert_eq!(s.signal, -1);
    }
}
