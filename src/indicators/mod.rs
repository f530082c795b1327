//! Pure technical-analysis indicators over candle series.
//!
//! Every indicator returns a vector the same length as its input, with
//! `None` for the "not-yet-available" prefix (grounded on sBot9999's
//! `indicators/rsi.rs`, generalized from its truncated-`Vec<f64>` return to
//! a full-length `Vec<Option<f64>>` so callers can zip against the original
//! candle series without an off-by-`period` index shift). `None` is never
//! coerced to zero by callers — see `strategies::*` for how each consumer
//! guards on it.

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
}

impl Candle {
    pub fn new(
        open_time: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        close_time: i64,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
            close_time,
        }
    }
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// Simple moving average over `period` trailing values.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    values
        .iter()
        .enumerate()
        .map(|(i, _)| {
            if i + 1 < period {
                None
            } else {
                let window = &values[i + 1 - period..=i];
                Some(window.iter().sum::<f64>() / period as f64)
            }
        })
        .collect()
}

fn stdev(window: &[f64], mean: f64) -> f64 {
    let var = window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / window.len() as f64;
    var.sqrt()
}

/// Exponential moving average, seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || values.len() < period {
        return vec![None; values.len()];
    }
    let mut out = vec![None; values.len()];
    let k = 2.0 / (period as f64 + 1.0);

    let seed = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, &v) in values.iter().enumerate().skip(period) {
        let next = v * k + prev * (1.0 - k);
        out[i] = Some(next);
        prev = next;
    }
    out
}

/// RSI using Wilder smoothing, seeded with the simple average of the first
/// `period` gains/losses.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 || closes.len() < period + 1 {
        return vec![None; closes.len()];
    }

    let mut out = vec![None; closes.len()];
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l + d.abs())
            }
        });
    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { delta.abs() } else { 0.0 };
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;
        out[i + 1] = Some(rsi_from_averages(avg_gain, avg_loss));
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    }
}

pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// MACD = EMA12(close) - EMA26(close); signal = EMA9(macd); histogram = macd - signal.
pub fn macd(closes: &[f64]) -> Macd {
    let ema12 = ema(closes, 12);
    let ema26 = ema(closes, 26);

    let macd_line: Vec<Option<f64>> = ema12
        .iter()
        .zip(ema26.iter())
        .map(|(a, b)| match (a, b) {
            (Some(a), Some(b)) => Some(a - b),
            _ => None,
        })
        .collect();

    // EMA9 over the defined suffix of macd_line, re-aligned to full length.
    let first_defined = macd_line.iter().position(|v| v.is_some());
    let signal_line = match first_defined {
        Some(start) => {
            let dense: Vec<f64> = macd_line[start..].iter().map(|v| v.unwrap()).collect();
            let dense_signal = ema(&dense, 9);
            let mut full = vec![None; macd_line.len()];
            for (i, v) in dense_signal.into_iter().enumerate() {
                full[start + i] = v;
            }
            full
        }
        None => vec![None; macd_line.len()],
    };

    let histogram: Vec<Option<f64>> = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(m, s)| match (m, s) {
            (Some(m), Some(s)) => Some(m - s),
            _ => None,
        })
        .collect();

    Macd {
        macd: macd_line,
        signal: signal_line,
        histogram,
    }
}

pub struct Bollinger {
    pub middle: Vec<Option<f64>>,
    pub upper: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Bollinger bands: SMA20 ± 2σ.
pub fn bollinger(closes: &[f64], period: usize, k: f64) -> Bollinger {
    let middle = sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];

    for i in 0..closes.len() {
        if let Some(mean) = middle[i] {
            let window = &closes[i + 1 - period..=i];
            let sd = stdev(window, mean);
            upper[i] = Some(mean + k * sd);
            lower[i] = Some(mean - k * sd);
        }
    }

    Bollinger {
        middle,
        upper,
        lower,
    }
}

pub struct Stochastic {
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// Stochastic oscillator: %K over `period` (default 14), %D = SMA3(%K).
pub fn stochastic(candles: &[Candle], period: usize) -> Stochastic {
    let mut k = vec![None; candles.len()];
    for i in 0..candles.len() {
        if i + 1 < period {
            continue;
        }
        let window = &candles[i + 1 - period..=i];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        k[i] = Some(if range > 0.0 {
            (candles[i].close - lowest) / range * 100.0
        } else {
            50.0
        });
    }

    let first_defined = k.iter().position(|v| v.is_some());
    let d = match first_defined {
        Some(start) => {
            let dense: Vec<f64> = k[start..].iter().map(|v| v.unwrap()).collect();
            let dense_d = sma(&dense, 3);
            let mut full = vec![None; k.len()];
            for (i, v) in dense_d.into_iter().enumerate() {
                full[start + i] = v;
            }
            full
        }
        None => vec![None; k.len()],
    };

    Stochastic { k, d }
}

/// Average True Range over `period`, Wilder-smoothed.
pub fn atr(candles: &[Candle], period: usize) -> Vec<Option<f64>> {
    if candles.len() < 2 {
        return vec![None; candles.len()];
    }
    let mut true_ranges = vec![0.0; candles.len()];
    for i in 1..candles.len() {
        let hl = candles[i].high - candles[i].low;
        let hc = (candles[i].high - candles[i - 1].close).abs();
        let lc = (candles[i].low - candles[i - 1].close).abs();
        true_ranges[i] = hl.max(hc).max(lc);
    }

    let mut out = vec![None; candles.len()];
    if candles.len() < period + 1 {
        return out;
    }

    let seed = true_ranges[1..=period].iter().sum::<f64>() / period as f64;
    out[period] = Some(seed);
    let mut prev = seed;
    for i in (period + 1)..candles.len() {
        let next = (prev * (period as f64 - 1.0) + true_ranges[i]) / period as f64;
        out[i] = Some(next);
        prev = next;
    }
    out
}

/// Volume-weighted average price, cumulative from the start of the series.
pub fn vwap(candles: &[Candle]) -> Vec<Option<f64>> {
    let mut out = vec![None; candles.len()];
    let mut cum_pv = 0.0;
    let mut cum_vol = 0.0;
    for (i, c) in candles.iter().enumerate() {
        let typical = (c.high + c.low + c.close) / 3.0;
        cum_pv += typical * c.volume;
        cum_vol += c.volume;
        out[i] = if cum_vol > 0.0 {
            Some(cum_pv / cum_vol)
        } else {
            None
        };
    }
    out
}

/// On-balance volume, cumulative from the start of the series.
pub fn obv(candles: &[Candle]) -> Vec<Option<f64>> {
    if candles.is_empty() {
        return Vec::new();
    }
    let mut out = vec![None; candles.len()];
    let mut running = 0.0;
    out[0] = Some(running);
    for i in 1..candles.len() {
        if candles[i].close > candles[i - 1].close {
            running += candles[i].volume;
        } else if candles[i].close < candles[i - 1].close {
            running -= candles[i].volume;
        }
        out[i] = Some(running);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_candles(n: usize, price: f64) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new(i as i64, price, price, price, price, 100.0, i as i64))
            .collect()
    }

    #[test]
    fn sma_basic() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let out = sma(&values, 3);
        assert_eq!(out[0], None);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(2.0));
        assert_eq!(out[4], Some(4.0));
    }

    #[test]
    fn rsi_all_gains_saturates_100() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let out = rsi(&closes, 14);
        for v in out.iter().skip(14) {
            assert!((v.unwrap() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn rsi_flat_market_is_neutral() {
        let closes = vec![100.0; 30];
        let out = rsi(&closes, 14);
        for v in out.iter().skip(14) {
            assert!((v.unwrap() - 50.0).abs() < 1e-9);
        }
    }

    #[test]
    fn bollinger_flat_series_zero_width() {
        let closes = vec![10.0; 25];
        let bands = bollinger(&closes, 20, 2.0);
        let i = 20;
        assert_eq!(bands.upper[i], bands.lower[i]);
        assert_eq!(bands.middle[i], Some(10.0));
    }

    #[test]
    fn obv_tracks_direction() {
        let candles = flat_candles(1, 100.0);
        let mut candles = candles;
        candles.push(Candle::new(1, 100.0, 105.0, 99.0, 105.0, 50.0, 1));
        candles.push(Candle::new(2, 105.0, 106.0, 90.0, 90.0, 30.0, 2));
        let out = obv(&candles);
        assert_eq!(out[0], Some(0.0));
        assert_eq!(out[1], Some(50.0));
        assert_eq!(out[2], Some(20.0));
    }

    #[test]
    fn undefined_prefix_is_none_not_zero() {
        let values = vec![1.0, 2.0];
        let out = sma(&values, 5);
        assert!(out.iter().all(|v| v.is_none()));
    }
}
