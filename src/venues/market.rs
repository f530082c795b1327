//! Public, unauthenticated market-data fetch; GET
//! /api/market/{prices,candles,orderbook} proxy to this. Built on an
//! array-of-arrays kline-parsing shape (a public endpoint needs no
//! signature), extended to Upbit's distinct market-code and
//! candle-endpoint conventions.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{debug, instrument};

use super::Venue;
use crate::indicators::Candle;

/// Translate a generic `"BTCUSDT"`-style symbol into the market code each
/// venue's public endpoints expect. Binance takes the symbol as-is; Upbit
/// addresses markets as `"{quote}-{base}"` and Venue A (Upbit-like) is the
/// KRW-quoted venue — so a bare `"BTCUSDT"` becomes `"KRW-BTC"` unless the
/// caller already passed a dashed market code.
pub fn to_venue_symbol(venue: Venue, symbol: &str) -> String {
    let symbol = symbol.to_uppercase();
    match venue {
        Venue::BinanceLike => symbol,
        Venue::UpbitLike => {
            if symbol.contains('-') {
                return symbol;
            }
            let base = symbol
                .strip_suffix("USDT")
                .or_else(|| symbol.strip_suffix("KRW"))
                .unwrap_or(&symbol);
            format!("KRW-{base}")
        }
    }
}

/// Upbit minute-candle endpoints only support a fixed set of unit sizes; an
/// interval outside that set (or a daily interval) falls through to the
/// `/v1/candles/days` endpoint.
fn upbit_candle_path(interval: &str) -> String {
    match interval {
        "1m" => "candles/minutes/1".to_string(),
        "3m" => "candles/minutes/3".to_string(),
        "5m" => "candles/minutes/5".to_string(),
        "10m" => "candles/minutes/10".to_string(),
        "15m" => "candles/minutes/15".to_string(),
        "30m" => "candles/minutes/30".to_string(),
        "1h" => "candles/minutes/60".to_string(),
        "4h" => "candles/minutes/240".to_string(),
        _ => "candles/days".to_string(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderbookLevel {
    pub price: f64,
    pub quantity: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderbookSnapshot {
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
}

/// Shared HTTP client for venues' public (unauthenticated) endpoints. Held
/// once by the gateway and reused across auto-trade cycles and `/api/market`
/// proxy calls.
pub struct MarketDataClient {
    http: reqwest::Client,
}

impl MarketDataClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to build reqwest client"),
        }
    }

    #[instrument(skip(self), name = "market::fetch_candles")]
    pub async fn fetch_candles(&self, venue: Venue, symbol: &str, interval: &str, count: u32) -> Result<Vec<Candle>> {
        match venue {
            Venue::BinanceLike => self.binance_klines(symbol, interval, count).await,
            Venue::UpbitLike => self.upbit_candles(symbol, interval, count).await,
        }
    }

    #[instrument(skip(self), name = "market::fetch_price")]
    pub async fn fetch_price(&self, venue: Venue, symbol: &str) -> Result<f64> {
        match venue {
            Venue::BinanceLike => self.binance_price(symbol).await,
            Venue::UpbitLike => self.upbit_price(symbol).await,
        }
    }

    #[instrument(skip(self), name = "market::fetch_orderbook")]
    pub async fn fetch_orderbook(&self, venue: Venue, symbol: &str) -> Result<OrderbookSnapshot> {
        match venue {
            Venue::BinanceLike => self.binance_orderbook(symbol).await,
            Venue::UpbitLike => self.upbit_orderbook(symbol).await,
        }
    }

    // ── Binance-like ────────────────────────────────────────────────

    async fn binance_klines(&self, symbol: &str, interval: &str, count: u32) -> Result<Vec<Candle>> {
        let url = format!("https://api.binance.com/api/v3/klines?symbol={symbol}&interval={interval}&limit={count}");
        let resp = self.http.get(&url).send().await.context("GET /api/v3/klines request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing klines response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/klines returned {status}: {body}");
        }

        let raw = body.as_array().context("klines response is not an array")?;
        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let arr = entry.as_array().context("kline entry is not an array")?;
            if arr.len() < 7 {
                continue;
            }
            let open_time = arr[0].as_i64().unwrap_or(0);
            let open = parse_str_f64(&arr[1])?;
            let high = parse_str_f64(&arr[2])?;
            let low = parse_str_f64(&arr[3])?;
            let close = parse_str_f64(&arr[4])?;
            let volume = parse_str_f64(&arr[5])?;
            let close_time = arr[6].as_i64().unwrap_or(0);
            candles.push(Candle::new(open_time, open, high, low, close, volume, close_time));
        }
        debug!(symbol, interval, count = candles.len(), "binance klines fetched");
        Ok(candles)
    }

    async fn binance_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("https://api.binance.com/api/v3/ticker/price?symbol={symbol}");
        let resp = self.http.get(&url).send().await.context("GET /api/v3/ticker/price request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing ticker response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/ticker/price returned {status}: {body}");
        }
        parse_str_f64(&body["price"])
    }

    async fn binance_orderbook(&self, symbol: &str) -> Result<OrderbookSnapshot> {
        let url = format!("https://api.binance.com/api/v3/depth?symbol={symbol}&limit=20");
        let resp = self.http.get(&url).send().await.context("GET /api/v3/depth request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing depth response")?;
        if status != reqwest::StatusCode::OK {
            bail!("Binance GET /api/v3/depth returned {status}: {body}");
        }
        Ok(OrderbookSnapshot {
            bids: parse_binance_levels(&body["bids"])?,
            asks: parse_binance_levels(&body["asks"])?,
        })
    }

    // ── Upbit-like ──────────────────────────────────────────────────

    async fn upbit_candles(&self, market: &str, interval: &str, count: u32) -> Result<Vec<Candle>> {
        let path = upbit_candle_path(interval);
        let url = format!("https://api.upbit.com/v1/{path}?market={market}&count={count}");
        let resp = self.http.get(&url).send().await.context("GET /v1/candles request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing candles response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/candles returned {status}: {body}");
        }

        let raw = body.as_array().context("candles response is not an array")?;
        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw {
            let open = entry["opening_price"].as_f64().context("missing opening_price")?;
            let high = entry["high_price"].as_f64().context("missing high_price")?;
            let low = entry["low_price"].as_f64().context("missing low_price")?;
            let close = entry["trade_price"].as_f64().context("missing trade_price")?;
            let volume = entry["candle_acc_trade_volume"].as_f64().unwrap_or(0.0);
            let open_time = entry["timestamp"].as_i64().unwrap_or(0);
            candles.push(Candle::new(open_time, open, high, low, close, volume, open_time));
        }
        // Upbit returns newest-first; every other venue and every downstream
        // indicator expects oldest-first.
        candles.reverse();
        debug!(market, interval, count = candles.len(), "upbit candles fetched");
        Ok(candles)
    }

    async fn upbit_price(&self, market: &str) -> Result<f64> {
        let url = format!("https://api.upbit.com/v1/ticker?markets={market}");
        let resp = self.http.get(&url).send().await.context("GET /v1/ticker request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing ticker response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/ticker returned {status}: {body}");
        }
        body.as_array()
            .and_then(|a| a.first())
            .and_then(|t| t["trade_price"].as_f64())
            .context("ticker response missing trade_price")
    }

    async fn upbit_orderbook(&self, market: &str) -> Result<OrderbookSnapshot> {
        let url = format!("https://api.upbit.com/v1/orderbook?markets={market}");
        let resp = self.http.get(&url).send().await.context("GET /v1/orderbook request failed")?;
        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("parsing orderbook response")?;
        if !status.is_success() {
            bail!("Upbit GET /v1/orderbook returned {status}: {body}");
        }
        let units = body
            .as_array()
            .and_then(|a| a.first())
            .and_then(|t| t["orderbook_units"].as_array())
            .context("orderbook response missing orderbook_units")?;

        let mut bids = Vec::with_capacity(units.len());
        let mut asks = Vec::with_capacity(units.len());
        for unit in units {
            bids.push(OrderbookLevel {
                price: unit["bid_price"].as_f64().unwrap_or(0.0),
                quantity: unit["bid_size"].as_f64().unwrap_or(0.0),
            });
            asks.push(OrderbookLevel {
                price: unit["ask_price"].as_f64().unwrap_or(0.0),
                quantity: unit["ask_size"].as_f64().unwrap_or(0.0),
            });
        }
        Ok(OrderbookSnapshot { bids, asks })
    }
}

impl Default for MarketDataClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_str_f64(v: &serde_json::Value) -> Result<f64> {
    if let Some(s) = v.as_str() {
        s.parse().context("parsing numeric string field")
    } else {
        v.as_f64().context("field is neither a string nor a number")
    }
}

fn parse_binance_levels(v: &serde_json::Value) -> Result<Vec<OrderbookLevel>> {
    let arr = v.as_array().context("orderbook side is not an array")?;
    let mut out = Vec::with_capacity(arr.len());
    for level in arr {
        let pair = level.as_array().context("orderbook level is not an array")?;
        if pair.len() < 2 {
            continue;
        }
        out.push(OrderbookLevel {
            price: parse_str_f64(&pair[0])?,
            quantity: parse_str_f64(&pair[1])?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_plain_symbol_to_upbit_krw_market() {
        assert_eq!(to_venue_symbol(Venue::UpbitLike, "BTCUSDT"), "KRW-BTC");
    }

    #[test]
    fn leaves_already_dashed_market_codes_alone() {
        assert_eq!(to_venue_symbol(Venue::UpbitLike, "KRW-ETH"), "KRW-ETH");
    }

    #[test]
    fn binance_symbol_passes_through_uppercased() {
        assert_eq!(to_venue_symbol(Venue::BinanceLike, "btcusdt"), "BTCUSDT");
    }

    #[test]
    fn maps_hourly_interval_to_upbit_sixty_minute_unit() {
        assert_eq!(upbit_candle_path("1h"), "candles/minutes/60");
    }

    #[test]
    fn unmapped_interval_falls_back_to_daily_candles() {
        assert_eq!(upbit_candle_path("1w"), "candles/days");
    }
}
