//! The DEX engine (spec C5 / §4.1): token registry, constant-product pools
//! with LP shares, and a limit order book, combined behind a single
//! `DexEngine` facade the gateway talks to.

pub mod orderbook;
pub mod pool;
pub mod token;

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{AppError, AppResult};
use orderbook::{Fill, LimitOrder, OrderBook, OrderSide, OrderStatus};
use pool::{Pool, SwapRecord};
use token::TokenRegistry;

/// Bootstrap reserves and fee tiers for the six pools. Only the CRWN-USDT
/// reserves are pinned by the worked scenario (10,000,000 CRWN / 1,250,000
/// USDT @ 30bps); the remaining five pools are seeded with reserves chosen
/// to hold mutually consistent cross-rates (documented as an open question
/// resolution in DESIGN.md).
const POOL_SEEDS: [(&str, &str, u128, u128, u32); 6] = [
    ("CRWN", "USDT", 10_000_000, 1_250_000, 30),
    ("CRWN", "ETH", 10_000_000, 500, 30),
    ("CRWN", "BTC", 10_000_000, 21, 30),
    ("CRWN", "KRW", 10_000_000, 1_625_000_000, 20),
    ("BTC", "USDT", 100, 6_000_000, 10),
    ("ETH", "USDT", 1_000, 2_500_000, 15),
];

pub struct DexEngine {
    pub tokens: TokenRegistry,
    pools: RwLock<HashMap<String, Pool>>,
    books: RwLock<HashMap<String, OrderBook>>,
}

impl DexEngine {
    pub fn bootstrap() -> Self {
        let tokens = TokenRegistry::bootstrap();
        let mut pools = HashMap::new();
        let mut books = HashMap::new();

        for (a, b, reserve_a, reserve_b, fee_bps) in POOL_SEEDS {
            let mut pool = Pool::new(a, b, fee_bps);
            pool.bootstrap("system", reserve_a, reserve_b)
                .expect("pool seed reserves must be valid");
            let market = pool.id.clone();
            pools.insert(market.clone(), pool);
            books.insert(market.clone(), OrderBook::new(&market));
        }

        Self {
            tokens,
            pools: RwLock::new(pools),
            books: RwLock::new(books),
        }
    }

    pub fn pool_ids(&self) -> Vec<String> {
        self.pools.read().unwrap().keys().cloned().collect()
    }

    pub fn pool_summary(&self, pool_id: &str) -> AppResult<PoolSummary> {
        let pools = self.pools.read().unwrap();
        let pool = pools
            .get(pool_id)
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))?;
        Ok(PoolSummary {
            id: pool.id.clone(),
            token_a: pool.token_a.clone(),
            token_b: pool.token_b.clone(),
            reserve_a: pool.reserve_a,
            reserve_b: pool.reserve_b,
            fee_bps: pool.fee_bps,
            price: pool.price_a_in_b(),
            total_lp_shares: pool.total_lp_shares,
            swap_count: pool.swap_count,
        })
    }

    /// Full pool snapshot (reserves + LP holder table), for the gateway to
    /// hand to `db::pools::save_pool_sync` after a mutating operation.
    pub fn pool_snapshot(&self, pool_id: &str) -> AppResult<Pool> {
        let pools = self.pools.read().unwrap();
        pools
            .get(pool_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))
    }

    /// Put a previously snapshotted pool back in place. Used by the gateway
    /// to undo an in-memory mutation when the surrounding DB transaction
    /// fails after the pool was already mutated.
    pub fn restore_pool(&self, pool_id: &str, pool: Pool) {
        self.pools.write().unwrap().insert(pool_id.to_string(), pool);
    }

    /// Full order book snapshot for the same rollback purpose as
    /// `restore_pool`, taken before a mutating `place_order` call.
    pub fn book_snapshot(&self, market: &str) -> AppResult<OrderBook> {
        let books = self.books.read().unwrap();
        books
            .get(market)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("market {market}")))
    }

    pub fn restore_book(&self, market: &str, book: OrderBook) {
        self.books.write().unwrap().insert(market.to_string(), book);
    }

    pub fn price_history(&self, pool_id: &str) -> AppResult<Vec<f64>> {
        let pools = self.pools.read().unwrap();
        let pool = pools
            .get(pool_id)
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))?;
        Ok(pool.price_history().iter().copied().collect())
    }

    pub fn swap(&self, pool_id: &str, a_to_b: bool, amount_in: u128) -> AppResult<SwapRecord> {
        let mut pools = self.pools.write().unwrap();
        let pool = pools
            .get_mut(pool_id)
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))?;
        if a_to_b {
            pool.swap_a_to_b(amount_in)
        } else {
            pool.swap_b_to_a(amount_in)
        }
    }

    pub fn add_liquidity(
        &self,
        pool_id: &str,
        holder: &str,
        amount_a: u128,
        amount_b: u128,
    ) -> AppResult<u128> {
        let mut pools = self.pools.write().unwrap();
        let pool = pools
            .get_mut(pool_id)
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))?;
        pool.add_liquidity(holder, amount_a, amount_b)
    }

    pub fn remove_liquidity(
        &self,
        pool_id: &str,
        holder: &str,
        shares: u128,
    ) -> AppResult<(u128, u128)> {
        let mut pools = self.pools.write().unwrap();
        let pool = pools
            .get_mut(pool_id)
            .ok_or_else(|| AppError::NotFound(format!("pool {pool_id}")))?;
        pool.remove_liquidity(holder, shares)
    }

    pub fn place_order(&self, order: LimitOrder) -> AppResult<Vec<Fill>> {
        let mut books = self.books.write().unwrap();
        let book = books
            .get_mut(&order.market)
            .ok_or_else(|| AppError::NotFound(format!("market {}", order.market)))?;
        book.place(order)
    }

    /// Look up a single order's current state, for settling fills against
    /// the right owner after `place_order` reports a match (locked-balance
    /// settlement).
    pub fn get_order(&self, market: &str, order_id: &str) -> AppResult<LimitOrder> {
        let books = self.books.read().unwrap();
        let book = books
            .get(market)
            .ok_or_else(|| AppError::NotFound(format!("market {market}")))?;
        book.get(order_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))
    }

    pub fn cancel_order(&self, market: &str, order_id: &str, owner: &str) -> AppResult<()> {
        let mut books = self.books.write().unwrap();
        let book = books
            .get_mut(market)
            .ok_or_else(|| AppError::NotFound(format!("market {market}")))?;
        book.cancel(order_id, owner)
    }

    pub fn order_book_snapshot(&self, market: &str) -> AppResult<OrderBookSnapshot> {
        let books = self.books.read().unwrap();
        let book = books
            .get(market)
            .ok_or_else(|| AppError::NotFound(format!("market {market}")))?;

        let mut buys: Vec<(f64, f64)> = Vec::new();
        let mut sells: Vec<(f64, f64)> = Vec::new();
        for order in book.open_orders() {
            match order.side {
                OrderSide::Buy => buys.push((order.price, order.remaining())),
                OrderSide::Sell => sells.push((order.price, order.remaining())),
            }
        }
        buys.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
        sells.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        Ok(OrderBookSnapshot { market: market.to_string(), buys, sells })
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolSummary {
    pub id: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub fee_bps: u32,
    pub price: f64,
    pub total_lp_shares: u128,
    pub swap_count: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrderBookSnapshot {
    pub market: String,
    pub buys: Vec<(f64, f64)>,
    pub sells: Vec<(f64, f64)>,
}

pub use orderbook::OrderStatus as DexOrderStatus;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_creates_all_six_pools() {
        let engine = DexEngine::bootstrap();
        assert_eq!(engine.pool_ids().len(), 6);
    }

    #[test]
    fn bootstrap_pool_pricing_matches_spec_scenario() {
        let engine = DexEngine::bootstrap();
        let summary = engine.pool_summary("CRWN-USDT").unwrap();
        assert_eq!(summary.reserve_a, 10_000_000);
        assert_eq!(summary.reserve_b, 1_250_000);
        assert_eq!(summary.fee_bps, 30);
        assert!((summary.price - 0.125).abs() < 1e-12);
    }

    #[test]
    fn unknown_pool_is_not_found() {
        let engine = DexEngine::bootstrap();
        let result = engine.pool_summary("NOPE-USDT");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
