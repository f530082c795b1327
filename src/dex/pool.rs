//! Constant-product AMM pool, built around a fee/slippage shape
//! generalized from a single-sided swap simulation into a two-sided
//! constant-product pool with LP share accounting.

use std::collections::{HashMap, VecDeque};

use crate::error::{AppError, AppResult};

const PRICE_HISTORY_CAP: usize = 1000;

/// 3-trit price-impact classification (spec GLOSSARY): Precise / Ordinary /
/// Turbulent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpactTrit {
    Precise,
    Ordinary,
    Turbulent,
}

impl ImpactTrit {
    pub fn classify(impact: f64) -> Self {
        if impact < 0.01 {
            ImpactTrit::Precise
        } else if impact < 0.05 {
            ImpactTrit::Ordinary
        } else {
            ImpactTrit::Turbulent
        }
    }

    pub fn glyph(self) -> char {
        match self {
            ImpactTrit::Precise => '△',
            ImpactTrit::Ordinary => '○',
            ImpactTrit::Turbulent => '▽',
        }
    }
}

#[derive(Debug, Clone)]
pub struct SwapRecord {
    pub pool_id: String,
    pub direction_a_to_b: bool,
    pub amount_in: u128,
    pub amount_out: u128,
    pub fee: u128,
    pub price_impact: f64,
    pub trit: ImpactTrit,
}

/// A constant-product pool over tokens A and B. `fee_bps` is fixed at pool
/// creation. Reserves and LP shares are tracked as plain integer token
/// counts (u128) — the same flat unit wallets use — so every formula can
/// be computed with exact integer division and floor() semantics.
#[derive(Debug, Clone)]
pub struct Pool {
    pub id: String,
    pub token_a: String,
    pub token_b: String,
    pub reserve_a: u128,
    pub reserve_b: u128,
    pub fee_bps: u32,
    pub total_lp_shares: u128,
    pub lp_holders: HashMap<String, u128>,
    pub swap_count: u64,
    pub fees_collected_a: u128,
    pub fees_collected_b: u128,
    price_history: VecDeque<f64>,
}

impl Pool {
    pub fn new(token_a: &str, token_b: &str, fee_bps: u32) -> Self {
        Self {
            id: format!("{token_a}-{token_b}"),
            token_a: token_a.to_string(),
            token_b: token_b.to_string(),
            reserve_a: 0,
            reserve_b: 0,
            fee_bps,
            total_lp_shares: 0,
            lp_holders: HashMap::new(),
            swap_count: 0,
            fees_collected_a: 0,
            fees_collected_b: 0,
            price_history: VecDeque::new(),
        }
    }

    /// Seed a pool with initial reserves at creation time, crediting the
    /// bootstrap shares to a system-owned LP account. Only valid on an
    /// empty pool.
    pub fn bootstrap(&mut self, owner: &str, amount_a: u128, amount_b: u128) -> AppResult<u128> {
        if self.total_lp_shares != 0 {
            return Err(AppError::Conflict("pool already bootstrapped".into()));
        }
        self.add_liquidity(owner, amount_a, amount_b)
    }

    /// Current spot price of A denominated in B (reserve_b / reserve_a).
    pub fn price_a_in_b(&self) -> f64 {
        if self.reserve_a == 0 {
            0.0
        } else {
            self.reserve_b as f64 / self.reserve_a as f64
        }
    }

    pub fn k(&self) -> u128 {
        self.reserve_a * self.reserve_b
    }

    fn push_price_history(&mut self) {
        if self.price_history.len() >= PRICE_HISTORY_CAP {
            self.price_history.pop_front();
        }
        self.price_history.push_back(self.price_a_in_b());
    }

    pub fn price_history(&self) -> &VecDeque<f64> {
        &self.price_history
    }

    /// Add liquidity for `holder`. On an empty pool, shares are
    /// `floor(sqrt(amountA * amountB))`; otherwise shares are the minimum
    /// of each side's proportional contribution.
    pub fn add_liquidity(
        &mut self,
        holder: &str,
        amount_a: u128,
        amount_b: u128,
    ) -> AppResult<u128> {
        if amount_a == 0 || amount_b == 0 {
            return Err(AppError::BadInput("liquidity amounts must be positive".into()));
        }

        let minted = if self.total_lp_shares == 0 {
            isqrt(amount_a * amount_b)
        } else {
            let from_a = amount_a * self.total_lp_shares / self.reserve_a;
            let from_b = amount_b * self.total_lp_shares / self.reserve_b;
            from_a.min(from_b)
        };

        if minted == 0 {
            return Err(AppError::ZeroOutput);
        }

        self.reserve_a += amount_a;
        self.reserve_b += amount_b;
        self.total_lp_shares += minted;
        *self.lp_holders.entry(holder.to_string()).or_insert(0) += minted;
        self.push_price_history();

        Ok(minted)
    }

    /// Remove `shares` of liquidity held by `holder`, returning the payout
    /// amounts `(amount_a, amount_b)`.
    pub fn remove_liquidity(&mut self, holder: &str, shares: u128) -> AppResult<(u128, u128)> {
        if shares == 0 {
            return Err(AppError::BadInput("shares must be positive".into()));
        }
        let held = *self.lp_holders.get(holder).unwrap_or(&0);
        if shares > held {
            return Err(AppError::InsufficientBalance);
        }

        let amount_a = shares * self.reserve_a / self.total_lp_shares;
        let amount_b = shares * self.reserve_b / self.total_lp_shares;
        if amount_a == 0 && amount_b == 0 {
            return Err(AppError::ZeroOutput);
        }

        self.reserve_a -= amount_a;
        self.reserve_b -= amount_b;
        self.total_lp_shares -= shares;
        let remaining = held - shares;
        if remaining == 0 {
            self.lp_holders.remove(holder);
        } else {
            self.lp_holders.insert(holder.to_string(), remaining);
        }
        self.push_price_history();

        Ok((amount_a, amount_b))
    }

    /// Swap `amount_in` of token A for token B. The fee-inclusive amount
    /// is credited back to reserve A (so k grows
    /// strictly when `fee_bps > 0`), while the output is priced off the
    /// fee-deducted "virtual" reserve, matching a standard constant-product
    /// swap with fees retained in the pool.
    pub fn swap_a_to_b(&mut self, amount_in: u128) -> AppResult<SwapRecord> {
        if amount_in == 0 {
            return Err(AppError::BadInput("amountIn must be positive".into()));
        }
        if self.reserve_a == 0 || self.reserve_b == 0 {
            return Err(AppError::InsufficientLiquidity);
        }

        let k = self.k();
        let fee = amount_in * self.fee_bps as u128 / 10_000;
        let after_fee = amount_in - fee;
        let virtual_new_a = self.reserve_a + after_fee;
        let new_b = k / virtual_new_a;

        if new_b >= self.reserve_b {
            return Err(AppError::ZeroOutput);
        }
        let amount_out = self.reserve_b - new_b;
        if amount_out == 0 {
            return Err(AppError::ZeroOutput);
        }

        let impact = 1.0
            - (new_b as f64 * self.reserve_a as f64) / (self.reserve_b as f64 * virtual_new_a as f64);

        self.reserve_a += amount_in;
        self.reserve_b = new_b;
        self.swap_count += 1;
        self.fees_collected_a += fee;
        self.push_price_history();

        Ok(SwapRecord {
            pool_id: self.id.clone(),
            direction_a_to_b: true,
            amount_in,
            amount_out,
            fee,
            price_impact: impact,
            trit: ImpactTrit::classify(impact),
        })
    }

    /// Swap `amount_in` of token B for token A, symmetric to [`swap_a_to_b`].
    pub fn swap_b_to_a(&mut self, amount_in: u128) -> AppResult<SwapRecord> {
        if amount_in == 0 {
            return Err(AppError::BadInput("amountIn must be positive".into()));
        }
        if self.reserve_a == 0 || self.reserve_b == 0 {
            return Err(AppError::InsufficientLiquidity);
        }

        let k = self.k();
        let fee = amount_in * self.fee_bps as u128 / 10_000;
        let after_fee = amount_in - fee;
        let virtual_new_b = self.reserve_b + after_fee;
        let new_a = k / virtual_new_b;

        if new_a >= self.reserve_a {
            return Err(AppError::ZeroOutput);
        }
        let amount_out = self.reserve_a - new_a;
        if amount_out == 0 {
            return Err(AppError::ZeroOutput);
        }

        let impact = 1.0
            - (new_a as f64 * self.reserve_b as f64) / (self.reserve_a as f64 * virtual_new_b as f64);

        self.reserve_b += amount_in;
        self.reserve_a = new_a;
        self.swap_count += 1;
        self.fees_collected_b += fee;
        self.push_price_history();

        Ok(SwapRecord {
            pool_id: self.id.clone(),
            direction_a_to_b: false,
            amount_in,
            amount_out,
            fee,
            price_impact: impact,
            trit: ImpactTrit::classify(impact),
        })
    }
}

/// Floor integer square root via Newton's method, used for the initial LP
/// share mint (`shares = floor(sqrt(amountA * amountB))`).
fn isqrt(value: u128) -> u128 {
    if value == 0 {
        return 0;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_pricing_matches_spec_scenario() {
        let mut pool = Pool::new("CRWN", "USDT", 30);
        pool.bootstrap("system", 10_000_000, 1_250_000).unwrap();
        assert_eq!(pool.reserve_a, 10_000_000);
        assert_eq!(pool.reserve_b, 1_250_000);
        assert!((pool.price_a_in_b() - 0.125).abs() < 1e-12);
    }

    #[test]
    fn swap_invariant_matches_spec_scenario() {
        let mut pool = Pool::new("CRWN", "USDT", 30);
        pool.bootstrap("system", 10_000_000, 1_250_000).unwrap();
        let record = pool.swap_a_to_b(10_000).unwrap();
        assert_eq!(record.fee, 30);
        assert_eq!(record.amount_out, 1_246);
    }

    #[test]
    fn k_strictly_grows_with_nonzero_fee() {
        let mut pool = Pool::new("CRWN", "USDT", 30);
        pool.bootstrap("system", 10_000_000, 1_250_000).unwrap();
        let k_before = pool.k();
        pool.swap_a_to_b(10_000).unwrap();
        assert!(pool.k() > k_before);
    }

    #[test]
    fn zero_fee_pool_preserves_k_up_to_rounding() {
        let mut pool = Pool::new("ETH", "USDT", 0);
        pool.bootstrap("system", 1_000_000, 2_500_000_000).unwrap();
        let k_before = pool.k();
        pool.swap_a_to_b(1_000).unwrap();
        assert!(pool.k() <= k_before);
    }

    #[test]
    fn add_then_remove_liquidity_round_trips() {
        let mut pool = Pool::new("BTC", "USDT", 10);
        let minted = pool.bootstrap("alice", 100, 6_000_000).unwrap();
        assert_eq!(pool.lp_holders.get("alice"), Some(&minted));
        let (a, b) = pool.remove_liquidity("alice", minted).unwrap();
        assert_eq!(a, 100);
        assert_eq!(b, 6_000_000);
        assert_eq!(pool.total_lp_shares, 0);
        assert!(!pool.lp_holders.contains_key("alice"));
    }

    #[test]
    fn remove_liquidity_rejects_overdraw() {
        let mut pool = Pool::new("BTC", "USDT", 10);
        let minted = pool.bootstrap("alice", 100, 6_000_000).unwrap();
        let result = pool.remove_liquidity("alice", minted + 1);
        assert!(matches!(result, Err(AppError::InsufficientBalance)));
    }

    #[test]
    fn swap_on_empty_pool_is_insufficient_liquidity() {
        let mut pool = Pool::new("CRWN", "USDT", 30);
        let result = pool.swap_a_to_b(1_000);
        assert!(matches!(result, Err(AppError::InsufficientLiquidity)));
    }
}
