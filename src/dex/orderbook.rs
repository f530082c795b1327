//! Limit order book and matching engine, sitting alongside the AMM pools
//! as the DEX's second liquidity venue. Built on the same fee/record shape
//! as the pool, generalized to a classic price/time-priority book.

use serde::Serialize;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct LimitOrder {
    pub id: String,
    pub owner: String,
    pub market: String,
    pub side: OrderSide,
    pub price: f64,
    pub amount: f64,
    pub filled: f64,
    pub status: OrderStatus,
    pub created_at: i64,
}

impl LimitOrder {
    pub fn remaining(&self) -> f64 {
        self.amount - self.filled
    }
}

#[derive(Debug, Clone)]
pub struct Fill {
    pub buy_order_id: String,
    pub sell_order_id: String,
    pub price: f64,
    pub amount: f64,
}

/// A single market's resting orders, partitioned by side.
#[derive(Debug, Default, Clone)]
pub struct OrderBook {
    pub market: String,
    orders: Vec<LimitOrder>,
}

impl OrderBook {
    pub fn new(market: &str) -> Self {
        Self {
            market: market.to_string(),
            orders: Vec::new(),
        }
    }

    pub fn open_orders(&self) -> impl Iterator<Item = &LimitOrder> {
        self.orders
            .iter()
            .filter(|o| matches!(o.status, OrderStatus::Open | OrderStatus::PartiallyFilled))
    }

    pub fn get(&self, order_id: &str) -> Option<&LimitOrder> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    /// Insert a new order into the book and immediately attempt to match it,
    /// returning any fills produced.
    pub fn place(&mut self, order: LimitOrder) -> AppResult<Vec<Fill>> {
        if order.price <= 0.0 || order.amount <= 0.0 {
            return Err(AppError::BadInput("price and amount must be positive".into()));
        }
        self.orders.push(order);
        Ok(self.match_book())
    }

    pub fn cancel(&mut self, order_id: &str, owner: &str) -> AppResult<()> {
        let order = self
            .orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
        if order.owner != owner {
            return Err(AppError::AuthRequired);
        }
        if !matches!(order.status, OrderStatus::Open | OrderStatus::PartiallyFilled) {
            return Err(AppError::Conflict("order is no longer open".into()));
        }
        order.status = OrderStatus::Cancelled;
        Ok(())
    }

    /// Price/time-priority matching: buys sorted by price descending, sells
    /// by price ascending; a pair crosses when `buy.price >= sell.price`,
    /// and fills at the resting (maker) side's price — here the sell price,
    /// since sells are matched in ascending order and therefore always rest
    /// first at a given level.
    fn match_book(&mut self) -> Vec<Fill> {
        let mut fills = Vec::new();

        loop {
            let mut buy_idx: Option<usize> = None;
            let mut sell_idx: Option<usize> = None;

            for (i, o) in self.orders.iter().enumerate() {
                if !matches!(o.status, OrderStatus::Open | OrderStatus::PartiallyFilled) {
                    continue;
                }
                match o.side {
                    OrderSide::Buy => {
                        if buy_idx.map_or(true, |b: usize| {
                            o.price > self.orders[b].price
                                || (o.price == self.orders[b].price
                                    && o.created_at < self.orders[b].created_at)
                        }) {
                            buy_idx = Some(i);
                        }
                    }
                    OrderSide::Sell => {
                        if sell_idx.map_or(true, |s: usize| {
                            o.price < self.orders[s].price
                                || (o.price == self.orders[s].price
                                    && o.created_at < self.orders[s].created_at)
                        }) {
                            sell_idx = Some(i);
                        }
                    }
                }
            }

            let (Some(bi), Some(si)) = (buy_idx, sell_idx) else {
                break;
            };
            if self.orders[bi].price < self.orders[si].price {
                break;
            }

            let trade_price = self.orders[si].price;
            let trade_amount = self.orders[bi].remaining().min(self.orders[si].remaining());
            if trade_amount <= 0.0 {
                break;
            }

            self.orders[bi].filled += trade_amount;
            self.orders[si].filled += trade_amount;

            for idx in [bi, si] {
                self.orders[idx].status = if self.orders[idx].remaining() <= 1e-12 {
                    OrderStatus::Filled
                } else {
                    OrderStatus::PartiallyFilled
                };
            }

            fills.push(Fill {
                buy_order_id: self.orders[bi].id.clone(),
                sell_order_id: self.orders[si].id.clone(),
                price: trade_price,
                amount: trade_amount,
            });
        }

        fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: &str, owner: &str, side: OrderSide, price: f64, amount: f64, created_at: i64) -> LimitOrder {
        LimitOrder {
            id: id.to_string(),
            owner: owner.to_string(),
            market: "CRWN-USDT".into(),
            side,
            price,
            amount,
            filled: 0.0,
            status: OrderStatus::Open,
            created_at,
        }
    }

    #[test]
    fn crossing_orders_fill_at_maker_price() {
        let mut book = OrderBook::new("CRWN-USDT");
        book.place(order("sell-1", "alice", OrderSide::Sell, 0.12, 100.0, 1)).unwrap();
        let fills = book
            .place(order("buy-1", "bob", OrderSide::Buy, 0.13, 100.0, 2))
            .unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 0.12);
        assert_eq!(fills[0].amount, 100.0);
        assert!(matches!(book.get("sell-1").unwrap().status, OrderStatus::Filled));
        assert!(matches!(book.get("buy-1").unwrap().status, OrderStatus::Filled));
    }

    #[test]
    fn non_crossing_orders_stay_open() {
        let mut book = OrderBook::new("CRWN-USDT");
        book.place(order("sell-1", "alice", OrderSide::Sell, 0.15, 100.0, 1)).unwrap();
        let fills = book
            .place(order("buy-1", "bob", OrderSide::Buy, 0.10, 100.0, 2))
            .unwrap();
        assert!(fills.is_empty());
    }

    #[test]
    fn partial_fill_leaves_remainder_open() {
        let mut book = OrderBook::new("CRWN-USDT");
        book.place(order("sell-1", "alice", OrderSide::Sell, 0.12, 40.0, 1)).unwrap();
        let fills = book
            .place(order("buy-1", "bob", OrderSide::Buy, 0.12, 100.0, 2))
            .unwrap();
        assert_eq!(fills[0].amount, 40.0);
        assert!(matches!(
            book.get("buy-1").unwrap().status,
            OrderStatus::PartiallyFilled
        ));
        assert_eq!(book.get("buy-1").unwrap().remaining(), 60.0);
    }

    #[test]
    fn cancel_rejects_non_owner() {
        let mut book = OrderBook::new("CRWN-USDT");
        book.place(order("sell-1", "alice", OrderSide::Sell, 0.12, 40.0, 1)).unwrap();
        let result = book.cancel("sell-1", "mallory");
        assert!(matches!(result, Err(AppError::AuthRequired)));
    }
}
