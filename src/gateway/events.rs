//! Event bus: a ring buffer (cap 1000) backs `GET /api/events`, and a
//! `tokio::broadcast` channel drives the websocket fan-out. Uses a
//! tagged-enum shape (`#[serde(tag = "type")]`) over the market-event
//! vocabulary.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

const RING_CAPACITY: usize = 1000;
const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    #[serde(rename = "swap")]
    Swap {
        #[serde(rename = "poolId")]
        pool_id: String,
        #[serde(rename = "principalId")]
        principal_id: String,
        #[serde(rename = "amountIn")]
        amount_in: String,
        #[serde(rename = "amountOut")]
        amount_out: String,
        trit: String,
    },
    #[serde(rename = "liquidity")]
    Liquidity {
        #[serde(rename = "poolId")]
        pool_id: String,
        #[serde(rename = "principalId")]
        principal_id: String,
        shares: String,
    },
    #[serde(rename = "order")]
    Order {
        #[serde(rename = "poolId")]
        pool_id: String,
        #[serde(rename = "orderId")]
        order_id: String,
        #[serde(rename = "principalId")]
        principal_id: String,
        status: String,
    },
    #[serde(rename = "dex_update")]
    DexUpdate { pools: Vec<crate::dex::PoolSummary> },
    #[serde(rename = "exchange_order")]
    ExchangeOrder {
        #[serde(rename = "principalId")]
        principal_id: String,
        #[serde(rename = "orderId")]
        order_id: String,
        status: String,
    },
    #[serde(rename = "auto_trade")]
    AutoTrade {
        #[serde(rename = "principalId")]
        principal_id: String,
        venue: String,
        symbol: String,
        decision: String,
    },
    #[serde(rename = "auto_error")]
    AutoError {
        #[serde(rename = "principalId")]
        principal_id: String,
        venue: String,
        error: String,
    },
    #[serde(rename = "auto_trade_paused")]
    AutoTradePaused {
        #[serde(rename = "principalId")]
        principal_id: String,
        venue: String,
        reason: String,
    },
}

impl EngineEvent {
    /// `exchange_order`/`auto_trade`/`auto_error`/`auto_trade_paused` are
    /// scoped to the owning principal's socket; every other kind fans out
    /// to all connected clients.
    pub fn scoped_principal(&self) -> Option<&str> {
        match self {
            EngineEvent::ExchangeOrder { principal_id, .. }
            | EngineEvent::AutoTrade { principal_id, .. }
            | EngineEvent::AutoError { principal_id, .. }
            | EngineEvent::AutoTradePaused { principal_id, .. } => Some(principal_id),
            _ => None,
        }
    }
}

pub struct EventBus {
    ring: RwLock<VecDeque<EngineEvent>>,
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { ring: RwLock::new(VecDeque::with_capacity(RING_CAPACITY)), sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub async fn publish(&self, event: EngineEvent) {
        {
            let mut ring = self.ring.write().await;
            if ring.len() >= RING_CAPACITY {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
        // A send error just means nobody is currently subscribed; the ring
        // buffer above is the durable record for GET /api/events.
        let _ = self.sender.send(event);
    }

    pub async fn tail(&self, limit: usize) -> Vec<EngineEvent> {
        let ring = self.ring.read().await;
        ring.iter().rev().take(limit).cloned().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
