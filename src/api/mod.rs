//! HTTP + WebSocket transport (spec C11 / §6). Builds the axum `Router`
//! over the gateway, runs the global 5s DEX ticker, and flushes pool state
//! on graceful shutdown. Grounded on the teacher's `api::serve` entry point
//! and router-assembly shape, generalized from its workflow-run routes to
//! the exchange's auth/dex/market/ai/exchange/settings/auto/events surface.

pub mod auth;
pub mod handlers;
pub mod middleware;
pub mod state;
pub mod ws;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::db;
use crate::gateway::scheduler::AutoTradeScheduler;
use crate::gateway::{EngineEvent, Gateway};
use state::AppState;

const BODY_LIMIT_BYTES: usize = 1_048_576;
const TICKER_INTERVAL: Duration = Duration::from_secs(5);

async fn health() -> &'static str {
    "ok"
}

#[derive(Deserialize)]
struct EventsQuery {
    #[serde(default = "default_events_limit")]
    limit: usize,
}

fn default_events_limit() -> usize {
    50
}

async fn events_tail(State(state): State<AppState>, user: middleware::AuthUser, Query(q): Query<EventsQuery>) -> Json<Value> {
    let _ = &user;
    Json(json!({ "events": state.gateway.events_tail(q.limit).await }))
}

/// Publishes a synthetic `dex_update` snapshot every 5s, independent of any
/// websocket subscriber — connections opt into seeing it via
/// `subscribe_prices`.
fn spawn_dex_ticker(gateway: Arc<Gateway>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(TICKER_INTERVAL);
        loop {
            ticker.tick().await;
            let pools = gateway.dex_pool_summaries();
            gateway.events.publish(EngineEvent::DexUpdate { pools }).await;
        }
    });
}

/// Waits for SIGINT or SIGTERM, then returns so `axum::serve`'s graceful
/// shutdown can finish in-flight requests.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sig = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).expect("installing SIGTERM handler");
        sig.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

/// Best-effort flush of every in-memory pool back to the store.
async fn flush_pools(gateway: &Gateway) {
    for pool_id in gateway.dex.pool_ids() {
        if let Ok(snapshot) = gateway.dex.pool_snapshot(&pool_id) {
            if let Err(e) = db::pools::save_pool(&gateway.db, &snapshot).await {
                tracing::warn!(pool_id, error = %e, "failed to flush pool on shutdown");
            }
        }
    }
}

pub async fn serve(host: &str, config: Config) -> Result<()> {
    let db = db::open(&config.db_path).with_context(|| format!("opening database at {}", config.db_path.display()))?;
    let gateway = Arc::new(Gateway::new(db, &config).context("constructing gateway")?);
    let scheduler = AutoTradeScheduler::new(gateway.clone());
    scheduler.restore().await;
    spawn_dex_ticker(gateway.clone());

    let state = AppState { gateway: gateway.clone(), scheduler };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/status", get(|State(state): State<AppState>| async move { Json(state.gateway.status_summary()) }))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/dex/summary", get(handlers::dex::summary))
        .route("/api/dex/pools", get(handlers::dex::pools))
        .route("/api/dex/tokens", get(handlers::dex::tokens))
        .route("/api/dex/orderbook", get(handlers::dex::orderbook))
        .route("/api/dex/history", get(handlers::dex::history))
        .route("/api/dex/balances", get(handlers::dex::balances))
        .route("/api/dex/swap", post(handlers::dex::swap))
        .route("/api/dex/liquidity", post(handlers::dex::liquidity))
        .route("/api/dex/order", post(handlers::dex::place_order).delete(handlers::dex::cancel_order))
        .route("/api/market/prices", get(handlers::market::prices))
        .route("/api/market/candles", get(handlers::market::candles))
        .route("/api/market/orderbook", get(handlers::market::orderbook))
        .route("/api/ai/analyze", get(handlers::ai::analyze))
        .route("/api/ai/backtest", get(handlers::ai::backtest))
        .route("/api/ai/multi-analyze", get(handlers::ai::multi_analyze))
        .route("/api/exchange/order", post(handlers::exchange::place_order))
        .route("/api/exchange/cancel", post(handlers::exchange::cancel_order))
        .route("/api/exchange/balance", get(handlers::exchange::balance))
        .route("/api/exchange/orders", get(handlers::exchange::open_orders))
        .route("/api/exchange/history", get(handlers::exchange::history))
        .route(
            "/api/settings/api-keys",
            post(handlers::settings::save_api_keys).get(handlers::settings::list_api_keys).delete(handlers::settings::delete_api_keys),
        )
        .route("/api/auto/enable", post(handlers::auto::enable))
        .route("/api/auto/disable", post(handlers::auto::disable))
        .route("/api/auto/status", get(handlers::auto::status))
        .route("/api/events", get(events_tail))
        .route("/ws", get(ws::handler))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(cors)
        .with_state(state);

    let port = config.port;
    let addr = format!("{host}:{port}");
    tracing::info!(addr, "crowny-exchange listening");

    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("binding to {addr}"))?;

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.context("running server")?;

    flush_pools(&gateway).await;
    tracing::info!("flushed pool state, shutting down");

    Ok(())
}
