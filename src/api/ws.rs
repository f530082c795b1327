//! WebSocket transport: one broadcast receiver per connection fanning out
//! `EventBus` publications, plus a small client->server command set
//! (`auth`, `subscribe_prices`, `analyze`). Generalized from a one-way SSE
//! replay loop into a duplex `tokio::select!` over an axum `WebSocket`.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use super::state::AppState;
use crate::gateway::EngineEvent;
use crate::venues::market::to_venue_symbol;
use crate::venues::Venue;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>, Query(q): Query<WsQuery>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, q.token))
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Auth { token: String },
    SubscribePrices,
    Analyze { exchange: String, symbol: String, #[serde(default = "default_interval")] interval: String, #[serde(default = "default_count")] count: u32 },
}

fn default_interval() -> String {
    "1h".to_string()
}

fn default_count() -> u32 {
    200
}

fn parse_venue(s: &str) -> Option<Venue> {
    match s.to_lowercase().as_str() {
        "upbit" => Some(Venue::UpbitLike),
        "binance" => Some(Venue::BinanceLike),
        _ => None,
    }
}

async fn handle_socket(mut socket: WebSocket, state: AppState, initial_token: Option<String>) {
    let mut principal_id = initial_token.and_then(|t| crate::api::auth::verify_jwt(&t, &state.gateway.jwt_secret).ok()).map(|c| c.sub);
    let mut subscribed_prices = false;
    let mut events = state.gateway.events.subscribe();

    let connected = json!({ "type": "connected", "authenticated": principal_id.is_some() });
    if socket.send(Message::Text(connected.to_string().into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(msg)) = incoming else { break };
                let Message::Text(text) = msg else { continue };
                let Ok(cmd) = serde_json::from_str::<ClientMessage>(&text) else { continue };
                match cmd {
                    ClientMessage::Auth { token } => {
                        match crate::api::auth::verify_jwt(&token, &state.gateway.jwt_secret) {
                            Ok(claims) => {
                                principal_id = Some(claims.sub);
                                let _ = socket.send(Message::Text(json!({ "type": "auth_ok" }).to_string().into())).await;
                            }
                            Err(_) => {
                                let _ = socket.send(Message::Text(json!({ "type": "auth_error" }).to_string().into())).await;
                            }
                        }
                    }
                    ClientMessage::SubscribePrices => {
                        subscribed_prices = true;
                    }
                    ClientMessage::Analyze { exchange, symbol, interval, count } => {
                        let Some(venue) = parse_venue(&exchange) else {
                            let _ = socket.send(Message::Text(json!({ "type": "analyze_error", "error": "unknown exchange" }).to_string().into())).await;
                            continue;
                        };
                        let market_symbol = to_venue_symbol(venue, &symbol);
                        let reply = match state.gateway.market.fetch_candles(venue, &market_symbol, &interval, count).await {
                            Ok(candles) if candles.len() >= 50 => {
                                let price = candles.last().unwrap().close;
                                let risk_key = format!("ws:{exchange}:{symbol}");
                                let consensus = crate::ai::analyze(&candles, &state.gateway.risk, &risk_key, price, 10_000.0);
                                json!({ "type": "analyze_result", "symbol": symbol, "consensus": consensus })
                            }
                            Ok(_) => json!({ "type": "analyze_error", "error": "not enough candles" }),
                            Err(e) => json!({ "type": "analyze_error", "error": e.to_string() }),
                        };
                        if socket.send(Message::Text(reply.to_string().into())).await.is_err() {
                            break;
                        }
                    }
                }
            }
            event = events.recv() => {
                let Ok(event) = event else { continue };
                if matches!(event, EngineEvent::DexUpdate { .. }) && !subscribed_prices {
                    continue;
                }
                if let Some(owner) = event.scoped_principal() {
                    if principal_id.as_deref() != Some(owner) {
                        continue;
                    }
                }
                let Ok(text) = serde_json::to_string(&event) else { continue };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}
