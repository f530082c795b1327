//! Black-box scenarios exercising the gateway's public API end to end
//! against an in-memory store, seeded from the worked examples in
//! spec.md §8. No HTTP layer involved — these call straight through
//! `Gateway`, the same entry point `api::handlers::*` wraps.

use crowny_exchange::config::Config;
use crowny_exchange::db;
use crowny_exchange::dex::orderbook::OrderSide;
use crowny_exchange::gateway::Gateway;
use crowny_exchange::venues::Venue;

fn test_config() -> Config {
    Config {
        port: 0,
        db_path: "unused".into(),
        jwt_secret: "test-secret".to_string(),
        encryption_key: [0x11u8; 32],
    }
}

async fn new_gateway() -> Gateway {
    let db = db::open_in_memory();
    Gateway::new(db, &test_config()).expect("constructing gateway")
}

async fn register(gateway: &Gateway, email: &str, username: &str) -> String {
    gateway
        .register_principal(email, username, "bcrypt-hash-placeholder")
        .await
        .expect("register")
        .id
}

#[tokio::test]
async fn register_mints_the_default_starter_wallet() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;

    let balances = gateway.dex_balances(&uid).await.unwrap();
    let get = |token: &str| balances.iter().find(|(t, _)| t == token).map(|(_, w)| w.balance).unwrap();

    assert_eq!(get("CRWN"), 1_000_000);
    assert_eq!(get("USDT"), 500_000);
    assert_eq!(get("ETH"), 100);
    assert_eq!(get("BTC"), 5);
    assert_eq!(get("KRW"), 100_000_000);
}

#[tokio::test]
async fn duplicate_email_or_username_is_a_conflict() {
    let gateway = new_gateway().await;
    register(&gateway, "a@a", "a").await;

    let result = gateway.register_principal("a@a", "different", "hash").await;
    assert!(matches!(result, Err(crowny_exchange::error::AppError::Conflict(_))));
}

#[tokio::test]
async fn bootstrap_pool_pricing_matches_spec_scenario() {
    let gateway = new_gateway().await;
    let summary = gateway.dex_pool_summary("CRWN-USDT").unwrap();

    assert_eq!(summary.reserve_a, 10_000_000);
    assert_eq!(summary.reserve_b, 1_250_000);
    assert_eq!(summary.fee_bps, 30);
    assert!((summary.price - 0.125).abs() < 1e-12);
}

#[tokio::test]
async fn swap_debits_token_in_and_credits_token_out() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;

    let before = gateway.dex_balances(&uid).await.unwrap();
    let crwn_before = before.iter().find(|(t, _)| t == "CRWN").unwrap().1.balance;

    let result = gateway.dex_swap(&uid, "CRWN-USDT", "CRWN", 10_000).await.unwrap();
    let amount_out: u128 = result["amountOut"].as_str().unwrap().parse().unwrap();
    let fee: u128 = result["fee"].as_str().unwrap().parse().unwrap();

    // floor(1_250_000 - floor(k / (10_000_000 + 10_000*(1-0.003))))
    assert_eq!(fee, 30);
    assert_eq!(amount_out, 1_246);

    let after = gateway.dex_balances(&uid).await.unwrap();
    let crwn_after = after.iter().find(|(t, _)| t == "CRWN").unwrap().1.balance;
    let usdt_after = after.iter().find(|(t, _)| t == "USDT").unwrap().1.balance;

    assert_eq!(crwn_before - crwn_after, 10_000);
    assert_eq!(usdt_after, 500_000 + amount_out);

    let pool_after = gateway.dex_pool_summary("CRWN-USDT").unwrap();
    let k_after = pool_after.reserve_a * pool_after.reserve_b;
    let k_before = 10_000_000u128 * 1_250_000u128;
    assert!(k_after > k_before);
}

#[tokio::test]
async fn swap_on_unknown_token_is_bad_input() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;
    let result = gateway.dex_swap(&uid, "CRWN-USDT", "KRW", 100).await;
    assert!(matches!(result, Err(crowny_exchange::error::AppError::BadInput(_))));
}

#[tokio::test]
async fn swap_without_balance_is_insufficient_balance() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;
    let result = gateway.dex_swap(&uid, "CRWN-USDT", "CRWN", 10_000_000).await;
    assert!(matches!(result, Err(crowny_exchange::error::AppError::InsufficientBalance)));
}

#[tokio::test]
async fn rate_limit_blocks_the_101st_call_in_one_window() {
    let gateway = new_gateway().await;
    for _ in 0..100 {
        gateway.check_rate_limit("principal-x").await.unwrap();
    }
    let result = gateway.check_rate_limit("principal-x").await;
    assert!(matches!(result, Err(crowny_exchange::error::AppError::RateLimited(_))));
}

#[tokio::test]
async fn limit_order_locks_then_settles_on_fill() {
    let gateway = new_gateway().await;
    let buyer = register(&gateway, "buyer@x", "buyer").await;
    let seller = register(&gateway, "seller@x", "seller").await;

    // Seller needs CRWN inventory to sell; they already hold 1_000_000 from
    // registration.
    gateway
        .dex_place_order(&seller, "CRWN-USDT", OrderSide::Sell, 0.2, 1_000.0)
        .await
        .unwrap();

    let seller_balances = gateway.dex_balances(&seller).await.unwrap();
    let seller_crwn = seller_balances.iter().find(|(t, _)| t == "CRWN").unwrap().1;
    assert_eq!(seller_crwn.locked, 1_000);

    let buyer_before = gateway.dex_balances(&buyer).await.unwrap();
    let buyer_usdt_before = buyer_before.iter().find(|(t, _)| t == "USDT").unwrap().1.balance;

    // Buy order crosses the resting sell at price 0.2: fills at the maker
    // (sell) price, settling both sides' locked balances.
    gateway
        .dex_place_order(&buyer, "CRWN-USDT", OrderSide::Buy, 0.2, 1_000.0)
        .await
        .unwrap();

    let buyer_after = gateway.dex_balances(&buyer).await.unwrap();
    let buyer_crwn_after = buyer_after.iter().find(|(t, _)| t == "CRWN").unwrap().1.balance;
    let buyer_usdt_after = buyer_after.iter().find(|(t, _)| t == "USDT").unwrap().1;
    assert_eq!(buyer_crwn_after, 1_000_000 + 1_000);
    assert_eq!(buyer_usdt_after.locked, 0);
    assert_eq!(buyer_usdt_before - buyer_usdt_after.balance, 200);

    let seller_after = gateway.dex_balances(&seller).await.unwrap();
    let seller_crwn_after = seller_after.iter().find(|(t, _)| t == "CRWN").unwrap().1;
    let seller_usdt_after = seller_after.iter().find(|(t, _)| t == "USDT").unwrap().1.balance;
    assert_eq!(seller_crwn_after.locked, 0);
    assert_eq!(seller_crwn_after.balance, 1_000_000 - 1_000);
    assert_eq!(seller_usdt_after, 500_000 + 200);
}

#[tokio::test]
async fn crossing_buy_releases_the_price_improvement_lock() {
    let gateway = new_gateway().await;
    let buyer = register(&gateway, "buyer2@x", "buyer2").await;
    let seller = register(&gateway, "seller2@x", "seller2").await;

    gateway
        .dex_place_order(&seller, "CRWN-USDT", OrderSide::Sell, 0.12, 1_000.0)
        .await
        .unwrap();

    let buyer_before = gateway.dex_balances(&buyer).await.unwrap();
    let buyer_usdt_before = buyer_before.iter().find(|(t, _)| t == "USDT").unwrap().1.balance;

    // Bid at 0.13 crosses the resting 0.12 ask: the fill settles at the
    // maker price, so only floor(0.12*1000) = 120 should ever leave the
    // buyer's balance/lock, not floor(0.13*1000) = 130.
    gateway
        .dex_place_order(&buyer, "CRWN-USDT", OrderSide::Buy, 0.13, 1_000.0)
        .await
        .unwrap();

    let buyer_after = gateway.dex_balances(&buyer).await.unwrap();
    let buyer_usdt_after = buyer_after.iter().find(|(t, _)| t == "USDT").unwrap().1;
    let buyer_crwn_after = buyer_after.iter().find(|(t, _)| t == "CRWN").unwrap().1.balance;

    assert_eq!(buyer_usdt_after.locked, 0, "no price-improvement residual should stay locked");
    assert_eq!(buyer_usdt_before - buyer_usdt_after.balance, 120);
    assert_eq!(buyer_crwn_after, 1_000_000 + 1_000);

    let seller_after = gateway.dex_balances(&seller).await.unwrap();
    let seller_usdt_after = seller_after.iter().find(|(t, _)| t == "USDT").unwrap().1.balance;
    assert_eq!(seller_usdt_after, 500_000 + 120);
}

#[tokio::test]
async fn cancel_order_releases_the_remaining_lock() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;

    let response = gateway
        .dex_place_order(&uid, "CRWN-USDT", OrderSide::Sell, 1.0, 500.0)
        .await
        .unwrap();
    let order_id = response["orderId"].as_str().unwrap().to_string();

    let locked_balances = gateway.dex_balances(&uid).await.unwrap();
    assert_eq!(locked_balances.iter().find(|(t, _)| t == "CRWN").unwrap().1.locked, 500);

    gateway.dex_cancel_order(&uid, "CRWN-USDT", &order_id).await.unwrap();

    let after = gateway.dex_balances(&uid).await.unwrap();
    let crwn_after = after.iter().find(|(t, _)| t == "CRWN").unwrap().1;
    assert_eq!(crwn_after.locked, 0);
    assert_eq!(crwn_after.balance, 1_000_000);
}

#[tokio::test]
async fn key_round_trip_masks_access_and_secret() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;

    let saved = gateway
        .settings_save_api_keys(&uid, Venue::BinanceLike, "AK_1234567890ABCDEF", "SK_abcdefghijklmnop")
        .await
        .unwrap();
    assert_eq!(saved["accessKey"], "AK_12345...CDEF");

    let listed = gateway.settings_list_api_keys(&uid).await.unwrap();
    let keys = listed["keys"].as_array().unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0]["accessKey"], "AK_12345...CDEF");
    assert_eq!(keys[0]["secretKey"], "****mnop");

    assert!(!gateway.executor.has_cached_client(&uid, Venue::BinanceLike).await);
}

#[tokio::test]
async fn deleting_keys_invalidates_the_executor_cache() {
    let gateway = new_gateway().await;
    let uid = register(&gateway, "a@a", "a").await;
    gateway
        .settings_save_api_keys(&uid, Venue::UpbitLike, "access-key-aaaaaaaaaa", "secret-key-bbbbbbbbbb")
        .await
        .unwrap();

    gateway.settings_delete_api_keys(&uid, Venue::UpbitLike).await.unwrap();
    let result = gateway.executor.client(&uid, Venue::UpbitLike).await;
    assert!(matches!(result, Err(crowny_exchange::error::AppError::NotFound(_))));
}
