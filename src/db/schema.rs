use anyhow::Result;
use rusqlite::Connection;

/// Logical data model, expressed as `CREATE TABLE IF NOT EXISTS`
/// statements (idempotent across restarts). The token registry and
/// in-memory pool/order-book state are rebuilt at boot by
/// `DexEngine::bootstrap`; only the data that must survive a restart is
/// persisted here.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT UNIQUE NOT NULL,
            username      TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            role          TEXT NOT NULL DEFAULT 'user',
            created_at    INTEGER NOT NULL,
            last_login    INTEGER
        );

        CREATE TABLE IF NOT EXISTS wallets (
            principal_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token        TEXT NOT NULL,
            balance      TEXT NOT NULL DEFAULT '0',
            locked       TEXT NOT NULL DEFAULT '0',
            PRIMARY KEY (principal_id, token)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token        TEXT PRIMARY KEY,
            principal_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at   INTEGER NOT NULL,
            expires_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pools (
            id              TEXT PRIMARY KEY,
            token_a         TEXT NOT NULL,
            token_b         TEXT NOT NULL,
            reserve_a       TEXT NOT NULL,
            reserve_b       TEXT NOT NULL,
            fee_bps         INTEGER NOT NULL,
            total_lp_shares TEXT NOT NULL,
            swap_count      INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS lp_holders (
            pool_id      TEXT NOT NULL REFERENCES pools(id) ON DELETE CASCADE,
            principal_id TEXT NOT NULL,
            shares       TEXT NOT NULL,
            PRIMARY KEY (pool_id, principal_id)
        );

        CREATE TABLE IF NOT EXISTS limit_orders (
            id         TEXT PRIMARY KEY,
            owner      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            pool_id    TEXT NOT NULL,
            side       TEXT NOT NULL,
            price      REAL NOT NULL,
            amount     REAL NOT NULL,
            filled     REAL NOT NULL DEFAULT 0,
            status     TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS swaps (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            principal_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            pool_id       TEXT NOT NULL,
            token_in      TEXT NOT NULL,
            token_out     TEXT NOT NULL,
            amount_in     TEXT NOT NULL,
            amount_out    TEXT NOT NULL,
            fee           TEXT NOT NULL,
            price_impact  REAL NOT NULL,
            trit          TEXT NOT NULL,
            created_at    INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS venue_orders (
            id                TEXT PRIMARY KEY,
            principal_id      TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            venue             TEXT NOT NULL,
            symbol            TEXT NOT NULL,
            side              TEXT NOT NULL,
            order_type        TEXT NOT NULL,
            price             REAL,
            quantity          REAL NOT NULL,
            status            TEXT NOT NULL,
            exchange_order_id TEXT,
            filled_qty        REAL NOT NULL DEFAULT 0,
            filled_price      REAL,
            fee               REAL NOT NULL DEFAULT 0,
            source            TEXT NOT NULL,
            ai_signal_id      TEXT,
            error             TEXT,
            created_at        INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS ai_signals (
            id           TEXT PRIMARY KEY,
            symbol       TEXT NOT NULL,
            venue        TEXT NOT NULL,
            interval     TEXT NOT NULL,
            signal       TEXT NOT NULL,
            score        REAL NOT NULL,
            confidence   REAL NOT NULL,
            trit         TEXT NOT NULL,
            strategies   TEXT NOT NULL,
            risk         TEXT NOT NULL,
            created_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS auto_trade_configs (
            principal_id        TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            venue               TEXT NOT NULL,
            enabled             INTEGER NOT NULL DEFAULT 0,
            symbols             TEXT NOT NULL DEFAULT 'BTCUSDT,ETHUSDT',
            max_position_pct    REAL NOT NULL DEFAULT 0.1,
            stop_loss_pct       REAL NOT NULL DEFAULT 0.03,
            take_profit_pct     REAL NOT NULL DEFAULT 0.06,
            min_confidence      REAL NOT NULL DEFAULT 0.7,
            max_daily_trades    INTEGER NOT NULL DEFAULT 10,
            daily_trades_used   INTEGER NOT NULL DEFAULT 0,
            consecutive_losses  INTEGER NOT NULL DEFAULT 0,
            max_consecutive_losses INTEGER NOT NULL DEFAULT 3,
            PRIMARY KEY (principal_id, venue)
        );

        CREATE TABLE IF NOT EXISTS key_records (
            principal_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            venue         TEXT NOT NULL,
            access_cipher TEXT NOT NULL,
            secret_cipher TEXT NOT NULL,
            iv            TEXT NOT NULL,
            auth_tag      TEXT NOT NULL,
            permissions   TEXT NOT NULL DEFAULT 'trade',
            PRIMARY KEY (principal_id, venue)
        );
        ",
    )?;
    Ok(())
}
