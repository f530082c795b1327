//! Persistence layer: a single SQLite file behind a mutex, WAL mode,
//! foreign keys on. Built around an `open`/`migrate` shape with an
//! `Arc<Mutex<Connection>>` handle, generalized to the exchange's schema
//! and atomic wallet/order operations.

pub mod auto_trade;
pub mod keys;
pub mod pools;
mod schema;
pub mod sessions;
pub mod signals;
pub mod users;
pub mod venue_orders;
pub mod wallets;

pub use auto_trade::*;
pub use keys::*;
pub use pools::*;
pub use sessions::*;
pub use signals::*;
pub use users::*;
pub use venue_orders::*;
pub use wallets::*;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tokio::sync::Mutex;

pub type Db = Arc<Mutex<Connection>>;

pub fn open(path: &Path) -> Result<Db> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).context("creating db directory")?;
        }
    }

    let conn = Connection::open(path).with_context(|| format!("opening sqlite at {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
    schema::migrate(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

/// An ephemeral in-memory store, used by unit tests throughout `db::*` and
/// by the black-box scenarios under `tests/`.
pub fn open_in_memory() -> Db {
    let conn = Connection::open_in_memory().expect("opening in-memory sqlite");
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    schema::migrate(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

/// Run `f` inside a single SQLite transaction; on `Err` the transaction is
/// rolled back and no partial state is visible. Used by the gateway's
/// swap/addLiquidity/placeOrder paths.
pub async fn transaction<T, F>(db: &Db, f: F) -> Result<T>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T>,
{
    let mut conn = db.lock().await;
    let tx = conn.transaction().context("opening transaction")?;
    let result = f(&tx)?;
    tx.commit().context("committing transaction")?;
    Ok(result)
}
