//! SQLite ledger adapter.
//!
//! Money columns hold scaled integers (ten-thousandths); timestamps are
//! RFC 3339 text.

use crate::domain::account::Account;
use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::domain::position::{Fill, NewTrade, Position, Trade, TradeSide};
use crate::domain::strategy::{NewStrategy, Strategy, StrategyKind};
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::{AccountStore, PositionStore, SettlementStore, StrategyPort, TradeLedger};
use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct SqliteLedger {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> PapertraderError {
    PapertraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PapertraderError {
    PapertraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

impl SqliteLedger {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PapertraderError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PapertraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, PapertraderError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), PapertraderError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                user_id INTEGER PRIMARY KEY,
                current_balance INTEGER NOT NULL,
                initial_balance INTEGER NOT NULL,
                total_assets INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS positions (
                user_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                quantity INTEGER NOT NULL CHECK (quantity > 0),
                cost_price INTEGER NOT NULL,
                current_price INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_id, symbol)
            );
            CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                price INTEGER NOT NULL,
                executed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_user ON trades(user_id, id);
            CREATE TABLE IF NOT EXISTS strategies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                strategy_type TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 0,
                rules TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_strategies_user ON strategies(user_id);",
        )
        .map_err(query_err)?;

        Ok(())
    }
}

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        user_id: row.get(0)?,
        current_balance: Money::from_scaled(row.get(1)?),
        initial_balance: Money::from_scaled(row.get(2)?),
        total_assets: Money::from_scaled(row.get(3)?),
    })
}

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Option<Position>> {
    let symbol: String = row.get(0)?;
    Ok(Position::new(
        &symbol,
        row.get(1)?,
        Money::from_scaled(row.get(2)?),
        Money::from_scaled(row.get(3)?),
    ))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PapertraderError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| PapertraderError::DatabaseQuery {
            reason: format!("invalid timestamp '{}': {}", raw, e),
        })
}

fn strategy_from_row(row: &Row<'_>) -> rusqlite::Result<Strategy> {
    let kind: String = row.get(4)?;
    let active: i64 = row.get(5)?;
    Ok(Strategy {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        kind: StrategyKind::from(kind),
        is_active: active != 0,
        rules: row.get(6)?,
    })
}

const ACCOUNT_COLUMNS: &str = "user_id, current_balance, initial_balance, total_assets";
const STRATEGY_COLUMNS: &str = "id, user_id, name, description, strategy_type, is_active, rules";

/// Set cash and refresh total assets from open positions. Errors when the
/// user has no account.
fn write_balance(conn: &Connection, user_id: i64, balance: Money) -> Result<Account, PapertraderError> {
    let holdings: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(quantity * current_price), 0) FROM positions WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .map_err(query_err)?;
    let scaled = balance.to_scaled();
    let changed = conn
        .execute(
            "UPDATE accounts SET current_balance = ?2, total_assets = ?3 WHERE user_id = ?1",
            params![user_id, scaled, scaled.saturating_add(holdings)],
        )
        .map_err(query_err)?;
    if changed == 0 {
        return Err(PapertraderError::DatabaseQuery {
            reason: format!("no account for user {}", user_id),
        });
    }
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
        params![user_id],
        account_from_row,
    )
    .map_err(query_err)
}

fn write_position(
    conn: &Connection,
    user_id: i64,
    symbol: &str,
    quantity: i64,
    current_price: Money,
) -> Result<(), PapertraderError> {
    if quantity <= 0 {
        conn.execute(
            "DELETE FROM positions WHERE user_id = ?1 AND symbol = ?2",
            params![user_id, symbol],
        )
        .map_err(query_err)?;
        return Ok(());
    }

    let price = current_price.to_scaled();
    conn.execute(
        "INSERT INTO positions (user_id, symbol, quantity, cost_price, current_price, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4, ?5)
         ON CONFLICT (user_id, symbol) DO UPDATE SET
            quantity = excluded.quantity,
            current_price = excluded.current_price,
            updated_at = excluded.updated_at",
        params![user_id, symbol, quantity, price, Utc::now().to_rfc3339()],
    )
    .map_err(query_err)?;
    Ok(())
}

fn insert_trade(conn: &Connection, user_id: i64, trade: &NewTrade) -> Result<Trade, PapertraderError> {
    conn.execute(
        "INSERT INTO trades (user_id, symbol, side, quantity, price, executed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user_id,
            trade.symbol,
            trade.side.as_str(),
            trade.quantity,
            trade.price.to_scaled(),
            trade.executed_at.to_rfc3339()
        ],
    )
    .map_err(query_err)?;

    Ok(Trade {
        id: conn.last_insert_rowid(),
        user_id,
        symbol: trade.symbol.clone(),
        side: trade.side,
        quantity: trade.quantity,
        price: trade.price,
        executed_at: trade.executed_at,
    })
}

impl AccountStore for SqliteLedger {
    fn get_or_create(&self, user_id: i64, initial_balance: Money) -> Result<Account, PapertraderError> {
        let conn = self.conn()?;
        let scaled = initial_balance.to_scaled();
        conn.execute(
            "INSERT OR IGNORE INTO accounts (user_id, current_balance, initial_balance, total_assets)
             VALUES (?1, ?2, ?2, ?2)",
            params![user_id, scaled],
        )
        .map_err(query_err)?;

        conn.query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE user_id = ?1"),
            params![user_id],
            account_from_row,
        )
        .map_err(query_err)
    }

    fn update_balance(&self, user_id: i64, balance: Money) -> Result<Account, PapertraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let account = write_balance(&tx, user_id, balance)?;
        tx.commit().map_err(query_err)?;
        Ok(account)
    }
}

impl PositionStore for SqliteLedger {
    fn get(&self, user_id: i64, symbol: &str) -> Result<Option<Position>, PapertraderError> {
        let conn = self.conn()?;
        let position = conn
            .query_row(
                "SELECT symbol, quantity, cost_price, current_price
                 FROM positions WHERE user_id = ?1 AND symbol = ?2",
                params![user_id, symbol],
                position_from_row,
            )
            .optional()
            .map_err(query_err)?;
        Ok(position.flatten())
    }

    fn list(&self, user_id: i64) -> Result<Vec<Position>, PapertraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, quantity, cost_price, current_price
                 FROM positions WHERE user_id = ?1 ORDER BY symbol",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id], position_from_row)
            .map_err(query_err)?;

        let mut positions = Vec::new();
        for row in rows {
            if let Some(position) = row.map_err(query_err)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    fn upsert(
        &self,
        user_id: i64,
        symbol: &str,
        quantity: i64,
        current_price: Money,
    ) -> Result<(), PapertraderError> {
        let conn = self.conn()?;
        write_position(&conn, user_id, symbol, quantity, current_price)
    }
}

impl TradeLedger for SqliteLedger {
    fn record(&self, user_id: i64, trade: &NewTrade) -> Result<Trade, PapertraderError> {
        let conn = self.conn()?;
        insert_trade(&conn, user_id, trade)
    }

    fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<Trade>, PapertraderError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, side, quantity, price, executed_at
                 FROM trades WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .map_err(query_err)?;

        let mut trades = Vec::new();
        for row in rows {
            let (id, symbol, side, quantity, price, executed_at) = row.map_err(query_err)?;
            let side: TradeSide = side
                .parse()
                .map_err(|reason| PapertraderError::DatabaseQuery { reason })?;
            trades.push(Trade {
                id,
                user_id,
                symbol,
                side,
                quantity,
                price: Money::from_scaled(price),
                executed_at: parse_timestamp(&executed_at)?,
            });
        }
        Ok(trades)
    }
}

impl SettlementStore for SqliteLedger {
    fn apply_fill(&self, user_id: i64, fill: &Fill) -> Result<Trade, PapertraderError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        let trade = insert_trade(&tx, user_id, &fill.trade)?;
        write_position(&tx, user_id, &fill.trade.symbol, fill.position_quantity, fill.trade.price)?;
        write_balance(&tx, user_id, fill.balance)?;
        tx.commit().map_err(query_err)?;
        Ok(trade)
    }
}

impl StrategyPort for SqliteLedger {
    fn active_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
        self.query_strategies(
            &format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE user_id = ?1 AND is_active = 1 ORDER BY id"),
            user_id,
        )
    }

    fn all_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
        self.query_strategies(
            &format!("SELECT {STRATEGY_COLUMNS} FROM strategies WHERE user_id = ?1 ORDER BY id"),
            user_id,
        )
    }

    fn create_strategy(&self, user_id: i64, strategy: &NewStrategy) -> Result<Strategy, PapertraderError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO strategies (user_id, name, description, strategy_type, is_active, rules)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user_id,
                strategy.name,
                strategy.description,
                strategy.kind.as_str(),
                strategy.is_active as i64,
                strategy.rules
            ],
        )
        .map_err(query_err)?;

        Ok(Strategy {
            id: conn.last_insert_rowid(),
            user_id,
            name: strategy.name.clone(),
            description: strategy.description.clone(),
            kind: strategy.kind.clone(),
            is_active: strategy.is_active,
            rules: strategy.rules.clone(),
        })
    }

    fn set_active(&self, user_id: i64, id: i64, active: bool) -> Result<bool, PapertraderError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE strategies SET is_active = ?3 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id, active as i64],
            )
            .map_err(query_err)?;
        Ok(changed > 0)
    }
}

impl SqliteLedger {
    fn query_strategies(&self, sql: &str, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql).map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], strategy_from_row)
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}
