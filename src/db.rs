// ==========================================
// 生产序列号矩阵 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一建表（幂等）
// - 提供事务作用域: 任一步骤失败整体回滚
// ==========================================

use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建表（幂等）
///
/// 表:
/// - config_kv: 配置
/// - product / stock_lot / stock_quant: 产品、批次、库存
/// - production / stock_move / stock_move_line: 生产订单、原材料需求、预留明细
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS product (
            id INTEGER PRIMARY KEY,
            default_code TEXT NOT NULL DEFAULT '',
            name TEXT NOT NULL,
            tracking TEXT NOT NULL DEFAULT 'none',
            uom_rounding REAL NOT NULL DEFAULT 0.01
        );

        CREATE TABLE IF NOT EXISTS stock_lot (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            product_id INTEGER NOT NULL REFERENCES product(id),
            created_at TEXT NOT NULL,
            UNIQUE(name, product_id)
        );

        CREATE TABLE IF NOT EXISTS stock_quant (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES product(id),
            location_id INTEGER NOT NULL,
            lot_id INTEGER REFERENCES stock_lot(id),
            quantity REAL NOT NULL DEFAULT 0,
            reserved_quantity REAL NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS production (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            product_id INTEGER NOT NULL REFERENCES product(id),
            product_qty REAL NOT NULL,
            qty_producing REAL NOT NULL DEFAULT 0,
            lot_producing_id INTEGER REFERENCES stock_lot(id),
            state TEXT NOT NULL DEFAULT 'confirmed',
            location_src_id INTEGER NOT NULL,
            location_dest_id INTEGER NOT NULL,
            procurement_group TEXT NOT NULL,
            company_id INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS stock_move (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            production_id INTEGER NOT NULL REFERENCES production(id),
            product_id INTEGER NOT NULL REFERENCES product(id),
            product_qty REAL NOT NULL,
            bom_line_qty REAL,
            bom_qty REAL,
            location_id INTEGER NOT NULL,
            state TEXT NOT NULL DEFAULT 'confirmed'
        );

        CREATE TABLE IF NOT EXISTS stock_move_line (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            move_id INTEGER NOT NULL REFERENCES stock_move(id),
            lot_id INTEGER REFERENCES stock_lot(id),
            product_qty REAL NOT NULL DEFAULT 0,
            qty_done REAL NOT NULL DEFAULT 0,
            state TEXT NOT NULL DEFAULT 'assigned'
        );

        CREATE INDEX IF NOT EXISTS idx_quant_product_location
            ON stock_quant(product_id, location_id);
        CREATE INDEX IF NOT EXISTS idx_move_production ON stock_move(production_id);
        CREATE INDEX IF NOT EXISTS idx_move_line_move ON stock_move_line(move_id);
        "#,
    )?;

    let version = read_schema_version(conn)?;
    if version.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION],
        )?;
    } else if version != Some(CURRENT_SCHEMA_VERSION) {
        warn!(
            found = ?version,
            expected = CURRENT_SCHEMA_VERSION,
            "schema_version 与当前代码不一致"
        );
    }
    Ok(())
}

/// 在事务中执行操作
///
/// 说明：
/// - 各仓储按调用加锁, 事务期间不持有连接锁
/// - 操作返回 Err 时回滚, 回滚失败只记录日志, 返回原始错误
pub fn with_transaction<T, E, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RepositoryError>,
{
    execute_statement(conn, "BEGIN IMMEDIATE")?;
    debug!("事务开始");

    match f() {
        Ok(value) => {
            execute_statement(conn, "COMMIT")?;
            debug!("事务提交");
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = execute_statement(conn, "ROLLBACK") {
                warn!(error = %rollback_err, "事务回滚失败");
            } else {
                debug!("事务回滚");
            }
            Err(err)
        }
    }
}

/// 在事务中执行操作并始终回滚（试运行）
pub fn with_rollback<T, E, F>(conn: &Arc<Mutex<Connection>>, f: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RepositoryError>,
{
    execute_statement(conn, "BEGIN IMMEDIATE")?;
    let result = f();
    execute_statement(conn, "ROLLBACK")?;
    debug!("试运行事务已回滚");
    result
}

fn execute_statement(conn: &Arc<Mutex<Connection>>, sql: &str) -> RepositoryResult<()> {
    let guard = conn
        .lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))?;
    guard
        .execute_batch(sql)
        .map_err(|e| RepositoryError::DatabaseTransactionError(format!("{}: {}", sql, e)))
}
