// ==========================================
// 生产序列号矩阵 - 批次/序列号仓储实现
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::ProductId;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::lot_repo::LotRegistry;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

pub(crate) const LOT_COLUMNS: &str = "id, name, product_id, created_at";

/// 行映射（列顺序见 LOT_COLUMNS）
pub(crate) fn lot_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Lot> {
    Ok(Lot {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        product_id: row.get(offset + 2)?,
        created_at: row.get::<_, DateTime<Utc>>(offset + 3)?,
    })
}

// ==========================================
// LotRepositoryImpl - 批次仓储
// ==========================================
pub struct LotRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl LotRepositoryImpl {
    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }
}

impl LotRegistry for LotRepositoryImpl {
    fn find_by_id(&self, lot_id: LotId) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        let lot = conn
            .query_row(
                &format!("SELECT {} FROM stock_lot WHERE id = ?1", LOT_COLUMNS),
                params![lot_id],
                |row| lot_from_row(row, 0),
            )
            .optional()?;
        Ok(lot)
    }

    fn find_by_name(&self, name: &str, product_id: ProductId) -> RepositoryResult<Option<Lot>> {
        let conn = self.get_conn()?;
        let lot = conn
            .query_row(
                &format!(
                    "SELECT {} FROM stock_lot WHERE name = ?1 AND product_id = ?2",
                    LOT_COLUMNS
                ),
                params![name, product_id],
                |row| lot_from_row(row, 0),
            )
            .optional()?;
        Ok(lot)
    }

    fn create(&self, name: &str, product_id: ProductId) -> RepositoryResult<Lot> {
        let conn = self.get_conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO stock_lot (name, product_id, created_at) VALUES (?1, ?2, ?3)",
            params![name, product_id, created_at],
        )?;
        let id = conn.last_insert_rowid();
        info!(lot_id = id, lot_name = name, product_id, "新建批次/序列号");

        Ok(Lot {
            id,
            name: name.to_string(),
            product_id,
            created_at,
        })
    }
}
