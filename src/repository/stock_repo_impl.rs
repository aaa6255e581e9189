// ==========================================
// 生产序列号矩阵 - 库存预留仓储实现
// ==========================================
// 表: stock_quant（在库/预留）, stock_move_line（预留明细）
// 红线: 预留不得超过可用数量
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::ProductId;
use crate::domain::production::{LocationId, MoveId, MoveLine, MoveLineId, RawMove};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::lot_repo_impl::lot_from_row;
use crate::repository::stock_repo::StockReservation;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

// ==========================================
// StockRepositoryImpl - 库存预留仓储
// ==========================================
pub struct StockRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl StockRepositoryImpl {
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

    /// 入库（测试数据与成品完工使用）
    ///
    /// 同一 (产品, 库位, 批次) 只保留一条 quant 记录
    pub fn add_quantity(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        lot_id: Option<LotId>,
        quantity: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_quant_quantity(&conn, product_id, location_id, lot_id, quantity)?;
        Ok(())
    }
}

/// 增加 quant 在库数量（不存在则新建）
pub(crate) fn upsert_quant_quantity(
    conn: &Connection,
    product_id: ProductId,
    location_id: LocationId,
    lot_id: Option<LotId>,
    quantity: f64,
) -> rusqlite::Result<()> {
    let updated = conn.execute(
        r#"
        UPDATE stock_quant SET quantity = quantity + ?4
        WHERE product_id = ?1 AND location_id = ?2 AND lot_id IS ?3
        "#,
        params![product_id, location_id, lot_id, quantity],
    )?;
    if updated == 0 {
        conn.execute(
            r#"
            INSERT INTO stock_quant (product_id, location_id, lot_id, quantity, reserved_quantity)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
            params![product_id, location_id, lot_id, quantity],
        )?;
    }
    Ok(())
}

/// 调整 quant 已预留数量（不低于 0）
pub(crate) fn adjust_quant_reserved(
    conn: &Connection,
    product_id: ProductId,
    location_id: LocationId,
    lot_id: Option<LotId>,
    delta: f64,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        UPDATE stock_quant SET reserved_quantity = MAX(reserved_quantity + ?4, 0)
        WHERE product_id = ?1 AND location_id = ?2 AND lot_id IS ?3
        "#,
        params![product_id, location_id, lot_id, delta],
    )?;
    Ok(())
}

impl StockReservation for StockRepositoryImpl {
    fn available_quantity(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        lot_id: LotId,
    ) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let available: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity - reserved_quantity), 0)
            FROM stock_quant
            WHERE product_id = ?1 AND location_id = ?2 AND lot_id = ?3
            "#,
            params![product_id, location_id, lot_id],
            |row| row.get(0),
        )?;
        Ok(available)
    }

    fn reserved_quantity(&self, move_id: MoveId, lot_id: LotId) -> RepositoryResult<f64> {
        let conn = self.get_conn()?;
        let reserved: f64 = conn.query_row(
            r#"
            SELECT COALESCE(SUM(product_qty), 0)
            FROM stock_move_line
            WHERE move_id = ?1 AND lot_id = ?2 AND state != 'done'
            "#,
            params![move_id, lot_id],
            |row| row.get(0),
        )?;
        Ok(reserved)
    }

    fn allowed_lots(&self, product_id: ProductId, location_id: LocationId) -> RepositoryResult<Vec<Lot>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.id, l.name, l.product_id, l.created_at
            FROM stock_lot l
            WHERE l.product_id = ?1
              AND EXISTS (
                  SELECT 1 FROM stock_quant q
                  WHERE q.lot_id = l.id AND q.location_id = ?2 AND q.quantity > 0
              )
            ORDER BY l.name
            "#,
        )?;
        let lots = stmt
            .query_map(params![product_id, location_id], |row| lot_from_row(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lots)
    }

    fn move_lines(&self, move_id: MoveId) -> RepositoryResult<Vec<MoveLine>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT ml.id, ml.move_id, ml.lot_id, l.name, ml.product_qty, ml.qty_done
            FROM stock_move_line ml
            LEFT JOIN stock_lot l ON l.id = ml.lot_id
            WHERE ml.move_id = ?1 AND ml.state != 'done'
            ORDER BY ml.id
            "#,
        )?;
        let lines = stmt
            .query_map(params![move_id], |row| {
                Ok(MoveLine {
                    id: row.get(0)?,
                    move_id: row.get(1)?,
                    lot_id: row.get(2)?,
                    lot_name: row.get(3)?,
                    product_qty: row.get(4)?,
                    qty_done: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(lines)
    }

    fn update_reserved_quantity(
        &self,
        mv: &RawMove,
        need: f64,
        available: f64,
        lot_id: LotId,
        strict: bool,
    ) -> RepositoryResult<f64> {
        let taken = need.min(available);
        if taken <= 0.0 {
            return Ok(0.0);
        }

        let conn = self.get_conn()?;

        // 非严格模式允许落到无批次 quant 上; 严格模式只认精确批次
        let quant_lot: Option<LotId> = if strict {
            Some(lot_id)
        } else {
            conn.query_row(
                r#"
                SELECT lot_id FROM stock_quant
                WHERE product_id = ?1 AND location_id = ?2
                  AND (lot_id = ?3 OR lot_id IS NULL)
                  AND quantity - reserved_quantity > 0
                ORDER BY lot_id IS NULL
                LIMIT 1
                "#,
                params![mv.product.id, mv.location_id, lot_id],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(Some(lot_id))
        };

        adjust_quant_reserved(&conn, mv.product.id, mv.location_id, quant_lot, taken)?;

        let existing: Option<MoveLineId> = conn
            .query_row(
                r#"
                SELECT id FROM stock_move_line
                WHERE move_id = ?1 AND lot_id IS ?2 AND state != 'done'
                ORDER BY id LIMIT 1
                "#,
                params![mv.id, quant_lot],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(line_id) => {
                conn.execute(
                    "UPDATE stock_move_line SET product_qty = product_qty + ?2 WHERE id = ?1",
                    params![line_id, taken],
                )?;
            }
            None => {
                conn.execute(
                    r#"
                    INSERT INTO stock_move_line (move_id, lot_id, product_qty, qty_done, state)
                    VALUES (?1, ?2, ?3, 0, 'assigned')
                    "#,
                    params![mv.id, quant_lot, taken],
                )?;
            }
        }

        debug!(move_id = mv.id, lot_id, need, available, taken, "预留更新");
        Ok(taken)
    }

    fn unlink_move_lines(&self, move_line_ids: &[MoveLineId]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        for line_id in move_line_ids {
            let line: Option<(Option<LotId>, f64, ProductId, LocationId)> = conn
                .query_row(
                    r#"
                    SELECT ml.lot_id, ml.product_qty, m.product_id, m.location_id
                    FROM stock_move_line ml
                    JOIN stock_move m ON m.id = ml.move_id
                    WHERE ml.id = ?1
                    "#,
                    params![line_id],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let Some((lot_id, reserved, product_id, location_id)) = line else {
                continue;
            };
            adjust_quant_reserved(&conn, product_id, location_id, lot_id, -reserved)?;
            conn.execute("DELETE FROM stock_move_line WHERE id = ?1", params![line_id])?;
        }
        Ok(())
    }

    fn set_qty_done(&self, move_line_id: MoveLineId, qty_done: f64) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE stock_move_line SET qty_done = ?2 WHERE id = ?1",
            params![move_line_id, qty_done],
        )?;
        if updated == 0 {
            return Err(RepositoryError::NotFound {
                entity: "stock_move_line".to_string(),
                id: move_line_id.to_string(),
            });
        }
        Ok(())
    }
}
