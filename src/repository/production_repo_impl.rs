// ==========================================
// 生产序列号矩阵 - 生产订单仓储实现
// ==========================================
// 表: production, stock_move, stock_move_line, stock_quant
// 完工: 按 qty_done 扣减原材料库存, 释放未消耗预留, 成品入库
// ==========================================

use crate::domain::float_utils::float_is_zero;
use crate::domain::lot::LotId;
use crate::domain::product::{Product, ProductId};
use crate::domain::production::{
    BomRatio, LocationId, MoveId, ProductionId, ProductionOrder, RawMove,
};
use crate::domain::types::{MarkDoneOutcome, ProductionState, Tracking};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::lot_repo_impl::lot_from_row;
use crate::repository::production_repo::ProductionOrderRepository;
use crate::repository::stock_repo_impl::{adjust_quant_reserved, upsert_quant_quantity};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// 行映射: id, default_code, name, tracking, uom_rounding
pub(crate) fn product_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(offset)?,
        default_code: row.get(offset + 1)?,
        name: row.get(offset + 2)?,
        tracking: Tracking::from_db_str(&row.get::<_, String>(offset + 3)?),
        uom_rounding: row.get(offset + 4)?,
    })
}

/// 完工/拆分所需的订单头信息
struct ProductionHeader {
    id: ProductionId,
    product_id: ProductId,
    product_qty: f64,
    qty_producing: f64,
    lot_producing_id: Option<LotId>,
    state: ProductionState,
    location_src_id: LocationId,
    location_dest_id: LocationId,
    procurement_group: String,
    company_id: i64,
    uom_rounding: f64,
}

// ==========================================
// ProductionRepositoryImpl - 生产订单仓储
// ==========================================
pub struct ProductionRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ProductionRepositoryImpl {
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

    fn load_header(conn: &Connection, production_id: ProductionId) -> RepositoryResult<ProductionHeader> {
        conn.query_row(
            r#"
            SELECT p.id, p.product_id, p.product_qty, p.qty_producing, p.lot_producing_id,
                   p.state, p.location_src_id, p.location_dest_id, p.procurement_group,
                   p.company_id, pr.uom_rounding
            FROM production p
            JOIN product pr ON pr.id = p.product_id
            WHERE p.id = ?1
            "#,
            params![production_id],
            |row| {
                Ok(ProductionHeader {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    product_qty: row.get(2)?,
                    qty_producing: row.get(3)?,
                    lot_producing_id: row.get(4)?,
                    state: ProductionState::from_db_str(&row.get::<_, String>(5)?),
                    location_src_id: row.get(6)?,
                    location_dest_id: row.get(7)?,
                    procurement_group: row.get(8)?,
                    company_id: row.get(9)?,
                    uom_rounding: row.get(10)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| RepositoryError::NotFound {
            entity: "production".to_string(),
            id: production_id.to_string(),
        })
    }

    fn ensure_open(header: &ProductionHeader, target: ProductionState) -> RepositoryResult<()> {
        if header.state.is_closed() {
            return Err(RepositoryError::InvalidStateTransition {
                from: header.state.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    /// 完工: 扣减已消耗原材料、释放其余预留、成品入库
    fn finalize(conn: &Connection, header: &ProductionHeader) -> RepositoryResult<()> {
        let lot_producing_id = header.lot_producing_id.ok_or_else(|| {
            RepositoryError::BusinessRuleViolation(format!(
                "生产订单 {} 未设置成品序列号, 无法完工",
                header.id
            ))
        })?;

        let moves: Vec<(MoveId, ProductId, LocationId)> = {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, product_id, location_id FROM stock_move
                WHERE production_id = ?1 AND state NOT IN ('done', 'cancel')
                ORDER BY id
                "#,
            )?;
            let rows = stmt
                .query_map(params![header.id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        for (move_id, product_id, location_id) in moves {
            let lines: Vec<(i64, Option<LotId>, f64, f64)> = {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, lot_id, product_qty, qty_done FROM stock_move_line
                    WHERE move_id = ?1 AND state != 'done'
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![move_id], |row| {
                        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            for (line_id, lot_id, reserved, qty_done) in lines {
                adjust_quant_reserved(conn, product_id, location_id, lot_id, -reserved)?;
                if qty_done > 0.0 {
                    upsert_quant_quantity(conn, product_id, location_id, lot_id, -qty_done)?;
                    conn.execute(
                        "UPDATE stock_move_line SET state = 'done' WHERE id = ?1",
                        params![line_id],
                    )?;
                } else {
                    conn.execute("DELETE FROM stock_move_line WHERE id = ?1", params![line_id])?;
                }
            }
            conn.execute(
                "UPDATE stock_move SET state = 'done' WHERE id = ?1",
                params![move_id],
            )?;
        }

        upsert_quant_quantity(
            conn,
            header.product_id,
            header.location_dest_id,
            Some(lot_producing_id),
            header.qty_producing,
        )?;
        conn.execute(
            "UPDATE production SET state = 'done', product_qty = qty_producing WHERE id = ?1",
            params![header.id],
        )?;

        info!(
            production_id = header.id,
            lot_producing_id,
            qty_producing = header.qty_producing,
            "生产订单完工"
        );
        Ok(())
    }

    fn first_open_in_group(conn: &Connection, group: &str) -> RepositoryResult<Option<ProductionId>> {
        let id = conn
            .query_row(
                r#"
                SELECT id FROM production
                WHERE procurement_group = ?1 AND state NOT IN ('done', 'cancel')
                ORDER BY id LIMIT 1
                "#,
                params![group],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl ProductionOrderRepository for ProductionRepositoryImpl {
    fn find_production(&self, production_id: ProductionId) -> RepositoryResult<Option<ProductionOrder>> {
        let conn = self.get_conn()?;
        let order = conn
            .query_row(
                r#"
                SELECT p.id, p.name, p.product_qty, p.qty_producing, p.state,
                       p.location_src_id, p.location_dest_id, p.procurement_group, p.company_id,
                       pr.id, pr.default_code, pr.name, pr.tracking, pr.uom_rounding,
                       l.id, l.name, l.product_id, l.created_at
                FROM production p
                JOIN product pr ON pr.id = p.product_id
                LEFT JOIN stock_lot l ON l.id = p.lot_producing_id
                WHERE p.id = ?1
                "#,
                params![production_id],
                |row| {
                    let lot_producing = match row.get::<_, Option<LotId>>(14)? {
                        Some(_) => Some(lot_from_row(row, 14)?),
                        None => None,
                    };
                    Ok(ProductionOrder {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        product_qty: row.get(2)?,
                        qty_producing: row.get(3)?,
                        state: ProductionState::from_db_str(&row.get::<_, String>(4)?),
                        location_src_id: row.get(5)?,
                        location_dest_id: row.get(6)?,
                        procurement_group: row.get(7)?,
                        company_id: row.get(8)?,
                        product: product_from_row(row, 9)?,
                        lot_producing,
                    })
                },
            )
            .optional()?;
        Ok(order)
    }

    fn raw_moves(&self, production_id: ProductionId) -> RepositoryResult<Vec<RawMove>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, m.production_id, m.product_qty, m.bom_line_qty, m.bom_qty, m.location_id,
                   pr.id, pr.default_code, pr.name, pr.tracking, pr.uom_rounding
            FROM stock_move m
            JOIN product pr ON pr.id = m.product_id
            WHERE m.production_id = ?1 AND m.state != 'cancel'
            ORDER BY m.id
            "#,
        )?;
        let moves = stmt
            .query_map(params![production_id], |row| {
                let bom_line_qty: Option<f64> = row.get(3)?;
                let bom_qty: Option<f64> = row.get(4)?;
                Ok(RawMove {
                    id: row.get(0)?,
                    production_id: row.get(1)?,
                    product_qty: row.get(2)?,
                    bom_ratio: match (bom_line_qty, bom_qty) {
                        (Some(line_qty), Some(bom_qty)) => Some(BomRatio { line_qty, bom_qty }),
                        _ => None,
                    },
                    location_id: row.get(5)?,
                    product: product_from_row(row, 6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(moves)
    }

    fn set_qty_producing(
        &self,
        production_id: ProductionId,
        lot_id: LotId,
        qty_producing: f64,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let header = Self::load_header(&conn, production_id)?;
        Self::ensure_open(&header, ProductionState::Progress)?;

        conn.execute(
            r#"
            UPDATE production
            SET lot_producing_id = ?2, qty_producing = ?3, state = 'progress'
            WHERE id = ?1
            "#,
            params![production_id, lot_id, qty_producing],
        )?;
        Ok(())
    }

    fn mark_done(&self, production_id: ProductionId) -> RepositoryResult<MarkDoneOutcome> {
        let conn = self.get_conn()?;
        let header = Self::load_header(&conn, production_id)?;
        Self::ensure_open(&header, ProductionState::Done)?;

        let remaining = header.product_qty - header.qty_producing;
        if remaining > 0.0 && !float_is_zero(remaining, header.uom_rounding) {
            return Ok(MarkDoneOutcome::BackorderRequired);
        }

        Self::finalize(&conn, &header)?;
        Ok(MarkDoneOutcome::Done)
    }

    fn create_backorder(&self, production_id: ProductionId) -> RepositoryResult<Option<ProductionId>> {
        let conn = self.get_conn()?;
        let header = Self::load_header(&conn, production_id)?;
        Self::ensure_open(&header, ProductionState::Done)?;

        let remaining = header.product_qty - header.qty_producing;
        if remaining > 0.0 && !float_is_zero(remaining, header.uom_rounding) {
            let group_size: i64 = conn.query_row(
                "SELECT COUNT(*) FROM production WHERE procurement_group = ?1",
                params![header.procurement_group],
                |row| row.get(0),
            )?;
            let name = format!("{}-{:03}", header.procurement_group, group_size + 1);

            conn.execute(
                r#"
                INSERT INTO production (
                    name, product_id, product_qty, qty_producing, lot_producing_id, state,
                    location_src_id, location_dest_id, procurement_group, company_id
                ) VALUES (?1, ?2, ?3, 0, NULL, 'confirmed', ?4, ?5, ?6, ?7)
                "#,
                params![
                    name,
                    header.product_id,
                    remaining,
                    header.location_src_id,
                    header.location_dest_id,
                    header.procurement_group,
                    header.company_id,
                ],
            )?;
            let backorder_id = conn.last_insert_rowid();

            // 原材料需求按剩余比例拆分
            let moves: Vec<(MoveId, ProductId, f64, Option<f64>, Option<f64>, LocationId)> = {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT id, product_id, product_qty, bom_line_qty, bom_qty, location_id
                    FROM stock_move
                    WHERE production_id = ?1 AND state NOT IN ('done', 'cancel')
                    ORDER BY id
                    "#,
                )?;
                let rows = stmt
                    .query_map(params![header.id], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            };

            for (move_id, product_id, product_qty, bom_line_qty, bom_qty, location_id) in moves {
                let backorder_qty = if header.product_qty > 0.0 {
                    product_qty * remaining / header.product_qty
                } else {
                    0.0
                };
                conn.execute(
                    r#"
                    INSERT INTO stock_move (
                        production_id, product_id, product_qty, bom_line_qty, bom_qty, location_id, state
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'confirmed')
                    "#,
                    params![backorder_id, product_id, backorder_qty, bom_line_qty, bom_qty, location_id],
                )?;
                conn.execute(
                    "UPDATE stock_move SET product_qty = ?2 WHERE id = ?1",
                    params![move_id, product_qty - backorder_qty],
                )?;
            }

            info!(
                production_id = header.id,
                backorder_id,
                backorder_name = %name,
                remaining,
                "创建欠单"
            );
        }

        Self::finalize(&conn, &header)?;
        Self::first_open_in_group(&conn, &header.procurement_group)
    }
}
