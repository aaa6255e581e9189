// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

#![allow(dead_code)]

use mrp_serial_matrix::config::MatrixConfig;
use mrp_serial_matrix::db::{ensure_schema, open_sqlite_connection};
use mrp_serial_matrix::domain::lot::LotId;
use mrp_serial_matrix::domain::product::ProductId;
use mrp_serial_matrix::domain::production::{LocationId, MoveId, ProductionId};
use mrp_serial_matrix::domain::types::Tracking;
use mrp_serial_matrix::engine::{MatrixRepositories, SerialMatrixWizard};
use mrp_serial_matrix::repository::{LotRegistry, LotRepositoryImpl, StockRepositoryImpl};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

/// 原材料来源库位
pub const SRC_LOCATION: LocationId = 8;
/// 成品入库库位
pub const DEST_LOCATION: LocationId = 9;

/// 临时测试数据库（NamedTempFile 需要保持存活）
pub struct TestDb {
    _temp_file: NamedTempFile,
    pub conn: Arc<Mutex<Connection>>,
}

/// 创建临时测试数据库并初始化 schema
pub fn create_test_db() -> Result<TestDb, Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("非 UTF-8 路径")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;

    Ok(TestDb {
        _temp_file: temp_file,
        conn: Arc::new(Mutex::new(conn)),
    })
}

impl TestDb {
    pub fn repos(&self) -> MatrixRepositories {
        MatrixRepositories::from_connection(self.conn.clone())
    }

    pub fn open_wizard(&self, production_id: ProductionId) -> SerialMatrixWizard {
        SerialMatrixWizard::open(self.repos(), MatrixConfig::default(), production_id).unwrap()
    }

    // ==========================================
    // 测试数据写入
    // ==========================================

    pub fn insert_product(&self, code: &str, name: &str, tracking: Tracking) -> ProductId {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO product (default_code, name, tracking, uom_rounding) VALUES (?1, ?2, ?3, 0.01)",
            params![code, name, tracking.to_db_str()],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    pub fn insert_lot(&self, product_id: ProductId, name: &str) -> LotId {
        LotRepositoryImpl::from_connection(self.conn.clone())
            .create(name, product_id)
            .unwrap()
            .id
    }

    pub fn add_stock(&self, product_id: ProductId, lot_id: Option<LotId>, qty: f64) {
        self.add_stock_at(product_id, SRC_LOCATION, lot_id, qty);
    }

    pub fn add_stock_at(&self, product_id: ProductId, location_id: LocationId, lot_id: Option<LotId>, qty: f64) {
        StockRepositoryImpl::from_connection(self.conn.clone())
            .add_quantity(product_id, location_id, lot_id, qty)
            .unwrap();
    }

    /// 新建批次并在来源库位入库
    pub fn insert_lot_in_stock(&self, product_id: ProductId, name: &str, qty: f64) -> LotId {
        let lot_id = self.insert_lot(product_id, name);
        self.add_stock(product_id, Some(lot_id), qty);
        lot_id
    }

    pub fn insert_production(&self, name: &str, product_id: ProductId, qty: f64) -> ProductionId {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO production (
                name, product_id, product_qty, state,
                location_src_id, location_dest_id, procurement_group
            ) VALUES (?1, ?2, ?3, 'confirmed', ?4, ?5, ?1)
            "#,
            params![name, product_id, qty, SRC_LOCATION, DEST_LOCATION],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    /// 原材料需求, bom = (BOM 行数量, BOM 基准数量)
    pub fn insert_move(
        &self,
        production_id: ProductionId,
        product_id: ProductId,
        qty: f64,
        bom: Option<(f64, f64)>,
    ) -> MoveId {
        self.insert_move_at(production_id, product_id, qty, bom, SRC_LOCATION)
    }

    /// 指定来源库位的原材料需求
    pub fn insert_move_at(
        &self,
        production_id: ProductionId,
        product_id: ProductId,
        qty: f64,
        bom: Option<(f64, f64)>,
        location_id: LocationId,
    ) -> MoveId {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO stock_move (production_id, product_id, product_qty, bom_line_qty, bom_qty, location_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                production_id,
                product_id,
                qty,
                bom.map(|b| b.0),
                bom.map(|b| b.1),
                location_id
            ],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    /// 在需求上预留某批次（同时占用 quant 预留数量）
    pub fn reserve(&self, move_id: MoveId, product_id: ProductId, lot_id: LotId, qty: f64) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO stock_move_line (move_id, lot_id, product_qty) VALUES (?1, ?2, ?3)",
            params![move_id, lot_id, qty],
        )
        .unwrap();
        conn.execute(
            r#"
            UPDATE stock_quant SET reserved_quantity = reserved_quantity + ?4
            WHERE product_id = ?1 AND location_id = ?2 AND lot_id = ?3
            "#,
            params![product_id, SRC_LOCATION, lot_id, qty],
        )
        .unwrap();
    }

    /// 直接设置需求上全部明细的消耗数量
    pub fn set_qty_done(&self, move_id: MoveId, qty_done: f64) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE stock_move_line SET qty_done = ?2 WHERE move_id = ?1",
            params![move_id, qty_done],
        )
        .unwrap();
    }

    pub fn set_config(&self, key: &str, value: &str) {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
            params![key, value],
        )
        .unwrap();
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn production_state(&self, production_id: ProductionId) -> String {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT state FROM production WHERE id = ?1",
            params![production_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    /// (名称, 产出序列号名称, 订单数量)
    pub fn production_summary(&self, production_id: ProductionId) -> (String, Option<String>, f64) {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            r#"
            SELECT p.name, l.name, p.product_qty
            FROM production p LEFT JOIN stock_lot l ON l.id = p.lot_producing_id
            WHERE p.id = ?1
            "#,
            params![production_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap()
    }

    /// (在库, 已预留)
    pub fn quant(&self, product_id: ProductId, location_id: LocationId, lot_id: LotId) -> (f64, f64) {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0), COALESCE(SUM(reserved_quantity), 0)
            FROM stock_quant WHERE product_id = ?1 AND location_id = ?2 AND lot_id = ?3
            "#,
            params![product_id, location_id, lot_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap()
    }

    /// 需求上未完成的预留明细: (批次名称, 预留数量, 消耗数量)
    pub fn open_move_lines(&self, move_id: MoveId) -> Vec<(Option<String>, f64, f64)> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT l.name, ml.product_qty, ml.qty_done
                FROM stock_move_line ml LEFT JOIN stock_lot l ON l.id = ml.lot_id
                WHERE ml.move_id = ?1 AND ml.state != 'done'
                ORDER BY ml.id
                "#,
            )
            .unwrap();
        stmt.query_map(params![move_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    pub fn lot_id_by_name(&self, product_id: ProductId, name: &str) -> Option<LotId> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT id FROM stock_lot WHERE product_id = ?1 AND name = ?2",
            params![product_id, name],
            |row| row.get(0),
        )
        .optional()
        .unwrap()
    }

    pub fn count_lots(&self, product_id: ProductId) -> i64 {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM stock_lot WHERE product_id = ?1",
            params![product_id],
            |row| row.get(0),
        )
        .unwrap()
    }
}

// ==========================================
// 标准场景
// ==========================================

/// 成品 FIN（序列号）, 组件 A（序列号）, GLUE（批次）
pub struct Scenario {
    pub db: TestDb,
    pub fin: ProductId,
    pub comp_a: ProductId,
    pub glue: ProductId,
    pub production_id: ProductionId,
    pub move_a: MoveId,
    pub move_glue: MoveId,
}

/// 订单 `units` 件, 每件需要 `a_per_unit` 个 A 与 0.5 GLUE
///
/// 来源库位库存: A-1..A-{units * a_per_unit} 各 1 件, GLUE-B1 共 10
pub fn scenario(units: u32, a_per_unit: u32) -> Scenario {
    let db = create_test_db().unwrap();
    let fin = db.insert_product("FIN", "Drone", Tracking::Serial);
    let comp_a = db.insert_product("A", "Motor", Tracking::Serial);
    let glue = db.insert_product("GLUE", "Glue", Tracking::Lot);

    for i in 1..=(units * a_per_unit) {
        db.insert_lot_in_stock(comp_a, &format!("A-{}", i), 1.0);
    }
    let glue_lot = db.insert_lot(glue, "GLUE-B1");
    db.add_stock(glue, Some(glue_lot), 10.0);

    let production_id = db.insert_production("MO", fin, units as f64);
    let move_a = db.insert_move(
        production_id,
        comp_a,
        (units * a_per_unit) as f64,
        Some((a_per_unit as f64, 1.0)),
    );
    let move_glue = db.insert_move(production_id, glue, units as f64 * 0.5, Some((0.5, 1.0)));

    Scenario {
        db,
        fin,
        comp_a,
        glue,
        production_id,
        move_a,
        move_glue,
    }
}
