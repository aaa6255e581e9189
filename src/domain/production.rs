// ==========================================
// 生产序列号矩阵 - 生产订单与库存移动
// ==========================================
// 生产订单 (ProductionOrder) → 原材料需求 (RawMove) → 预留明细 (MoveLine)
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::Product;
use crate::domain::types::ProductionState;
use serde::{Deserialize, Serialize};

pub type ProductionId = i64;
pub type MoveId = i64;
pub type MoveLineId = i64;
pub type LocationId = i64;

// ==========================================
// ProductionOrder - 生产订单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: ProductionId,
    pub name: String,
    pub product: Product,
    pub product_qty: f64,           // 目标数量
    pub qty_producing: f64,         // 本次产出数量
    pub lot_producing: Option<Lot>, // 本次产出的成品序列号
    pub state: ProductionState,
    pub location_src_id: LocationId,
    pub location_dest_id: LocationId,
    pub procurement_group: String, // 欠单与原订单共享同一采购组
    pub company_id: i64,
}

// ==========================================
// BomRatio - BOM 行用量
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BomRatio {
    pub line_qty: f64, // BOM 行数量
    pub bom_qty: f64,  // BOM 基准产出数量
}

impl BomRatio {
    /// 每件成品的组件用量
    pub fn per_unit(&self) -> f64 {
        if self.bom_qty == 0.0 {
            return 0.0;
        }
        self.line_qty / self.bom_qty
    }
}

// ==========================================
// RawMove - 原材料消耗需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMove {
    pub id: MoveId,
    pub production_id: ProductionId,
    pub product: Product,
    pub product_qty: f64,
    pub bom_ratio: Option<BomRatio>, // 订单临时追加的组件没有 BOM 行
    pub location_id: LocationId,     // 来源库位
}

// ==========================================
// MoveLine - 预留/消耗明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveLine {
    pub id: MoveLineId,
    pub move_id: MoveId,
    pub lot_id: Option<LotId>,
    pub lot_name: Option<String>,
    pub product_qty: f64, // 已预留数量
    pub qty_done: f64,    // 已消耗数量
}
