// ==========================================
// 生产序列号矩阵 - 矩阵单元格与告警
// ==========================================
// 单元格 (ComponentSlot): 每件成品 × 每个组件槽位
// 告警 (ConsumptionWarning): 阻断提交, 不阻断编辑
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::Product;
use crate::domain::production::{LocationId, MoveId};
use crate::domain::types::WarningKind;
use serde::{Deserialize, Serialize};

// ==========================================
// FinishedUnit - 成品单元
// ==========================================
// Existing: 已有序列号; Pending: 尚未分配序列号的第 N 件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FinishedUnit {
    Existing(Lot),
    Pending { number: u32 },
}

impl FinishedUnit {
    pub fn lot_id(&self) -> Option<LotId> {
        match self {
            FinishedUnit::Existing(lot) => Some(lot.id),
            FinishedUnit::Pending { .. } => None,
        }
    }

    /// 显示标签: 序列号名称或 "(New Lot N)"
    pub fn label(&self) -> String {
        match self {
            FinishedUnit::Existing(lot) => lot.name.clone(),
            FinishedUnit::Pending { number } => format!("(New Lot {})", number),
        }
    }
}

// ==========================================
// ComponentSlot - 矩阵单元格
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSlot {
    pub finished_lot_id: Option<LotId>,
    pub finished_lot_name: String,
    pub move_id: MoveId,
    pub location_id: LocationId, // 所属需求的来源库位
    pub component: Product,
    pub ordinal: u32,           // 0 表示不编号（批次追踪组件）
    pub column_name: String,    // 如 "[A] 组件 (2)"
    pub lot_qty: f64,           // 序列号固定为 1
    pub component_lot: Option<Lot>,
}

impl ComponentSlot {
    pub fn new(
        unit: &FinishedUnit,
        move_id: MoveId,
        location_id: LocationId,
        component: &Product,
        ordinal: u32,
        lot_qty: f64,
    ) -> Self {
        let mut column_name = component.display_name();
        if ordinal > 0 {
            column_name.push_str(&format!(" ({})", ordinal));
        }
        Self {
            finished_lot_id: unit.lot_id(),
            finished_lot_name: unit.label(),
            move_id,
            location_id,
            component: component.clone(),
            ordinal,
            column_name,
            lot_qty,
            component_lot: None,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.component_lot.is_some()
    }

    pub fn component_lot_id(&self) -> Option<LotId> {
        self.component_lot.as_ref().map(|lot| lot.id)
    }
}

// ==========================================
// ConsumptionWarning - 选择告警
// ==========================================
/// 批次引用（告警中只需主键与名称）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotRef {
    pub id: LotId,
    pub name: String,
}

impl From<&Lot> for LotRef {
    fn from(lot: &Lot) -> Self {
        Self {
            id: lot.id,
            name: lot.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionWarning {
    pub kind: WarningKind,
    pub lots: Vec<LotRef>, // 受影响的批次/序列号
    pub message: String,
}

/// 告警汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    pub warnings: Vec<ConsumptionWarning>,
}

impl SelectionReport {
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// 合并消息（", " 连接）
    pub fn message(&self) -> String {
        self.warnings
            .iter()
            .map(|w| w.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// 受影响批次总数（与告警条目一一累加, 不去重）
    pub fn lot_count(&self) -> usize {
        self.warnings.iter().map(|w| w.lots.len()).sum()
    }
}
