// ==========================================
// 生产序列号矩阵 - 领域类型定义
// ==========================================
// 红线: 追踪方式是封闭枚举, 所有分支必须穷尽匹配
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 追踪方式 (Tracking)
// ==========================================
// 序列号: 每件 1 个单位; 批次: 按数量聚合; 无: 不进矩阵
// 序列化格式: snake_case (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    Serial, // 序列号追踪
    Lot,    // 批次追踪
    None,   // 不追踪
}

impl Tracking {
    /// 转换为数据库存储字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Tracking::Serial => "serial",
            Tracking::Lot => "lot",
            Tracking::None => "none",
        }
    }

    /// 从数据库字符串解析（未知值按不追踪处理）
    pub fn from_db_str(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "serial" => Tracking::Serial,
            "lot" => Tracking::Lot,
            _ => Tracking::None,
        }
    }

    /// 是否进入矩阵（序列号或批次）
    pub fn is_tracked(&self) -> bool {
        match self {
            Tracking::Serial | Tracking::Lot => true,
            Tracking::None => false,
        }
    }
}

impl fmt::Display for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 生产订单状态 (Production State)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionState {
    Confirmed, // 已确认
    Progress,  // 生产中
    Done,      // 已完成
    Cancel,    // 已取消
}

impl ProductionState {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            ProductionState::Confirmed => "confirmed",
            ProductionState::Progress => "progress",
            ProductionState::Done => "done",
            ProductionState::Cancel => "cancel",
        }
    }

    pub fn from_db_str(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "progress" => ProductionState::Progress,
            "done" => ProductionState::Done,
            "cancel" => ProductionState::Cancel,
            _ => ProductionState::Confirmed,
        }
    }

    /// 是否已关闭（完成或取消）
    pub fn is_closed(&self) -> bool {
        matches!(self, ProductionState::Done | ProductionState::Cancel)
    }
}

impl fmt::Display for ProductionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 完工结果 (Mark Done Outcome)
// ==========================================
// BackorderRequired: 本次产出数量小于订单数量, 剩余数量需拆分为欠单
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarkDoneOutcome {
    Done,
    BackorderRequired,
}

// ==========================================
// 选择告警类型 (Warning Kind)
// ==========================================
// 告警不阻断编辑, 只阻断最终提交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningKind {
    DuplicateSerial,         // 同一序列号被选择多次
    InsufficientLotQuantity, // 批次可用数量不足
    UnfilledSlot,            // 存在未填写的单元格
}

impl fmt::Display for WarningKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WarningKind::DuplicateSerial => write!(f, "DUPLICATE_SERIAL"),
            WarningKind::InsufficientLotQuantity => write!(f, "INSUFFICIENT_LOT_QUANTITY"),
            WarningKind::UnfilledSlot => write!(f, "UNFILLED_SLOT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_db_roundtrip() {
        assert_eq!(Tracking::from_db_str("serial"), Tracking::Serial);
        assert_eq!(Tracking::from_db_str(" LOT "), Tracking::Lot);
        assert_eq!(Tracking::from_db_str("whatever"), Tracking::None);
        assert!(Tracking::Serial.is_tracked());
        assert!(!Tracking::None.is_tracked());
    }

    #[test]
    fn test_production_state_closed() {
        assert!(ProductionState::Done.is_closed());
        assert!(ProductionState::Cancel.is_closed());
        assert!(!ProductionState::from_db_str("progress").is_closed());
    }
}
