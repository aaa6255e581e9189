// ==========================================
// 生产序列号矩阵 - 领域层
// ==========================================
// 职责: 实体与值类型, 不含数据访问
// ==========================================

pub mod float_utils;
pub mod lot;
pub mod matrix;
pub mod product;
pub mod production;
pub mod types;

// 重导出核心类型
pub use lot::{Lot, LotId};
pub use matrix::{ComponentSlot, ConsumptionWarning, FinishedUnit, LotRef, SelectionReport};
pub use product::{Product, ProductId};
pub use production::{
    BomRatio, LocationId, MoveId, MoveLine, MoveLineId, ProductionId, ProductionOrder, RawMove,
};
pub use types::{MarkDoneOutcome, ProductionState, Tracking, WarningKind};
