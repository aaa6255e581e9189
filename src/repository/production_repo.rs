// ==========================================
// 生产序列号矩阵 - 生产订单 Trait
// ==========================================
// 职责: 定义生产订单读取、产出设置、完工与欠单接口（不包含实现）
// 实现者: ProductionRepositoryImpl
// ==========================================

use crate::domain::lot::LotId;
use crate::domain::production::{ProductionId, ProductionOrder, RawMove};
use crate::domain::types::MarkDoneOutcome;
use crate::repository::error::RepositoryResult;

// ==========================================
// ProductionOrderRepository Trait
// ==========================================
pub trait ProductionOrderRepository: Send + Sync {
    /// 查询生产订单（含成品与当前产出序列号）
    fn find_production(&self, production_id: ProductionId) -> RepositoryResult<Option<ProductionOrder>>;

    /// 原材料需求（按创建顺序）
    fn raw_moves(&self, production_id: ProductionId) -> RepositoryResult<Vec<RawMove>>;

    /// 设置本次产出的成品序列号与数量
    fn set_qty_producing(
        &self,
        production_id: ProductionId,
        lot_id: LotId,
        qty_producing: f64,
    ) -> RepositoryResult<()>;

    /// 完工
    ///
    /// # 返回
    /// - MarkDoneOutcome::Done: 已完工
    /// - MarkDoneOutcome::BackorderRequired: 产出数量小于订单数量, 需先拆分欠单（订单未变更）
    fn mark_done(&self, production_id: ProductionId) -> RepositoryResult<MarkDoneOutcome>;

    /// 拆分欠单并完工当前订单
    ///
    /// # 返回
    /// - Some(id): 同一采购组中第一个未关闭的订单
    /// - None: 已无待生产订单
    fn create_backorder(&self, production_id: ProductionId) -> RepositoryResult<Option<ProductionId>>;
}
