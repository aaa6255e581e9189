// ==========================================
// 生产序列号矩阵 - 库存预留 Trait
// ==========================================
// 职责: 定义库存可用量查询与预留明细维护接口（不包含实现）
// 实现者: StockRepositoryImpl
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::ProductId;
use crate::domain::production::{LocationId, MoveId, MoveLine, MoveLineId, RawMove};
use crate::repository::error::RepositoryResult;

// ==========================================
// StockReservation Trait
// ==========================================
pub trait StockReservation: Send + Sync {
    /// 可用数量（在库 - 已预留）
    fn available_quantity(
        &self,
        product_id: ProductId,
        location_id: LocationId,
        lot_id: LotId,
    ) -> RepositoryResult<f64>;

    /// 某需求在某批次上的已预留数量
    fn reserved_quantity(&self, move_id: MoveId, lot_id: LotId) -> RepositoryResult<f64>;

    /// 单元格可选批次: 来源库位在库数量为正的组件批次
    fn allowed_lots(&self, product_id: ProductId, location_id: LocationId) -> RepositoryResult<Vec<Lot>>;

    /// 需求的预留明细
    fn move_lines(&self, move_id: MoveId) -> RepositoryResult<Vec<MoveLine>>;

    /// 新增/追加预留
    ///
    /// # 参数
    /// - need: 需要数量
    /// - available: 调用方已查询的可用数量
    /// - strict: 仅允许精确匹配该批次
    ///
    /// # 返回
    /// - 实际预留数量 = min(need, available)
    fn update_reserved_quantity(
        &self,
        mv: &RawMove,
        need: f64,
        available: f64,
        lot_id: LotId,
        strict: bool,
    ) -> RepositoryResult<f64>;

    /// 删除预留明细（释放其预留数量）
    fn unlink_move_lines(&self, move_line_ids: &[MoveLineId]) -> RepositoryResult<()>;

    /// 设置消耗数量
    fn set_qty_done(&self, move_line_id: MoveLineId, qty_done: f64) -> RepositoryResult<()>;
}
