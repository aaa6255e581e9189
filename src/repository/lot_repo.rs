// ==========================================
// 生产序列号矩阵 - 批次/序列号登记 Trait
// ==========================================
// 职责: 定义批次登记接口（不包含实现）
// 实现者: LotRepositoryImpl
// ==========================================

use crate::domain::lot::{Lot, LotId};
use crate::domain::product::ProductId;
use crate::repository::error::RepositoryResult;

// ==========================================
// LotRegistry Trait
// ==========================================
pub trait LotRegistry: Send + Sync {
    /// 按主键查询
    fn find_by_id(&self, lot_id: LotId) -> RepositoryResult<Option<Lot>>;

    /// 按 (名称, 产品) 查询
    fn find_by_name(&self, name: &str, product_id: ProductId) -> RepositoryResult<Option<Lot>>;

    /// 新建批次
    ///
    /// # 返回
    /// - Err(UniqueConstraintViolation): (名称, 产品) 已存在
    fn create(&self, name: &str, product_id: ProductId) -> RepositoryResult<Lot>;

    /// 查找或新建（幂等）
    fn resolve_or_create(&self, name: &str, product_id: ProductId) -> RepositoryResult<Lot> {
        match self.find_by_name(name, product_id)? {
            Some(lot) => Ok(lot),
            None => self.create(name, product_id),
        }
    }
}
