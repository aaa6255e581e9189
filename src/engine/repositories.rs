// ==========================================
// 生产序列号矩阵 - 引擎层仓储聚合
// ==========================================
// 职责: 聚合矩阵向导所需的外部协作方
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    LotRegistry, LotRepositoryImpl, ProductionOrderRepository, ProductionRepositoryImpl,
    StockRepositoryImpl, StockReservation,
};

/// 矩阵向导仓储集合
///
/// # 包含的仓储
/// - `lot_repo`: 批次/序列号登记
/// - `stock_repo`: 库存可用量与预留
/// - `production_repo`: 生产订单、完工与欠单
#[derive(Clone)]
pub struct MatrixRepositories {
    pub lot_repo: Arc<dyn LotRegistry>,
    pub stock_repo: Arc<dyn StockReservation>,
    pub production_repo: Arc<dyn ProductionOrderRepository>,
}

impl MatrixRepositories {
    /// 创建新的仓储集合
    pub fn new(
        lot_repo: Arc<dyn LotRegistry>,
        stock_repo: Arc<dyn StockReservation>,
        production_repo: Arc<dyn ProductionOrderRepository>,
    ) -> Self {
        Self {
            lot_repo,
            stock_repo,
            production_repo,
        }
    }

    /// 基于同一 SQLite 连接创建全部仓储
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            lot_repo: Arc::new(LotRepositoryImpl::from_connection(conn.clone())),
            stock_repo: Arc::new(StockRepositoryImpl::from_connection(conn.clone())),
            production_repo: Arc::new(ProductionRepositoryImpl::from_connection(conn)),
        }
    }
}
