// ==========================================
// 生产序列号矩阵 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 外部协作方接口（批次登记、库存预留、生产订单）及 SQLite 实现
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod lot_repo;
pub mod lot_repo_impl;
pub mod production_repo;
pub mod production_repo_impl;
pub mod stock_repo;
pub mod stock_repo_impl;

// 重导出接口与实现
pub use error::{RepositoryError, RepositoryResult};
pub use lot_repo::LotRegistry;
pub use lot_repo_impl::LotRepositoryImpl;
pub use production_repo::ProductionOrderRepository;
pub use production_repo_impl::ProductionRepositoryImpl;
pub use stock_repo::StockReservation;
pub use stock_repo_impl::StockRepositoryImpl;
