// ==========================================
// 生产序列号矩阵 - 引擎层
// ==========================================
// 职责: 矩阵生成、告警检查、消耗计划、向导编排
// 红线: Engine 不拼 SQL, 数据访问全部经由仓储 trait
// ==========================================

pub mod consumption_planner;
pub mod matrix_generator;
pub mod repositories;
pub mod selection_checker;
pub mod wizard;

// 重导出核心引擎
pub use consumption_planner::ConsumptionPlanner;
pub use matrix_generator::{MatrixGenerator, SlotTemplate};
pub use repositories::MatrixRepositories;
pub use selection_checker::SelectionChecker;
pub use wizard::{CommitSummary, ImportSummary, SerialMatrixWizard};
