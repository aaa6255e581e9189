// ==========================================
// 生产序列号矩阵 - 核心库
// ==========================================
// 用途: 按“成品序列号 × 组件单元”矩阵登记原材料序列号/批次, 逐件完工
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - CSV 矩阵
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/事务）
pub mod db;

// 错误类型
pub mod error;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{MarkDoneOutcome, ProductionState, Tracking, WarningKind};

// 领域实体
pub use domain::{ComponentSlot, ConsumptionWarning, Lot, Product, ProductionOrder, SelectionReport};

// 引擎
pub use engine::{
    CommitSummary, ConsumptionPlanner, ImportSummary, MatrixGenerator, MatrixRepositories,
    SelectionChecker, SerialMatrixWizard,
};

// 导入
pub use importer::{CsvImporter, CsvSerialsMatrix, MatrixValidator};

// 错误
pub use error::{MatrixError, MatrixResult, ParseError};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "生产序列号矩阵";
