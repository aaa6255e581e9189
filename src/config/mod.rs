// ==========================================
// 生产序列号矩阵 - 配置层
// ==========================================
// 职责: 矩阵向导配置读取
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod matrix_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use matrix_config_trait::{MatrixConfig, MatrixConfigReader};
