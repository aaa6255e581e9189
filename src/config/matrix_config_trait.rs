// ==========================================
// 生产序列号矩阵 - 矩阵配置读取 Trait
// ==========================================
// 职责: 定义矩阵向导所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;
use serde::{Deserialize, Serialize};

// ==========================================
// MatrixConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
pub trait MatrixConfigReader: Send + Sync {
    /// 向导打开时“包含批次组件”的默认值
    ///
    /// # 默认值
    /// - false（序列号组件始终包含）
    fn get_include_lots_default(&self) -> RepositoryResult<bool>;

    /// 数量比较精度（小数位数）
    ///
    /// # 默认值
    /// - 2
    ///
    /// # 用途
    /// - 可用量判定、零数量预留明细判定
    fn get_uom_precision_digits(&self) -> RepositoryResult<u32>;

    /// 成品主键不一致时是否允许按标签匹配单元格
    ///
    /// # 默认值
    /// - true（每次标签匹配都记录告警日志）
    fn get_label_fallback_enabled(&self) -> RepositoryResult<bool>;
}

// ==========================================
// MatrixConfig - 配置快照
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    pub include_lots_default: bool,
    pub uom_precision_digits: u32,
    pub label_fallback_enabled: bool,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            include_lots_default: false,
            uom_precision_digits: 2,
            label_fallback_enabled: true,
        }
    }
}

impl MatrixConfig {
    /// 从配置读取器加载快照
    pub fn load(reader: &dyn MatrixConfigReader) -> RepositoryResult<Self> {
        Ok(Self {
            include_lots_default: reader.get_include_lots_default()?,
            uom_precision_digits: reader.get_uom_precision_digits()?,
            label_fallback_enabled: reader.get_label_fallback_enabled()?,
        })
    }
}
