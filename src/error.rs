// ==========================================
// 生产序列号矩阵 - 统一错误类型
// ==========================================
// 解析/结构/绑定/可用量错误立即中止当前操作, 原文返回调用方
// 选择告警汇总为一条消息, 仅阻断提交
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// CSV 解析错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("每行序列号数量必须一致 (实际 {found:?}, 期望 {expected})")]
    ColumnCountMismatch { found: Vec<String>, expected: usize },

    #[error("CSV 缺少表头行")]
    MissingHeader,

    #[error("成品序列号 {0} 在 CSV 中重复出现")]
    DuplicateFinishedSerial(String),

    #[error("CSV 无法解析: {0}")]
    Unreadable(String),
}

/// 矩阵错误类型
#[derive(Error, Debug)]
pub enum MatrixError {
    // ===== 解析错误 =====
    #[error(transparent)]
    Parse(#[from] ParseError),

    // ===== 结构不一致 =====
    #[error("成品为 {found}, 期望 {expected}")]
    ProductMismatch { found: String, expected: String },

    #[error("CSV 中的原材料: {found:?}, 期望: {expected:?}")]
    ComponentSetMismatch {
        found: Vec<String>,
        expected: Vec<String>,
    },

    // ===== 绑定错误 =====
    #[error("成品 {finished_serial} 中找不到组件 {component} 对应的矩阵单元格")]
    SlotNotFound {
        component: String,
        finished_serial: String,
    },

    #[error("组件 {component} 的序列号 {serial} 不可用")]
    SerialNotEligible { serial: String, component: String },

    // ===== 可用量错误 =====
    #[error("序列号/批次 '{lot}' 在来源库位不可用")]
    Availability { lot: String },

    // ===== 提交门控 =====
    #[error("所选批次存在问题: {0}")]
    SelectionWarnings(String),

    // ===== 向导前置条件 =====
    #[error("该生产订单的成品未按序列号追踪: {0}")]
    NotSerialTracked(String),

    #[error("没有可导入的内容")]
    NothingToImport,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl MatrixError {
    /// 是否为结构不一致（成品或组件集合与矩阵不符）
    pub fn is_structural_mismatch(&self) -> bool {
        matches!(
            self,
            MatrixError::ProductMismatch { .. } | MatrixError::ComponentSetMismatch { .. }
        )
    }

    /// 是否为绑定错误
    pub fn is_binding(&self) -> bool {
        matches!(
            self,
            MatrixError::SlotNotFound { .. } | MatrixError::SerialNotEligible { .. }
        )
    }
}

/// Result 类型别名
pub type MatrixResult<T> = Result<T, MatrixError>;
