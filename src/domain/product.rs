// ==========================================
// 生产序列号矩阵 - 产品实体
// ==========================================

use crate::domain::types::Tracking;
use serde::{Deserialize, Serialize};

pub type ProductId = i64;

/// 产品（成品或原材料组件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub default_code: String, // 内部编码（CSV 表头使用）
    pub name: String,
    pub tracking: Tracking,
    pub uom_rounding: f64, // 计量单位舍入精度
}

impl Product {
    /// 显示名称: "[编码] 名称"（无编码时仅名称）
    pub fn display_name(&self) -> String {
        if self.default_code.is_empty() {
            self.name.clone()
        } else {
            format!("[{}] {}", self.default_code, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut product = Product {
            id: 1,
            default_code: "RAW-A".to_string(),
            name: "主板".to_string(),
            tracking: Tracking::Serial,
            uom_rounding: 1.0,
        };
        assert_eq!(product.display_name(), "[RAW-A] 主板");

        product.default_code.clear();
        assert_eq!(product.display_name(), "主板");
    }
}
